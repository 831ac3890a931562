//! Shared seeding helpers for integration tests.
#![allow(dead_code)]

use chasing_core::{
    action::{ActionCollection, LogNotifier},
    clock::FixedClock,
    config::ChasingConfig,
    model::{
        AssignmentMode, ChaseAction, ChasingCadence, ChasingCadenceStep, CreditNote, Customer,
        Invoice, InvoiceStatus, Tenant,
    },
    money::Currency,
    payment_plan::{Installment, PaymentPlan},
    store::ChasingStore,
    types::{CustomerId, InvoiceId, StepId, Timestamp, DAY},
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// 2023-11-14T22:13:20Z
pub const NOW: Timestamp = 1_700_000_000;

pub fn days_ago(days: i64) -> Timestamp {
    NOW - days * DAY
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Fixture {
    pub store: ChasingStore,
    pub tenant: Tenant,
    pub clock: Arc<FixedClock>,
    pub config: ChasingConfig,
}

pub fn fixture() -> Fixture {
    init_logging();
    let store = ChasingStore::in_memory().unwrap();
    store.migrate().unwrap();
    let tenant = Tenant {
        id: 1,
        name: "Acme Receivables".into(),
        currency: Currency::new("USD"),
        features: vec!["smart_chasing".into()],
    };
    store.insert_tenant(&tenant).unwrap();
    Fixture {
        store,
        tenant,
        clock: Arc::new(FixedClock::at(NOW)),
        config: ChasingConfig::default_test(),
    }
}

pub fn log_actions() -> ActionCollection {
    ActionCollection::standard(Arc::new(LogNotifier))
}

impl Fixture {
    pub fn cadence(&self, name: &str, min_balance: Option<Decimal>) -> ChasingCadence {
        self.cadence_with(name, min_balance, AssignmentMode::None, None)
    }

    pub fn cadence_with(
        &self,
        name: &str,
        min_balance: Option<Decimal>,
        mode: AssignmentMode,
        conditions: Option<&str>,
    ) -> ChasingCadence {
        let mut cadence = ChasingCadence {
            id: 0,
            tenant_id: self.tenant.id,
            name: name.into(),
            min_balance,
            assignment_mode: mode,
            assignment_conditions: conditions.map(str::to_string),
        };
        cadence.id = self.store.insert_cadence(&cadence).unwrap();
        cadence
    }

    pub fn step(
        &self,
        cadence: &ChasingCadence,
        sort_order: i64,
        action: ChaseAction,
        schedule: &str,
    ) -> ChasingCadenceStep {
        let mut step = ChasingCadenceStep {
            id: 0,
            cadence_id: cadence.id,
            name: format!("{action} {schedule}"),
            action,
            schedule: schedule.into(),
            sort_order,
            assigned_user_id: Some(42),
        };
        step.id = self.store.insert_step(&step).unwrap();
        step
    }

    pub fn customer(
        &self,
        name: &str,
        cadence: Option<&ChasingCadence>,
        cursor: Option<StepId>,
    ) -> Customer {
        let mut customer = Customer {
            id: 0,
            tenant_id: self.tenant.id,
            client_id: format!("cl_{}", name.to_lowercase().replace(' ', "_")),
            name: name.into(),
            email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
            phone: Some("+15550100".into()),
            address: Some("1 Main St, Springfield".into()),
            country: Some("US".into()),
            currency: None,
            chase: true,
            chasing_cadence_id: cadence.map(|c| c.id),
            next_chase_step_id: cursor,
            metadata: serde_json::Map::new(),
            created_at: days_ago(400),
        };
        customer.id = self.store.insert_customer(&customer).unwrap();
        customer
    }

    /// Open invoice issued `age_days` ago. Past due when `past_due_days` is set.
    pub fn invoice(
        &self,
        customer_id: CustomerId,
        balance: Decimal,
        age_days: i64,
        past_due_days: Option<i64>,
    ) -> Invoice {
        let status = if past_due_days.is_some() {
            InvoiceStatus::PastDue
        } else {
            InvoiceStatus::Sent
        };
        self.invoice_with(customer_id, balance, "USD", age_days, past_due_days, status)
    }

    pub fn invoice_with(
        &self,
        customer_id: CustomerId,
        balance: Decimal,
        currency: &str,
        age_days: i64,
        past_due_days: Option<i64>,
        status: InvoiceStatus,
    ) -> Invoice {
        let mut invoice = Invoice {
            id: 0,
            tenant_id: self.tenant.id,
            customer_id,
            number: format!("INV-{customer_id}-{age_days}"),
            currency: Currency::new(currency),
            total: balance,
            balance,
            date: days_ago(age_days),
            due_date: Some(days_ago(past_due_days.unwrap_or(0).min(age_days))),
            status,
            paid: false,
            closed: false,
            draft: false,
            voided: false,
            autopay: false,
            payment_plan_id: None,
        };
        invoice.id = self.store.insert_invoice(&invoice).unwrap();
        invoice
    }

    /// Attach a plan to an existing invoice. Installments are (days ago, balance).
    pub fn payment_plan(&self, invoice: &mut Invoice, installments: &[(i64, Decimal)]) {
        let plan = PaymentPlan {
            id: None,
            invoice_id: invoice.id,
            installments: installments
                .iter()
                .map(|(days, balance)| Installment {
                    id: None,
                    date: days_ago(*days),
                    amount: *balance,
                    balance: *balance,
                })
                .collect(),
        };
        let plan_id = self.store.insert_payment_plan(&plan).unwrap();
        invoice.payment_plan_id = Some(plan_id);
        self.store.update_invoice(invoice).unwrap();
    }

    pub fn credit_note(&self, customer_id: CustomerId, balance: Decimal) -> CreditNote {
        let mut note = CreditNote {
            id: 0,
            tenant_id: self.tenant.id,
            customer_id,
            currency: Currency::new("USD"),
            balance,
            date: days_ago(5),
            paid: false,
            closed: false,
            draft: false,
            voided: false,
        };
        note.id = self.store.insert_credit_note(&note).unwrap();
        note
    }

    pub fn reload_customer(&self, customer_id: CustomerId) -> Customer {
        self.store.get_customer(customer_id).unwrap().unwrap()
    }

    pub fn reload_invoice(&self, invoice_id: InvoiceId) -> Invoice {
        self.store.get_invoice(invoice_id).unwrap().unwrap()
    }
}
