//! Invoice lifecycle hooks: cadence restart on settlement, statistics closure.

mod common;

use chasing_core::{
    clock::Clock,
    error::{ChasingError, ChasingResult},
    listener::{ChasingInvoiceListener, InvoiceEventBus, InvoiceSubscriber},
    model::{
        ChaseAction, ChasingCadence, ChasingCadenceStep, ChasingStatistic, CompletedChasingStep,
        Customer, Invoice, Task,
    },
    store::ChasingStore,
};
use common::{fixture, Fixture, NOW};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

struct MidCadence {
    cadence: ChasingCadence,
    steps: Vec<ChasingCadenceStep>,
    customer: Customer,
    invoice: Invoice,
}

/// A customer two steps into a three-step cadence, with history, tasks
/// and an open statistic on one invoice.
fn mid_cadence(f: &Fixture) -> MidCadence {
    let cadence = f.cadence("Standard", None);
    let steps = vec![
        f.step(&cadence, 1, ChaseAction::Email, "age:10"),
        f.step(&cadence, 2, ChaseAction::Phone, "age:30"),
        f.step(&cadence, 3, ChaseAction::Escalate, "age:60"),
    ];
    let customer = f.customer("Midway", Some(&cadence), Some(steps[2].id));
    let invoice = f.invoice(customer.id, dec!(250), 45, Some(15));

    for step in &steps[..2] {
        f.store
            .insert_completed_step(&CompletedChasingStep {
                id: None,
                tenant_id: f.tenant.id,
                customer_id: customer.id,
                cadence_id: cadence.id,
                chase_step_id: step.id,
                successful: true,
                message: "sent".into(),
                timestamp: NOW - 86_400,
            })
            .unwrap();
    }
    for complete in [false, true] {
        f.store
            .insert_task(&Task {
                id: None,
                tenant_id: f.tenant.id,
                customer_id: customer.id,
                chase_step_id: Some(steps[1].id),
                name: "Call Midway".into(),
                action: "phone".into(),
                user_id: Some(42),
                due_date: NOW - 86_400,
                complete,
            })
            .unwrap();
    }
    f.store
        .mass_upsert_statistics(&[ChasingStatistic {
            tenant_id: f.tenant.id,
            customer_id: customer.id,
            cadence_id: cadence.id,
            chase_step_id: steps[0].id,
            invoice_id: invoice.id,
            attempts: 1,
            channel: "email".into(),
            date: NOW - 86_400 * 2,
            paid: None,
            payment_responsible: None,
        }])
        .unwrap();

    MidCadence {
        cadence,
        steps,
        customer,
        invoice,
    }
}

fn bus(f: &Fixture) -> (InvoiceEventBus, Arc<ChasingInvoiceListener>) {
    let clock: Arc<dyn Clock> = f.clock.clone();
    let listener = Arc::new(ChasingInvoiceListener::new(clock));
    let mut bus = InvoiceEventBus::new();
    assert!(bus.subscribe(listener.clone()));
    (bus, listener)
}

fn pay_in_full(invoice: &Invoice) -> Invoice {
    let mut paid = invoice.clone();
    paid.balance = Decimal::ZERO;
    paid.paid = true;
    paid.closed = true;
    paid
}

/// Paying the last open invoice restarts the cadence from scratch.
#[test]
fn full_payment_restarts_the_cadence() {
    let f = fixture();
    let m = mid_cadence(&f);
    let (bus, listener) = bus(&f);

    bus.update_invoice(&f.store, &pay_in_full(&m.invoice)).unwrap();

    let customer = f.reload_customer(m.customer.id);
    assert_eq!(customer.chasing_cadence_id, Some(m.cadence.id));
    assert_eq!(customer.next_chase_step_id, Some(m.steps[0].id));
    assert!(f.store.completed_steps_for_customer(m.customer.id).unwrap().is_empty());
    let tasks = f.store.tasks_for_customer(m.customer.id).unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].complete);
    assert!(!listener.is_flagged(m.invoice.id));

    let stats = f.store.statistics_for_invoice(m.invoice.id).unwrap();
    assert_eq!(stats[0].paid, Some(NOW));
    assert_eq!(stats[0].payment_responsible, Some(true));
}

/// A payment that leaves money owing elsewhere does not restart anything.
#[test]
fn partial_settlement_keeps_the_cursor() {
    let f = fixture();
    let m = mid_cadence(&f);
    f.invoice(m.customer.id, dec!(90), 20, None);
    let (bus, _listener) = bus(&f);

    bus.update_invoice(&f.store, &pay_in_full(&m.invoice)).unwrap();

    let customer = f.reload_customer(m.customer.id);
    assert_eq!(customer.next_chase_step_id, Some(m.steps[2].id));
    assert_eq!(f.store.completed_steps_for_customer(m.customer.id).unwrap().len(), 2);
    assert_eq!(f.store.tasks_for_customer(m.customer.id).unwrap().len(), 2);
    // The paid invoice's statistics are still closed.
    let stats = f.store.statistics_for_invoice(m.invoice.id).unwrap();
    assert_eq!(stats[0].paid, Some(NOW));
}

/// A partial payment, or a balance that grows, keeps the statistics open.
#[test]
fn unresolved_balance_change_keeps_statistics_open() {
    let f = fixture();
    let m = mid_cadence(&f);
    let (bus, listener) = bus(&f);

    let mut partial = m.invoice.clone();
    partial.balance = dec!(100);
    bus.update_invoice(&f.store, &partial).unwrap();

    let stats = f.store.statistics_for_invoice(m.invoice.id).unwrap();
    assert_eq!(stats[0].paid, None);
    assert_eq!(stats[0].payment_responsible, None);
    assert!(!listener.is_flagged(m.invoice.id));

    let mut raised = partial.clone();
    raised.balance = dec!(400);
    raised.total = dec!(400);
    bus.update_invoice(&f.store, &raised).unwrap();

    let stats = f.store.statistics_for_invoice(m.invoice.id).unwrap();
    assert_eq!(stats[0].paid, None);
    assert_eq!(
        f.reload_customer(m.customer.id).next_chase_step_id,
        Some(m.steps[2].id)
    );

    // Settling it afterwards still closes them.
    bus.update_invoice(&f.store, &pay_in_full(&raised)).unwrap();
    let stats = f.store.statistics_for_invoice(m.invoice.id).unwrap();
    assert_eq!(stats[0].paid, Some(NOW));
    assert_eq!(stats[0].payment_responsible, Some(true));
}

/// Refuses every update before it is written.
struct RejectingSubscriber;

impl InvoiceSubscriber for RejectingSubscriber {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn on_pre_update(&self, _store: &ChasingStore, _old: &Invoice, _new: &Invoice) -> ChasingResult<()> {
        Err(ChasingError::Config("updates are frozen".into()))
    }
}

/// An update that never reaches the database leaves nothing flagged.
#[test]
fn aborted_update_clears_the_flag() {
    let f = fixture();
    let m = mid_cadence(&f);
    let (mut bus, listener) = bus(&f);
    assert!(bus.subscribe(Arc::new(RejectingSubscriber)));

    let err = bus
        .update_invoice(&f.store, &pay_in_full(&m.invoice))
        .unwrap_err();

    assert!(matches!(err, ChasingError::Config(_)));
    assert!(!listener.is_flagged(m.invoice.id));
    assert_eq!(f.reload_invoice(m.invoice.id).balance, dec!(250));
    let stats = f.store.statistics_for_invoice(m.invoice.id).unwrap();
    assert_eq!(stats[0].paid, None);
}

/// Edits that cannot settle anything are ignored.
#[test]
fn non_payment_edit_is_ignored() {
    let f = fixture();
    let m = mid_cadence(&f);
    let (bus, listener) = bus(&f);

    let mut renumbered = m.invoice.clone();
    renumbered.number = "INV-RENUMBERED".into();
    listener
        .on_pre_update(&f.store, &m.invoice, &renumbered)
        .unwrap();
    assert!(!listener.is_flagged(m.invoice.id));
    bus.update_invoice(&f.store, &renumbered).unwrap();

    assert_eq!(f.reload_invoice(m.invoice.id).number, "INV-RENUMBERED");
    let stats = f.store.statistics_for_invoice(m.invoice.id).unwrap();
    assert_eq!(stats[0].paid, None);
    assert_eq!(
        f.reload_customer(m.customer.id).next_chase_step_id,
        Some(m.steps[2].id)
    );
}

/// Customers outside any cadence are never flagged.
#[test]
fn customer_without_cadence_is_not_flagged() {
    let f = fixture();
    let c = f.customer("Unenrolled", None, None);
    let inv = f.invoice(c.id, dec!(40), 10, None);
    let (_bus, listener) = bus(&f);

    listener
        .on_pre_update(&f.store, &inv, &pay_in_full(&inv))
        .unwrap();

    assert!(!listener.is_flagged(inv.id));
}

/// Voiding settles the account but the chasing gets no credit for it.
#[test]
fn voided_invoice_is_not_payment_responsible() {
    let f = fixture();
    let m = mid_cadence(&f);
    let (bus, _listener) = bus(&f);

    let mut voided = m.invoice.clone();
    voided.voided = true;
    bus.update_invoice(&f.store, &voided).unwrap();

    assert_eq!(
        f.reload_customer(m.customer.id).next_chase_step_id,
        Some(m.steps[0].id)
    );
    let stats = f.store.statistics_for_invoice(m.invoice.id).unwrap();
    assert_eq!(stats[0].paid, Some(NOW));
    assert_eq!(stats[0].payment_responsible, Some(false));
}

/// Deleting the last open invoice restarts the cadence; the statistics
/// close without payment credit.
#[test]
fn deleting_last_invoice_restarts_the_cadence() {
    let f = fixture();
    let m = mid_cadence(&f);
    let (bus, _listener) = bus(&f);

    bus.delete_invoice(&f.store, m.invoice.id).unwrap();

    assert!(f.store.get_invoice(m.invoice.id).unwrap().is_none());
    assert_eq!(
        f.reload_customer(m.customer.id).next_chase_step_id,
        Some(m.steps[0].id)
    );
    assert!(f.store.completed_steps_for_customer(m.customer.id).unwrap().is_empty());
    let stats = f.store.statistics_for_invoice(m.invoice.id).unwrap();
    assert_eq!(stats[0].paid, Some(NOW));
    assert_eq!(stats[0].payment_responsible, Some(false));
}

/// Registering the same subscriber twice keeps a single registration.
#[test]
fn subscription_is_idempotent() {
    let f = fixture();
    let (mut bus, listener) = bus(&f);

    assert!(!bus.subscribe(listener.clone()));
    let clock: Arc<dyn Clock> = f.clock.clone();
    assert!(!bus.subscribe(Arc::new(ChasingInvoiceListener::new(clock))));

    assert_eq!(bus.len(), 1);
    assert!(bus.is_subscribed(ChasingInvoiceListener::NAME));
}
