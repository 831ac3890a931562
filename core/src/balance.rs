//! Chasing balance generation: what a customer owes right now, and how late.
//!
//! Design:
//!   - Invoices: unpaid, open, finalized, not voided, issued by now,
//!     not on autopay, in the requested currency; oldest first
//!   - Invoice under a payment plan → the plan's installment calculation
//!   - Pending invoice → balance minus its in-flight transactions
//!   - Zero contribution → invoice skipped entirely
//!   - Open credit notes reduce balance and past-due balance, never age
//!
//! Balances are computed fresh on every call. Nothing is cached.

use crate::{
    error::ChasingResult,
    model::{Customer, Invoice, InvoiceStatus},
    money::{Currency, Money},
    store::ChasingStore,
    types::{days_between, Timestamp},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ChasingBalance {
    pub customer: Customer,
    /// Invoices that contributed a non-zero amount, oldest first.
    pub invoices: Vec<Invoice>,
    pub balance: Money,
    pub past_due_balance: Money,
    /// Days since the oldest contributing invoice was issued.
    pub age: i64,
    /// Days since the oldest past-due due date. `None` when nothing is past due.
    pub past_due_age: Option<i64>,
}

impl ChasingBalance {
    pub fn currency(&self) -> &Currency {
        self.balance.currency()
    }

    pub fn is_past_due(&self) -> bool {
        self.past_due_age.is_some() && self.past_due_balance.is_positive()
    }
}

pub struct ChasingBalanceGenerator<'a> {
    store: &'a ChasingStore,
}

impl<'a> ChasingBalanceGenerator<'a> {
    pub fn new(store: &'a ChasingStore) -> Self {
        Self { store }
    }

    pub fn generate(
        &self,
        customer: &Customer,
        currency: &Currency,
        now: Timestamp,
    ) -> ChasingResult<ChasingBalance> {
        let mut balance = Money::zero(currency.clone());
        let mut past_due_balance = Money::zero(currency.clone());
        let mut age: i64 = 0;
        let mut past_due_age: Option<i64> = None;
        let mut invoices = Vec::new();

        for invoice in self.store.chaseable_invoices(customer.id, currency, now)? {
            let Some(contribution) = self.invoice_contribution(&invoice, now)? else {
                continue;
            };

            balance = balance.add(&contribution.balance)?;
            age = age.max(contribution.age);
            if let Some(days) = contribution.past_due_age {
                past_due_balance = past_due_balance.add(&contribution.past_due_balance)?;
                past_due_age = Some(past_due_age.map_or(days, |d| d.max(days)));
            }
            invoices.push(invoice);
        }

        for credit_note in self.store.open_credit_notes(customer.id, currency, now)? {
            let credit = Money::new(credit_note.balance, credit_note.currency.clone());
            balance = balance.subtract(&credit)?;
            past_due_balance = past_due_balance.subtract(&credit)?;
        }

        Ok(ChasingBalance {
            customer: customer.clone(),
            invoices,
            balance,
            past_due_balance,
            age,
            past_due_age,
        })
    }

    /// What one invoice adds to the customer's balance. `None` when it adds nothing.
    fn invoice_contribution(
        &self,
        invoice: &Invoice,
        now: Timestamp,
    ) -> ChasingResult<Option<Contribution>> {
        let currency = invoice.currency.clone();

        if let Some(plan_id) = invoice.payment_plan_id {
            if let Some(plan) = self.store.get_payment_plan(plan_id)? {
                let calc = plan.calculate_balance(invoice.date, now);
                if calc.balance.is_zero() {
                    return Ok(None);
                }
                return Ok(Some(Contribution {
                    balance: Money::new(calc.balance, currency.clone()),
                    past_due_balance: Money::new(calc.past_due_balance, currency),
                    age: calc.age,
                    past_due_age: calc.past_due_age,
                }));
            }
            log::warn!(
                "invoice={} balance: payment plan {plan_id} missing, chasing full balance",
                invoice.id
            );
        }

        let mut balance = Money::new(invoice.balance, currency);
        if invoice.status == InvoiceStatus::Pending {
            for txn in self.store.pending_transactions_for_invoice(invoice.id)? {
                balance = balance.subtract(&Money::new(txn.amount, txn.currency))?;
            }
        }
        if balance.is_zero() {
            return Ok(None);
        }

        let past_due_age = (invoice.status == InvoiceStatus::PastDue)
            .then(|| days_between(invoice.due_date.unwrap_or(invoice.date), now));

        Ok(Some(Contribution {
            past_due_balance: balance.clone(),
            balance,
            age: days_between(invoice.date, now),
            past_due_age,
        }))
    }
}

struct Contribution {
    balance: Money,
    past_due_balance: Money,
    age: i64,
    past_due_age: Option<i64>,
}
