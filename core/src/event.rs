//! Events flowing through the engine: due chasing steps from the planner
//! to the executor, and invoice lifecycle changes from the billing core.

use crate::{
    balance::ChasingBalance,
    model::{ChasingCadenceStep, Customer, Invoice},
    money::Money,
    types::CadenceId,
};
use serde::Serialize;

/// One due chasing step for one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChasingEvent {
    pub cadence_id: CadenceId,
    pub customer: Customer,
    pub step: ChasingCadenceStep,
    /// Where the customer's cursor goes once this event is executed.
    /// `None` completes the cadence.
    pub next_step: Option<ChasingCadenceStep>,
    pub invoices: Vec<Invoice>,
    pub balance: Money,
    pub past_due_balance: Money,
    pub age: i64,
    pub past_due_age: Option<i64>,
    pub client_url: String,
}

impl ChasingEvent {
    pub fn from_balance(
        cadence_id: CadenceId,
        balance: ChasingBalance,
        step: ChasingCadenceStep,
        next_step: Option<ChasingCadenceStep>,
        portal_url: &str,
    ) -> Self {
        let client_url = format!(
            "{}/customers/{}",
            portal_url.trim_end_matches('/'),
            balance.customer.client_id
        );
        Self {
            cadence_id,
            customer: balance.customer,
            step,
            next_step,
            invoices: balance.invoices,
            balance: balance.balance,
            past_due_balance: balance.past_due_balance,
            age: balance.age,
            past_due_age: balance.past_due_age,
            client_url,
        }
    }
}

/// An invoice lifecycle change, as published by the billing core.
#[derive(Debug, Clone, Copy)]
pub enum InvoiceEvent<'a> {
    PreUpdate { old: &'a Invoice, new: &'a Invoice },
    PostUpdate { old: &'a Invoice, new: &'a Invoice },
    PostDelete { invoice: &'a Invoice },
}

impl<'a> InvoiceEvent<'a> {
    pub fn invoice(&self) -> &'a Invoice {
        match *self {
            Self::PreUpdate { new, .. } | Self::PostUpdate { new, .. } => new,
            Self::PostDelete { invoice } => invoice,
        }
    }
}
