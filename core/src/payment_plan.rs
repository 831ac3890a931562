//! Installment payment plans attached to an invoice.
//!
//! An invoice under a plan is chased on its installments, not on its
//! full balance: only installments whose date has arrived count.

use crate::types::{days_between, InvoiceId, PaymentPlanId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: Option<i64>,
    pub date: Timestamp,
    pub amount: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub id: Option<PaymentPlanId>,
    pub invoice_id: InvoiceId,
    pub installments: Vec<Installment>,
}

/// Result of `PaymentPlan::calculate_balance`, in the invoice's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPlanBalance {
    pub balance: Decimal,
    pub past_due_balance: Decimal,
    pub age: i64,
    pub past_due_age: Option<i64>,
}

impl PaymentPlan {
    /// Sum the installments that are due as of `now`.
    ///
    /// - an installment is due once its date is on or before `now`
    /// - it is past due once a full day has passed since its date
    /// - `age` counts from the invoice date, and only when something is due
    pub fn calculate_balance(&self, invoice_date: Timestamp, now: Timestamp) -> PaymentPlanBalance {
        let mut balance = Decimal::ZERO;
        let mut past_due_balance = Decimal::ZERO;
        let mut past_due_age: Option<i64> = None;

        for installment in &self.installments {
            if installment.date > now || installment.balance <= Decimal::ZERO {
                continue;
            }
            balance += installment.balance;

            let overdue_days = days_between(installment.date, now);
            if overdue_days >= 1 {
                past_due_balance += installment.balance;
                past_due_age = Some(past_due_age.map_or(overdue_days, |d| d.max(overdue_days)));
            }
        }

        let age = if balance.is_zero() {
            0
        } else {
            days_between(invoice_date, now)
        };

        PaymentPlanBalance {
            balance,
            past_due_balance,
            age,
            past_due_age,
        }
    }
}
