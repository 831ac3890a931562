//! Persisted records the engine reads and writes.
//!
//! Cadences and steps are authored elsewhere and read-only here.
//! Customers are owned by the billing core; the engine touches only
//! `chasing_cadence_id` and `next_chase_step_id`.

use crate::{
    money::Currency,
    types::{
        CadenceId, CreditNoteId, CustomerId, InvoiceId, PaymentPlanId, StepId, TaskId, TenantId,
        Timestamp, UserId,
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Tenant ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub currency: Currency,
    pub features: Vec<String>,
}

impl Tenant {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

// ── Customer ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub tenant_id: TenantId,
    /// Public identifier used in client portal links.
    pub client_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
    pub currency: Option<Currency>,
    /// Opt-out switch. `false` means never chase.
    pub chase: bool,
    pub chasing_cadence_id: Option<CadenceId>,
    /// `None` means chasing is inactive or finished.
    pub next_chase_step_id: Option<StepId>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: Timestamp,
}

impl Customer {
    /// The currency balances are generated in when chasing this customer.
    pub fn chasing_currency(&self, tenant: &Tenant) -> Currency {
        self.currency.clone().unwrap_or_else(|| tenant.currency.clone())
    }

    /// Field map that cadence assignment conditions are evaluated against.
    pub fn attributes(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ── Cadence ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaseAction {
    Mail,
    Email,
    Escalate,
    Phone,
    Sms,
}

impl ChaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::Email => "email",
            Self::Escalate => "escalate",
            Self::Phone => "phone",
            Self::Sms => "sms",
        }
    }

    /// Statistics channel recorded for a successful action.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Mail => "letter",
            Self::Email => "email",
            Self::Escalate => "escalation",
            Self::Phone => "phone",
            Self::Sms => "text_message",
        }
    }
}

impl fmt::Display for ChaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChaseAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mail" => Ok(Self::Mail),
            "email" => Ok(Self::Email),
            "escalate" => Ok(Self::Escalate),
            "phone" => Ok(Self::Phone),
            "sms" => Ok(Self::Sms),
            other => Err(format!("unknown chase action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Age,
    PastDueAge,
}

/// A parsed `"<kind>:<threshold>"` step schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSchedule {
    pub kind: ScheduleKind,
    pub threshold: i64,
}

impl StepSchedule {
    /// Returns `None` for anything malformed or of an unknown kind.
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, threshold) = raw.split_once(':')?;
        let kind = match kind.trim() {
            "age" => ScheduleKind::Age,
            "past_due_age" => ScheduleKind::PastDueAge,
            _ => return None,
        };
        let threshold = threshold.trim().parse::<i64>().ok()?;
        Some(StepSchedule { kind, threshold })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChasingCadenceStep {
    pub id: StepId,
    pub cadence_id: CadenceId,
    pub name: String,
    pub action: ChaseAction,
    pub schedule: String,
    /// Position in the cadence, ascending.
    pub sort_order: i64,
    /// Owner of the task created by phone and escalate steps.
    pub assigned_user_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMode {
    Default,
    Conditional,
    /// Only assigned by hand.
    None,
}

impl AssignmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Conditional => "conditional",
            Self::None => "none",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "default" => Self::Default,
            "conditional" => Self::Conditional,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChasingCadence {
    pub id: CadenceId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Balances below this are not chased. Zero or absent disables the gate.
    pub min_balance: Option<Decimal>,
    pub assignment_mode: AssignmentMode,
    pub assignment_conditions: Option<String>,
}

// ── Receivables ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    NotSent,
    Sent,
    Viewed,
    PastDue,
    Pending,
    Paid,
    Voided,
    BadDebt,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::NotSent => "not_sent",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::PastDue => "past_due",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Voided => "voided",
            Self::BadDebt => "bad_debt",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "not_sent" => Ok(Self::NotSent),
            "sent" => Ok(Self::Sent),
            "viewed" => Ok(Self::Viewed),
            "past_due" => Ok(Self::PastDue),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "voided" => Ok(Self::Voided),
            "bad_debt" => Ok(Self::BadDebt),
            other => Err(format!("unknown invoice status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub number: String,
    pub currency: Currency,
    pub total: Decimal,
    pub balance: Decimal,
    /// Issue date.
    pub date: Timestamp,
    pub due_date: Option<Timestamp>,
    pub status: InvoiceStatus,
    pub paid: bool,
    pub closed: bool,
    pub draft: bool,
    pub voided: bool,
    pub autopay: bool,
    pub payment_plan_id: Option<PaymentPlanId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditNote {
    pub id: CreditNoteId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub currency: Currency,
    pub balance: Decimal,
    pub date: Timestamp,
    pub paid: bool,
    pub closed: bool,
    pub draft: bool,
    pub voided: bool,
}

/// Money already in flight against an invoice (e.g. an ACH debit
/// that has not cleared).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: i64,
    pub invoice_id: InvoiceId,
    pub currency: Currency,
    pub amount: Decimal,
}

// ── Chasing history ─────────────────────────────────────────────

/// Append-only audit row, one per executed chasing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedChasingStep {
    pub id: Option<i64>,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub cadence_id: CadenceId,
    pub chase_step_id: StepId,
    pub successful: bool,
    pub message: String,
    pub timestamp: Timestamp,
}

/// Per-invoice outcome tracking for successful chasing actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChasingStatistic {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub cadence_id: CadenceId,
    pub chase_step_id: StepId,
    pub invoice_id: InvoiceId,
    pub attempts: i64,
    pub channel: String,
    pub date: Timestamp,
    pub paid: Option<Timestamp>,
    pub payment_responsible: Option<bool>,
}

/// Collection work item for a person (call the customer, review the account).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<TaskId>,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub chase_step_id: Option<StepId>,
    pub name: String,
    pub action: String,
    pub user_id: Option<UserId>,
    pub due_date: Timestamp,
    pub complete: bool,
}
