//! Shared primitive types used across the entire chasing engine.

/// Row identifiers. SQLite rowids, so plain integers.
pub type TenantId = i64;
pub type CustomerId = i64;
pub type CadenceId = i64;
pub type StepId = i64;
pub type InvoiceId = i64;
pub type CreditNoteId = i64;
pub type PaymentPlanId = i64;
pub type TaskId = i64;
pub type UserId = i64;

/// Unix timestamp in seconds. Every persisted instant uses this.
pub type Timestamp = i64;

pub const DAY: i64 = 86_400;

/// Whole days elapsed between two instants, floored, never negative.
pub fn days_between(earlier: Timestamp, later: Timestamp) -> i64 {
    ((later - earlier) / DAY).max(0)
}
