//! Chasing actions and the collection that dispatches to them.
//!
//! RULE: actions never touch the customer's cursor, the audit trail or
//! statistics. They perform their side effect and report an ActionResult;
//! the executor does all bookkeeping.

use crate::{
    error::ChasingResult,
    event::ChasingEvent,
    model::{ChaseAction, Task},
    store::ChasingStore,
    types::{CustomerId, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub successful: bool,
    pub message: String,
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            successful: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            successful: false,
            message: message.into(),
        }
    }
}

/// What an action may use while it runs.
pub struct ActionContext<'a> {
    pub store: &'a ChasingStore,
    pub now: Timestamp,
}

/// The contract every chasing action fulfills.
pub trait ChasingAction: Send {
    fn action(&self) -> ChaseAction;

    fn execute(&self, event: &ChasingEvent, ctx: &ActionContext<'_>) -> ActionResult;

    /// When true, at most one step with this action fires per customer per run.
    fn limit_once_per_run(&self) -> bool {
        false
    }
}

// ── Outbound notices ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChaseNotice {
    pub channel: ChaseAction,
    pub customer_id: CustomerId,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Delivery seam for email, SMS and postal mail.
pub trait Notifier: Send + Sync {
    /// Returns a delivery reference on success.
    fn send(&self, notice: &ChaseNotice) -> anyhow::Result<String>;
}

/// Writes notices to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notice: &ChaseNotice) -> anyhow::Result<String> {
        log::info!(
            "customer={} notifier: {} to {}: {}",
            notice.customer_id,
            notice.channel,
            notice.recipient,
            notice.subject
        );
        Ok(format!("{}-{}", notice.channel, notice.customer_id))
    }
}

fn statement_body(event: &ChasingEvent) -> String {
    let mut body = format!(
        "Your account has an outstanding balance of {} across {} invoice(s).",
        event.balance,
        event.invoices.len()
    );
    if event.past_due_balance.is_positive() {
        body.push_str(&format!(" {} of it is past due.", event.past_due_balance));
    }
    body.push_str(&format!(" View and pay: {}", event.client_url));
    body
}

fn send_notice(
    notifier: &dyn Notifier,
    channel: ChaseAction,
    recipient: Option<&str>,
    missing: &str,
    event: &ChasingEvent,
) -> ActionResult {
    let Some(recipient) = recipient.filter(|r| !r.trim().is_empty()) else {
        return ActionResult::failure(missing);
    };
    let notice = ChaseNotice {
        channel,
        customer_id: event.customer.id,
        recipient: recipient.to_string(),
        subject: format!("Account statement for {}", event.customer.name),
        body: statement_body(event),
    };
    match notifier.send(&notice) {
        Ok(reference) => ActionResult::success(format!("{channel} sent ({reference})")),
        Err(e) => ActionResult::failure(format!("{channel} delivery failed: {e}")),
    }
}

pub struct EmailAction {
    notifier: Arc<dyn Notifier>,
}

impl EmailAction {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

impl ChasingAction for EmailAction {
    fn action(&self) -> ChaseAction {
        ChaseAction::Email
    }

    fn execute(&self, event: &ChasingEvent, _ctx: &ActionContext<'_>) -> ActionResult {
        send_notice(
            self.notifier.as_ref(),
            ChaseAction::Email,
            event.customer.email.as_deref(),
            "customer has no email address",
            event,
        )
    }

    fn limit_once_per_run(&self) -> bool {
        true
    }
}

pub struct SmsAction {
    notifier: Arc<dyn Notifier>,
}

impl SmsAction {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

impl ChasingAction for SmsAction {
    fn action(&self) -> ChaseAction {
        ChaseAction::Sms
    }

    fn execute(&self, event: &ChasingEvent, _ctx: &ActionContext<'_>) -> ActionResult {
        send_notice(
            self.notifier.as_ref(),
            ChaseAction::Sms,
            event.customer.phone.as_deref(),
            "customer has no phone number",
            event,
        )
    }
}

pub struct MailAction {
    notifier: Arc<dyn Notifier>,
}

impl MailAction {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

impl ChasingAction for MailAction {
    fn action(&self) -> ChaseAction {
        ChaseAction::Mail
    }

    fn execute(&self, event: &ChasingEvent, _ctx: &ActionContext<'_>) -> ActionResult {
        send_notice(
            self.notifier.as_ref(),
            ChaseAction::Mail,
            event.customer.address.as_deref(),
            "customer has no mailing address",
            event,
        )
    }
}

// ── Task-creating actions ───────────────────────────────────────

fn create_task(event: &ChasingEvent, ctx: &ActionContext<'_>, name: String, action: &str) -> ActionResult {
    let task = Task {
        id: None,
        tenant_id: event.customer.tenant_id,
        customer_id: event.customer.id,
        chase_step_id: Some(event.step.id),
        name,
        action: action.to_string(),
        user_id: event.step.assigned_user_id,
        due_date: ctx.now,
        complete: false,
    };
    let created: ChasingResult<i64> = ctx.store.insert_task(&task);
    match created {
        Ok(task_id) => ActionResult::success(format!("created {action} task {task_id}")),
        Err(e) => ActionResult::failure(format!("could not create {action} task: {e}")),
    }
}

/// Queues a call to the customer for a collector.
#[derive(Debug, Default)]
pub struct PhoneAction;

impl ChasingAction for PhoneAction {
    fn action(&self) -> ChaseAction {
        ChaseAction::Phone
    }

    fn execute(&self, event: &ChasingEvent, ctx: &ActionContext<'_>) -> ActionResult {
        create_task(event, ctx, format!("Call {}", event.customer.name), "phone")
    }
}

/// Hands the account to a person for review.
#[derive(Debug, Default)]
pub struct EscalateAction;

impl ChasingAction for EscalateAction {
    fn action(&self) -> ChaseAction {
        ChaseAction::Escalate
    }

    fn execute(&self, event: &ChasingEvent, ctx: &ActionContext<'_>) -> ActionResult {
        create_task(
            event,
            ctx,
            format!("Review account of {} ({})", event.customer.name, event.balance),
            "review",
        )
    }
}

// ── Collection ──────────────────────────────────────────────────

/// Action lookup table keyed by step action.
#[derive(Default)]
pub struct ActionCollection {
    actions: HashMap<ChaseAction, Box<dyn ChasingAction>>,
}

impl ActionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// All five actions, notices delivered through `notifier`.
    pub fn standard(notifier: Arc<dyn Notifier>) -> Self {
        let mut collection = Self::new();
        collection.register(Box::new(MailAction::new(notifier.clone())));
        collection.register(Box::new(EmailAction::new(notifier.clone())));
        collection.register(Box::new(EscalateAction));
        collection.register(Box::new(PhoneAction));
        collection.register(Box::new(SmsAction::new(notifier)));
        collection
    }

    /// Register an action, replacing any previous one of the same kind.
    pub fn register(&mut self, action: Box<dyn ChasingAction>) {
        self.actions.insert(action.action(), action);
    }

    pub fn get(&self, action: ChaseAction) -> Option<&dyn ChasingAction> {
        self.actions.get(&action).map(|a| a.as_ref())
    }

    pub fn limit_once_per_run(&self, action: ChaseAction) -> bool {
        self.get(action).is_some_and(|a| a.limit_once_per_run())
    }

    pub fn execute(&self, event: &ChasingEvent, ctx: &ActionContext<'_>) -> ActionResult {
        match self.get(event.step.action) {
            Some(action) => action.execute(event, ctx),
            None => ActionResult::failure(format!(
                "no action registered for '{}'",
                event.step.action
            )),
        }
    }
}
