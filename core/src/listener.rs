//! Invoice lifecycle subscribers and the bus that drives them.
//!
//! RULE: Subscribers are injected once at startup. The bus holds no
//! global state; registering the same subscriber name twice is a no-op.
//!
//! Hook order for one change, as published by the billing core:
//!   update → PreUpdate, write, PostUpdate
//!   delete → delete, PostDelete
//!
//! An update that fails before PostUpdate is reported to every subscriber
//! through `on_update_aborted`.

use crate::{
    balance::ChasingBalanceGenerator,
    clock::Clock,
    error::{ChasingError, ChasingResult},
    event::InvoiceEvent,
    model::{Customer, Invoice},
    store::ChasingStore,
    types::{InvoiceId, Timestamp},
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// The contract every invoice subscriber fulfills.
pub trait InvoiceSubscriber: Send + Sync {
    /// Unique stable name, used to keep registration idempotent.
    fn name(&self) -> &str;

    fn on_pre_update(&self, _store: &ChasingStore, _old: &Invoice, _new: &Invoice) -> ChasingResult<()> {
        Ok(())
    }

    fn on_post_update(&self, _store: &ChasingStore, _old: &Invoice, _new: &Invoice) -> ChasingResult<()> {
        Ok(())
    }

    fn on_post_delete(&self, _store: &ChasingStore, _invoice: &Invoice) -> ChasingResult<()> {
        Ok(())
    }

    /// The update announced by PreUpdate was not written; drop any state
    /// kept for it.
    fn on_update_aborted(&self, _invoice: &Invoice) {}
}

#[derive(Default)]
pub struct InvoiceEventBus {
    subscribers: Vec<Arc<dyn InvoiceSubscriber>>,
}

impl InvoiceEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a subscriber with the same name is already registered.
    pub fn subscribe(&mut self, subscriber: Arc<dyn InvoiceSubscriber>) -> bool {
        if self.is_subscribed(subscriber.name()) {
            return false;
        }
        self.subscribers.push(subscriber);
        true
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscribers.iter().any(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver one event to every subscriber, in registration order.
    pub fn publish(&self, store: &ChasingStore, event: InvoiceEvent<'_>) -> ChasingResult<()> {
        for subscriber in &self.subscribers {
            match event {
                InvoiceEvent::PreUpdate { old, new } => subscriber.on_pre_update(store, old, new)?,
                InvoiceEvent::PostUpdate { old, new } => subscriber.on_post_update(store, old, new)?,
                InvoiceEvent::PostDelete { invoice } => subscriber.on_post_delete(store, invoice)?,
            }
        }
        Ok(())
    }

    /// Persist an invoice change with the pre/post hooks around it.
    pub fn update_invoice(&self, store: &ChasingStore, new: &Invoice) -> ChasingResult<()> {
        let old = store.get_invoice(new.id)?.ok_or(ChasingError::NotFound {
            entity: "invoice",
            id: new.id,
        })?;
        let written = self
            .publish(store, InvoiceEvent::PreUpdate { old: &old, new })
            .and_then(|()| store.update_invoice(new));
        if let Err(e) = written {
            for subscriber in &self.subscribers {
                subscriber.on_update_aborted(new);
            }
            return Err(e);
        }
        self.publish(store, InvoiceEvent::PostUpdate { old: &old, new })
    }

    /// Delete an invoice, then notify subscribers.
    pub fn delete_invoice(&self, store: &ChasingStore, invoice_id: InvoiceId) -> ChasingResult<()> {
        let invoice = store.get_invoice(invoice_id)?.ok_or(ChasingError::NotFound {
            entity: "invoice",
            id: invoice_id,
        })?;
        store.delete_invoice(invoice_id)?;
        self.publish(store, InvoiceEvent::PostDelete { invoice: &invoice })
    }
}

/// Restarts a customer's cadence once their account is settled, and
/// closes the chasing statistics of invoices that got paid.
pub struct ChasingInvoiceListener {
    clock: Arc<dyn Clock>,
    // Invoices whose pre-update looked like a payment; consumed by post-update.
    flagged: Mutex<HashSet<InvoiceId>>,
}

impl ChasingInvoiceListener {
    pub const NAME: &'static str = "chasing_invoice_listener";

    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            flagged: Mutex::new(HashSet::new()),
        }
    }

    fn flagged(&self) -> std::sync::MutexGuard<'_, HashSet<InvoiceId>> {
        self.flagged.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_flagged(&self, invoice_id: InvoiceId) -> bool {
        self.flagged().contains(&invoice_id)
    }

    fn chased_customer(store: &ChasingStore, invoice: &Invoice) -> ChasingResult<Option<Customer>> {
        Ok(store
            .get_customer(invoice.customer_id)?
            .filter(|c| c.chasing_cadence_id.is_some()))
    }

    /// Restart the cadence when the customer's aggregate balance is zero.
    /// Returns whether a reset happened.
    fn reset_if_settled(&self, store: &ChasingStore, customer: &Customer, now: Timestamp) -> ChasingResult<bool> {
        let Some(cadence_id) = customer.chasing_cadence_id else {
            return Ok(false);
        };
        let tenant = store.get_tenant(customer.tenant_id)?.ok_or(ChasingError::NotFound {
            entity: "tenant",
            id: customer.tenant_id,
        })?;
        let currency = customer.chasing_currency(&tenant);
        let balance = ChasingBalanceGenerator::new(store).generate(customer, &currency, now)?;
        if !balance.balance.is_zero() {
            return Ok(false);
        }

        let first_step = store.first_step(cadence_id)?.map(|s| s.id);
        let (tasks, history) = store.transaction(|store| {
            if customer.next_chase_step_id != first_step {
                store.update_chase_cursor(customer.id, first_step)?;
            }
            let tasks = store.delete_incomplete_tasks_for_customer(customer.id)?;
            let history = store.delete_completed_steps_for_customer(customer.id)?;
            Ok((tasks, history))
        })?;
        log::info!(
            "cadence={} customer={} listener: account settled, cadence restarted at {:?} ({} task(s), {} step(s) cleared)",
            cadence_id,
            customer.id,
            first_step,
            tasks,
            history
        );
        Ok(true)
    }
}

/// A change that may have settled the invoice.
fn is_payment_transition(old: &Invoice, new: &Invoice) -> bool {
    old.balance != new.balance || (!old.closed && new.closed) || (!old.voided && new.voided)
}

/// Nothing is left to collect on the invoice.
fn is_resolved(invoice: &Invoice) -> bool {
    invoice.balance.is_zero() || invoice.paid || invoice.closed || invoice.voided
}

impl InvoiceSubscriber for ChasingInvoiceListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_pre_update(&self, store: &ChasingStore, old: &Invoice, new: &Invoice) -> ChasingResult<()> {
        if Self::chased_customer(store, new)?.is_none() {
            return Ok(());
        }
        if is_payment_transition(old, new) {
            self.flagged().insert(new.id);
        }
        Ok(())
    }

    fn on_post_update(&self, store: &ChasingStore, _old: &Invoice, new: &Invoice) -> ChasingResult<()> {
        if !self.flagged().remove(&new.id) {
            return Ok(());
        }
        let now = self.clock.now();
        if let Some(customer) = Self::chased_customer(store, new)? {
            self.reset_if_settled(store, &customer, now)?;
        }
        if !is_resolved(new) {
            return Ok(());
        }

        let payment_responsible = !new.voided && (!new.closed || new.paid);
        let closed = store.close_open_statistics(new.id, now, payment_responsible)?;
        log::debug!(
            "invoice={} listener: closed {closed} statistic row(s), payment_responsible={payment_responsible}",
            new.id
        );
        Ok(())
    }

    fn on_update_aborted(&self, invoice: &Invoice) {
        self.flagged().remove(&invoice.id);
    }

    fn on_post_delete(&self, store: &ChasingStore, invoice: &Invoice) -> ChasingResult<()> {
        self.flagged().remove(&invoice.id);
        let Some(customer) = Self::chased_customer(store, invoice)? else {
            return Ok(());
        };
        let now = self.clock.now();
        self.reset_if_settled(store, &customer, now)?;
        let closed = store.close_open_statistics(invoice.id, now, false)?;
        log::debug!("invoice={} listener: deleted, closed {closed} statistic row(s)", invoice.id);
        Ok(())
    }
}
