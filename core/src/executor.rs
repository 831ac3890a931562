//! Plan execution: run each due step's action, then record the outcome.
//!
//! Per event:
//!   1. Dispatch to the action (outside any transaction)
//!   2. One transaction: audit row + cursor move (+ statistics rows on success)
//!   3. Metric tagged by chase level and action
//!
//! Statistics for the whole batch are written in a single flush at the end.
//! The flush also runs when the batch stops on an error, so every committed
//! event keeps its statistics. A failed action still moves the cursor; each
//! step is tried once.

use crate::{
    action::{ActionCollection, ActionContext},
    clock::Clock,
    error::ChasingResult,
    event::ChasingEvent,
    metrics::{MetricsSink, FAILED_CHASING_ACTION, SUCCESSFUL_CHASING_ACTION},
    model::{ChasingStatistic, CompletedChasingStep, Tenant},
    store::ChasingStore,
    types::InvoiceId,
};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub events: usize,
    pub successes: usize,
    pub failures: usize,
    pub statistics_written: usize,
}

impl ExecutionSummary {
    pub fn merge(&mut self, other: ExecutionSummary) {
        self.events += other.events;
        self.successes += other.successes;
        self.failures += other.failures;
        self.statistics_written += other.statistics_written;
    }
}

pub struct CustomerChasingPlanExecutor<'a> {
    store: &'a ChasingStore,
    actions: &'a ActionCollection,
    metrics: &'a dyn MetricsSink,
    clock: &'a dyn Clock,
    chase_level: String,
}

impl<'a> CustomerChasingPlanExecutor<'a> {
    pub fn new(
        store: &'a ChasingStore,
        actions: &'a ActionCollection,
        metrics: &'a dyn MetricsSink,
        clock: &'a dyn Clock,
        chase_level: &str,
    ) -> Self {
        Self {
            store,
            actions,
            metrics,
            clock,
            chase_level: chase_level.to_string(),
        }
    }

    /// Execute a stream of events. The first error stops the batch;
    /// events already committed stay committed.
    pub fn execute<I>(&self, tenant: &Tenant, events: I) -> ChasingResult<ExecutionSummary>
    where
        I: IntoIterator<Item = ChasingResult<ChasingEvent>>,
    {
        let mut summary = ExecutionSummary::default();
        let mut statistics: Vec<ChasingStatistic> = Vec::new();
        let outcome = self.execute_events(tenant, events, &mut summary, &mut statistics);

        let flushed = self.store.mass_upsert_statistics(&statistics);
        if let Err(e) = outcome {
            match flushed {
                Ok(n) => log::warn!(
                    "tenant={} executor: batch stopped after {} event(s), flushed {n} statistic row(s): {e}",
                    tenant.id,
                    summary.events
                ),
                Err(flush_err) => log::error!(
                    "tenant={} executor: batch stopped ({e}), {} statistic row(s) lost: {flush_err}",
                    tenant.id,
                    statistics.len()
                ),
            }
            return Err(e);
        }

        summary.statistics_written = flushed?;
        log::debug!(
            "tenant={} executor: flushed {} statistic row(s)",
            tenant.id,
            summary.statistics_written
        );
        Ok(summary)
    }

    fn execute_events<I>(
        &self,
        tenant: &Tenant,
        events: I,
        summary: &mut ExecutionSummary,
        statistics: &mut Vec<ChasingStatistic>,
    ) -> ChasingResult<()>
    where
        I: IntoIterator<Item = ChasingResult<ChasingEvent>>,
    {
        // Attempts handed out in this batch, not yet flushed.
        let mut batch_attempts: HashMap<InvoiceId, i64> = HashMap::new();

        for event in events {
            let event = event?;
            let now = self.clock.now();
            let ctx = ActionContext {
                store: self.store,
                now,
            };
            let result = self.actions.execute(&event, &ctx);

            let new_stats = self.store.transaction(|store| {
                store.insert_completed_step(&CompletedChasingStep {
                    id: None,
                    tenant_id: tenant.id,
                    customer_id: event.customer.id,
                    cadence_id: event.cadence_id,
                    chase_step_id: event.step.id,
                    successful: result.successful,
                    message: result.message.clone(),
                    timestamp: now,
                })?;
                store.update_chase_cursor(event.customer.id, event.next_step.as_ref().map(|s| s.id))?;

                let mut rows = Vec::new();
                if result.successful {
                    for invoice in &event.invoices {
                        let persisted = store.max_statistic_attempts(invoice.id)?;
                        let pending = batch_attempts.get(&invoice.id).copied().unwrap_or(0);
                        rows.push(ChasingStatistic {
                            tenant_id: tenant.id,
                            customer_id: event.customer.id,
                            cadence_id: event.cadence_id,
                            chase_step_id: event.step.id,
                            invoice_id: invoice.id,
                            attempts: 1 + persisted.max(pending),
                            channel: event.step.action.channel().to_string(),
                            date: now,
                            paid: None,
                            payment_responsible: None,
                        });
                    }
                }
                Ok(rows)
            })?;

            for row in &new_stats {
                batch_attempts.insert(row.invoice_id, row.attempts);
            }
            statistics.extend(new_stats);

            let tags = [
                ("chase_level", self.chase_level.clone()),
                ("action", event.step.action.as_str().to_string()),
            ];
            summary.events += 1;
            if result.successful {
                summary.successes += 1;
                self.metrics.increment(SUCCESSFUL_CHASING_ACTION, 1, &tags);
                log::info!(
                    "cadence={} customer={} executor: {} step {} done: {}",
                    event.cadence_id,
                    event.customer.id,
                    event.step.action,
                    event.step.id,
                    result.message
                );
            } else {
                summary.failures += 1;
                self.metrics.increment(FAILED_CHASING_ACTION, 1, &tags);
                log::warn!(
                    "cadence={} customer={} executor: {} step {} failed: {}",
                    event.cadence_id,
                    event.customer.id,
                    event.step.action,
                    event.step.id,
                    result.message
                );
            }
        }
        Ok(())
    }
}
