//! Run orchestration: what the scheduler invokes.
//!
//! One cadence run:
//!   1. Take the cadence lock (fail closed: no lock, no events)
//!   2. Plan lazily and execute as the plan is pulled
//!   3. Release the lock, on success or error
//!
//! Cadences of one tenant run one after another. A cadence whose lock is
//! held elsewhere is skipped; the others still run.

use crate::{
    action::ActionCollection,
    assigner::CustomerCadenceAssigner,
    clock::Clock,
    config::ChasingConfig,
    error::{ChasingError, ChasingResult},
    executor::{CustomerChasingPlanExecutor, ExecutionSummary},
    lock::{CadenceLock, SqliteLockService},
    metrics::MetricsSink,
    model::{ChasingCadence, Tenant},
    planner::CustomerChasingPlanner,
    store::ChasingStore,
    types::{CadenceId, TenantId},
};
use std::sync::Arc;

pub struct ChasingRunner<'a> {
    store: &'a ChasingStore,
    config: ChasingConfig,
    clock: Arc<dyn Clock>,
    actions: ActionCollection,
    metrics: Arc<dyn MetricsSink>,
}

impl<'a> ChasingRunner<'a> {
    pub fn new(
        store: &'a ChasingStore,
        config: ChasingConfig,
        clock: Arc<dyn Clock>,
        actions: ActionCollection,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            actions,
            metrics,
        }
    }

    pub fn config(&self) -> &ChasingConfig {
        &self.config
    }

    pub fn load_tenant(&self, tenant_id: TenantId) -> ChasingResult<Tenant> {
        self.store.get_tenant(tenant_id)?.ok_or(ChasingError::NotFound {
            entity: "tenant",
            id: tenant_id,
        })
    }

    pub fn load_cadence(&self, tenant: &Tenant, cadence_id: CadenceId) -> ChasingResult<ChasingCadence> {
        self.store
            .get_cadence(cadence_id)?
            .filter(|c| c.tenant_id == tenant.id)
            .ok_or(ChasingError::NotFound {
                entity: "cadence",
                id: cadence_id,
            })
    }

    /// Plan and execute one cadence under its lock.
    pub fn run_cadence(&self, tenant: &Tenant, cadence: &ChasingCadence) -> ChasingResult<ExecutionSummary> {
        let locks = SqliteLockService::new(self.store, self.clock.as_ref());
        let lock = CadenceLock::acquire(
            &locks,
            &self.config.lock_namespace,
            tenant.id,
            cadence.id,
            self.config.lock_ttl_secs,
        )
        .inspect_err(|e| {
            if matches!(e, ChasingError::LockUnavailable { .. }) {
                log::warn!("tenant={} cadence={} runner: {e}, run aborted", tenant.id, cadence.id);
            }
        })?;

        log::info!(
            "tenant={} cadence={} runner: run started ({})",
            tenant.id,
            cadence.id,
            cadence.name
        );
        let planner =
            CustomerChasingPlanner::new(self.store, &self.actions, self.clock.as_ref(), &self.config);
        let executor = CustomerChasingPlanExecutor::new(
            self.store,
            &self.actions,
            self.metrics.as_ref(),
            self.clock.as_ref(),
            &self.config.chase_level,
        );
        let plan = planner.plan(tenant, cadence)?;
        let summary = executor.execute(tenant, plan)?;

        let lock_name = lock.name().to_string();
        if !lock.release()? {
            log::warn!(
                "tenant={} cadence={} runner: lock {lock_name} expired before the run finished",
                tenant.id,
                cadence.id
            );
        }
        log::info!(
            "tenant={} cadence={} runner: run finished, {} event(s), {} ok, {} failed, {} statistic(s)",
            tenant.id,
            cadence.id,
            summary.events,
            summary.successes,
            summary.failures,
            summary.statistics_written
        );
        Ok(summary)
    }

    /// Run every cadence of the tenant, in id order.
    pub fn run_tenant(&self, tenant: &Tenant) -> ChasingResult<ExecutionSummary> {
        let mut total = ExecutionSummary::default();
        for cadence in self.store.cadences_for_tenant(tenant.id)? {
            match self.run_cadence(tenant, &cadence) {
                Ok(summary) => total.merge(summary),
                Err(ChasingError::LockUnavailable { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Enrol every chaseable customer without a cadence, cursor at the
    /// cadence's first step. Returns how many were enrolled.
    pub fn assign_cadences(&self, tenant: &Tenant) -> ChasingResult<usize> {
        let mut assigner = CustomerCadenceAssigner::new(self.store, &self.config.smart_chasing_feature);
        let page_size = self.config.customer_page_size.max(1);
        let mut after_id = 0;
        let mut assigned = 0;

        loop {
            let page = self
                .store
                .unassigned_customers_page(tenant.id, after_id, page_size)?;
            let Some(last) = page.last() else {
                break;
            };
            after_id = last.id;
            let full_page = page.len() == page_size;

            for customer in &page {
                let Some(cadence) = assigner.assign(tenant, customer)? else {
                    continue;
                };
                let first_step = self.store.first_step(cadence.id)?.map(|s| s.id);
                self.store
                    .assign_cadence(customer.id, Some(cadence.id), first_step)?;
                log::debug!(
                    "tenant={} customer={} runner: assigned cadence {}",
                    tenant.id,
                    customer.id,
                    cadence.id
                );
                assigned += 1;
            }

            if !full_page {
                break;
            }
        }

        log::info!("tenant={} runner: {assigned} customer(s) assigned a cadence", tenant.id);
        Ok(assigned)
    }
}
