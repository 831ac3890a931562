//! Chasing planner: which cadence steps are due, customer by customer.
//!
//! Design:
//!   - Customers are streamed in keyset pages, never loaded all at once
//!   - Steps are walked latest first; the walk stops right after the
//!     customer's cursor step has been considered
//!   - Balances are recomputed before every step
//!   - A step that is not due yet becomes the resume point carried by
//!     every event yielded after it
//!
//! The plan is an iterator. Nothing is read until the caller pulls.

use crate::{
    action::ActionCollection,
    balance::{ChasingBalance, ChasingBalanceGenerator},
    clock::Clock,
    config::ChasingConfig,
    error::{ChasingError, ChasingResult},
    event::ChasingEvent,
    model::{ChaseAction, ChasingCadence, ChasingCadenceStep, Customer, ScheduleKind, StepSchedule, Tenant},
    money::{Currency, Money},
    store::ChasingStore,
    types::{CustomerId, StepId},
};
use rust_decimal::Decimal;
use std::collections::HashSet;

pub struct CustomerChasingPlanner<'a> {
    store: &'a ChasingStore,
    actions: &'a ActionCollection,
    clock: &'a dyn Clock,
    portal_url: String,
    page_size: usize,
}

impl<'a> CustomerChasingPlanner<'a> {
    pub fn new(
        store: &'a ChasingStore,
        actions: &'a ActionCollection,
        clock: &'a dyn Clock,
        config: &ChasingConfig,
    ) -> Self {
        Self {
            store,
            actions,
            clock,
            portal_url: config.client_portal_url.clone(),
            page_size: config.customer_page_size.max(1),
        }
    }

    /// Lazily plan one run of `cadence`. Steps are loaded here; customers
    /// are fetched page by page as the plan is consumed.
    pub fn plan(&self, tenant: &Tenant, cadence: &ChasingCadence) -> ChasingResult<ChasingPlan<'_>> {
        let mut steps = self.store.cadence_steps(cadence.id)?;
        steps.reverse();
        log::debug!(
            "cadence={} planner: {} step(s), page size {}",
            cadence.id,
            steps.len(),
            self.page_size
        );
        Ok(ChasingPlan {
            planner: self,
            tenant: tenant.clone(),
            cadence: cadence.clone(),
            steps,
            page: Vec::new().into_iter(),
            last_customer_id: 0,
            exhausted: false,
            failed: false,
            current: None,
        })
    }
}

/// Whether `step` is due for a customer with `balance`.
///
/// A malformed schedule is never due. `min_balance` is read in the
/// balance's currency and the boundary is inclusive.
pub fn step_should_run(
    cadence: &ChasingCadence,
    balance: &ChasingBalance,
    step: &ChasingCadenceStep,
) -> bool {
    if balance.balance.is_zero() {
        return false;
    }

    if let Some(min_balance) = cadence.min_balance.filter(|m| *m > Decimal::ZERO) {
        let threshold = Money::new(min_balance, balance.balance.currency().clone());
        if balance.balance.less_than(&threshold).unwrap_or(true) {
            return false;
        }
    }

    let Some(schedule) = StepSchedule::parse(&step.schedule) else {
        return false;
    };
    match schedule.kind {
        ScheduleKind::Age => balance.age >= schedule.threshold,
        ScheduleKind::PastDueAge => {
            balance.is_past_due()
                && balance
                    .past_due_age
                    .is_some_and(|days| days >= schedule.threshold)
        }
    }
}

/// The lazy event stream for one cadence run.
pub struct ChasingPlan<'p> {
    planner: &'p CustomerChasingPlanner<'p>,
    tenant: Tenant,
    cadence: ChasingCadence,
    /// Latest step first.
    steps: Vec<ChasingCadenceStep>,
    page: std::vec::IntoIter<Customer>,
    last_customer_id: CustomerId,
    exhausted: bool,
    failed: bool,
    current: Option<CustomerPass>,
}

impl ChasingPlan<'_> {
    fn next_customer(&mut self) -> ChasingResult<Option<Customer>> {
        if let Some(customer) = self.page.next() {
            self.last_customer_id = customer.id;
            return Ok(Some(customer));
        }
        if self.exhausted {
            return Ok(None);
        }

        let page = self.planner.store.chaseable_customers_page(
            self.cadence.id,
            self.last_customer_id,
            self.planner.page_size,
        )?;
        if page.len() < self.planner.page_size {
            self.exhausted = true;
        }
        self.page = page.into_iter();

        match self.page.next() {
            Some(customer) => {
                self.last_customer_id = customer.id;
                Ok(Some(customer))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

impl Iterator for ChasingPlan<'_> {
    type Item = ChasingResult<ChasingEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(pass) = self.current.as_mut() {
                match pass.next_event(self.planner, &self.cadence, &self.steps) {
                    Ok(Some(event)) => return Some(Ok(event)),
                    Ok(None) => self.current = None,
                    Err(e @ (ChasingError::CurrencyMismatch { .. } | ChasingError::InvalidAmount(_))) => {
                        log::warn!(
                            "cadence={} customer={} planner: skipping customer, balance failed: {e}",
                            self.cadence.id,
                            pass.customer.id
                        );
                        self.current = None;
                    }
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
                continue;
            }

            match self.next_customer() {
                Ok(Some(customer)) => {
                    self.current = Some(CustomerPass::new(customer, &self.tenant));
                }
                Ok(None) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Walk state for one customer within a run.
struct CustomerPass {
    customer: Customer,
    currency: Currency,
    position: usize,
    stop_after: Option<StepId>,
    last_checked: Option<StepId>,
    executed: HashSet<ChaseAction>,
    next_step: Option<ChasingCadenceStep>,
}

impl CustomerPass {
    fn new(customer: Customer, tenant: &Tenant) -> Self {
        Self {
            currency: customer.chasing_currency(tenant),
            stop_after: customer.next_chase_step_id,
            customer,
            position: 0,
            last_checked: None,
            executed: HashSet::new(),
            next_step: None,
        }
    }

    fn next_event(
        &mut self,
        planner: &CustomerChasingPlanner<'_>,
        cadence: &ChasingCadence,
        steps: &[ChasingCadenceStep],
    ) -> ChasingResult<Option<ChasingEvent>> {
        while let Some(step) = steps.get(self.position) {
            // Checked before moving on, so the cursor step itself is still considered.
            if self.last_checked.is_some() && self.last_checked == self.stop_after {
                return Ok(None);
            }
            self.position += 1;
            self.last_checked = Some(step.id);

            if self.executed.contains(&step.action) && planner.actions.limit_once_per_run(step.action) {
                continue;
            }

            let balance = ChasingBalanceGenerator::new(planner.store).generate(
                &self.customer,
                &self.currency,
                planner.clock.now(),
            )?;

            if !step_should_run(cadence, &balance, step) {
                self.next_step = Some(step.clone());
                continue;
            }

            self.executed.insert(step.action);
            log::debug!(
                "cadence={} customer={} planner: step {} ({}) due, resume at {:?}",
                cadence.id,
                self.customer.id,
                step.id,
                step.action,
                self.next_step.as_ref().map(|s| s.id)
            );
            return Ok(Some(ChasingEvent::from_balance(
                cadence.id,
                balance,
                step.clone(),
                self.next_step.clone(),
                &planner.portal_url,
            )));
        }
        Ok(None)
    }
}
