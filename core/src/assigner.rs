//! Cadence assignment: which cadence should a customer be enrolled in.
//!
//! Conditional cadences are tried first, in storage order; the first whose
//! condition holds wins. Otherwise the tenant's default cadence applies.
//! The whole feature is gated by the tenant's smart-chasing flag.

use crate::{
    error::ChasingResult,
    expression::Expression,
    model::{AssignmentMode, ChasingCadence, Customer, Tenant},
    store::ChasingStore,
};

pub struct CustomerCadenceAssigner<'a> {
    store: &'a ChasingStore,
    feature_flag: String,
    // Loaded on first use and kept for the life of the assigner.
    conditional: Option<Vec<(ChasingCadence, Option<Expression>)>>,
    default: Option<Option<ChasingCadence>>,
}

impl<'a> CustomerCadenceAssigner<'a> {
    pub fn new(store: &'a ChasingStore, feature_flag: &str) -> Self {
        Self {
            store,
            feature_flag: feature_flag.to_string(),
            conditional: None,
            default: None,
        }
    }

    pub fn assign(
        &mut self,
        tenant: &Tenant,
        customer: &Customer,
    ) -> ChasingResult<Option<ChasingCadence>> {
        if !tenant.has_feature(&self.feature_flag) {
            return Ok(None);
        }

        let attributes = customer.attributes();
        for (cadence, condition) in self.conditional_cadences(tenant)? {
            let Some(condition) = condition else {
                continue;
            };
            match condition.evaluate(&attributes) {
                Ok(true) => return Ok(Some(cadence.clone())),
                Ok(false) => {}
                Err(e) => log::debug!(
                    "cadence={} customer={} assigner: condition error treated as no match: {e}",
                    cadence.id,
                    customer.id
                ),
            }
        }

        self.default_cadence(tenant)
    }

    fn conditional_cadences(
        &mut self,
        tenant: &Tenant,
    ) -> ChasingResult<&[(ChasingCadence, Option<Expression>)]> {
        if self.conditional.is_none() {
            let compiled = self
                .store
                .cadences_by_mode(tenant.id, AssignmentMode::Conditional)?
                .into_iter()
                .map(|cadence| {
                    let condition = cadence
                        .assignment_conditions
                        .as_deref()
                        .and_then(|src| match Expression::compile(src) {
                            Ok(expr) => Some(expr),
                            Err(e) => {
                                log::warn!(
                                    "cadence={} assigner: condition does not compile, never matches: {e}",
                                    cadence.id
                                );
                                None
                            }
                        });
                    (cadence, condition)
                })
                .collect();
            self.conditional = Some(compiled);
        }
        Ok(self.conditional.as_deref().unwrap_or_default())
    }

    fn default_cadence(&mut self, tenant: &Tenant) -> ChasingResult<Option<ChasingCadence>> {
        if let Some(cached) = &self.default {
            return Ok(cached.clone());
        }
        let cadence = self
            .store
            .cadences_by_mode(tenant.id, AssignmentMode::Default)?
            .into_iter()
            .next();
        self.default = Some(cadence.clone());
        Ok(cadence)
    }
}
