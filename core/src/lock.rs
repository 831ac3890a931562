//! Exclusive per-cadence run locks.
//!
//! A run holds `{namespace}:chasing_cadence:{tenant}:{cadence}` for its
//! whole plan + execute pass. Leases expire so a crashed run cannot
//! block the cadence forever. The guard releases on drop.

use crate::{
    clock::Clock,
    error::{ChasingError, ChasingResult},
    store::ChasingStore,
    types::{CadenceId, TenantId},
};
use uuid::Uuid;

pub fn lock_name(namespace: &str, tenant_id: TenantId, cadence_id: CadenceId) -> String {
    format!("{namespace}:chasing_cadence:{tenant_id}:{cadence_id}")
}

pub trait LockService {
    /// Take `name` for `ttl_secs`. Returns the owner token, or `None` when held.
    fn try_acquire(&self, name: &str, ttl_secs: i64) -> ChasingResult<Option<String>>;

    /// Give up `name` if `token` still owns it.
    fn release(&self, name: &str, token: &str) -> ChasingResult<bool>;
}

/// Locks kept in the `chasing_lock` table.
pub struct SqliteLockService<'a> {
    store: &'a ChasingStore,
    clock: &'a dyn Clock,
}

impl<'a> SqliteLockService<'a> {
    pub fn new(store: &'a ChasingStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }
}

impl LockService for SqliteLockService<'_> {
    fn try_acquire(&self, name: &str, ttl_secs: i64) -> ChasingResult<Option<String>> {
        let token = Uuid::new_v4().to_string();
        let now = self.clock.now();
        if self.store.try_acquire_lock(name, &token, now, now + ttl_secs)? {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    fn release(&self, name: &str, token: &str) -> ChasingResult<bool> {
        self.store.release_lock(name, token)
    }
}

/// Held lock on one cadence. Released explicitly or on drop.
pub struct CadenceLock<'a> {
    service: &'a dyn LockService,
    name: String,
    token: String,
    released: bool,
}

impl<'a> CadenceLock<'a> {
    pub fn acquire(
        service: &'a dyn LockService,
        namespace: &str,
        tenant_id: TenantId,
        cadence_id: CadenceId,
        ttl_secs: i64,
    ) -> ChasingResult<Self> {
        let name = lock_name(namespace, tenant_id, cadence_id);
        match service.try_acquire(&name, ttl_secs)? {
            Some(token) => {
                log::debug!("lock={name} acquired");
                Ok(Self {
                    service,
                    name,
                    token,
                    released: false,
                })
            }
            None => Err(ChasingError::LockUnavailable { name }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn release(mut self) -> ChasingResult<bool> {
        self.released = true;
        self.service.release(&self.name, &self.token)
    }
}

impl Drop for CadenceLock<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.service.release(&self.name, &self.token) {
            Ok(true) => log::debug!("lock={} released", self.name),
            Ok(false) => log::warn!("lock={} was no longer ours at release", self.name),
            Err(e) => log::error!("lock={} release failed: {e}", self.name),
        }
    }
}
