use crate::error::{ChasingError, ChasingResult};
use serde::{Deserialize, Serialize};

/// Engine configuration, loaded from a JSON file.
/// In tests, use `ChasingConfig::default_test()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChasingConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Prefix for lock names so two environments sharing one database
    /// never contend for the same cadence.
    #[serde(default = "default_lock_namespace")]
    pub lock_namespace: String,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: i64,
    #[serde(default = "default_client_portal_url")]
    pub client_portal_url: String,
    /// Value of the `chase_level` tag on action metrics.
    #[serde(default = "default_chase_level")]
    pub chase_level: String,
    #[serde(default = "default_customer_page_size")]
    pub customer_page_size: usize,
    /// Tenant feature that enables conditional cadence assignment.
    #[serde(default = "default_smart_chasing_feature")]
    pub smart_chasing_feature: String,
}

fn default_database_path() -> String {
    "chasing.db".into()
}

fn default_lock_namespace() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into())
}

fn default_lock_ttl_secs() -> i64 {
    3600
}

fn default_client_portal_url() -> String {
    "https://billing.localhost".into()
}

fn default_chase_level() -> String {
    "customer".into()
}

fn default_customer_page_size() -> usize {
    500
}

fn default_smart_chasing_feature() -> String {
    "smart_chasing".into()
}

impl Default for ChasingConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            lock_namespace: default_lock_namespace(),
            lock_ttl_secs: default_lock_ttl_secs(),
            client_portal_url: default_client_portal_url(),
            chase_level: default_chase_level(),
            customer_page_size: default_customer_page_size(),
            smart_chasing_feature: default_smart_chasing_feature(),
        }
    }
}

impl ChasingConfig {
    /// Load from a JSON file. Absent keys fall back to their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ChasingConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
        Ok(config)
    }

    /// Reject values no run can work with.
    pub fn validate(&self) -> ChasingResult<()> {
        if self.customer_page_size == 0 {
            return Err(ChasingError::Config("customer_page_size must be positive".into()));
        }
        if self.lock_ttl_secs <= 0 {
            return Err(ChasingError::Config("lock_ttl_secs must be positive".into()));
        }
        if self.lock_namespace.trim().is_empty() {
            return Err(ChasingError::Config("lock_namespace must not be empty".into()));
        }
        Ok(())
    }

    /// Small pages so tests cross page boundaries with a handful of customers.
    pub fn default_test() -> Self {
        Self {
            database_path: ":memory:".into(),
            lock_namespace: "test".into(),
            lock_ttl_secs: 60,
            client_portal_url: "https://portal.test".into(),
            chase_level: "customer".into(),
            customer_page_size: 2,
            smart_chasing_feature: "smart_chasing".into(),
        }
    }
}
