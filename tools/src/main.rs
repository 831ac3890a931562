//! chase-runner: headless chasing batch runner, invoked by a scheduler.
//!
//! Usage:
//!   chase-runner --db chasing.db --tenant 1
//!   chase-runner --config chasing.json --tenant 1 --cadence 4
//!   chase-runner --db chasing.db --tenant 1 --assign

use anyhow::{Context, Result};
use chasing_core::{
    action::{ActionCollection, LogNotifier},
    clock::{Clock, SystemClock},
    config::ChasingConfig,
    executor::ExecutionSummary,
    metrics::MetricsCrateSink,
    runner::ChasingRunner,
    store::ChasingStore,
};
use std::env;
use std::sync::Arc;

#[derive(serde::Serialize)]
struct RunReport<'a> {
    tenant_id: i64,
    cadence_id: Option<i64>,
    started_at: String,
    assigned: Option<usize>,
    summary: &'a ExecutionSummary,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let tenant_id = parse_arg(&args, "--tenant", 0i64);
    let cadence_id = parse_arg(&args, "--cadence", 0i64);
    let assign = args.iter().any(|a| a == "--assign");
    let json = args.iter().any(|a| a == "--json");
    let config_path = flag_value(&args, "--config");
    let db_override = flag_value(&args, "--db");

    if tenant_id <= 0 {
        anyhow::bail!("--tenant <id> is required");
    }

    let mut config = match config_path {
        Some(path) => ChasingConfig::load(path)?,
        None => ChasingConfig::default(),
    };
    if let Some(db) = db_override {
        config.database_path = db.to_string();
    }
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let started_at = chrono::DateTime::from_timestamp(clock.now(), 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    if !json {
        println!("chase-runner");
        println!("  db:        {}", config.database_path);
        println!("  tenant:    {tenant_id}");
        if cadence_id > 0 {
            println!("  cadence:   {cadence_id}");
        }
        println!("  namespace: {}", config.lock_namespace);
        println!();
    }

    let store = ChasingStore::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path))?;
    store.migrate()?;

    let actions = ActionCollection::standard(Arc::new(LogNotifier));
    let runner = ChasingRunner::new(&store, config, clock, actions, Arc::new(MetricsCrateSink));
    let tenant = runner.load_tenant(tenant_id)?;

    let assigned = if assign {
        Some(runner.assign_cadences(&tenant)?)
    } else {
        None
    };

    let summary = if cadence_id > 0 {
        let cadence = runner.load_cadence(&tenant, cadence_id)?;
        runner.run_cadence(&tenant, &cadence)?
    } else {
        runner.run_tenant(&tenant)?
    };

    let report = RunReport {
        tenant_id,
        cadence_id: (cadence_id > 0).then_some(cadence_id),
        started_at,
        assigned,
        summary: &summary,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    log::info!("tenant={tenant_id} chase-runner: done");
    Ok(())
}

fn print_summary(report: &RunReport<'_>) {
    println!("=== RUN SUMMARY ===");
    println!("  started:    {}", report.started_at);
    if let Some(n) = report.assigned {
        println!("  assigned:   {n}");
    }
    println!("  events:     {}", report.summary.events);
    println!("  successes:  {}", report.summary.successes);
    println!("  failures:   {}", report.summary.failures);
    println!("  statistics: {}", report.summary.statistics_written);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn flags_are_read_by_name() {
        let argv = args("chase-runner --db /tmp/c.db --tenant 7 --cadence 3 --assign");
        assert_eq!(parse_arg(&argv, "--tenant", 0i64), 7);
        assert_eq!(parse_arg(&argv, "--cadence", 0i64), 3);
        assert_eq!(flag_value(&argv, "--db"), Some("/tmp/c.db"));
        assert_eq!(flag_value(&argv, "--config"), None);
    }

    #[test]
    fn unparseable_or_missing_values_fall_back() {
        let argv = args("chase-runner --tenant seven --cadence");
        assert_eq!(parse_arg(&argv, "--tenant", 0i64), 0);
        assert_eq!(parse_arg(&argv, "--cadence", 0i64), 0);
        assert_eq!(flag_value(&argv, "--cadence"), None);
    }
}
