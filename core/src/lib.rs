//! chasing-core: automated receivables chasing (dunning).
//!
//! Customers enrolled in a cadence are walked through its steps as their
//! balances age. A run plans the due steps lazily, executes each step's
//! action and records the outcome. Invoice lifecycle hooks restart the
//! cadence once an account is settled.
//!
//! Dependency order (lower modules never import higher ones):
//!   types, error, money, clock, config
//!   model, payment_plan, store
//!   balance, expression, assigner
//!   event, action, metrics
//!   planner, executor, listener, lock
//!   runner

pub mod action;
pub mod assigner;
pub mod balance;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod expression;
pub mod listener;
pub mod lock;
pub mod metrics;
pub mod model;
pub mod money;
pub mod payment_plan;
pub mod planner;
pub mod runner;
pub mod store;
pub mod types;
