//! Scenario validation and progression engine for the support-agent
//! training dojo.
//!
//! Leaves first: `tenure` → `guard` → `grader` → `ledger`, orchestrated by
//! `session`.

pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod generator;
pub mod grader;
pub mod guard;
pub mod ledger;
pub mod rng;
pub mod roster;
pub mod scenario;
pub mod session;
pub mod store;
pub mod tenure;
pub mod types;
