//! teleplan - reservation planner for a television recording appliance.
//!
//! Derives the authoritative recording schedule from manual reservations,
//! rule-matched programs, skip overrides and the available tuner inventory,
//! and keeps it durable across restarts as a single JSON document.

pub mod interval;
pub mod planner;
pub mod program;
pub mod query;
pub mod reservation;
pub mod resolver;
pub mod rule;
pub mod store;
pub mod tuner;

/// Identifier of a broadcast program, assigned by the catalogue.
pub type ProgramId = i64;

/// Identifier of a user-defined matching rule.
pub type RuleId = i64;

/// Milliseconds since the Unix epoch.
pub type UnixMillis = i64;
