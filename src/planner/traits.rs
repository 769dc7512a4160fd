//! Contracts of the external collaborators the planner consumes.
//!
//! The planner owns none of these: the program catalogue and the rule store
//! are databases elsewhere in the appliance, and the notifier is the IPC bus
//! observers listen on. Implementations decide their own retry and timeout
//! policy; the planner only logs or surfaces their failures.

use thiserror::Error;

use crate::program::Program;
use crate::query::SearchOption;
use crate::rule::Rule;
use crate::{ProgramId, RuleId};

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CollabError(String);

impl CollabError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The catalogue of broadcast programs known to the system.
pub trait Catalogue: Send + Sync + 'static {
    /// Looks up one program by id. An empty result means the program has
    /// left the catalogue.
    fn find_by_id(&self, id: ProgramId, with_extended: bool)
        -> Result<Vec<Program>, CollabError>;

    /// Returns every program matching the search options.
    fn find_by_rule(&self, query: &SearchOption) -> Result<Vec<Program>, CollabError>;
}

/// The store of user-defined matching rules.
pub trait RuleStore: Send + Sync + 'static {
    fn find_all(&self) -> Result<Vec<Rule>, CollabError>;

    /// Zero or one element in practice.
    fn find_by_id(&self, id: RuleId) -> Result<Vec<Rule>, CollabError>;
}

/// The IPC bus used to tell observers the schedule changed.
pub trait Notifier: Send + Sync + 'static {
    /// Fire-and-forget signal, no payload; observers re-read the schedule
    /// through the public queries.
    fn notify_observers(&self);
}
