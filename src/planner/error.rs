use thiserror::Error;

use super::traits::CollabError;
use crate::store::StoreError;
use crate::ProgramId;

/// Failures surfaced by the planner façade.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Another mutating operation holds the single-writer guard. State is
    /// untouched; the caller should retry.
    #[error("another planning operation is already running")]
    AlreadyRunning,

    #[error("program {0} not found in the catalogue")]
    ProgramNotFound(ProgramId),

    #[error("program {0} is already reserved")]
    AlreadyReserved(ProgramId),

    /// No tuner could record the program at its airtime.
    #[error("no tuner can record program {0}")]
    Conflict(ProgramId),

    #[error("invalid encode option: {0}")]
    InvalidEncodeOption(String),

    /// A collaborator failed while serving a single-item request.
    #[error(transparent)]
    Collaborator(#[from] CollabError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
