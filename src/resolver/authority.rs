//! Authority order: the deterministic priority used to resolve tuner
//! contention.

use std::collections::HashSet;

use crate::reservation::{Origin, Reservation};
use crate::{ProgramId, UnixMillis};

/// Total order over candidates: manual before rule, smaller id first within
/// each class, program id as the final tie-break. The tail component makes
/// the order total even between two matches of the same rule, so identical
/// inputs always dedup and allocate identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) struct AuthorityKey {
    class: u8,
    id: UnixMillis,
    program_id: ProgramId,
}

impl AuthorityKey {
    pub fn of(reservation: &Reservation) -> Self {
        let (class, id) = match reservation.origin {
            Origin::Manual { manual_id } => (0, manual_id),
            Origin::Rule { rule_id, .. } => (1, rule_id),
        };
        Self {
            class,
            id,
            program_id: reservation.program.id,
        }
    }
}

/// Sorts candidates into authority order and keeps the first occurrence of
/// each program id. Earlier position = higher allocation priority.
pub(super) fn dedup_by_authority(mut candidates: Vec<Reservation>) -> Vec<Reservation> {
    candidates.sort_by_key(AuthorityKey::of);
    let mut seen = HashSet::new();
    candidates.retain(|r| seen.insert(r.program.id));
    candidates
}
