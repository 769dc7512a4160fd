//! Sweep-line conflict resolver.
//!
//! Turns a multiset of candidate reservations and the tuner inventory into
//! the tri-partitioned schedule: recorded, conflicting, skipped. The
//! algorithm runs in four stages:
//!
//! 1. **Deduplicate in authority order.** Candidates are sorted manual before
//!    rule, smaller id first, program id as the final tie-break, and the
//!    first occurrence of each program id survives. A program's position in
//!    the surviving array is its allocation priority.
//! 2. **Build sweep events.** One START and one END marker per non-skipped
//!    survivor, ordered by time with END before START at equal instants, so
//!    back-to-back programs never collide on a tuner.
//! 3. **Sweep.** Walk the events maintaining the set of candidates currently
//!    on air. After every event, clear all tuner slots and re-place the whole
//!    active set in authority order, first-fit over tuners in index order. A
//!    candidate no tuner accepts is marked conflicting and stays marked for
//!    the rest of the resolution, even if a later event would leave room: a
//!    recording that already lost part of its airtime is not recoverable.
//! 4. **Emit** the survivors in start order with their final flags.
//!
//! Re-solving the whole active set on every event removes any need for
//! displacement bookkeeping: a higher-authority candidate is re-placed first
//! on every step, so it can never lose its tuner to a later-arriving
//! lower-authority one. The active set is bounded by tuner count times
//! overlap factor, so the repeated reassignment stays cheap.

mod authority;
mod event;


use crate::reservation::Reservation;
use crate::tuner::{TunerDevice, TunerSlot};

use authority::dedup_by_authority;
use event::{EventKind, SweepEvent};

/// Resolves candidates against the tuner inventory.
///
/// Duplicate program ids (several rules matching one program, or manual and
/// rule for the same program) collapse to the highest-authority occurrence.
/// Skipped candidates are retained in the output but occupy no tuner and
/// cannot conflict. Incoming `is_conflict` flags are ignored: the flag is
/// derived output, never input.
pub fn resolve(candidates: Vec<Reservation>, tuners: &[TunerDevice]) -> Vec<Reservation> {
    let mut survivors = dedup_by_authority(candidates);
    for reservation in &mut survivors {
        reservation.is_conflict = false;
    }

    let mut events = Vec::with_capacity(survivors.len() * 2);
    for (rank, reservation) in survivors.iter().enumerate() {
        if reservation.is_skip {
            continue;
        }
        events.push(SweepEvent::start(reservation.program.start_at, rank));
        events.push(SweepEvent::end(reservation.program.end_at, rank));
    }
    events.sort_unstable();

    let mut slots: Vec<TunerSlot> = tuners.iter().cloned().map(TunerSlot::new).collect();
    let mut on_air: Vec<usize> = Vec::new();
    let mut conflicted = vec![false; survivors.len()];

    for event in events {
        match event.kind {
            EventKind::Start => {
                on_air.push(event.candidate);
                // Candidate rank doubles as authority order.
                on_air.sort_unstable();
            }
            EventKind::End => on_air.retain(|&rank| rank != event.candidate),
        }

        for slot in &mut slots {
            slot.clear();
        }
        for &rank in &on_air {
            let placed = slots
                .iter_mut()
                .any(|slot| slot.try_add(&survivors[rank].program));
            if !placed {
                conflicted[rank] = true;
            }
        }
    }

    for (rank, reservation) in survivors.iter_mut().enumerate() {
        reservation.is_conflict = conflicted[rank];
    }
    survivors.sort_by_key(|r| (r.program.start_at, r.program.id));
    survivors
}
