//! Planner façade: the public mutation and query surface.
//!
//! One planner instance exists per process. Every mutating operation funnels
//! through a single-writer guard taken with `try_lock`: a caller arriving
//! while another mutation is in flight gets [`PlannerError::AlreadyRunning`]
//! without touching state, and the guard is held across the catalogue calls
//! inside an operation so fetches serialise against each other. Queries never
//! take the guard — the reservation list is swapped in wholesale on commit,
//! so a reader keeps a consistent snapshot for the duration of its call.
//!
//! `cancel` and `unskip` acknowledge fast and trigger the follow-up re-plan
//! on a detached thread; the re-plan runs under the same guard and briefly
//! retries when it loses the race for it.

pub mod error;
pub mod traits;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{info, warn};

use crate::query::{EncodeOption, SearchOption};
use crate::reservation::Reservation;
use crate::resolver::resolve;
use crate::store::ReserveStore;
use crate::tuner::TunerDevice;
use crate::{ProgramId, RuleId, UnixMillis};

pub use error::PlannerError;
pub use traits::{Catalogue, CollabError, Notifier, RuleStore};

/// Retry cadence of a deferred re-plan that lost the writer-guard race.
const REPLAN_RETRY_DELAY: Duration = Duration::from_millis(50);
const REPLAN_RETRY_ATTEMPTS: u32 = 20;

/// Planner configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Path of the persisted reservation document.
    pub reserves_path: PathBuf,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            reserves_path: PathBuf::from("data/reserves.json"),
        }
    }
}

/// The reservation planner.
///
/// Construct it once at process start with handles to the catalogue, the
/// rule store and the IPC notifier, and share it behind an [`Arc`]; the
/// operations that trigger background re-plans take `&Arc<Self>` receivers.
pub struct Planner<C, R, N> {
    catalogue: C,
    rule_store: R,
    notifier: N,
    store: ReserveStore,
    tuners: RwLock<Vec<TunerDevice>>,
    /// Single-writer guard, held for the whole of every mutating operation
    /// including its catalogue calls.
    writer: Mutex<()>,
    last_manual_id: AtomicI64,
}

impl<C, R, N> Planner<C, R, N>
where
    C: Catalogue,
    R: RuleStore,
    N: Notifier,
{
    /// Creates the planner, loading persisted reservations from disk.
    ///
    /// The manual-id generator is seeded from the highest persisted
    /// `manualId`, so a restart can never reissue an id even if the clock
    /// stepped backwards in between.
    pub fn new(
        config: PlannerConfig,
        catalogue: C,
        rule_store: R,
        notifier: N,
    ) -> Result<Self, PlannerError> {
        let store = ReserveStore::open(config.reserves_path)?;
        let seed = store
            .snapshot()
            .iter()
            .filter_map(Reservation::manual_id)
            .max()
            .unwrap_or(0);

        Ok(Self {
            catalogue,
            rule_store,
            notifier,
            store,
            tuners: RwLock::new(Vec::new()),
            writer: Mutex::new(()),
            last_manual_id: AtomicI64::new(seed),
        })
    }

    // ── mutations ────────────────────────────────────────────────────

    /// Replaces the tuner inventory. Does not re-plan by itself; callers
    /// follow up with [`update_all`](Self::update_all) when they want the
    /// new inventory applied.
    pub fn set_tuners(&self, devices: Vec<TunerDevice>) -> Result<(), PlannerError> {
        let _guard = self.writer_guard()?;
        *self.tuners.write().unwrap_or_else(PoisonError::into_inner) = devices;
        Ok(())
    }

    /// Reserves one specific program.
    ///
    /// Fails without touching state (and without writing the document) when
    /// the encode option is malformed, the program is unknown or already
    /// reserved, or no tuner could record it alongside the reservations that
    /// will actually record.
    pub fn add_manual(
        &self,
        program_id: ProgramId,
        encode_option: Option<EncodeOption>,
    ) -> Result<(), PlannerError> {
        let _guard = self.writer_guard()?;

        if let Some(option) = &encode_option {
            option
                .validate()
                .map_err(PlannerError::InvalidEncodeOption)?;
        }

        let program = self
            .catalogue
            .find_by_id(program_id, true)?
            .into_iter()
            .next()
            .ok_or(PlannerError::ProgramNotFound(program_id))?;

        let current = self.store.snapshot();
        if current.iter().any(|r| r.program.id == program_id) {
            return Err(PlannerError::AlreadyReserved(program_id));
        }

        // Trial resolution over the overlap neighbourhood: the newcomer must
        // fit alongside everything that will actually record.
        let mut trial: Vec<Reservation> = current
            .iter()
            .filter(|r| !r.is_skip && !r.is_conflict && r.program.overlaps(&program))
            .cloned()
            .collect();
        let reservation = Reservation::manual(program, self.next_manual_id(), encode_option);
        trial.push(reservation.clone());

        let resolved = resolve(trial, &self.tuners_snapshot());
        let rejected = resolved
            .iter()
            .find(|r| r.program.id == program_id)
            .map_or(true, |r| r.is_conflict);
        if rejected {
            return Err(PlannerError::Conflict(program_id));
        }

        let mut next = current.as_ref().clone();
        next.push(reservation);
        self.persist(next)?;
        self.notifier.notify_observers();
        info!("manual reservation added for program {program_id}");
        Ok(())
    }

    /// Cancels a reservation: a manual reservation is removed, a rule match
    /// is skipped so the override survives later re-plans of the same rule.
    /// Acknowledges once the direct effect is durable and triggers a full
    /// re-plan in the background.
    pub fn cancel(self: &Arc<Self>, program_id: ProgramId) -> Result<(), PlannerError> {
        {
            let _guard = self.writer_guard()?;
            let current = self.store.snapshot();
            let target = current
                .iter()
                .find(|r| r.program.id == program_id)
                .ok_or(PlannerError::ProgramNotFound(program_id))?;

            let next: Vec<Reservation> = if target.is_manual() {
                current
                    .iter()
                    .filter(|r| r.program.id != program_id)
                    .cloned()
                    .collect()
            } else {
                current
                    .iter()
                    .cloned()
                    .map(|mut r| {
                        if r.program.id == program_id {
                            r.is_skip = true;
                            r.is_conflict = false;
                        }
                        r
                    })
                    .collect()
            };
            self.persist(next)?;
            info!("reservation for program {program_id} cancelled");
        }

        self.spawn_replan(None);
        Ok(())
    }

    /// Clears the skip override on a reservation. A rule match is re-planned
    /// against its rule in the background; a manual reservation simply
    /// resumes recording.
    pub fn unskip(self: &Arc<Self>, program_id: ProgramId) -> Result<(), PlannerError> {
        let rule_id = {
            let _guard = self.writer_guard()?;
            let current = self.store.snapshot();
            let target = current
                .iter()
                .find(|r| r.program.id == program_id)
                .ok_or(PlannerError::ProgramNotFound(program_id))?;
            let rule_id = target.rule_id();

            let next: Vec<Reservation> = current
                .iter()
                .cloned()
                .map(|mut r| {
                    if r.program.id == program_id {
                        r.is_skip = false;
                    }
                    r
                })
                .collect();
            self.persist(next)?;
            rule_id
        };

        if let Some(rule_id) = rule_id {
            self.spawn_replan(Some(rule_id));
        }
        Ok(())
    }

    /// Re-derives the whole schedule: manual reservations refreshed from the
    /// catalogue, matches of every enabled rule, skip overrides re-applied,
    /// then resolved against the current tuner inventory.
    ///
    /// Collaborator failures are local: the failing item is skipped with a
    /// warning and the plan proceeds with fewer inputs.
    pub fn update_all(&self) -> Result<(), PlannerError> {
        let _guard = self.writer_guard()?;
        let current = self.store.snapshot();
        let mut candidates: Vec<Reservation> = Vec::new();

        // Manual reservations, refreshed: airtimes may have shifted since
        // the snapshot was captured.
        for reservation in current.iter().filter(|r| r.is_manual()) {
            let id = reservation.program.id;
            match self.catalogue.find_by_id(id, true) {
                Ok(programs) => match programs.into_iter().next() {
                    Some(program) => {
                        let mut refreshed = reservation.clone();
                        refreshed.program = program;
                        candidates.push(refreshed);
                    }
                    None => info!("manual reservation dropped: program {id} left the catalogue"),
                },
                Err(e) => warn!("manual reservation {id} skipped this plan: {e}"),
            }
        }

        // Rule matches.
        match self.rule_store.find_all() {
            Ok(rules) => {
                for rule in rules.iter().filter(|rule| rule.enable) {
                    let query = SearchOption::from(rule);
                    match self.catalogue.find_by_rule(&query) {
                        Ok(programs) => candidates.extend(
                            programs
                                .into_iter()
                                .map(|program| Reservation::from_rule(rule, program)),
                        ),
                        Err(e) => warn!("rule {} skipped this plan: {e}", rule.id),
                    }
                }
            }
            Err(e) => warn!("rule store unavailable, planning manual reservations only: {e}"),
        }

        // Skip overrides survive as long as the same program keeps matching.
        let skipped: HashSet<ProgramId> = current
            .iter()
            .filter(|r| r.is_skip)
            .map(|r| r.program.id)
            .collect();
        for candidate in &mut candidates {
            if skipped.contains(&candidate.program.id) {
                candidate.is_skip = true;
                candidate.is_conflict = false;
            }
        }

        self.commit_plan(candidates)
    }

    /// Re-plans the matches of one rule. Reservations belonging to other
    /// rules and manual reservations pass through untouched (conflict flags
    /// are re-derived for everyone); the rule's own matches are refetched,
    /// with skip overrides carried over by program id. A disabled or deleted
    /// rule simply contributes no matches, which retires its reservations.
    pub fn update_rule(&self, rule_id: RuleId) -> Result<(), PlannerError> {
        let _guard = self.writer_guard()?;
        let current = self.store.snapshot();

        let mut candidates: Vec<Reservation> = current
            .iter()
            .filter(|r| r.rule_id() != Some(rule_id))
            .cloned()
            .collect();

        let skipped: HashSet<ProgramId> = current
            .iter()
            .filter(|r| r.rule_id() == Some(rule_id) && r.is_skip)
            .map(|r| r.program.id)
            .collect();

        match self.rule_store.find_by_id(rule_id) {
            Ok(rules) => {
                if let Some(rule) = rules.into_iter().find(|rule| rule.enable) {
                    let query = SearchOption::from(&rule);
                    match self.catalogue.find_by_rule(&query) {
                        Ok(programs) => {
                            for program in programs {
                                let mut candidate = Reservation::from_rule(&rule, program);
                                if skipped.contains(&candidate.program.id) {
                                    candidate.is_skip = true;
                                }
                                candidates.push(candidate);
                            }
                        }
                        Err(e) => warn!("rule {rule_id} matches unavailable, keeping none: {e}"),
                    }
                }
            }
            Err(e) => warn!("rule {rule_id} unavailable, keeping none: {e}"),
        }

        self.commit_plan(candidates)
    }

    /// Evicts reservations whose airtime already ended, and persists the
    /// eviction.
    pub fn clean(&self) -> Result<(), PlannerError> {
        let _guard = self.writer_guard()?;
        let now = now_ms();
        let current = self.store.snapshot();

        let next: Vec<Reservation> = current
            .iter()
            .filter(|r| r.program.end_at >= now)
            .cloned()
            .collect();
        let evicted = current.len() - next.len();
        if evicted > 0 {
            info!("{evicted} finished reservations evicted");
        }
        self.persist(next)
    }

    // ── queries (guard-free; see module docs) ────────────────────────

    /// Every reservation in start order.
    pub fn all(&self, limit: Option<usize>, offset: usize) -> (Vec<Reservation>, usize) {
        self.store.all(limit, offset)
    }

    /// Reservations that will actually record.
    pub fn plain(&self, limit: Option<usize>, offset: usize) -> (Vec<Reservation>, usize) {
        self.store.plain(limit, offset)
    }

    pub fn conflicts(&self, limit: Option<usize>, offset: usize) -> (Vec<Reservation>, usize) {
        self.store.conflicts(limit, offset)
    }

    pub fn skips(&self, limit: Option<usize>, offset: usize) -> (Vec<Reservation>, usize) {
        self.store.skips(limit, offset)
    }

    pub fn by_program_id(&self, id: ProgramId) -> Option<Reservation> {
        self.store.by_program_id(id)
    }

    // ── internals ────────────────────────────────────────────────────

    fn writer_guard(&self) -> Result<MutexGuard<'_, ()>, PlannerError> {
        match self.writer.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(PlannerError::AlreadyRunning),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }

    /// Shared tail of every re-plan: resolve, commit, persist, notify, log
    /// conflicts.
    fn commit_plan(&self, candidates: Vec<Reservation>) -> Result<(), PlannerError> {
        let resolved = resolve(candidates, &self.tuners_snapshot());
        let conflicts: Vec<ProgramId> = resolved
            .iter()
            .filter(|r| r.is_conflict)
            .map(|r| r.program.id)
            .collect();
        let total = resolved.len();

        self.persist(resolved)?;
        self.notifier.notify_observers();

        info!(
            "schedule re-planned: {total} reservations, {} conflicts",
            conflicts.len()
        );
        for id in conflicts {
            warn!("reservation for program {id} conflicts: no tuner free at its airtime");
        }
        Ok(())
    }

    /// Commits the new list and makes it durable.
    fn persist(&self, next: Vec<Reservation>) -> Result<(), PlannerError> {
        self.store.replace(next);
        self.store.save()?;
        Ok(())
    }

    /// Triggers `update_rule` (or `update_all` without a rule id) on a
    /// detached thread. The trigger retries briefly when the guard is busy;
    /// if it stays busy the attempt is logged and abandoned — the next
    /// trigger or periodic update converges the schedule.
    fn spawn_replan(self: &Arc<Self>, rule_id: Option<RuleId>) {
        let planner = Arc::clone(self);
        thread::spawn(move || {
            for _ in 0..REPLAN_RETRY_ATTEMPTS {
                let outcome = match rule_id {
                    Some(rule_id) => planner.update_rule(rule_id),
                    None => planner.update_all(),
                };
                match outcome {
                    Ok(()) => return,
                    Err(PlannerError::AlreadyRunning) => thread::sleep(REPLAN_RETRY_DELAY),
                    Err(e) => {
                        warn!("deferred re-plan failed: {e}");
                        return;
                    }
                }
            }
            warn!("deferred re-plan gave up: planner stayed busy");
        });
    }

    fn tuners_snapshot(&self) -> Vec<TunerDevice> {
        self.tuners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Next manual id: wall-clock epoch-ms, bumped past the last issued id
    /// so rapid successive calls within one millisecond stay strictly
    /// increasing. Only called under the writer guard.
    fn next_manual_id(&self) -> UnixMillis {
        let next = now_ms().max(self.last_manual_id.load(Ordering::Acquire) + 1);
        self.last_manual_id.store(next, Ordering::Release);
        next
    }
}

/// Current wall clock in epoch-milliseconds.
fn now_ms() -> UnixMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as UnixMillis)
        .unwrap_or(0)
}
