//! Open-dispute cache with server-confirmed removal.
//!
//! The cache is filled by a single load and afterwards only shrinks, one record
//! per successful resolve. Resolves for an id that already has a request in
//! flight are ignored.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
};

use shared::{domain::GameId, protocol::DisputeRecord};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

use crate::DisputesApi;

#[derive(Debug, Clone, PartialEq)]
pub enum DisputesState {
    Loading,
    Loaded(Vec<DisputeRecord>),
    Failed { reason: String },
}

impl DisputesState {
    /// Records to display. Empty while loading and after a failed load.
    pub fn disputes(&self) -> &[DisputeRecord] {
        match self {
            DisputesState::Loaded(disputes) => disputes,
            DisputesState::Loading | DisputesState::Failed { .. } => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, DisputesState::Loading)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisputesSnapshot {
    pub state: DisputesState,
    pub in_flight: BTreeSet<GameId>,
}

impl DisputesSnapshot {
    pub fn disputes(&self) -> &[DisputeRecord] {
        self.state.disputes()
    }

    pub fn is_in_flight(&self, game_id: &GameId) -> bool {
        self.in_flight.contains(game_id)
    }
}

/// Blocking user-facing notification produced by a resolve attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Resolved { game_id: GameId },
    ResolveFailed { game_id: GameId, reason: String },
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::Resolved { .. } => "Dispute resolved successfully!",
            Notice::ResolveFailed { .. } => "Failed to resolve dispute.",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisputeEvent {
    Loaded { count: usize },
    LoadFailed { reason: String },
    /// Hand-off to the review surface. Carries the game id and nothing else.
    ReviewRequested { game_id: GameId },
    Notice(Notice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved,
    AlreadyInFlight,
    Failed { reason: String },
}

impl ResolveOutcome {
    /// The notice this outcome raised, if the attempt reached the backend.
    pub fn notice(&self, game_id: &GameId) -> Option<Notice> {
        match self {
            ResolveOutcome::Resolved => Some(Notice::Resolved {
                game_id: game_id.clone(),
            }),
            ResolveOutcome::AlreadyInFlight => None,
            ResolveOutcome::Failed { reason } => Some(Notice::ResolveFailed {
                game_id: game_id.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

struct WorkflowState {
    disputes: DisputesState,
    load_started: bool,
}

type InFlightSet = StdMutex<BTreeSet<GameId>>;

fn lock_in_flight(set: &InFlightSet) -> MutexGuard<'_, BTreeSet<GameId>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds an id in the in-flight set until dropped, including when the owning
/// resolve future is cancelled mid-request.
struct InFlightGuard<'a> {
    set: &'a InFlightSet,
    game_id: GameId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a InFlightSet, game_id: &GameId) -> Option<Self> {
        lock_in_flight(set)
            .insert(game_id.clone())
            .then(|| Self {
                set,
                game_id: game_id.clone(),
            })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock_in_flight(self.set).remove(&self.game_id);
    }
}

pub struct DisputesWorkflow {
    api: Arc<dyn DisputesApi>,
    inner: Mutex<WorkflowState>,
    in_flight: InFlightSet,
    events: broadcast::Sender<DisputeEvent>,
}

impl DisputesWorkflow {
    pub fn new(api: Arc<dyn DisputesApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            inner: Mutex::new(WorkflowState {
                disputes: DisputesState::Loading,
                load_started: false,
            }),
            in_flight: StdMutex::new(BTreeSet::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DisputeEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> DisputesSnapshot {
        let guard = self.inner.lock().await;
        self.snapshot_of(&guard)
    }

    pub async fn disputes(&self) -> Vec<DisputeRecord> {
        self.inner.lock().await.disputes.disputes().to_vec()
    }

    /// Fetches the open disputes. Only the first call reaches the backend.
    pub async fn load(&self) -> DisputesSnapshot {
        {
            let mut guard = self.inner.lock().await;
            if guard.load_started {
                return self.snapshot_of(&guard);
            }
            guard.load_started = true;
        }

        let result = self.api.fetch_disputes().await;

        let (snapshot, event) = {
            let mut guard = self.inner.lock().await;
            let event = match result {
                Ok(disputes) => {
                    let count = disputes.len();
                    info!(count, "loaded open disputes");
                    guard.disputes = DisputesState::Loaded(disputes);
                    DisputeEvent::Loaded { count }
                }
                Err(err) => {
                    error!("error fetching disputes: {err}");
                    let reason = err.to_string();
                    guard.disputes = DisputesState::Failed {
                        reason: reason.clone(),
                    };
                    DisputeEvent::LoadFailed { reason }
                }
            };
            (self.snapshot_of(&guard), event)
        };

        let _ = self.events.send(event);
        snapshot
    }

    pub fn review(&self, game_id: &GameId) {
        debug!(%game_id, "review requested");
        let _ = self.events.send(DisputeEvent::ReviewRequested {
            game_id: game_id.clone(),
        });
    }

    /// Marks a dispute resolved on the backend and drops it from the cache once
    /// the backend confirms. A failed resolve leaves the cache untouched.
    pub async fn resolve(&self, game_id: &GameId) -> ResolveOutcome {
        let Some(marker) = InFlightGuard::acquire(&self.in_flight, game_id) else {
            debug!(%game_id, "resolve already in flight; ignoring");
            return ResolveOutcome::AlreadyInFlight;
        };

        let result = self.api.resolve_dispute(game_id).await;

        let (outcome, notice) = {
            let mut guard = self.inner.lock().await;
            let resolved = match result {
                Ok(()) => {
                    if let DisputesState::Loaded(disputes) = &mut guard.disputes {
                        disputes.retain(|dispute| &dispute.game_id != game_id);
                    }
                    info!(%game_id, "dispute resolved");
                    (
                        ResolveOutcome::Resolved,
                        Notice::Resolved {
                            game_id: game_id.clone(),
                        },
                    )
                }
                Err(err) => {
                    error!(%game_id, "error resolving dispute: {err}");
                    let reason = err.to_string();
                    (
                        ResolveOutcome::Failed {
                            reason: reason.clone(),
                        },
                        Notice::ResolveFailed {
                            game_id: game_id.clone(),
                            reason,
                        },
                    )
                }
            };
            drop(marker);
            resolved
        };

        let _ = self.events.send(DisputeEvent::Notice(notice));
        outcome
    }

    fn snapshot_of(&self, state: &WorkflowState) -> DisputesSnapshot {
        DisputesSnapshot {
            state: state.disputes.clone(),
            in_flight: lock_in_flight(&self.in_flight).clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/disputes_tests.rs"]
mod tests;
