//! Room job queue and claim set
//!
//! One FIFO of rooms waiting for a worker plus the set of rooms that already
//! have an assignment in flight. Both live behind a single lock, so every
//! operation, including the combined claim-and-enqueue used by the webhook
//! path, is linearized.
//!
//! A claim outlives its job: dequeuing hands the room to a worker but keeps
//! the claim until the room ends, so a late duplicate start event cannot
//! dispatch a second worker.
//!
//! Every claim carries a generation number. A direct launch records its task
//! against the generation it claimed, so a launch that outlives its room
//! cannot attach to the claim of a later start event for the same name.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::launcher::TaskHandle;

/// A room waiting for a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomJob {
    pub room: String,
    pub enqueued_at: DateTime<Utc>,
}

impl RoomJob {
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// Marker for a room with a pending or active assignment
#[derive(Debug, Clone)]
pub struct Claim {
    pub claimed_at: DateTime<Utc>,
    pub generation: u64,
    since: Instant,
    /// Launched task, direct mode only
    pub task: Option<TaskHandle>,
}

impl Claim {
    fn new(generation: u64) -> Self {
        Self {
            claimed_at: Utc::now(),
            generation,
            since: Instant::now(),
            task: None,
        }
    }

    pub fn age(&self) -> Duration {
        self.since.elapsed()
    }
}

/// Result of [`RoomQueue::claim_and_enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Claim set and job appended; `depth` counts the new job
    Queued { depth: usize },
    /// Room was already claimed; nothing changed
    AlreadyClaimed,
}

/// Result of [`RoomQueue::try_claim`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// New claim; pass `generation` to [`RoomQueue::attach_task`]
    Claimed { generation: u64 },
    /// Room was already claimed, possibly with a launched task
    AlreadyClaimed { task: Option<TaskHandle> },
}

/// Point-in-time view of one claim
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimInfo {
    pub room: String,
    pub claimed_at: DateTime<Utc>,
    #[serde(rename = "taskArn", skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskHandle>,
}

/// Point-in-time view of the queue and the claim set
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    /// Pending rooms, head first
    pub pending: Vec<String>,
    /// Claims, oldest first
    pub claims: Vec<ClaimInfo>,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<RoomJob>,
    claims: HashMap<String, Claim>,
    next_generation: u64,
}

impl QueueState {
    fn insert_claim(&mut self, room: &str) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.claims.insert(room.to_string(), Claim::new(generation));
        generation
    }

    /// Linear in queue length; only called when a claim was actually removed
    fn drop_job(&mut self, room: &str) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|job| job.room != room);
        self.jobs.len() != before
    }
}

/// In-memory room queue shared by the webhook and assign handlers
#[derive(Default)]
pub struct RoomQueue {
    state: Mutex<QueueState>,
}

impl RoomQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        // State stays consistent between statements, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a job for `room` and return the new depth
    ///
    /// Does not look at claims; callers that need dedup use
    /// [`claim_and_enqueue`](Self::claim_and_enqueue).
    pub fn enqueue(&self, room: &str) -> usize {
        let mut state = self.state();
        state.jobs.push_back(RoomJob::new(room));
        state.jobs.len()
    }

    /// Pop the oldest job, if any
    pub fn try_dequeue(&self) -> Option<RoomJob> {
        self.state().jobs.pop_front()
    }

    /// Put a job back at the head after a failed hand-off
    ///
    /// The job is dropped if its claim was cleared in the meantime.
    pub fn requeue_front(&self, job: RoomJob) -> bool {
        let mut state = self.state();
        if !state.claims.contains_key(&job.room) {
            debug!(room = %job.room, "Claim gone, not requeuing");
            return false;
        }
        state.jobs.push_front(job);
        true
    }

    /// Mark `room` claimed; returns false if it already was
    pub fn set_claim(&self, room: &str) -> bool {
        let mut state = self.state();
        if state.claims.contains_key(room) {
            return false;
        }
        state.insert_claim(room);
        true
    }

    /// Remove the claim for `room` together with any job still queued for it
    ///
    /// The claim lookup is O(1). Dropping the pending job scans the queue, and
    /// only happens when there was a claim to remove.
    pub fn clear_claim(&self, room: &str) -> Option<Claim> {
        let mut state = self.state();
        let claim = state.claims.remove(room)?;
        if state.drop_job(room) {
            debug!(room = %room, "Dropped queued job for cleared room");
        }
        Some(claim)
    }

    pub fn is_claimed(&self, room: &str) -> bool {
        self.state().claims.contains_key(room)
    }

    /// Claim `room` and queue a job for it in one step
    pub fn claim_and_enqueue(&self, room: &str) -> EnqueueOutcome {
        let mut state = self.state();
        if state.claims.contains_key(room) {
            return EnqueueOutcome::AlreadyClaimed;
        }
        state.insert_claim(room);
        state.jobs.push_back(RoomJob::new(room));
        EnqueueOutcome::Queued {
            depth: state.jobs.len(),
        }
    }

    /// Claim `room` without queuing a job (direct launches)
    pub fn try_claim(&self, room: &str) -> ClaimOutcome {
        let mut state = self.state();
        match state.claims.get(room) {
            Some(claim) => ClaimOutcome::AlreadyClaimed {
                task: claim.task.clone(),
            },
            None => ClaimOutcome::Claimed {
                generation: state.insert_claim(room),
            },
        }
    }

    /// Record the launched task on the claim taken as `generation`
    ///
    /// Returns false if that claim was cleared while the launch was in
    /// flight, even when a newer claim for the same room exists.
    pub fn attach_task(&self, room: &str, generation: u64, task: TaskHandle) -> bool {
        match self.state().claims.get_mut(room) {
            Some(claim) if claim.generation == generation => {
                claim.task = Some(task);
                true
            }
            _ => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.state().jobs.len()
    }

    pub fn claim_count(&self) -> usize {
        self.state().claims.len()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state();
        let mut claims: Vec<ClaimInfo> = state
            .claims
            .iter()
            .map(|(room, claim)| ClaimInfo {
                room: room.clone(),
                claimed_at: claim.claimed_at,
                task: claim.task.clone(),
            })
            .collect();
        claims.sort_by(|a, b| a.claimed_at.cmp(&b.claimed_at).then(a.room.cmp(&b.room)));

        QueueSnapshot {
            pending: state.jobs.iter().map(|job| job.room.clone()).collect(),
            claims,
        }
    }

    /// Drop claims older than `ttl`, plus their queued jobs; returns the swept rooms
    pub fn sweep_expired(&self, ttl: Duration) -> Vec<(String, Claim)> {
        let mut state = self.state();
        let expired: Vec<String> = state
            .claims
            .iter()
            .filter(|(_, claim)| claim.age() >= ttl)
            .map(|(room, _)| room.clone())
            .collect();

        let mut swept = Vec::with_capacity(expired.len());
        for room in expired {
            if let Some(claim) = state.claims.remove(&room) {
                state.drop_job(&room);
                swept.push((room, claim));
            }
        }
        swept
    }
}
