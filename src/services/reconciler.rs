use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ClientError;

/// Settled outcomes remembered per reconciler. Older ones are forgotten and
/// report `None` from [`Reconciler::outcome`].
pub const SETTLED_HISTORY: usize = 256;

/// An entity that can be patched locally ahead of the server.
pub trait Reconcilable: Clone + Send + 'static {
    type Id: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send;
    type Patch: Clone + fmt::Debug + Send;

    fn id(&self) -> Self::Id;
    fn apply(&mut self, patch: &Self::Patch);
    /// True when this (server) value already shows the effect of `patch`.
    fn reflects(&self, patch: &Self::Patch) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MutationId(Uuid);

impl MutationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Change<E: Reconcilable> {
    Update { id: E::Id, patch: E::Patch },
    /// A new entity. `draft` is shown until the server copy appears.
    Create { draft: E },
}

/// Lifecycle of a mutation. Every state but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Pending,
    Confirmed,
    Failed,
    Dropped,
}

#[derive(Debug, Clone)]
pub struct PendingMutation<E: Reconcilable> {
    pub id: MutationId,
    pub change: Change<E>,
    pub submitted_at: Instant,
    /// When the write call returned success.
    pub acknowledged_at: Option<Instant>,
    /// Server id of a created entity, known once acknowledged.
    created_id: Option<E::Id>,
    /// Last server copy of an update's target, shown patched if a later
    /// snapshot no longer lists it.
    base: Option<E>,
}

impl<E: Reconcilable> PendingMutation<E> {
    pub fn target(&self) -> Option<E::Id> {
        match &self.change {
            Change::Update { id, .. } => Some(id.clone()),
            Change::Create { .. } => self.created_id.clone(),
        }
    }
}

/// Authoritative snapshot of one feed plus the optimistic changes layered
/// on top of it.
///
/// The server always wins: a snapshot fetched after a write was
/// acknowledged resolves that write, whatever value it carries. Older
/// snapshots cannot resolve it, so a response that raced the write never
/// rolls the local value back.
pub struct Reconciler<E: Reconcilable> {
    name: String,
    snapshot: Vec<E>,
    pending: Vec<PendingMutation<E>>,
    settled: HashMap<MutationId, MutationOutcome>,
    settled_order: VecDeque<MutationId>,
    timeout: Duration,
}

impl<E: Reconcilable> Reconciler<E> {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            snapshot: Vec::new(),
            pending: Vec::new(),
            settled: HashMap::new(),
            settled_order: VecDeque::new(),
            timeout,
        }
    }

    pub fn snapshot(&self) -> &[E] {
        &self.snapshot
    }

    pub fn pending(&self) -> &[PendingMutation<E>] {
        &self.pending
    }

    pub fn has_pending_for(&self, id: &E::Id) -> bool {
        self.pending.iter().any(|m| m.target().as_ref() == Some(id))
    }

    pub fn outcome(&self, mutation: MutationId) -> Option<MutationOutcome> {
        if self.pending.iter().any(|m| m.id == mutation) {
            return Some(MutationOutcome::Pending);
        }
        self.settled.get(&mutation).copied()
    }

    /// Replaces the snapshot and resolves every pending change the new data
    /// accounts for. Returns the mutations that were confirmed.
    pub fn apply_poll(&mut self, data: Vec<E>, requested_at: Instant) -> Vec<MutationId> {
        self.snapshot = data;

        for mutation in &mut self.pending {
            if let Change::Update { id, .. } = &mutation.change {
                if let Some(server) = self.snapshot.iter().find(|e| &e.id() == id) {
                    mutation.base = Some(server.clone());
                }
            }
        }

        let mut confirmed = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending.len());

        for mutation in std::mem::take(&mut self.pending) {
            if self.resolved_by_snapshot(&mutation, requested_at) {
                confirmed.push(mutation.id);
            } else {
                still_pending.push(mutation);
            }
        }

        self.pending = still_pending;
        for id in &confirmed {
            self.settle(*id, MutationOutcome::Confirmed);
        }
        if !confirmed.is_empty() {
            debug!("{}: {} change(s) confirmed by poll", self.name, confirmed.len());
        }
        confirmed
    }

    fn resolved_by_snapshot(&self, mutation: &PendingMutation<E>, requested_at: Instant) -> bool {
        let Some(target) = mutation.target() else {
            return false;
        };
        let Some(server) = self.snapshot.iter().find(|e| e.id() == target) else {
            return false;
        };

        let reflected = match &mutation.change {
            Change::Update { patch, .. } => server.reflects(patch),
            Change::Create { .. } => true,
        };
        if reflected {
            return true;
        }

        match mutation.acknowledged_at {
            Some(acked) if requested_at >= acked => {
                debug!("{}: server value for {} supersedes local change", self.name, target);
                true
            }
            _ => false,
        }
    }

    /// Stages a change and shows it immediately. Only one change per
    /// existing entity may be pending at a time.
    pub fn apply_optimistic(&mut self, change: Change<E>) -> Result<MutationId, ClientError> {
        if let Change::Update { id, .. } = &change {
            if self.has_pending_for(id) {
                return Err(ClientError::MutationInFlight(format!("{} {}", self.name, id)));
            }
        }

        let base = match &change {
            Change::Update { id, .. } => self.snapshot.iter().find(|e| &e.id() == id).cloned(),
            Change::Create { .. } => None,
        };

        let id = MutationId::new();
        self.pending.push(PendingMutation {
            id,
            change,
            submitted_at: Instant::now(),
            acknowledged_at: None,
            created_id: None,
            base,
        });
        Ok(id)
    }

    /// Records that the write call succeeded. For creates, `echoed` is the
    /// server's copy and replaces the draft.
    pub fn acknowledge(&mut self, mutation: MutationId, echoed: Option<E>) -> bool {
        let Some(pending) = self.pending.iter_mut().find(|m| m.id == mutation) else {
            return false;
        };
        pending.acknowledged_at = Some(Instant::now());
        if let (Change::Create { draft }, Some(server)) = (&mut pending.change, echoed) {
            pending.created_id = Some(server.id());
            *draft = server;
        }
        true
    }

    pub fn confirm(&mut self, mutation: MutationId) -> bool {
        self.resolve(mutation, MutationOutcome::Confirmed)
    }

    /// The write call failed: the local change is rolled back.
    pub fn fail(&mut self, mutation: MutationId, error: &ClientError) -> bool {
        let removed = self.resolve(mutation, MutationOutcome::Failed);
        if removed {
            info!("{}: change {} rolled back: {}", self.name, mutation, error);
        }
        removed
    }

    /// Drops changes older than the timeout. Each dropped change yields one
    /// `MutationTimeout`; it is never reported again.
    pub fn expire(&mut self, now: Instant) -> Vec<ClientError> {
        let timeout = self.timeout;
        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|m| now.saturating_duration_since(m.submitted_at) >= timeout);
        self.pending = kept;

        expired
            .into_iter()
            .map(|m| {
                warn!("{}: change {} not confirmed after {:?}, dropping", self.name, m.id, timeout);
                self.settle(m.id, MutationOutcome::Dropped);
                ClientError::MutationTimeout(m.id)
            })
            .collect()
    }

    /// What the user sees: the snapshot with pending changes applied, plus
    /// created entities the snapshot does not have yet. An updated entity
    /// missing from the snapshot keeps showing its local value while the
    /// change is pending.
    pub fn visible(&self) -> Vec<E> {
        let mut view = self.snapshot.clone();

        for mutation in &self.pending {
            match &mutation.change {
                Change::Update { id, patch } => match view.iter_mut().find(|e| &e.id() == id) {
                    Some(entity) => entity.apply(patch),
                    None => {
                        if let Some(mut entity) = mutation.base.clone() {
                            entity.apply(patch);
                            view.push(entity);
                        }
                    }
                },
                Change::Create { draft } => {
                    let already_listed = mutation
                        .created_id
                        .as_ref()
                        .is_some_and(|created| self.snapshot.iter().any(|e| &e.id() == created));
                    if !already_listed {
                        view.push(draft.clone());
                    }
                }
            }
        }

        view
    }

    pub fn clear(&mut self) {
        self.snapshot.clear();
        self.pending.clear();
        self.settled.clear();
        self.settled_order.clear();
    }

    fn resolve(&mut self, mutation: MutationId, outcome: MutationOutcome) -> bool {
        let before = self.pending.len();
        self.pending.retain(|m| m.id != mutation);
        if self.pending.len() == before {
            return false;
        }
        self.settle(mutation, outcome);
        true
    }

    fn settle(&mut self, mutation: MutationId, outcome: MutationOutcome) {
        if self.settled.insert(mutation, outcome).is_none() {
            self.settled_order.push_back(mutation);
        }
        while self.settled_order.len() > SETTLED_HISTORY {
            if let Some(oldest) = self.settled_order.pop_front() {
                self.settled.remove(&oldest);
            }
        }
    }
}

/// Latest value of a feed that is only ever replaced, never patched.
#[derive(Debug)]
pub struct Latest<T> {
    value: Option<T>,
    requested_at: Option<Instant>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            value: None,
            requested_at: None,
        }
    }
}

impl<T: Clone> Latest<T> {
    pub fn apply_poll(&mut self, data: T, requested_at: Instant) {
        self.value = Some(data);
        self.requested_at = Some(requested_at);
    }

    pub fn get(&self) -> Option<T> {
        self.value.clone()
    }

    pub fn requested_at(&self) -> Option<Instant> {
        self.requested_at
    }

    pub fn clear(&mut self) {
        self.value = None;
        self.requested_at = None;
    }
}
