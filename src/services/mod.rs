pub mod dashboard;
pub mod poller;
pub mod reconciler;

pub use dashboard::{Dashboard, DashboardData, Feed};
pub use poller::{PollEvent, PollHandle, Poller};
pub use reconciler::{
    Change, Latest, MutationId, MutationOutcome, PendingMutation, Reconcilable, Reconciler, SETTLED_HISTORY,
};
