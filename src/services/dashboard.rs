//! Per-view orchestration: which feeds a mounted view polls, where their
//! snapshots land, and how writes are staged, sent and reconciled.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::ApiGateway;
use crate::error::ClientError;
use crate::models::{
    AuditLog, Course, Issue, IssuePatch, NewIssueRequest, Notification, NotificationPatch, Role,
    Stats, UpdateIssueRequest, User,
};
use crate::routes::{Destination, RoleRouter, ViewKind};
use crate::services::poller::{PollEvent, PollHandle, Poller};
use crate::services::reconciler::{Change, Latest, MutationId, MutationOutcome, Reconciler};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Stats,
    Issues,
    Courses,
    Staff,
    Notifications,
    AuditLogs,
}

impl Feed {
    pub fn name(self) -> &'static str {
        match self {
            Feed::Stats => "stats",
            Feed::Issues => "issues",
            Feed::Courses => "courses",
            Feed::Staff => "staff",
            Feed::Notifications => "notifications",
            Feed::AuditLogs => "audit-logs",
        }
    }

    pub fn for_view(view: ViewKind) -> &'static [Feed] {
        match view {
            ViewKind::StudentView => &[Feed::Stats, Feed::Issues, Feed::Courses, Feed::Notifications],
            ViewKind::LecturerView => &[Feed::Stats, Feed::Issues, Feed::Notifications],
            ViewKind::HoDView | ViewKind::RegistrarView => {
                &[Feed::Stats, Feed::Issues, Feed::Staff, Feed::Notifications]
            }
            ViewKind::AuditLogView => &[Feed::AuditLogs],
            _ => &[],
        }
    }
}

/// Cached server state of one mounted view.
pub struct DashboardData {
    pub stats: Latest<Stats>,
    pub issues: Reconciler<Issue>,
    pub courses: Latest<Vec<Course>>,
    pub staff: Latest<Vec<User>>,
    pub notifications: Reconciler<Notification>,
    pub audit_logs: Latest<Vec<AuditLog>>,
}

impl DashboardData {
    fn new(state: &AppState) -> Self {
        let timeout = state.config.mutation_timeout;
        Self {
            stats: Latest::default(),
            issues: Reconciler::new("issues", timeout),
            courses: Latest::default(),
            staff: Latest::default(),
            notifications: Reconciler::new("notifications", timeout),
            audit_logs: Latest::default(),
        }
    }

    fn clear(&mut self) {
        self.stats.clear();
        self.issues.clear();
        self.courses.clear();
        self.staff.clear();
        self.notifications.clear();
        self.audit_logs.clear();
    }

    fn expire(&mut self, now: Instant) -> Vec<ClientError> {
        let mut errors = self.issues.expire(now);
        errors.extend(self.notifications.expire(now));
        errors
    }
}

type Shared<T> = Arc<Mutex<T>>;

fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mounted view. Dropping it, calling [`Dashboard::unmount`], or the
/// session ending all stop its pollers and clear its data.
pub struct Dashboard {
    view: ViewKind,
    state: AppState,
    data: Shared<DashboardData>,
    handles: Shared<Vec<(Feed, PollHandle)>>,
    sweeper: Shared<Option<PollHandle>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    mounted: Arc<AtomicBool>,
    errors: mpsc::UnboundedSender<ClientError>,
}

impl Dashboard {
    /// Mounts `view` for the current session and starts its feeds.
    ///
    /// Errors the view surfaces asynchronously (repeated poll failures,
    /// timed-out changes, session expiry) arrive on the returned receiver.
    pub fn mount(
        state: &AppState,
        view: ViewKind,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientError>), ClientError> {
        let session = state.session.current();
        let permitted = match view {
            ViewKind::AuditLogView => RoleRouter::navigate(session.as_ref(), Destination::AuditLogs),
            _ => RoleRouter::resolve(session.as_ref()),
        };
        if permitted != view || Feed::for_view(view).is_empty() {
            return Err(ClientError::Forbidden(format!("{:?} is not available to this session", view)));
        }

        let (errors, errors_rx) = mpsc::unbounded_channel();
        let dashboard = Self {
            view,
            state: state.clone(),
            data: Arc::new(Mutex::new(DashboardData::new(state))),
            handles: Arc::new(Mutex::new(Vec::new())),
            sweeper: Arc::new(Mutex::new(None)),
            watcher: Mutex::new(None),
            mounted: Arc::new(AtomicBool::new(true)),
            errors,
        };

        info!("Mounting {:?}", view);
        {
            let mut handles = lock(&dashboard.handles);
            for feed in Feed::for_view(view) {
                handles.push((*feed, dashboard.start_feed(*feed)));
            }
        }
        *lock(&dashboard.sweeper) = Some(dashboard.start_sweeper());
        *lock(&dashboard.watcher) = Some(dashboard.watch_session());

        Ok((dashboard, errors_rx))
    }

    pub fn view(&self) -> ViewKind {
        self.view
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Stops every feed and forgets all cached state. Idempotent.
    pub fn unmount(&self) {
        if let Some(watcher) = lock(&self.watcher).take() {
            watcher.abort();
        }
        teardown(&self.mounted, &self.handles, &self.sweeper, &self.data, self.view);
    }

    /// Fetches `feed` now instead of at the next tick.
    pub fn refresh(&self, feed: Feed) {
        for (_, handle) in lock(&self.handles).iter().filter(|(f, _)| *f == feed) {
            handle.refresh();
        }
    }

    /// Fetches started, snapshots applied and ticks skipped for `feed`.
    pub fn feed_counters(&self, feed: Feed) -> Option<(u64, u64, u64)> {
        lock(&self.handles)
            .iter()
            .find(|(f, _)| *f == feed)
            .map(|(_, h)| (h.fetches_started(), h.snapshots_applied(), h.ticks_skipped()))
    }

    pub fn stats(&self) -> Option<Stats> {
        lock(&self.data).stats.get()
    }

    pub fn issues(&self) -> Vec<Issue> {
        lock(&self.data).issues.visible()
    }

    pub fn courses(&self) -> Vec<Course> {
        lock(&self.data).courses.get().unwrap_or_default()
    }

    pub fn staff(&self) -> Vec<User> {
        lock(&self.data).staff.get().unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.data).notifications.visible()
    }

    pub fn unread_count(&self) -> usize {
        self.notifications().iter().filter(|n| !n.is_read).count()
    }

    pub fn audit_logs(&self) -> Vec<AuditLog> {
        lock(&self.data).audit_logs.get().unwrap_or_default()
    }

    pub fn mutation_outcome(&self, mutation: MutationId) -> Option<MutationOutcome> {
        let data = lock(&self.data);
        data.issues
            .outcome(mutation)
            .or_else(|| data.notifications.outcome(mutation))
    }

    pub fn pending_mutations(&self) -> usize {
        let data = lock(&self.data);
        data.issues.pending().len() + data.notifications.pending().len()
    }

    /// Logs a new issue. Students only.
    pub async fn create_issue(&self, req: NewIssueRequest) -> Result<MutationId, ClientError> {
        self.require_role(&[Role::Student])?;
        if req.description.trim().is_empty() {
            return Err(ClientError::Validation("description is required".to_string()));
        }

        let course = self
            .courses()
            .into_iter()
            .find(|c| c.course_id == req.course)
            .unwrap_or_else(|| Course {
                course_id: req.course,
                course_code: String::new(),
                course_name: String::new(),
                department: None,
            });

        let mutation = lock(&self.data)
            .issues
            .apply_optimistic(Change::Create { draft: Issue::draft(course, &req) })?;

        match self.state.api.create_issue(&req).await {
            Ok(created) => {
                info!("Issue #{} created", created.issue_id);
                lock(&self.data).issues.acknowledge(mutation, Some(created));
                self.refresh(Feed::Issues);
                self.refresh(Feed::Stats);
                Ok(mutation)
            }
            Err(err) => Err(self.write_failed(Feed::Issues, mutation, err).await),
        }
    }

    /// Marks an issue resolved. Staff only.
    pub async fn resolve_issue(&self, issue_id: i64) -> Result<MutationId, ClientError> {
        self.require_role(&[Role::Lecturer, Role::HeadOfDepartment, Role::AcademicRegistrar])?;
        self.update_issue(issue_id, IssuePatch::resolve()).await
    }

    /// Assigns an issue to a staff member from the staff feed.
    pub async fn assign_issue(&self, issue_id: i64, staff_id: i64) -> Result<MutationId, ClientError> {
        self.require_role(&[Role::HeadOfDepartment, Role::AcademicRegistrar])?;
        let staff = self
            .staff()
            .into_iter()
            .find(|u| u.id == Some(staff_id))
            .ok_or_else(|| ClientError::Validation(format!("unknown staff member: {}", staff_id)))?;
        self.update_issue(issue_id, IssuePatch::assign(staff)).await
    }

    /// Marks a notification read. Returns `None` when it already is.
    pub async fn mark_notification_read(
        &self,
        notification_id: i64,
    ) -> Result<Option<MutationId>, ClientError> {
        if !self.state.session.is_authenticated() {
            return Err(ClientError::Forbidden("not signed in".to_string()));
        }

        let mutation = {
            let mut data = lock(&self.data);
            let already_read = data
                .notifications
                .visible()
                .iter()
                .any(|n| n.notification_id == notification_id && n.is_read);
            if already_read {
                return Ok(None);
            }
            data.notifications.apply_optimistic(Change::Update {
                id: notification_id,
                patch: NotificationPatch::mark_read(),
            })?
        };

        match self.state.api.mark_notification_read(notification_id).await {
            Ok(()) => {
                lock(&self.data).notifications.acknowledge(mutation, None);
                self.refresh(Feed::Notifications);
                Ok(Some(mutation))
            }
            Err(err) => Err(self.write_failed(Feed::Notifications, mutation, err).await),
        }
    }

    async fn update_issue(&self, issue_id: i64, patch: IssuePatch) -> Result<MutationId, ClientError> {
        let req = UpdateIssueRequest::from(&patch);
        let mutation = lock(&self.data)
            .issues
            .apply_optimistic(Change::Update { id: issue_id, patch })?;

        match self.state.api.update_issue(issue_id, &req).await {
            Ok(updated) => {
                debug!("Issue #{} updated to {}", updated.issue_id, updated.status);
                lock(&self.data).issues.acknowledge(mutation, None);
                self.refresh(Feed::Issues);
                self.refresh(Feed::Stats);
                Ok(mutation)
            }
            Err(err) => Err(self.write_failed(Feed::Issues, mutation, err).await),
        }
    }

    async fn write_failed(&self, feed: Feed, mutation: MutationId, err: ClientError) -> ClientError {
        {
            let mut data = lock(&self.data);
            match feed {
                Feed::Notifications => data.notifications.fail(mutation, &err),
                _ => data.issues.fail(mutation, &err),
            };
        }
        if err.is_auth_expired() {
            self.state.session.expire().await;
            self.unmount();
        }
        err
    }

    fn require_role(&self, allowed: &[Role]) -> Result<(), ClientError> {
        match self.state.session.role() {
            Some(role) if allowed.contains(&role) => Ok(()),
            Some(role) => Err(ClientError::Forbidden(format!("not permitted for role {}", role))),
            None => Err(ClientError::Forbidden("not signed in".to_string())),
        }
    }

    fn start_feed(&self, feed: Feed) -> PollHandle {
        match feed {
            Feed::Stats => self.spawn_feed(
                feed,
                |api| async move { api.get_stats().await },
                |d, stats, at| d.stats.apply_poll(stats, at),
            ),
            Feed::Issues => self.spawn_feed(
                feed,
                |api| async move { api.list_issues().await },
                |d, issues, at| {
                    d.issues.apply_poll(issues, at);
                },
            ),
            Feed::Courses => self.spawn_feed(
                feed,
                |api| async move { api.list_courses().await },
                |d, courses, at| d.courses.apply_poll(courses, at),
            ),
            Feed::Staff => self.spawn_feed(
                feed,
                |api| async move { api.list_staff().await },
                |d, staff, at| d.staff.apply_poll(staff, at),
            ),
            Feed::Notifications => self.spawn_feed(
                feed,
                |api| async move { api.list_notifications().await },
                |d, notifications, at| {
                    d.notifications.apply_poll(notifications, at);
                },
            ),
            Feed::AuditLogs => self.spawn_feed(
                feed,
                |api| async move { api.list_audit_logs().await },
                |d, logs, at| d.audit_logs.apply_poll(logs, at),
            ),
        }
    }

    fn spawn_feed<T, F, Fut, A>(&self, feed: Feed, fetch: F, apply: A) -> PollHandle
    where
        T: Send + 'static,
        F: Fn(Arc<dyn ApiGateway>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
        A: Fn(&mut DashboardData, T, Instant) + Send + 'static,
    {
        let api = self.state.api.clone();
        let ctx = self.sink_context();

        Poller::new(feed.name(), self.state.config.poll_interval)
            .with_error_threshold(self.state.config.network_error_threshold)
            .start(move || fetch(api.clone()), move |event| ctx.handle(event, &apply))
    }

    fn sink_context(&self) -> SinkContext {
        SinkContext {
            data: self.data.clone(),
            mounted: self.mounted.clone(),
            errors: self.errors.clone(),
            state: self.state.clone(),
        }
    }

    fn start_sweeper(&self) -> PollHandle {
        let ctx = self.sink_context();
        Poller::new("mutation-sweep", self.state.config.poll_interval).start(
            || std::future::ready(Ok(())),
            move |event: PollEvent<()>| {
                if let PollEvent::Snapshot { .. } = event {
                    ctx.expire_mutations();
                }
            },
        )
    }

    /// Tears the view down when the session ends or no longer maps to it.
    fn watch_session(&self) -> JoinHandle<()> {
        let mut rx = self.state.session.subscribe();
        let mounted = self.mounted.clone();
        let handles = self.handles.clone();
        let sweeper = self.sweeper.clone();
        let data = self.data.clone();
        let view = self.view;

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let session = rx.borrow_and_update().clone();
                let still_permitted = match view {
                    ViewKind::AuditLogView => {
                        RoleRouter::navigate(session.as_ref(), Destination::AuditLogs) == view
                    }
                    _ => RoleRouter::resolve(session.as_ref()) == view,
                };
                if !still_permitted {
                    teardown(&mounted, &handles, &sweeper, &data, view);
                    break;
                }
            }
        })
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn teardown(
    mounted: &AtomicBool,
    handles: &Mutex<Vec<(Feed, PollHandle)>>,
    sweeper: &Mutex<Option<PollHandle>>,
    data: &Mutex<DashboardData>,
    view: ViewKind,
) {
    // Sinks check `mounted` under the data lock, so nothing lands after the clear.
    let was_mounted = mounted.swap(false, Ordering::SeqCst);
    let drained: Vec<_> = lock(handles).drain(..).collect();
    for (_, handle) in &drained {
        handle.cancel();
    }
    if let Some(sweeper) = lock(sweeper).take() {
        sweeper.cancel();
    }
    lock(data).clear();
    if was_mounted {
        info!("Unmounted {:?}", view);
    }
}

/// Everything a feed's sink needs to apply results and raise errors.
struct SinkContext {
    data: Shared<DashboardData>,
    mounted: Arc<AtomicBool>,
    errors: mpsc::UnboundedSender<ClientError>,
    state: AppState,
}

impl SinkContext {
    fn handle<T, A>(&self, event: PollEvent<T>, apply: &A)
    where
        A: Fn(&mut DashboardData, T, Instant),
    {
        match event {
            PollEvent::Snapshot { data, requested_at } => {
                {
                    let mut guard = lock(&self.data);
                    if !self.mounted.load(Ordering::SeqCst) {
                        debug!("Dropping snapshot for an unmounted view");
                        return;
                    }
                    apply(&mut *guard, data, requested_at);
                }
                self.expire_mutations();
            }
            PollEvent::Failed(_) if !self.mounted.load(Ordering::SeqCst) => {
                debug!("Dropping poll failure for an unmounted view");
            }
            PollEvent::Failed(err) => {
                if err.is_auth_expired() {
                    let session = self.state.session.clone();
                    tokio::spawn(async move { session.expire().await });
                }
                let _ = self.errors.send(err);
            }
        }
    }

    fn expire_mutations(&self) {
        let timed_out = {
            let mut data = lock(&self.data);
            if !self.mounted.load(Ordering::SeqCst) {
                return;
            }
            data.expire(Instant::now())
        };
        for err in timed_out {
            warn!("{}", err);
            let _ = self.errors.send(err);
        }
    }
}
