//! Process-wide authenticated session.
//!
//! `SessionStore` owns the single active [`Session`] and its persisted copy.
//! It is cheap to clone; clones share the same state. The session is
//! published through a `watch` channel and replaced as one value, so a
//! reader never sees a credential without its role.

pub mod storage;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::api::ApiGateway;
use crate::error::ClientError;
use crate::models::{AuthResponse, Role, Session, SignupRequest};

pub use storage::{MemorySessionStorage, SessionStorage, SqliteSessionStorage};

type Listener = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Arc<dyn SessionStorage>,
    current: watch::Sender<Option<Session>>,
    listeners: Mutex<Vec<Listener>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                storage,
                current,
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.current.borrow().clone()
    }

    pub fn credential(&self) -> Option<String> {
        self.inner
            .current
            .borrow()
            .as_ref()
            .map(|s| s.credential.clone())
    }

    pub fn role(&self) -> Option<Role> {
        self.inner.current.borrow().as_ref().map(|s| s.role.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.current.borrow().is_some()
    }

    /// Receiver that wakes on every session replacement.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.current.subscribe()
    }

    /// Registers a callback invoked synchronously after every change.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(Option<&Session>) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Loads the persisted session at startup.
    pub async fn restore(&self) -> Result<Option<Session>, ClientError> {
        let restored = self.inner.storage.load().await?;
        match &restored {
            Some(session) => info!("Restored session for role {}", session.role),
            None => info!("No persisted session"),
        }
        self.publish(restored.clone());
        Ok(restored)
    }

    pub async fn login(
        &self,
        api: &dyn ApiGateway,
        email: &str,
        password: &str,
    ) -> Result<Session, ClientError> {
        let response = api.login(email, password).await?;
        let session = self.establish(response).await?;
        info!("Logged in as {} ({})", email, session.role);
        Ok(session)
    }

    pub async fn signup(
        &self,
        api: &dyn ApiGateway,
        profile: &SignupRequest,
    ) -> Result<Session, ClientError> {
        profile.validate()?;
        let response = api.signup(profile).await?;
        let session = self.establish(response).await?;
        info!("Registered {} ({})", profile.email, session.role);
        Ok(session)
    }

    /// Exchanges the refresh token for a new credential, keeping the role.
    pub async fn refresh(&self, api: &dyn ApiGateway) -> Result<Session, ClientError> {
        let Some(current) = self.current() else {
            return Err(ClientError::AuthExpired);
        };
        let Some(refresh) = current.refresh.clone() else {
            return Err(ClientError::Auth("no refresh token for this session".to_string()));
        };

        let response = match api.refresh_token(&refresh).await {
            Ok(response) => response,
            Err(err @ (ClientError::AuthExpired | ClientError::Auth(_))) => {
                self.expire().await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let session = Session::new(response.access, current.role)
            .with_refresh(response.refresh.or(Some(refresh)));
        self.inner.storage.save(&session).await?;
        self.publish(Some(session.clone()));
        info!("Session credential refreshed");
        Ok(session)
    }

    /// Clears persisted and in-memory state. The in-memory session is gone
    /// even when the storage call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.publish(None);
        info!("Logged out");
        self.inner.storage.clear().await.inspect_err(|e| {
            error!("Failed to clear persisted session: {}", e);
        })
    }

    /// Forced logout after the server rejected the credential.
    pub async fn expire(&self) {
        if !self.is_authenticated() {
            return;
        }
        warn!("Session rejected by server, logging out");
        let _ = self.logout().await;
    }

    async fn establish(&self, response: AuthResponse) -> Result<Session, ClientError> {
        if response.access.is_empty() {
            return Err(ClientError::Auth("server returned an empty credential".to_string()));
        }
        let session = Session::new(response.access, response.user.role).with_refresh(response.refresh);
        self.inner.storage.save(&session).await?;
        self.publish(Some(session.clone()));
        Ok(session)
    }

    fn publish(&self, session: Option<Session>) {
        self.inner.current.send_replace(session);
        let current = self.inner.current.borrow().clone();
        // Called outside the lock so a listener may register another.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener(current.as_ref());
        }
    }
}
