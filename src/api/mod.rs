pub mod dto;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::models::{
    AuditLog, AuthResponse, Course, Issue, LoginRequest, NewIssueRequest, Notification,
    RefreshRequest, RefreshResponse, SignupRequest, Stats, UpdateIssueRequest, User,
};
use crate::session::SessionStore;

/// Typed access to the AITS REST API. One method per server resource.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError>;
    async fn refresh_token(&self, refresh: &str) -> Result<RefreshResponse, ClientError>;
    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError>;

    async fn list_issues(&self) -> Result<Vec<Issue>, ClientError>;
    async fn get_stats(&self) -> Result<Stats, ClientError>;
    async fn list_courses(&self) -> Result<Vec<Course>, ClientError>;
    async fn list_staff(&self) -> Result<Vec<User>, ClientError>;
    async fn create_issue(&self, req: &NewIssueRequest) -> Result<Issue, ClientError>;
    async fn update_issue(&self, id: i64, req: &UpdateIssueRequest) -> Result<Issue, ClientError>;

    async fn list_notifications(&self) -> Result<Vec<Notification>, ClientError>;
    async fn mark_notification_read(&self, id: i64) -> Result<(), ClientError>;

    async fn list_audit_logs(&self) -> Result<Vec<AuditLog>, ClientError>;
}

/// How a request treats authentication.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    /// Credential endpoints: sent without a bearer token, 401 means bad credentials.
    Credentials,
    /// Token refresh: sent without a bearer token, 401 invalidates the session.
    Refresh,
    /// Everything else: bearer token attached when a session exists.
    Session,
}

pub struct HttpApiGateway {
    client: Client,
    base_url: String,
    session: SessionStore,
}

impl HttpApiGateway {
    pub fn new(config: &ClientConfig, session: SessionStore) -> Result<Self, ClientError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, access: Access) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(path));
        match (access, self.session.credential()) {
            (Access::Session, Some(credential)) => builder.bearer_auth(credential),
            _ => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        access: Access,
        path: &str,
    ) -> Result<T, ClientError> {
        let body_text = self.execute(builder, access, path).await?;
        serde_json::from_str::<T>(&body_text).map_err(|e| {
            tracing::error!("Failed to parse {} response: {}", path, e);
            ClientError::Decode(format!("{}: {}", path, e))
        })
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        access: Access,
        path: &str,
    ) -> Result<String, ClientError> {
        debug!("-> {}", path);
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        debug!("<- {} {}", path, status);
        Err(classify(status, &body, access, path))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let builder = self.request(Method::GET, path, Access::Session);
        self.send(builder, Access::Session, path).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        access: Access,
    ) -> Result<T, ClientError> {
        let builder = self.request(Method::POST, path, access).json(body);
        self.send(builder, access, path).await
    }
}

fn classify(status: StatusCode, body: &str, access: Access, path: &str) -> ClientError {
    let message = dto::ErrorBody::message(body);
    match status {
        StatusCode::UNAUTHORIZED => match access {
            Access::Credentials => ClientError::Auth(message),
            Access::Refresh | Access::Session => {
                warn!("Credential rejected by {}: {}", path, message);
                ClientError::AuthExpired
            }
        },
        StatusCode::FORBIDDEN => ClientError::Forbidden(message),
        StatusCode::BAD_REQUEST => match access {
            Access::Credentials if path.starts_with("token") => ClientError::Auth(message),
            _ => ClientError::Validation(message),
        },
        StatusCode::CONFLICT => ClientError::Conflict(message),
        StatusCode::NOT_FOUND => ClientError::NotFound,
        _ => ClientError::Server {
            status: status.as_u16(),
            body: message,
        },
    }
}

#[async_trait]
impl ApiGateway for HttpApiGateway {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("token/", &body, Access::Credentials).await
    }

    async fn refresh_token(&self, refresh: &str) -> Result<RefreshResponse, ClientError> {
        let body = RefreshRequest {
            refresh: refresh.to_string(),
        };
        self.post("token/refresh/", &body, Access::Refresh).await
    }

    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError> {
        self.post("register/", req, Access::Credentials).await
    }

    async fn list_issues(&self) -> Result<Vec<Issue>, ClientError> {
        self.get("issues/").await
    }

    async fn get_stats(&self) -> Result<Stats, ClientError> {
        self.get("issues/stats/").await
    }

    async fn list_courses(&self) -> Result<Vec<Course>, ClientError> {
        self.get("issues/courses/").await
    }

    async fn list_staff(&self) -> Result<Vec<User>, ClientError> {
        self.get("issues/staff/").await
    }

    async fn create_issue(&self, req: &NewIssueRequest) -> Result<Issue, ClientError> {
        self.post("issues/", req, Access::Session).await
    }

    async fn update_issue(&self, id: i64, req: &UpdateIssueRequest) -> Result<Issue, ClientError> {
        let path = format!("issues/{}/", id);
        let builder = self.request(Method::PATCH, &path, Access::Session).json(req);
        self.send(builder, Access::Session, &path).await
    }

    async fn list_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.get("notifications/").await
    }

    async fn mark_notification_read(&self, id: i64) -> Result<(), ClientError> {
        let path = format!("notifications/{}/mark_as_read/", id);
        let builder = self.request(Method::POST, &path, Access::Session);
        let body = self.execute(builder, Access::Session, &path).await?;
        if let Ok(ack) = serde_json::from_str::<dto::MarkReadResponse>(&body) {
            debug!("Notification {} acknowledged: {:?}", id, ack.status);
        }
        Ok(())
    }

    async fn list_audit_logs(&self) -> Result<Vec<AuditLog>, ClientError> {
        self.get("audit-logs/").await
    }
}
