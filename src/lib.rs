pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;

pub use config::ClientConfig;
pub use error::ClientError;
pub use routes::{Destination, RoleRouter, ViewKind};
pub use state::AppState;
