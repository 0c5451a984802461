use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aits_client::routes::{RoleRouter, ViewKind};
use aits_client::services::Dashboard;
use aits_client::{AppState, ClientConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "aits_client=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::new_from_env()?;
    info!("Using API at {}", config.api_base_url);

    let state = AppState::connect(config).await?;

    if std::env::args().any(|a| a == "--logout") {
        state.session.logout().await?;
        return Ok(());
    }

    if state.session.restore().await?.is_none() {
        match (std::env::var("AITS_EMAIL"), std::env::var("AITS_PASSWORD")) {
            (Ok(email), Ok(password)) => {
                state.session.login(state.api.as_ref(), &email, &password).await?;
            }
            _ => {
                info!("Not signed in; set AITS_EMAIL and AITS_PASSWORD to log in");
                return Ok(());
            }
        }
    }

    let view = RoleRouter::resolve(state.session.current().as_ref());
    if view == ViewKind::Denied {
        warn!("Role {:?} has no dashboard", state.session.role());
        return Ok(());
    }

    let (dashboard, mut errors) = Dashboard::mount(&state, view)?;
    let mut report = tokio::time::interval(Duration::from_secs(10));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(err) = errors.recv() => {
                error!("{}", err);
                if err.is_auth_expired() {
                    break;
                }
            }
            _ = report.tick() => {
                let stats = dashboard.stats().unwrap_or_default();
                info!(
                    "{:?}: {} issues ({} open, {} overdue, {} resolved), {} unread notifications",
                    view,
                    dashboard.issues().len(),
                    stats.open_issues,
                    stats.overdue_issues,
                    stats.resolved_issues,
                    dashboard.unread_count()
                );
            }
        }
    }

    dashboard.unmount();
    Ok(())
}
