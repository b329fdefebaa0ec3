mod app;
mod auth;
mod config;
mod error;
mod extract;
mod state;
mod users;

use crate::{config::AppConfig, state::AppState, users::services::default_accounts};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "gearup_users=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let state = AppState::init(config).await?;

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => {
            let (host, port) = (state.config.host.clone(), state.config.port);
            app::serve(app::build_app(state), &host, port).await?;
        }
        Some("seed") => {
            let accounts = default_accounts(&state.config.seed);
            let created = state.users.seed(&accounts).await?;
            tracing::info!(created, "users seeded");
        }
        Some(other) => anyhow::bail!("unknown command {other:?}; expected `serve` or `seed`"),
    }

    Ok(())
}
