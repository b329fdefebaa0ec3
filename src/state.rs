use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::{jwt::JwtKeys, services::AuthService};
use crate::config::AppConfig;
use crate::users::{
    memory::MemoryUserRepo,
    repo::{PgUserRepo, UserRepo, MIGRATOR},
    services::CredentialStore,
};

#[derive(Clone)]
pub struct AppState {
    pub users: CredentialStore,
    pub keys: JwtKeys,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects the configured store, running migrations for PostgreSQL.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let repo: Arc<dyn UserRepo> = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                MIGRATOR
                    .run(&db)
                    .await
                    .context("run migrations")?;
                Arc::new(PgUserRepo::new(db))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; users are kept in memory only");
                Arc::new(MemoryUserRepo::new())
            }
        };

        Ok(Self::from_parts(repo, config))
    }

    pub fn from_parts(repo: Arc<dyn UserRepo>, config: Arc<AppConfig>) -> Self {
        Self {
            users: CredentialStore::new(repo),
            keys: JwtKeys::from_config(&config.jwt),
            config,
        }
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.users.clone(), self.keys.clone())
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 30,
            },
            seed: Default::default(),
        });
        Self::from_parts(Arc::new(MemoryUserRepo::new()), config)
    }
}
