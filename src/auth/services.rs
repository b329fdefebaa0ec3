use axum::extract::FromRef;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        jwt::{IssuedToken, JwtKeys},
        password::{verify_dummy, verify_password},
    },
    error::{AppError, AppResult},
    state::AppState,
    users::services::CredentialStore,
};

/// Verifies credentials against the store and issues access tokens.
#[derive(Clone)]
pub struct AuthService {
    users: CredentialStore,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth()
    }
}

impl AuthService {
    pub fn new(users: CredentialStore, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    /// Unknown email and wrong password fail identically, and both pay for
    /// one hash verification.
    #[instrument(skip(self, email, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<IssuedToken> {
        let Some(user) = self.users.find_by_email(email).await? else {
            verify_dummy(password);
            warn!("login unknown email");
            return Err(AppError::InvalidCredential);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = user.id, "login invalid password");
            return Err(AppError::InvalidCredential);
        }

        let issued = self.keys.issue_access(&user.email)?;
        info!(user_id = user.id, "user logged in");
        Ok(issued)
    }

    /// Returns the token's subject.
    pub fn verify_token(&self, token: &str) -> AppResult<String> {
        self.keys.verify_token(token).map(|claims| claims.sub)
    }
}
