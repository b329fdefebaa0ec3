use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::password::{hash_password, verify_password},
    config::SeedConfig,
    error::{AppError, AppResult},
    users::{
        repo::UserRepo,
        repo_types::{NewUser, Role, User},
    },
};

const MAX_NAME_LEN: usize = 50;
const MAX_EMAIL_LEN: usize = 100;

/// The domain needs at least one dot, so single-label hosts such as
/// `root@localhost` are rejected.
pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_new_user(name: &str, email: &str, password: &str) -> AppResult<()> {
    let name_len = name.trim().chars().count();
    if name_len == 0 || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "Name must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    if email.chars().count() > MAX_EMAIL_LEN || !is_valid_email(email) {
        return Err(AppError::validation("Invalid email"));
    }
    validate_password(password)
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::validation("Password must not be empty"));
    }
    Ok(())
}

/// A default account created by `seed`.
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub name: &'static str,
    pub email: &'static str,
    pub role: Role,
    pub password: Option<String>,
}

pub fn default_accounts(cfg: &SeedConfig) -> Vec<SeedAccount> {
    vec![
        SeedAccount {
            name: "Admin User",
            email: "admin@icarlton.com",
            role: Role::Admin,
            password: cfg.admin_password.clone(),
        },
        SeedAccount {
            name: "Support User",
            email: "support@icarlton.com",
            role: Role::Support,
            password: cfg.support_password.clone(),
        },
        SeedAccount {
            name: "Info User",
            email: "info@icarlton.com",
            role: Role::Info,
            password: cfg.info_password.clone(),
        },
    ]
}

/// User records plus the password rules around them.
#[derive(Clone)]
pub struct CredentialStore {
    repo: Arc<dyn UserRepo>,
}

impl CredentialStore {
    pub fn new(repo: Arc<dyn UserRepo>) -> Self {
        Self { repo }
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.repo.find_by_email(email).await
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        self.repo.find_by_id(id).await
    }

    pub async fn list(&self, skip: i64, limit: i64) -> AppResult<Vec<User>> {
        self.repo.list(skip, limit).await
    }

    #[instrument(skip(self, password))]
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        role: Role,
        password: &str,
    ) -> AppResult<User> {
        validate_new_user(name, email, password)?;

        if self.repo.find_by_email(email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = hash_password(password)?;
        let user = self
            .repo
            .insert(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                role,
                password_hash,
            })
            .await?;

        info!(user_id = user.id, role = %user.role, "user created");
        Ok(user)
    }

    #[instrument(skip(self, old_password, new_password))]
    pub async fn update_password(
        &self,
        id: i64,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.repo.find_by_id(id).await?.ok_or(AppError::NotFound)?;

        if !verify_password(old_password, &user.password_hash)? {
            warn!(user_id = id, "old password mismatch");
            return Err(AppError::InvalidCredential);
        }
        validate_password(new_password)?;

        let password_hash = hash_password(new_password)?;
        if !self.repo.set_password_hash(id, &password_hash).await? {
            return Err(AppError::NotFound);
        }

        info!(user_id = id, "password updated");
        Ok(())
    }

    /// Creates each account whose email is not present yet. Returns how many
    /// were created.
    pub async fn seed(&self, accounts: &[SeedAccount]) -> AppResult<usize> {
        let mut created = 0;
        for account in accounts {
            let Some(password) = account.password.as_deref() else {
                warn!(email = account.email, "no seed password configured; skipping");
                continue;
            };
            if self.repo.find_by_email(account.email).await?.is_some() {
                continue;
            }
            match self
                .create(account.name, account.email, account.role, password)
                .await
            {
                Ok(_) => created += 1,
                Err(AppError::DuplicateEmail) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::memory::MemoryUserRepo;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryUserRepo::new()))
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("root@localhost"));
        assert!(!is_valid_email("a x@x.com"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn create_hashes_and_persists() {
        let store = store();
        let user = store.create("A", "a@x.com", Role::User, "p1").await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.role, Role::User);
        assert_ne!(user.password_hash, "p1");
        assert!(verify_password("p1", &user.password_hash).unwrap());

        let found = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.email, "a@x.com");
        assert!(store.find_by_email("a@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_new_row() {
        let store = store();
        store.create("A", "a@x.com", Role::User, "p1").await.unwrap();
        let err = store
            .create("B", "a@x.com", Role::Admin, "p2")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
        assert_eq!(store.list(0, 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_validates_input() {
        let store = store();
        for (name, email, password) in [
            ("", "a@x.com", "p1"),
            ("A", "not-an-email", "p1"),
            ("A", "a@x.com", ""),
        ] {
            let err = store.create(name, email, Role::User, password).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{name:?} {email:?}");
        }
        let long_name = "n".repeat(51);
        assert!(store.create(&long_name, "a@x.com", Role::User, "p1").await.is_err());
    }

    #[tokio::test]
    async fn update_password_replaces_hash() {
        let store = store();
        let user = store.create("A", "a@x.com", Role::User, "p1").await.unwrap();
        store.update_password(user.id, "p1", "p2").await.unwrap();

        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(verify_password("p2", &user.password_hash).unwrap());
        assert!(!verify_password("p1", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn update_password_errors() {
        let store = store();
        let user = store.create("A", "a@x.com", Role::User, "p1").await.unwrap();

        let err = store.update_password(999, "p1", "p2").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));

        let err = store.update_password(user.id, "wrong", "p2").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));

        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(verify_password("p1", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn seed_is_idempotent_and_skips_unconfigured_accounts() {
        let store = store();
        let cfg = SeedConfig {
            admin_password: Some("Admin@123".into()),
            support_password: Some("Support@123".into()),
            info_password: None,
        };
        let accounts = default_accounts(&cfg);

        assert_eq!(store.seed(&accounts).await.unwrap(), 2);
        assert_eq!(store.seed(&accounts).await.unwrap(), 0);

        let admin = store.find_by_email("admin@icarlton.com").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(store.find_by_email("info@icarlton.com").await.unwrap().is_none());
        assert_eq!(store.list(0, 100).await.unwrap().len(), 2);
    }
}
