use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::users::{
    repo::UserRepo,
    repo_types::{NewUser, User},
};

/// In-process user store, used when no database is configured.
#[derive(Default)]
pub struct MemoryUserRepo {
    rows: Mutex<Rows>,
}

#[derive(Default)]
struct Rows {
    last_id: i64,
    by_id: BTreeMap<i64, User>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.rows.lock().await.by_id.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let rows = self.rows.lock().await;
        Ok(rows.by_id.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self, skip: i64, limit: i64) -> AppResult<Vec<User>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .by_id
            .values()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn insert(&self, new_user: NewUser) -> AppResult<User> {
        let mut rows = self.rows.lock().await;
        if rows.by_id.values().any(|u| u.email == new_user.email) {
            return Err(AppError::DuplicateEmail);
        }
        rows.last_id += 1;
        let user = User {
            id: rows.last_id,
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
        };
        rows.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> AppResult<bool> {
        let mut rows = self.rows.lock().await;
        match rows.by_id.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test User".into(),
            email: email.into(),
            role: Role::User,
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_fresh_ids() {
        let repo = MemoryUserRepo::new();
        let a = repo.insert(new_user("a@x.com")).await.unwrap();
        let b = repo.insert(new_user("b@x.com")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(repo.find_by_id(b.id).await.unwrap().unwrap().email, "b@x.com");
    }

    #[tokio::test]
    async fn insert_rejects_taken_email() {
        let repo = MemoryUserRepo::new();
        repo.insert(new_user("a@x.com")).await.unwrap();
        let err = repo.insert(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
        assert_eq!(repo.list(0, 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() {
        let repo = MemoryUserRepo::new();
        repo.insert(new_user("a@x.com")).await.unwrap();
        assert!(repo.find_by_email("A@x.com").await.unwrap().is_none());
        assert!(repo.insert(new_user("A@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn list_honors_skip_and_limit() {
        let repo = MemoryUserRepo::new();
        for i in 0..5 {
            repo.insert(new_user(&format!("u{i}@x.com"))).await.unwrap();
        }
        let page = repo.list(1, 2).await.unwrap();
        let emails: Vec<_> = page.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, ["u1@x.com", "u2@x.com"]);
        assert!(repo.list(10, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_password_hash_reports_missing_user() {
        let repo = MemoryUserRepo::new();
        let user = repo.insert(new_user("a@x.com")).await.unwrap();
        assert!(repo.set_password_hash(user.id, "new").await.unwrap());
        assert_eq!(repo.find_by_id(user.id).await.unwrap().unwrap().password_hash, "new");
        assert!(!repo.set_password_hash(999, "new").await.unwrap());
    }
}
