//! Locally cached session and profile state.
//!
//! The auth flow itself lives outside this crate; whatever it hands over
//! (bearer token, role, display name, assigned line) is cached here so the
//! queue can attach identity to submissions captured offline.

use linereport_core::UserId;

use crate::store::KvStore;

const ACCESS_TOKEN_KEY: &str = "access_token";
const USER_ROLE_KEY: &str = "user_role";
const USER_NAME_KEY: &str = "user_name";
const USER_LINE_KEY: &str = "user_line";

const ADMIN_USER_ID: i64 = 1;
/// Backend user id submissions fall back to when no role is cached.
const DEFAULT_WORKER_ID: i64 = 2;

/// Cached session state over the key-value store.
#[derive(Debug, Clone)]
pub struct Session {
    kv: KvStore,
}

impl Session {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub async fn access_token(&self) -> anyhow::Result<Option<String>> {
        self.kv.get(ACCESS_TOKEN_KEY).await
    }

    pub async fn set_access_token(&self, token: &str) -> anyhow::Result<()> {
        self.kv.set(ACCESS_TOKEN_KEY, token).await
    }

    pub async fn clear_access_token(&self) -> anyhow::Result<()> {
        self.kv.remove(ACCESS_TOKEN_KEY).await
    }

    pub async fn user_role(&self) -> anyhow::Result<Option<String>> {
        self.kv.get(USER_ROLE_KEY).await
    }

    pub async fn set_user_role(&self, role: &str) -> anyhow::Result<()> {
        self.kv.set(USER_ROLE_KEY, role).await
    }

    pub async fn user_name(&self) -> anyhow::Result<Option<String>> {
        self.kv.get(USER_NAME_KEY).await
    }

    pub async fn set_user_name(&self, name: &str) -> anyhow::Result<()> {
        self.kv.set(USER_NAME_KEY, name).await
    }

    pub async fn user_line(&self) -> anyhow::Result<Option<String>> {
        self.kv.get(USER_LINE_KEY).await
    }

    pub async fn set_user_line(&self, line: &str) -> anyhow::Result<()> {
        self.kv.set(USER_LINE_KEY, line).await
    }

    /// Resolve the backend user id from the cached role.
    ///
    /// The backend keeps one admin account and one shared worker account;
    /// an absent or unknown role resolves to the worker id.
    pub async fn resolve_user_id(&self) -> anyhow::Result<UserId> {
        let role = self.user_role().await?;
        let id = match role.as_deref() {
            Some("SuperAdmin") => ADMIN_USER_ID,
            _ => DEFAULT_WORKER_ID,
        };
        Ok(UserId::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_worker_id_when_no_role_cached() {
        let session = Session::new(KvStore::in_memory());
        assert_eq!(
            session.resolve_user_id().await.unwrap(),
            UserId::new(DEFAULT_WORKER_ID)
        );
    }

    #[tokio::test]
    async fn resolves_admin_id_for_super_admin_role() {
        let session = Session::new(KvStore::in_memory());
        session.set_user_role("SuperAdmin").await.unwrap();
        assert_eq!(
            session.resolve_user_id().await.unwrap(),
            UserId::new(ADMIN_USER_ID)
        );
    }

    #[tokio::test]
    async fn token_set_get_clear() {
        let session = Session::new(KvStore::in_memory());
        assert!(session.access_token().await.unwrap().is_none());

        session.set_access_token("jwt-abc").await.unwrap();
        assert_eq!(session.access_token().await.unwrap().as_deref(), Some("jwt-abc"));

        session.clear_access_token().await.unwrap();
        assert!(session.access_token().await.unwrap().is_none());
    }
}
