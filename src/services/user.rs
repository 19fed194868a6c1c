//! User service
//!
//! Keeps the local user directory in step with the identity provider. A
//! user is created on first login and its profile fields are overwritten on
//! every later login; users are never deleted here.

use crate::db::repositories::UserRepository;
use crate::models::{ProviderProfile, User};
use crate::services::auth::AuthError;
use chrono::Utc;
use std::sync::Arc;

/// User service for provider-linked accounts
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    /// Create a new user service with the given repository
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Insert or refresh the user identified by `profile.external_id`.
    ///
    /// Returns the stored record. When the insert loses a race with a
    /// concurrent first login for the same identity, the row written by the
    /// other request is re-read once and updated instead.
    ///
    /// # Errors
    ///
    /// `UserPersistenceFailed` for any store failure, or when no row can be
    /// read back after the insert.
    pub async fn upsert(&self, profile: &ProviderProfile) -> Result<User, AuthError> {
        if let Some(existing) = self.find_by_external_id(profile.external_id).await? {
            return self.refresh(existing, profile).await;
        }

        match self.repo.create(profile, Utc::now()).await {
            Ok(_) => self
                .find_by_external_id(profile.external_id)
                .await?
                .ok_or_else(|| {
                    AuthError::UserPersistenceFailed(format!(
                        "user {} missing after insert",
                        profile.external_id
                    ))
                }),
            Err(insert_err) => {
                tracing::warn!(
                    external_id = profile.external_id,
                    error = %format!("{:#}", insert_err),
                    "User insert failed, re-reading in case of a concurrent login"
                );
                match self.find_by_external_id(profile.external_id).await? {
                    Some(existing) => self.refresh(existing, profile).await,
                    None => Err(persistence_error(insert_err)),
                }
            }
        }
    }

    /// Get user by local ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        self.repo.get_by_id(id).await.map_err(persistence_error)
    }

    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<User>, AuthError> {
        self.repo
            .get_by_external_id(external_id)
            .await
            .map_err(persistence_error)
    }

    async fn refresh(&self, mut user: User, profile: &ProviderProfile) -> Result<User, AuthError> {
        user.apply_profile(profile);
        user.updated_at = Utc::now();
        self.repo
            .update_profile(&user)
            .await
            .map_err(persistence_error)?;
        Ok(user)
    }
}

fn persistence_error(err: anyhow::Error) -> AuthError {
    AuthError::UserPersistenceFailed(format!("{:#}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use async_trait::async_trait;
    use chrono::DateTime;
    use sqlx::Row;

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(SqlxUserRepository::boxed(pool.clone()));
        (pool, service)
    }

    fn profile(external_id: i64, login: &str, display_name: Option<&str>) -> ProviderProfile {
        ProviderProfile {
            external_id,
            login: login.to_string(),
            display_name: display_name.map(str::to_string),
            email: None,
            avatar_url: None,
        }
    }

    async fn count_users(pool: &DynDatabasePool) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
            .get("n")
    }

    #[tokio::test]
    async fn test_upsert_creates_user() {
        let (pool, service) = setup_test_service().await;

        let user = service
            .upsert(&profile(42, "alice", Some("Alice")))
            .await
            .expect("Failed to upsert");

        assert!(user.id > 0);
        assert_eq!(user.external_id, 42);
        assert_eq!(user.login, "alice");
        assert_eq!(count_users(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row_with_latest_name() {
        let (pool, service) = setup_test_service().await;

        let first = service
            .upsert(&profile(42, "alice", Some("Alice")))
            .await
            .unwrap();
        let second = service
            .upsert(&profile(42, "alice", Some("Alice Liddell")))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(count_users(&pool).await, 1);

        let stored = service.get_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Alice Liddell"));
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let (_pool, service) = setup_test_service().await;

        let first = service.upsert(&profile(7, "bob", None)).await.unwrap();
        let second = service.upsert(&profile(7, "bobby", None)).await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.login, "bobby");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let (_pool, service) = setup_test_service().await;
        assert!(service.get_by_id(999).await.unwrap().is_none());
    }

    /// Repository whose first lookup misses and whose insert always fails,
    /// simulating a concurrent login that wins the race.
    struct RacingRepository {
        inner: SqlxUserRepository,
        misses_left: std::sync::atomic::AtomicUsize,
        fail_insert: bool,
    }

    #[async_trait]
    impl UserRepository for RacingRepository {
        async fn create(
            &self,
            profile: &ProviderProfile,
            now: DateTime<Utc>,
        ) -> anyhow::Result<u64> {
            if self.fail_insert {
                // The competing request inserts first; ours then hits the
                // unique constraint.
                self.inner.create(profile, now).await?;
                anyhow::bail!("UNIQUE constraint failed: users.external_id");
            }
            self.inner.create(profile, now).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
            self.inner.get_by_id(id).await
        }

        async fn get_by_external_id(&self, external_id: i64) -> anyhow::Result<Option<User>> {
            use std::sync::atomic::Ordering;
            if self
                .misses_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(None);
            }
            self.inner.get_by_external_id(external_id).await
        }

        async fn update_profile(&self, user: &User) -> anyhow::Result<()> {
            self.inner.update_profile(user).await
        }
    }

    #[tokio::test]
    async fn test_upsert_recovers_from_insert_race() {
        let (pool, _service) = setup_test_service().await;
        let service = UserService::new(Arc::new(RacingRepository {
            inner: SqlxUserRepository::new(pool.clone()),
            misses_left: 1.into(),
            fail_insert: true,
        }));

        let user = service
            .upsert(&profile(42, "alice", Some("Alice")))
            .await
            .expect("Race should be recovered");

        assert_eq!(user.external_id, 42);
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
        assert_eq!(count_users(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_upsert_fails_when_insert_fails_and_no_row() {
        let (pool, _service) = setup_test_service().await;
        let service = UserService::new(Arc::new(RacingRepository {
            inner: SqlxUserRepository::new(pool.clone()),
            misses_left: 2.into(),
            fail_insert: true,
        }));

        let result = service.upsert(&profile(42, "alice", None)).await;
        assert!(matches!(result, Err(AuthError::UserPersistenceFailed(_))));
    }

    #[tokio::test]
    async fn test_upsert_fails_when_row_vanishes_after_insert() {
        let (pool, _service) = setup_test_service().await;
        let service = UserService::new(Arc::new(RacingRepository {
            inner: SqlxUserRepository::new(pool.clone()),
            misses_left: 2.into(),
            fail_insert: false,
        }));

        let result = service.upsert(&profile(42, "alice", None)).await;
        assert!(matches!(result, Err(AuthError::UserPersistenceFailed(_))));
    }
}
