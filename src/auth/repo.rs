use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User, UserChanges},
    error::StoreError,
};

/// Credential store. Every mutation is a single atomic statement.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, StoreError>;
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    /// Increments the login counter and returns the updated record.
    async fn record_login(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn mark_verified(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn set_verification_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;
    /// Matches an unexpired token, marks the owner verified and clears the token.
    async fn consume_verification_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;
    async fn update_profile(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

const USER_COLUMNS: &str = "id, username, email, phone_number, password_hash, avatar, is_verified, \
     login_count, verification_token, verification_token_expires_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email", email).await
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, StoreError> {
        self.find_one("phone_number", phone_number).await
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, phone_number, password_hash, avatar)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.phone_number)
            .bind(&new.password_hash)
            .bind(&new.avatar)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn record_login(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET login_count = login_count + 1, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn mark_verified(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET is_verified = TRUE, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn set_verification_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET verification_token = $2,
                   verification_token_expires_at = $3,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(token)
            .bind(expires_at)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET is_verified = TRUE,
                   verification_token = NULL,
                   verification_token_expires_at = NULL,
                   updated_at = now()
             WHERE verification_token = $1
               AND verification_token_expires_at > $2
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   email = COALESCE($3, email),
                   phone_number = COALESCE($4, phone_number),
                   avatar = COALESCE($5, avatar),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.username)
            .bind(changes.email)
            .bind(changes.phone_number)
            .bind(changes.avatar)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod pg_tests {
    use time::Duration;

    use super::*;
    use crate::{auth::repo_types::NewUser, db::test_pool};

    fn new_user() -> NewUser {
        let tag = Uuid::new_v4();
        NewUser {
            username: "pg-user".into(),
            email: format!("{}@pg.test", tag.simple()),
            phone_number: format!("+1{}", tag.as_u128() % 10_000_000_000),
            password_hash: "hash".into(),
            avatar: "avatar1.png".into(),
        }
    }

    #[tokio::test]
    async fn verification_token_is_consumed_once() {
        let Some(pool) = test_pool().await else { return };
        let repo = PgUserRepo::new(pool);
        let user = repo.create(new_user()).await.unwrap();
        let token = Uuid::new_v4().simple().to_string();
        let now = OffsetDateTime::now_utc();

        repo.set_verification_token(user.id, &token, now + Duration::hours(24))
            .await
            .unwrap()
            .unwrap();

        let verified = repo.consume_verification_token(&token, now).await.unwrap().unwrap();
        assert!(verified.is_verified);
        assert!(verified.verification_token.is_none());
        assert!(repo.consume_verification_token(&token, now).await.unwrap().is_none());

        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    async fn expired_verification_token_is_not_consumed() {
        let Some(pool) = test_pool().await else { return };
        let repo = PgUserRepo::new(pool);
        let user = repo.create(new_user()).await.unwrap();
        let token = Uuid::new_v4().simple().to_string();
        let now = OffsetDateTime::now_utc();

        repo.set_verification_token(user.id, &token, now - Duration::minutes(1))
            .await
            .unwrap()
            .unwrap();
        assert!(repo.consume_verification_token(&token, now).await.unwrap().is_none());
        assert!(!repo.find_by_id(user.id).await.unwrap().unwrap().is_verified);

        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_email_maps_to_email_conflict() {
        let Some(pool) = test_pool().await else { return };
        let repo = PgUserRepo::new(pool);
        let first = new_user();
        let user = repo.create(first.clone()).await.unwrap();

        let err = repo
            .create(NewUser {
                phone_number: new_user().phone_number,
                ..first
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("Email")));

        repo.delete(user.id).await.unwrap();
    }
}
