// db/userdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::usermodel::User;

/// Read access to accounts owned by the identity service.
#[async_trait]
pub trait UserExt {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Names and contact details of the people on either side of a request.
#[async_trait]
pub trait IdentityProvider {
    async fn get_display_name(&self, user_id: Uuid) -> Result<Option<String>, Error>;

    async fn get_contact(&self, user_id: Uuid) -> Result<Option<User>, Error>;
}

#[async_trait]
impl<T> IdentityProvider for T
where
    T: UserExt + Send + Sync,
{
    async fn get_display_name(&self, user_id: Uuid) -> Result<Option<String>, Error> {
        Ok(self.get_user(user_id).await?.map(|user| user.name))
    }

    async fn get_contact(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        self.get_user(user_id).await
    }
}
