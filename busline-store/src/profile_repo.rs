use async_trait::async_trait;
use sqlx::PgPool;

use busline_core::repository::{Profile, ProfileRepository};
use busline_core::CoreResult;

use crate::storage;

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: String,
    full_name: String,
}

pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn upsert_profile(&self, profile: &Profile) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, full_name) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.full_name)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> CoreResult<Option<Profile>> {
        let row: Option<ProfileRow> =
            sqlx::query_as("SELECT user_id, full_name FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;

        Ok(row.map(|r| Profile { user_id: r.user_id, full_name: r.full_name }))
    }
}
