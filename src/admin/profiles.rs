/// Profile moderation state
use crate::{
    db::account::Profile,
    error::{HubError, HubResult},
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const PROFILE_COLUMNS: &str = "user_id, username, display_name, avatar_url, is_banned, ban_reason, \
                               is_verified, certification_type, created_at";

/// Unfiltered listings return this many newest profiles
pub const LIST_LIMIT: i64 = 100;
/// Searches return at most this many matches
pub const SEARCH_LIMIT: i64 = 50;

/// Profile manager
#[derive(Clone)]
pub struct ProfileManager {
    db: SqlitePool,
}

impl ProfileManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get_profile(&self, user_id: &str) -> HubResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {} FROM profiles WHERE user_id = ?",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(profile)
    }

    /// Fetch several profiles at once; unknown ids are skipped
    pub async fn get_profiles(&self, user_ids: &[String]) -> HubResult<Vec<Profile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM profiles WHERE user_id IN (", PROFILE_COLUMNS));
        let mut separated = builder.separated(", ");
        for id in user_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let profiles = builder
            .build_query_as::<Profile>()
            .fetch_all(&self.db)
            .await?;

        Ok(profiles)
    }

    /// Newest profiles, or a case-insensitive substring search over
    /// username and display name
    pub async fn list_profiles(&self, search: Option<&str>) -> HubResult<Vec<Profile>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let profiles = match search {
            Some(term) => {
                let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
                sqlx::query_as::<_, Profile>(&format!(
                    r#"
                    SELECT {} FROM profiles
                    WHERE LOWER(username) LIKE ?1 ESCAPE '\'
                       OR LOWER(COALESCE(display_name, '')) LIKE ?1 ESCAPE '\'
                    ORDER BY created_at DESC
                    LIMIT ?2
                    "#,
                    PROFILE_COLUMNS
                ))
                .bind(pattern)
                .bind(SEARCH_LIMIT)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Profile>(&format!(
                    "SELECT {} FROM profiles ORDER BY created_at DESC LIMIT ?",
                    PROFILE_COLUMNS
                ))
                .bind(LIST_LIMIT)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(profiles)
    }

    /// Flag an account as banned
    pub async fn set_banned(&self, user_id: &str, reason: &str) -> HubResult<()> {
        let result =
            sqlx::query("UPDATE profiles SET is_banned = 1, ban_reason = ? WHERE user_id = ?")
                .bind(reason)
                .bind(user_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(HubError::NotFound(format!("Profile {} not found", user_id)));
        }

        Ok(())
    }

    /// Clear the ban flag and reason
    pub async fn clear_ban(&self, user_id: &str) -> HubResult<()> {
        let result =
            sqlx::query("UPDATE profiles SET is_banned = 0, ban_reason = NULL WHERE user_id = ?")
                .bind(user_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(HubError::NotFound(format!("Profile {} not found", user_id)));
        }

        Ok(())
    }

    pub async fn is_banned(&self, user_id: &str) -> HubResult<bool> {
        let banned: Option<bool> =
            sqlx::query_scalar("SELECT is_banned FROM profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;

        Ok(banned.unwrap_or(false))
    }

    pub async fn delete_profile(&self, user_id: &str) -> HubResult<u64> {
        let result = sqlx::query("DELETE FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> HubResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
