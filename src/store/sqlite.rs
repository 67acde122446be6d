use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;
use crate::store::{ProfileStore, UserProfile, VersionedProfile};

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow)]
struct ProfileRow {
    uid: String,
    email: String,
    is_premium: bool,
    analysis_count: i64,
    analysis_limit: i64,
    version: i64,
}

impl From<ProfileRow> for VersionedProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            profile: UserProfile {
                uid: row.uid,
                email: row.email,
                is_premium: row.is_premium,
                analysis_count: row.analysis_count,
                analysis_limit: row.analysis_limit,
            },
            version: row.version,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HistoryRecord {
    pub id: String,
    pub uid: String,
    pub kind: String,
    pub title: String,
    pub confidence_score: Option<i64>,
    pub payload: String,
    pub report: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiCostRecord {
    pub id: Option<i64>,
    pub provider: String,
    pub endpoint: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cost: String,
    pub flow: Option<String>,
    pub created_at: Option<String>,
}

impl Store {
    /// Create a Store from an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        let in_memory = database_path == ":memory:";
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Every connection to :memory: is its own database
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // sqlx doesn't support multiple statements in one call
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    // --- Profile operations ---

    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        Ok(self.load(uid).await?.map(|v| v.profile))
    }

    /// Administrative upsert, outside of the quota transaction.
    pub async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_profiles (uid, email, is_premium, analysis_count, analysis_limit, version)
             VALUES (?, ?, ?, ?, ?, 1)
             ON CONFLICT(uid) DO UPDATE SET
                email = excluded.email,
                is_premium = excluded.is_premium,
                analysis_count = excluded.analysis_count,
                analysis_limit = excluded.analysis_limit,
                version = user_profiles.version + 1,
                updated_at = datetime('now')",
        )
        .bind(&profile.uid)
        .bind(&profile.email)
        .bind(profile.is_premium)
        .bind(profile.analysis_count)
        .bind(profile.analysis_limit)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- History operations ---

    pub async fn insert_history(&self, record: &HistoryRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO analysis_history (id, uid, kind, title, confidence_score, payload, report)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.uid)
        .bind(&record.kind)
        .bind(&record.title)
        .bind(record.confidence_score)
        .bind(&record.payload)
        .bind(&record.report)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_history(&self, uid: &str, limit: i64) -> Result<Vec<HistoryRecord>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            "SELECT id, uid, kind, title, confidence_score, payload, report, created_at
             FROM analysis_history WHERE uid = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(uid)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    // --- API cost operations ---

    pub async fn insert_api_cost(&self, cost: &ApiCostRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO api_costs (provider, endpoint, input_tokens, output_tokens, cost, flow)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&cost.provider)
        .bind(&cost.endpoint)
        .bind(cost.input_tokens)
        .bind(cost.output_tokens)
        .bind(&cost.cost)
        .bind(&cost.flow)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_total_api_cost(&self) -> Result<Decimal> {
        let costs: Vec<(String,)> = sqlx::query_as("SELECT cost FROM api_costs")
            .fetch_all(&self.pool)
            .await?;

        Ok(costs
            .iter()
            .filter_map(|(c,)| Decimal::from_str(c).ok())
            .sum())
    }

    pub async fn get_all_api_costs(&self) -> Result<Vec<ApiCostRecord>> {
        let costs = sqlx::query_as::<_, ApiCostRecord>(
            "SELECT id, provider, endpoint, input_tokens, output_tokens, cost, flow, created_at
             FROM api_costs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(costs)
    }
}

#[async_trait]
impl ProfileStore for Store {
    async fn load(&self, uid: &str) -> Result<Option<VersionedProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT uid, email, is_premium, analysis_count, analysis_limit, version
             FROM user_profiles WHERE uid = ?",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(VersionedProfile::from))
    }

    async fn compare_and_swap(
        &self,
        expected: Option<i64>,
        profile: &UserProfile,
    ) -> Result<bool> {
        let result = match expected {
            None => {
                sqlx::query(
                    "INSERT OR IGNORE INTO user_profiles
                     (uid, email, is_premium, analysis_count, analysis_limit, version)
                     VALUES (?, ?, ?, ?, ?, 1)",
                )
                .bind(&profile.uid)
                .bind(&profile.email)
                .bind(profile.is_premium)
                .bind(profile.analysis_count)
                .bind(profile.analysis_limit)
                .execute(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    "UPDATE user_profiles SET
                        email = ?, is_premium = ?, analysis_count = ?, analysis_limit = ?,
                        version = version + 1, updated_at = datetime('now')
                     WHERE uid = ? AND version = ?",
                )
                .bind(&profile.email)
                .bind(profile.is_premium)
                .bind(profile.analysis_count)
                .bind(profile.analysis_limit)
                .bind(&profile.uid)
                .bind(version)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProfileTransaction;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_store_create_and_migrate() {
        let store = Store::new(":memory:").await.expect("should create store");
        assert!(store.get_profile("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_transaction_roundtrip() {
        let store = Store::new(":memory:").await.unwrap();

        let mut tx = ProfileTransaction::begin(&store, "u1");
        assert!(tx.get().await.unwrap().is_none());
        tx.set(UserProfile::new_default("u1", Some("fan@example.com"), 10));
        assert!(tx.commit().await.unwrap());

        let mut tx = ProfileTransaction::begin(&store, "u1");
        let mut profile = tx.get().await.unwrap().unwrap();
        profile.analysis_count += 1;
        tx.set(profile);
        assert!(tx.commit().await.unwrap());

        let stored = store.load("u1").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.profile.analysis_count, 1);
        assert_eq!(stored.profile.email, "fan@example.com");
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected() {
        let store = Store::new(":memory:").await.unwrap();
        let profile = UserProfile::new_default("u1", None, 10);
        assert!(store.compare_and_swap(None, &profile).await.unwrap());
        // A second bootstrap must not overwrite the first
        assert!(!store.compare_and_swap(None, &profile).await.unwrap());
        assert!(!store.compare_and_swap(Some(5), &profile).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_profile_bumps_version() {
        let store = Store::new(":memory:").await.unwrap();
        let mut profile = UserProfile::new_default("u1", None, 10);
        store.upsert_profile(&profile).await.unwrap();
        profile.is_premium = true;
        store.upsert_profile(&profile).await.unwrap();

        let stored = store.load("u1").await.unwrap().unwrap();
        assert!(stored.profile.is_premium);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_history_insert_and_query() {
        let store = Store::new(":memory:").await.unwrap();
        for i in 0..3 {
            store
                .insert_history(&HistoryRecord {
                    id: format!("h{i}"),
                    uid: "u1".to_string(),
                    kind: "match".to_string(),
                    title: format!("Arsenal vs Chelsea #{i}"),
                    confidence_score: Some(65),
                    payload: "{}".to_string(),
                    report: "report".to_string(),
                    created_at: None,
                })
                .await
                .unwrap();
        }

        let history = store.get_history("u1", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, "h2");
        assert!(store.get_history("u2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_cost_total() {
        let store = Store::new(":memory:").await.unwrap();
        for cost in ["0.0105", "0.36"] {
            store
                .insert_api_cost(&ApiCostRecord {
                    id: None,
                    provider: "anthropic".to_string(),
                    endpoint: Some("messages".to_string()),
                    input_tokens: Some(1),
                    output_tokens: Some(1),
                    cost: cost.to_string(),
                    flow: Some("narrative".to_string()),
                    created_at: None,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.get_total_api_cost().await.unwrap(), dec!(0.3705));
        assert_eq!(store.get_all_api_costs().await.unwrap().len(), 2);
    }
}
