use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Object, Pool, Runtime};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::Row;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::DatabaseConfig,
    error::{ApiError, ApiResult},
    models::{ApiKeyRecord, NewPost, Post, PostId},
    store::{ApiKeyStore, PostStore},
};

const POST_COLUMNS: &str =
    "id, title, acceleration_x, acceleration_y, acceleration_z, latitude, longitude, created_at";

/// Durable store backed by a PostgreSQL connection pool.
///
/// Posts get their id (`uuid_generate_v4()`) and creation time (`NOW()`) from
/// the database. API keys of every owner live in a single `api_keys` table so
/// a key can be found without knowing its owner.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Build the pool and verify it can reach the database
    pub async fn new(config: DatabaseConfig) -> Result<Self, ApiError> {
        info!("Creating PostgreSQL connection pool for host: {}:{}", config.host, config.port);

        let pool = Self::create_pool(config)?;

        let store = PgStore { pool };
        store.test_connection().await?;

        Ok(store)
    }

    fn create_pool(config: DatabaseConfig) -> Result<Pool, ApiError> {
        let mut pg_config = Config::new();

        pg_config.host = Some(config.host);
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database);
        pg_config.user = Some(config.username);
        pg_config.password = Some(config.password);
        pg_config.connect_timeout = Some(config.connection_timeout);

        pg_config.ssl_mode = Some(match config.ssl_mode.as_str() {
            "disable" => deadpool_postgres::SslMode::Disable,
            "prefer" => deadpool_postgres::SslMode::Prefer,
            "require" => deadpool_postgres::SslMode::Require,
            other => {
                warn!("Unknown SSL mode '{}', defaulting to 'require'", other);
                deadpool_postgres::SslMode::Require
            }
        });

        pg_config.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        pg_config.pool = Some(deadpool_postgres::PoolConfig::new(config.max_connections as usize));

        let tls_connector = TlsConnector::builder().build().map_err(|e| {
            error!("Failed to create TLS connector: {}", e);
            ApiError::Database(format!("TLS connector creation failed: {}", e))
        })?;
        let tls = MakeTlsConnector::new(tls_connector);

        pg_config.create_pool(Some(Runtime::Tokio1), tls).map_err(|e| {
            error!("Failed to create connection pool: {}", e);
            ApiError::Database(format!("Connection pool creation failed: {}", e))
        })
    }

    async fn get_connection(&self) -> Result<Object, ApiError> {
        self.pool.get().await.map_err(ApiError::from)
    }

    async fn test_connection(&self) -> Result<(), ApiError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("Database connection test failed: {}", e);
            ApiError::Database(format!("Connection test failed: {}", e))
        })?;

        info!("Database connection test successful");
        Ok(())
    }

    /// Create the `posts` and `api_keys` tables if they are missing
    pub async fn migrate(&self) -> Result<(), ApiError> {
        info!("Running database migrations");

        let client = self.get_connection().await?;

        let statements = [
            ("uuid extension", "CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\""),
            (
                "posts table",
                r#"
                CREATE TABLE IF NOT EXISTS posts (
                    id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
                    title TEXT NOT NULL CHECK (title <> ''),
                    acceleration_x DOUBLE PRECISION,
                    acceleration_y DOUBLE PRECISION,
                    acceleration_z DOUBLE PRECISION,
                    latitude DOUBLE PRECISION,
                    longitude DOUBLE PRECISION,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "posts created_at index",
                "CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)",
            ),
            (
                "api_keys table",
                r#"
                CREATE TABLE IF NOT EXISTS api_keys (
                    id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
                    owner_id TEXT NOT NULL,
                    key TEXT NOT NULL UNIQUE,
                    usage BIGINT NOT NULL DEFAULT 0 CHECK (usage >= 0),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "api_keys owner index",
                "CREATE INDEX IF NOT EXISTS idx_api_keys_owner_id ON api_keys(owner_id)",
            ),
        ];

        for (name, sql) in statements {
            client.execute(sql, &[]).await.map_err(|e| {
                error!("Failed to create {}: {}", name, e);
                ApiError::Database(format!("Migration of {} failed: {}", name, e))
            })?;
        }

        info!("Database migrations completed successfully");
        Ok(())
    }
}

fn post_from_row(row: &Row) -> Post {
    let id: Uuid = row.get(0);
    let created_at: DateTime<Utc> = row.get(7);

    Post {
        id: PostId::Text(id.to_string()),
        title: row.get(1),
        acceleration_x: row.get(2),
        acceleration_y: row.get(3),
        acceleration_z: row.get(4),
        latitude: row.get(5),
        longitude: row.get(6),
        created_at: Some(created_at),
    }
}

fn api_key_from_row(row: &Row) -> ApiKeyRecord {
    let id: Uuid = row.get(0);

    ApiKeyRecord {
        id: id.to_string(),
        owner_id: row.get(1),
        key: row.get(2),
        usage: row.get(3),
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn list(&self) -> ApiResult<Vec<Post>> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM posts ORDER BY created_at ASC", POST_COLUMNS);

        let rows = client.query(query.as_str(), &[]).await.map_err(ApiError::from)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn append(&self, post: NewPost) -> ApiResult<Post> {
        let client = self.get_connection().await?;

        // id and created_at come from column defaults
        let query = format!(
            r#"
            INSERT INTO posts (title, acceleration_x, acceleration_y, acceleration_z, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            POST_COLUMNS
        );

        let row = client
            .query_one(
                query.as_str(),
                &[
                    &post.title,
                    &post.acceleration_x,
                    &post.acceleration_y,
                    &post.acceleration_z,
                    &post.latitude,
                    &post.longitude,
                ],
            )
            .await
            .map_err(ApiError::from)?;

        let created = post_from_row(&row);
        info!("Created post with id: {}", created.id);
        Ok(created)
    }

    async fn health_check(&self) -> ApiResult<()> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("Database health check failed: {}", e);
            ApiError::Database(format!("Health check failed: {}", e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn find_by_key(&self, key: &str) -> ApiResult<Option<ApiKeyRecord>> {
        let client = self.get_connection().await?;
        let query = "SELECT id, owner_id, key, usage FROM api_keys WHERE key = $1 LIMIT 1";

        let row = client.query_opt(query, &[&key]).await.map_err(ApiError::from)?;

        Ok(row.as_ref().map(api_key_from_row))
    }

    async fn increment_usage(&self, record: &ApiKeyRecord, quota: i64) -> ApiResult<i64> {
        let id = Uuid::parse_str(&record.id)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Malformed API key id {}: {}", record.id, e)))?;

        let mut client = self.get_connection().await?;
        let transaction = client.transaction().await.map_err(ApiError::from)?;

        // Row lock so concurrent requests with the same key serialize here
        let row = transaction
            .query_opt("SELECT usage FROM api_keys WHERE id = $1 FOR UPDATE", &[&id])
            .await
            .map_err(ApiError::from)?;

        let usage: i64 = match row {
            Some(row) => row.get(0),
            None => {
                // Dropping the transaction rolls it back
                error!("API key record {} vanished before its usage could be recorded", record.id);
                return Err(ApiError::database(format!(
                    "API key record {} no longer exists",
                    record.id
                )));
            }
        };

        if usage >= quota {
            return Err(ApiError::QuotaExceeded { quota });
        }

        let row = transaction
            .query_one(
                "UPDATE api_keys SET usage = usage + 1 WHERE id = $1 RETURNING usage",
                &[&id],
            )
            .await
            .map_err(ApiError::from)?;

        transaction.commit().await.map_err(|e| {
            error!("Failed to commit API key usage for {}: {}", record.id, e);
            ApiError::from(e)
        })?;

        Ok(row.get(0))
    }
}
