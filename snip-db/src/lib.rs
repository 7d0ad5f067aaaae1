//! Database lifecycle management for the PostgreSQL document store.
//!
//! Provides migration running, status checking, and collection registration.

use sqlx::{PgPool, Row};
use tracing::{info, warn};

/// Result type for DB operations.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Run all pending migrations.
///
/// Uses sqlx migrations from the workspace `migrations` directory.
/// Idempotent: safe to run multiple times.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("../migrations").run(pool).await?;

    info!("Migrations completed successfully");
    Ok(())
}

/// Check database connectivity and migration status.
///
/// Logs the latest applied migrations and the registered collections.
pub async fn status(pool: &PgPool) -> Result<()> {
    // Check connectivity
    let result: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;

    if result != 1 {
        return Err(anyhow::anyhow!("Database connectivity check failed"));
    }

    info!("Database connectivity: OK");

    // Runtime query (sqlx::query! requires DB at compile time)
    let rows = sqlx::query(
        r#"
        SELECT version, description, installed_on::TEXT AS installed_on, success
        FROM _sqlx_migrations
        ORDER BY version DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await;

    match rows {
        Ok(migs) if !migs.is_empty() => {
            info!("Latest migrations:");
            for mig in migs {
                let version: i64 = mig.try_get("version")?;
                let description: String = mig.try_get("description")?;
                let installed_on: Option<String> = mig.try_get("installed_on")?;
                let success: bool = mig.try_get("success")?;

                let status = if success { "✓" } else { "✗" };
                info!(
                    "  {} v{}: {} ({})",
                    status,
                    version,
                    description,
                    installed_on.unwrap_or_else(|| "N/A".to_string())
                );
            }
        },
        Ok(_) => {
            warn!("No migrations found in database (run migrate first)");
            return Ok(());
        },
        Err(e) => {
            // Table might not exist yet
            if e.to_string().contains("_sqlx_migrations") {
                warn!("Migration table not found (run migrate first)");
                return Ok(());
            }
            return Err(e.into());
        },
    }

    let collections = sqlx::query(
        r#"
        SELECT c.name, c.partition_key_path, COUNT(d.id) AS documents
        FROM collections c
        LEFT JOIN documents d ON d.collection = c.name
        GROUP BY c.name, c.partition_key_path
        ORDER BY c.name
        "#,
    )
    .fetch_all(pool)
    .await?;

    for row in collections {
        let name: String = row.try_get("name")?;
        let path: String = row.try_get("partition_key_path")?;
        let documents: i64 = row.try_get("documents")?;
        info!(collection = %name, partition_key_path = %path, documents, "Collection");
    }

    Ok(())
}

/// Register a collection and its partition key path.
///
/// Idempotent for an identical registration. Re-registering a collection
/// under a different partition key path is an error, since existing
/// documents are already partitioned by the old path.
pub async fn register_collection(pool: &PgPool, name: &str, partition_key_path: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow::anyhow!("Collection name must not be empty"));
    }
    if !partition_key_path.starts_with('/') || partition_key_path.len() < 2 {
        return Err(anyhow::anyhow!(
            "Invalid partition key path '{}': expected '/<property>'",
            partition_key_path
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO collections (name, partition_key_path)
        VALUES ($1, $2)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(partition_key_path)
    .execute(pool)
    .await?;

    let existing: String =
        sqlx::query_scalar("SELECT partition_key_path FROM collections WHERE name = $1")
            .bind(name)
            .fetch_one(pool)
            .await?;

    if existing != partition_key_path {
        return Err(anyhow::anyhow!(
            "Collection '{}' is already partitioned by '{}'",
            name,
            existing
        ));
    }

    info!(collection = name, partition_key_path, "Collection registered");
    Ok(())
}
