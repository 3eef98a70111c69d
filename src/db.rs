use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

/// Identification string reported by the connectivity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: String,
    pub description: String,
}

/// Open a pool with one connection per worker plus one for the candidate cursor.
pub async fn connect(options: PgConnectOptions, concurrency: usize) -> Result<PgPool, sqlx::Error> {
    let max_connections = u32::try_from(concurrency.max(1) + 1).unwrap_or(u32::MAX);

    log::info!(
        "connecting to {}:{} with {} connections",
        options.get_host(),
        options.get_port(),
        max_connections
    );

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Sanity check run before any candidate is touched.
///
/// Reads the first row of the info table when one is configured, otherwise
/// the server's own version string. `Ok(None)` means the info table is empty.
pub async fn check_server(
    pool: &PgPool,
    info_table: Option<&str>,
) -> Result<Option<ServerInfo>, sqlx::Error> {
    match info_table {
        Some(table) => {
            let query = format!("SELECT db_version, description FROM {} LIMIT 1", table);
            let row: Option<(String, String)> = sqlx::query_as(&query).fetch_optional(pool).await?;

            Ok(row.map(|(version, description)| ServerInfo {
                version,
                description,
            }))
        }
        None => {
            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            Ok(Some(ServerInfo {
                version,
                description: "PostgreSQL".to_string(),
            }))
        }
    }
}
