pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod import;

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info,sqlx=warn"))
            .format_timestamp(None)
            .init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::import::candidate::CandidateInfo;
    use crate::import::source::CandidateSource;
    use crate::import::store::PresentationStore;
    use futures::StreamExt;
    use futures::stream::{self, BoxStream};
    use parking_lot::Mutex;
    use sqlx::PgPool;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Table definitions matching the default [`TableNames`](crate::config::TableNames).
    pub const SCHEMA: &[&str] = &[
        r#"CREATE TABLE component_pres_meta_data (
               publication_id INTEGER NOT NULL,
               component_ref_id INTEGER NOT NULL,
               component_template_id INTEGER NOT NULL,
               component_output_format VARCHAR(64) NOT NULL,
               PRIMARY KEY (publication_id, component_ref_id, component_template_id)
           )"#,
        r#"CREATE TABLE component_presentations (
               publication_id INTEGER NOT NULL,
               component_id INTEGER NOT NULL,
               template_id INTEGER NOT NULL,
               content TEXT NOT NULL,
               PRIMARY KEY (publication_id, component_id, template_id)
           )"#,
        r#"CREATE TABLE tds_db_info (
               db_version VARCHAR(32) NOT NULL,
               description VARCHAR(255) NOT NULL
           )"#,
    ];

    type Key = (i32, i32, i32);

    fn key(candidate: &CandidateInfo) -> Key {
        (
            candidate.publication_id,
            candidate.component_id,
            candidate.template_id,
        )
    }

    /// How an injected insert failure manifests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailureMode {
        /// The statement returns a database error.
        Error,
        /// The statement succeeds but reports zero affected rows.
        NoRows,
        /// The insert panics.
        Panic,
    }

    /// In-memory metadata and presentation tables with failure injection.
    #[derive(Default)]
    pub struct MemoryCatalog {
        metadata: Mutex<Vec<CandidateInfo>>,
        presentations: Mutex<HashMap<Key, String>>,
        failures: Mutex<HashMap<Key, FailureMode>>,
        fail_query: AtomicBool,
    }

    impl MemoryCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_metadata(&self, candidate: CandidateInfo) {
            self.metadata.lock().push(candidate);
        }

        pub fn fail_insert(&self, candidate: &CandidateInfo, mode: FailureMode) {
            self.failures.lock().insert(key(candidate), mode);
        }

        pub fn clear_failures(&self) {
            self.failures.lock().clear();
        }

        pub fn fail_query(&self, fail: bool) {
            self.fail_query.store(fail, Ordering::SeqCst);
        }

        /// Presentation rows as `(publication, component, template, content)`, sorted.
        pub fn presentations(&self) -> Vec<(i32, i32, i32, String)> {
            let mut rows: Vec<_> = self
                .presentations
                .lock()
                .iter()
                .map(|(&(p, c, t), content)| (p, c, t, content.clone()))
                .collect();
            rows.sort();
            rows
        }
    }

    impl CandidateSource for MemoryCatalog {
        fn candidates(&self) -> BoxStream<'_, Result<CandidateInfo, sqlx::Error>> {
            if self.fail_query.load(Ordering::SeqCst) {
                let err = sqlx::Error::Protocol("injected candidate query failure".into());
                return stream::iter(vec![Err(err)]).boxed();
            }

            let presentations = self.presentations.lock();
            let pending: Vec<_> = self
                .metadata
                .lock()
                .iter()
                .filter(|candidate| !presentations.contains_key(&key(candidate)))
                .cloned()
                .map(Ok)
                .collect();

            stream::iter(pending).boxed()
        }
    }

    impl PresentationStore for MemoryCatalog {
        async fn insert_presentation(
            &self,
            candidate: &CandidateInfo,
            content: &str,
        ) -> Result<u64, sqlx::Error> {
            let mode = self.failures.lock().get(&key(candidate)).copied();
            match mode {
                Some(FailureMode::Error) => {
                    return Err(sqlx::Error::Protocol("injected insert failure".into()));
                }
                Some(FailureMode::NoRows) => return Ok(0),
                Some(FailureMode::Panic) => panic!("injected insert panic"),
                None => {}
            }

            let mut presentations = self.presentations.lock();
            if presentations.contains_key(&key(candidate)) {
                return Err(sqlx::Error::Protocol("duplicate presentation key".into()));
            }
            presentations.insert(key(candidate), content.to_string());
            Ok(1)
        }
    }

    /// Helpers for seeding and inspecting the import tables in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        pub async fn insert_metadata(&self, candidate: &CandidateInfo) -> Result<(), sqlx::Error> {
            sqlx::query(
                "INSERT INTO component_pres_meta_data (publication_id, component_ref_id, component_template_id, component_output_format) VALUES ($1, $2, $3, $4)",
            )
            .bind(candidate.publication_id)
            .bind(candidate.component_id)
            .bind(candidate.template_id)
            .bind(&candidate.output_format)
            .execute(self.pool)
            .await?;

            Ok(())
        }

        pub async fn insert_db_info(&self, version: &str, description: &str) -> Result<(), sqlx::Error> {
            sqlx::query("INSERT INTO tds_db_info (db_version, description) VALUES ($1, $2)")
                .bind(version)
                .bind(description)
                .execute(self.pool)
                .await?;

            Ok(())
        }

        pub async fn presentations(&self) -> Result<Vec<(i32, i32, i32, String)>, sqlx::Error> {
            sqlx::query_as(
                "SELECT publication_id, component_id, template_id, content FROM component_presentations ORDER BY 1, 2, 3",
            )
            .fetch_all(self.pool)
            .await
        }
    }

    pub mod database {
        use super::SCHEMA;
        use log::LevelFilter;
        use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use sqlx::{ConnectOptions, PgPool};
        use testcontainers::ImageExt;
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use uuid::Uuid;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("neither TEST_DATABASE_URL nor TEST_DATABASE_CONTAINER is set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database with the import tables, for integration tests.
        pub struct TestDatabase {
            pool: PgPool,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Use `TEST_DATABASE_URL` when set; otherwise launch a disposable
            /// Postgres container if `TEST_DATABASE_CONTAINER` is set.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
                    return Self::from_admin_url(&url, None).await;
                }
                if std::env::var_os("TEST_DATABASE_CONTAINER").is_some() {
                    return Self::new().await;
                }
                Err(TestDatabaseError::MissingUrl)
            }

            /// Provision a fresh database inside a new Postgres container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().with_tag("16-alpine").start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::from_admin_url(&admin_url, Some(container)).await
            }

            async fn from_admin_url(
                admin_url: &str,
                container: Option<ContainerAsync<Postgres>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = admin_url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(10)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await?;

                for statement in SCHEMA {
                    sqlx::query(statement).execute(&pool).await?;
                }

                Ok(Self {
                    pool,
                    admin_options,
                    database_name: new_db_name,
                    container,
                })
            }

            pub fn pool(&self) -> &PgPool {
                &self.pool
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool.clone()
            }

            /// Connect options for the ephemeral database itself.
            pub fn connect_options(&self) -> PgConnectOptions {
                self.admin_options.clone().database(&self.database_name)
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(self) -> Result<(), TestDatabaseError> {
                self.pool.close().await;

                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(self.admin_options)
                    .await?;
                let drop_sql = format!("DROP DATABASE \"{}\" WITH (FORCE)", self.database_name);
                sqlx::query(&drop_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                drop(self.container);
                Ok(())
            }
        }
    }
}
