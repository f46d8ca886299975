use postgresql_embedded::PostgreSQL;
use tokio::runtime::{Builder, Runtime};

/// A running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    runtime: Runtime,
    postgresql: PostgreSQL,
    pub port: u16,
    /// `postgresql://` URL of the test database, credentials included.
    pub database_url: String,
}

/// Set up an embedded `PostgreSQL` instance and create `dbname` on it.
///
/// # Errors
/// Returns an error if the server cannot be installed or started, or if the database cannot
/// be created.
pub fn setup_postgres_embedded(
    dbname: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    let (postgresql, port, database_url) = runtime.block_on(async {
        let mut postgresql = PostgreSQL::default();
        // bundled binaries, nothing is downloaded at test time
        postgresql.setup().await?;
        postgresql.start().await?;
        postgresql.create_database(dbname).await?;

        let settings = postgresql.settings();
        let port = settings.port;
        let database_url = format!(
            "postgresql://{}:{}@{}:{port}/{dbname}",
            settings.username, settings.password, settings.host
        );
        Ok::<_, Box<dyn std::error::Error>>((postgresql, port, database_url))
    })?;
    tracing::info!(port, "embedded postgres started");

    Ok(EmbeddedPostgres {
        runtime,
        postgresql,
        port,
        database_url,
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres {
        runtime,
        postgresql,
        port,
        ..
    } = postgres;
    if let Err(err) = runtime.block_on(postgresql.stop()) {
        tracing::warn!(port, error = %err, "stopping embedded postgres failed");
    }
}
