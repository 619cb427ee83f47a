use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use office_hours::{
    config, HttpNotificationGateway, OfficeHoursConfig, SessionContext, SqliteStore, StaticAuthProvider,
    WorkflowEngine,
};

pub mod admin;
pub mod appointments;
pub mod directory;
pub mod presence;

/// Opens the configured database and hands the store to `f`.
pub async fn with_store<F, Fut, R>(f: F) -> Result<R>
where
    F: FnOnce(Arc<SqliteStore>) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let config = config()?;
    let database = config
        .database
        .as_ref()
        .context("No database configured; set [database] in office-hours.toml")?;

    print!("🔄 Opening database... ");
    let _ = std::io::stdout().flush();

    let db_path = database
        .url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    match SqliteStore::connect(&database.url, database.max_connections, database.auto_migrate).await {
        Ok(store) => {
            println!("✅");
            let store = Arc::new(store);
            let result = f(store.clone()).await;
            store.shutdown().await;
            result
        }
        Err(e) => {
            println!("❌ Failed to open database: {e}");
            Err(e.into())
        }
    }
}

pub fn cli_session(config: &OfficeHoursConfig) -> Result<SessionContext> {
    config.session.to_session().context(
        "Not signed in: set OFFICE_HOURS__SESSION__USER_ID and OFFICE_HOURS__SESSION__ACCESS_TOKEN",
    )
}

/// Starts a workflow engine for the configured session against `store`.
pub async fn start_engine(store: Arc<SqliteStore>) -> Result<WorkflowEngine> {
    let config = config()?;
    let session = cli_session(config)?;
    let auth = Arc::new(StaticAuthProvider::signed_in(session));
    let gateway = HttpNotificationGateway::new(
        config.notifications.endpoint.clone(),
        config.notifications.timeout(),
    )?;

    let engine = WorkflowEngine::start(auth, store.as_ref(), store.clone(), Arc::new(gateway)).await?;
    Ok(engine)
}
