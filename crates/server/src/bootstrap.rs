use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use courierbot_core::config::{AppConfig, ConfigError, LoadOptions};
use courierbot_db::{connect_with_settings, migrations, DbPool, SqlSessionRepository};
use courierbot_telegram::runner::{PollingRunner, ReconnectPolicy};
use courierbot_telegram::service::ReportService;

use crate::bitrix::BitrixClient;
use crate::telegram_api::HttpUpdateTransport;

pub type BotRunner = PollingRunner<HttpUpdateTransport, ReportService<BitrixClient>>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runner: BotRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let transport = HttpUpdateTransport::new(&config.telegram).map_err(BootstrapError::HttpClient)?;
    let gateway = BitrixClient::new(&config.bitrix).map_err(BootstrapError::HttpClient)?;
    let service = ReportService::new(
        Arc::new(SqlSessionRepository::new(db_pool.clone())),
        gateway,
        config.bitrix.routing(),
    );
    let runner = PollingRunner::new(transport, service, ReconnectPolicy::default());

    Ok(Application { config, db_pool, runner })
}
