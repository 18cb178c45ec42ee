use anyhow::Result;
use chargelog::config::Service;
use chargelog::logging::{get_logger, init_logging};
use chargelog::persistence::store_from_config;
use chargelog::session::ChargeLog;
use chargelog::{Config, web};
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config.apply_env_overrides(Service::Web)?;
    config.validate()?;

    init_logging(&config.logging)?;
    let logger = get_logger("main");
    logger.info(&format!(
        "Chargelog {} starting; storage={} at {}",
        env!("APP_VERSION"),
        config.storage.backend,
        config.storage.root
    ));

    let store = store_from_config(&config.storage)?;
    let (host, port) = (config.web.host.clone(), config.web.port);

    let log = ChargeLog::new(store, config)?;
    log.initialize().await?;

    if let Err(e) = web::serve(Arc::new(Mutex::new(log)), &host, port).await {
        logger.error(&format!("Web server error: {}", e));
        return Err(e);
    }
    Ok(())
}
