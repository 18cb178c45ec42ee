use anyhow::Result;
use chargelog::config::Service;
use chargelog::logging::{get_logger, init_logging};
use chargelog::persistence::store_from_config;
use chargelog::{Config, export};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config.apply_env_overrides(Service::Export)?;
    config.validate()?;

    init_logging(&config.logging)?;
    let logger = get_logger("main");
    logger.info(&format!(
        "Chargelog export {} starting; storage={} at {}",
        env!("APP_VERSION"),
        config.storage.backend,
        config.storage.root
    ));
    if config.storage.backend == "memory" {
        logger.warn("Memory storage is private to this process; the export will always be empty");
    }

    let store = store_from_config(&config.storage)?;
    export::serve(store, &config.export.host, config.export.port).await
}
