//! `clara serve` — Start the HTTP API server.

use clara_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.validate()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("💙 Clara Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:     {} ({})", config.store.backend, config.store.path);
    if config.gateway.auth_tokens.is_empty() {
        println!("   WARNING: no auth tokens configured; all /v1/chat requests will be rejected");
    }

    clara_gateway::start(config).await?;

    Ok(())
}
