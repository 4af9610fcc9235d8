//! `clara onboard` — First-time setup.

use clara_config::AppConfig;

const CONFIG_TEMPLATE: &str = r#"# Clara configuration

[primary]
# kind = "gemini"
# api_key = "..."        # or set GEMINI_API_KEY
# model = "gemini-1.5-flash"

[fallback]
# kind = "openai"
# api_key = "..."        # or set OPENAI_API_KEY
# model = "gpt-4o-mini"

[generation]
temperature = 0.7
max_tokens = 1024
provider_timeout_secs = 30

[quota]
free_daily_limit = 15

[store]
backend = "sqlite"
path = "clara.db"

[gateway]
host = "127.0.0.1"
port = 8787

# Bearer token -> user ID for /v1/chat
[gateway.auth_tokens]
# "my-secret-token" = "user-1"
"#;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("💙 Clara — Configuração Inicial");
    println!("===============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !config_path.exists() {
        std::fs::write(&config_path, CONFIG_TEMPLATE)?;
        println!("✅ Created config file: {}", config_path.display());
    } else {
        println!("  Config file exists: {}", config_path.display());
    }

    println!();
    println!("Next steps:");
    println!("  1. Set GEMINI_API_KEY (and optionally OPENAI_API_KEY for fallback)");
    println!("  2. Try it out:    clara chat -m \"Olá!\"");
    println!("  3. Run the API:   clara serve");
    println!();

    Ok(())
}
