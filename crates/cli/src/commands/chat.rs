//! `clara chat` — Interactive or single-message chat mode.

use clara_config::AppConfig;
use clara_core::event::EventBus;
use clara_core::message::{Author, Conversation, ConversationId, StoredMessage};
use clara_core::profile::UserProfile;
use clara_core::store::{ConversationStore, DataStore, ProfileStore};
use clara_pipeline::TurnOrchestrator;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// The profile ID used for local CLI sessions.
const LOCAL_USER: &str = "local";

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.validate()?;

    // Check for API key early — give a clear error
    if !config.primary.is_configured() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GEMINI_API_KEY=...          (primary provider)");
        eprintln!("    CLARA_PRIMARY_API_KEY=...   (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let store = clara_gateway::build_store(&config).await?;
    let events = Arc::new(EventBus::default());
    let orchestrator = clara_gateway::build_orchestrator(&config, store.clone(), events)?;

    // Local sessions run as an admin profile, exempt from the quota
    if store.get_profile(LOCAL_USER).await?.is_none() {
        let mut profile = UserProfile::new(LOCAL_USER, "Você");
        profile.admin = true;
        store.upsert_profile(profile).await?;
    }

    let conversation = Conversation::new(LOCAL_USER);
    let conversation_id = conversation.id.clone();
    store.create_conversation(conversation).await?;

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Pensando...");
        let reply = send_turn(&store, &orchestrator, &conversation_id, &msg).await?;
        eprint!("\r            \r");
        println!("{reply}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════╗");
    println!("  ║        Dra. Clara — Modo Interativo        ║");
    println!("  ╚══════════════════════════════════════════╝");
    println!();
    println!(
        "  Modelo primário:  {}",
        config.primary.model.as_deref().unwrap_or("gemini-1.5-flash")
    );
    println!("  Armazenamento:    {}", config.store.backend);
    println!();
    println!("  Digite sua mensagem e pressione Enter.");
    println!("  Digite 'sair' ou Ctrl+C para encerrar.");
    println!();

    print_prompt()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            print_prompt()?;
            continue;
        }
        if text.eq_ignore_ascii_case("sair") || text.eq_ignore_ascii_case("exit") {
            break;
        }

        eprint!("  ...");
        match send_turn(&store, &orchestrator, &conversation_id, text).await {
            Ok(reply) => {
                eprint!("\r     \r");
                println!();
                for line in reply.lines() {
                    println!("  Clara > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Erro] {e}");
                println!();
            }
        }
        print_prompt()?;
    }

    println!();
    println!("  Até logo! 💙");
    println!();

    Ok(())
}

fn print_prompt() -> std::io::Result<()> {
    use std::io::Write;
    print!("  Você > ");
    std::io::stdout().flush()
}

/// Append the user message, run the turn, and return the bot's reply.
async fn send_turn(
    store: &Arc<dyn DataStore>,
    orchestrator: &TurnOrchestrator,
    conversation_id: &ConversationId,
    text: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let message = StoredMessage::user(conversation_id.clone(), text);
    let message_id = message.id.clone();
    store.append_message(message).await?;

    let outcome = orchestrator
        .handle_turn(conversation_id, &message_id, Author::User, text)
        .await?;

    let reply = outcome.reply_text().ok_or("The turn produced no reply")?;
    Ok(reply.to_string())
}
