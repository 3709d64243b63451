//! Morgana binary: loads configuration, wires the real collaborators (`ChatOpenAI`,
//! `SqliteStore`), builds the agent registry from config, and runs the HTTP+WebSocket gateway.

mod log_format;
mod logging;

use clap::Parser;
use morgana_config::MorganaConfig;
use morgana_core::registry::{AgentFactory, AgentRegistry};
use morgana_llm::ChatOpenAI;
use morgana_persistence::SqliteStore;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "morgana")]
#[command(about = "Morgana — multi-agent conversational runtime gateway")]
struct Args {
    /// HTTP listen address (default 127.0.0.1:8080)
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,

    /// Path to the MorganaConfig TOML file (default: none, built-in defaults apply)
    #[arg(long, value_name = "PATH", env = "MORGANA_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path for persisted turns
    #[arg(long, value_name = "PATH", env = "MORGANA_DB", default_value = "morgana.db")]
    db: PathBuf,

    /// Chat model name passed to the OpenAI-compatible provider
    #[arg(long, value_name = "MODEL", env = "MORGANA_MODEL", default_value = "gpt-4o-mini")]
    model: String,
}

fn build_agent_registry(config: &MorganaConfig) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for intent in &config.intents {
        let system_prompt = config
            .prompts
            .get(&intent.name)
            .cloned()
            .unwrap_or_else(|| format!("You are the {} agent. {}", intent.name, intent.description));
        registry.register(
            intent.name.clone(),
            AgentFactory { system_prompt, tools: vec![], shared_vars: HashSet::new() },
        );
    }
    registry
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    morgana_config::load_and_apply("morgana", None::<&std::path::Path>).ok();
    logging::init()?;

    let args = Args::parse();
    let config = MorganaConfig::load(args.config.as_deref())?;

    let chat_client: Arc<dyn morgana_core::collaborators::ChatClient> = Arc::new(ChatOpenAI::new(args.model.clone()));
    let persistence: Arc<dyn morgana_core::collaborators::PersistenceStore> = Arc::new(SqliteStore::new(&args.db)?);
    let agent_registry = Arc::new(build_agent_registry(&config));

    let state = morgana_gateway::build_state(config, chat_client, persistence, agent_registry);

    tracing::info!(addr = args.addr.as_deref().unwrap_or("127.0.0.1:8080"), "starting morgana gateway");
    morgana_gateway::run_gateway(args.addr.as_deref(), state).await?;
    Ok(())
}
