//! Collaboration relay server.
//!
//! Serves the `/video`, `/whiteboard`, `/code` and `/chat` WebSocket namespaces.
//! With `--redis-url` history lives in Redis and the replicated namespaces are
//! shared with every other relay on the same Redis; without it everything stays
//! in memory (single instance).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin atelier-relay
//! cargo run --bin atelier-relay -- --port 3001 --redis-url redis://127.0.0.1:6379
//! ```

use std::{process::exit, sync::Arc, time::Duration};

use atelier_relay::{
    config::RelayConfig,
    domain::{AuxiliaryStore, Collaborators, CrossInstanceChannel, InstanceId, Namespace},
    error::RelayError,
    infrastructure::{
        collaborator::{
            HttpAssistant, HttpCodeExecutor, HttpContentAnalyzer, HttpSessionService,
            NoopContentAnalyzer, NoopStatusUpdater, OpenAccessChecker, UnavailableAssistant,
            UnavailableExecutor,
        },
        pubsub::{InMemoryCrossInstanceChannel, RedisCrossInstanceChannel},
        store::{InMemoryAuxiliaryStore, RedisAuxiliaryStore},
    },
    ui::RelaySupervisor,
    usecase::RelayContext,
};
use atelier_shared::{logger::setup_logger, time::SystemClock};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "atelier-relay")]
#[command(about = "Real-time collaboration relay for tutoring sessions", long_about = None)]
struct Args {
    /// Host address to bind the relay to
    #[arg(short = 'H', long, env = "RELAY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the relay to
    #[arg(short = 'p', long, env = "RELAY_PORT", default_value = "3001")]
    port: u16,

    /// Redis URL for the auxiliary store and cross-instance channel
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Identifier of this instance (generated when omitted)
    #[arg(long, env = "RELAY_INSTANCE_ID")]
    instance_id: Option<String>,

    /// Namespaces replicated to other instances
    #[arg(
        long,
        env = "RELAY_REPLICATE",
        value_delimiter = ',',
        default_value = "whiteboard,code"
    )]
    replicate: Vec<Namespace>,

    /// Prefix of the pub/sub channel names
    #[arg(long, env = "RELAY_CHANNEL_PREFIX", default_value = "relay")]
    channel_prefix: String,

    /// Base URL of the session service (participant checks, status updates)
    #[arg(long, env = "SESSION_SERVICE_URL")]
    session_service_url: Option<String>,

    /// URL of the sandboxed code executor
    #[arg(long, env = "CODE_EXECUTOR_URL")]
    executor_url: Option<String>,

    /// URL of the AI assistant
    #[arg(long, env = "AI_ASSISTANT_URL")]
    assistant_url: Option<String>,

    /// URL of the whiteboard content analyzer
    #[arg(long, env = "CONTENT_ANALYZER_URL")]
    analyzer_url: Option<String>,

    /// Retention of whiteboard and code change logs, in seconds
    #[arg(long, env = "RELAY_HISTORY_RETENTION_SECS", default_value = "86400")]
    history_retention_secs: u64,

    /// Lifetime of a cursor position, in seconds
    #[arg(long, env = "RELAY_CURSOR_TTL_SECS", default_value = "30")]
    cursor_ttl_secs: u64,

    /// Lifetime of the auto-save snapshot, in seconds
    #[arg(long, env = "RELAY_AUTO_SAVE_TTL_SECS", default_value = "300")]
    auto_save_ttl_secs: u64,

    /// Chat messages kept per session
    #[arg(long, env = "RELAY_CHAT_CAPACITY", default_value = "100")]
    chat_capacity: usize,

    /// Code execution timeout, in seconds
    #[arg(long, env = "RELAY_EXECUTION_TIMEOUT_SECS", default_value = "30")]
    execution_timeout_secs: u64,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, env = "RELAY_LOG_LEVEL", default_value = "debug")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    if let Err(e) = run(args).await {
        tracing::error!("Relay error: {}", e);
        exit(1);
    }
}

async fn run(args: Args) -> Result<(), RelayError> {
    // Initialize dependencies in order:
    // 1. Config
    // 2. Auxiliary Store / cross-instance channel
    // 3. Collaborators
    // 4. RelayContext
    // 5. RelaySupervisor

    // 1. Config
    let instance_id = match &args.instance_id {
        Some(id) => InstanceId::new(id.clone())?,
        None => InstanceId::generate(),
    };
    let config = RelayConfig {
        instance_id,
        history_retention: Duration::from_secs(args.history_retention_secs),
        cursor_ttl: Duration::from_secs(args.cursor_ttl_secs),
        auto_save_ttl: Duration::from_secs(args.auto_save_ttl_secs),
        chat_capacity: args.chat_capacity,
        execution_timeout: Duration::from_secs(args.execution_timeout_secs),
        replicated_namespaces: args.replicate.clone(),
        channel_prefix: args.channel_prefix.clone(),
        ..RelayConfig::default()
    };
    tracing::info!("Starting relay instance '{}'", config.instance_id);

    // 2. Auxiliary Store and cross-instance channel
    let (store, channel) = match &args.redis_url {
        Some(url) => {
            let store: Arc<dyn AuxiliaryStore> =
                Arc::new(RedisAuxiliaryStore::connect(url).await?);
            let channel: Arc<dyn CrossInstanceChannel> = Arc::new(
                RedisCrossInstanceChannel::connect(url, config.channel_prefix.clone()).await?,
            );
            (store, channel)
        }
        None => {
            tracing::warn!(
                "No Redis URL configured; history stays in memory on this instance only"
            );
            let store: Arc<dyn AuxiliaryStore> = Arc::new(InMemoryAuxiliaryStore::new());
            let channel: Arc<dyn CrossInstanceChannel> =
                Arc::new(InMemoryCrossInstanceChannel::new());
            (store, channel)
        }
    };

    // 3. Collaborators
    let collaborators = collaborators(&args)?;

    // 4. RelayContext
    let context = Arc::new(RelayContext::new(
        config,
        store,
        channel,
        collaborators,
        Arc::new(SystemClock),
    ));

    // 5. Create and run the relay
    RelaySupervisor::new(context).run(args.host, args.port).await
}

fn collaborators(args: &Args) -> Result<Collaborators, RelayError> {
    let mut collaborators = match &args.session_service_url {
        Some(url) => {
            let session_service = Arc::new(HttpSessionService::new(url)?);
            Collaborators {
                access_checker: session_service.clone(),
                status_updater: session_service,
                code_executor: Arc::new(UnavailableExecutor),
                assistant: Arc::new(UnavailableAssistant),
                content_analyzer: Arc::new(NoopContentAnalyzer),
            }
        }
        None => {
            tracing::warn!("No session service configured; every user may join every session");
            Collaborators {
                access_checker: Arc::new(OpenAccessChecker),
                status_updater: Arc::new(NoopStatusUpdater),
                code_executor: Arc::new(UnavailableExecutor),
                assistant: Arc::new(UnavailableAssistant),
                content_analyzer: Arc::new(NoopContentAnalyzer),
            }
        }
    };

    if let Some(url) = &args.executor_url {
        collaborators.code_executor = Arc::new(HttpCodeExecutor::new(url)?);
    }
    if let Some(url) = &args.assistant_url {
        collaborators.assistant = Arc::new(HttpAssistant::new(url)?);
    }
    if let Some(url) = &args.analyzer_url {
        collaborators.content_analyzer = Arc::new(HttpContentAnalyzer::new(url)?);
    }

    Ok(collaborators)
}
