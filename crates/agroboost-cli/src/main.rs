//! Command-line interface for the AGRO BOOST backend.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use agroboost_api::{ServerState, TokenKeys};
use agroboost_core::AppConfig;
use agroboost_devices::{
    BrokerConfig, CommandSink, EmbeddedBroker, MqttCommandSink, MqttGateway, NoopCommandSink,
    TelemetryListener,
};
use agroboost_storage::{Kit, KitStore, User, UserStore};

/// AGRO BOOST irrigation telemetry backend.
#[derive(Parser, Debug)]
#[command(name = "agroboost")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the backend: embedded MQTT broker, telemetry listener, HTTP API.
    Serve {
        /// Host to bind the HTTP API to (overrides AGROBOOST_HOST).
        #[arg(long)]
        host: Option<String>,
        /// Port to bind the HTTP API to (overrides AGROBOOST_PORT).
        #[arg(short, long)]
        port: Option<u16>,
        /// Data directory (overrides AGROBOOST_DATA_DIR).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Provision a kit (and its owner account if missing).
    Provision {
        /// Wire-side device identifier, e.g. AGRO-001.
        #[arg(required = true)]
        device_id: String,
        /// Owner username.
        #[arg(short, long, required = true)]
        username: String,
        /// Owner password (used only when creating the account).
        #[arg(long, default_value = "changeme")]
        password: String,
        /// Location label.
        #[arg(short, long, default_value = "")]
        location: String,
        /// Data directory (overrides AGROBOOST_DATA_DIR).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    match args.command {
        Command::Serve {
            host,
            port,
            data_dir,
        } => {
            let mut config = AppConfig::from_env();
            if let Some(host) = host {
                config.http_host = host;
            }
            if let Some(port) = port {
                config.http_port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            serve(config).await
        }
        Command::Provision {
            device_id,
            username,
            password,
            location,
            data_dir,
        } => {
            let mut config = AppConfig::from_env();
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            provision(&config, &device_id, &username, &password, &location)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "agroboost=debug,info"
    } else {
        "agroboost=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let json_logging = std::env::var("AGROBOOST_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    tracing::info!(
        version = agroboost_api::VERSION,
        http_port = config.http_port,
        mqtt_enabled = config.mqtt_enabled,
        mqtt_port = config.mqtt_port,
        data_dir = %config.data_dir.display(),
        "starting AGRO BOOST backend"
    );

    let tokens = TokenKeys::from_env();
    let bind: SocketAddr = format!("{}:{}", config.http_host, config.http_port).parse()?;

    if config.mqtt_enabled {
        let broker = EmbeddedBroker::new(
            BrokerConfig::new()
                .with_listen(config.mqtt_listen.clone())
                .with_port(config.mqtt_port),
        );
        broker.start()?;

        // One gateway object, built once, shared by the listener and the
        // pump command sink.
        let (gateway, eventloop) = MqttGateway::connect("127.0.0.1", config.mqtt_port);
        let sink: Arc<dyn CommandSink> = Arc::new(MqttCommandSink::new(gateway.clone()));

        let state = ServerState::open(&config.data_dir, sink, tokens)?;

        let listener = TelemetryListener::new(gateway, state.ingestion.clone());
        tokio::spawn(listener.run(eventloop));

        agroboost_api::run(state, bind).await
    } else {
        tracing::warn!("MQTT disabled, pump commands will be dropped");
        let state = ServerState::open(&config.data_dir, Arc::new(NoopCommandSink), tokens)?;
        agroboost_api::run(state, bind).await
    }
}

fn provision(
    config: &AppConfig,
    device_id: &str,
    username: &str,
    password: &str,
    location: &str,
) -> Result<()> {
    let users = UserStore::open(&config.data_dir)?;
    let kits = KitStore::open(&config.data_dir)?;

    let owner = match users.get_by_username(username)? {
        Some(user) => user,
        None => {
            let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
            let user = User::new(username, hash);
            users.insert(&user)?;
            tracing::info!(username = %username, "created owner account");
            user
        }
    };

    let kit = Kit::new(device_id, owner.id).with_location(location);
    kits.insert(&kit)?;

    println!("provisioned kit {} ({}) for {}", kit.device_id, kit.id, owner.username);
    Ok(())
}
