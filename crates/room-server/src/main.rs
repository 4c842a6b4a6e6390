//! WebSocket server for interview rooms.

use std::path::PathBuf;

use clap::Parser;
use room_server::config::{Config, LogFormat};
use room_server::{logging, server};
use tracing::info;

#[derive(Parser)]
#[command(name = "room-server")]
#[command(about = "Pairs an interviewer and an interviewee over WebSocket, with an optional AI stand-in")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "ROOM_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the AI generation service
    #[arg(long)]
    ai_base_url: Option<String>,

    /// Model name passed to the AI service
    #[arg(long)]
    ai_model: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Also append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(url) = self.ai_base_url {
            config.ai.base_url = url;
        }
        if let Some(model) = self.ai_model {
            config.ai.model = model;
        }
        if self.log_json {
            config.log_format = LogFormat::Json;
        }
        if let Some(path) = self.log_file {
            config.log_file = Some(path);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let _log_guard = logging::init(
        &config.log_level,
        config.log_format,
        config.log_file.as_deref(),
    )?;

    info!(
        addr = %config.socket_addr_string(),
        outbound_capacity = config.outbound_capacity,
        "starting room-server"
    );

    server::run(config).await
}
