use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use netdiag::agent::{ChatManager, ChatMode, ChatSettings, SendError, SendOptions, SharedStore};
use netdiag::server::MockServer;
use netdiag::{logging, render};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "netdiag", version, about = "Multi-agent network troubleshooting chat over SSE")]
struct Cli {
    /// Directory holding `config/`.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the mock troubleshooting backend.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Send one query and print the assembled conversation.
    Ask {
        query: String,
        /// Replay the stored transcript instead of running a live query.
        #[arg(long)]
        replay: bool,
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = logging::init(&cli.workspace) {
        eprintln!("logging disabled: {err:#}");
    }
    let settings = ChatSettings::load(&cli.workspace)?;

    match cli.command {
        Command::Serve { host, port } => {
            let mut server_settings = settings.server;
            if let Some(host) = host {
                server_settings.host = host;
            }
            if let Some(port) = port {
                server_settings.port = port;
            }
            MockServer::new(server_settings).run().await
        }
        Command::Ask {
            query,
            replay,
            base_url,
        } => {
            let mode = if replay { ChatMode::Replay } else { ChatMode::Live };
            ask(settings.with_base_url(base_url), query, mode).await
        }
    }
}

async fn ask(settings: ChatSettings, query: String, mode: ChatMode) -> Result<()> {
    let store = SharedStore::new();
    let manager = ChatManager::from_settings(&settings, store.clone())?;
    info!("sending to {} ({:?})", settings.base_url, mode);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });
    let printer = tokio::spawn(render::follow(store.clone(), store.subscribe()));

    let result = manager.send(&query, SendOptions { cancel, mode }).await;
    printer.abort();

    println!();
    println!("{}", render::render_conversation(&store.snapshot()));
    match result {
        Ok(outcome) => {
            info!(
                "thread {} finished: {} records, {} skipped",
                outcome.thread_id, outcome.records, outcome.skipped
            );
            Ok(())
        }
        Err(SendError::Cancelled) => {
            warn!("response cancelled, partial result kept");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
