use clap::{Parser, Subcommand};
use pairlink_cli::{run_demo, CliError, DemoOptions, LogConfig, Result, SessionRuntime};
use pairlink_core::SessionStatus;
use pairlink_p2p::{
    EngineFactory, MatchboxRelay, MediaConstraints, MediaSource, MemoryRelayHub, Relay,
    SessionConfig, SessionController, SessionEvent, SessionMode, SyntheticMediaSource,
};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pairlink")]
#[command(version, about = "Pairlink - random one-to-one media pairing over a pub/sub relay")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Debug-level logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write a Chrome trace file (chrome-trace feature)
    #[arg(long, global = true)]
    chrome_trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pair simulated participants on an in-process relay
    Demo {
        /// Number of participants joining one after another
        #[arg(short = 'p', long, default_value_t = 2)]
        participants: usize,

        /// Seed for reproducible partner selection
        #[arg(long)]
        seed: Option<u64>,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Join the lobby on a matchbox signalling server and wait for a partner
    Join {
        /// Matchbox signalling server URL
        #[arg(short = 's', long, default_value = "wss://match.konnektoren.help")]
        server: String,

        /// Lobby topic name
        #[arg(short = 'l', long, default_value = "observable-match")]
        lobby: String,

        /// Capture audio only
        #[arg(long)]
        audio_only: bool,

        /// TURN server URL (optional, format: turn:host:port)
        #[arg(long)]
        turn_server: Option<String>,

        /// TURN username (required if turn-server is set)
        #[arg(long)]
        turn_username: Option<String>,

        /// TURN credential (required if turn-server is set)
        #[arg(long)]
        turn_credential: Option<String>,
    },

    /// Acquire local media without joining any lobby
    Preview {
        /// Capture audio only
        #[arg(long)]
        audio_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.json_logs {
        LogConfig::json()
    } else {
        LogConfig::default()
    };
    if cli.verbose {
        log_config = log_config.with_level(tracing::Level::DEBUG);
    }
    if cli.chrome_trace {
        log_config = log_config.with_chrome_trace();
    }
    let _log_guard = log_config.init()?;

    match cli.command {
        Commands::Demo {
            participants,
            seed,
            timeout,
        } => demo(participants, seed, timeout).await,
        Commands::Join {
            server,
            lobby,
            audio_only,
            turn_server,
            turn_username,
            turn_credential,
        } => {
            let config = build_config(&server, turn_server, turn_username, turn_credential)?
                .with_lobby_topic(lobby)
                .with_media(constraints(audio_only));
            join(config).await
        }
        Commands::Preview { audio_only } => {
            let config = SessionConfig::default()
                .with_mode(SessionMode::Preview)
                .with_media(constraints(audio_only));
            let controller = SessionController::new(
                config,
                MemoryRelayHub::new().relay(),
                SyntheticMediaSource::new(),
                engines(),
            );
            run_until_interrupted(controller).await
        }
    }
}

fn constraints(audio_only: bool) -> MediaConstraints {
    if audio_only {
        MediaConstraints::audio_only()
    } else {
        MediaConstraints::default()
    }
}

fn build_config(
    server: &str,
    turn_server: Option<String>,
    turn_username: Option<String>,
    turn_credential: Option<String>,
) -> Result<SessionConfig> {
    if !(server.starts_with("ws://") || server.starts_with("wss://")) {
        return Err(CliError::InvalidConfig(format!(
            "signalling server must be a ws:// or wss:// URL, got '{}'",
            server
        )));
    }

    let mut config = SessionConfig::new(server);

    if let Some(turn_url) = turn_server {
        match (turn_username, turn_credential) {
            (Some(username), Some(credential)) => {
                info!("Using TURN server: {}", turn_url);
                config = config.with_turn_server(turn_url, username, credential);
            }
            _ => {
                return Err(CliError::InvalidConfig(
                    "TURN server requires both username and credential".to_string(),
                ));
            }
        }
    }

    Ok(config)
}

#[cfg(feature = "webrtc")]
fn engines() -> pairlink_p2p::WebRtcEngineFactory {
    pairlink_p2p::WebRtcEngineFactory
}

#[cfg(not(feature = "webrtc"))]
fn engines() -> pairlink_p2p::SimulatedEngineFactory {
    warn!("Built without the webrtc feature, negotiating with the simulated engine");
    pairlink_p2p::SimulatedEngineFactory::default()
}

async fn demo(participants: usize, seed: Option<u64>, timeout: u64) -> Result<()> {
    let options = DemoOptions {
        participants,
        seed,
        timeout: Duration::from_secs(timeout),
        ..Default::default()
    };

    let report = run_demo(options).await?;

    println!();
    for participant in &report.participants {
        println!("  {}", participant);
    }
    println!();
    println!(
        "{} pair(s) connected{}",
        report.connected_pairs(),
        if report.timed_out { " (timed out)" } else { "" }
    );

    Ok(())
}

async fn join(config: SessionConfig) -> Result<()> {
    info!(
        "Connecting to signalling server: {}",
        config.signalling_server
    );
    info!("Lobby: {}", config.lobby_topic);

    let relay = MatchboxRelay::new(config.signalling_server.clone(), config.ice_servers.clone())
        .with_settle(Duration::from_millis(config.membership_settle_ms));
    let controller = SessionController::new(config, relay, SyntheticMediaSource::new(), engines());

    run_until_interrupted(controller).await
}

/// Drive a session until it ends on its own or Ctrl+C arrives
async fn run_until_interrupted<R, M, F>(controller: SessionController<R, M, F>) -> Result<()>
where
    R: Relay + 'static,
    M: MediaSource + 'static,
    F: EngineFactory + 'static,
{
    let mut runtime = SessionRuntime::spawn(controller);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            event = runtime.next_event() => {
                match event {
                    Some(event) => report_event(&event),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    match runtime.stop().await? {
        SessionStatus::Failed(err) => Err(CliError::Session(err)),
        status => {
            info!("Session finished: {}", status);
            Ok(())
        }
    }
}

fn report_event(event: &SessionEvent) {
    match event {
        SessionEvent::StatusChanged(status) => info!("📊 {}", status),
        SessionEvent::Paired {
            pair_id,
            role,
            peer,
        } => info!("🤝 Paired with {} in {} as {}", peer, pair_id, role),
        SessionEvent::RoleChanged(role) => info!("🔀 Role changed to {}", role),
        SessionEvent::RemoteMediaAttached => info!("🎥 Remote media attached"),
        SessionEvent::Diagnostic(err) => warn!("⚠️ {}", err),
    }
}
