//! Socket client binary.
//!
//! Opens a single-peer session, either to send one request and print its reply
//! or to print every inbound message until interrupted.

mod config;
mod logging;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use socket_session::{
    EventChannel, SessionConfig, SessionEvent, SessionListener, SocketSession,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{parse_correlation, ClientConfig};
use logging::SocketLogFormatter;

// Component logging macros are defined in logging.rs and available via #[macro_export]

/// Single-peer socket client with heartbeats and request/response correlation
#[derive(Parser, Debug)]
#[command(name = "socket-client", version, about = "Single-peer socket session client")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Peer endpoint, e.g. ws://127.0.0.1:8080/
    #[arg(long)]
    address: Option<String>,

    /// Heartbeat interval, e.g. 30s
    #[arg(long)]
    heartbeat_interval: Option<humantime::Duration>,

    /// Instance tag attached to heartbeats
    #[arg(long)]
    instance_id: Option<String>,

    /// Reply correlation: fifo or request_id
    #[arg(long)]
    correlation: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one request and print the reply
    Send {
        /// Envelope type tag
        #[arg(long = "type")]
        kind: String,

        /// JSON payload
        #[arg(long)]
        data: Option<String>,
    },
    /// Print every inbound message until Ctrl-C or remote close
    Listen,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("socket_client={}", args.log_level).parse()?)
        .add_directive(format!("socket_session={}", args.log_level).parse()?)
        .add_directive(format!("socket_wire={}", args.log_level).parse()?);

    let formatter = SocketLogFormatter::new("socket-client".to_string());

    // Replies go to stdout, so keep logs on stderr
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .event_format(formatter)
        .init();

    info!("Starting socket client v{}", env!("CARGO_PKG_VERSION"));

    let client_config = ClientConfig::load_from_file(&args.config)?;
    let session_config = resolve_session_config(&args, &client_config)?;

    component_info!(
        "cli",
        "Connecting to {} as instance {:?}",
        session_config.address,
        session_config.instance_id
    );

    let (events, event_rx) = EventChannel::new();
    let listener: Arc<dyn SessionListener> = Arc::new(events);
    let session = SocketSession::start(session_config, vec![listener]);

    let result = match &args.command {
        Command::Send { kind, data } => run_send(&session, kind, data.as_deref()).await,
        Command::Listen => run_listen(&session, event_rx).await,
    };

    session.stop();
    session.closed().await;

    let status = session.status();
    info!(
        "Session finished: {} requests, {} replies, {} heartbeats, {} rejected",
        status.stats.requests_sent,
        status.stats.replies_resolved,
        status.stats.heartbeats_sent,
        status.stats.requests_rejected
    );

    result
}

/// Layer CLI flags over file and environment settings
fn resolve_session_config(args: &Args, client_config: &ClientConfig) -> anyhow::Result<SessionConfig> {
    let mut config = client_config.to_session_config();

    if let Some(address) = &args.address {
        config.address = address.clone();
    }
    if let Some(interval) = &args.heartbeat_interval {
        if interval.is_zero() {
            anyhow::bail!("--heartbeat-interval must be greater than zero");
        }
        config.heartbeat_interval = **interval;
    }
    if let Some(instance_id) = &args.instance_id {
        config.instance_id = Some(instance_id.clone());
    }
    if let Some(correlation) = &args.correlation {
        config.correlation = parse_correlation(correlation)
            .with_context(|| format!("unknown correlation mode {:?}", correlation))?;
    }

    if config.instance_id.is_none() {
        let generated = uuid::Uuid::new_v4().to_string();
        info!("No instance ID configured, generated {}", generated);
        config.instance_id = Some(generated);
    }

    Ok(config)
}

async fn run_send(session: &SocketSession, kind: &str, data: Option<&str>) -> anyhow::Result<()> {
    let payload = match data {
        Some(raw) => socket_wire::decode_text(raw).context("--data is not valid JSON")?,
        None => Value::Null,
    };

    let reply = session
        .send(kind, payload)
        .await
        .with_context(|| format!("request {:?} failed", kind))?;

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

async fn run_listen(
    session: &SocketSession,
    mut events: tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                component_info!("cli", "Interrupted, stopping session");
                return Ok(());
            }
            event = events.recv() => match event {
                Some(SessionEvent::Opened) => {
                    component_info!("cli", "Session open, state {:?}", session.state());
                }
                Some(SessionEvent::Message { payload }) => {
                    let stamp = chrono::Local::now().format("%H:%M:%S%.3f");
                    println!("{} {}", stamp, serde_json::to_string(&payload)?);
                }
                Some(SessionEvent::Closed { reason }) => {
                    component_warn!("cli", "Session closed: {}", reason);
                    return Ok(());
                }
                Some(SessionEvent::ConnectFailed { error }) => {
                    component_error!("cli", "Could not connect: {}", error);
                    return Err(error).context("connection failed");
                }
                None => {
                    warn!("Event channel closed");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socket_session::CorrelationMode;
    use std::time::Duration;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_send_command() {
        let args = parse(&[
            "socket-client",
            "--address",
            "ws://127.0.0.1:9000/",
            "--heartbeat-interval",
            "300ms",
            "send",
            "--type",
            "get-plan",
            "--data",
            r#"{"id":7}"#,
        ]);

        match &args.command {
            Command::Send { kind, data } => {
                assert_eq!(kind, "get-plan");
                assert_eq!(data.as_deref(), Some(r#"{"id":7}"#));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let config = resolve_session_config(&args, &ClientConfig::default()).unwrap();
        assert_eq!(config.address, "ws://127.0.0.1:9000/");
        assert_eq!(config.heartbeat_interval, Duration::from_millis(300));
    }

    #[test]
    fn test_flags_override_file_settings() {
        let args = parse(&[
            "socket-client",
            "--instance-id",
            "worker-9",
            "--correlation",
            "request_id",
            "listen",
        ]);
        let file = ClientConfig {
            instance_id: Some("from-file".to_string()),
            ..Default::default()
        };

        let config = resolve_session_config(&args, &file).unwrap();
        assert_eq!(config.instance_id.as_deref(), Some("worker-9"));
        assert_eq!(config.correlation, CorrelationMode::RequestId);
    }

    #[test]
    fn test_generates_instance_id() {
        let args = parse(&["socket-client", "listen"]);
        let config = resolve_session_config(&args, &ClientConfig::default()).unwrap();
        let id = config.instance_id.unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_rejects_zero_heartbeat_interval() {
        let args = parse(&["socket-client", "--heartbeat-interval", "0s", "listen"]);
        let err = resolve_session_config(&args, &ClientConfig::default()).unwrap_err();
        assert!(err.to_string().contains("--heartbeat-interval"));
    }

    #[test]
    fn test_rejects_unknown_correlation() {
        let args = parse(&["socket-client", "--correlation", "lifo", "listen"]);
        assert!(resolve_session_config(&args, &ClientConfig::default()).is_err());
    }
}
