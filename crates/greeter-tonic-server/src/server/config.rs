use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use greeter_tonic_core::types::DEFAULT_BANNER_REPEAT;

/// Output format of the console log layer.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable events.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Runtime configuration for the `greeter-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is honoured), with defaults that reproduce the reference
/// greeter behavior.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "greeter-server",
    version,
    about = "A gRPC greeter serving unary, async, server-streaming and bidirectional calls"
)]
pub struct CliArgs {
    /// Number of worker tasks that compute asynchronous greetings.
    ///
    /// `SayHelloAsync` calls are dispatched round-robin across workers.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 4)]
    pub num_workers: usize,

    /// Number of replies emitted by a single `SayHelloServerStream` call
    /// before the stream completes.
    ///
    /// Environment variable: `STREAM_REPLIES`
    #[arg(long, env = "STREAM_REPLIES", default_value_t = 5)]
    pub stream_replies: usize,

    /// Number of `"{i}Hello"` segments in the banner prepended to unary and
    /// server-stream replies. The banner is built once at startup.
    ///
    /// Environment variable: `BANNER_REPEAT`
    #[arg(long, env = "BANNER_REPEAT", default_value_t = DEFAULT_BANNER_REPEAT)]
    pub banner_repeat: usize,

    /// Capacity of the outbound buffer of each streaming call.
    ///
    /// This affects how many replies can be queued before the stream waits
    /// for the client to consume more data.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight streams to drain on shutdown before they
    /// are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/greeter.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Console log format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub num_workers: usize,
    pub stream_replies: usize,
    pub banner_repeat: usize,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
    pub server_addr: String,
    pub uds: bool,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            stream_replies: 5,
            banner_repeat: DEFAULT_BANNER_REPEAT,
            stream_buffer_size: 8,
            shutdown_timeout: Duration::from_secs(3),
            server_addr: String::from("0.0.0.0:50051"),
            uds: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        // `tokio::sync::mpsc::channel` panics on a zero capacity.
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.server_addr.is_empty() {
            bail!("SERVER_ADDR must not be empty");
        }

        Ok(Self {
            num_workers: args.num_workers,
            stream_replies: args.stream_replies,
            banner_repeat: args.banner_repeat,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            server_addr: args.server_addr,
            uds: args.uds,
            log_format: args.log_format,
        })
    }
}
