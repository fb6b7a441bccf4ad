//! QRate UDP Proxy Binary
//!
//! Wraps the QRate Thrift API in a UDP API and keeps TLS on the proxy side.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use crossbeam::channel;
use qrate_udp_proxy::protocol::{DEFAULT_BIND_ADDR, DEFAULT_REPLY_PORT, DEFAULT_REQUEST_PORT};
use qrate_udp_proxy::{BackendConfig, Config, Gateway, QkdClient};
use tracing_subscriber::{fmt, EnvFilter};

/// Log verbosity, named after the classic syslog-style levels
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    Notset,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            // tracing has no level above error
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Notset => "trace",
        }
    }
}

/// QRate UDP proxy
#[derive(Parser, Debug)]
#[command(name = "qrate-udp-proxy")]
#[command(about = "UDP API wrapper for the QRate Thrift API; simplifies quantum key access")]
#[command(version)]
struct Args {
    /// Bind IP address for listening for Request
    #[arg(long, default_value = DEFAULT_BIND_ADDR, value_name = "ADDRESS")]
    bind_ip: IpAddr,

    /// Bind port for listening for Request
    #[arg(long, default_value_t = DEFAULT_REQUEST_PORT, value_name = "PORT")]
    bind_port: u16,

    /// Destination port for Reply
    #[arg(long, default_value_t = DEFAULT_REPLY_PORT, value_name = "PORT")]
    reply_port: u16,

    /// IP address of QRate Thrift API
    #[arg(long, default_value = "127.0.0.1", value_name = "ADDRESS")]
    qrate_ip: String,

    /// Port of QRate Thrift API
    #[arg(long, default_value_t = 9090, value_name = "PORT")]
    qrate_port: u16,

    /// Client x509 certificate
    #[arg(long, default_value = "ssl/client.crt")]
    certfile: PathBuf,

    /// Client x509 private key
    #[arg(long, default_value = "ssl/client.key")]
    keyfile: PathBuf,

    /// Certificate Authority (root or intermediate) certificate. Used to authorize API server
    #[arg(long, default_value = "ssl/pair_ca_bundle.crt")]
    ca_certs: PathBuf,

    /// Name expected in the API server certificate (defaults to --qrate-ip).
    /// The certificate is always verified: if it carries no IP SAN matching
    /// --qrate-ip, set this to a DNS name the certificate does carry
    #[arg(long)]
    server_name: Option<String>,

    /// Setup output verbosity
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

fn main() {
    let args = Args::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.directive()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("QRate UDP proxy v{}", qrate_udp_proxy::VERSION);

    let config = match Config::builder()
        .bind_addr(args.bind_ip)
        .request_port(args.bind_port)
        .reply_port(args.reply_port)
        .build()
    {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut backend_config = BackendConfig::builder()
        .host(&args.qrate_ip)
        .port(args.qrate_port)
        .certfile(&args.certfile)
        .keyfile(&args.keyfile)
        .ca_certs(&args.ca_certs);
    if let Some(name) = &args.server_name {
        backend_config = backend_config.server_name(name);
    }

    let gateway = match Gateway::bind(config, QkdClient::new(backend_config.build())) {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!("Failed to start gateway: {}", e);
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    let (interrupt_tx, interrupt_rx) = channel::bounded(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    }) {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = gateway.start() {
        tracing::error!("Failed to start gateway: {}", e);
        std::process::exit(1);
    }
    tracing::info!("QRate UDP proxy server started");

    let _ = interrupt_rx.recv();
    tracing::info!("Received Ctrl+C, initiating shutdown...");

    gateway.stop();
    tracing::info!("QRate UDP proxy server stopped");
}
