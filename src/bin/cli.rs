//! QRate UDP Client
//!
//! Exercises a pair of gateways end to end: a key issued by length on one
//! side must be retrievable by id on the other side, in both directions.

use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use qrate_udp_proxy::client::DEFAULT_REPLY_TIMEOUT;
use qrate_udp_proxy::network::socket;
use qrate_udp_proxy::protocol::{DEFAULT_REPLY_PORT, DEFAULT_REQUEST_PORT, KEY_LENGTH_MAX};
use qrate_udp_proxy::{GatewayClient, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// QRate UDP API client example
#[derive(Parser, Debug)]
#[command(name = "qrate-udp-client")]
#[command(about = "Performs requests by length and by id on both sides: Tx and Rx")]
struct Args {
    /// IP address of UDP API on Tx side
    #[arg(long, default_value = "127.0.0.1", value_name = "ADDRESS")]
    qrate_udp_ip_tx: IpAddr,

    /// Port of UDP API on Tx side
    #[arg(long, default_value_t = DEFAULT_REQUEST_PORT, value_name = "PORT")]
    qrate_udp_port_tx: u16,

    /// IP address of UDP API on Rx side
    #[arg(long, default_value = "127.0.0.1", value_name = "ADDRESS")]
    qrate_udp_ip_rx: IpAddr,

    /// Port of UDP API on Rx side
    #[arg(long, default_value_t = DEFAULT_REQUEST_PORT, value_name = "PORT")]
    qrate_udp_port_rx: u16,

    /// Bind IP address for listening for Reply
    #[arg(long, default_value = "0.0.0.0", value_name = "ADDRESS")]
    reply_ip: IpAddr,

    /// Bind port for listening for Reply
    #[arg(long, default_value_t = DEFAULT_REPLY_PORT, value_name = "PORT")]
    reply_port: u16,

    /// Key length for request by length
    #[arg(short = 'l', long, default_value_t = KEY_LENGTH_MAX as u32)]
    key_length: u32,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => println!("Test passed"),
        Err(e) => {
            eprintln!("Test failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<()> {
    // Both sides reply to the same port, so they share one reply socket
    let reply_socket = socket::bind_receiver(
        SocketAddr::new(args.reply_ip, args.reply_port),
        DEFAULT_REPLY_TIMEOUT,
        0,
    )?;
    let tx = GatewayClient::with_reply_socket(
        SocketAddr::new(args.qrate_udp_ip_tx, args.qrate_udp_port_tx),
        reply_socket.try_clone()?,
    )?;
    let rx = GatewayClient::with_reply_socket(
        SocketAddr::new(args.qrate_udp_ip_rx, args.qrate_udp_port_rx),
        reply_socket,
    )?;

    let mut command_magic_tx: u16 = 0;
    let mut command_magic_rx: u16 = 0;

    let issued = tx.get_key_by_length(command_magic_tx, args.key_length)?;
    let rx_key = rx.get_key_by_id(command_magic_rx, issued.key_id)?;
    compare("Tx→Rx", &issued.key, &rx_key)?;

    command_magic_tx = command_magic_tx.wrapping_add(1);
    command_magic_rx = command_magic_rx.wrapping_add(1);

    let issued = rx.get_key_by_length(command_magic_rx, args.key_length)?;
    let tx_key = tx.get_key_by_id(command_magic_tx, issued.key_id)?;
    compare("Rx→Tx", &tx_key, &issued.key)
}

fn compare(direction: &str, tx_key: &[u8], rx_key: &[u8]) -> Result<()> {
    if tx_key != rx_key {
        return Err(qrate_udp_proxy::ProxyError::Format(format!(
            "{} keys differ ({} vs {} bytes)",
            direction,
            tx_key.len(),
            rx_key.len()
        )));
    }
    tracing::info!("{} keys match ({} bytes)", direction, tx_key.len());
    Ok(())
}
