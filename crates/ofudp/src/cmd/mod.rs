use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Subcommand};
use ofudp_frame::{ChannelConfig, FramedChannel};
use ofudp_transport::{SocketConfig, UdpDatagramSocket};

use crate::exit::{frame_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer echo requests and hellos from a peer.
    Echo(EchoArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Print messages received from a peer.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Socket options shared by every command that opens a channel.
#[derive(Args, Debug)]
pub struct SocketArgs {
    /// OS receive buffer size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub recv_buffer: Option<usize>,
    /// OS send buffer size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub send_buffer: Option<usize>,
    /// Largest message accepted, header included.
    #[arg(long, value_name = "BYTES", default_value = "65535")]
    pub max_frame_size: usize,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Peer endpoint (udp:<host>:<port>).
    pub endpoint: String,
    /// Local address to receive on.
    #[arg(long)]
    pub bind: SocketAddr,
    #[command(flatten)]
    pub socket: SocketArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Peer endpoint (udp:<host>:<port>, default port 6653).
    pub endpoint: String,
    /// Message type name (e.g. hello, echo-request) or numeric code.
    #[arg(long = "type", default_value = "hello")]
    pub msg_type: String,
    /// Transaction id.
    #[arg(long, default_value = "1")]
    pub xid: u32,
    /// Protocol version byte.
    #[arg(long = "ofp-version", default_value = "4")]
    pub ofp_version: u8,
    /// Raw string body.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read body from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the send to drain and, with --wait, for the
    /// reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Local address to send from.
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    #[command(flatten)]
    pub socket: SocketArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Peer endpoint (udp:<host>:<port>).
    pub endpoint: String,
    /// Local address to receive on.
    #[arg(long)]
    pub bind: SocketAddr,
    /// Only print these message types (comma-separated names or codes).
    #[arg(long = "types", value_delimiter = ',')]
    pub types: Option<Vec<String>>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub socket: SocketArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn open_channel(
    endpoint: &str,
    bind: Option<SocketAddr>,
    socket: &SocketArgs,
) -> CliResult<FramedChannel<UdpDatagramSocket>> {
    let socket_config = SocketConfig {
        bind,
        recv_buffer_size: socket.recv_buffer,
        send_buffer_size: socket.send_buffer,
        ..SocketConfig::default()
    };
    let config = ChannelConfig {
        max_frame_size: socket.max_frame_size,
        ..ChannelConfig::default()
    };
    FramedChannel::open(endpoint, &socket_config, config)
        .map_err(|err| frame_error("open failed", err))
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
