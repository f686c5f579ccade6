use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Default connection slot table capacity.
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;
/// Per-slot receive buffer size. A request that does not fit is answered 413.
pub const RECV_BUFFER_SIZE: usize = 8192;
/// Ceiling on request bodies handed to a decoder.
pub const MAX_BODY_SIZE: usize = 4096;
/// Ceiling on the request path.
pub const MAX_PATH_LEN: usize = 256;
/// A username at or over this length does not name a known user.
pub const MAX_USERNAME_LEN: usize = 32;

/// Command line surface, consumed once at process start.
#[derive(Clone, Parser)]
#[command(version, about = "Device web console", long_about = None)]
pub struct Args {
    #[arg(short = 'p', long, default_value_t = 8080, help = "Port to listen on")]
    pub port: u16,

    #[arg(short = 'b', long, default_value = "0.0.0.0", help = "Address to bind")]
    pub bind: IpAddr,

    #[arg(short = 'd', long, help = "Document root for static assets")]
    pub docroot: Option<PathBuf>,

    #[arg(short = 'f', long, help = "Stay in the foreground")]
    pub foreground: bool,

    #[arg(short = 'S', long, help = "Refuse to serve symlinked assets")]
    pub no_symlinks: bool,

    #[arg(short = 'D', long, help = "Never generate directory listings")]
    pub no_dirlists: bool,

    #[arg(short = 'R', long, help = "Refuse peers outside RFC1918/loopback space")]
    pub rfc1918_filter: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS,
          help = "Connection slot table capacity")]
    pub max_connections: usize,

    #[arg(long, default_value_t = 30, help = "Per-connection timeout in seconds")]
    pub timeout: u64,

    #[arg(long, help = "Dispatch after the first read instead of reassembling")]
    pub single_read: bool,
}

/// Immutable runtime configuration. Built once at startup, then only read.
#[derive(Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub docroot: PathBuf,
    pub timeout: Duration,
    pub max_connections: usize,
    pub recv_buffer_size: usize,
    pub max_body_size: usize,
    pub max_path_len: usize,
    pub max_username_len: usize,
    pub no_symlinks: bool,
    pub no_dirlists: bool,
    pub rfc1918_filter: bool,
    pub foreground: bool,
    /// Compatibility switch: dispatch whatever the first read returned, the
    /// way the legacy firmware daemon did, instead of reassembling until the
    /// request-complete predicate holds.
    pub single_read: bool,
}

impl ServerConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            bind: args.bind,
            port: args.port,
            docroot: args.docroot.clone().unwrap_or_else(|| PathBuf::from(".")),
            timeout: Duration::from_secs(args.timeout),
            max_connections: args.max_connections,
            no_symlinks: args.no_symlinks,
            no_dirlists: args.no_dirlists,
            rfc1918_filter: args.rfc1918_filter,
            foreground: args.foreground,
            single_read: args.single_read,
            ..Self::default()
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            docroot: PathBuf::from("."),
            timeout: Duration::from_secs(30),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            recv_buffer_size: RECV_BUFFER_SIZE,
            max_body_size: MAX_BODY_SIZE,
            max_path_len: MAX_PATH_LEN,
            max_username_len: MAX_USERNAME_LEN,
            no_symlinks: false,
            no_dirlists: false,
            rfc1918_filter: false,
            foreground: false,
            single_read: false,
        }
    }
}
