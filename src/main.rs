use clap::Parser;
use log::{error, warn};

use camhttpd::config::{Args, ServerConfig};
use camhttpd::handlers::StaticCredentials;
use camhttpd::server::Server;

fn main() {
    env_logger::init();

    let args = Args::parse();

    if args.port < 1024 && unsafe { libc::getuid() } != 0 {
        eprintln!("need root privileges to bind to port {}", args.port);
        std::process::exit(1);
    }

    let config = ServerConfig::from_args(&args);

    let credentials = match StaticCredentials::from_env() {
        Some(c) => c,
        None => {
            warn!(
                "{} / {} not set; logins are disabled",
                StaticCredentials::USER_VAR,
                StaticCredentials::PASS_VAR
            );
            StaticCredentials::disabled()
        }
    };

    let mut server = match Server::bind(config, Box::new(credentials)) {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    server.run();
}
