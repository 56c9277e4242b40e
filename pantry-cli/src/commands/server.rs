//! `pantry start|stop`: builds the daemon configuration and hands it to the
//! controller.

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pantry_core::{config, net, LogLevel, LogSettings, PantryConfig, ServerEndpoint, DEFAULT_PORT};
use pantry_daemon::DaemonController;
use pantry_server::ZeroServer;

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Address to bind [default: first private IPv4 address].
    #[arg(short = 'H', long)]
    pub host: Option<IpAddr>,

    /// Port to listen on.
    #[arg(short = 'P', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Detach and run in the background.
    #[arg(short = 'd', long)]
    pub daemon: bool,

    /// Serve over TLS.
    #[arg(long)]
    pub ssl: bool,

    /// debug, info, warn, error or fatal.
    #[arg(short = 'l', long, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Append logs to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ServerArgs {
    /// The single place the process environment is read.
    pub fn into_config(self) -> Result<PantryConfig> {
        let home = config::home_dir()?;
        let cwd = env::current_dir().context("could not determine working directory")?;
        let host = self.host.unwrap_or_else(net::default_host);
        let mut logging = LogSettings {
            level: self.log_level,
            file: self.log_file,
        };
        logging.resolve_relative_to(&cwd);
        Ok(PantryConfig {
            home,
            endpoint: ServerEndpoint::new(host, self.port, self.ssl),
            daemonize: self.daemon,
            logging,
        })
    }

    pub fn run(self, action: &str) -> Result<()> {
        let config = self.into_config()?;
        let mut controller = DaemonController::new(config, ZeroServer::new());
        controller.run(action)?;
        Ok(())
    }
}
