//! Server overrides shared by `serve` and `default`

use clap::Args;

use crate::config::ServerConfig;

/// Override the `[server]` section from the command line
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port to run the server on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Do not open a browser
    #[arg(long)]
    pub no_open: bool,
}

impl ServeArgs {
    pub fn apply(&self, server: &mut ServerConfig) {
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(host) = &self.host {
            server.host = host.clone();
        }
        if self.no_open {
            server.open = false;
        }
    }
}
