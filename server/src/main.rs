mod trans_server;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use trans_server::{ServerTarget, TransServer};

const DEFAULT_TCP_ADDR: &str = "127.0.0.1:7878";

/// Line-oriented echo server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TCP address to listen on.
    #[arg(long, env = "XCHANNEL_ADDR", conflicts_with = "unix")]
    tcp: Option<SocketAddr>,

    /// Unix socket path to listen on.
    #[arg(long)]
    unix: Option<PathBuf>,
}

impl Args {
    fn target(self) -> anyhow::Result<ServerTarget> {
        Ok(match (self.tcp, self.unix) {
            (_, Some(path)) => ServerTarget::Unix(path),
            (Some(addr), None) => ServerTarget::Tcp(addr),
            (None, None) => ServerTarget::Tcp(DEFAULT_TCP_ADDR.parse()?),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let target = Args::parse().target()?;
    TransServer::new(target).run().await
}
