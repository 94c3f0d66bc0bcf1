mod trans_client;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use trans_client::{ClientTarget, TransClient};

const DEFAULT_TCP_ADDR: &str = "127.0.0.1:7878";

/// Sends lines to the echo server and prints the replies.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TCP address of the server.
    #[arg(long, env = "XCHANNEL_ADDR", conflicts_with = "unix")]
    tcp: Option<SocketAddr>,

    /// Unix socket path of the server.
    #[arg(long)]
    unix: Option<PathBuf>,

    /// Lines to send.
    #[arg(default_value = "Hello World!")]
    lines: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let target = match (args.tcp, args.unix) {
        (_, Some(path)) => ClientTarget::Unix(path),
        (Some(addr), None) => ClientTarget::Tcp(addr),
        (None, None) => ClientTarget::Tcp(DEFAULT_TCP_ADDR.parse()?),
    };

    let replies = TransClient::new(target).exchange(args.lines).await?;
    for reply in replies {
        println!("{reply}");
    }
    Ok(())
}
