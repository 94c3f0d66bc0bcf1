use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use log::*;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use xchannel::{ChannelConfig, DelimitedCodec, StringCodec, net};

#[derive(Debug)]
pub enum ServerTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

pub struct TransServer {
    target: ServerTarget,
}

impl TransServer {
    pub fn new(target: ServerTarget) -> Self {
        Self { target }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        match &self.target {
            ServerTarget::Unix(path) => {
                if path.exists() {
                    let _ = std::fs::remove_file(path);
                }
                let listener = UnixListener::bind(path)
                    .with_context(|| format!("failed to bind Unix socket {}", path.display()))?;
                info!("Server listening on Unix socket {:?}", path);
                loop {
                    let (stream, _) = listener.accept().await.context("failed to accept")?;
                    info!("Accepted Unix connection");
                    tokio::spawn(Self::serve(stream));
                }
            }
            ServerTarget::Tcp(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .with_context(|| format!("failed to bind TCP socket {addr}"))?;
                info!("Server listening on TCP {:?}", addr);
                loop {
                    let (stream, peer) = listener.accept().await.context("failed to accept")?;
                    info!("Accepted TCP connection from {:?}", peer);
                    tokio::spawn(Self::serve(stream));
                }
            }
        }
    }

    async fn serve<S>(stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if let Err(e) = Self::handle_connection(stream).await {
            error!("Connection error: {:#}", e);
        }
    }

    /// Echoes every line back until the client hangs up.
    pub async fn handle_connection<S>(stream: S) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let connection = net::connect::<_, _, String, String>(
            stream,
            DelimitedCodec::lines(StringCodec),
            ChannelConfig::default(),
        )?;
        let channel = connection.channel().clone();
        let mut inbound = channel.subscribe();
        info!("[channel {}] ready", channel.id());

        let mut echoed = 0usize;
        while let Some(line) = inbound.recv().await {
            match line {
                Ok(line) => {
                    debug!("[channel {}] <- {:?}", channel.id(), line);
                    if let Err(e) = channel.send(line).await {
                        warn!("[channel {}] echo failed: {}", channel.id(), e);
                        break;
                    }
                    echoed += 1;
                }
                Err(e) => {
                    warn!("[channel {}] inbound failed: {}", channel.id(), e);
                    break;
                }
            }
        }

        info!("[channel {}] closing after {} lines", channel.id(), echoed);
        connection.close().await;
        connection.finished().await;
        Ok(())
    }
}
