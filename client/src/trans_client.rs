use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, bail};
use futures::stream;
use log::*;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use xchannel::{ChannelConfig, DelimitedCodec, StringCodec, net};

#[derive(Debug)]
pub enum ClientTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

pub struct TransClient {
    target: ClientTarget,
}

impl TransClient {
    pub fn new(target: ClientTarget) -> Self {
        Self { target }
    }

    /// Sends `lines` and collects one echoed reply per line.
    pub async fn exchange(&self, lines: Vec<String>) -> anyhow::Result<Vec<String>> {
        info!("Connecting to target: {:?}", self.target);
        match &self.target {
            ClientTarget::Unix(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .with_context(|| format!("failed to connect Unix socket {}", path.display()))?;
                info!("Unix socket connected.");
                Self::process_stream(stream, lines).await
            }
            ClientTarget::Tcp(addr) => {
                let stream = TcpStream::connect(addr)
                    .await
                    .with_context(|| format!("failed to connect TCP socket {addr}"))?;
                info!("TCP socket connected.");
                Self::process_stream(stream, lines).await
            }
        }
    }

    async fn process_stream<S>(stream: S, lines: Vec<String>) -> anyhow::Result<Vec<String>>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let connection = net::connect::<_, _, String, String>(
            stream,
            DelimitedCodec::lines(StringCodec),
            ChannelConfig::default(),
        )?;
        let channel = connection.channel();
        let mut inbound = channel.subscribe();

        let expected = lines.len();
        let start = Instant::now();
        channel.sink(stream::iter(lines))?;

        let mut replies = Vec::with_capacity(expected);
        while replies.len() < expected {
            match inbound.recv().await {
                Some(Ok(reply)) => replies.push(reply),
                Some(Err(e)) => return Err(e).context("inbound stream failed"),
                None => bail!("server hung up after {} of {} replies", replies.len(), expected),
            }
        }
        info!("{} replies in {:.2} ms", replies.len(), start.elapsed().as_secs_f64() * 1000.0);

        connection.close().await;
        connection.finished().await;
        Ok(replies)
    }
}
