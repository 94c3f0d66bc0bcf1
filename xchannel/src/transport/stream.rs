use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Transport, WritePayload};
use crate::error::{Error, ErrorKind};
use crate::promise::Completer;

enum Command {
    Write {
        bytes: Bytes,
        completion: Option<Completer>,
        flush: bool,
    },
    Flush,
    Shutdown,
}

/// Writes onto any tokio `AsyncWrite` from a dedicated writer task.
///
/// `write` only enqueues, so it is safe to call from the I/O
/// dispatcher thread; the writer task settles each completion once the
/// bytes are written (and flushed, when asked).
pub struct StreamTransport {
    tx: mpsc::UnboundedSender<Command>,
}

impl StreamTransport {
    /// Spawns the writer task on the current tokio runtime.
    pub fn spawn<W>(writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(writer, rx));
        (Self { tx }, handle)
    }

    /// Shuts down the write half once queued writes are done.
    pub fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).is_err() {
            log::debug!("stream shutdown skipped: writer task has stopped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Transport for StreamTransport {
    fn write(&self, payload: WritePayload, completion: Option<Completer>, flush: bool) {
        let bytes = match payload.into_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                if let Some(completion) = completion {
                    completion.fail(err);
                }
                return;
            }
        };

        let command = Command::Write {
            bytes,
            completion,
            flush,
        };
        if let Err(mpsc::error::SendError(command)) = self.tx.send(command) {
            if let Command::Write {
                bytes, completion, ..
            } = command
            {
                match completion {
                    Some(completion) => {
                        completion.fail(Error::new(ErrorKind::Transport, "writer task has stopped"))
                    }
                    None => log::warn!("stream write of {} bytes dropped: writer task has stopped", bytes.len()),
                }
            }
        }
    }

    fn flush(&self) {
        if self.tx.send(Command::Flush).is_err() {
            log::debug!("stream flush skipped: writer task has stopped");
        }
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Command>)
where
    W: AsyncWrite + Unpin,
{
    // Once the socket breaks every later write fails with the same error.
    let mut broken: Option<Error> = None;

    while let Some(command) = rx.recv().await {
        match command {
            Command::Write {
                bytes,
                completion,
                flush,
            } => {
                let outcome = match &broken {
                    Some(err) => Err(err.clone()),
                    None => write_one(&mut writer, &bytes, flush).await,
                };
                if let Err(err) = &outcome {
                    if broken.is_none() {
                        log::warn!("stream write failed: {}", err);
                        broken = Some(err.clone());
                    }
                }
                if let Some(completion) = completion {
                    completion.resolve(outcome);
                }
            }
            Command::Flush => {
                if broken.is_none() {
                    if let Err(err) = writer.flush().await {
                        log::warn!("stream flush failed: {}", err);
                        broken = Some(Error::with_source(ErrorKind::Transport, err));
                    }
                }
            }
            Command::Shutdown => {
                if let Err(err) = writer.shutdown().await {
                    log::debug!("stream shutdown failed: {}", err);
                }
                break;
            }
        }
    }
    log::debug!("stream writer stopped");
}

async fn write_one<W>(writer: &mut W, bytes: &[u8], flush: bool) -> crate::error::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(bytes)
        .await
        .map_err(|e| Error::with_source(ErrorKind::Transport, e))?;
    if flush {
        writer
            .flush()
            .await
            .map_err(|e| Error::with_source(ErrorKind::Transport, e))?;
    }
    log::trace!("stream wrote {} bytes, flush={}", bytes.len(), flush);
    Ok(())
}
