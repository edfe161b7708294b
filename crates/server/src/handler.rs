//! Event routing for the stdio host.
//!
//! Lifecycle events (`install`, `activate`, `status`) are handled in arrival
//! order. Each `fetch` is intercepted as its own task and replies when it
//! resolves, so a slow request never holds up the ones behind it.

use std::io;

use serde::Serialize;
use serde_json::Value;
use shelter_client::{PendingResponse, ServiceWorker, WorkerState};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use url::Url;

use crate::error::ProtocolError;
use crate::protocol::{Envelope, Event, FetchReply, Reply};

/// Snapshot returned for the `status` event.
#[derive(Debug, Serialize)]
pub struct Status {
    pub state: WorkerState,
    pub generation: String,
    pub origin: String,
}

/// What handling one line produced.
pub enum Handled {
    Ready(Reply),
    Pending(Option<Value>, PendingResponse),
}

pub struct Host {
    worker: ServiceWorker,
    origin: Url,
}

impl Host {
    pub fn new(worker: ServiceWorker) -> Self {
        let origin = worker.policy().origin.clone();
        Self { worker, origin }
    }

    pub fn worker(&self) -> &ServiceWorker {
        &self.worker
    }

    /// Handle one input line.
    pub async fn handle(&self, line: &str) -> Handled {
        let envelope = match Envelope::parse(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "rejected input line");
                return Handled::Ready(Reply::failure(salvage_id(line), e));
            }
        };
        let id = envelope.id;

        match envelope.event {
            Event::Install => Handled::Ready(match self.worker.install().await {
                Ok(outcome) => Reply::success(id, outcome),
                Err(e) => Reply::failure(id, e),
            }),
            Event::Activate => Handled::Ready(match self.worker.activate().await {
                Ok(report) => Reply::success(id, report),
                Err(e) => Reply::failure(id, e),
            }),
            Event::Status => Handled::Ready(Reply::success(id, self.status().await)),
            Event::Fetch(params) => match params.into_request(&self.origin) {
                Ok(request) => {
                    tracing::debug!(method = %request.method, url = %request.url, "intercepting");
                    Handled::Pending(id, self.worker.intercept(request))
                }
                Err(e) => Handled::Ready(Reply::failure(id, e)),
            },
        }
    }

    pub async fn status(&self) -> Status {
        Status {
            state: self.worker.state().await,
            generation: self.worker.policy().generation.clone(),
            origin: self.origin.to_string(),
        }
    }
}

/// Best-effort `id` from a line that failed to parse as an event.
fn salvage_id(line: &str) -> Option<Value> {
    serde_json::from_str::<Value>(line).ok().and_then(|v| v.get("id").cloned())
}

/// Read events from `reader` until EOF, writing one reply line per event to
/// `writer`. Returns the writer once every pending fetch has replied.
pub async fn serve<R, W>(host: &Host, reader: R, mut writer: W) -> io::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Reply>();

    let read = async move {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match host.handle(&line).await {
                Handled::Ready(reply) => {
                    let _ = tx.send(reply);
                }
                Handled::Pending(id, pending) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let resolution = pending.wait().await;
                        let _ = tx.send(Reply::success(id, FetchReply::from(resolution)));
                    });
                }
            }
        }
        tracing::debug!("input closed");
        Ok::<_, io::Error>(())
    };

    let write = async {
        while let Some(reply) = rx.recv().await {
            let mut line = serde_json::to_vec(&reply).map_err(|e| {
                io::Error::other(ProtocolError::InvalidInput(format!("failed to encode reply: {e}")))
            })?;
            line.push(b'\n');
            writer.write_all(&line).await?;
            writer.flush().await?;
        }
        Ok::<_, io::Error>(())
    };

    tokio::try_join!(read, write)?;
    Ok(writer)
}
