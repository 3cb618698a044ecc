//! Entry visit URL requests
//!
//! Visit URLs are single-sign-on deep links issued by the server. Requests
//! are answered one at a time in arrival order by a worker task that lives
//! as long as the session.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use xext_core::{Error, Result};

use crate::transport::{Request, Response, Transport};

struct VisitTask {
    entry_id: String,
    referer: String,
    reply: oneshot::Sender<Result<String>>,
}

/// FIFO queue of entry visit requests with one request in flight
#[derive(Clone)]
pub struct EntryVisitQueue {
    tx: mpsc::UnboundedSender<VisitTask>,
}

impl EntryVisitQueue {
    /// Start the worker; it stops when `cancel` fires
    ///
    /// Requests still queued at that point fail with `SessionClosed`.
    pub fn spawn(transport: Arc<dyn Transport>, cancel: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<VisitTask>();

        tokio::spawn(async move {
            loop {
                let task = tokio::select! {
                    _ = cancel.cancelled() => break,
                    task = rx.recv() => match task {
                        Some(task) => task,
                        None => break,
                    },
                };

                debug!("Requesting visit url for entry {}", task.entry_id);
                let request = Request::new(
                    "entry",
                    "visit",
                    json!({"entryID": task.entry_id, "referer": task.referer}),
                );
                let result = tokio::select! {
                    _ = cancel.cancelled() => Err(Error::SessionClosed),
                    response = transport.send(request) => response.and_then(visit_url),
                };
                let _ = task.reply.send(result);
            }
            debug!("Entry visit queue stopped");
        });

        Self { tx }
    }

    /// Resolve the visit URL of an entry
    pub async fn visit_url(&self, entry_id: &str, referer: &str) -> Result<String> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(VisitTask {
                entry_id: entry_id.to_string(),
                referer: referer.to_string(),
                reply,
            })
            .map_err(|_| Error::SessionClosed)?;
        response.await.map_err(|_| Error::SessionClosed)?
    }
}

fn visit_url(response: Response) -> Result<String> {
    response
        .into_data()?
        .as_str()
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::transport("entry visit returned no url"))
}
