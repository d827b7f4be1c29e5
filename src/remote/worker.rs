use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use crate::model::command::PanelId;
use crate::model::row::{RowFields, RowKey};
use crate::remote::source::{RawItem, RemoteError, RemoteId, RemoteOp, RemoteSource};

/// Completions sent from worker threads back to the single control flow.
#[derive(Debug)]
pub enum Completion {
    /// A full fetch finished. `generation` identifies which refresh this
    /// was; stale generations are discarded by the controller.
    Fetched {
        panel: PanelId,
        generation: u64,
        result: Result<Vec<RawItem>, RemoteError>,
    },
    /// A create finished; on success the temp row is promoted to the
    /// returned remote id.
    Created {
        panel: PanelId,
        temp_key: RowKey,
        result: Result<RemoteId, RemoteError>,
    },
    /// A mutation finished; the controller confirms or rolls back the row.
    /// `request` ties the completion back to the state captured when the
    /// write was issued.
    Mutated {
        panel: PanelId,
        request: u64,
        key: RowKey,
        op: RemoteOp,
        result: Result<(), RemoteError>,
    },
}

/// Runs remote calls off-thread and funnels their completions through one
/// channel, polled by the event loop. All shared state stays on the polling
/// thread; workers touch only their own `Arc<dyn RemoteSource>`.
pub struct CompletionBus {
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
}

impl Default for CompletionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        CompletionBus { tx, rx }
    }

    /// Non-blocking poll for completions that have arrived.
    /// Returns all queued completions (may be empty).
    pub fn poll(&self) -> Vec<Completion> {
        let mut out = Vec::new();
        while let Ok(c) = self.rx.try_recv() {
            out.push(c);
        }
        out
    }

    pub fn spawn_fetch(&self, panel: PanelId, generation: u64, source: Arc<dyn RemoteSource>) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = source.fetch_all();
            if let Err(e) = &result {
                tracing::warn!(panel = %panel, %e, "fetch failed");
            }
            let _ = tx.send(Completion::Fetched {
                panel,
                generation,
                result,
            });
        });
    }

    pub fn spawn_create(
        &self,
        panel: PanelId,
        temp_key: RowKey,
        source: Arc<dyn RemoteSource>,
        fields: RowFields,
        group: String,
        order: f64,
    ) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = source.create(&fields, &group, order);
            if let Err(e) = &result {
                tracing::warn!(panel = %panel, %e, "create failed");
            }
            let _ = tx.send(Completion::Created {
                panel,
                temp_key,
                result,
            });
        });
    }

    pub fn spawn_mutate(
        &self,
        panel: PanelId,
        request: u64,
        key: RowKey,
        remote_id: RemoteId,
        source: Arc<dyn RemoteSource>,
        op: RemoteOp,
    ) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = source.mutate(&remote_id, &op);
            if let Err(e) = &result {
                tracing::warn!(panel = %panel, row = %key, %e, "mutation failed");
            }
            let _ = tx.send(Completion::Mutated {
                panel,
                request,
                key,
                op,
                result,
            });
        });
    }
}
