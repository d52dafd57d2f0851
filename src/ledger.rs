//! Upload ledger.
//!
//! Records which (source identity, device) pairs have already been
//! delivered and under which device-assigned content handle, so a second
//! run for the same pair can skip the physical transfer.
//!
//! Concurrency model: lookups read a shared snapshot; every mutation —
//! no matter which device session originated it — funnels through one
//! writer task that applies the change and rewrites the single backing
//! document atomically (temp file + rename). A crash mid-write therefore
//! never corrupts previously durable entries, and concurrent sessions
//! never interleave partial writes.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, warn};

use crate::core::{DeviceId, LedgerError};

/// One recorded delivery: the device-assigned content handle and when it
/// was uploaded.
///
/// Entries are never mutated in place — a stale handle is superseded by
/// recording a fresh entry for the same key. Unknown fields survive a
/// rewrite so newer writers' documents stay forward-readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Device-assigned handle for the uploaded content.
    pub remote_content_id: String,
    /// When the upload completed.
    pub uploaded_at: DateTime<Utc>,
    /// Fields this version does not know about, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LedgerEntry {
    /// Create an entry stamped with the current time.
    pub fn new(remote_content_id: impl Into<String>) -> Self {
        Self {
            remote_content_id: remote_content_id.into(),
            uploaded_at: Utc::now(),
            extra: Map::new(),
        }
    }
}

/// The persisted document: device id → source identity → entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerDoc {
    #[serde(default)]
    entries: BTreeMap<String, BTreeMap<String, LedgerEntry>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

enum WriteOp {
    Record {
        device: String,
        source: String,
        entry: LedgerEntry,
    },
    Invalidate {
        device: String,
        source: String,
    },
}

struct WriteRequest {
    op: WriteOp,
    ack: oneshot::Sender<Result<(), LedgerError>>,
}

/// Handle to the shared upload ledger.
///
/// Cheap to clone; one per device session. Dropping every handle stops
/// the writer task.
#[derive(Debug, Clone)]
pub struct Ledger {
    state: Arc<RwLock<LedgerDoc>>,
    tx: mpsc::Sender<WriteRequest>,
}

impl Ledger {
    /// Open (or create) the ledger backed by the document at `path`.
    ///
    /// A missing document is an empty ledger; an unreadable one is an
    /// error rather than silent data loss.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => LedgerDoc::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self::spawn_writer(doc, Some(path)))
    }

    /// An unpersisted ledger. Mutations succeed but nothing survives the
    /// process.
    pub fn in_memory() -> Self {
        Self::spawn_writer(LedgerDoc::default(), None)
    }

    fn spawn_writer(doc: LedgerDoc, path: Option<PathBuf>) -> Self {
        let state = Arc::new(RwLock::new(doc));
        let (tx, mut rx) = mpsc::channel::<WriteRequest>(32);

        let writer_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let snapshot = {
                    let mut doc = writer_state.write().await;
                    match request.op {
                        WriteOp::Record {
                            device,
                            source,
                            entry,
                        } => {
                            doc.entries.entry(device).or_default().insert(source, entry);
                        }
                        WriteOp::Invalidate { device, source } => {
                            if let Some(per_device) = doc.entries.get_mut(&device) {
                                per_device.remove(&source);
                                if per_device.is_empty() {
                                    doc.entries.remove(&device);
                                }
                            }
                        }
                    }
                    doc.clone()
                };

                let result = match &path {
                    Some(path) => persist(path.clone(), snapshot).await,
                    None => Ok(()),
                };
                if let Err(err) = &result {
                    warn!(error = %err, "ledger persist failed");
                }
                // The requester may have timed out and gone; that is fine.
                let _ = request.ack.send(result);
            }
            debug!("ledger writer stopped");
        });

        Self { state, tx }
    }

    /// Look up the recorded entry for a (source identity, device) pair.
    pub async fn lookup(&self, source_identity: &str, device: &DeviceId) -> Option<LedgerEntry> {
        self.state
            .read()
            .await
            .entries
            .get(device.as_str())
            .and_then(|per_device| per_device.get(source_identity))
            .cloned()
    }

    /// Insert or overwrite the entry for a pair, durably persisted before
    /// this returns.
    pub async fn record(
        &self,
        source_identity: &str,
        device: &DeviceId,
        entry: LedgerEntry,
    ) -> Result<(), LedgerError> {
        self.write(WriteOp::Record {
            device: device.as_str().to_owned(),
            source: source_identity.to_owned(),
            entry,
        })
        .await
    }

    /// Remove the entry for a pair. Used when the device reports the
    /// recorded content id no longer exists.
    pub async fn invalidate(
        &self,
        source_identity: &str,
        device: &DeviceId,
    ) -> Result<(), LedgerError> {
        self.write(WriteOp::Invalidate {
            device: device.as_str().to_owned(),
            source: source_identity.to_owned(),
        })
        .await
    }

    /// Number of recorded (source identity, device) pairs.
    pub async fn entry_count(&self) -> usize {
        self.state
            .read()
            .await
            .entries
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    async fn write(&self, op: WriteOp) -> Result<(), LedgerError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(WriteRequest { op, ack })
            .await
            .map_err(|_| LedgerError::WriterClosed)?;
        done.await.map_err(|_| LedgerError::WriterClosed)?
    }
}

/// Write the whole document next to its destination and rename it into
/// place.
async fn persist(path: PathBuf, doc: LedgerDoc) -> Result<(), LedgerError> {
    tokio::task::spawn_blocking(move || {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => std::path::Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), &doc)?;
        tmp.as_file_mut().flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&path)
            .map_err(|err| LedgerError::Persist(format!("{}: {}", path.display(), err.error)))?;
        Ok(())
    })
    .await
    .map_err(|err| LedgerError::Persist(format!("writer task aborted: {err}")))?
}
