//! Append-only trace log.
//!
//! One JSON line per trace. With `hash_chain` on, every entry carries the
//! hash of its predecessor (`hash_prev`) and of itself (`hash_self`), so a
//! truncated or edited log is detectable with [`verify_hash_chain`].

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use crate::consumer::{Consumer, ConsumerRejection, Delivery};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLogEntry {
    /// Correlation id of the trace.
    pub entry_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub player_id: String,
    pub version_id: String,
    pub gameplay_id: Uuid,
    pub trace: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

#[derive(Debug)]
struct ChainState {
    last_hash: Option<String>,
    entries: u64,
}

pub struct TraceLogConsumer {
    path: PathBuf,
    hash_chain: bool,
    state: Mutex<ChainState>,
}

impl TraceLogConsumer {
    /// Opens (or creates) the log. An existing log is resumed: the chain
    /// continues from its last entry.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }

        let state = if path.exists() {
            resume_state(&path)?
        } else {
            ChainState {
                last_hash: None,
                entries: 0,
            }
        };
        debug!(path = %path.display(), entries = state.entries, "trace log opened");

        Ok(Self {
            path,
            hash_chain,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries written, including those found on open.
    pub async fn entries(&self) -> u64 {
        self.state.lock().await.entries
    }

    async fn append(&self, delivery: Delivery<'_>) -> Result<usize> {
        let mut state = self.state.lock().await;
        let mut buf = String::new();
        let mut last_hash = state.last_hash.clone();

        for trace in delivery.traces {
            let mut entry = TraceLogEntry {
                entry_id: trace.correlation_id,
                ts_utc: Utc::now(),
                player_id: delivery.player_id.to_string(),
                version_id: delivery.version_id.to_string(),
                gameplay_id: trace
                    .tracking
                    .as_ref()
                    .map(|t| t.gameplay_id)
                    .unwrap_or(delivery.gameplay_id),
                trace: serde_json::to_value(trace).context("serialize trace failed")?,
                hash_prev: None,
                hash_self: None,
            };

            if self.hash_chain {
                entry.hash_prev = last_hash.clone();
                let h = compute_entry_hash(&entry)?;
                entry.hash_self = Some(h.clone());
                last_hash = Some(h);
            }

            buf.push_str(&canonical_json_line(&entry)?);
            buf.push('\n');
        }

        // One write per batch; chain state only advances once it is on disk.
        append_all(&self.path, &buf)?;
        state.last_hash = last_hash;
        state.entries += delivery.traces.len() as u64;
        Ok(delivery.traces.len())
    }
}

#[async_trait]
impl Consumer for TraceLogConsumer {
    fn name(&self) -> &str {
        "trace_log"
    }

    async fn accept(&self, delivery: Delivery<'_>) -> Result<(), ConsumerRejection> {
        match self.append(delivery).await {
            Ok(n) => {
                debug!(entries = n, path = %self.path.display(), "traces logged");
                Ok(())
            }
            Err(e) => {
                error!(path = %self.path.display(), "trace log append failed: {e:#}");
                Err(ConsumerRejection::with_status(500, format!("{e:#}")))
            }
        }
    }
}

fn resume_state(path: &Path) -> Result<ChainState> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read trace log {:?}", path))?;
    let mut state = ChainState {
        last_hash: None,
        entries: 0,
    };
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry: TraceLogEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("parse trace log entry at line {}", i + 1))?;
        state.last_hash = entry.hash_self;
        state.entries += 1;
    }
    Ok(state)
}

fn append_all(path: &Path, content: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open trace log {:?}", path))?;
    f.write_all(content.as_bytes())
        .context("write trace log failed")?;
    Ok(())
}

fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize trace log entry failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Hash of the canonical entry with `hash_self` cleared.
pub fn compute_entry_hash(entry: &TraceLogEntry) -> Result<String> {
    let mut clone = entry.clone();
    clone.hash_self = None;
    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read trace log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Same as [`verify_hash_chain`] over in-memory JSONL content.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut lines = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry: TraceLogEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("parse trace log entry at line {}", i + 1))?;
        lines += 1;

        if entry.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, entry.hash_prev
                ),
            });
        }

        if let Some(ref claimed) = entry.hash_self {
            let recomputed = compute_entry_hash(&entry)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!(
                        "hash_self mismatch: claimed {}, recomputed {}",
                        claimed, recomputed
                    ),
                });
            }
        }

        prev_hash = entry.hash_self;
    }

    Ok(VerifyResult::Valid { lines })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}
