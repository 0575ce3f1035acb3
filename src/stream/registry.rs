use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::line_reader::DEFAULT_CHUNK_SIZE;
use super::session::{BoxedSource, StreamSession};
use super::types::{OpenOutcome, ReadBatch, StreamError, StreamId, StreamResult};

/// Default maximum open streams
const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Per-stream cell. `None` once the session has been torn down.
type Slot = Arc<Mutex<Option<StreamSession>>>;
type SlotGuard = OwnedMutexGuard<Option<StreamSession>>;

/// In-memory registry of open stream sessions
///
/// The map lock is only held to look up, insert or remove a slot. All cursor
/// work happens under the slot's own mutex, on the blocking pool, so a slow
/// source only stalls callers of the same stream.
#[derive(Clone)]
pub struct StreamRegistry {
    sessions: Arc<RwLock<HashMap<StreamId, Slot>>>,
    max_sessions: usize,
    chunk_size: usize,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }

    /// Create registry with custom max open streams
    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the byte count pulled from a source per read call
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Ids of all open streams, sorted
    pub fn list(&self) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Get the count of open streams
    pub fn stream_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Register a new session over `source`.
    ///
    /// Fails with `AlreadyOpen` if `id` is taken; the existing session is
    /// untouched and `source` is dropped.
    pub async fn open(
        &self,
        id: StreamId,
        source: BoxedSource,
        want_header: bool,
    ) -> StreamResult<OpenOutcome> {
        let slot: Slot = Arc::new(Mutex::new(Some(StreamSession::new(
            id.clone(),
            source,
            self.chunk_size,
        ))));
        // Hold the new slot until the header is captured so no read can
        // overtake it.
        let guard = Arc::clone(&slot)
            .try_lock_owned()
            .map_err(|e| StreamError::Task(format!("fresh slot for {} is locked: {}", id, e)))?;

        {
            let mut sessions = self.sessions.write();
            if sessions.contains_key(&id) {
                return Err(StreamError::AlreadyOpen(id));
            }
            if sessions.len() >= self.max_sessions {
                return Err(StreamError::AtCapacity(self.max_sessions));
            }
            sessions.insert(id.clone(), Arc::clone(&slot));
        }

        if !want_header {
            info!("Stream {} opened", id);
            return Ok(OpenOutcome::Id(id));
        }

        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            let header = guard.as_mut().map(|session| session.capture_header());
            (guard, header)
        })
        .await;

        match joined {
            Ok((_, Some(Ok(header)))) => {
                info!("Stream {} opened with {} header fields", id, header.len());
                Ok(OpenOutcome::Header(header))
            }
            Ok((mut guard, Some(Err(e)))) => {
                warn!("Stream {} failed while reading header: {}", id, e);
                self.teardown(&id, &slot, &mut guard);
                Err(e)
            }
            Ok((_, None)) => Err(StreamError::NoSuchSession(id)),
            Err(e) => {
                self.abandon(&id, &slot).await;
                Err(StreamError::Task(e.to_string()))
            }
        }
    }

    /// Pull up to `count` lines and decode them.
    ///
    /// Reaching the end of the source removes the stream and releases its
    /// source; the returned batch then has `more == false`.
    ///
    /// Teardown runs on the blocking task, so it completes even if the caller
    /// goes away mid-read. Lines pulled for a caller that went away are still
    /// consumed and are not delivered to anyone.
    pub async fn read(&self, id: &str, count: usize) -> StreamResult<ReadBatch> {
        let slot = self
            .slot(id)
            .ok_or_else(|| StreamError::NoSuchSession(id.to_string()))?;
        let guard = Arc::clone(&slot).lock_owned().await;

        let registry = self.clone();
        let task_id = id.to_string();
        let task_slot = Arc::clone(&slot);
        let joined = tokio::task::spawn_blocking(move || {
            registry.read_locked(&task_id, &task_slot, guard, count)
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) => {
                self.abandon(id, &slot).await;
                Err(StreamError::Task(e.to_string()))
            }
        }
    }

    /// Blocking half of `read`, run while holding the slot
    fn read_locked(
        &self,
        id: &str,
        slot: &Slot,
        mut guard: SlotGuard,
        count: usize,
    ) -> StreamResult<ReadBatch> {
        // Closed while we waited for the slot
        let session = guard
            .as_mut()
            .ok_or_else(|| StreamError::NoSuchSession(id.to_string()))?;

        let batch = match session.pull(count) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Stream {} torn down after read failure: {}", id, e);
                self.teardown(id, slot, &mut guard);
                return Err(e);
            }
        };
        let data = session.decode(&batch.lines);

        if batch.exhausted {
            let lines_read = session.lines_read();
            self.teardown(id, slot, &mut guard);
            info!("Stream {} exhausted after {} lines", id, lines_read);
        }
        Ok(ReadBatch {
            data: data?,
            more: !batch.exhausted,
        })
    }

    /// Close a stream. Returns whether it was open.
    pub async fn close(&self, id: &str) -> bool {
        let slot = self.sessions.write().remove(id);
        match slot {
            Some(slot) => {
                // Waits for any in-flight read on this stream
                let session = slot.lock().await.take();
                drop(session);
                info!("Stream {} closed", id);
                true
            }
            None => false,
        }
    }

    /// Remove streams with no read in the last N seconds.
    ///
    /// Streams busy with a read are skipped.
    pub fn cleanup_idle(&self, timeout_seconds: i64) -> usize {
        let now = Utc::now();
        let slots: Vec<(StreamId, Slot)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut removed = 0;
        for (id, slot) in slots {
            let Ok(mut guard) = slot.try_lock() else {
                continue;
            };
            let is_idle = guard
                .as_ref()
                .map(|s| (now - s.last_access()).num_seconds() >= timeout_seconds)
                .unwrap_or(false);
            if is_idle {
                guard.take();
                self.remove_slot(&id, &slot);
                debug!("Stream {} expired after idling", id);
                removed += 1;
            }
        }
        removed
    }

    fn slot(&self, id: &str) -> Option<Slot> {
        self.sessions.read().get(id).cloned()
    }

    /// Drop the session held by `guard` and unlink its slot
    fn teardown(&self, id: &str, slot: &Slot, guard: &mut SlotGuard) {
        drop(guard.take());
        self.remove_slot(id, slot);
    }

    /// Teardown path when the guard was lost to a panicked blocking task
    async fn abandon(&self, id: &str, slot: &Slot) {
        self.remove_slot(id, slot);
        drop(slot.lock().await.take());
    }

    /// Unlink `slot` only if `id` still maps to it; a stream closed and
    /// reopened in the meantime is left alone.
    fn remove_slot(&self, id: &str, slot: &Slot) {
        let mut sessions = self.sessions.write();
        if sessions.get(id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            sessions.remove(id);
        }
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
