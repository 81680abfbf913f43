//! Engine Module
//!
//! The LSM storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Route writes into the active memtable and rotate it on size threshold
//! - Serve reads newest-first: active → frozen queue → segments
//! - Run the background flush and compaction workers
//! - Discover existing segments on startup, join workers on shutdown
//!
//! ## Locking
//! Four locks: active table, frozen queue, segment list, compaction gate.
//! Rotation nests queue inside active; nothing else nests. No lock is ever
//! held across file I/O: reads probe segments through `Arc` clones taken
//! under the list lock, and the workers do their disk work lock-free.

mod compaction;

use std::collections::VecDeque;
use std::fs;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::error::Result;
use crate::memtable::{Entry, MemTable};
use crate::segment::{Segment, SegmentBuilder, SegmentId, INDEX_EXTENSION, TMP_SUFFIX};
use crate::BasaltError;

/// Pause between compaction cycles so flush appends are never starved
const COMPACTION_PAUSE: Duration = Duration::from_millis(100);

/// The main storage engine
///
/// Cheap to share behind an `Arc`; all operations take `&self`. Dropping the
/// engine signals shutdown and joins both workers. Frozen tables not yet
/// flushed at that point are lost.
pub struct LsmEngine {
    shared: Arc<Shared>,
    flush_handle: Option<JoinHandle<()>>,
    compaction_handle: Option<JoinHandle<()>>,
}

/// State shared between the caller-facing engine and its workers
struct Shared {
    config: Config,

    /// The single mutable table receiving writes
    active: Mutex<MemTable>,

    /// Sealed tables awaiting flush, oldest at the front
    frozen: Mutex<VecDeque<MemTable>>,

    /// Signaled on rotation; waited on by the flush worker (frozen lock)
    flush_cv: Condvar,

    /// On-disk segments, oldest first
    segments: Mutex<Vec<Arc<Segment>>>,

    /// Rendezvous for the compaction worker's waits
    compaction_gate: Mutex<()>,

    /// Signaled when the segment list reaches the compaction threshold
    compaction_cv: Condvar,

    /// Cleared on shutdown; both workers exit when they observe it
    running: AtomicBool,

    /// Monotonic disambiguator appended to segment file names
    next_seq: AtomicU64,
}

impl LsmEngine {
    /// Open or create an engine over `config.data_dir`.
    ///
    /// On startup:
    /// 1. Create the data directory and sweep leftover `.tmp` files
    /// 2. Discover `sstable_*` pairs, discarding any with an unloadable index
    /// 3. Spawn the flush and compaction workers
    /// 4. Signal compaction if the loaded count already meets the threshold
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let segments = discover_segments(&config)?;
        let next_seq = segments
            .iter()
            .map(|s| s.id().seq + 1)
            .max()
            .unwrap_or(0);
        let at_threshold = segments.len() >= config.max_segment_count;

        tracing::info!(
            "engine opened with {} segment(s) in {}",
            segments.len(),
            config.data_dir.display()
        );

        let shared = Arc::new(Shared {
            config,
            active: Mutex::new(MemTable::new()),
            frozen: Mutex::new(VecDeque::new()),
            flush_cv: Condvar::new(),
            segments: Mutex::new(segments),
            compaction_gate: Mutex::new(()),
            compaction_cv: Condvar::new(),
            running: AtomicBool::new(true),
            next_seq: AtomicU64::new(next_seq),
        });

        let flush_shared = Arc::clone(&shared);
        let flush_handle = thread::Builder::new()
            .name("basaltkv-flush".to_string())
            .spawn(move || flush_worker(flush_shared))
            .map_err(|e| BasaltError::Storage(format!("failed to spawn flush worker: {}", e)))?;

        let compaction_shared = Arc::clone(&shared);
        let compaction_handle = match thread::Builder::new()
            .name("basaltkv-compaction".to_string())
            .spawn(move || compaction_worker(compaction_shared))
        {
            Ok(handle) => handle,
            Err(e) => {
                // Unwind the flush worker before reporting failure
                shared.running.store(false, Ordering::Release);
                shared.flush_cv.notify_all();
                let _ = flush_handle.join();
                return Err(BasaltError::Storage(format!(
                    "failed to spawn compaction worker: {}",
                    e
                )));
            }
        };

        if at_threshold {
            shared.compaction_cv.notify_one();
        }

        Ok(Self {
            shared,
            flush_handle: Some(flush_handle),
            compaction_handle: Some(compaction_handle),
        })
    }

    /// Insert or overwrite a key-value pair. Never fails.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        let mut active = self.shared.active.lock();
        active.put(key, value);
        self.shared.maybe_rotate(&mut active);
    }

    /// Get a value by key, walking the hierarchy newest-first.
    ///
    /// A tombstone anywhere short-circuits to `Ok(None)`; only segment probes
    /// can fail (disk I/O).
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        {
            let active = self.shared.active.lock();
            match active.get(key) {
                Some(Entry::Value(v)) => return Ok(Some(v.clone())),
                Some(Entry::Tombstone) => return Ok(None),
                None => {}
            }
        }

        {
            let frozen = self.shared.frozen.lock();
            for table in frozen.iter().rev() {
                match table.get(key) {
                    Some(Entry::Value(v)) => return Ok(Some(v.clone())),
                    Some(Entry::Tombstone) => return Ok(None),
                    None => {}
                }
            }
        }

        // Snapshot the list so no lock is held across file reads; the Arcs
        // keep detached segments readable even if compaction unlinks them
        let snapshot: Vec<Arc<Segment>> = self.shared.segments.lock().clone();
        for segment in snapshot.iter().rev() {
            match segment.get(key)? {
                Some(Entry::Value(v)) => return Ok(Some(v)),
                Some(Entry::Tombstone) => return Ok(None),
                None => {}
            }
        }

        Ok(None)
    }

    /// Mark a key as deleted. Never fails and performs no existence check.
    pub fn delete(&self, key: Vec<u8>) {
        let mut active = self.shared.active.lock();
        active.delete(key);
        self.shared.maybe_rotate(&mut active);
    }

    /// Number of on-disk segments
    pub fn segment_count(&self) -> usize {
        self.shared.segments.lock().len()
    }

    /// Number of sealed tables awaiting flush
    pub fn frozen_count(&self) -> usize {
        self.shared.frozen.lock().len()
    }
}

impl Drop for LsmEngine {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.flush_cv.notify_all();
        self.shared.compaction_cv.notify_all();

        if let Some(handle) = self.flush_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.compaction_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Shared {
    /// Seal the active table and queue it for flush once it crosses the
    /// size threshold. Caller holds the active-table lock; the frozen-queue
    /// lock nests briefly inside it.
    fn maybe_rotate(&self, active: &mut MemTable) {
        if active.approximate_size() < self.config.memtable_size_limit || active.is_empty() {
            return;
        }

        let sealed = mem::take(active);
        self.frozen.lock().push_back(sealed);
        self.flush_cv.notify_one();
    }

    /// Allocate the next segment identity
    fn next_segment_id(&self) -> SegmentId {
        SegmentId {
            millis: unix_millis(),
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Write one sealed table as a new segment and publish it
    fn flush_table(&self, table: MemTable) -> Result<()> {
        let id = self.next_segment_id();
        let mut builder = SegmentBuilder::create(&self.config.data_dir, id)?;
        for (key, entry) in table {
            builder.add(&key, &entry)?;
        }
        let records = builder.record_count();
        let index_path = builder.finish()?;
        let segment = Arc::new(Segment::open(&index_path)?);

        tracing::debug!(
            "flushed segment {} ({} records)",
            segment.index_path().display(),
            records
        );

        let mut segments = self.segments.lock();
        segments.push(segment);
        if segments.len() >= self.config.max_segment_count {
            self.compaction_cv.notify_one();
        }

        Ok(())
    }
}

// =============================================================================
// Background Workers
// =============================================================================

/// Flush worker: drains the frozen queue one table at a time.
///
/// Exits as soon as shutdown is observed; tables still queued at that point
/// are dropped.
fn flush_worker(shared: Arc<Shared>) {
    loop {
        let table = {
            let mut frozen = shared.frozen.lock();
            loop {
                if !shared.running.load(Ordering::Acquire) {
                    return;
                }
                if let Some(table) = frozen.pop_front() {
                    break table;
                }
                shared.flush_cv.wait(&mut frozen);
            }
        };

        if table.is_empty() {
            continue;
        }

        if let Err(e) = shared.flush_table(table) {
            // The table is gone; its writes live only in newer tables, if
            // anywhere
            tracing::error!("flush failed, dropping table: {}", e);
        }
    }
}

/// Compaction worker: merges the oldest prefix of the segment list whenever
/// it reaches the configured threshold.
fn compaction_worker(shared: Arc<Shared>) {
    loop {
        {
            let mut gate = shared.compaction_gate.lock();
            loop {
                if !shared.running.load(Ordering::Acquire) {
                    return;
                }
                if shared.segments.lock().len() >= shared.config.max_segment_count {
                    break;
                }
                shared.compaction_cv.wait(&mut gate);
            }
        }

        if let Err(e) = compaction::compact_once(&shared) {
            tracing::error!("compaction cycle failed: {}", e);
        }

        thread::sleep(COMPACTION_PAUSE);
    }
}

// =============================================================================
// Startup Helpers
// =============================================================================

/// Scan the data directory for segment pairs, oldest first.
///
/// Removes stray `.tmp` files from interrupted builds; segments whose index
/// cannot be loaded are discarded with a warning.
fn discover_segments(config: &Config) -> Result<Vec<Arc<Segment>>> {
    let mut segments = Vec::new();

    for entry in fs::read_dir(&config.data_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        if path.to_string_lossy().ends_with(TMP_SUFFIX) {
            tracing::warn!("removing interrupted segment file {}", path.display());
            let _ = fs::remove_file(&path);
            continue;
        }

        if path.extension().and_then(|e| e.to_str()) != Some(INDEX_EXTENSION) {
            continue;
        }

        match Segment::open(&path) {
            Ok(segment) => segments.push(Arc::new(segment)),
            Err(e) => {
                tracing::warn!("discarding unreadable segment {}: {}", path.display(), e);
            }
        }
    }

    segments.sort_by_key(|s| s.id());
    Ok(segments)
}

/// Milliseconds since the Unix epoch
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
