//! LOD Worker
//!
//! One long-lived background thread per renderable object. The owning thread
//! debounces edits and hands the worker deep snapshots through a single-slot
//! pending channel; the worker generates every LOD level of the newest
//! snapshot and publishes the merged result into a shared buffer.
//!
//! Every request bumps a sequence number. A pass only publishes if its
//! snapshot still carries the latest requested sequence, so results of
//! superseded edits are discarded instead of briefly showing stale geometry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::Sender;
use hullmesh_core::{ObjectId, ObjectSnapshot, RenderSettings};
use hullmesh_platform::{Debounce, ScopedTimer, Thread};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::generator::{GenerateOptions, MeshGenerator};
use crate::material::SourceKind;
use crate::mesh::{MeshAccumulator, MeshFragment};
use crate::RendererResult;

/// Worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LodState {
    /// Nothing to do
    Idle,
    /// A snapshot waits in the pending slot
    SnapshotPending,
    /// Levels are being generated
    Generating,
    /// The merged result is being written
    Publishing,
    /// The worker has shut down
    Stopped,
}

/// Messages sent from workers to the owning thread
#[derive(Debug, Clone, PartialEq)]
pub enum LodSignal {
    /// A pass started generating `levels` levels
    Started {
        object: ObjectId,
        sequence: u64,
        levels: usize,
    },
    /// A pass finished and its result is in the merged buffer
    Ready { object: ObjectId, sequence: u64 },
}

/// Latest published result of one worker
#[derive(Debug, Clone, Default)]
pub struct MergedMesh {
    /// Request sequence the result was generated for (0 before the first pass)
    pub sequence: u64,
    /// Kind of object the snapshot described
    pub kind: SourceKind,
    pub accumulator: MeshAccumulator,
}

struct Pending {
    requested: u64,
    snapshot: Option<(u64, ObjectSnapshot)>,
    state: LodState,
}

impl Pending {
    fn settle(&mut self) {
        self.state = if self.snapshot.is_some() {
            LodState::SnapshotPending
        } else {
            LodState::Idle
        };
    }
}

struct Shared {
    pending: Mutex<Pending>,
    wake: Condvar,
    buffer: RwLock<MergedMesh>,
    stop: AtomicBool,
}

impl Shared {
    fn is_current(&self, sequence: u64) -> bool {
        !self.stop.load(Ordering::Acquire) && self.pending.lock().requested == sequence
    }
}

/// Handle to one object's background LOD generator
pub struct LodWorker {
    object: ObjectId,
    shared: Arc<Shared>,
    debounce: Debounce,
    thread: Option<Thread>,
}

impl LodWorker {
    /// Spawn the worker thread for `object`.
    ///
    /// When LODs are disabled no thread is started and every request is
    /// ignored.
    pub fn spawn(
        object: ObjectId,
        settings: &RenderSettings,
        generator: Arc<dyn MeshGenerator>,
        signals: Sender<LodSignal>,
    ) -> RendererResult<Self> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending {
                requested: 0,
                snapshot: None,
                state: LodState::Idle,
            }),
            wake: Condvar::new(),
            buffer: RwLock::new(MergedMesh::default()),
            stop: AtomicBool::new(false),
        });

        let thread = if settings.disable_lods {
            None
        } else {
            let worker_shared = Arc::clone(&shared);
            let worker_settings = settings.clone();
            Some(Thread::spawn(format!("lod-{object}"), move || {
                run(object, &worker_shared, &worker_settings, generator.as_ref(), &signals);
            })?)
        };

        Ok(Self {
            object,
            shared,
            debounce: Debounce::new(settings.debounce()),
            thread,
        })
    }

    /// Object this worker generates for
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Whether a worker thread exists
    pub fn is_enabled(&self) -> bool {
        self.thread.is_some()
    }

    /// Record an edit: supersede any pass in flight and restart the debounce
    pub fn request_update(&mut self, now: Instant) {
        if self.thread.is_none() || self.shared.stop.load(Ordering::Acquire) {
            return;
        }
        self.shared.pending.lock().requested += 1;
        self.debounce.restart(now);
    }

    /// Check the debounce. Returns `true` when a snapshot should be submitted now.
    pub fn poll_debounce(&mut self, now: Instant) -> bool {
        self.debounce.fire_if_due(now)
    }

    /// Fire an armed debounce immediately
    pub fn flush_debounce(&mut self) -> bool {
        self.debounce.fire_now()
    }

    /// Time at which the armed debounce fires
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Place a snapshot in the pending slot, replacing any unclaimed one
    pub fn submit(&self, snapshot: ObjectSnapshot) {
        if self.thread.is_none() {
            return;
        }
        let mut pending = self.shared.pending.lock();
        let sequence = pending.requested;
        pending.snapshot = Some((sequence, snapshot));
        if pending.state == LodState::Idle {
            pending.state = LodState::SnapshotPending;
        }
        self.shared.wake.notify_one();
    }

    /// Current worker state
    pub fn state(&self) -> LodState {
        self.shared.pending.lock().state
    }

    /// Latest requested sequence number
    pub fn latest_request(&self) -> u64 {
        self.shared.pending.lock().requested
    }

    /// Whether nothing is debouncing, pending or generating
    pub fn is_idle(&self) -> bool {
        !self.debounce.is_pending()
            && matches!(self.state(), LodState::Idle | LodState::Stopped)
    }

    /// Read the merged buffer under its read lock
    pub fn read_result<T>(&self, f: impl FnOnce(&MergedMesh) -> T) -> T {
        f(&self.shared.buffer.read())
    }

    /// Shut the worker down and wait for it to exit
    pub fn stop(&mut self) {
        self.debounce.cancel();
        self.shared.stop.store(true, Ordering::Release);
        {
            let _pending = self.shared.pending.lock();
            self.shared.wake.notify_all();
        }

        match self.thread.take() {
            Some(mut thread) => {
                if let Err(e) = thread.join() {
                    log::warn!("LOD worker for {} failed: {}", self.object, e);
                }
            }
            None => self.shared.pending.lock().state = LodState::Stopped,
        }
    }
}

impl Drop for LodWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LodWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LodWorker")
            .field("object", &self.object)
            .field("state", &self.state())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn run(
    object: ObjectId,
    shared: &Shared,
    settings: &RenderSettings,
    generator: &dyn MeshGenerator,
    signals: &Sender<LodSignal>,
) {
    let startup = settings.startup_delay();
    if !startup.is_zero() {
        let deadline = Instant::now() + startup;
        let mut pending = shared.pending.lock();
        while !shared.stop.load(Ordering::Acquire) && Instant::now() < deadline {
            shared.wake.wait_until(&mut pending, deadline);
        }
    }

    let levels = settings.lod_count();
    let poll_interval = settings.poll_interval();

    while let Some((sequence, snapshot)) = next_job(shared, poll_interval) {
        let _ = signals.send(LodSignal::Started {
            object,
            sequence,
            levels,
        });

        let _span = tracing::debug_span!("lod_pass", object = %object, sequence).entered();
        let _timer = ScopedTimer::traced("lod_pass");
        let Some(accumulator) = generate_levels(shared, settings, generator, &snapshot, sequence)
        else {
            log::debug!("Abandoned LOD pass {} for {}", sequence, object);
            shared.pending.lock().settle();
            continue;
        };

        let mut pending = shared.pending.lock();
        if shared.stop.load(Ordering::Acquire) || pending.requested != sequence {
            log::debug!("Discarded superseded LOD result {} for {}", sequence, object);
            pending.settle();
            continue;
        }

        pending.state = LodState::Publishing;
        *shared.buffer.write() = MergedMesh {
            sequence,
            kind: SourceKind::of(&snapshot),
            accumulator,
        };
        let _ = signals.send(LodSignal::Ready { object, sequence });
        pending.settle();
    }

    shared.pending.lock().state = LodState::Stopped;
}

/// Wait for the next snapshot; `None` once stopped
fn next_job(shared: &Shared, poll_interval: Duration) -> Option<(u64, ObjectSnapshot)> {
    let mut pending = shared.pending.lock();
    loop {
        if shared.stop.load(Ordering::Acquire) {
            return None;
        }
        if let Some(job) = pending.snapshot.take() {
            pending.state = LodState::Generating;
            return Some(job);
        }
        shared.wake.wait_for(&mut pending, poll_interval);
    }
}

/// Generate all levels, coarsest first. `None` if the pass went stale.
fn generate_levels(
    shared: &Shared,
    settings: &RenderSettings,
    generator: &dyn MeshGenerator,
    snapshot: &ObjectSnapshot,
    sequence: u64,
) -> Option<MeshAccumulator> {
    let levels = settings.lod_count();
    let mut accumulator = MeshAccumulator::new();

    for lod in 0..levels {
        if !shared.is_current(sequence) {
            return None;
        }

        let options = GenerateOptions::new(
            settings.lod_resolution(levels - lod - 1),
            settings.min_resolution,
        );
        let fragment = generator.generate(snapshot, &options).unwrap_or_else(|e| {
            log::debug!("LOD {} of '{}' is empty: {}", lod, snapshot.name, e);
            MeshFragment::empty()
        });
        accumulator.append(&fragment, lod as u32);

        if !shared.is_current(sequence) {
            return None;
        }
    }

    Some(accumulator)
}
