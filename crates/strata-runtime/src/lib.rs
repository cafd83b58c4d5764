//! Renderable pool and worker-side geometry builds for paged terrain tiles.
#![forbid(unsafe_code)]

mod mesh;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use strata_paging::{
    Direction, HeightSource, LoadCompletion, MaterialId, PagingConfig, RenderableId,
    RenderableManager, TileId, TileInfo,
};

pub use mesh::TileMesh;
pub use rayon::ThreadPoolBuildError;

/// Height data shared with the build workers.
pub type SharedHeights = Arc<dyn HeightSource + Send + Sync>;

#[derive(Clone, Debug)]
pub struct BuildJob {
    pub renderable: RenderableId,
    pub tile: TileId,
    pub info: TileInfo,
    pub job_id: u64,
}

pub struct BuildOut {
    pub renderable: RenderableId,
    pub tile: TileId,
    pub job_id: u64,
    pub mesh: TileMesh,
    pub t_build_ms: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub live: usize,
    pub slots: usize,
    pub queued: usize,
    pub inflight: usize,
    pub completed: u64,
    /// Results that arrived for released or re-queued renderables.
    pub stale: u64,
}

#[derive(Clone, Copy, Debug)]
struct MeshSpec {
    size: (f32, f32),
    resolution: u32,
    height_scale: f32,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    live: bool,
    info: TileInfo,
    material: Option<MaterialId>,
    neighbors: [Option<RenderableId>; 4],
    mesh: Option<TileMesh>,
    // (tile, job_id) of the build this slot is waiting on
    pending: Option<(TileId, u64)>,
}

fn process_build_job(job: BuildJob, heights: &dyn HeightSource, spec: MeshSpec, tx: &Sender<BuildOut>) {
    let t0 = Instant::now();
    let mesh = TileMesh::build(heights, &job.info, spec.size, spec.resolution, spec.height_scale);
    if mesh.missing > 0 {
        log::debug!(
            target: "runtime",
            "{} built with {} missing samples ({})",
            job.renderable,
            mesh.missing,
            job.info
        );
    }
    let t_build_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
    let _ = tx.send(BuildOut {
        renderable: job.renderable,
        tile: job.tile,
        job_id: job.job_id,
        mesh,
        t_build_ms,
    });
}

/// Generational renderable slots whose geometry is built on a worker pool.
///
/// Builds are queued by [`RenderableManager::queue_loading`] and picked up
/// by [`RenderableManager::drain_completed`] on the caller's thread. A
/// result is only reported if its slot still holds the same generation and
/// is still waiting on that exact job.
pub struct RenderablePool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    job_tx: Sender<BuildJob>,
    res_rx: Receiver<BuildOut>,
    _workers: Arc<ThreadPool>,
    q_build: Arc<AtomicUsize>,
    inflight_build: Arc<AtomicUsize>,
    next_job_id: u64,
    completed: u64,
    stale: u64,
    pub w_build: usize,
}

impl RenderablePool {
    /// Spawns `workers` build threads; `0` picks one per available core.
    pub fn new(
        heights: SharedHeights,
        config: &PagingConfig,
        workers: usize,
    ) -> Result<Self, ThreadPoolBuildError> {
        let (job_tx, job_rx) = unbounded::<BuildJob>();
        let (res_tx, res_rx) = unbounded::<BuildOut>();

        let w_build = if workers > 0 {
            workers
        } else {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        };
        let spec = MeshSpec {
            size: config.tile_world_size(),
            resolution: config.tile_size + 1,
            height_scale: config.scale.y,
        };
        let q_build = Arc::new(AtomicUsize::new(0));
        let inflight_build = Arc::new(AtomicUsize::new(0));

        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(w_build)
                .thread_name(|i| format!("strata-build-{i}"))
                .build()?,
        );
        for _ in 0..w_build {
            let rx = job_rx.clone();
            let tx = res_tx.clone();
            let heights = heights.clone();
            let q_build = q_build.clone();
            let inflight_build = inflight_build.clone();
            pool.spawn(move || {
                while let Ok(job) = rx.recv() {
                    // inflight first: pending() must not read zero mid-handoff
                    inflight_build.fetch_add(1, Ordering::AcqRel);
                    q_build.fetch_sub(1, Ordering::AcqRel);
                    process_build_job(job, heights.as_ref(), spec, &tx);
                    inflight_build.fetch_sub(1, Ordering::AcqRel);
                }
            });
        }
        log::info!(
            target: "runtime",
            "renderable pool started: {} build workers, {}x{} vertices per tile",
            w_build,
            spec.resolution,
            spec.resolution
        );

        Ok(Self {
            slots: Vec::new(),
            free: Vec::new(),
            job_tx,
            res_rx,
            _workers: pool,
            q_build,
            inflight_build,
            next_job_id: 0,
            completed: 0,
            stale: 0,
            w_build,
        })
    }

    fn slot(&self, id: RenderableId) -> Option<&Slot> {
        self.slots
            .get(id.slot as usize)
            .filter(|s| s.live && s.generation == id.generation)
    }

    fn slot_mut(&mut self, id: RenderableId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.slot as usize)
            .filter(|s| s.live && s.generation == id.generation)
    }

    #[inline]
    pub fn is_live(&self, id: RenderableId) -> bool {
        self.slot(id).is_some()
    }

    pub fn mesh(&self, id: RenderableId) -> Option<&TileMesh> {
        self.slot(id).and_then(|s| s.mesh.as_ref())
    }

    pub fn info(&self, id: RenderableId) -> Option<&TileInfo> {
        self.slot(id).map(|s| &s.info)
    }

    pub fn material(&self, id: RenderableId) -> Option<MaterialId> {
        self.slot(id).and_then(|s| s.material)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.live).count()
    }

    /// Jobs not yet finished by a worker.
    pub fn pending(&self) -> usize {
        self.q_build.load(Ordering::Acquire) + self.inflight_build.load(Ordering::Acquire)
    }

    /// Blocks until every submitted job has produced its result, or the
    /// timeout runs out. Results still have to be drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    pub fn queue_debug_counts(&self) -> (usize, usize) {
        (
            self.q_build.load(Ordering::Relaxed),
            self.inflight_build.load(Ordering::Relaxed),
        )
    }

    pub fn stats(&self) -> RuntimeStats {
        let (queued, inflight) = self.queue_debug_counts();
        RuntimeStats {
            live: self.live_count(),
            slots: self.slots.len(),
            queued,
            inflight,
            completed: self.completed,
            stale: self.stale,
        }
    }

    fn accept(&mut self, out: BuildOut) -> Option<LoadCompletion> {
        let slot = self.slot_mut(out.renderable)?;
        if slot.pending != Some((out.tile, out.job_id)) {
            return None;
        }
        slot.pending = None;
        slot.mesh = Some(out.mesh);
        Some(LoadCompletion {
            renderable: out.renderable,
            tile: out.tile,
        })
    }
}

impl RenderableManager for RenderablePool {
    fn acquire(&mut self) -> RenderableId {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let s = &mut self.slots[slot as usize];
        s.live = true;
        RenderableId {
            slot,
            generation: s.generation,
        }
    }

    fn initialize(&mut self, id: RenderableId, info: &TileInfo, material: Option<MaterialId>) {
        if let Some(slot) = self.slot_mut(id) {
            slot.info = *info;
            slot.material = material;
        }
    }

    fn queue_loading(&mut self, id: RenderableId, tile: TileId) {
        let job_id = self.next_job_id;
        let Some(slot) = self.slot_mut(id) else {
            log::warn!(target: "runtime", "queue_loading on dead {}", id);
            return;
        };
        slot.pending = Some((tile, job_id));
        slot.mesh = None;
        let info = slot.info;
        self.next_job_id += 1;

        self.q_build.fetch_add(1, Ordering::AcqRel);
        let job = BuildJob {
            renderable: id,
            tile,
            info,
            job_id,
        };
        if self.job_tx.send(job).is_err() {
            self.q_build.fetch_sub(1, Ordering::AcqRel);
            log::warn!(target: "runtime", "build queue closed; {} will not load", id);
        } else {
            log::trace!(target: "runtime", "job {} queued for {} (tile {})", job_id, id, tile);
        }
    }

    fn release(&mut self, id: RenderableId) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        let generation = slot.generation.wrapping_add(1);
        *slot = Slot {
            generation,
            ..Slot::default()
        };
        self.free.push(id.slot);
    }

    fn set_neighbor(&mut self, id: RenderableId, dir: Direction, other: Option<RenderableId>) {
        if let Some(slot) = self.slot_mut(id) {
            slot.neighbors[dir.index()] = other;
        }
    }

    fn neighbor(&self, id: RenderableId, dir: Direction) -> Option<RenderableId> {
        let other = self.slot(id)?.neighbors[dir.index()]?;
        self.is_live(other).then_some(other)
    }

    fn max_height(&self, id: RenderableId) -> Option<f32> {
        self.mesh(id).map(|m| m.max_height)
    }

    fn drain_completed(&mut self) -> Vec<LoadCompletion> {
        let results: Vec<BuildOut> = self.res_rx.try_iter().collect();
        let mut done = Vec::with_capacity(results.len());
        for out in results {
            let (renderable, job_id, t_build_ms) = (out.renderable, out.job_id, out.t_build_ms);
            match self.accept(out) {
                Some(c) => {
                    self.completed += 1;
                    log::trace!(
                        target: "runtime",
                        "job {} done for {} in {} ms",
                        job_id,
                        renderable,
                        t_build_ms
                    );
                    done.push(c);
                }
                None => {
                    self.stale += 1;
                    log::trace!(target: "runtime", "dropping stale job {} for {}", job_id, renderable);
                }
            }
        }
        done
    }
}
