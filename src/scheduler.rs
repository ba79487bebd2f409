//! Runs path requests on background workers and delivers their results on the polling thread.
use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, OnceLock},
};

use bevy::{
    log::{debug, error},
    math::UVec3,
    prelude::Resource,
};
use slab::Slab;
use smallvec::SmallVec;

use crate::{
    astar::find_path,
    block::Block,
    chunk::ChunkNodeCache,
    error::PathfindError,
    path::Path,
    settings::{PathfindSettings, SearchSettings},
};

/// Called with the finished path, empty if no path was found.
pub type PathCallback = Box<dyn FnOnce(Path) + Send + Sync + 'static>;

/// Lifecycle of a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum RequestState {
    /// Waiting in the queue for a free worker.
    Pending,
    /// A worker is searching.
    Running,
    /// The search found a path. The callback fires on the next tick.
    Completed,
    /// The search found no path or the worker panicked. The callback fires on the next tick.
    Failed,
}

/// Identifies a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(u64);

/// Searches a cache from one block to another.
type SearchFn = fn(&ChunkNodeCache, Block, Block, &SearchSettings) -> Path;

/// One asynchronous search, from submission until its callback fires.
pub(crate) struct PathfindRequest {
    handle: RequestHandle,
    start: Block,
    target: Block,
    state: RequestState,
    on_complete: PathCallback,
}

enum Outcome {
    Completed(Path),
    Failed,
}

/// Written once by the worker that owns the request, read by the scheduler.
#[derive(Default)]
struct Mailbox {
    outcome: OnceLock<Outcome>,
}

impl Mailbox {
    fn state(&self) -> RequestState {
        match self.outcome.get() {
            None => RequestState::Running,
            Some(Outcome::Completed(_)) => RequestState::Completed,
            Some(Outcome::Failed) => RequestState::Failed,
        }
    }
}

struct ActiveRequest {
    request: PathfindRequest,
    mailbox: Arc<Mailbox>,
}

/// Everything a worker needs to run one search.
struct SearchJob {
    handle: RequestHandle,
    cache: Arc<ChunkNodeCache>,
    start: Block,
    target: Block,
    settings: SearchSettings,
    search: SearchFn,
    mailbox: Arc<Mailbox>,
}

impl SearchJob {
    fn run(self) {
        let SearchJob {
            handle,
            cache,
            start,
            target,
            settings,
            search,
            mailbox,
        } = self;

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            search(&cache, start, target, &settings)
        }));

        let outcome = match result {
            Ok(path) if path.is_empty() => Outcome::Failed,
            Ok(path) => Outcome::Completed(path),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    "Pathfind request {:?} from {} to {} panicked: {}",
                    handle, start.pos, target.pos, message
                );
                Outcome::Failed
            }
        };

        // Each job owns a fresh mailbox, so this is the only write it will see.
        let _ = mailbox.outcome.set(outcome);
    }
}

/// Bounded pool of pathfinding workers.
///
/// Requests are dispatched in submission order, at most `max_workers` at a time. Results are
/// delivered only from [`PathfindScheduler::run_scheduler_tick`], on the thread that calls it,
/// in whatever order the workers finish.
///
/// # Example
/// ```
/// use std::sync::{Arc, Mutex};
/// use bevy::math::UVec3;
/// use voxel_pathfind::prelude::*;
///
/// let settings = PathfindSettingsBuilder::new(8, 2, 1).allow_vertical(false).build();
/// let map = BlockMap::new(settings.chunk.dimensions(), true);
/// let cache = Arc::new(ChunkNodeCache::build(settings.chunk, &map));
/// let mut scheduler = PathfindScheduler::new(cache, &settings).unwrap();
///
/// let found = Arc::new(Mutex::new(None));
/// let sink = found.clone();
/// scheduler.submit(
///     Block::walkable(UVec3::new(0, 0, 0)),
///     Block::walkable(UVec3::new(15, 0, 15)),
///     move |path| *sink.lock().unwrap() = Some(path),
/// );
///
/// while !scheduler.is_idle() {
///     scheduler.run_scheduler_tick();
///     std::thread::yield_now();
/// }
///
/// assert_eq!(found.lock().unwrap().as_ref().unwrap().len(), 16);
/// ```
#[derive(Resource)]
pub struct PathfindScheduler {
    cache: Arc<ChunkNodeCache>,
    search: SearchSettings,
    search_fn: SearchFn,
    max_workers: usize,

    pending: VecDeque<PathfindRequest>,
    active: Slab<ActiveRequest>,
    next_handle: u64,

    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl PathfindScheduler {
    /// Creates a scheduler searching `cache`, with a worker pool of `settings.scheduler.max_workers` threads.
    pub fn new(cache: Arc<ChunkNodeCache>, settings: &PathfindSettings) -> Result<Self, PathfindError> {
        let max_workers = settings.scheduler.max_workers;
        if max_workers < 1 {
            return Err(PathfindError::InvalidSettings(
                "max workers must be at least 1",
            ));
        }

        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .thread_name(|i| format!("pathfind-worker-{i}"))
            .build()
            .map_err(|err| PathfindError::WorkerPool(err.to_string()))?;

        Ok(PathfindScheduler {
            cache,
            search: settings.search,
            search_fn: find_path,
            max_workers,
            pending: VecDeque::new(),
            active: Slab::with_capacity(max_workers),
            next_handle: 0,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    /// Queues a search from `start` to `target`. Never blocks.
    ///
    /// Panics if either block lies outside the world, since that is a bug in the caller.
    /// An unwalkable target is accepted and its callback receives an empty path. Use [`PathfindScheduler::try_submit`] to handle it instead.
    pub fn submit<F>(&mut self, start: Block, target: Block, on_complete: F) -> RequestHandle
    where
        F: FnOnce(Path) + Send + Sync + 'static,
    {
        match self.try_submit(start, target, on_complete) {
            Ok(handle) => handle,
            Err(err) => panic!("Invalid pathfind request: {err}"),
        }
    }

    /// Queues a search from `start` to `target`, or returns an error if either block lies
    /// outside the world.
    pub fn try_submit<F>(
        &mut self,
        start: Block,
        target: Block,
        on_complete: F,
    ) -> Result<RequestHandle, PathfindError>
    where
        F: FnOnce(Path) + Send + Sync + 'static,
    {
        let start = self.resolve(start.pos)?;
        let target = self.resolve(target.pos)?;

        let handle = RequestHandle(self.next_handle);
        self.next_handle += 1;

        self.pending.push_back(PathfindRequest {
            handle,
            start,
            target,
            state: RequestState::Pending,
            on_complete: Box::new(on_complete),
        });

        Ok(handle)
    }

    fn resolve(&self, pos: UVec3) -> Result<Block, PathfindError> {
        if !self.cache.contains(pos.as_ivec3()) {
            return Err(PathfindError::UnresolvedBlock { pos });
        }

        Ok(Block::new(pos, self.cache.is_walkable(pos)))
    }

    /// Delivers finished requests, then starts pending ones while workers are free.
    /// Call once per frame from the thread that should receive the callbacks.
    ///
    /// Returns the number of callbacks invoked.
    pub fn run_scheduler_tick(&mut self) -> usize {
        let delivered = self.deliver_finished();
        self.dispatch_pending();
        delivered
    }

    fn deliver_finished(&mut self) -> usize {
        let finished: SmallVec<[usize; 8]> = self
            .active
            .iter()
            .filter(|(_, active)| active.mailbox.outcome.get().is_some())
            .map(|(key, _)| key)
            .collect();

        for &key in finished.iter() {
            let ActiveRequest {
                mut request,
                mailbox,
            } = self.active.remove(key);

            request.state = mailbox.state();
            let path = match mailbox.outcome.get() {
                Some(Outcome::Completed(path)) => path.clone(),
                _ => Path::empty(),
            };

            debug!(
                "Pathfind request {:?} {} with {} steps",
                request.handle,
                request.state,
                path.len()
            );

            (request.on_complete)(path);
        }

        finished.len()
    }

    fn dispatch_pending(&mut self) {
        while self.active.len() < self.max_workers {
            let Some(mut request) = self.pending.pop_front() else {
                break;
            };

            request.state = RequestState::Running;
            let mailbox = Arc::new(Mailbox::default());

            let job = SearchJob {
                handle: request.handle,
                cache: Arc::clone(&self.cache),
                start: request.start,
                target: request.target,
                settings: self.search,
                search: self.search_fn,
                mailbox: Arc::clone(&mailbox),
            };

            debug!(
                "Dispatching pathfind request {:?} from {} to {}",
                request.handle, request.start.pos, request.target.pos
            );

            self.active.insert(ActiveRequest { request, mailbox });
            self.launch(job);
        }
    }

    #[cfg(feature = "parallel")]
    fn launch(&self, job: SearchJob) {
        self.pool.spawn(move || job.run());
    }

    // Without worker threads the search runs inline and is delivered on the next tick.
    #[cfg(not(feature = "parallel"))]
    fn launch(&self, job: SearchJob) {
        job.run();
    }

    /// Swaps the cache searched by requests dispatched from now on.
    /// Searches already running finish against the cache they started with.
    pub fn replace_cache(&mut self, cache: Arc<ChunkNodeCache>) {
        self.cache = cache;
    }

    pub fn cache(&self) -> &Arc<ChunkNodeCache> {
        &self.cache
    }

    /// Returns the state of a request, or `None` once its callback has fired.
    pub fn state(&self, handle: RequestHandle) -> Option<RequestState> {
        if let Some((_, active)) = self
            .active
            .iter()
            .find(|(_, active)| active.request.handle == handle)
        {
            return Some(active.mailbox.state());
        }

        self.pending
            .iter()
            .find(|request| request.handle == handle)
            .map(|request| request.state)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of requests occupying a worker, including finished ones not yet delivered.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// True when there is nothing queued, running or waiting for delivery.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{block::BlockMap, settings::PathfindSettingsBuilder};
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        thread::{self, ThreadId},
        time::Duration,
    };

    fn setup(max_workers: usize) -> (BlockMap, PathfindScheduler) {
        let settings = PathfindSettingsBuilder::new(8, 4, 1)
            .allow_vertical(false)
            .max_workers(max_workers)
            .build();
        let map = BlockMap::new(settings.chunk.dimensions(), true);
        let cache = Arc::new(ChunkNodeCache::build(settings.chunk, &map));
        let scheduler = PathfindScheduler::new(cache, &settings).unwrap();
        (map, scheduler)
    }

    fn block(x: u32, z: u32) -> Block {
        Block::walkable(UVec3::new(x, 0, z))
    }

    /// Ticks until the scheduler is idle, checking the worker bound on every tick.
    fn drain(scheduler: &mut PathfindScheduler) -> usize {
        let mut delivered = 0;
        for _ in 0..20_000 {
            if scheduler.is_idle() {
                return delivered;
            }

            delivered += scheduler.run_scheduler_tick();
            assert!(scheduler.active_len() <= scheduler.max_workers());
            thread::sleep(Duration::from_micros(200));
        }

        panic!("scheduler did not drain");
    }

    #[test]
    fn test_submit_only_queues() {
        let (_, mut scheduler) = setup(2);

        let handle = scheduler.submit(block(0, 0), block(5, 5), |_| {});

        assert_eq!(scheduler.pending_len(), 1);
        assert_eq!(scheduler.active_len(), 0);
        assert_eq!(scheduler.state(handle), Some(RequestState::Pending));
    }

    #[test]
    fn test_single_request_delivers_path() {
        let (_, mut scheduler) = setup(2);
        let result = Arc::new(Mutex::new(None));

        let sink = result.clone();
        let handle = scheduler.submit(block(0, 0), block(9, 9), move |path| {
            *sink.lock().unwrap() = Some(path);
        });

        assert_eq!(drain(&mut scheduler), 1);
        assert_eq!(scheduler.state(handle), None);

        let path = result.lock().unwrap().take().unwrap();
        assert_eq!(path.cost(), 126);
        assert_eq!(path.len(), 10);
        assert_eq!(path.first(), Some(block(0, 0)));
        assert_eq!(path.last(), Some(block(9, 9)));
    }

    #[test]
    fn test_bounded_concurrency() {
        let (_, mut scheduler) = setup(3);
        let delivered = Arc::new(AtomicUsize::new(0));

        for i in 0..24 {
            let delivered = delivered.clone();
            scheduler.submit(block(0, i), block(31, 31 - i), move |path| {
                assert!(!path.is_empty());
                delivered.fetch_add(1, Ordering::SeqCst);
            });
        }

        scheduler.run_scheduler_tick();
        assert_eq!(scheduler.active_len(), 3);
        assert_eq!(scheduler.pending_len(), 21);

        assert_eq!(drain(&mut scheduler), 24);
        assert_eq!(delivered.load(Ordering::SeqCst), 24);
    }

    #[test]
    fn test_callbacks_fire_once_on_ticking_thread() {
        let (_, mut scheduler) = setup(4);
        let ticking_thread = thread::current().id();
        let calls: Arc<Mutex<Vec<(u32, ThreadId)>>> = Arc::default();

        for i in 0..12 {
            let calls = calls.clone();
            scheduler.submit(block(i, 0), block(20, 20), move |_| {
                calls.lock().unwrap().push((i, thread::current().id()));
            });
        }

        drain(&mut scheduler);
        // Ticking an idle scheduler delivers nothing more.
        assert_eq!(scheduler.run_scheduler_tick(), 0);

        let mut calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 12);
        assert!(calls.iter().all(|(_, id)| *id == ticking_thread));

        calls.sort_by_key(|(i, _)| *i);
        let ids: Vec<u32> = calls.iter().map(|(i, _)| *i).collect();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_failed_search_delivers_empty_path() {
        let settings = PathfindSettingsBuilder::new(4, 2, 1)
            .allow_vertical(false)
            .max_workers(1)
            .build();
        let mut map = BlockMap::new(settings.chunk.dimensions(), true);
        // Seal off the corner cell (7, 7).
        map.set_walkable(UVec3::new(6, 0, 7), false);
        map.set_walkable(UVec3::new(7, 0, 6), false);
        map.set_walkable(UVec3::new(6, 0, 6), false);
        let cache = Arc::new(ChunkNodeCache::build(settings.chunk, &map));
        let mut scheduler = PathfindScheduler::new(cache, &settings).unwrap();

        let result = Arc::new(Mutex::new(None));
        let sink = result.clone();
        let handle = scheduler.submit(block(0, 0), block(7, 7), move |path| {
            *sink.lock().unwrap() = Some(path);
        });

        scheduler.run_scheduler_tick();
        // Finished requests wait for the next tick, so the state is stable once reached.
        for _ in 0..20_000 {
            if scheduler.state(handle) == Some(RequestState::Failed) {
                break;
            }
            thread::sleep(Duration::from_micros(200));
        }
        assert_eq!(scheduler.state(handle), Some(RequestState::Failed));
        assert!(result.lock().unwrap().is_none());

        assert_eq!(scheduler.run_scheduler_tick(), 1);
        assert!(scheduler.is_idle());
        assert!(result.lock().unwrap().as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_try_submit_rejects_blocks_outside_world() {
        let (_, mut scheduler) = setup(1);

        assert_eq!(
            scheduler.try_submit(block(40, 0), block(0, 0), |_| {}),
            Err(PathfindError::UnresolvedBlock {
                pos: UVec3::new(40, 0, 0)
            })
        );
        assert_eq!(
            scheduler.try_submit(block(0, 0), Block::walkable(UVec3::new(0, 1, 0)), |_| {}),
            Err(PathfindError::UnresolvedBlock {
                pos: UVec3::new(0, 1, 0)
            })
        );
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_unwalkable_target_delivers_empty_path() {
        let settings = PathfindSettingsBuilder::new(4, 2, 1).max_workers(1).build();
        let mut map = BlockMap::new(settings.chunk.dimensions(), true);
        map.set_walkable(UVec3::new(3, 0, 3), false);
        let cache = Arc::new(ChunkNodeCache::build(settings.chunk, &map));
        let mut scheduler = PathfindScheduler::new(cache, &settings).unwrap();

        let calls: Arc<Mutex<Vec<Path>>> = Arc::default();
        let sink = calls.clone();
        let handle = scheduler
            .try_submit(
                block(0, 0),
                Block::new(UVec3::new(3, 0, 3), false),
                move |path| sink.lock().unwrap().push(path),
            )
            .unwrap();

        assert_eq!(scheduler.state(handle), Some(RequestState::Pending));
        assert_eq!(drain(&mut scheduler), 1);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_empty());
    }

    #[test]
    fn test_panicking_search_is_reported_as_failed() {
        let (_, mut scheduler) = setup(1);
        scheduler.search_fn = |_, _, _, _| panic!("search blew up");

        let calls: Arc<Mutex<Vec<Path>>> = Arc::default();
        let sink = calls.clone();
        let handle = scheduler.submit(block(0, 0), block(5, 5), move |path| {
            sink.lock().unwrap().push(path);
        });

        scheduler.run_scheduler_tick();
        for _ in 0..20_000 {
            if scheduler.state(handle) == Some(RequestState::Failed) {
                break;
            }
            thread::sleep(Duration::from_micros(200));
        }
        assert_eq!(scheduler.state(handle), Some(RequestState::Failed));

        assert_eq!(drain(&mut scheduler), 1);
        assert_eq!(scheduler.run_scheduler_tick(), 0);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_empty());
    }

    #[test]
    #[should_panic(expected = "Invalid pathfind request")]
    fn test_submit_panics_on_unresolved_block() {
        let (_, mut scheduler) = setup(1);
        scheduler.submit(block(0, 0), Block::walkable(UVec3::new(0, 5, 0)), |_| {});
    }

    #[test]
    fn test_replace_cache() {
        let (mut map, mut scheduler) = setup(1);
        let settings = scheduler.cache().settings();

        // Wall off the whole column at x = 4 in a new cache.
        for z in 0..settings.world_width() {
            map.set_walkable(UVec3::new(4, 0, z), false);
        }
        scheduler.replace_cache(Arc::new(ChunkNodeCache::build(settings, &map)));

        let result = Arc::new(Mutex::new(None));
        let sink = result.clone();
        scheduler.submit(block(0, 0), block(8, 0), move |path| {
            *sink.lock().unwrap() = Some(path);
        });
        drain(&mut scheduler);

        assert!(result.lock().unwrap().as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_request_state_display() {
        assert_eq!(RequestState::Pending.to_string(), "Pending");
        assert_eq!(RequestState::Completed.to_string(), "Completed");
    }
}
