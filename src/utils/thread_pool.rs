use once_cell::sync::OnceCell;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// Upper bound on default hashing workers; more rarely helps a disk-bound scan.
pub const MAX_DEFAULT_THREADS: usize = 8;

static HASH_POOL: OnceCell<Arc<ThreadPool>> = OnceCell::new();

fn build(num_threads: usize) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(|i| format!("treewatch-hash-{i}"))
        .build()
}

/// Number of hashing workers used when the configuration does not say.
#[must_use]
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(MAX_DEFAULT_THREADS)
}

/// Size the shared hashing pool.
///
/// Only the first call has an effect; the pool is process-wide and a later
/// call with a different size is reported, not applied.
///
/// # Errors
///
/// Returns an error if the pool cannot be built.
pub fn init_hash_pool(num_threads: usize) -> anyhow::Result<()> {
    if HASH_POOL.get().is_some() {
        tracing::debug!("hash pool already initialized, ignoring size {num_threads}");
        return Ok(());
    }
    let pool = build(num_threads)?;
    if HASH_POOL.set(Arc::new(pool)).is_err() {
        tracing::debug!("hash pool initialized concurrently, ignoring size {num_threads}");
    }
    Ok(())
}

/// Run `f` inside the hashing pool so its rayon iterators use those workers.
///
/// Falls back to rayon's global pool if the dedicated pool cannot be built.
pub fn run_in_pool<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    let pool = HASH_POOL.get_or_try_init(|| build(default_threads()).map(Arc::new));
    match pool {
        Ok(pool) => pool.install(f),
        Err(e) => {
            tracing::warn!("falling back to the global rayon pool: {e}");
            f()
        }
    }
}
