use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};

/// Runs `job` over every item with at most `width` jobs in flight.
///
/// The jobs run on a dedicated rayon pool of `width` threads, so the global
/// pool is left alone. Results come back in input order. A zero width is
/// treated as one.
pub fn run_bounded<T, R, F>(items: Vec<T>, width: usize, job: F) -> Result<Vec<R>, ThreadPoolBuildError>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(width.max(1))
        .thread_name(|index| format!("stage-{index}"))
        .build()?;
    Ok(pool.install(|| items.into_par_iter().map(job).collect()))
}
