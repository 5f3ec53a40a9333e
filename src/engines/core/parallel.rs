//! Parallel batch execution
//!
//! Fans independent search requests out over a dedicated rayon pool.
//! Only available with the `parallel` feature.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Get the default number of threads to use
pub fn default_num_threads() -> usize {
    num_cpus::get()
}

/// Build a named pool with `num_threads` workers (at least one)
pub fn build_pool(num_threads: usize) -> Result<ThreadPool, ThreadPoolBuildError> {
    let num_threads = num_threads.max(1);
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|idx| format!("hmmer-batch-{}", idx))
        .build()?;

    log::debug!("Initialized batch pool with {} threads", num_threads);
    Ok(pool)
}

/// Apply `f` to every item on `pool`, keeping input order in the output
pub fn map_ordered<T, R, F>(pool: &ThreadPool, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Send + Sync,
{
    pool.install(|| items.par_iter().map(|item| f(item)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_ordered_keeps_order() {
        let pool = build_pool(4).unwrap();
        let data: Vec<i32> = (1..1001).collect();

        let results = map_ordered(&pool, &data, |x| x * 2);

        assert_eq!(results.len(), data.len());
        for (i, &result) in results.iter().enumerate() {
            assert_eq!(result, data[i] * 2);
        }
    }

    #[test]
    fn test_zero_threads_still_builds() {
        let pool = build_pool(0).unwrap();
        assert_eq!(pool.current_num_threads(), 1);
    }
}
