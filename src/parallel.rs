//! Per-call parallel slice processing.
//!
//! [`process_slices`] fans a slice of work items out across scoped OS
//! threads, collects per-thread partial results, and merges them into one
//! output vector under a single lock before returning. Threads are spawned
//! fresh per call and always joined before the call returns: there is no
//! persistent pool, no cancellation, and no cooperative scheduling.
//!
//! Used by the spatial index for range queries and by the transfer pipeline
//! for per-vertex resolver batches.

use parking_lot::Mutex;

/// Configuration for parallel slice processing.
#[derive(Debug, Clone, Default)]
pub struct ParConfig {
    /// Number of worker threads. `None` uses
    /// [`std::thread::available_parallelism`].
    pub num_threads: Option<usize>,
}

impl ParConfig {
    fn effective_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Process `items` in parallel, merging per-thread results into one vector.
///
/// The items are split into contiguous slices across at most
/// `min(threads, items.len())` threads; the last slice absorbs the division
/// remainder. Each worker invokes `f(item, &mut local)` for every item in
/// its slice, in slice order, then merges its local results into the shared
/// output under one lock. The merged order across slices is unspecified.
pub fn process_slices<T, R, F>(items: &[T], config: &ParConfig, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T, &mut Vec<R>) + Sync,
{
    let count = items.len();
    if count == 0 {
        return Vec::new();
    }

    let threads = config.effective_threads().min(count);
    if threads == 1 {
        let mut results = Vec::new();
        for item in items {
            f(item, &mut results);
        }
        return results;
    }

    let results = Mutex::new(Vec::new());
    let stride = count / threads;

    std::thread::scope(|scope| {
        for i in 0..threads {
            let start = stride * i;
            let stop = if i == threads - 1 { count } else { stride * (i + 1) };
            let slice = &items[start..stop];
            let f = &f;
            let results = &results;
            scope.spawn(move || {
                let mut local = Vec::new();
                for item in slice {
                    f(item, &mut local);
                }
                if !local.is_empty() {
                    results.lock().append(&mut local);
                }
            });
        }
    });

    results.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processes_every_item() {
        let items: Vec<u32> = (0..1000).collect();
        let mut doubled = process_slices(&items, &ParConfig::default(), |item, out| {
            out.push(item * 2);
        });
        doubled.sort_unstable();
        let expected: Vec<u32> = (0..1000).map(|i| i * 2).collect();
        assert_eq!(doubled, expected);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let items: Vec<u32> = Vec::new();
        let out: Vec<u32> = process_slices(&items, &ParConfig::default(), |item, out| {
            out.push(*item);
        });
        assert!(out.is_empty());
    }

    #[test]
    fn workers_may_emit_nothing() {
        let items: Vec<u32> = (0..100).collect();
        let odds = process_slices(&items, &ParConfig::default(), |item, out| {
            if item % 2 == 1 {
                out.push(*item);
            }
        });
        assert_eq!(odds.len(), 50);
    }

    #[test]
    fn thread_count_override() {
        let items: Vec<u32> = (0..10).collect();
        let config = ParConfig {
            num_threads: Some(3),
        };
        let out = process_slices(&items, &config, |item, out| out.push(*item));
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn more_threads_than_items() {
        let items = [1u32, 2];
        let config = ParConfig {
            num_threads: Some(16),
        };
        let mut out = process_slices(&items, &config, |item, out| out.push(*item));
        out.sort_unstable();
        assert_eq!(out, vec![1, 2]);
    }
}
