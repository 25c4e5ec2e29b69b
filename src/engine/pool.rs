//! Bounded worker pool for the classification stages.
//!
//! Workers drain a shared queue of definition indices and send `(index,
//! result)` pairs over a channel; the caller collects them into a slot map
//! after the scoped threads join, so result writes need no locking. Once
//! the optional wall-clock deadline passes, workers stop taking new work —
//! calls already in flight finish (the per-call HTTP timeout bounds them)
//! and their results still count. Indices never dispatched simply have no
//! slot, which downstream treats as score 0.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Run `task` over `targets` on up to `workers` threads, with an optional
/// aggregate time budget.
pub fn run_bounded<T, F>(
    targets: &[usize],
    workers: usize,
    budget: Option<Duration>,
    task: F,
) -> HashMap<usize, T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if targets.is_empty() {
        return HashMap::new();
    }
    let deadline = budget.map(|b| Instant::now() + b);
    let queue: Mutex<VecDeque<usize>> = Mutex::new(targets.iter().copied().collect());
    let (tx, rx) = mpsc::channel::<(usize, T)>();
    let workers = workers.max(1).min(targets.len());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let task = &task;
            scope.spawn(move || loop {
                if matches!(deadline, Some(d) if Instant::now() >= d) {
                    break;
                }
                let Some(index) = queue.lock().expect("worker queue lock").pop_front() else {
                    break;
                };
                // Send only fails when the receiver is gone, which cannot
                // happen before the scope joins.
                let _ = tx.send((index, task(index)));
            });
        }
        drop(tx);
    });

    rx.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn computes_every_target() {
        let targets: Vec<usize> = (0..25).collect();
        let results = run_bounded(&targets, 4, None, |i| i * 10);
        assert_eq!(results.len(), 25);
        assert_eq!(results[&7], 70);
    }

    #[test]
    fn empty_targets_no_work() {
        let results: HashMap<usize, usize> = run_bounded(&[], 4, None, |i| i);
        assert!(results.is_empty());
    }

    #[test]
    fn concurrency_is_bounded() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let targets: Vec<usize> = (0..32).collect();

        run_bounded(&targets, 3, None, |i| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            active.fetch_sub(1, Ordering::SeqCst);
            i
        });

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn expired_budget_stops_new_dispatch() {
        let targets: Vec<usize> = (0..100).collect();
        let results = run_bounded(&targets, 2, Some(Duration::from_millis(20)), |i| {
            std::thread::sleep(Duration::from_millis(10));
            i
        });
        // Some work ran, but the budget cut the tail off.
        assert!(!results.is_empty());
        assert!(results.len() < 100);
    }

    #[test]
    fn in_flight_results_survive_deadline() {
        let results = run_bounded(&[0], 1, Some(Duration::from_millis(50)), |i| {
            // Outlives the deadline but was dispatched before it.
            std::thread::sleep(Duration::from_millis(80));
            i + 1
        });
        assert_eq!(results[&0], 1);
    }

    #[test]
    fn single_worker_processes_in_order() {
        let order = Mutex::new(Vec::new());
        run_bounded(&[3, 1, 2], 1, None, |i| {
            order.lock().unwrap().push(i);
        });
        assert_eq!(*order.lock().unwrap(), vec![3, 1, 2]);
    }
}
