// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides the thread-safe solution pool shared by all the
//! heuristics. The pool keeps two bounded ordered views over the candidate
//! solutions it was offered: a *high-quality* view ordered by objective and a
//! *high-diversity* view ordered by Hamming distance to the current best.
//! Consumers may also subscribe to the pool; every successful insertion then
//! lands in their bounded event queue, and `shutdown` wakes every waiter with
//! a terminal signal.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::common::*;

/// How many undelivered events a subscription may hold. Producers outpacing a
/// consumer push the oldest event out: consumers only ever act on a fresh
/// entry, so dropping stale ones is harmless.
const MAX_PENDING_EVENTS: usize = 64;

/// One stored solution: its objective value, its Hamming distance to the pool
/// best at the time of the last rebase, and the shared assignment vector.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    obj: u64,
    delta: usize,
    solution: Arc<Assignment>,
}
impl PoolEntry {
    pub fn obj(&self) -> u64 {
        self.obj
    }
    pub fn delta(&self) -> usize {
        self.delta
    }
    pub fn solution(&self) -> &Arc<Assignment> {
        &self.solution
    }
}

/// The tuning knobs of the pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Bound on the high-quality view.
    pub max_high_quality: usize,
    /// Bound on the high-diversity view.
    pub max_high_diversity: usize,
    /// A non-best entry must differ from the best by at least this many
    /// process placements to enter the high-quality view.
    pub hq_min_best_delta: usize,
    /// An entry must have an objective below this multiple of the best one
    /// to enter the high-diversity view.
    pub hd_max_best_obj_ratio: f64,
    /// The seed of the generator behind the random observers.
    pub seed: u64,
}
impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_high_quality: 100,
            max_high_diversity: 20,
            hq_min_best_delta: 2,
            hd_max_best_obj_ratio: 1.1,
            seed: 0,
        }
    }
}

#[derive(Default)]
struct PoolSets {
    /// Ordered by objective, ascending. The first entry is the pool best.
    hq: Vec<PoolEntry>,
    /// Ordered by delta, descending.
    hd: Vec<PoolEntry>,
}

struct SubscriptionState {
    queue: VecDeque<PoolEntry>,
    shutdown: bool,
}

/// A subscriber handle on the pool. Insertions are delivered in a bounded
/// FIFO; `wait` blocks until an event or the pool shutdown arrives.
pub struct Subscription {
    state: Mutex<SubscriptionState>,
    on_event: Condvar,
}
impl Subscription {
    fn new() -> Self {
        Subscription {
            state: Mutex::new(SubscriptionState { queue: VecDeque::new(), shutdown: false }),
            on_event: Condvar::new(),
        }
    }
    fn enqueue(&self, entry: PoolEntry) {
        let mut state = self.state.lock();
        if state.queue.len() == MAX_PENDING_EVENTS {
            state.queue.pop_front();
        }
        state.queue.push_back(entry);
        self.on_event.notify_one();
    }
    fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.on_event.notify_all();
    }
    /// Blocks until an event is available or the pool shuts down. Returns
    /// `None` on shutdown; consumers must treat it as "stop".
    pub fn wait(&self) -> Option<PoolEntry> {
        let mut state = self.state.lock();
        while state.queue.is_empty() && !state.shutdown {
            self.on_event.wait(&mut state);
        }
        if state.shutdown {
            None
        } else {
            state.queue.pop_front()
        }
    }
    /// Dequeues an event if one is ready; never blocks. Returns `None` both
    /// on an empty queue and after shutdown.
    pub fn try_wait(&self) -> Option<PoolEntry> {
        let mut state = self.state.lock();
        if state.shutdown {
            None
        } else {
            state.queue.pop_front()
        }
    }
}

/// The shared pool. All the views are protected by one reader-writer lock;
/// the subscriber list has its own short-lived lock, and the generator of the
/// random observers its own mutex.
pub struct SolutionPool {
    config: PoolConfig,
    sets: RwLock<PoolSets>,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    rng: Mutex<SmallRng>,
}

impl SolutionPool {
    pub fn new(config: PoolConfig) -> Self {
        let rng = Mutex::new(SmallRng::seed_from_u64(config.seed));
        SolutionPool {
            config,
            sets: RwLock::new(PoolSets::default()),
            subscriptions: RwLock::new(vec![]),
            rng,
        }
    }

    /// Proposes a solution for insertion. The returned pair tells whether the
    /// entry was retained by the high-quality and the high-diversity view
    /// respectively; subscribers are notified whenever either retained it.
    pub fn push(&self, obj: u64, solution: &[MachineId]) -> (bool, bool) {
        let (entry, retained) = {
            let mut sets = self.sets.write();
            let solution = Arc::new(solution.to_vec());
            let delta = match sets.hq.first() {
                Some(best) => assignment_delta(best.solution(), &solution),
                None => 0,
            };
            let entry = PoolEntry { obj, delta, solution };
            let retained = self.insert(&mut sets, entry.clone());
            (entry, retained)
        };
        if retained.0 || retained.1 {
            let subscriptions = self.subscriptions.read();
            for sub in subscriptions.iter() {
                sub.enqueue(entry.clone());
            }
        }
        retained
    }

    fn insert(&self, sets: &mut PoolSets, entry: PoolEntry) -> (bool, bool) {
        if !sets.hq.is_empty() && entry.obj < sets.hq[0].obj {
            // a new overall best: every stored delta is relative to the old
            // best, so recompute and reinsert everything
            let mut reinsert = vec![];
            for old in sets.hq.drain(..).chain(sets.hd.drain(..)) {
                reinsert.push(PoolEntry {
                    obj: old.obj,
                    delta: assignment_delta(entry.solution(), old.solution()),
                    solution: old.solution,
                });
            }
            sets.hq.push(entry);
            for old in reinsert {
                self.push_high_quality(sets, old.clone());
                self.push_high_diversity(sets, old);
            }
            (true, false)
        } else {
            let hq = self.push_high_quality(sets, entry.clone());
            let hd = self.push_high_diversity(sets, entry);
            (hq, hd)
        }
    }

    fn push_high_quality(&self, sets: &mut PoolSets, entry: PoolEntry) -> bool {
        if self.config.max_high_quality == 0 {
            return false;
        }
        if sets.hq.is_empty() {
            sets.hq.push(entry);
            return true;
        }
        // a near-duplicate of the best brings nothing to this view
        if entry.delta < self.config.hq_min_best_delta {
            return false;
        }
        if sets.hq.len() >= self.config.max_high_quality {
            if entry.obj >= sets.hq.last().map(|e| e.obj).unwrap_or(u64::MAX) {
                return false;
            }
            sets.hq.pop();
        }
        let at = sets.hq.partition_point(|e| e.obj <= entry.obj);
        sets.hq.insert(at, entry);
        true
    }

    fn push_high_diversity(&self, sets: &mut PoolSets, entry: PoolEntry) -> bool {
        if self.config.max_high_diversity == 0 {
            return false;
        }
        let admissible = match sets.hq.first() {
            Some(best) => {
                (entry.obj as f64) < self.config.hd_max_best_obj_ratio * best.obj as f64
            }
            None => false,
        };
        if !admissible {
            return false;
        }
        if sets.hd.len() >= self.config.max_high_diversity {
            if entry.delta < sets.hd.last().map(|e| e.delta).unwrap_or(usize::MAX) {
                return false;
            }
            sets.hd.pop();
        }
        let at = sets.hd.partition_point(|e| e.delta >= entry.delta);
        sets.hd.insert(at, entry);
        true
    }

    /// The best entry of the high-quality view, if any.
    pub fn best(&self) -> Option<PoolEntry> {
        self.sets.read().hq.first().cloned()
    }

    /// The worst entry of the high-quality view, if any.
    pub fn worst(&self) -> Option<PoolEntry> {
        self.sets.read().hq.last().cloned()
    }

    /// A uniformly drawn entry of the high-quality view, if any.
    pub fn random_high_quality(&self) -> Option<PoolEntry> {
        let sets = self.sets.read();
        if sets.hq.is_empty() {
            return None;
        }
        let at = self.rng.lock().gen_range(0..sets.hq.len());
        Some(sets.hq[at].clone())
    }

    /// A uniformly drawn entry of the high-diversity view, if any.
    pub fn random_high_diversity(&self) -> Option<PoolEntry> {
        let sets = self.sets.read();
        if sets.hd.is_empty() {
            return None;
        }
        let at = self.rng.lock().gen_range(0..sets.hd.len());
        Some(sets.hd[at].clone())
    }

    /// Registers a new subscriber; it will receive every event enqueued from
    /// this point on.
    pub fn subscribe(&self) -> Arc<Subscription> {
        let sub = Arc::new(Subscription::new());
        self.subscriptions.write().push(Arc::clone(&sub));
        sub
    }

    /// Removes a subscriber; its pending events are dropped with it.
    pub fn unsubscribe(&self, sub: &Arc<Subscription>) {
        self.subscriptions.write().retain(|s| !Arc::ptr_eq(s, sub));
    }

    /// Wakes every waiting subscriber with the terminal signal. Subsequent
    /// `wait` calls return immediately.
    pub fn shutdown(&self) {
        let subscriptions = self.subscriptions.read();
        for sub in subscriptions.iter() {
            sub.shutdown();
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_pool {
    use super::*;

    fn pool() -> SolutionPool {
        SolutionPool::new(PoolConfig::default())
    }

    fn small_pool(max_hq: usize, max_hd: usize) -> SolutionPool {
        SolutionPool::new(PoolConfig {
            max_high_quality: max_hq,
            max_high_diversity: max_hd,
            ..PoolConfig::default()
        })
    }

    #[test]
    fn the_first_entry_becomes_the_best() {
        let pool = pool();
        assert!(pool.best().is_none());
        pool.push(100, &[0, 0, 0]);
        let best = pool.best().unwrap();
        assert_eq!(100, best.obj());
        assert_eq!(&vec![0, 0, 0], best.solution().as_ref());
    }

    #[test]
    fn a_better_entry_replaces_the_best() {
        let pool = pool();
        pool.push(100, &[0, 0, 0]);
        pool.push(90, &[1, 1, 0]);
        assert_eq!(90, pool.best().unwrap().obj());
        assert_eq!(100, pool.worst().unwrap().obj());
    }

    #[test]
    fn near_duplicates_of_the_best_are_not_retained() {
        let pool = pool();
        pool.push(100, &[0, 0, 0]);
        // only one placement differs: below the min-delta threshold
        let retained = pool.push(150, &[0, 0, 1]);
        assert_eq!((false, false), retained);
        // two differing placements pass it
        let retained = pool.push(105, &[0, 1, 1]);
        assert!(retained.0);
    }

    #[test]
    fn the_high_quality_view_is_bounded_and_evicts_its_worst() {
        let pool = small_pool(2, 0);
        pool.push(100, &[0, 0, 0, 0]);
        pool.push(150, &[1, 1, 0, 0]);
        // full: a worse entry is rejected
        assert_eq!((false, false), pool.push(200, &[1, 1, 1, 1]));
        // a better one evicts the worst
        assert!(pool.push(120, &[0, 0, 1, 1]).0);
        assert_eq!(120, pool.worst().unwrap().obj());
    }

    #[test]
    fn the_high_diversity_view_rejects_entries_too_far_from_the_best() {
        let pool = pool();
        pool.push(100, &[0, 0, 0, 0]);
        // 150 >= 1.1 * 100: not diverse-admissible (and delta passes hq)
        let retained = pool.push(150, &[1, 1, 1, 1]);
        assert!(retained.0);
        assert!(!retained.1);
        // 105 < 110 qualifies for both views
        let retained = pool.push(105, &[1, 1, 0, 0]);
        assert!(retained.0);
        assert!(retained.1);
        assert!(pool.random_high_diversity().is_some());
    }

    #[test]
    fn a_new_best_rebases_the_deltas() {
        let pool = pool();
        pool.push(100, &[0, 0, 0, 0]);
        pool.push(105, &[1, 1, 0, 0]);
        // the new best differs from the 105 entry in every position
        pool.push(90, &[2, 2, 1, 1]);
        let best = pool.best().unwrap();
        assert_eq!(90, best.obj());
        let worst = pool.worst().unwrap();
        assert_eq!(105, worst.obj());
        assert_eq!(4, worst.delta());
    }

    #[test]
    fn subscribers_receive_retained_entries() {
        let pool = pool();
        let sub = pool.subscribe();
        pool.push(100, &[0, 0, 0]);
        let event = sub.try_wait().unwrap();
        assert_eq!(100, event.obj());
        assert!(sub.try_wait().is_none());
    }

    #[test]
    fn rejected_entries_notify_nobody() {
        let pool = pool();
        pool.push(100, &[0, 0, 0]);
        let sub = pool.subscribe();
        pool.push(500, &[0, 0, 1]); // near-duplicate and objective-inadmissible
        assert!(sub.try_wait().is_none());
    }

    #[test]
    fn shutdown_unblocks_a_waiting_subscriber() {
        let pool = Arc::new(pool());
        let sub = pool.subscribe();
        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let sub = pool.subscribe();
                sub.wait().is_none()
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        pool.shutdown();
        assert!(waiter.join().unwrap());
        assert!(sub.wait().is_none());
    }

    #[test]
    fn unsubscribed_consumers_stop_receiving() {
        let pool = pool();
        let sub = pool.subscribe();
        pool.unsubscribe(&sub);
        pool.push(100, &[0, 0, 0]);
        assert!(sub.try_wait().is_none());
    }

    #[test]
    fn overflowing_queues_drop_their_oldest_event() {
        let pool = pool();
        let sub = pool.subscribe();
        let mut solution = vec![0; MAX_PENDING_EVENTS + 10];
        let mut obj = 1_000_000;
        for i in 0..MAX_PENDING_EVENTS + 5 {
            // each push improves the best so that every one is retained
            solution[i] = i + 1;
            obj -= 1;
            pool.push(obj, &solution);
        }
        let first = sub.try_wait().unwrap();
        // the five oldest events were pushed out
        assert_eq!(1_000_000 - 6, first.obj());
    }
}
