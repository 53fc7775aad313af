//! Scaling and concurrency tests with many silences and caller threads.
//!
//! Covers:
//! - Concurrent adds from many threads
//! - Inhibition lookups racing with updates and deletes
//! - Lookup cost over a large silence set

use chrono::{Duration, Utc};
use silencer::{Event, Silence, SilenceId, SilenceStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const SILENCE_COUNT: usize = 10_000;

/// Timing helper
struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn report_with_count(&self, count: usize) {
        let ms = self.elapsed_ms();
        let per_item = if count > 0 { ms / count as f64 } else { 0.0 };
        println!(
            "  {} took {:.2}ms ({} items, {:.4}ms/item)",
            self.name, ms, count, per_item
        );
    }
}

fn silence(created_by: &str) -> Silence {
    Silence::new(created_by, Utc::now() + Duration::hours(1))
}

#[test]
fn test_concurrent_adds_get_unique_ids() {
    let store = SilenceStore::new().unwrap();
    let threads = 8;
    let per_thread = 250;

    let timer = Timer::new("concurrent adds");
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                (0..per_thread)
                    .map(|i| store.add(silence(&format!("t{t}-{i}"))).unwrap())
                    .collect::<Vec<SilenceId>>()
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        // Each thread sees its own IDs increasing
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        all.extend(ids);
    }
    timer.report_with_count(threads * per_thread);

    assert_eq!(all.len(), threads * per_thread);
    assert_eq!(store.len(), threads * per_thread);
    assert_eq!(all.iter().max(), Some(&SilenceId((threads * per_thread) as u64)));
}

#[test]
fn test_lookups_race_with_mutation() {
    let store = SilenceStore::new().unwrap();
    let anchor = store.add(silence("anchor").with_filter("job", "db")).unwrap();

    let writer = {
        let store = store.clone();
        thread::spawn(move || {
            for i in 0..500 {
                let id = store.add(silence("churn").with_filter("job", format!("job-{i}"))).unwrap();
                if i % 2 == 0 {
                    store.delete(id).unwrap();
                } else {
                    let mut changed = store.get(id).unwrap();
                    changed.comment = format!("rev {i}");
                    store.update(changed).unwrap();
                }
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                let event = Event::new().with_label("job", "db");
                for _ in 0..500 {
                    let hit = store.is_inhibited(&event).unwrap();
                    assert_eq!(hit.id, anchor);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(store.len(), 1 + 250);
}

#[test]
fn test_lookup_over_large_set() {
    let store = Arc::new(SilenceStore::new().unwrap());

    let timer = Timer::new("populate");
    for i in 0..SILENCE_COUNT {
        store.add(
            silence("bulk")
                .with_filter("job", format!("job-{i}"))
                .with_filter("env", "prod"),
        ).unwrap();
    }
    timer.report_with_count(SILENCE_COUNT);

    let timer = Timer::new("miss lookups");
    let miss = Event::new().with_label("job", "nope").with_label("env", "prod");
    for _ in 0..100 {
        assert!(store.is_inhibited(&miss).is_none());
    }
    timer.report_with_count(100);

    let hit = Event::new().with_label("job", "job-4242").with_label("env", "prod");
    let found = store.is_inhibited(&hit).unwrap();
    assert!(found.filters.handles(&hit));
}
