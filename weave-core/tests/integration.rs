//! Integration Tests for the Reactive Engine
//!
//! These tests verify that variables, sets, and the coordination primitives
//! work together correctly across threads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use weave_core::config::Config;
use weave_core::error::WaitError;
use weave_core::log::{LogLevel, Logger};
use weave_core::reactive::{
    Clock, Counter, DerivedSet, DerivedVariable, Event, EvictionState, Listener, Set, SortedSet,
    Variable, WaitGroup,
};

fn sorted(set: &Set<i32>) -> Vec<i32> {
    let mut elements = set.to_vec();
    elements.sort_unstable();
    elements
}

/// Test that writing an equal value never notifies.
#[test]
fn equal_writes_are_silent() {
    let variable = Variable::new(7);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let _unsubscribe = variable.on_update(
        move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        },
        false,
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    variable.set(7);
    variable.compute(|value| *value);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Test that subscribers racing writers see every later transition once.
#[test]
fn racing_subscribers_see_each_transition_once() {
    let variable = Variable::new(0u32);
    let writes = 200u32;
    let barrier = Arc::new(Barrier::new(5));

    let writer = {
        let (variable, barrier) = (variable.clone(), barrier.clone());
        thread::spawn(move || {
            barrier.wait();
            for value in 1..=writes {
                variable.set(value);
            }
        })
    };

    let subscribers: Vec<_> = (0..4)
        .map(|_| {
            let (variable, barrier) = (variable.clone(), barrier.clone());
            thread::spawn(move || {
                let seen = Arc::new(Mutex::new(Vec::new()));
                let seen_clone = seen.clone();
                barrier.wait();
                let unsubscribe = variable.on_update(move |_, new| seen_clone.lock().push(*new), true);
                (seen, unsubscribe)
            })
        })
        .collect();

    writer.join().unwrap();
    for subscriber in subscribers {
        let (seen, unsubscribe) = subscriber.join().unwrap();
        unsubscribe.unsubscribe();

        let seen = seen.lock();
        let first = seen[0];
        let expected: Vec<u32> = (first..=writes).collect();
        assert_eq!(*seen, expected);
    }
}

/// Test that concurrent writers deliver to every subscriber in one order.
#[test]
fn concurrent_writers_deliver_in_one_order() {
    let variable = Variable::new(0usize);
    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));

    let _first = {
        let first = first.clone();
        variable.on_update(
            move |_, new| {
                thread::sleep(Duration::from_micros(50));
                first.lock().push(*new);
            },
            false,
        )
    };
    let _second = {
        let second = second.clone();
        variable.on_update(move |_, new| second.lock().push(*new), false)
    };

    let writers: Vec<_> = (1..=4)
        .map(|writer| {
            let variable = variable.clone();
            thread::spawn(move || {
                for step in 0..20 {
                    variable.set(writer * 100 + step);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(first.lock().len(), 80);
    assert_eq!(*first.lock(), *second.lock());
}

/// Test that derived variables chain and converge.
#[test]
fn derived_chain_propagates() {
    let price = Variable::new(10u64);
    let quantity = Variable::new(3u64);

    let total = DerivedVariable::new2(|_, price: &u64, quantity: &u64| price * quantity, &price, &quantity);
    let expensive = DerivedVariable::new1(|_, total: &u64| *total > 50, &total);
    assert_eq!(total.get(), 30);
    assert!(!expensive.get());

    quantity.set(6);
    assert_eq!(total.get(), 60);
    assert!(expensive.get());

    total.unsubscribe();
    price.set(1);
    assert_eq!(total.get(), 60);
}

/// Test the reactive subtraction scenario end to end.
#[test]
fn subtract_reactive_tracks_both_sources() {
    let s1 = Set::from_elements([3]);
    let s2: Set<i32> = Set::new();

    let result = s1.subtract_reactive(&[s2.clone()]);
    assert_eq!(sorted(&result), vec![3]);

    s1.add([4]);
    assert_eq!(sorted(&result), vec![3, 4]);

    s2.add([4]);
    assert_eq!(sorted(&result), vec![3]);

    s2.add([3]);
    assert!(result.is_empty());

    // 5 is already subtracted when it reaches the source.
    s2.add([5]);
    s1.add([5]);
    assert!(result.is_empty());

    s1.add([6]);
    assert_eq!(sorted(&result), vec![6]);
}

/// Test that a derived union feeds a wait group.
#[test]
fn derived_union_drives_wait_group() {
    let left = Set::from_elements([1, 2]);
    let right = Set::from_elements([2, 3]);
    let union = DerivedSet::new();
    let _inherit = union.inherit_from(&[left.clone(), right.clone()]);

    let group = WaitGroup::new(union.to_vec());
    let _done = {
        let group = group.clone();
        union.on_update(move |mutations| group.done(mutations.deleted().to_vec()), false)
    };

    left.delete([1, 2]);
    assert!(!group.was_triggered());

    right.delete([2, 3]);
    assert!(group.was_triggered());
    assert!(union.is_empty());
}

/// Test the sorted set scenario together with its extremes.
#[test]
fn sorted_set_reorders_on_weight_change() {
    let weights: Arc<HashMap<&'static str, Variable<u32>>> = Arc::new(
        [("A", 1), ("B", 2), ("C", 3)]
            .into_iter()
            .map(|(name, weight)| (name, Variable::new(weight)))
            .collect(),
    );
    let lookup = weights.clone();
    let sorted = SortedSet::new(move |element: &&'static str| lookup.get(element).cloned().unwrap_or_default());

    sorted.add(["A", "B", "C"]);
    assert_eq!(sorted.descending(), vec!["C", "B", "A"]);

    weights["B"].set(5);
    assert_eq!(sorted.descending(), vec!["B", "C", "A"]);

    weights["A"].set(4);
    let descending = sorted.descending();
    assert_eq!(descending, vec!["B", "A", "C"]);
    assert_eq!(sorted.heaviest_element().get(), descending.first().copied());
    assert_eq!(sorted.lightest_element().get(), descending.last().copied());
}

/// Test eviction events across threads.
#[test]
fn eviction_releases_waiters() {
    let state = EvictionState::new();
    state.evict(1u64);
    assert!(state.eviction_event(0).was_triggered());

    let pending = state.eviction_event(3);
    let released = Arc::new(Mutex::new(Vec::new()));
    let waiters: Vec<_> = [2u64, 3, 4]
        .into_iter()
        .map(|slot| {
            let (event, released) = (state.eviction_event(slot), released.clone());
            thread::spawn(move || {
                if event.wait_timeout(Duration::from_secs(5)) {
                    released.lock().push(slot);
                }
            })
        })
        .collect();

    state.evict(2);
    assert!(!pending.was_triggered());
    state.evict(3);
    assert!(pending.was_triggered());
    state.evict(4);

    for waiter in waiters {
        waiter.join().unwrap();
    }
    let mut released = released.lock().clone();
    released.sort_unstable();
    assert_eq!(released, vec![2, 3, 4]);
}

/// Test the wait group scenario.
#[test]
fn wait_group_counts_down() {
    let group = WaitGroup::new([1, 2, 3]);

    group.done([1, 2]);
    assert_eq!(group.pending_elements().to_vec(), vec![3]);
    assert!(!group.was_triggered());

    group.done([1, 2]);
    assert_eq!(group.pending_count(), 1);

    group.add([4]);
    let mut pending = group.pending_elements().to_vec();
    pending.sort_unstable();
    assert_eq!(pending, vec![3, 4]);

    group.done([3, 4]);
    assert!(group.pending_elements().is_empty());
    assert!(group.was_triggered());
}

/// Test that an event triggers exactly once across threads.
#[test]
fn event_triggers_once_across_threads() {
    let event = Event::new();
    let winners = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let (event, winners, barrier) = (event.clone(), winners.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..10 {
                    if event.trigger() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert!(event.was_triggered());
    assert!(!event.trigger());
}

/// Test that a counter over events feeds a listener.
#[test]
fn counter_and_listener_cooperate() {
    let events: Vec<Event> = (0..3).map(|_| Event::new()).collect();
    let counter = Counter::new();
    let _monitors: Vec<_> = events.iter().map(|event| counter.monitor(event)).collect();

    let listener = Listener::matching(&counter, |count: &usize| *count == 3);
    for event in &events {
        event.trigger();
    }

    assert_eq!(listener.wait(Duration::from_secs(1), &Event::new()), Ok(3));
    assert_eq!(counter.get(), 3);

    listener.deregister();
    assert_eq!(listener.wait_for(Duration::from_millis(10)), Err(WaitError::Deregistered));
}

/// Test that configuration reaches the logger and the clock.
#[test]
fn config_drives_logger_and_clock() {
    let config = Config::from_json_str(r#"{"log_level": "debug", "clock": {"granularity_ms": 5}}"#).unwrap();

    let logger = Logger::from_config("node", &config);
    let child = logger.child("clock");
    assert!(child.enabled(LogLevel::Debug));
    assert!(!child.enabled(LogLevel::Trace));

    let clock = Clock::from_config(&config.clock);
    assert_eq!(clock.granularity(), Duration::from_millis(5));

    let height = Variable::new(0u64);
    let logged = height.log_updates(&child, LogLevel::Debug, "height");
    height.set(1);
    logged.unsubscribe();

    let listener = Listener::new(&clock.time());
    let first = listener.wait_for(Duration::from_secs(1)).unwrap();
    let second = listener.wait_for(Duration::from_secs(1)).unwrap();
    assert!(second > first);

    clock.shutdown();
}
