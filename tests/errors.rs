use ferrous_effect::{
    all_partitioned, all_validate, eventually, Cause, Defect, Effect, Exit, Runtime,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ===== Helpers =====

/// Fails with "attempt N" for the first `failures` executions, then succeeds.
fn flaky(failures: u32, runs: Arc<AtomicU32>) -> Effect<&'static str, String> {
    Effect::suspend(move || {
        let run = runs.fetch_add(1, Ordering::SeqCst);
        if run < failures {
            Effect::fail(format!("attempt {}", run))
        } else {
            Effect::succeed("ok")
        }
    })
}

fn odd_fails(i: u32) -> Effect<u32, String> {
    if i % 2 == 1 {
        Effect::fail(format!("odd {}", i))
    } else {
        Effect::succeed(i)
    }
}

// ===== eventually =====

#[test]
fn test_eventually_runs_until_success() {
    let runs = Arc::new(AtomicU32::new(0));
    let program = eventually(flaky(5, runs.clone()));

    let exit = Runtime::new().run(&program);

    assert_eq!(exit.success(), Some("ok"));
    assert_eq!(runs.load(Ordering::SeqCst), 6);
}

#[test]
fn test_eventually_is_replayable() {
    let runs = Arc::new(AtomicU32::new(0));
    let program = flaky(2, runs.clone()).eventually();
    let runtime = Runtime::new();

    assert!(runtime.run(&program).is_success());
    assert_eq!(runs.load(Ordering::SeqCst), 3);

    // Counter is past the failure threshold, so the second run succeeds at once
    assert!(runtime.run(&program).is_success());
    assert_eq!(runs.load(Ordering::SeqCst), 4);
}

#[test]
fn test_eventually_without_failures_runs_once() {
    let runs = Arc::new(AtomicU32::new(0));
    let exit = Runtime::new().run(&flaky(0, runs.clone()).eventually());
    assert!(exit.is_success());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_eventually_propagates_defect_without_retry() {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = runs.clone();
    let program = Effect::<u32, String>::suspend(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Effect::fail("soft".to_string())
        } else {
            Effect::sync(|| panic!("hard"))
        }
    })
    .eventually();

    let exit = Runtime::new().run(&program);

    assert_eq!(exit, Exit::die(Defect::Panic("hard".to_string())));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_retry_n_bounds_eventually() {
    let runs = Arc::new(AtomicU32::new(0));
    let exit = Runtime::new().run(&flaky(10, runs.clone()).retry_n(3));

    assert_eq!(exit.failure(), Some("attempt 3".to_string()));
    assert_eq!(runs.load(Ordering::SeqCst), 4);

    let runs = Arc::new(AtomicU32::new(0));
    let exit = Runtime::new().run(&flaky(3, runs.clone()).retry_n(3));
    assert_eq!(exit.success(), Some("ok"));
}

// ===== all_validate =====

#[test]
fn test_validate_collects_every_odd_failure() {
    let program = all_validate((0..10).map(odd_fails));

    let exit = Runtime::new().run(&program);

    assert_eq!(
        exit.failure(),
        Some(vec![
            "odd 1".to_string(),
            "odd 3".to_string(),
            "odd 5".to_string(),
            "odd 7".to_string(),
            "odd 9".to_string(),
        ])
    );
}

#[test]
fn test_validate_all_success_keeps_order() {
    let program = all_validate((0..10).map(|i| Effect::<u32, String>::succeed(i * 10)));

    let exit = Runtime::new().run(&program);

    assert_eq!(exit.success(), Some((0..10).map(|i| i * 10).collect::<Vec<_>>()));
}

#[test]
fn test_validate_runs_every_entry() {
    let runs = Arc::new(AtomicU32::new(0));
    let entries: Vec<_> = (0..6)
        .map(|i| {
            let runs = runs.clone();
            Effect::<u32, u32>::suspend(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                if i < 3 { Effect::fail(i) } else { Effect::succeed(i) }
            })
        })
        .collect();

    let exit = Runtime::new().run(&all_validate(entries));

    assert_eq!(exit.failure(), Some(vec![0, 1, 2]));
    assert_eq!(runs.load(Ordering::SeqCst), 6);
}

#[test]
fn test_validate_aborts_on_defect() {
    let runs = Arc::new(AtomicU32::new(0));
    let entries: Vec<_> = (0..5)
        .map(|i| {
            let runs = runs.clone();
            Effect::<u32, String>::suspend(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                match i {
                    0 => Effect::fail("soft".to_string()),
                    2 => Effect::die(Defect::message("hard")),
                    _ => Effect::succeed(i),
                }
            })
        })
        .collect();

    let exit = Runtime::new().run(&all_validate(entries));

    assert_eq!(exit, Exit::Failure(Cause::Die(Defect::message("hard"))));
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

// ===== all_partitioned =====

#[test]
fn test_partition_splits_odd_and_even() {
    let program = all_partitioned((0..10).map(odd_fails));

    let (successes, failures) = Runtime::new().run(&program).success().unwrap();

    assert_eq!(successes, vec![0, 2, 4, 6, 8]);
    assert_eq!(failures, vec!["odd 1", "odd 3", "odd 5", "odd 7", "odd 9"]);
}

#[test]
fn test_partition_never_fails_on_expected_errors() {
    let program = all_partitioned((0..3).map(|i| Effect::<(), u32>::fail(i)));

    let exit = Runtime::new().run(&program);

    assert_eq!(exit.success(), Some((vec![], vec![0, 1, 2])));
}

// ===== Mixed channels =====

#[test]
fn test_catch_all_recovers_only_expected_failures() {
    let runtime = Runtime::new();

    let recovered = Effect::<u32, String>::fail("bad".to_string())
        .catch_all(|e| Effect::<u32, ()>::succeed(e.len() as u32));
    assert_eq!(runtime.run(&recovered).success(), Some(3));

    let defect = Effect::<u32, String>::die(Defect::message("fatal"))
        .catch_all(|_| Effect::<u32, ()>::succeed(0));
    assert_eq!(runtime.run(&defect), Exit::die(Defect::message("fatal")));
}

#[test]
fn test_either_moves_failure_into_success() {
    let program = odd_fails(3).either::<()>();
    assert_eq!(Runtime::new().run(&program).success(), Some(Err("odd 3".to_string())));
}
