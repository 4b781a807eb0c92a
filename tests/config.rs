use ferrous_effect::{Defect, Effect, Exit, ExitStatus, Runtime, RuntimeConfig};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_runtime_from_default_env_prefix() {
    env::set_var("FERROUS_EFFECT_LABEL", "from-env");
    env::set_var("FERROUS_EFFECT_ECHO_LOGS", "on");

    let config = RuntimeConfig::from_env().unwrap();
    let runtime = Runtime::with_config(config);

    assert_eq!(runtime.config().label, "from-env");
    assert!(runtime.config().echo_logs);

    // Echoing does not change what the log sink records
    let (_, logs) = runtime.run_with_logs(&Effect::<(), ()>::log("echoed"));
    assert_eq!(logs, vec!["echoed"]);

    env::remove_var("FERROUS_EFFECT_LABEL");
    env::remove_var("FERROUS_EFFECT_ECHO_LOGS");
}

#[test]
#[serial]
fn test_disabled_interrupt_checks_ignore_cancellation() {
    env::set_var("FERROUS_EFFECT_CHECK_INTERRUPTS", "false");
    let runtime = Runtime::with_config(RuntimeConfig::from_env().unwrap());
    env::remove_var("FERROUS_EFFECT_CHECK_INTERRUPTS");

    let token = ferrous_effect::CancellationToken::new();
    token.cancel();

    let exit = runtime.run_interruptible(&Effect::<u8, ()>::succeed(1), &token);
    assert_eq!(exit, Exit::succeed(1));
}

#[test]
fn test_caught_panics_are_defects() {
    let runtime = Runtime::with_config(RuntimeConfig::default());
    let exit = runtime.run(&Effect::<u8, ()>::sync(|| panic!("caught")));
    assert_eq!(exit, Exit::die(Defect::Panic("caught".to_string())));
}

#[test]
#[should_panic(expected = "uncaught")]
fn test_panics_propagate_when_catching_is_off() {
    let runtime = Runtime::with_config(RuntimeConfig::default().with_catch_panics(false));
    let _ = runtime.run(&Effect::<u8, ()>::sync(|| panic!("uncaught")));
}

#[test]
fn test_uncaught_panic_still_closes_scope() {
    let runtime = Runtime::with_config(RuntimeConfig::default().with_catch_panics(false));
    let released = Arc::new(Mutex::new(None));
    let slot = released.clone();

    let program = Effect::<(), String>::add_finalizer(move |status| {
        *slot.lock().unwrap() = Some(status);
        Effect::unit()
    })
    .and_then(Effect::<(), String>::sync(|| panic!("body exploded")))
    .scoped();

    let outcome = catch_unwind(AssertUnwindSafe(|| runtime.run(&program)));

    assert!(outcome.is_err());
    assert_eq!(*released.lock().unwrap(), Some(ExitStatus::Defect));
}

#[test]
fn test_uncaught_panic_in_finalizer_runs_earlier_finalizers() {
    let runtime = Runtime::with_config(RuntimeConfig::default().with_catch_panics(false));
    let first_ran = Arc::new(AtomicBool::new(false));
    let flag = first_ran.clone();

    let program = Effect::<(), String>::add_finalizer(move |_| {
        flag.store(true, Ordering::SeqCst);
        Effect::unit()
    })
    .and_then(Effect::add_finalizer(|_| Effect::sync(|| panic!("release exploded"))))
    .scoped();

    let exit = runtime.run(&program);

    assert_eq!(exit, Exit::die(Defect::Panic("release exploded".to_string())));
    assert!(first_ran.load(Ordering::SeqCst));
}

#[cfg(feature = "config")]
#[test]
fn test_runtime_from_json_document() {
    let document = serde_json::json!({
        "label": "from-json",
        "check_interrupts": false,
    })
    .to_string();

    let runtime = Runtime::with_config(RuntimeConfig::from_json(&document).unwrap());
    assert_eq!(runtime.config().label, "from-json");
    assert!(!runtime.config().check_interrupts);
    assert!(runtime.config().catch_panics);

    let written = serde_json::to_value(runtime.config()).unwrap();
    assert_eq!(written["label"], "from-json");
    assert_eq!(written["echo_logs"], false);
}
