use ferrous_effect::host::{self, LogConsole, MemoryFileSystem};
use ferrous_effect::testing::TestRun;
use ferrous_effect::{
    execute_expecting_log, CancellationToken, Cause, Defect, Effect, Exit, ExitStatus, Fiber,
    MetricsObserver, Runtime, Scope,
};
use std::sync::{Arc, Mutex};

// ===== Mock file resource =====

#[derive(Debug, Clone, PartialEq)]
struct MockFile {
    fd: u32,
}

impl MockFile {
    fn open(fd: u32) -> Effect<MockFile, String> {
        Effect::log(format!("open {}", fd)).map(move |_| MockFile { fd })
    }

    fn close(&self) -> Effect<(), ferrous_effect::Never> {
        Effect::log(format!("close {}", self.fd))
    }
}

fn file(fd: u32) -> Effect<MockFile, String> {
    Effect::acquire_release(MockFile::open(fd), |file| file.close())
}

// ===== Shared boundary =====

#[test]
fn test_files_in_one_boundary_release_in_reverse() {
    let program = Effect::<(), String>::gen(|fx| {
        fx.run(&file(1))?;
        fx.run(&file(2))?;
        Ok(())
    })
    .scoped();

    TestRun::run(&program)
        .assert_success(&())
        .assert_logs(&["open 1", "open 2", "close 2", "close 1"]);
}

#[test]
fn test_per_resource_boundary_assignment() {
    // file1 belongs to the nested boundary, file2 to the outer one
    let program = Effect::<Scope, String>::scope()
        .flat_map(|outer| {
            Effect::<(), String>::gen(move |fx| {
                let _file1 = fx.run(&file(1))?;
                let _file2 = fx.run(&file(2).in_scope(&outer))?;
                Ok(())
            })
            .scoped()
            .and_then(Effect::log("hi!"))
        })
        .scoped();

    TestRun::run(&program).assert_logs(&["open 1", "open 2", "close 1", "hi!", "close 2"]);
}

#[test]
fn test_nested_boundary_closes_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let push = |name: &'static str| {
        let order = order.clone();
        Effect::<(), String>::add_finalizer(move |_| {
            let order = order.clone();
            Effect::sync(move || order.lock().unwrap().push(name))
        })
    };
    let between = {
        let order = order.clone();
        Effect::<(), String>::sync(move || order.lock().unwrap().push("between"))
    };

    let program = push("A")
        .and_then(push("B").scoped())
        .and_then(between)
        .scoped();

    assert!(Runtime::new().run(&program).is_success());
    assert_eq!(*order.lock().unwrap(), vec!["B", "between", "A"]);
}

#[test]
fn test_shared_scope_lifo() {
    let program = Effect::<(), String>::add_finalizer(|_| Effect::log("A"))
        .and_then(Effect::add_finalizer(|_| Effect::log("B")))
        .scoped();

    let (exit, logs) = execute_expecting_log(&program);
    assert!(exit.is_success());
    assert_eq!(logs, vec!["B", "A"]);
}

// ===== Manual scopes =====

#[test]
fn test_manual_scope_runs_finalizers_on_close() {
    let program = Effect::<Scope, String>::make_scope().flat_map(|scope| {
        let first = scope.clone();
        let second = scope.clone();
        Effect::<(), String>::gen(move |fx| {
            fx.add_finalizer(&first, |_| Effect::log("Finalizer 1"))?;
            fx.add_finalizer(&second, |_| Effect::log("Finalizer 2"))?;
            Ok(())
        })
        .and_then(Effect::close_scope(&scope, ExitStatus::Success))
    });

    TestRun::run(&program).assert_logs(&["Finalizer 2", "Finalizer 1"]);
}

#[test]
fn test_add_finalizer_after_close_fails_and_never_runs() {
    let scope = Scope::make();
    scope.close(ExitStatus::Success).unwrap();

    let ran = Arc::new(Mutex::new(false));
    let flag = ran.clone();
    let result = scope.add_finalizer(move |_| {
        *flag.lock().unwrap() = true;
        Effect::unit()
    });

    assert_eq!(result, Err(Defect::ScopeClosed(scope.id())));
    assert_eq!(scope.close(ExitStatus::Success), Ok(()));
    assert!(!*ran.lock().unwrap());
}

#[test]
fn test_acquire_into_closed_scope_releases_immediately() {
    let scope = Scope::make();
    scope.close(ExitStatus::Success).unwrap();

    let program = file(7).in_scope(&scope);
    let (exit, logs) = execute_expecting_log(&program);

    assert_eq!(exit.into_result().unwrap_err(), Cause::Die(Defect::ScopeClosed(scope.id())));
    assert_eq!(logs, vec!["open 7", "close 7"]);
}

#[test]
fn test_finalizers_receive_the_close_status() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let scope = Scope::make();
    for _ in 0..2 {
        let seen = seen.clone();
        scope
            .add_finalizer(move |status| {
                seen.lock().unwrap().push(status);
                Effect::unit()
            })
            .unwrap();
    }

    scope.close(ExitStatus::Interrupted).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![ExitStatus::Interrupted; 2]);
    assert_eq!(scope.closed_with(), Some(ExitStatus::Interrupted));
}

#[test]
fn test_failing_finalizers_are_all_reported() {
    let scope = Scope::make();
    let ran = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
        let ran = ran.clone();
        scope
            .add_finalizer(move |_| {
                ran.lock().unwrap().push(i);
                if i == 1 {
                    Effect::unit()
                } else {
                    Effect::die(Defect::message(format!("release {}", i)))
                }
            })
            .unwrap();
    }

    let err = scope.close(ExitStatus::Success).unwrap_err();

    assert_eq!(*ran.lock().unwrap(), vec![2, 1, 0]);
    assert_eq!(
        err,
        Defect::Finalizers(vec![Defect::message("release 2"), Defect::message("release 0")])
    );
}

#[test]
fn test_scope_closed_by_fiber_uses_its_services() {
    let scope = Scope::make();
    scope.add_finalizer(|_| host::print_line("bye")).unwrap();

    let runtime = Runtime::builder().services(&host::console(LogConsole)).build();
    let fiber = runtime.fiber(CancellationToken::new());
    fiber.close_scope(&scope, ExitStatus::Success).unwrap();

    assert_eq!(fiber.logs(), vec!["bye"]);

    // A detached fiber has no console
    let orphan = Scope::make();
    orphan.add_finalizer(|_| host::print_line("lost")).unwrap();
    let err = Fiber::detached().close_scope(&orphan, ExitStatus::Success).unwrap_err();
    assert!(matches!(err, Defect::ServiceNotFound { name: "Console", .. }));
}

// ===== Release-only finalizers =====

#[test]
fn test_add_finalizer_runs_after_body() {
    let program = Effect::<(), String>::add_finalizer(|_| host::print_line("Last!"))
        .and_then(host::print_line("First"))
        .scoped()
        .provide(host::console(LogConsole));

    TestRun::run(&program).assert_logs(&["First", "Last!"]);
}

#[test]
fn test_boundary_placement_changes_order() {
    let program = Effect::<(), String>::add_finalizer(|_| host::print_line("Last!"))
        .scoped()
        .and_then(host::print_line("First"))
        .provide(host::console(LogConsole));

    TestRun::run(&program).assert_logs(&["Last!", "First"]);
}

#[test]
fn test_add_finalizer_without_scope_is_a_defect() {
    let program = Effect::<(), String>::add_finalizer(|_| Effect::unit());
    assert_eq!(Runtime::new().run(&program), Exit::die(Defect::NoScope));
}

// ===== acquire_use_release =====

#[test]
fn test_acquire_use_release_with_failing_use() {
    let releases = Arc::new(Mutex::new(0));
    let counter = releases.clone();

    let program = Effect::<u32, String>::acquire_use_release(
        MockFile::open(3),
        |file| Effect::log(format!("using {}", file.fd)).and_then(Effect::fail("use failed".to_string())),
        move |file| {
            *counter.lock().unwrap() += 1;
            file.close()
        },
    )
    .and_then_discard(Effect::log("not reached"));

    TestRun::run(&program)
        .assert_failure(&"use failed".to_string())
        .assert_logs(&["open 3", "using 3", "close 3"]);
    assert_eq!(*releases.lock().unwrap(), 1);
}

#[test]
fn test_acquire_use_release_releases_before_continuing() {
    let program = Effect::<u32, String>::acquire_use_release(
        MockFile::open(4),
        |file| Effect::succeed(file.fd * 10),
        |file| file.close(),
    )
    .flat_map(|n| Effect::log(format!("got {}", n)).map(move |_| n));

    TestRun::run(&program)
        .assert_success(&40)
        .assert_logs(&["open 4", "close 4", "got 40"]);
}

// ===== Exit reasons =====

#[test]
fn test_defect_in_body_still_releases() {
    let program = file(1)
        .and_then(Effect::sync(|| -> () { panic!("body exploded") }))
        .scoped();

    let run = TestRun::run(&program);
    run.assert_status(ExitStatus::Defect).assert_logs(&["open 1", "close 1"]);
}

#[test]
fn test_interruption_runs_finalizers() {
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let seen = statuses.clone();

    let program = Effect::<(), String>::acquire_release_exit(MockFile::open(1).map(|_| ()), move |_, status| {
        seen.lock().unwrap().push(status);
        Effect::log("close 1")
    })
    .and_then(Effect::<(), String>::interrupt())
    .and_then(Effect::log("unreachable"))
    .scoped();

    let run = TestRun::run(&program);
    run.assert_status(ExitStatus::Interrupted).assert_logs(&["open 1", "close 1"]);
    assert_eq!(*statuses.lock().unwrap(), vec![ExitStatus::Interrupted]);
}

#[test]
fn test_cancelled_token_interrupts_at_next_boundary() {
    let token = CancellationToken::new();
    let cancel = token.clone();

    let program = file(1)
        .and_then(Effect::sync(move || cancel.cancel()))
        .and_then(Effect::log("after cancel"))
        .scoped();

    let runtime = Runtime::new();
    let fiber = runtime.fiber(token);
    let exit = fiber.exit(&program);

    assert_eq!(exit.status(), ExitStatus::Interrupted);
    // The finalizer still ran, on an uninterruptible fiber
    assert_eq!(fiber.logs(), vec!["open 1", "close 1"]);
}

#[test]
fn test_finalizer_failure_sequenced_after_body_failure() {
    let program = Effect::<(), String>::add_finalizer(|_| Effect::die(Defect::message("cleanup")))
        .and_then(Effect::<(), String>::fail("body".to_string()))
        .scoped();

    let cause = Runtime::new().run(&program).into_result().unwrap_err();

    assert_eq!(cause.failures(), vec![&"body".to_string()]);
    assert_eq!(cause.defects(), vec![&Defect::message("cleanup")]);
}

// ===== Escaping resources =====

#[test]
fn test_file_handle_used_after_scope_closed() {
    let fs = MemoryFileSystem::new().with_file("1-what-is-a-program.js", "console.log(1)");
    let context = host::file_system(fs).merge(&host::console(LogConsole));

    let inside = host::open_file("1-what-is-a-program.js")
        .flat_map(|handle| handle.read_to_string())
        .scoped();
    TestRun::run_with(&inside, &context).assert_success(&"console.log(1)".to_string());

    let escaped = host::open_file("1-what-is-a-program.js")
        .scoped()
        .flat_map(|handle| host::print_line("Using file").and_then(handle.read_to_string()));
    let run = TestRun::run_with(&escaped, &context);

    run.assert_logs(&["Using file"]);
    assert!(matches!(
        run.exit(),
        Exit::Failure(Cause::Die(Defect::UseAfterClose(_)))
    ));
}

#[test]
fn test_release_trait_resources() {
    let fs = MemoryFileSystem::new().with_file("data", "payload");
    let handle = Arc::new(Mutex::new(None));
    let slot = handle.clone();

    let program = Effect::<Arc<host::FileHandle>, host::FsError>::acquire(
        Effect::service_with_effect(host::FILE_SYSTEM, |fs| fs.open("data")).map(Arc::new),
    )
    .map(move |h| {
        *slot.lock().unwrap() = Some(h.clone());
        h.is_closed()
    })
    .scoped()
    .provide(host::file_system(fs));

    assert_eq!(Runtime::new().run(&program).success(), Some(false));
    let handle = handle.lock().unwrap().take().unwrap();
    assert!(handle.is_closed());
}

#[test]
fn test_scope_metrics() {
    let metrics = Arc::new(MetricsObserver::new());
    let runtime = Runtime::builder().observer(metrics.clone()).build();

    let program = file(1).and_then(file(2).scoped()).scoped();
    let (exit, _) = runtime.run_with_logs(&program);

    assert!(exit.is_success());
    assert_eq!(metrics.scopes_opened(), 2);
    assert_eq!(metrics.scopes_closed(), 2);
    assert_eq!(metrics.finalizers_added(), 2);
    assert_eq!(metrics.finalizers_run(), 2);
    assert_eq!(metrics.finalizer_failures(), 0);
}
