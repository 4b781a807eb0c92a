//! Resource management walkthrough.
//!
//! Run with `cargo run --example resource_management`.

use ferrous_effect::host::{self, MemoryFileSystem, StdoutConsole};
use ferrous_effect::{Effect, ExitStatus, Runtime, Scope};

fn main() {
    let runtime = Runtime::builder()
        .services(&host::console(StdoutConsole))
        .with_tracing()
        .build();

    // Manual scope: finalizers run in reverse when the scope closes
    println!("--- manual scope ---");
    let one = Effect::<Scope, String>::make_scope().flat_map(|scope| {
        let handle = scope.clone();
        Effect::<(), String>::gen(move |fx| {
            fx.add_finalizer(&handle, |_| host::print_line("Finalizer 1"))?;
            fx.add_finalizer(&handle, |_| host::print_line("Finalizer 2"))?;
            Ok(())
        })
        .and_then(Effect::close_scope(&scope, ExitStatus::Success))
    });
    report("one", runtime.run(&one).status());

    // Release-only finalizer; the boundary decides when it runs
    println!("--- add_finalizer ---");
    let two = Effect::<(), String>::add_finalizer(|_| host::print_line("Last!"))
        .and_then(host::print_line("First"));
    report("two (no boundary)", runtime.run(&two).status());
    report("three", runtime.run(&two.clone().scoped()).status());

    let four = Effect::<(), String>::add_finalizer(|_| host::print_line("Last!"))
        .scoped()
        .and_then(host::print_line("First"));
    report("four", runtime.run(&four).status());

    // Acquire and release a file handle
    println!("--- files ---");
    let fs = MemoryFileSystem::new().with_file("1-what-is-a-program.js", "console.log(\"hello\")");
    let files = host::file_system(fs);
    let path = "1-what-is-a-program.js";

    let program = host::open_file(path)
        .flat_map(|file| host::print_line(format!("Using File: {}", file.fd())))
        .scoped();
    report("program", runtime.run_with(&program, &files).status());

    let program2 = Effect::<(), host::FsError>::acquire_use_release(
        Effect::service_with_effect(host::FILE_SYSTEM, move |fs| fs.open(path)),
        |file| host::print_line(format!("Using File: {}", file.fd())),
        |file| file.close(),
    );
    report("program2", runtime.run_with(&program2, &files).status());

    let program3 = host::open_file(path)
        .flat_map(|handle| {
            host::print_line("Using file")
                .and_then(handle.read_to_string())
                .flat_map(|text| host::print_line(text))
        })
        .scoped();
    report("program3", runtime.run_with(&program3, &files).status());

    // The handle escapes its scope: reading it is a defect
    let program4 = host::open_file(path).scoped().flat_map(|handle| {
        host::print_line("Using file")
            .and_then(handle.read_to_string())
            .flat_map(|text| host::print_line(text))
    });
    match runtime.run_with(&program4, &files).into_result() {
        Ok(()) => println!("program4 unexpectedly succeeded"),
        Err(cause) => println!("program4 failed: {}", cause),
    }
}

fn report(name: &str, status: ExitStatus) {
    println!("[{}] {}", name, status);
}
