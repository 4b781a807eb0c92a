#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_effect::{Context, Defect, Effect, Exit, Runtime, Tag};
use std::sync::Arc;

const NAMES: [&str; 4] = ["A", "B", "C", "D"];

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Build nested provides from pairs of (name index, value)
    let probe = Tag::<u8>::new(NAMES[(data[0] as usize) % NAMES.len()]);
    let mut effect = Effect::<u8>::service_with(probe, |v| *v);
    let mut innermost: Option<u8> = None;

    for pair in data[1..].chunks(2) {
        let name = NAMES[(pair[0] as usize) % NAMES.len()];
        let value = pair.get(1).copied().unwrap_or(0);
        let tag = Tag::<u8>::new(name);
        effect = effect.provide(Context::make(tag, Arc::new(value)));
        if name == probe.name() && innermost.is_none() {
            innermost = Some(value);
        }
    }

    match (Runtime::new().run(&effect), innermost) {
        (Exit::Success(v), Some(expected)) => assert_eq!(v, expected),
        (Exit::Failure(cause), None) => {
            let defects = cause.defects();
            assert!(matches!(defects.as_slice(), [Defect::ServiceNotFound { .. }]));
        }
        (exit, expected) => panic!("unexpected {:?} for {:?}", exit, expected),
    }
});
