#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_effect::{Defect, Effect, ExitStatus, Scope};
use std::sync::{Arc, Mutex};

// Each byte is one operation on a tree of scopes:
//   low two bits pick the action, the rest pick the scope
fuzz_target!(|data: &[u8]| {
    let scopes: Vec<Scope> = (0..4).map(|_| Scope::make()).collect();
    let registered: Vec<Mutex<Vec<usize>>> = (0..4).map(|_| Mutex::new(Vec::new())).collect();
    let ran = Arc::new(Mutex::new(Vec::new()));

    for (op, byte) in data.iter().enumerate() {
        let target = (*byte as usize >> 2) % scopes.len();
        let scope = &scopes[target];
        match byte & 0b11 {
            0 | 1 => {
                let ran = ran.clone();
                let fails = byte & 0b1 == 1;
                let result = scope.add_finalizer(move |_| {
                    ran.lock().unwrap().push(op);
                    if fails {
                        Effect::die(Defect::message(op.to_string()))
                    } else {
                        Effect::unit()
                    }
                });
                match result {
                    Ok(()) => registered[target].lock().unwrap().push(op),
                    Err(defect) => {
                        assert!(scope.is_closed());
                        assert_eq!(defect, Defect::ScopeClosed(scope.id()));
                    }
                }
            }
            2 => {
                let before = ran.lock().unwrap().len();
                let was_closed = scope.is_closed();
                let _ = scope.close(ExitStatus::Success);
                let after = ran.lock().unwrap().clone();

                if was_closed {
                    assert_eq!(after.len(), before);
                } else {
                    // Exactly this scope's finalizers ran, most recent first
                    let mut expected = std::mem::take(&mut *registered[target].lock().unwrap());
                    expected.reverse();
                    assert_eq!(&after[before..], &expected[..]);
                }
            }
            _ => {
                let _ = scope.finalizer_count();
            }
        }
    }

    for scope in &scopes {
        let _ = scope.close(ExitStatus::Interrupted);
    }
});
