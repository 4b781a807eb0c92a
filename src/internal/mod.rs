//! Internal implementation details.

pub(crate) mod finalizer_stack;

pub(crate) use finalizer_stack::{Finalizer, FinalizerStack};
