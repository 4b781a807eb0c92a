//! Internal finalizer stack with LIFO execution order.

use smallvec::SmallVec;

use crate::effect::Effect;
use crate::exit::ExitStatus;
use crate::runtime::Fiber;
use crate::Never;

/// Cleanup action registered on a scope.
///
/// `env` is the fiber the finalizer was registered from, minus its scope and
/// with interruption disabled. Finalizers added outside any fiber run on the
/// fiber that closes the scope.
pub(crate) struct Finalizer {
    pub(crate) run: Box<dyn FnOnce(ExitStatus) -> Effect<(), Never> + Send>,
    pub(crate) env: Option<Fiber>,
}

/// Ordered finalizers of one scope.
///
/// Most scopes hold a handful of resources, so the first four live inline.
#[derive(Default)]
pub(crate) struct FinalizerStack {
    entries: SmallVec<[Finalizer; 4]>,
}

impl FinalizerStack {
    pub(crate) fn push(&mut self, finalizer: Finalizer) {
        self.entries.push(finalizer);
    }

    /// Removes every finalizer, most recently registered first.
    pub(crate) fn drain_lifo(&mut self) -> impl Iterator<Item = Finalizer> {
        std::mem::take(&mut self.entries).into_iter().rev()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
