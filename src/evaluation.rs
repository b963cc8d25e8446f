use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::dependencies::{Dependency, DependencyList};
use crate::value::Access;
use crate::Listener;

/// The tracking context handed to a derived computation. Reading a watchable
/// through it appends an ordered dependency record carrying fresh channel
/// subscriptions; the order of reads is the order of the resulting list.
pub struct Evaluation {
	epoch: u64,
	epoch_now: Rc<Cell<u64>>,
	on_dirty: Listener,
	on_change: Listener,
	inner: RefCell<EvaluationInner>,
}

struct EvaluationInner {
	dependencies: DependencyList,
	seen: BTreeSet<*const ()>,
}

impl Evaluation {
	pub(crate) fn new(epoch_now: Rc<Cell<u64>>, on_dirty: Listener, on_change: Listener) -> Self {
		Evaluation {
			epoch: epoch_now.get(),
			epoch_now,
			on_dirty,
			on_change,
			inner: RefCell::new(EvaluationInner {
				dependencies: SmallVec::new(),
				seen: BTreeSet::new(),
			}),
		}
	}

	pub(crate) fn track<T>(&self, source: &Rc<dyn Access<T>>, observed: T)
	where
		T: Clone + PartialEq + 'static,
	{
		// A stale context records nothing: a newer computation of the same
		// derived value has already begun.
		if self.epoch != self.epoch_now.get() {
			return;
		}
		let key = Rc::as_ptr(source) as *const ();
		let mut inner = self.inner.borrow_mut();
		if !inner.seen.insert(key) {
			return;
		}
		let dependency = Dependency::new(source.clone(), observed, &self.on_dirty, &self.on_change);
		inner.dependencies.push(dependency);
	}

	pub(crate) fn take(self) -> DependencyList {
		self.inner.into_inner().dependencies
	}
}
