use std::cell::Cell;
use std::rc::Rc;

use crate::evaluation::Evaluation;
use crate::listeners::{assert_not_dispatching_dirty, Listeners, Subscription};
use crate::value::{Access, Value};
use crate::{Listener, Subscribe};

/// A counter-valued watchable with explicit protocol marks, for hand-built
/// notification schemes.
pub struct Signal {
	body: Rc<SignalBody>,
}

struct SignalBody {
	count: Cell<u64>,
	listeners: Listeners,
}

impl Clone for Signal {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl Default for Signal {
	fn default() -> Self {
		Signal::new()
	}
}

impl Signal {
	pub fn new() -> Self {
		Signal {
			body: Rc::new(SignalBody {
				count: Cell::new(0),
				listeners: Listeners::new(false),
			}),
		}
	}

	pub fn get(&self, eval: &Evaluation) -> u64 {
		let value = self.body.get_once();
		let source: Rc<dyn Access<u64>> = self.body.clone();
		eval.track(&source, value);
		value
	}

	#[inline]
	pub fn get_once(&self) -> u64 {
		self.body.get_once()
	}

	/// Advance the counter and broadcast dirty, unless a dirty broadcast is
	/// already outstanding.
	pub fn mark_dirty(&self) {
		if self.body.listeners.is_dirty() {
			return;
		}
		self.body.count.set(self.body.count.get() + 1);
		self.body.listeners.broadcast_dirty();
	}

	pub fn mark_change(&self) {
		self.body.listeners.broadcast_change();
	}

	/// `mark_dirty` followed by `mark_change`.
	pub fn signal(&self) {
		self.mark_dirty();
		self.mark_change();
	}

	pub fn is_dirty(&self) -> bool {
		self.body.listeners.is_dirty()
	}

	pub(crate) fn has_subscribers(&self) -> bool {
		self.body.listeners.has_subscribers()
	}

	pub fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.body.listeners.subscribe_dirty(listener)
	}

	pub fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.body.listeners.subscribe_change(listener)
	}
}

impl Subscribe for SignalBody {
	fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.listeners.subscribe_dirty(listener)
	}

	fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.listeners.subscribe_change(listener)
	}
}

impl Access<u64> for SignalBody {
	fn get_once(&self) -> u64 {
		assert_not_dispatching_dirty();
		self.listeners.mark_clean();
		self.count.get()
	}
}

impl From<Signal> for Value<u64> {
	fn from(signal: Signal) -> Self {
		Value::new(signal.body)
	}
}
