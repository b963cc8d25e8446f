use std::rc::{Rc, Weak};

use log::trace;

use crate::derived::{Compute, Derived};
use crate::evaluation::Evaluation;
use crate::listeners::Subscription;
use crate::value::{Access, Value};
use crate::{Listener, Subscribe};

/// A derived value that keeps no registrations on its dependencies while it
/// has no listeners of its own. Dependency identities and the values
/// observed at the last computation are retained, so a later read
/// revalidates against them instead of recomputing blindly.
pub struct Passive<T> {
	body: Rc<PassiveBody<T>>,
}

impl<T> Clone for Passive<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

struct PassiveBody<T> {
	derived: Derived<T>,
	this: Weak<PassiveBody<T>>,
}

impl<T> Passive<T>
where
	T: Clone + PartialEq + 'static,
{
	pub fn new(compute: Compute<T>) -> Self {
		Passive {
			body: Rc::new_cyclic(|this| PassiveBody {
				derived: Derived::new(compute),
				this: this.clone(),
			}),
		}
	}

	pub fn get(&self, eval: &Evaluation) -> T {
		let value = self.body.get_once();
		let source: Rc<dyn Access<T>> = self.body.clone();
		eval.track(&source, value.clone());
		value
	}

	#[inline]
	pub fn get_once(&self) -> T {
		self.body.get_once()
	}

	pub fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.body.subscribe_dirty(listener)
	}

	pub fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.body.subscribe_change(listener)
	}
}

impl<T> PassiveBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn observed(&self) -> bool {
		self.derived.body.live_listener_count() > 0
	}

	fn subscribe(&self, listener: &Listener, change: bool) -> Subscription {
		if !self.observed() {
			trace!("passive value observed, reattaching dependencies");
			self.derived.body.attach_dependencies();
			self.derived.body.set_dirty();
		}
		let handle = if change {
			self.derived.body.subscribe_change(listener)
		} else {
			self.derived.body.subscribe_dirty(listener)
		};
		let guard = self.this.clone();
		handle.also(move || {
			if let Some(body) = guard.upgrade() {
				body.release();
			}
		})
	}

	fn release(&self) {
		if !self.observed() {
			trace!("passive value unobserved, detaching dependencies");
			self.derived.body.detach_dependencies();
		}
	}
}

impl<T> Subscribe for PassiveBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.subscribe(listener, false)
	}

	fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.subscribe(listener, true)
	}
}

impl<T> Access<T> for PassiveBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn get_once(&self) -> T {
		if self.observed() {
			return self.derived.get_once();
		}
		// With no registrations in place staleness arrives silently, so an
		// unobserved read must not trust the cache.
		self.derived.body.set_dirty();
		let value = self.derived.get_once();
		self.derived.body.detach_dependencies();
		value
	}
}

impl<T> From<Passive<T>> for Value<T>
where
	T: Clone + PartialEq + 'static,
{
	fn from(passive: Passive<T>) -> Self {
		Value::new(passive.body)
	}
}
