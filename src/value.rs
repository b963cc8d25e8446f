use std::rc::Rc;

use crate::derived::Derived;
use crate::evaluation::Evaluation;
use crate::listeners::Subscription;
use crate::{Listener, Subscribe};

/// The typed read capability layered over the subscription channels.
pub trait Access<T>: Subscribe {
	/// Read the current value without dependency tracking.
	fn get_once(&self) -> T;
}

/// A type-erased handle to any watchable value.
pub struct Value<T> {
	value: Rc<dyn Access<T>>,
}

impl<T> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			value: self.value.clone(),
		}
	}
}

impl<T> Value<T> {
	pub fn new(value: Rc<dyn Access<T>>) -> Self {
		Value { value }
	}

	/// Identity comparison: do both handles point at the same watchable?
	pub fn ptr_eq(&self, other: &Value<T>) -> bool {
		Rc::ptr_eq(&self.value, &other.value)
	}

	pub fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.value.subscribe_dirty(listener)
	}

	pub fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.value.subscribe_change(listener)
	}
}

impl<T> Value<T>
where
	T: Clone + PartialEq + 'static,
{
	/// Read the current value and record this watchable as an ordered
	/// dependency of the computation running under `eval`.
	pub fn get(&self, eval: &Evaluation) -> T {
		let value = self.value.get_once();
		eval.track(&self.value, value.clone());
		value
	}

	#[inline]
	pub fn get_once(&self) -> T {
		self.value.get_once()
	}

	pub fn map<F, R>(&self, func: F) -> Derived<R>
	where
		F: Fn(&T) -> R + 'static,
		R: Clone + PartialEq + 'static,
	{
		let this = self.clone();
		Derived::new(Box::new(move |eval, _| func(&this.get(eval))))
	}
}
