use crate::derived::Derived;
use crate::evaluation::Evaluation;
use crate::listeners::Subscription;
use crate::value::Value;
use crate::Listener;

/// A derived view of one source that keeps returning its previous result
/// while a user predicate deems the freshly read value equivalent. Because
/// the cached result stays stable, downstream revalidation walks see an
/// unchanged input and skip their own recomputation.
pub struct Gate<T> {
	inner: Derived<T>,
}

impl<T> Clone for Gate<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> Gate<T>
where
	T: Clone + PartialEq + 'static,
{
	pub fn new(source: Value<T>, equivalent: impl Fn(&T, &T) -> bool + 'static) -> Self {
		let inner = Derived::new(Box::new(move |eval, previous| {
			let next = source.get(eval);
			match previous {
				Some(previous) if equivalent(previous, &next) => previous.clone(),
				_ => next,
			}
		}));
		Gate { inner }
	}

	pub fn get(&self, eval: &Evaluation) -> T {
		self.inner.get(eval)
	}

	#[inline]
	pub fn get_once(&self) -> T {
		self.inner.get_once()
	}

	pub fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.inner.subscribe_dirty(listener)
	}

	pub fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.inner.subscribe_change(listener)
	}
}

impl<T> From<Gate<T>> for Value<T>
where
	T: Clone + PartialEq + 'static,
{
	fn from(gate: Gate<T>) -> Self {
		gate.inner.into()
	}
}
