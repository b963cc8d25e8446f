use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::derived::Derived;
use crate::evaluation::Evaluation;
use crate::listeners::{assert_not_dispatching_dirty, Listeners, Subscription};
use crate::mutation::Mutation;
use crate::value::{Access, Value};
use crate::{Listener, Subscribe};

type Equals<T> = Box<dyn Fn(&T, &T) -> bool>;

/// A settable watchable with pluggable write deduplication.
pub struct Field<T> {
	body: Rc<FieldBody<T>>,
}

struct FieldBody<T> {
	value: RefCell<T>,
	equals: Equals<T>,
	listeners: Listeners,
}

impl<T> Clone for Field<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for Field<T>
where
	T: Default + Clone + PartialEq + 'static,
{
	fn default() -> Self {
		Field::new(Default::default())
	}
}

impl<T> Field<T>
where
	T: Clone + PartialEq + 'static,
{
	pub fn new(value: T) -> Self {
		Field::with_equals(value, |current, next| current == next)
	}

	/// A field that deduplicates writes with `equals` instead of `PartialEq`.
	pub fn with_equals(value: T, equals: impl Fn(&T, &T) -> bool + 'static) -> Self {
		Field {
			body: Rc::new(FieldBody {
				value: RefCell::new(value),
				equals: Box::new(equals),
				listeners: Listeners::new(false),
			}),
		}
	}

	pub fn get(&self, eval: &Evaluation) -> T {
		let value = self.body.read();
		let source: Rc<dyn Access<T>> = self.body.clone();
		eval.track(&source, value.clone());
		value
	}

	#[inline]
	pub fn get_once(&self) -> T {
		self.body.read()
	}

	/// Stage a write. The perform stage broadcasts dirty and assigns; the
	/// signal stage broadcasts change. A write the field's `equals` judges
	/// redundant makes the whole mutation a no-op.
	pub fn set(&self, value: T) -> Mutation<()> {
		let body = self.body.clone();
		Mutation::new(move || {
			let changed = {
				let current = body.value.borrow();
				!(body.equals)(&current, &value)
			};
			if changed {
				body.listeners.broadcast_dirty();
				*body.value.borrow_mut() = value;
			}
			let signal_body = body.clone();
			let signal = Box::new(move || {
				if changed {
					signal_body.listeners.broadcast_change();
				}
			}) as Box<dyn FnOnce()>;
			((), signal)
		})
	}

	pub fn map<F, R>(&self, func: F) -> Derived<R>
	where
		F: Fn(&T) -> R + 'static,
		R: Clone + PartialEq + 'static,
	{
		let this = self.clone();
		Derived::new(Box::new(move |eval, _| func(&this.get(eval))))
	}

	pub fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.body.listeners.subscribe_dirty(listener)
	}

	pub fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.body.listeners.subscribe_change(listener)
	}
}

impl<T> FieldBody<T>
where
	T: Clone,
{
	fn read(&self) -> T {
		assert_not_dispatching_dirty();
		self.listeners.mark_clean();
		self.value.borrow().clone()
	}
}

impl<T> Subscribe for FieldBody<T>
where
	T: 'static,
{
	fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.listeners.subscribe_dirty(listener)
	}

	fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.listeners.subscribe_change(listener)
	}
}

impl<T> Access<T> for FieldBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn get_once(&self) -> T {
		self.read()
	}
}

impl<T> From<Field<T>> for Value<T>
where
	T: Clone + PartialEq + 'static,
{
	fn from(field: Field<T>) -> Self {
		Value::new(field.body)
	}
}

impl<T> Debug for Field<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Field").field(&self.body.value.borrow()).finish()
	}
}
