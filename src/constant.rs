use std::rc::Rc;

use crate::listeners::Subscription;
use crate::value::{Access, Value};
use crate::{Listener, Subscribe};

/// A watchable that never changes. Subscriptions are inert handles.
pub struct Const<T> {
	body: Rc<ConstBody<T>>,
}

struct ConstBody<T> {
	value: T,
}

impl<T> Clone for Const<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Const<T>
where
	T: Clone + PartialEq + 'static,
{
	pub fn new(value: T) -> Self {
		Const {
			body: Rc::new(ConstBody { value }),
		}
	}

	pub fn get(&self) -> T {
		self.body.value.clone()
	}
}

impl<T> Subscribe for ConstBody<T>
where
	T: 'static,
{
	fn subscribe_dirty(&self, _: &Listener) -> Subscription {
		Subscription::none()
	}

	fn subscribe_change(&self, _: &Listener) -> Subscription {
		Subscription::none()
	}
}

impl<T> Access<T> for ConstBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn get_once(&self) -> T {
		self.value.clone()
	}
}

impl<T> From<Const<T>> for Value<T>
where
	T: Clone + PartialEq + 'static,
{
	fn from(constant: Const<T>) -> Self {
		Value::new(constant.body)
	}
}
