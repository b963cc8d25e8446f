use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::listeners::Subscription;
use crate::value::Value;
use crate::Listener;

type ChangeHandler<T> = Box<dyn Fn(&T, &T)>;

/// A long-lived endpoint that turns the change channel into `(new, previous)`
/// deliveries, skipping notifications whose re-read produced an equal value.
/// Unlike raw listeners, the observer owns its registration strongly and
/// keeps the observed watchable alive for its own lifetime.
pub struct Observer<T> {
	body: Rc<ObserverBody<T>>,
}

impl<T> Clone for Observer<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

struct ObserverBody<T> {
	source: Value<T>,
	last: RefCell<T>,
	handlers: RefCell<Vec<ChangeHandler<T>>>,
	registration: RefCell<Option<Registration>>,
}

struct Registration {
	_listener: Listener,
	_handle: Subscription,
}

impl<T> Observer<T>
where
	T: Clone + PartialEq + 'static,
{
	pub fn new(source: Value<T>) -> Self {
		let last = source.get_once();
		let body = Rc::new(ObserverBody {
			source: source.clone(),
			last: RefCell::new(last),
			handlers: RefCell::new(Vec::new()),
			registration: RefCell::new(None),
		});
		let target = Rc::downgrade(&body);
		let listener: Listener = Rc::new(move || {
			if let Some(body) = target.upgrade() {
				body.source_changed();
			}
		});
		let handle = source.subscribe_change(&listener);
		*body.registration.borrow_mut() = Some(Registration {
			_listener: listener,
			_handle: handle,
		});
		Observer { body }
	}

	/// Register `handler`. With `deliver_initial` the current value is read
	/// and delivered immediately, in both tuple positions.
	pub fn add(&self, handler: impl Fn(&T, &T) + 'static, deliver_initial: bool) -> &Self {
		if deliver_initial {
			let current = self.body.source.get_once();
			*self.body.last.borrow_mut() = current.clone();
			handler(&current, &current);
		}
		self.body.handlers.borrow_mut().push(Box::new(handler));
		self
	}

	/// Drop the change registration and every handler. Idempotent.
	pub fn destroy(&self) {
		debug!("observer destroyed");
		self.body.registration.borrow_mut().take();
		self.body.handlers.borrow_mut().clear();
	}
}

impl<T> ObserverBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn source_changed(&self) {
		let current = self.source.get_once();
		let previous = {
			let mut last = self.last.borrow_mut();
			if *last == current {
				return;
			}
			std::mem::replace(&mut *last, current.clone())
		};
		let handlers = self.handlers.borrow();
		for handler in handlers.iter() {
			handler(&current, &previous);
		}
	}
}
