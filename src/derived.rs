use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::trace;
use smallvec::SmallVec;

use crate::dependencies::DependencyList;
use crate::evaluation::Evaluation;
use crate::listeners::{assert_not_dispatching_dirty, Listeners, Subscription};
use crate::value::{Access, Value};
use crate::{Listener, Subscribe};

pub type Compute<T> = Box<dyn Fn(&Evaluation, Option<&T>) -> T>;

/// A lazily recomputed watchable. The computation reads its inputs through
/// the supplied [`Evaluation`], so the dependency set is rediscovered on
/// every run and events keep flowing only along edges that were actually
/// read. Recomputation happens on read, never on notification.
pub struct Derived<T> {
	pub(crate) body: Rc<DerivedBody<T>>,
}

impl<T> Clone for Derived<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct DerivedBody<T> {
	value: RefCell<Option<T>>,
	inner: RefCell<DerivedInner<T>>,
	listeners: Listeners,
	epoch: Rc<Cell<u64>>,
	on_dirty: Listener,
	on_change: Listener,
}

struct DerivedInner<T> {
	compute: Compute<T>,
	dependencies: DependencyList,
}

impl<T> Derived<T>
where
	T: Clone + PartialEq + 'static,
{
	pub fn new(compute: Compute<T>) -> Self {
		Derived {
			body: Rc::new_cyclic(|this: &Weak<DerivedBody<T>>| {
				let dirty_target = this.clone();
				let on_dirty: Listener = Rc::new(move || {
					if let Some(body) = dirty_target.upgrade() {
						body.dependency_dirty();
					}
				});
				let change_target = this.clone();
				let on_change: Listener = Rc::new(move || {
					if let Some(body) = change_target.upgrade() {
						body.dependency_changed();
					}
				});
				DerivedBody {
					value: RefCell::new(None),
					inner: RefCell::new(DerivedInner {
						compute,
						dependencies: SmallVec::new(),
					}),
					listeners: Listeners::new(true),
					epoch: Rc::new(Cell::new(0)),
					on_dirty,
					on_change,
				}
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

	pub fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.body.listeners.subscribe_dirty(listener)
	}

	pub fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.body.listeners.subscribe_change(listener)
	}
}

impl<T> DerivedBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn read(&self) -> T {
		assert_not_dispatching_dirty();
		if self.listeners.is_dirty() {
			let mut inner = self.inner.borrow_mut();
			let cache_stands = self.value.borrow().is_some()
				&& Self::revalidate(&mut inner, &self.on_dirty, &self.on_change);
			if !cache_stands {
				self.recompute(&mut inner);
			}
		}
		self.listeners.mark_clean();
		self.cached()
	}

	/// Fast path: when every dependency still reads equal to the value
	/// observed at the last computation, the result cannot have changed.
	/// Subscriptions torn down during propagation are reinstalled.
	fn revalidate(
		inner: &mut DerivedInner<T>,
		on_dirty: &Listener,
		on_change: &Listener,
	) -> bool {
		if !inner
			.dependencies
			.iter()
			.all(|dependency| dependency.is_unchanged())
		{
			return false;
		}
		for dependency in inner.dependencies.iter_mut() {
			dependency.reattach(on_dirty, on_change);
		}
		true
	}

	fn recompute(&self, inner: &mut DerivedInner<T>) {
		self.epoch.set(self.epoch.get() + 1);
		trace!("recomputing derived value, epoch {}", self.epoch.get());
		let evaluation = Evaluation::new(
			self.epoch.clone(),
			self.on_dirty.clone(),
			self.on_change.clone(),
		);
		let previous = self.value.borrow().clone();
		let result = (inner.compute)(&evaluation, previous.as_ref());
		let retired = std::mem::replace(&mut inner.dependencies, evaluation.take());
		drop(retired);
		*self.value.borrow_mut() = Some(result);
	}

	fn cached(&self) -> T {
		self.value.borrow().as_ref().unwrap().clone()
	}

	/// A dependency may be about to change. One warning carries all the
	/// information there is until the next read, so the dirty-channel
	/// registrations are dropped before the warning moves downstream.
	fn dependency_dirty(&self) {
		if self.listeners.is_dirty() {
			return;
		}
		{
			let mut inner = self.inner.borrow_mut();
			for dependency in inner.dependencies.iter_mut() {
				dependency.detach_dirty();
			}
		}
		self.listeners.broadcast_dirty();
	}

	/// A dependency settled. While this value has not been re-read, further
	/// change events carry nothing new either, so the change-channel
	/// registrations are dropped before forwarding. A change arriving after
	/// the value was already re-read is stale and is ignored.
	fn dependency_changed(&self) {
		if !self.listeners.is_dirty() {
			return;
		}
		{
			let mut inner = self.inner.borrow_mut();
			for dependency in inner.dependencies.iter_mut() {
				dependency.detach_change();
			}
		}
		self.listeners.broadcast_change();
	}

	pub(crate) fn set_dirty(&self) {
		self.listeners.set_dirty();
	}

	pub(crate) fn detach_dependencies(&self) {
		let mut inner = self.inner.borrow_mut();
		for dependency in inner.dependencies.iter_mut() {
			dependency.detach();
		}
	}

	pub(crate) fn attach_dependencies(&self) {
		let mut inner = self.inner.borrow_mut();
		for dependency in inner.dependencies.iter_mut() {
			dependency.reattach(&self.on_dirty, &self.on_change);
		}
	}

	pub(crate) fn live_listener_count(&self) -> usize {
		self.listeners.live_count()
	}
}

impl<T> Subscribe for DerivedBody<T>
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

impl<T> Access<T> for DerivedBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn get_once(&self) -> T {
		self.read()
	}
}

impl<T> From<Derived<T>> for Value<T>
where
	T: Clone + PartialEq + 'static,
{
	fn from(derived: Derived<T>) -> Self {
		Value::new(derived.body)
	}
}
