use std::rc::Rc;

use smallvec::SmallVec;

use crate::listeners::{adaptor, Subscription};
use crate::value::Access;
use crate::{Listener, Subscribe};

pub(crate) type DependencyList = SmallVec<[Dependency; 4]>;

/// One ordered edge from a derived value to a source it observed during its
/// last computation. The record owns the source, so everything a cached
/// value was computed from stays alive; the channels hold only the weak
/// side of the registration.
pub(crate) struct Dependency {
	source: Rc<dyn Subscribe>,
	unchanged: Box<dyn Fn() -> bool>,
	dirty: Option<Attachment>,
	change: Option<Attachment>,
}

/// A live channel registration. The adaptor strong-refs the derived value's
/// inner handler; the registry sees only the adaptor, weakly.
struct Attachment {
	_adaptor: Listener,
	_handle: Subscription,
}

impl Attachment {
	fn dirty(source: &Rc<dyn Subscribe>, inner: &Listener) -> Self {
		let adaptor = adaptor(inner);
		let handle = source.subscribe_dirty(&adaptor);
		Attachment {
			_adaptor: adaptor,
			_handle: handle,
		}
	}

	fn change(source: &Rc<dyn Subscribe>, inner: &Listener) -> Self {
		let adaptor = adaptor(inner);
		let handle = source.subscribe_change(&adaptor);
		Attachment {
			_adaptor: adaptor,
			_handle: handle,
		}
	}
}

impl Dependency {
	pub fn new<T>(
		source: Rc<dyn Access<T>>,
		observed: T,
		on_dirty: &Listener,
		on_change: &Listener,
	) -> Self
	where
		T: Clone + PartialEq + 'static,
	{
		let probe = source.clone();
		let unchanged = Box::new(move || probe.get_once() == observed);
		let source: Rc<dyn Subscribe> = source;
		let dirty = Some(Attachment::dirty(&source, on_dirty));
		let change = Some(Attachment::change(&source, on_change));
		Dependency {
			source,
			unchanged,
			dirty,
			change,
		}
	}

	/// Re-read the source and compare against the value observed at the last
	/// computation.
	pub fn is_unchanged(&self) -> bool {
		(self.unchanged)()
	}

	pub fn detach_dirty(&mut self) {
		self.dirty = None;
	}

	pub fn detach_change(&mut self) {
		self.change = None;
	}

	pub fn detach(&mut self) {
		self.dirty = None;
		self.change = None;
	}

	/// Reinstall whichever channel registrations propagation tore down.
	pub fn reattach(&mut self, on_dirty: &Listener, on_change: &Listener) {
		if self.dirty.is_none() {
			self.dirty = Some(Attachment::dirty(&self.source, on_dirty));
		}
		if self.change.is_none() {
			self.change = Some(Attachment::change(&self.source, on_change));
		}
	}
}
