use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::trace;

use crate::derived::Derived;
use crate::evaluation::Evaluation;
use crate::listeners::{adaptor, assert_not_dispatching_dirty, Listeners, Subscription};
use crate::signal::Signal;
use crate::timer::{Timer, TimerHandle};
use crate::value::{Access, Value};
use crate::{Listener, Subscribe};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Wave {
	Dirty,
	Change,
}

/// The interval between a first-in-period event and its resolving timer.
/// `kind` records what already went downstream this period; `pending` holds
/// the one suppressed wave waiting for the timer.
struct Epoch {
	kind: Wave,
	pending: Option<Wave>,
	timer: TimerHandle,
}

/// A derived view of a single source that forwards at most one dirty/change
/// wave per period, absorbing the surplus, and exposes whether it is
/// currently holding events back as a watchable of its own.
pub struct Throttle<T> {
	body: Rc<ThrottleBody<T>>,
	throttling: Derived<bool>,
}

impl<T> Clone for Throttle<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
			throttling: self.throttling.clone(),
		}
	}
}

struct ThrottleBody<T> {
	source: Value<T>,
	value: RefCell<Option<T>>,
	listeners: Listeners,
	period: Duration,
	timer: Rc<dyn Timer>,
	epoch: RefCell<Option<Epoch>>,
	start_mark: Signal,
	end_mark: Signal,
	on_source_dirty: Listener,
	on_source_change: Listener,
	dirty_attachment: RefCell<Option<SourceAttachment>>,
	change_attachment: RefCell<Option<SourceAttachment>>,
	this: Weak<ThrottleBody<T>>,
}

struct SourceAttachment {
	_adaptor: Listener,
	_handle: Subscription,
}

impl<T> Throttle<T>
where
	T: Clone + PartialEq + 'static,
{
	pub fn new(source: Value<T>, period: Duration, timer: Rc<dyn Timer>) -> Self {
		let body = Rc::new_cyclic(|this: &Weak<ThrottleBody<T>>| {
			let dirty_target = this.clone();
			let on_source_dirty: Listener = Rc::new(move || {
				if let Some(body) = dirty_target.upgrade() {
					body.source_dirty();
				}
			});
			let change_target = this.clone();
			let on_source_change: Listener = Rc::new(move || {
				if let Some(body) = change_target.upgrade() {
					body.source_changed();
				}
			});
			ThrottleBody {
				source,
				value: RefCell::new(None),
				listeners: Listeners::new(true),
				period,
				timer,
				epoch: RefCell::new(None),
				start_mark: Signal::new(),
				end_mark: Signal::new(),
				on_source_dirty,
				on_source_change,
				dirty_attachment: RefCell::new(None),
				change_attachment: RefCell::new(None),
				this: this.clone(),
			}
		});
		body.attach_source();
		let throttling = Self::throttling_derived(&body);
		Throttle { body, throttling }
	}

	/// The indicator flips true on the first suppressed wave of an epoch and
	/// back to false when the timer forwards it. It watches `start_mark`
	/// while idle and `end_mark` while throttling, so exactly the upcoming
	/// transition wakes it.
	fn throttling_derived(body: &Rc<ThrottleBody<T>>) -> Derived<bool> {
		let state = Rc::downgrade(body);
		let start = body.start_mark.clone();
		let end = body.end_mark.clone();
		Derived::new(Box::new(move |eval, _| {
			let suppressing = state
				.upgrade()
				.map(|body| body.is_suppressing())
				.unwrap_or(false);
			if suppressing {
				end.get(eval);
			} else {
				start.get(eval);
			}
			suppressing
		}))
	}

	pub fn throttling(&self) -> Value<bool> {
		self.throttling.clone().into()
	}

	pub fn period(&self) -> Duration {
		self.body.period
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

impl<T> ThrottleBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn read(&self) -> T {
		assert_not_dispatching_dirty();
		if self.listeners.is_dirty() {
			let value = self.source.get_once();
			*self.value.borrow_mut() = Some(value);
		}
		self.attach_source();
		self.listeners.mark_clean();
		self.value.borrow().as_ref().unwrap().clone()
	}

	fn attach_source(&self) {
		{
			let mut attachment = self.dirty_attachment.borrow_mut();
			if attachment.is_none() {
				let listener = adaptor(&self.on_source_dirty);
				let handle = self.source.subscribe_dirty(&listener);
				*attachment = Some(SourceAttachment {
					_adaptor: listener,
					_handle: handle,
				});
			}
		}
		let mut attachment = self.change_attachment.borrow_mut();
		if attachment.is_none() {
			let listener = adaptor(&self.on_source_change);
			let handle = self.source.subscribe_change(&listener);
			*attachment = Some(SourceAttachment {
				_adaptor: listener,
				_handle: handle,
			});
		}
	}

	fn detach_source_dirty(&self) {
		*self.dirty_attachment.borrow_mut() = None;
	}

	fn detach_source_change(&self) {
		*self.change_attachment.borrow_mut() = None;
	}

	fn is_suppressing(&self) -> bool {
		self.epoch
			.borrow()
			.as_ref()
			.map(|epoch| epoch.pending.is_some())
			.unwrap_or(false)
	}

	fn schedule(&self) -> TimerHandle {
		let target = self.this.clone();
		self.timer.schedule(
			self.period,
			Box::new(move || {
				if let Some(body) = target.upgrade() {
					body.timer_fired();
				}
			}),
		)
	}

	/// With only the throttling indicator observing, nobody downstream reads
	/// this value during its change broadcast, so the source would never be
	/// read and its dirty channel would stay silent forever. Read it here on
	/// their behalf, restoring the registrations a read carries with it.
	fn keep_alive_read(&self) {
		if self.start_mark.has_subscribers() || self.end_mark.has_subscribers() {
			let _ = self.source.get_once();
			self.attach_source();
		}
	}

	fn source_dirty(&self) {
		enum Action {
			Open,
			Suppress,
			Absorb,
		}
		let action = {
			let mut epoch = self.epoch.borrow_mut();
			match &mut *epoch {
				None => {
					*epoch = Some(Epoch {
						kind: Wave::Dirty,
						pending: None,
						timer: self.schedule(),
					});
					Action::Open
				}
				Some(active) if active.pending.is_none() => {
					active.pending = Some(Wave::Dirty);
					Action::Suppress
				}
				Some(_) => Action::Absorb,
			}
		};
		match action {
			Action::Open => {
				trace!("throttle: opening dirty epoch");
				self.detach_source_dirty();
				self.listeners.broadcast_dirty();
			}
			Action::Suppress => {
				trace!("throttle: suppressing dirty wave");
				self.detach_source_dirty();
				self.start_mark.mark_dirty();
			}
			Action::Absorb => {}
		}
	}

	fn source_changed(&self) {
		let renewed = {
			let mut epoch = self.epoch.borrow_mut();
			match &mut *epoch {
				Some(active) if active.kind == Wave::Change => {
					active.pending = Some(Wave::Change);
					false
				}
				other => {
					if let Some(stale) = other.take() {
						stale.timer.cancel();
					}
					*other = Some(Epoch {
						kind: Wave::Change,
						pending: None,
						timer: self.schedule(),
					});
					true
				}
			}
		};
		if renewed {
			trace!("throttle: opening change epoch");
			self.listeners.broadcast_change();
			self.keep_alive_read();
		} else {
			trace!("throttle: suppressing change wave");
			self.listeners.clear_signaled();
			self.detach_source_change();
			self.start_mark.mark_change();
		}
	}

	fn timer_fired(&self) {
		let forwarded = {
			let mut epoch = self.epoch.borrow_mut();
			match epoch.take() {
				Some(finished) => match finished.pending {
					Some(kind) => {
						*epoch = Some(Epoch {
							kind,
							pending: None,
							timer: self.schedule(),
						});
						Some(kind)
					}
					None => None,
				},
				None => None,
			}
		};
		match forwarded {
			Some(kind) => {
				trace!("throttle: forwarding suppressed {:?} wave", kind);
				self.listeners.broadcast_dirty();
				self.end_mark.mark_dirty();
				if kind == Wave::Change {
					self.listeners.broadcast_change();
					self.end_mark.mark_change();
					self.keep_alive_read();
				}
			}
			None => trace!("throttle: epoch closed"),
		}
	}
}

impl<T> Subscribe for ThrottleBody<T>
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

impl<T> Access<T> for ThrottleBody<T>
where
	T: Clone + PartialEq + 'static,
{
	fn get_once(&self) -> T {
		self.read()
	}
}

impl<T> From<Throttle<T>> for Value<T>
where
	T: Clone + PartialEq + 'static,
{
	fn from(throttle: Throttle<T>) -> Self {
		Value::new(throttle.body)
	}
}
