use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// A single-shot, cancellable callback scheduler. The throttle layer is the
/// only consumer; hosts integrate their event loop by implementing this.
pub trait Timer {
	fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle;
}

/// Cancels its scheduled callback when dropped.
pub struct TimerHandle {
	cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
	pub fn new() -> Self {
		TimerHandle {
			cancelled: Rc::new(Cell::new(false)),
		}
	}

	pub fn cancel(&self) {
		self.cancelled.set(true);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.get()
	}

	/// The shared flag a scheduler checks before firing.
	pub fn flag(&self) -> Rc<Cell<bool>> {
		self.cancelled.clone()
	}
}

impl Default for TimerHandle {
	fn default() -> Self {
		TimerHandle::new()
	}
}

impl Drop for TimerHandle {
	fn drop(&mut self) {
		self.cancelled.set(true);
	}
}

/// A deterministic scheduler: time passes only through
/// [`ManualTimer::advance`]. Serves the tests and any host that prefers to
/// pump timers from its own loop.
pub struct ManualTimer {
	inner: Rc<RefCell<ManualInner>>,
}

struct ManualInner {
	now: Duration,
	queue: Vec<Scheduled>,
}

struct Scheduled {
	due: Duration,
	cancelled: Rc<Cell<bool>>,
	callback: Box<dyn FnOnce()>,
}

impl Clone for ManualTimer {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl Default for ManualTimer {
	fn default() -> Self {
		ManualTimer::new()
	}
}

impl ManualTimer {
	pub fn new() -> Self {
		ManualTimer {
			inner: Rc::new(RefCell::new(ManualInner {
				now: Duration::ZERO,
				queue: Vec::new(),
			})),
		}
	}

	pub fn now(&self) -> Duration {
		self.inner.borrow().now
	}

	/// Advance the clock, firing due callbacks in due-order. The clock steps
	/// to each due point before its callback runs, so callbacks that
	/// reschedule land relative to their own firing time; anything made due
	/// within the same advance fires too.
	pub fn advance(&self, delta: Duration) {
		let target = self.inner.borrow().now + delta;
		loop {
			let next = {
				let mut inner = self.inner.borrow_mut();
				inner.queue.retain(|scheduled| !scheduled.cancelled.get());
				let due = inner
					.queue
					.iter()
					.enumerate()
					.filter(|(_, scheduled)| scheduled.due <= target)
					.min_by_key(|(_, scheduled)| scheduled.due)
					.map(|(index, _)| index);
				due.map(|index| {
					let scheduled = inner.queue.remove(index);
					inner.now = scheduled.due.max(inner.now);
					scheduled
				})
			};
			match next {
				Some(scheduled) => (scheduled.callback)(),
				None => break,
			}
		}
		self.inner.borrow_mut().now = target;
	}
}

impl Timer for ManualTimer {
	fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
		let handle = TimerHandle::new();
		let mut inner = self.inner.borrow_mut();
		let due = inner.now + delay;
		inner.queue.push(Scheduled {
			due,
			cancelled: handle.flag(),
			callback,
		});
		handle
	}
}
