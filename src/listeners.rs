use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::addr::WeakAddr;
use crate::Listener;

pub(crate) const READ_DURING_DIRTY_DISPATCH: &str = "read during dirty dispatch";

thread_local! {
	static DISPATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Reads are forbidden anywhere in the graph while a dirty broadcast is
/// unwinding. Dirty is a warning, not a settled value.
pub(crate) fn assert_not_dispatching_dirty() {
	DISPATCH_DEPTH.with(|depth| {
		if depth.get() > 0 {
			panic!("{}", READ_DURING_DIRTY_DISPATCH);
		}
	});
}

struct DispatchGuard;

impl DispatchGuard {
	fn enter() -> Self {
		DISPATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
		DispatchGuard
	}
}

impl Drop for DispatchGuard {
	fn drop(&mut self) {
		DISPATCH_DEPTH.with(|depth| depth.set(depth.get() - 1));
	}
}

/// Wrap an owned handler in a fresh single-purpose listener. The wrapper's
/// allocation is the identity a registry sees, so dropping it severs the
/// registration even while a dispatch over an older snapshot is in flight.
pub(crate) fn adaptor(inner: &Listener) -> Listener {
	let inner = inner.clone();
	Rc::new(move || inner())
}

type Entries = Rc<RefCell<Vec<WeakAddr<dyn Fn()>>>>;

/// An insertion-ordered set of weakly held listeners, deduplicated by
/// allocation address.
pub(crate) struct SubscriberSet {
	entries: Entries,
}

impl SubscriberSet {
	pub fn new() -> Self {
		SubscriberSet {
			entries: Rc::new(RefCell::new(Vec::new())),
		}
	}

	pub fn subscribe(&self, listener: &Listener) -> Subscription {
		let addr = WeakAddr::new(Rc::downgrade(listener));
		{
			let mut entries = self.entries.borrow_mut();
			if !entries.iter().any(|entry| *entry == addr) {
				entries.push(addr.clone());
			}
		}
		let entries = Rc::downgrade(&self.entries);
		Subscription::new(move || {
			if let Some(entries) = entries.upgrade() {
				entries.borrow_mut().retain(|entry| *entry != addr);
			}
		})
	}

	/// Invoke the live subscribers in insertion order. The iteration runs
	/// over a snapshot: entries removed since the snapshot are skipped,
	/// entries added during dispatch wait for the next round, and entries
	/// whose listener has been collected are compacted away afterwards.
	pub fn dispatch(&self) {
		let snapshot: Vec<WeakAddr<dyn Fn()>> = self.entries.borrow().clone();
		for entry in &snapshot {
			if !self.entries.borrow().iter().any(|current| current == entry) {
				continue;
			}
			if let Some(listener) = entry.upgrade() {
				listener();
			}
		}
		self.entries
			.borrow_mut()
			.retain(|entry| entry.strong_count() > 0);
	}

	pub fn live_count(&self) -> usize {
		self.entries
			.borrow()
			.iter()
			.filter(|entry| entry.strong_count() > 0)
			.count()
	}
}

/// An unsubscribe handle. Cancelling is idempotent and also happens on drop;
/// a handle that outlives its registry is inert.
pub struct Subscription {
	cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
	pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
		Subscription {
			cancel: RefCell::new(Some(Box::new(cancel))),
		}
	}

	/// A handle that is not connected to any channel.
	pub fn none() -> Self {
		Subscription {
			cancel: RefCell::new(None),
		}
	}

	pub fn unsubscribe(&self) {
		if let Some(cancel) = self.cancel.borrow_mut().take() {
			cancel();
		}
	}

	/// Compose a follow-up to run whenever this handle is cancelled,
	/// explicitly or on drop.
	pub(crate) fn also(self, after: impl FnOnce() + 'static) -> Subscription {
		Subscription::new(move || {
			self.unsubscribe();
			after();
		})
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(cancel) = self.cancel.get_mut().take() {
			cancel();
		}
	}
}

/// The notification state every watchable embeds: two weak subscriber
/// channels plus the dirty/signaled bits that coalesce redundant events.
pub(crate) struct Listeners {
	dirty: Cell<bool>,
	signaled: Cell<bool>,
	dirty_channel: SubscriberSet,
	change_channel: SubscriberSet,
}

impl Listeners {
	pub fn new(dirty: bool) -> Self {
		Listeners {
			dirty: Cell::new(dirty),
			signaled: Cell::new(false),
			dirty_channel: SubscriberSet::new(),
			change_channel: SubscriberSet::new(),
		}
	}

	pub fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.dirty_channel.subscribe(listener)
	}

	pub fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.change_channel.subscribe(listener)
	}

	pub fn is_dirty(&self) -> bool {
		self.dirty.get()
	}

	/// Raise the dirty bit without notifying anyone. The next read then runs
	/// its revalidation walk instead of trusting the cache.
	pub fn set_dirty(&self) {
		self.dirty.set(true);
	}

	/// Allow the next change broadcast through even though one already ran
	/// since the last read.
	pub fn clear_signaled(&self) {
		self.signaled.set(false);
	}

	/// A successful read settles both bits.
	pub fn mark_clean(&self) {
		self.dirty.set(false);
		self.signaled.set(false);
	}

	pub fn broadcast_dirty(&self) {
		if self.dirty.get() {
			return;
		}
		self.dirty.set(true);
		self.signaled.set(false);
		let _guard = DispatchGuard::enter();
		self.dirty_channel.dispatch();
	}

	pub fn broadcast_change(&self) {
		if self.signaled.get() {
			return;
		}
		self.signaled.set(true);
		self.change_channel.dispatch();
	}

	pub fn live_count(&self) -> usize {
		self.dirty_channel.live_count() + self.change_channel.live_count()
	}

	pub fn has_subscribers(&self) -> bool {
		self.live_count() > 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn counter() -> (Listener, Rc<Cell<usize>>) {
		let count = Rc::new(Cell::new(0));
		let seen = count.clone();
		let listener: Listener = Rc::new(move || seen.set(seen.get() + 1));
		(listener, count)
	}

	#[test]
	fn dispatch_runs_in_insertion_order() {
		let set = SubscriberSet::new();
		let order = Rc::new(RefCell::new(Vec::new()));
		let first: Listener = Rc::new({
			let order = order.clone();
			move || order.borrow_mut().push(1)
		});
		let second: Listener = Rc::new({
			let order = order.clone();
			move || order.borrow_mut().push(2)
		});
		let _a = set.subscribe(&first);
		let _b = set.subscribe(&second);
		set.dispatch();
		assert_eq!(*order.borrow(), vec![1, 2]);
	}

	#[test]
	fn subscribe_is_idempotent_per_identity() {
		let set = SubscriberSet::new();
		let (listener, count) = counter();
		let _a = set.subscribe(&listener);
		let _b = set.subscribe(&listener);
		set.dispatch();
		assert_eq!(count.get(), 1);
	}

	#[test]
	fn collected_listeners_are_skipped_and_compacted() {
		let set = SubscriberSet::new();
		let (listener, count) = counter();
		let sub = set.subscribe(&listener);
		drop(listener);
		set.dispatch();
		assert_eq!(count.get(), 0);
		assert_eq!(set.live_count(), 0);
		drop(sub);
	}

	#[test]
	fn unsubscribe_is_idempotent() {
		let set = SubscriberSet::new();
		let (listener, count) = counter();
		let sub = set.subscribe(&listener);
		sub.unsubscribe();
		sub.unsubscribe();
		set.dispatch();
		assert_eq!(count.get(), 0);
	}

	#[test]
	fn listener_removed_during_dispatch_is_not_called() {
		let set = Rc::new(SubscriberSet::new());
		let (victim, count) = counter();
		let victim_sub: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
		let remover: Listener = Rc::new({
			let victim_sub = victim_sub.clone();
			move || {
				if let Some(sub) = victim_sub.borrow_mut().take() {
					sub.unsubscribe();
				}
			}
		});
		let _a = set.subscribe(&remover);
		*victim_sub.borrow_mut() = Some(set.subscribe(&victim));
		set.dispatch();
		assert_eq!(count.get(), 0);
	}

	#[test]
	fn broadcasts_coalesce_until_read() {
		let listeners = Listeners::new(false);
		let (dirty, dirty_count) = counter();
		let (change, change_count) = counter();
		let _d = listeners.subscribe_dirty(&dirty);
		let _c = listeners.subscribe_change(&change);

		listeners.broadcast_dirty();
		listeners.broadcast_dirty();
		listeners.broadcast_change();
		listeners.broadcast_change();
		assert_eq!(dirty_count.get(), 1);
		assert_eq!(change_count.get(), 1);

		listeners.mark_clean();
		listeners.broadcast_dirty();
		listeners.broadcast_change();
		assert_eq!(dirty_count.get(), 2);
		assert_eq!(change_count.get(), 2);
	}

	#[test]
	#[should_panic(expected = "read during dirty dispatch")]
	fn reads_fail_during_dirty_dispatch() {
		let listeners = Rc::new(Listeners::new(false));
		let reader: Listener = Rc::new(|| assert_not_dispatching_dirty());
		let _sub = listeners.subscribe_dirty(&reader);
		listeners.broadcast_dirty();
	}
}
