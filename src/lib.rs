pub mod macros;

mod addr;
mod constant;
mod dependencies;
mod derived;
mod evaluation;
mod field;
mod gate;
mod listeners;
mod mutation;
mod observer;
mod passive;
mod signal;
mod source_field;
mod throttle;
mod timer;
mod value;

use std::rc::Rc;

pub use constant::Const;
pub use derived::{Compute, Derived};
pub use evaluation::Evaluation;
pub use field::Field;
pub use gate::Gate;
pub use listeners::Subscription;
pub use mutation::{all, batch, Mutation, SignalFn, Transaction};
pub use observer::Observer;
pub use passive::Passive;
pub use signal::Signal;
pub use source_field::{Src, SourceField};
pub use throttle::Throttle;
pub use timer::{ManualTimer, Timer, TimerHandle};
pub use value::{Access, Value};

/// A zero-argument callable registered on a notification channel. Its
/// allocation address is its identity in a subscriber set; channels hold it
/// weakly, so the allocator keeps the only owning reference.
pub type Listener = Rc<dyn Fn()>;

/// The two notification channels every watchable exposes.
///
/// Dirty warns that the value may change; reading anything is forbidden
/// while a dirty broadcast is unwinding. Change commits that the value has
/// settled; reading during a change broadcast is the intended way to pick
/// the new value up. Listeners are stored weakly and called in insertion
/// order; a panicking listener unwinds through the dispatch loop, skipping
/// the listeners behind it.
pub trait Subscribe {
	fn subscribe_dirty(&self, listener: &Listener) -> Subscription;
	fn subscribe_change(&self, listener: &Listener) -> Subscription;
}
