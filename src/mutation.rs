pub(crate) const MUTATION_ALREADY_CONSUMED: &str = "mutation already consumed";

pub type SignalFn = Box<dyn FnOnce()>;
type PerformFn<R> = Box<dyn FnOnce() -> (R, SignalFn)>;

/// A reified two-phase write: a perform stage that advances state and
/// broadcasts dirty, and a signal stage that broadcasts change. Composing
/// mutations runs every perform before any signal, so no listener observes a
/// partially applied group. Dropping an uncommitted mutation has no effect.
pub struct Mutation<R> {
	perform: Option<PerformFn<R>>,
	signal: Option<SignalFn>,
}

impl<R> Mutation<R>
where
	R: 'static,
{
	pub fn new(perform: impl FnOnce() -> (R, SignalFn) + 'static) -> Self {
		Mutation {
			perform: Some(Box::new(perform)),
			signal: None,
		}
	}

	/// A mutation with no effect beyond reporting `result`.
	pub fn noop(result: R) -> Self {
		Mutation::new(move || (result, Box::new(|| {}) as SignalFn))
	}

	/// Run both stages in order.
	pub fn commit(mut self) -> R {
		let result = self.perform();
		self.signal();
		result
	}

	/// Run the perform stage alone. Exists so stages can be interleaved by
	/// composition; prefer [`Mutation::commit`].
	pub fn perform(&mut self) -> R {
		let perform = self
			.perform
			.take()
			.unwrap_or_else(|| panic!("{}", MUTATION_ALREADY_CONSUMED));
		let (result, signal) = perform();
		self.signal = Some(signal);
		result
	}

	/// Run the signal stage alone. Must follow [`Mutation::perform`].
	pub fn signal(&mut self) {
		let signal = self
			.signal
			.take()
			.unwrap_or_else(|| panic!("{}", MUTATION_ALREADY_CONSUMED));
		signal();
	}

	fn stage(mut self) -> (R, SignalFn) {
		let result = self.perform();
		let signal = self.signal.take().unwrap();
		(result, signal)
	}

	/// Atomically prepend this mutation to `next`.
	pub fn then<O>(self, next: Mutation<O>) -> Mutation<O>
	where
		O: 'static,
	{
		self.chain(move |_| next)
	}

	/// Atomically continue with the mutation built from this mutation's
	/// perform result. Both performs finish before either signal runs.
	pub fn chain<O, F>(self, continuation: F) -> Mutation<O>
	where
		O: 'static,
		F: FnOnce(R) -> Mutation<O> + 'static,
	{
		Mutation::new(move || {
			let (result, first_signal) = self.stage();
			let (output, second_signal) = continuation(result).stage();
			let signal = Box::new(move || {
				first_signal();
				second_signal();
			}) as SignalFn;
			(output, signal)
		})
	}

	/// Transform the reported result; timing is unchanged.
	pub fn map<O, F>(self, func: F) -> Mutation<O>
	where
		O: 'static,
		F: FnOnce(R) -> O + 'static,
	{
		Mutation::new(move || {
			let (result, signal) = self.stage();
			(func(result), signal)
		})
	}
}

/// Combine mutations into one atomic group, performed and signaled in order.
/// An empty list yields a no-op mutation.
pub fn all(mutations: Vec<Mutation<()>>) -> Mutation<()> {
	mutations
		.into_iter()
		.fold(Mutation::noop(()), |group, next| group.then(next))
}

/// Imperative atomic composition: the builder performs mutations through
/// [`Transaction::push`] and every queued signal runs after the builder
/// returns.
pub fn batch<R, F>(builder: F) -> Mutation<R>
where
	R: 'static,
	F: FnOnce(&mut Transaction) -> R + 'static,
{
	Mutation::new(move || {
		let mut transaction = Transaction {
			signals: Vec::new(),
		};
		let result = builder(&mut transaction);
		let signal = Box::new(move || {
			for signal in transaction.signals {
				signal();
			}
		}) as SignalFn;
		(result, signal)
	})
}

pub struct Transaction {
	signals: Vec<SignalFn>,
}

impl Transaction {
	/// Perform `mutation` now; its signal stage is queued for the end of the
	/// batch. Returns the perform result.
	pub fn push<R>(&mut self, mutation: Mutation<R>) -> R
	where
		R: 'static,
	{
		let (result, signal) = mutation.stage();
		self.signals.push(signal);
		result
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;

	fn recording(log: &Rc<RefCell<Vec<&'static str>>>, perform: &'static str, signal: &'static str) -> Mutation<()> {
		let log_perform = log.clone();
		let log_signal = log.clone();
		Mutation::new(move || {
			log_perform.borrow_mut().push(perform);
			let signal_fn = Box::new(move || log_signal.borrow_mut().push(signal)) as Box<dyn FnOnce()>;
			((), signal_fn)
		})
	}

	#[test]
	fn commit_runs_perform_then_signal() {
		let log = Rc::new(RefCell::new(Vec::new()));
		recording(&log, "perform", "signal").commit();
		assert_eq!(*log.borrow(), vec!["perform", "signal"]);
	}

	#[test]
	fn then_orders_all_performs_before_any_signal() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let first = recording(&log, "p1", "s1");
		let second = recording(&log, "p2", "s2");
		first.then(second).commit();
		assert_eq!(*log.borrow(), vec!["p1", "p2", "s1", "s2"]);
	}

	#[test]
	fn chain_receives_the_perform_result() {
		let seen = Rc::new(RefCell::new(None));
		let observed = seen.clone();
		let produce = Mutation::new(|| (7, Box::new(|| {}) as Box<dyn FnOnce()>));
		let result = produce
			.chain(move |value| {
				*observed.borrow_mut() = Some(value);
				Mutation::noop(value * 2)
			})
			.commit();
		assert_eq!(*seen.borrow(), Some(7));
		assert_eq!(result, 14);
	}

	#[test]
	fn map_changes_only_the_result() {
		let result = Mutation::noop(2).map(|value| value + 1).commit();
		assert_eq!(result, 3);
	}

	#[test]
	fn all_reduces_in_order_and_tolerates_empty_input() {
		let log = Rc::new(RefCell::new(Vec::new()));
		all(vec![
			recording(&log, "p1", "s1"),
			recording(&log, "p2", "s2"),
			recording(&log, "p3", "s3"),
		])
		.commit();
		assert_eq!(*log.borrow(), vec!["p1", "p2", "p3", "s1", "s2", "s3"]);
		all(Vec::new()).commit();
	}

	#[test]
	fn batch_queues_signals_behind_the_builder() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let first = recording(&log, "p1", "s1");
		let second = recording(&log, "p2", "s2");
		let marker = log.clone();
		batch(move |transaction| {
			transaction.push(first);
			transaction.push(second);
			marker.borrow_mut().push("builder done");
		})
		.commit();
		assert_eq!(*log.borrow(), vec!["p1", "p2", "builder done", "s1", "s2"]);
	}

	#[test]
	fn dropping_without_commit_has_no_effect() {
		let log = Rc::new(RefCell::new(Vec::new()));
		drop(recording(&log, "perform", "signal"));
		assert!(log.borrow().is_empty());
	}

	#[test]
	#[should_panic(expected = "mutation already consumed")]
	fn perform_twice_panics() {
		let mut mutation = Mutation::noop(());
		mutation.perform();
		mutation.perform();
	}

	#[test]
	#[should_panic(expected = "mutation already consumed")]
	fn signal_before_perform_panics() {
		let mut mutation = Mutation::noop(());
		mutation.signal();
	}

	#[test]
	#[should_panic(expected = "mutation already consumed")]
	fn signal_twice_panics() {
		let mut mutation = Mutation::noop(());
		mutation.perform();
		mutation.signal();
		mutation.signal();
	}
}
