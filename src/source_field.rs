use crate::derived::Derived;
use crate::evaluation::Evaluation;
use crate::field::Field;
use crate::listeners::Subscription;
use crate::mutation::Mutation;
use crate::value::Value;
use crate::Listener;

/// The state of a [`SourceField`]: a value of its own, or another watchable
/// to mirror. Direct states compare by value, source states by watchable
/// identity, mixed states never compare equal.
pub enum Src<T> {
	Direct(T),
	Source(Value<T>),
}

impl<T> Clone for Src<T>
where
	T: Clone,
{
	fn clone(&self) -> Self {
		match self {
			Src::Direct(value) => Src::Direct(value.clone()),
			Src::Source(source) => Src::Source(source.clone()),
		}
	}
}

impl<T> PartialEq for Src<T>
where
	T: PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Src::Direct(a), Src::Direct(b)) => a == b,
			(Src::Source(a), Src::Source(b)) => a.ptr_eq(b),
			_ => false,
		}
	}
}

/// A field that either holds a direct value or mirrors another watchable,
/// re-pointable at runtime. Writes and re-points are ordinary mutations on
/// the inner state field; the outer derived value dereferences the state and,
/// while mirroring, tracks the mirrored source as a second dependency.
pub struct SourceField<T> {
	state: Field<Src<T>>,
	derived: Derived<T>,
}

impl<T> Clone for SourceField<T> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
			derived: self.derived.clone(),
		}
	}
}

impl<T> SourceField<T>
where
	T: Clone + PartialEq + 'static,
{
	pub fn new(value: T) -> Self {
		Self::with_state(Src::Direct(value))
	}

	pub fn mirroring(source: Value<T>) -> Self {
		Self::with_state(Src::Source(source))
	}

	fn with_state(state: Src<T>) -> Self {
		let field = Field::new(state);
		let inner = field.clone();
		let derived = Derived::new(Box::new(move |eval, _| match inner.get(eval) {
			Src::Direct(value) => value,
			Src::Source(source) => source.get(eval),
		}));
		SourceField {
			state: field,
			derived,
		}
	}

	/// Stage a switch to a direct value.
	pub fn set(&self, value: T) -> Mutation<()> {
		self.state.set(Src::Direct(value))
	}

	/// Stage a switch to mirroring `source`. Re-pointing at the watchable
	/// already mirrored is a no-op.
	pub fn set_source(&self, source: Value<T>) -> Mutation<()> {
		self.state.set(Src::Source(source))
	}

	pub fn get(&self, eval: &Evaluation) -> T {
		self.derived.get(eval)
	}

	#[inline]
	pub fn get_once(&self) -> T {
		self.derived.get_once()
	}

	pub fn subscribe_dirty(&self, listener: &Listener) -> Subscription {
		self.derived.subscribe_dirty(listener)
	}

	pub fn subscribe_change(&self, listener: &Listener) -> Subscription {
		self.derived.subscribe_change(listener)
	}
}

impl<T> From<SourceField<T>> for Value<T>
where
	T: Clone + PartialEq + 'static,
{
	fn from(field: SourceField<T>) -> Self {
		field.derived.into()
	}
}
