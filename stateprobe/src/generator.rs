//! Core generator infrastructure.

use std::fmt;
use std::marker::PhantomData;

use crate::config::{ConfigError, GeneratorConfig};
use crate::value::{Value, ValueKind};

/// Core generator trait for creating random test data
pub trait Generator<T> {
    /// Generate a random value of type T using the provided RNG and configuration
    fn generate(&self, rng: &mut dyn rand::RngCore, config: &GeneratorConfig) -> T;

    /// Create an iterator of shrunk values from the given value
    ///
    /// Every candidate must be strictly simpler than `value` under a
    /// well-founded order so that repeated shrinking terminates.
    fn shrink(&self, value: &T) -> Box<dyn Iterator<Item = T>>;
}

/// A simple generator that always produces the same value
#[derive(Debug, Clone)]
pub struct ConstantGenerator<T> {
    value: T,
}

impl<T: Clone> ConstantGenerator<T> {
    /// Create a new constant generator
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Clone + 'static> Generator<T> for ConstantGenerator<T> {
    fn generate(&self, _rng: &mut dyn rand::RngCore, _config: &GeneratorConfig) -> T {
        self.value.clone()
    }

    fn shrink(&self, _value: &T) -> Box<dyn Iterator<Item = T>> {
        // A constant value cannot be shrunk
        Box::new(std::iter::empty())
    }
}

/// A generator that chooses randomly from a collection of values
///
/// Earlier entries are considered simpler: a value shrinks to every entry that
/// precedes its first occurrence.
#[derive(Debug, Clone)]
pub struct OneOfGenerator<T> {
    values: Vec<T>,
}

impl<T: Clone + PartialEq> OneOfGenerator<T> {
    /// Create a new one-of generator
    pub fn new(values: Vec<T>) -> Result<Self, ConfigError> {
        if values.is_empty() {
            return Err(ConfigError::EmptyChoices);
        }
        Ok(Self { values })
    }
}

impl<T: Clone + PartialEq + 'static> Generator<T> for OneOfGenerator<T> {
    fn generate(&self, rng: &mut dyn rand::RngCore, _config: &GeneratorConfig) -> T {
        use rand::Rng;
        let index = rng.gen_range(0..self.values.len());
        self.values[index].clone()
    }

    fn shrink(&self, value: &T) -> Box<dyn Iterator<Item = T>> {
        let position = self
            .values
            .iter()
            .position(|candidate| candidate == value)
            .unwrap_or(0);
        let simpler: Vec<T> = self.values[..position]
            .iter()
            .filter(|candidate| *candidate != value)
            .cloned()
            .collect();
        Box::new(simpler.into_iter())
    }
}

/// Lifts a `Generator<T>` into the [`Value`] vocabulary.
///
/// Shrinking converts the value back to `T`; a value of the wrong kind simply
/// has no shrink candidates.
pub struct ValueGenerator<G, T> {
    inner: G,
    _phantom: PhantomData<fn() -> T>,
}

impl<G, T> ValueGenerator<G, T>
where
    G: Generator<T>,
    T: Into<Value> + TryFrom<Value> + 'static,
{
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            _phantom: PhantomData,
        }
    }

    /// Get a reference to the wrapped generator
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: Clone, T> Clone for ValueGenerator<G, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<G: fmt::Debug, T> fmt::Debug for ValueGenerator<G, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueGenerator")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<G, T> Generator<Value> for ValueGenerator<G, T>
where
    G: Generator<T>,
    T: Into<Value> + TryFrom<Value> + 'static,
{
    fn generate(&self, rng: &mut dyn rand::RngCore, config: &GeneratorConfig) -> Value {
        self.inner.generate(rng, config).into()
    }

    fn shrink(&self, value: &Value) -> Box<dyn Iterator<Item = Value>> {
        match T::try_from(value.clone()) {
            Ok(typed) => Box::new(self.inner.shrink(&typed).map(Into::into)),
            Err(_) => Box::new(std::iter::empty()),
        }
    }
}

/// The value kind a lifted generator produces, when it is known statically.
pub trait ProducesKind {
    fn kind(&self) -> ValueKind;
}

impl<G, T> ProducesKind for ValueGenerator<G, T>
where
    T: KindOf,
{
    fn kind(&self) -> ValueKind {
        T::KIND
    }
}

/// Static value kind of a Rust type that converts into [`Value`].
pub trait KindOf {
    const KIND: ValueKind;
}

macro_rules! impl_kind_of {
    ($kind:expr => $($t:ty),*) => {
        $(
            impl KindOf for $t {
                const KIND: ValueKind = $kind;
            }
        )*
    };
}

impl_kind_of!(ValueKind::Int => i8, i16, i32, i64, u8, u16, u32);
impl_kind_of!(ValueKind::Bool => bool);
impl_kind_of!(ValueKind::Text => String);
impl_kind_of!(ValueKind::Unit => ());
