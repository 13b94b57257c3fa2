//! Rules: named, weighted and optionally guarded transitions with typed arguments

use rand::RngCore;
use stateprobe::{Generator, GeneratorConfig, ProducesKind, Value, ValueKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::weighted::WeightedIndex;
use crate::error::EngineError;
use crate::model::Model;
use crate::outcome::Outcome;

type Precondition<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;
type Effect<M> =
    Arc<dyn Fn(&mut M, &Args<'_>) -> Result<Outcome<<M as Model>::Reason>, EngineError> + Send + Sync>;
type ArgGenerator = Arc<dyn Generator<Value> + Send + Sync>;

/// Declared argument of a rule: its name, kind and generator
#[derive(Clone)]
pub struct ArgSpec {
    name: String,
    kind: ValueKind,
    generator: ArgGenerator,
}

impl ArgSpec {
    /// Argument backed by a generator whose value kind is known statically
    pub fn new<G>(name: impl Into<String>, generator: G) -> Self
    where
        G: Generator<Value> + ProducesKind + Send + Sync + 'static,
    {
        let kind = generator.kind();
        Self::with_kind(name, kind, generator)
    }

    /// Argument backed by any value generator; `kind` is checked on every draw
    pub fn with_kind<G>(name: impl Into<String>, kind: ValueKind, generator: G) -> Self
    where
        G: Generator<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            generator: Arc::new(generator),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl fmt::Debug for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Typed view over the arguments of one step, handed to rule effects
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    rule: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(rule: &'a str, values: &'a [Value]) -> Self {
        Self { rule, values }
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    pub fn int(&self, index: usize) -> Result<i64, EngineError> {
        self.typed(index, ValueKind::Int, Value::as_int)
    }

    pub fn bool(&self, index: usize) -> Result<bool, EngineError> {
        self.typed(index, ValueKind::Bool, Value::as_bool)
    }

    pub fn text(&self, index: usize) -> Result<&'a str, EngineError> {
        self.typed(index, ValueKind::Text, Value::as_text)
    }

    fn typed<T>(
        &self,
        index: usize,
        kind: ValueKind,
        read: impl Fn(&'a Value) -> Option<T>,
    ) -> Result<T, EngineError> {
        match self.values.get(index) {
            Some(value) => read(value)
                .ok_or_else(|| EngineError::wrong_kind(self.rule, index, kind, Some(value.kind()))),
            None => Err(EngineError::wrong_kind(self.rule, index, kind, None)),
        }
    }
}

/// A named transition of the reference model
///
/// The effect receives a scratch copy of the model: it may update it and
/// returns the outcome the subject is expected to report. An effect that
/// predicts a domain error should leave the model as it was.
pub struct Rule<M: Model> {
    name: String,
    args: Vec<ArgSpec>,
    precondition: Option<Precondition<M>>,
    effect: Effect<M>,
    weight: u32,
}

impl<M: Model> Rule<M> {
    pub fn new<F>(name: impl Into<String>, effect: F) -> Self
    where
        F: Fn(&mut M, &Args<'_>) -> Result<Outcome<M::Reason>, EngineError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            args: Vec::new(),
            precondition: None,
            effect: Arc::new(effect),
            weight: 1,
        }
    }

    /// Declare the next argument, drawn from `generator`
    pub fn arg<G>(self, name: impl Into<String>, generator: G) -> Self
    where
        G: Generator<Value> + ProducesKind + Send + Sync + 'static,
    {
        self.arg_spec(ArgSpec::new(name, generator))
    }

    pub fn arg_spec(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    /// Guard deciding whether the rule may be drawn in a given model state
    pub fn precondition<P>(mut self, precondition: P) -> Self
    where
        P: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.precondition = Some(Arc::new(precondition));
        self
    }

    /// Relative draw weight (default 1)
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg_specs(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is_eligible(&self, model: &M) -> bool {
        self.precondition.as_ref().is_none_or(|pre| pre(model))
    }

    /// Draw one value per declared argument
    pub fn draw_args(&self, rng: &mut dyn RngCore, config: &GeneratorConfig) -> Result<Vec<Value>, EngineError> {
        let values: Vec<Value> = self
            .args
            .iter()
            .map(|spec| spec.generator.generate(rng, config))
            .collect();
        self.check_args(&values)?;
        Ok(values)
    }

    /// Arity and kinds must match the declaration
    pub fn check_args(&self, values: &[Value]) -> Result<(), EngineError> {
        if values.len() != self.args.len() {
            return Err(EngineError::MalformedArguments {
                rule: self.name.clone(),
                detail: format!("expected {} argument(s), got {}", self.args.len(), values.len()),
            });
        }
        for (index, (spec, value)) in self.args.iter().zip(values).enumerate() {
            if value.kind() != spec.kind {
                return Err(EngineError::wrong_kind(&self.name, index, spec.kind, Some(value.kind())));
            }
        }
        Ok(())
    }

    /// Run the effect against `model`, returning the predicted outcome
    pub fn apply(&self, model: &mut M, values: &[Value]) -> Result<Outcome<M::Reason>, EngineError> {
        (self.effect)(model, &Args::new(&self.name, values))
    }

    /// Shrink candidates for the `index`-th argument
    pub fn shrink_arg(&self, index: usize, value: &Value) -> Box<dyn Iterator<Item = Value>> {
        match self.args.get(index) {
            Some(spec) => spec.generator.shrink(value),
            None => Box::new(std::iter::empty()),
        }
    }
}

impl<M: Model> Clone for Rule<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            args: self.args.clone(),
            precondition: self.precondition.clone(),
            effect: Arc::clone(&self.effect),
            weight: self.weight,
        }
    }
}

impl<M: Model> fmt::Debug for Rule<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("guarded", &self.precondition.is_some())
            .field("weight", &self.weight)
            .finish()
    }
}

/// Rules by name, in registration order
pub struct RuleRegistry<M: Model> {
    rules: Vec<Rule<M>>,
    index: HashMap<String, usize>,
}

impl<M: Model> RuleRegistry<M> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn register(&mut self, rule: Rule<M>) -> Result<(), EngineError> {
        if self.index.contains_key(rule.name()) {
            return Err(EngineError::DuplicateRule(rule.name().to_string()));
        }
        self.index.insert(rule.name().to_string(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Rule<M>> {
        self.index.get(name).map(|&idx| &self.rules[idx])
    }

    pub fn rules(&self) -> &[Rule<M>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose precondition holds, in registration order
    pub fn eligible(&self, model: &M) -> Vec<&Rule<M>> {
        self.rules.iter().filter(|rule| rule.is_eligible(model)).collect()
    }

    /// Weighted draw among the eligible rules; `None` when nothing is eligible
    pub fn choose(&self, model: &M, rng: &mut dyn RngCore) -> Option<&Rule<M>> {
        let eligible = self.eligible(model);
        let weights = WeightedIndex::new(eligible.iter().map(|rule| rule.weight()).collect());
        weights.sample(rng).map(|idx| eligible[idx])
    }
}

impl<M: Model> Default for RuleRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Clone for RuleRegistry<M> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            index: self.index.clone(),
        }
    }
}

impl<M: Model> fmt::Debug for RuleRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.rules).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde::{Deserialize, Serialize};
    use stateprobe::{BoolGenerator, IntGenerator, ValueGenerator};

    #[derive(Debug, Clone, Default)]
    struct Stack {
        items: Vec<i64>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    enum StackError {
        Empty,
    }

    impl Model for Stack {
        type Reason = StackError;
        type Snapshot = Vec<i64>;
    }

    fn push() -> Rule<Stack> {
        Rule::new("push", |stack: &mut Stack, args: &Args<'_>| {
            stack.items.push(args.int(0)?);
            Ok(Outcome::ok())
        })
        .arg("item", ValueGenerator::new(IntGenerator::new(0i64, 9).unwrap()))
    }

    fn pop() -> Rule<Stack> {
        Rule::new("pop", |stack: &mut Stack, _args: &Args<'_>| {
            Ok(match stack.items.pop() {
                Some(top) => Outcome::success(top),
                None => Outcome::failure(StackError::Empty),
            })
        })
        .precondition(|stack: &Stack| !stack.items.is_empty())
        .with_weight(3)
    }

    fn registry() -> RuleRegistry<Stack> {
        let mut registry = RuleRegistry::new();
        registry.register(push()).unwrap();
        registry.register(pop()).unwrap();
        registry
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let mut registry = registry();
        assert_eq!(
            registry.register(push()),
            Err(EngineError::DuplicateRule("push".to_string()))
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_eligibility_follows_precondition() {
        let registry = registry();
        let empty = Stack::default();
        let names: Vec<&str> = registry.eligible(&empty).iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["push"]);

        let full = Stack { items: vec![1] };
        assert_eq!(registry.eligible(&full).len(), 2);
    }

    #[test]
    fn test_choose_only_draws_eligible() {
        let registry = registry();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let rule = registry.choose(&Stack::default(), &mut rng).unwrap();
            assert_eq!(rule.name(), "push");
        }
    }

    #[test]
    fn test_draw_and_apply() {
        let registry = registry();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let push = registry.get("push").unwrap();
        let args = push.draw_args(&mut rng, &GeneratorConfig::default()).unwrap();
        assert_eq!(args.len(), 1);
        let n = args[0].as_int().unwrap();
        assert!((0..=9).contains(&n));

        let mut stack = Stack::default();
        assert_eq!(push.apply(&mut stack, &args), Ok(Outcome::ok()));
        let pop = registry.get("pop").unwrap();
        assert_eq!(pop.apply(&mut stack, &[]), Ok(Outcome::success(n)));
        assert_eq!(pop.apply(&mut stack, &[]), Ok(Outcome::failure(StackError::Empty)));
    }

    #[test]
    fn test_malformed_arguments() {
        let push = push();
        assert!(matches!(
            push.check_args(&[]),
            Err(EngineError::MalformedArguments { .. })
        ));
        assert_eq!(
            push.check_args(&[Value::Bool(true)]),
            Err(EngineError::wrong_kind("push", 0, ValueKind::Int, Some(ValueKind::Bool)))
        );

        // A generator that lies about its kind is caught at draw time
        let lying = Rule::<Stack>::new("lying", |_, _| Ok(Outcome::ok())).arg_spec(ArgSpec::with_kind(
            "flag",
            ValueKind::Int,
            ValueGenerator::new(BoolGenerator),
        ));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(lying.draw_args(&mut rng, &GeneratorConfig::default()).is_err());
    }

    #[test]
    fn test_args_accessors() {
        let values = vec![Value::Int(4), Value::from("x")];
        let args = Args::new("put", &values);
        assert_eq!(args.int(0), Ok(4));
        assert_eq!(args.text(1), Ok("x"));
        assert!(args.bool(0).is_err());
        assert!(args.int(2).is_err());
    }

    #[test]
    fn test_shrink_arg_uses_generator() {
        let push = push();
        let candidates: Vec<Value> = push.shrink_arg(0, &Value::Int(8)).collect();
        assert_eq!(candidates.first(), Some(&Value::Int(0)));
        assert!(push.shrink_arg(3, &Value::Int(8)).next().is_none());
    }
}
