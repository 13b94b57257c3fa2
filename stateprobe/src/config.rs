//! Configuration types for controlling campaigns and generation parameters.

use std::time::Duration;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid number of examples (must be > 0)
    #[error("invalid max_examples: {0} (must be > 0)")]
    InvalidExamples(usize),
    /// Invalid step budget (must be > 0)
    #[error("invalid max_steps_per_sequence: {0} (must be > 0)")]
    InvalidSteps(usize),
    /// Invalid shrink budget (must be > 0)
    #[error("invalid shrink_budget: {0} (must be > 0)")]
    InvalidShrinkBudget(usize),
    /// Invalid subject timeout (must be > 0)
    #[error("invalid subject_timeout (must be > 0)")]
    InvalidTimeout,
    /// Invalid size hint (must be > 0)
    #[error("invalid size_hint: {0} (must be > 0)")]
    InvalidSizeHint(usize),
    /// Invalid worker count (must be > 0)
    #[error("invalid worker count: {0} (must be > 0)")]
    InvalidWorkers(usize),
    /// A generator was given an empty integer range
    #[error("invalid range: min {min} is greater than max {max}")]
    InvalidRange { min: String, max: String },
    /// A choice generator was given nothing to choose from
    #[error("choice generator needs at least one value")]
    EmptyChoices,
    /// An environment override could not be parsed
    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Configuration for generators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Hint for the magnitude of generated values
    pub size_hint: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { size_hint: 100 }
    }
}

impl GeneratorConfig {
    /// Create a new generator configuration with validation
    pub fn new(size_hint: usize) -> Result<Self, ConfigError> {
        let config = Self { size_hint };
        config.validate()?;
        Ok(config)
    }

    /// Set the size hint
    pub fn with_size_hint(mut self, size_hint: usize) -> Self {
        self.size_hint = size_hint;
        self
    }

    /// Validate the generator configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size_hint == 0 {
            return Err(ConfigError::InvalidSizeHint(self.size_hint));
        }
        Ok(())
    }
}

/// Environment variable overriding [`CampaignConfig::seed`]
pub const ENV_SEED: &str = "STATEPROBE_SEED";
/// Environment variable overriding [`CampaignConfig::max_examples`]
pub const ENV_MAX_EXAMPLES: &str = "STATEPROBE_MAX_EXAMPLES";
/// Environment variable overriding [`CampaignConfig::max_steps_per_sequence`]
pub const ENV_MAX_STEPS: &str = "STATEPROBE_MAX_STEPS";
/// Environment variable overriding [`CampaignConfig::shrink_budget`]
pub const ENV_SHRINK_BUDGET: &str = "STATEPROBE_SHRINK_BUDGET";

/// Configuration for a campaign of independent sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignConfig {
    /// Number of independent sequences (examples) to try
    pub max_examples: usize,
    /// Step budget of every sequence
    pub max_steps_per_sequence: usize,
    /// Root seed; a fresh one is drawn from OS entropy when absent
    pub seed: Option<u64>,
    /// Stop at the first failure instead of collecting all of them
    pub fail_fast: bool,
    /// Maximum number of replays the shrinker may perform per failure
    pub shrink_budget: usize,
    /// Per-call deadline for the subject; `None` calls it inline
    pub subject_timeout: Option<Duration>,
    /// Generator settings; `size_hint` is the ceiling reached by the last example
    pub generator_config: GeneratorConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            max_examples: 100,
            max_steps_per_sequence: 50,
            seed: None,
            fail_fast: true,
            shrink_budget: 1000,
            subject_timeout: None,
            generator_config: GeneratorConfig::default(),
        }
    }
}

impl CampaignConfig {
    /// Defaults with overrides read from the `STATEPROBE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(seed) = parse_var(&lookup, ENV_SEED)? {
            self.seed = Some(seed);
        }
        if let Some(n) = parse_var(&lookup, ENV_MAX_EXAMPLES)? {
            self.max_examples = n;
        }
        if let Some(n) = parse_var(&lookup, ENV_MAX_STEPS)? {
            self.max_steps_per_sequence = n;
        }
        if let Some(n) = parse_var(&lookup, ENV_SHRINK_BUDGET)? {
            self.shrink_budget = n;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn max_examples(mut self, max_examples: usize) -> Self {
        self.max_examples = max_examples;
        self
    }

    pub fn max_steps_per_sequence(mut self, max_steps: usize) -> Self {
        self.max_steps_per_sequence = max_steps;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn shrink_budget(mut self, budget: usize) -> Self {
        self.shrink_budget = budget;
        self
    }

    pub fn subject_timeout(mut self, timeout: Duration) -> Self {
        self.subject_timeout = Some(timeout);
        self
    }

    pub fn generator_config(mut self, generator_config: GeneratorConfig) -> Self {
        self.generator_config = generator_config;
        self
    }

    /// Size hint for the `example`-th sequence: grows linearly from 1 to the
    /// configured ceiling over the campaign.
    pub fn size_hint_for(&self, example: usize) -> usize {
        let ceiling = self.generator_config.size_hint.max(1);
        let examples = self.max_examples.max(1);
        (1 + example.saturating_mul(ceiling) / examples).min(ceiling)
    }

    /// Validate the campaign configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_examples == 0 {
            return Err(ConfigError::InvalidExamples(self.max_examples));
        }
        if self.max_steps_per_sequence == 0 {
            return Err(ConfigError::InvalidSteps(self.max_steps_per_sequence));
        }
        if self.shrink_budget == 0 {
            return Err(ConfigError::InvalidShrinkBudget(self.shrink_budget));
        }
        if self.subject_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidTimeout);
        }
        self.generator_config.validate()?;
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::InvalidEnv { var, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_validation_rejects_zero_budgets() {
        assert_eq!(
            CampaignConfig::default().max_examples(0).validate(),
            Err(ConfigError::InvalidExamples(0))
        );
        assert_eq!(
            CampaignConfig::default().max_steps_per_sequence(0).validate(),
            Err(ConfigError::InvalidSteps(0))
        );
        assert_eq!(
            CampaignConfig::default().shrink_budget(0).validate(),
            Err(ConfigError::InvalidShrinkBudget(0))
        );
        assert_eq!(
            CampaignConfig::default()
                .subject_timeout(Duration::ZERO)
                .validate(),
            Err(ConfigError::InvalidTimeout)
        );
        assert_eq!(GeneratorConfig::new(0), Err(ConfigError::InvalidSizeHint(0)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_SEED, "1234"),
            (ENV_MAX_EXAMPLES, " 7 "),
            (ENV_SHRINK_BUDGET, "20"),
        ]
        .into_iter()
        .collect();

        let config = CampaignConfig::default()
            .with_overrides(|var| vars.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.seed, Some(1234));
        assert_eq!(config.max_examples, 7);
        assert_eq!(config.max_steps_per_sequence, 50);
        assert_eq!(config.shrink_budget, 20);
    }

    #[test]
    fn test_env_override_errors() {
        let err = CampaignConfig::default()
            .with_overrides(|var| (var == ENV_SEED).then(|| "not-a-number".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: ENV_SEED,
                value: "not-a-number".to_string()
            }
        );

        let err = CampaignConfig::default()
            .with_overrides(|var| (var == ENV_MAX_STEPS).then(|| "0".to_string()))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidSteps(0));
    }

    #[test]
    fn test_size_hint_grows_over_campaign() {
        let config = CampaignConfig::default()
            .max_examples(10)
            .generator_config(GeneratorConfig::default().with_size_hint(100));
        assert_eq!(config.size_hint_for(0), 1);
        assert_eq!(config.size_hint_for(5), 51);
        assert_eq!(config.size_hint_for(9), 91);
        assert_eq!(config.size_hint_for(50), 100);
    }
}
