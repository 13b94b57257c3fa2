//! # Stateprobe - value generation for model-based testing
//!
//! This crate holds the leaf layer of the stateprobe engine: the closed
//! [`Value`] vocabulary used for rule arguments and outcome payloads, the
//! [`Generator`] trait with its bounded primitive generators, seeded
//! randomness helpers, and the configuration types shared by campaigns.
//!
//! ## Quick Start
//!
//! ```rust
//! use stateprobe::{Generator, GeneratorConfig, IntGenerator, create_seeded_rng};
//!
//! let generator = IntGenerator::new(2i64, 1000).unwrap();
//! let mut rng = create_seeded_rng(7);
//! let config = GeneratorConfig::default();
//!
//! let value = generator.generate(&mut rng, &config);
//! assert!((2..=1000).contains(&value));
//!
//! // Shrink candidates move strictly toward the bound nearest zero.
//! assert_eq!(generator.shrink(&value).next(), if value == 2 { None } else { Some(2) });
//! ```

pub mod config;
pub mod generator;
pub mod primitives;
pub mod rng;
pub mod value;

pub use config::{CampaignConfig, ConfigError, GeneratorConfig};
pub use generator::{ConstantGenerator, Generator, KindOf, OneOfGenerator, ProducesKind, ValueGenerator};
pub use primitives::{BoolGenerator, IntGenerator};
pub use rng::{EngineRng, create_seeded_rng, derive_seed, fresh_seed};
pub use value::{Value, ValueError, ValueKind};
