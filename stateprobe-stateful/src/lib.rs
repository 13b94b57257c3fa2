//! # Stateprobe Stateful
//!
//! Model-based stateful property testing: describe a system as a registry of
//! rules over a reference model, point the engine at the real thing through a
//! subject adapter, and let it search for short sequences of operations on
//! which the two disagree.
//!
//! ## Features
//!
//! - **Rule registry**: named, weighted rules with preconditions and typed,
//!   generated arguments
//! - **Model/subject comparison**: every step's outcome is predicted by the
//!   model and compared with what the subject reports
//! - **Invariants**: checked on the initial state and after every step, over
//!   the model alone or against a snapshot observed from the subject
//! - **Shrinking**: failing sequences are minimized by chunk deletion, step
//!   deletion and argument shrinking while preserving the failure class
//! - **Campaigns**: seeded, reproducible runs of many sequences, sequential or
//!   parallel, with serializable failure records
//! - **Subject timeouts**: slow subjects are called on a worker thread and
//!   reported as unavailable when they miss the deadline
//!
//! ## Quick Example
//!
//! ```rust
//! use stateprobe_stateful::prelude::*;
//!
//! // A counter whose decrement misreports at zero
//! let machine = counter_machine().unwrap();
//! let config = CampaignConfig::default().seed(42);
//! let campaign = Campaign::new(machine, || CounterSubject::new(Flaw::LeakyDecrement), config).unwrap();
//!
//! let report = campaign.run().unwrap();
//! let record = report.first_failure().unwrap();
//!
//! // Shrunk to the single step that exposes the bug
//! assert_eq!(record.sequence.to_string(), "[decrement]");
//! assert_eq!(record.checkpoint, 1);
//! ```

pub mod campaign;
pub mod counter;
pub mod dsl;
pub mod error;
pub mod failure;
pub mod invariants;
pub mod model;
pub mod operations;
pub mod outcome;
pub mod runner;

/// Re-exports for convenient imports
pub mod prelude {
    pub use crate::campaign::*;
    pub use crate::counter::*;
    pub use crate::dsl::*;
    pub use crate::error::*;
    pub use crate::failure::*;
    pub use crate::invariants::*;
    pub use crate::model::*;
    pub use crate::operations::*;
    pub use crate::outcome::*;
    pub use crate::runner::*;
    pub use stateprobe::{
        BoolGenerator, CampaignConfig, ConfigError, Generator, GeneratorConfig, IntGenerator, OneOfGenerator,
        Value, ValueGenerator, ValueKind,
    };
}
