//! Backend module for instrument attribute I/O
//!
//! This module is the only place where the engine touches instruments. Each
//! swept variable and measured response is an [`Attribute`], looked up by
//! name in an [`AttributeRegistry`]. An [`IoCoordinator`] applies batches of
//! settings and collects readings, either inline or through one worker
//! thread per attribute.
//!
//! # Components
//!
//! - [`Attribute`] / [`Instrument`] - The instrument-facing traits
//! - [`AttributeRegistry`] - Name to attribute lookup, resolved once per run
//! - [`IoCoordinator`] - Batch set/get with skip-if-unchanged logic
//! - [`InlineCoordinator`] - Sequential calls on the measurement thread
//! - [`WorkerPool`] - Persistent per-attribute worker threads
//! - [`SimulatedAttribute`] - Fake channels for tests and demos
//!
//! # Example
//!
//! ```
//! use labsweep::backend::{AttributeRegistry, IoCoordinator, IoMode, SimulatedAttribute};
//! use labsweep::sweep::SweepSpec;
//!
//! let spec = SweepSpec::new(vec!["x".into()], vec![vec![1.0, 2.0]], vec![], 2).unwrap();
//! let registry = AttributeRegistry::new().with("x", SimulatedAttribute::recorder());
//!
//! let mut io = IoCoordinator::new(IoMode::Inline, &spec, &["x".into()], &registry, None).unwrap();
//! io.set_variables(&[vec![1.0], vec![2.0]]).unwrap();
//! assert_eq!(io.get_responses(2).unwrap(), vec![vec![1.0, 2.0]]);
//! ```

pub mod attribute;
pub mod coordinator;
pub mod inline;
pub mod simulated;
pub mod worker;

pub use attribute::{
    Attribute, AttributeRegistry, FnAttribute, Instrument, SharedAttribute, StoredAttribute,
};
pub use coordinator::{assemble_responses, IoCoordinator, IoMode, SkipTracker};
pub use inline::InlineCoordinator;
pub use simulated::{SimulatedAttribute, SimulatedPattern};
pub use worker::{WorkerPool, WorkerReply, WorkerRequest};
