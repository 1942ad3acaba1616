//! TIDE Core - Temporal Datalog forward-chaining reasoner
//!
//! Given ground facts annotated with discrete validity intervals and Horn
//! rules carrying a lookback delay and an optional head-offset window, TIDE
//! computes the least fixed point of derivable facts across a bounded
//! timeline, tracks per-fact provenance sufficient to reconstruct
//! derivation trees, and supports streaming ingestion that propagates only
//! each new fact's consequences.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod datalog;
pub mod error;
pub mod facts;
pub mod parser;
pub mod types;

pub use datalog::types::{Atom, Literal, Rule, Substitution, Term};
pub use datalog::{
    DerivationInfo, DerivationTree, EvaluationStats, IncrementalReasoner, NaiveReasoner,
    OptimizedReasoner, ProvenanceTracker, ReasonerConfig, ReasonerResult, StreamingReasoner,
};
pub use error::{Result, TideError};
pub use facts::{SparseStore, TimedFact};
pub use parser::{load_facts_csv, parse_atom, parse_literal, parse_rule, parse_rules};
pub use types::{Interval, TimePoint};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
