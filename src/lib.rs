//! meshforge - branding and packaging pipeline for custom MeshAgent builds
//!
//! This crate resolves a hierarchical branding/network/persistence/provisioning
//! configuration, validates it against a compliance rule set, and generates the
//! artifact set consumed by the downstream packaging step. A side subsystem
//! synthesizes and validates textual branding patches against an upstream
//! MeshAgent source tree.

pub mod compliance;
pub mod config;
pub mod generate;
pub mod package;
pub mod patch;
pub mod pipeline;

pub use compliance::{RuleKind, Violation};
pub use config::{ConfigError, FlatConfig};
pub use generate::{Artifact, GenerateError};
pub use package::{PackageError, PackageOptions};
pub use patch::{PatchError, SynthesisOptions, SynthesisOutcome, ValidateMode};
pub use pipeline::{PipelineError, PipelineResult};
