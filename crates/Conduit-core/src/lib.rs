//! # Conduit Core Library
//!
//! The component spec model for pipelines (headless): data types, the
//! rewrites the editor applies to them, referential validation, and the
//! resolution/persistence seams used to hydrate and store specs.
//!

pub mod annotations;
pub mod error;
pub mod naming;
pub mod resolver;
pub mod rewrite;
pub mod spec;
pub mod store;
pub mod subgraph;
pub mod validation;

pub use error::{SpecError, SpecResult};
pub use spec::{
    ArgumentSource, ArgumentType, ComponentReference, ComponentSpec, GraphSpec, ImplementationType,
    InputSpec, OutputSpec, TaskSpec,
};
