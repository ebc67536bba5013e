//! CLI commands for the order-flow validator.

pub mod run;
pub mod synthesize;

pub use run::{run_validator, RunArgs};
pub use synthesize::{run_synthesize, SynthesizeArgs};
