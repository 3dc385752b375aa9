//! Runtime value model shared by the VM and the reference evaluator.
pub mod error;
pub mod value;

pub use error::RuntimeError;
pub use value::{Value, Variables};
