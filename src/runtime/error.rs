use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Operation '{operation}' is not supported for types {left} and {right}")]
    UnsupportedOperation {
        operation: &'static str,
        left: &'static str,
        right: &'static str,
    },
}
