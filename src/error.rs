//! Error types.
//!
//! Every pipeline stage returns [`AppError`], which carries the process exit
//! code alongside a human-readable message:
//!
//! - `2`: bad input (CLI values, unreadable or malformed files)
//! - `3`: not enough usable data to proceed
//! - `4`: numerical/computation failure (model evaluation, fitting, plotting)
//!
//! Model evaluation has its own [`ModelError`] so the shape code can stay free
//! of exit-code concerns; it converts into `AppError` at the pipeline boundary.

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures raised while evaluating a curve model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{model}: input x outside of defined range [{min}, {max}] 1/micron (got {value})")]
    OutOfRange {
        model: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{model}: center wavelength {name} must be non-zero")]
    ZeroCenter { model: &'static str, name: String },
    #[error("expected {expected} parameter values, got {got}")]
    ParameterCount { expected: usize, got: usize },
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        let code = match err {
            ModelError::UnknownParameter(_) => 2,
            _ => 4,
        };
        AppError::new(code, err.to_string())
    }
}
