use thiserror::Error;

/// Errors raised while validating model values handed in by collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid {field} value: {value} (must be a finite, non-negative number)")]
    InvalidMacro { field: &'static str, value: f64 },

    #[error("Entry name must not be empty")]
    EmptyName,

    #[error("A dish needs at least one ingredient")]
    NoIngredients,
}
