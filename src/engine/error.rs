use platelog_core::ModelError;
use uuid::Uuid;

use crate::mirror::MirrorError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mirror store error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Invalid entry: {0}")]
    InvalidEntry(#[from] ModelError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("Dish {id} has no ingredients left to restore")]
    DishRestore { id: Uuid },
}

impl EngineError {
    pub(crate) fn not_found(kind: &'static str, id: Uuid) -> Self {
        EngineError::NotFound { kind, id }
    }
}
