//! Platelog Core Library
//!
//! Nutrition entry models, the dish aggregator and the data contracts
//! exchanged with recognizers and the presentation layer.

pub mod aggregate;
pub mod error;
pub mod events;
pub mod models;

pub use error::ModelError;
pub use events::{ChangeEvent, LifecycleEvent};
pub use models::{
    Dish, DishIngredient, EntryKind, EntrySource, FoodDraft, FoodRecord, IngredientLine, Macros,
    Meal, MealFood, MealType, MirrorEntry, RecognizedEntry,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
