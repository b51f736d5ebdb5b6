mod dish;
mod food;
mod ingredient;
mod macros;
mod meal;
mod meal_type;
mod mirror_entry;
mod recognized;

pub use dish::{Dish, DishIngredient};
pub use food::{EntrySource, FoodDraft, FoodRecord, DEFAULT_SERVING_SIZE, DEFAULT_SERVING_UNIT};
pub use ingredient::IngredientLine;
pub use macros::Macros;
pub use meal::{Meal, MealFood};
pub use meal_type::MealType;
pub use mirror_entry::{EntryKind, MirrorEntry};
pub use recognized::RecognizedEntry;
