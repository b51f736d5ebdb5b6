use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dish::Dish;
use super::food::{FoodRecord, DEFAULT_SERVING_SIZE, DEFAULT_SERVING_UNIT};
use super::macros::Macros;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Food,
    Dish,
}

/// Denormalized snapshot rendered by the "recent items" list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirrorEntry {
    pub id: Uuid,
    pub kind: EntryKind,
    pub name: String,
    pub macros: Macros,
    pub serving_size: f64,
    pub serving_unit: String,
    pub created_at: DateTime<Utc>,
    pub is_favorite: bool,
    pub has_image: bool,
    pub is_ingredient: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredient_names: Vec<String>,
}

impl From<&FoodRecord> for MirrorEntry {
    fn from(food: &FoodRecord) -> Self {
        Self {
            id: food.id,
            kind: EntryKind::Food,
            name: food.name.clone(),
            macros: food.macros,
            serving_size: food.serving_size,
            serving_unit: food.serving_unit.clone(),
            created_at: food.created_at,
            is_favorite: food.is_favorite,
            has_image: food.has_image(),
            is_ingredient: food.is_ingredient,
            ingredient_names: food.ingredients.iter().map(|i| i.name.clone()).collect(),
        }
    }
}

impl From<&Dish> for MirrorEntry {
    fn from(dish: &Dish) -> Self {
        Self {
            id: dish.id,
            kind: EntryKind::Dish,
            name: dish.name.clone(),
            macros: dish.totals,
            serving_size: DEFAULT_SERVING_SIZE,
            serving_unit: DEFAULT_SERVING_UNIT.to_string(),
            created_at: dish.created_at,
            is_favorite: false,
            has_image: dish.has_image(),
            is_ingredient: false,
            ingredient_names: dish.ingredients.iter().map(|i| i.name.clone()).collect(),
        }
    }
}
