use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::food::FoodRecord;
use super::macros::Macros;
use crate::aggregate;

/// A dish's reference to one ingredient record, carrying a snapshot of the
/// record's details so a missing record can be rebuilt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DishIngredient {
    pub food_id: Uuid,
    pub name: String,
    pub macros: Macros,
    pub created_at: DateTime<Utc>,
}

impl DishIngredient {
    pub fn snapshot(food: &FoodRecord) -> Self {
        Self {
            food_id: food.id,
            name: food.name.clone(),
            macros: food.macros,
            created_at: food.created_at,
        }
    }

    /// Rebuilds an ingredient record from the snapshot.
    pub fn reconstruct(&self) -> FoodRecord {
        let mut food = FoodRecord::new(self.name.clone(), self.macros).with_id(self.food_id);
        food.created_at = self.created_at;
        food.is_ingredient = true;
        food
    }
}

/// A composed entry owning an ordered set of ingredient records.
///
/// `totals` is a cache of the ingredient macros and is never authoritative;
/// every mutator below recomputes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dish {
    pub id: Uuid,
    pub name: String,
    pub original_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
    pub totals: Macros,
    pub ingredients: Vec<DishIngredient>,
}

impl Dish {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            original_name: None,
            created_at: Utc::now(),
            image: None,
            totals: Macros::default(),
            ingredients: Vec::new(),
        }
    }

    pub fn with_original_name(mut self, original_name: impl Into<String>) -> Self {
        self.original_name = Some(original_name.into());
        self
    }

    pub fn with_ingredients(mut self, ingredients: &[FoodRecord]) -> Self {
        self.ingredients = ingredients.iter().map(DishIngredient::snapshot).collect();
        aggregate::recompute(&mut self);
        self
    }

    pub fn ingredient_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.ingredients.iter().map(|i| i.food_id)
    }

    pub fn contains(&self, food_id: Uuid) -> bool {
        self.ingredients.iter().any(|i| i.food_id == food_id)
    }

    /// Adds (or refreshes) an ingredient. Returns false when the record was
    /// already present.
    pub fn add_ingredient(&mut self, food: &FoodRecord) -> bool {
        let snapshot = DishIngredient::snapshot(food);
        let added = match self.ingredients.iter_mut().find(|i| i.food_id == food.id) {
            Some(existing) => {
                *existing = snapshot;
                false
            }
            None => {
                self.ingredients.push(snapshot);
                true
            }
        };
        aggregate::recompute(self);
        added
    }

    /// Brings the snapshot of `food` up to date when the dish references it.
    /// Returns true when its name or macros changed.
    pub fn refresh_ingredient(&mut self, food: &FoodRecord) -> bool {
        let Some(existing) = self.ingredients.iter_mut().find(|i| i.food_id == food.id) else {
            return false;
        };
        if existing.name == food.name && existing.macros == food.macros {
            return false;
        }
        *existing = DishIngredient::snapshot(food);
        aggregate::recompute(self);
        true
    }

    pub fn remove_ingredient(&mut self, food_id: Uuid) -> bool {
        let before = self.ingredients.len();
        self.ingredients.retain(|i| i.food_id != food_id);
        aggregate::recompute(self);
        self.ingredients.len() != before
    }

    pub fn has_image(&self) -> bool {
        self.image.as_ref().is_some_and(|bytes| !bytes.is_empty())
    }
}

impl fmt::Display for Dish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len()))?;

        if let Some(original) = &self.original_name {
            writeln!(f, "Recognized as: {}", original)?;
        }
        writeln!(f, "Total: {}", self.totals)?;

        if !self.ingredients.is_empty() {
            writeln!(f, "\nIngredients:")?;
            for ingredient in &self.ingredients {
                writeln!(f, "  - {} ({} kcal)", ingredient.name, ingredient.macros.calories)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lettuce() -> FoodRecord {
        FoodRecord::new("Lettuce", Macros::new(15.0, 1.4, 2.9, 0.2))
    }

    fn tomato() -> FoodRecord {
        FoodRecord::new("Tomato", Macros::new(18.0, 0.9, 3.9, 0.2))
    }

    #[test]
    fn test_dish_with_ingredients_aggregates() {
        let dish = Dish::new("Salad").with_ingredients(&[lettuce(), tomato()]);
        assert_eq!(dish.ingredients.len(), 2);
        assert_eq!(dish.totals.calories, 33.0);
        assert!((dish.totals.protein - 2.3).abs() < 1e-9);
    }

    #[test]
    fn test_add_ingredient_refreshes_existing() {
        let mut tomato = tomato();
        let mut dish = Dish::new("Salad").with_ingredients(&[lettuce(), tomato.clone()]);

        tomato.macros.calories = 20.0;
        assert!(!dish.add_ingredient(&tomato));
        assert_eq!(dish.ingredients.len(), 2);
        assert_eq!(dish.totals.calories, 35.0);
    }

    #[test]
    fn test_refresh_ingredient_follows_record() {
        let mut tomato = tomato();
        let mut dish = Dish::new("Salad").with_ingredients(&[lettuce(), tomato.clone()]);

        assert!(!dish.refresh_ingredient(&tomato));
        assert!(!dish.refresh_ingredient(&FoodRecord::new("Onion", Macros::calories(40.0))));

        tomato.macros.calories = 30.0;
        assert!(dish.refresh_ingredient(&tomato));
        assert_eq!(dish.ingredients.len(), 2);
        assert_eq!(dish.totals.calories, 45.0);
    }

    #[test]
    fn test_remove_ingredient_recomputes() {
        let tomato = tomato();
        let mut dish = Dish::new("Salad").with_ingredients(&[lettuce(), tomato.clone()]);

        assert!(dish.remove_ingredient(tomato.id));
        assert!(!dish.remove_ingredient(tomato.id));
        assert_eq!(dish.totals.calories, 15.0);
        assert!(!dish.contains(tomato.id));
    }

    #[test]
    fn test_reconstruct_from_snapshot() {
        let food = lettuce();
        let snapshot = DishIngredient::snapshot(&food);
        let rebuilt = snapshot.reconstruct();

        assert_eq!(rebuilt.id, food.id);
        assert_eq!(rebuilt.name, "Lettuce");
        assert_eq!(rebuilt.macros, food.macros);
        assert_eq!(rebuilt.created_at, food.created_at);
        assert!(rebuilt.is_ingredient);
    }

    #[test]
    fn test_dish_display() {
        let dish = Dish::new("Salad")
            .with_original_name("green salad")
            .with_ingredients(&[lettuce()]);
        let output = format!("{}", dish);
        assert!(output.contains("Salad"));
        assert!(output.contains("Recognized as: green salad"));
        assert!(output.contains("Lettuce (15 kcal)"));
    }
}
