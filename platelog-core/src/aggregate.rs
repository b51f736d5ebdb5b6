//! Cached macro totals for dishes and meals.
//!
//! A dish's totals are a snapshot embedded in its mirror entry, so they
//! must be recomputed before that entry is written.

use crate::models::{Dish, Macros, Meal};

/// Sums the ingredient macros of `dish` into its cached totals.
pub fn recompute(dish: &mut Dish) {
    dish.totals = dish.ingredients.iter().map(|i| &i.macros).sum();
}

/// Sums the portion macros of `meal` into its cached totals.
pub fn recompute_meal(meal: &mut Meal) {
    meal.totals = meal.foods.iter().map(|f| &f.macros).sum();
}

/// True when the cached totals match the ingredients.
pub fn is_consistent(dish: &Dish) -> bool {
    let expected: Macros = dish.ingredients.iter().map(|i| &i.macros).sum();
    const EPSILON: f64 = 1e-6;
    (expected.calories - dish.totals.calories).abs() < EPSILON
        && (expected.protein - dish.totals.protein).abs() < EPSILON
        && (expected.carbs - dish.totals.carbs).abs() < EPSILON
        && (expected.fat - dish.totals.fat).abs() < EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FoodRecord;

    #[test]
    fn test_recompute_overwrites_stale_totals() {
        let mut dish = Dish::new("Bowl").with_ingredients(&[
            FoodRecord::new("Rice", Macros::new(130.0, 2.7, 28.0, 0.3)),
            FoodRecord::new("Salmon", Macros::new(208.0, 20.0, 0.0, 13.0)),
        ]);
        dish.totals = Macros::calories(1.0);
        assert!(!is_consistent(&dish));

        recompute(&mut dish);
        assert!(is_consistent(&dish));
        assert_eq!(dish.totals.calories, 338.0);
        assert_eq!(dish.totals.fat, 13.3);
    }

    #[test]
    fn test_recompute_empty_dish_is_zero() {
        let mut dish = Dish::new("Empty");
        dish.totals = Macros::calories(10.0);
        recompute(&mut dish);
        assert_eq!(dish.totals, Macros::default());
    }
}
