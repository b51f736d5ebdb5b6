use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::food::FoodRecord;
use super::macros::Macros;
use super::meal_type::MealType;
use crate::aggregate;

/// One food eaten as part of a meal, scaled to the amount eaten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealFood {
    pub id: Uuid,
    pub food_id: Uuid,
    pub name: String,
    pub amount: f64,
    pub unit: String,
    pub macros: Macros,
}

impl MealFood {
    /// Portion of `food` scaled from its serving size to `amount`.
    pub fn portion(food: &FoodRecord, amount: f64) -> Self {
        let factor = if food.serving_size > 0.0 {
            amount / food.serving_size
        } else {
            1.0
        };
        Self {
            id: Uuid::new_v4(),
            food_id: food.id,
            name: food.name.clone(),
            amount,
            unit: food.serving_unit.clone(),
            macros: Macros::new(
                food.macros.calories * factor,
                food.macros.protein * factor,
                food.macros.carbs * factor,
                food.macros.fat * factor,
            ),
        }
    }
}

/// What was eaten at one sitting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meal {
    pub id: Uuid,
    pub name: String,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub totals: Macros,
    pub foods: Vec<MealFood>,
}

impl Meal {
    pub fn new(date: NaiveDate, meal_type: MealType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: meal_type.to_string(),
            meal_type,
            date,
            notes: None,
            totals: Macros::default(),
            foods: Vec::new(),
        }
    }

    pub fn today(meal_type: MealType) -> Self {
        Self::new(Utc::now().date_naive(), meal_type)
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn add_food(&mut self, food: &FoodRecord, amount: f64) {
        self.foods.push(MealFood::portion(food, amount));
        aggregate::recompute_meal(self);
    }
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Meal: {} - {}", self.date, self.meal_type)?;
        writeln!(f, "{}", "=".repeat(30))?;

        for food in &self.foods {
            writeln!(
                f,
                "  - {} ({} {}, {} kcal)",
                food.name, food.amount, food.unit, food.macros.calories
            )?;
        }
        writeln!(f, "Total: {}", self.totals)?;

        if let Some(notes) = &self.notes {
            writeln!(f, "\nNotes: {}", notes)?;
        }

        Ok(())
    }
}
