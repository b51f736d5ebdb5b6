use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::error::ModelError;

/// Calories plus the three macronutrients, per serving.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }

    pub fn calories(calories: f64) -> Self {
        Self {
            calories,
            ..Self::default()
        }
    }

    /// Rejects negative, NaN and infinite values.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (field, value) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidMacro { field, value });
            }
        }
        Ok(())
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Macros) {
        *self = *self + rhs;
    }
}

impl Sum for Macros {
    fn sum<I: Iterator<Item = Macros>>(iter: I) -> Self {
        iter.fold(Macros::default(), Add::add)
    }
}

impl<'a> Sum<&'a Macros> for Macros {
    fn sum<I: Iterator<Item = &'a Macros>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Macros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} kcal, {}g protein, {}g carbs, {}g fat",
            self.calories, self.protein, self.carbs, self.fat
        )
    }
}
