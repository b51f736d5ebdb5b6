use serde::{Deserialize, Serialize};
use std::fmt;

use super::macros::Macros;

/// A composition line owned by a food record ("200 g rice").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientLine {
    pub name: String,
    pub amount: f64,
    pub unit: String,
    pub macros: Macros,
}

impl IngredientLine {
    pub fn new(name: impl Into<String>, amount: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount,
            unit: unit.into(),
            macros: Macros::default(),
        }
    }

    /// A line known only by name, as reported by the recognizer.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, 0.0, "")
    }

    pub fn with_macros(mut self, macros: Macros) -> Self {
        self.macros = macros;
        self
    }
}

impl fmt::Display for IngredientLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amount > 0.0 {
            if self.unit.is_empty() {
                write!(f, "{} {}", self.amount, self.name)
            } else {
                write!(f, "{} {} {}", self.amount, self.unit, self.name)
            }
        } else {
            write!(f, "{}", self.name)
        }
    }
}
