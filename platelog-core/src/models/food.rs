use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ingredient::IngredientLine;
use super::macros::Macros;
use crate::error::ModelError;

pub const DEFAULT_SERVING_SIZE: f64 = 100.0;
pub const DEFAULT_SERVING_UNIT: &str = "g";

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    Recognition,
    Barcode,
    Search,
    #[default]
    Manual,
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySource::Recognition => write!(f, "recognition"),
            EntrySource::Barcode => write!(f, "barcode"),
            EntrySource::Search => write!(f, "search"),
            EntrySource::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for EntrySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recognition" => Ok(EntrySource::Recognition),
            "barcode" => Ok(EntrySource::Barcode),
            "search" => Ok(EntrySource::Search),
            "manual" => Ok(EntrySource::Manual),
            _ => Err(format!(
                "Invalid entry source '{}'. Valid options: recognition, barcode, search, manual",
                s
            )),
        }
    }
}

/// A loggable nutrition item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodRecord {
    pub id: Uuid,
    pub name: String,
    pub macros: Macros,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
    pub serving_size: f64,
    pub serving_unit: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
    pub is_ingredient: bool,
    pub is_favorite: bool,
    pub source: EntrySource,
    pub confidence: Option<f64>,
    pub ingredients: Vec<IngredientLine>,
}

impl FoodRecord {
    pub fn new(name: impl Into<String>, macros: Macros) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            macros,
            fiber: None,
            sugar: None,
            sodium: None,
            serving_size: DEFAULT_SERVING_SIZE,
            serving_unit: DEFAULT_SERVING_UNIT.to_string(),
            created_at: Utc::now(),
            image: None,
            is_ingredient: false,
            is_favorite: false,
            source: EntrySource::default(),
            confidence: None,
            ingredients: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_serving(mut self, size: f64, unit: impl Into<String>) -> Self {
        self.serving_size = size;
        self.serving_unit = unit.into();
        self
    }

    pub fn with_ingredients(mut self, ingredients: Vec<IngredientLine>) -> Self {
        self.ingredients = ingredients;
        self
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn has_image(&self) -> bool {
        self.image.as_ref().is_some_and(|bytes| !bytes.is_empty())
    }

    /// A food that owns composition lines is itself a composed dish.
    pub fn is_composed(&self) -> bool {
        !self.ingredients.is_empty()
    }
}

impl fmt::Display for FoodRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len()))?;
        writeln!(f, "Serving: {} {}", self.serving_size, self.serving_unit)?;
        writeln!(f, "Nutrition: {}", self.macros)?;

        if self.is_ingredient {
            writeln!(f, "Hidden (ingredient)")?;
        }

        if !self.ingredients.is_empty() {
            writeln!(f, "\nIngredients:")?;
            for ingredient in &self.ingredients {
                writeln!(f, "  - {}", ingredient)?;
            }
        }

        Ok(())
    }
}

/// Input for an upsert. `id` is the identity key when present, otherwise
/// the name is.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FoodDraft {
    pub id: Option<Uuid>,
    pub name: String,
    pub macros: Macros,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
    pub serving_size: Option<f64>,
    pub serving_unit: Option<String>,
    pub is_favorite: bool,
    pub confidence: Option<f64>,
    pub ingredients: Vec<IngredientLine>,
}

impl FoodDraft {
    pub fn new(name: impl Into<String>, macros: Macros) -> Self {
        Self {
            name: name.into(),
            macros,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_ingredients(mut self, ingredients: Vec<IngredientLine>) -> Self {
        self.ingredients = ingredients;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName);
        }
        self.macros.validate()
    }

    /// Copies the draft's fields onto `record`. Identity, timestamps, image
    /// and ownership flags are left alone.
    pub fn apply_to(&self, record: &mut FoodRecord) {
        record.name = self.name.clone();
        record.macros = self.macros;
        record.fiber = self.fiber;
        record.sugar = self.sugar;
        record.sodium = self.sodium;
        if let Some(size) = self.serving_size {
            record.serving_size = size;
        }
        if let Some(unit) = &self.serving_unit {
            record.serving_unit = unit.clone();
        }
        record.is_favorite = self.is_favorite;
        record.confidence = self.confidence;
        record.ingredients = self.ingredients.clone();
    }

    pub fn into_record(self) -> FoodRecord {
        let mut record = FoodRecord::new(self.name.clone(), self.macros);
        if let Some(id) = self.id {
            record.id = id;
        }
        self.apply_to(&mut record);
        record
    }
}

impl From<&FoodRecord> for FoodDraft {
    fn from(record: &FoodRecord) -> Self {
        Self {
            id: Some(record.id),
            name: record.name.clone(),
            macros: record.macros,
            fiber: record.fiber,
            sugar: record.sugar,
            sodium: record.sodium,
            serving_size: Some(record.serving_size),
            serving_unit: Some(record.serving_unit.clone()),
            is_favorite: record.is_favorite,
            confidence: record.confidence,
            ingredients: record.ingredients.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_food_new_defaults() {
        let food = FoodRecord::new("Banana", Macros::calories(89.0));
        assert_eq!(food.name, "Banana");
        assert_eq!(food.serving_size, 100.0);
        assert_eq!(food.serving_unit, "g");
        assert!(!food.is_ingredient);
        assert!(!food.has_image());
        assert!(!food.is_composed());
    }

    #[test]
    fn test_has_image_ignores_empty_blob() {
        let food = FoodRecord::new("Apple", Macros::default()).with_image(Vec::new());
        assert!(!food.has_image());
    }

    #[test]
    fn test_draft_into_record_keeps_id() {
        let id = Uuid::new_v4();
        let record = FoodDraft::new("Rice", Macros::calories(130.0))
            .with_id(id)
            .into_record();
        assert_eq!(record.id, id);
        assert_eq!(record.macros.calories, 130.0);
    }

    #[test]
    fn test_draft_apply_preserves_identity() {
        let mut record = FoodRecord::new("Rice", Macros::calories(130.0)).with_serving(150.0, "g");
        let created_at = record.created_at;
        let id = record.id;

        let mut draft = FoodDraft::new("Rice", Macros::calories(140.0));
        draft.is_favorite = true;
        draft.apply_to(&mut record);

        assert_eq!(record.id, id);
        assert_eq!(record.created_at, created_at);
        assert_eq!(record.serving_size, 150.0);
        assert_eq!(record.macros.calories, 140.0);
        assert!(record.is_favorite);
    }

    #[test]
    fn test_draft_validate() {
        assert_eq!(
            FoodDraft::new("  ", Macros::default()).validate(),
            Err(ModelError::EmptyName)
        );
        assert!(FoodDraft::new("Egg", Macros::calories(-5.0)).validate().is_err());
        assert!(FoodDraft::new("Egg", Macros::calories(78.0)).validate().is_ok());
    }

    #[test]
    fn test_entry_source_from_str() {
        assert_eq!(EntrySource::from_str("Barcode").unwrap(), EntrySource::Barcode);
        assert!(EntrySource::from_str("camera").is_err());
    }

    #[test]
    fn test_food_json_skips_image() {
        let food = FoodRecord::new("Toast", Macros::calories(75.0)).with_image(vec![1, 2, 3]);
        let json = serde_json::to_string(&food).unwrap();
        let parsed: FoodRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "Toast");
        assert!(parsed.image.is_none());
    }
}
