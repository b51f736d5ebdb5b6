use serde::{Deserialize, Serialize};

use super::food::FoodDraft;
use super::ingredient::IngredientLine;
use super::macros::Macros;

/// What a recognizer, barcode scanner or search hands to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognizedEntry {
    pub name: String,
    pub confidence: f64,
    pub macros: Macros,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
    #[serde(default)]
    pub ingredient_names: Option<Vec<String>>,
}

impl RecognizedEntry {
    pub fn new(name: impl Into<String>, confidence: f64, macros: Macros) -> Self {
        Self {
            name: name.into(),
            confidence,
            macros,
            image: None,
            ingredient_names: None,
        }
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_ingredient_names(mut self, names: Vec<String>) -> Self {
        self.ingredient_names = Some(names);
        self
    }

    /// Splits the entry into an upsert draft and its optional image.
    pub fn into_draft(self) -> (FoodDraft, Option<Vec<u8>>) {
        let ingredients = self
            .ingredient_names
            .unwrap_or_default()
            .into_iter()
            .filter(|name| !name.trim().is_empty())
            .map(IngredientLine::named)
            .collect();

        let mut draft = FoodDraft::new(self.name, self.macros).with_ingredients(ingredients);
        draft.confidence = Some(self.confidence);
        (draft, self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_draft_maps_ingredient_names() {
        let entry = RecognizedEntry::new("Ramen", 0.92, Macros::calories(450.0))
            .with_ingredient_names(vec!["noodles".into(), "".into(), "egg".into()])
            .with_image(vec![1, 2, 3]);

        let (draft, image) = entry.into_draft();
        assert_eq!(draft.name, "Ramen");
        assert_eq!(draft.id, None);
        assert_eq!(draft.confidence, Some(0.92));
        assert_eq!(draft.ingredients.len(), 2);
        assert_eq!(draft.ingredients[1].name, "egg");
        assert_eq!(image, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_into_draft_without_ingredients() {
        let (draft, image) = RecognizedEntry::new("Apple", 0.5, Macros::calories(52.0)).into_draft();
        assert!(draft.ingredients.is_empty());
        assert!(image.is_none());
    }
}
