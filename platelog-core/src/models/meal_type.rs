use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    /// Meal slot for a local hour of day, used when none is given.
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            5..=10 => MealType::Breakfast,
            11..=15 => MealType::Lunch,
            17..=21 => MealType::Dinner,
            _ => MealType::Snack,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        MealType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "Invalid meal type '{}'. Valid options: breakfast, lunch, dinner, snack",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_type_from_str() {
        assert_eq!(MealType::from_str("LUNCH").unwrap(), MealType::Lunch);
        assert_eq!(MealType::from_str(" snack ").unwrap(), MealType::Snack);
        assert!(MealType::from_str("brunch").is_err());
    }

    #[test]
    fn test_for_hour() {
        assert_eq!(MealType::for_hour(7), MealType::Breakfast);
        assert_eq!(MealType::for_hour(13), MealType::Lunch);
        assert_eq!(MealType::for_hour(19), MealType::Dinner);
        assert_eq!(MealType::for_hour(16), MealType::Snack);
        assert_eq!(MealType::for_hour(2), MealType::Snack);
    }

    #[test]
    fn test_meal_type_serializes_lowercase() {
        let json = serde_json::to_string(&MealType::Dinner).unwrap();
        assert_eq!(json, "\"dinner\"");
    }
}
