mod config_cmd;
mod dish;
mod food;
mod meal;
mod recent;

pub use config_cmd::ConfigCommand;
pub use dish::DishCommand;
pub use food::FoodCommand;
pub use meal::MealCommand;
pub use recent::RecentCommand;

use clap::ValueEnum;
use platelog_core::{FoodRecord, Macros};
use std::io::{self, Write};
use std::path::Path;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Parses `name:calories[:protein:carbs:fat]` into a fresh ingredient record.
pub fn parse_ingredient(s: &str) -> Result<FoodRecord, String> {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    if parts.len() != 2 && parts.len() != 5 {
        return Err(format!(
            "Invalid ingredient '{}', expected name:calories or name:calories:protein:carbs:fat",
            s
        ));
    }

    let name = parts[0];
    if name.is_empty() {
        return Err(format!("Invalid ingredient '{}', name is empty", s));
    }

    let mut values = [0.0; 4];
    for (value, raw) in values.iter_mut().zip(&parts[1..]) {
        *value = raw
            .parse()
            .map_err(|_| format!("Invalid number '{}' in ingredient '{}'", raw, s))?;
    }
    let [calories, protein, carbs, fat] = values;

    Ok(FoodRecord::new(name, Macros::new(calories, protein, carbs, fat)))
}

/// Parses `food-id:amount` portions used when logging meals.
pub fn parse_portion(s: &str) -> Result<(uuid::Uuid, f64), String> {
    let (id, amount) = match s.split_once(':') {
        Some((id, amount)) => (id, amount),
        None => (s, "1"),
    };
    let id = uuid::Uuid::parse_str(id.trim()).map_err(|_| format!("Invalid food ID: {}", id))?;
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("Invalid amount: {}", amount))?;
    if amount <= 0.0 {
        return Err("Amount must be a positive number".to_string());
    }
    Ok((id, amount))
}

pub fn read_image(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    std::fs::read(path)
        .map_err(|e| format!("Failed to read image '{}': {}", path.display(), e).into())
}

/// Asks for a y/N confirmation on stdin.
pub fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

pub fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() > width {
        let cut: String = name.chars().take(width - 3).collect();
        format!("{}...", cut)
    } else {
        name.to_string()
    }
}
