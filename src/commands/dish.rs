use clap::{Args, Subcommand};
use platelog::Engine;
use platelog_core::{Dish, EntryKind, FoodRecord};
use std::path::PathBuf;
use uuid::Uuid;

use super::{confirm, parse_ingredient, read_image, truncate, OutputFormat};

#[derive(Args)]
pub struct DishCommand {
    #[command(subcommand)]
    pub command: DishSubcommand,
}

#[derive(Subcommand)]
pub enum DishSubcommand {
    /// Create a new dish from its ingredients
    Create {
        /// Name of the dish
        name: String,

        /// Ingredient as name:calories[:protein:carbs:fat] (can be repeated)
        #[arg(long = "ingredient", value_name = "INGREDIENT", value_parser = parse_ingredient, required = true)]
        ingredients: Vec<FoodRecord>,

        /// Image file to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// List all dishes
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a dish's details, rebuilding missing ingredients
    Show {
        /// Dish ID (UUID) or name
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Log a dish again, moving it to the top of the recent list
    Relog {
        /// Dish ID (UUID) or name
        identifier: String,
    },

    /// Delete a dish and its ingredients
    Delete {
        /// Dish ID (UUID) or name
        identifier: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Add an ingredient to a dish
    AddIngredient {
        /// Dish ID (UUID) or name
        identifier: String,

        /// Ingredient as name:calories[:protein:carbs:fat]
        #[arg(value_parser = parse_ingredient)]
        ingredient: FoodRecord,
    },

    /// Remove an ingredient from a dish
    RemoveIngredient {
        /// Dish ID (UUID) or name
        identifier: String,

        /// Ingredient food ID (UUID)
        food_id: Uuid,
    },

    /// Attach an image to a dish
    Image {
        /// Dish ID (UUID) or name
        identifier: String,

        /// Image file to attach
        file: PathBuf,
    },
}

impl DishCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            DishSubcommand::Create {
                name,
                ingredients,
                image,
            } => {
                let image = image.as_deref().map(read_image).transpose()?;
                let dish = engine
                    .create_dish(name.trim(), ingredients.clone(), image)
                    .await?;
                println!("Created dish {}:", dish.id);
                println!("{}", dish);
                Ok(())
            }

            DishSubcommand::List { format } => {
                let dishes = engine.list_dishes().await?;

                if dishes.is_empty() {
                    println!("No dishes found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&dishes)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<36}  {:<30}  {:>8}  INGREDIENTS", "ID", "NAME", "KCAL");
                        println!("{}", "-".repeat(80));
                        for dish in &dishes {
                            println!(
                                "{:<36}  {:<30}  {:>8.0}  {}",
                                dish.id,
                                truncate(&dish.name, 30),
                                dish.totals.calories,
                                dish.ingredients.len()
                            );
                        }
                        println!("\nTotal: {} dish(es)", dishes.len());
                    }
                }
                Ok(())
            }

            DishSubcommand::Show { identifier, format } => {
                let dish = find_dish(engine, identifier).await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&dish)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", dish);
                    }
                }
                Ok(())
            }

            DishSubcommand::Relog { identifier } => {
                let dish = find_dish(engine, identifier).await?;
                let dish = engine.relog_dish(dish.id).await?;
                println!("Logged dish: {}", dish.name);
                Ok(())
            }

            DishSubcommand::Delete { identifier, force } => {
                let dish = find_dish(engine, identifier).await?;

                // Confirm deletion unless --force is used
                if !force && !confirm(&format!("Delete dish '{}'?", dish.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                let ingredients: Vec<Uuid> = dish.ingredient_ids().collect();
                engine.delete_dish(dish.id, &ingredients).await?;
                println!("Deleted dish: {}", dish.name);
                Ok(())
            }

            DishSubcommand::AddIngredient {
                identifier,
                ingredient,
            } => {
                let dish = find_dish(engine, identifier).await?;
                let dish = engine
                    .add_dish_ingredient(dish.id, ingredient.clone())
                    .await?;

                println!("Added ingredient to '{}':", dish.name);
                println!("  {} ({})", ingredient.name, ingredient.macros);
                Ok(())
            }

            DishSubcommand::RemoveIngredient {
                identifier,
                food_id,
            } => {
                let dish = find_dish(engine, identifier).await?;
                let dish = engine.remove_dish_ingredient(dish.id, *food_id).await?;
                println!("Removed ingredient from '{}'", dish.name);
                Ok(())
            }

            DishSubcommand::Image { identifier, file } => {
                let dish = find_dish(engine, identifier).await?;
                engine
                    .attach_image(EntryKind::Dish, dish.id, read_image(file)?)
                    .await?;
                println!("Attached image to '{}'", dish.name);
                Ok(())
            }
        }
    }
}

/// Looks a dish up by UUID first, then by name (case-insensitive).
async fn find_dish(engine: &Engine, identifier: &str) -> Result<Dish, Box<dyn std::error::Error>> {
    if let Ok(id) = Uuid::parse_str(identifier) {
        return Ok(engine.dish(id).await?);
    }

    let wanted = identifier.trim().to_lowercase();
    let found = engine
        .list_dishes()
        .await?
        .into_iter()
        .find(|d| d.name.to_lowercase() == wanted);

    match found {
        Some(dish) => Ok(engine.dish(dish.id).await?),
        None => Err(format!("Dish not found: {}", identifier).into()),
    }
}
