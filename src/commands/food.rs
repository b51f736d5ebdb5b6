use clap::{Args, Subcommand};
use platelog::Engine;
use platelog_core::{EntryKind, EntrySource, FoodDraft, IngredientLine, Macros, RecognizedEntry};
use std::path::PathBuf;
use uuid::Uuid;

use super::{confirm, read_image, OutputFormat};

#[derive(Args)]
pub struct FoodCommand {
    #[command(subcommand)]
    pub command: FoodSubcommand,
}

#[derive(Subcommand)]
pub enum FoodSubcommand {
    /// Log a food, updating it when one with the same name or ID exists
    Add {
        /// Name of the food
        name: String,

        /// Existing food ID to update
        #[arg(long)]
        id: Option<Uuid>,

        /// Calories per serving
        #[arg(long, default_value_t = 0.0)]
        calories: f64,

        /// Protein in grams
        #[arg(long, default_value_t = 0.0)]
        protein: f64,

        /// Carbohydrates in grams
        #[arg(long, default_value_t = 0.0)]
        carbs: f64,

        /// Fat in grams
        #[arg(long, default_value_t = 0.0)]
        fat: f64,

        /// Fiber in grams
        #[arg(long)]
        fiber: Option<f64>,

        /// Sugar in grams
        #[arg(long)]
        sugar: Option<f64>,

        /// Sodium in milligrams
        #[arg(long)]
        sodium: Option<f64>,

        /// Serving size
        #[arg(long)]
        serving_size: Option<f64>,

        /// Serving unit
        #[arg(long)]
        serving_unit: Option<String>,

        /// Mark as favorite
        #[arg(long)]
        favorite: bool,

        /// Composition line names (can be repeated)
        #[arg(long = "ingredient", value_name = "NAME")]
        ingredients: Vec<String>,

        /// Image file to attach
        #[arg(long)]
        image: Option<PathBuf>,

        /// Where the entry came from (recognition, barcode, search, manual)
        #[arg(long, default_value = "manual")]
        source: EntrySource,
    },

    /// Log a recognizer result read from a JSON file
    Ingest {
        /// JSON file holding name, confidence, macros and ingredient_names
        file: PathBuf,

        /// Image file captured with the result
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Show a food's details
    Show {
        /// Food ID (UUID)
        id: Uuid,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a food for good
    Delete {
        /// Food ID (UUID)
        id: Uuid,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Attach or export a food's image
    Image {
        /// Food ID (UUID)
        id: Uuid,

        /// Image file to attach
        #[arg(long, conflicts_with = "output")]
        set: Option<PathBuf>,

        /// Write the image to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl FoodCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            FoodSubcommand::Add {
                name,
                id,
                calories,
                protein,
                carbs,
                fat,
                fiber,
                sugar,
                sodium,
                serving_size,
                serving_unit,
                favorite,
                ingredients,
                image,
                source,
            } => {
                let mut draft = FoodDraft::new(name.trim(), Macros::new(*calories, *protein, *carbs, *fat))
                    .with_ingredients(ingredients.iter().map(IngredientLine::named).collect());
                draft.id = *id;
                draft.fiber = *fiber;
                draft.sugar = *sugar;
                draft.sodium = *sodium;
                draft.serving_size = *serving_size;
                draft.serving_unit = serving_unit.clone();
                draft.is_favorite = *favorite;

                let image = image.as_deref().map(read_image).transpose()?;
                let food = engine.save(draft, image, *source).await?;

                println!("Saved food {}:", food.id);
                println!("{}", food);
                Ok(())
            }

            FoodSubcommand::Ingest { file, image } => {
                let contents = std::fs::read_to_string(file)
                    .map_err(|e| format!("Failed to read '{}': {}", file.display(), e))?;
                let mut entry: RecognizedEntry = serde_json::from_str(&contents)?;
                if let Some(path) = image {
                    entry = entry.with_image(read_image(path)?);
                }

                let food = engine.ingest(entry).await?;
                println!("Saved food {}:", food.id);
                println!("{}", food);
                Ok(())
            }

            FoodSubcommand::Show { id, format } => {
                let food = engine
                    .food(*id)
                    .await?
                    .ok_or_else(|| format!("Food not found: {}", id))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&food)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", food);
                    }
                }
                Ok(())
            }

            FoodSubcommand::Delete { id, force } => {
                let name = engine.food(*id).await?.map(|f| f.name);
                let label = name.as_deref().unwrap_or("(unknown)");

                // Confirm deletion unless --force is used
                if !force && !confirm(&format!("Delete food '{}'?", label))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                if engine.delete_food(*id).await? {
                    println!("Deleted food: {}", label);
                } else {
                    println!("Food already deleted: {}", id);
                }
                Ok(())
            }

            FoodSubcommand::Image { id, set, output } => {
                if let Some(path) = set {
                    engine
                        .attach_image(EntryKind::Food, *id, read_image(path)?)
                        .await?;
                    println!("Attached image to {}", id);
                    return Ok(());
                }

                let image = engine
                    .image(EntryKind::Food, *id)
                    .await?
                    .ok_or_else(|| format!("No image for food: {}", id))?;

                match output {
                    Some(path) => {
                        std::fs::write(path, &image)?;
                        println!("Wrote {} bytes to {}", image.len(), path.display());
                    }
                    None => println!("Image: {} bytes", image.len()),
                }
                Ok(())
            }
        }
    }
}
