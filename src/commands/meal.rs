use chrono::{Local, NaiveDate, Timelike};
use clap::{Args, Subcommand};
use platelog::Engine;
use platelog_core::MealType;
use uuid::Uuid;

use super::{confirm, parse_portion, OutputFormat};

#[derive(Args)]
pub struct MealCommand {
    #[command(subcommand)]
    pub command: MealSubcommand,
}

#[derive(Subcommand)]
pub enum MealSubcommand {
    /// Log a meal made of foods
    Log {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Meal type (breakfast, lunch, dinner, snack), defaults to the time of day
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        meal_type: Option<MealType>,

        /// Food portion as id[:amount] (can be repeated)
        #[arg(long = "food", value_name = "FOOD", value_parser = parse_portion, required = true)]
        foods: Vec<(Uuid, f64)>,

        /// Add notes to the meal
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show a logged meal
    Show {
        /// Meal ID (UUID)
        id: Uuid,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a logged meal
    Delete {
        /// Meal ID (UUID)
        id: Uuid,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// List the meals of a day
    List {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl MealCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MealSubcommand::Log {
                date,
                meal_type,
                foods,
                notes,
            } => {
                let date = parse_date(date.as_deref())?;
                let meal_type =
                    meal_type.unwrap_or_else(|| MealType::for_hour(Local::now().hour()));

                let meal = engine.log_meal(date, meal_type, foods, notes.clone()).await?;
                println!("Logged meal:");
                println!("{}", meal);
                Ok(())
            }

            MealSubcommand::Show { id, format } => {
                let meal = engine
                    .meal(*id)
                    .await?
                    .ok_or_else(|| format!("Meal not found: {}", id))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&meal)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", meal);
                    }
                }
                Ok(())
            }

            MealSubcommand::Delete { id, force } => {
                let meal = engine
                    .meal(*id)
                    .await?
                    .ok_or_else(|| format!("Meal not found: {}", id))?;

                // Confirm deletion unless --force is used
                let prompt = format!("Delete {} on {}?", meal.meal_type, meal.date);
                if !force && !confirm(&prompt)? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                engine.delete_meal(meal.id).await?;
                println!("Deleted {} on {}", meal.meal_type, meal.date);
                Ok(())
            }

            MealSubcommand::List { date, format } => {
                let date = parse_date(date.as_deref())?;
                let meals = engine.meals_on(date).await?;

                if meals.is_empty() {
                    println!("No meals logged on {}", date);
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&meals)?);
                    }
                    OutputFormat::Text => {
                        for meal in &meals {
                            println!("{}", meal);
                        }
                        let calories: f64 = meals.iter().map(|m| m.totals.calories).sum();
                        println!("Total: {} meal(s), {:.0} kcal", meals.len(), calories);
                    }
                }
                Ok(())
            }
        }
    }
}

fn parse_date(date: Option<&str>) -> Result<NaiveDate, String> {
    match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date format '{}'. Use YYYY-MM-DD.", d)),
        None => Ok(Local::now().date_naive()),
    }
}
