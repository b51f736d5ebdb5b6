use clap::Args;
use platelog::Engine;
use platelog_core::EntryKind;

use super::{truncate, OutputFormat};

#[derive(Args)]
pub struct RecentCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl RecentCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        let entries = engine.recent().await;

        if entries.is_empty() {
            println!("Nothing logged yet");
            return Ok(());
        }

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
            OutputFormat::Text => {
                println!(
                    "{:<36}  {:<30}  {:>8}  {:<4}  LOGGED",
                    "ID", "NAME", "KCAL", "KIND"
                );
                println!("{}", "-".repeat(100));
                for entry in &entries {
                    let kind = match entry.kind {
                        EntryKind::Food => "food",
                        EntryKind::Dish => "dish",
                    };
                    println!(
                        "{:<36}  {:<30}  {:>8.0}  {:<4}  {}",
                        entry.id,
                        truncate(&entry.name, 30),
                        entry.macros.calories,
                        kind,
                        entry.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!("\nTotal: {} entr(y/ies)", entries.len());
            }
        }
        Ok(())
    }
}
