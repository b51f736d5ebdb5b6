use clap::{Parser, Subcommand};
use platelog::{Config, Engine};
use platelog_core::LifecycleEvent;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{ConfigCommand, DishCommand, FoodCommand, MealCommand, RecentCommand};

#[derive(Parser)]
#[command(name = "platelog")]
#[command(version)]
#[command(about = "Log foods and dishes and keep the recent list consistent", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log and manage single foods
    Food(FoodCommand),

    /// Manage dishes made of several ingredients
    Dish(DishCommand),

    /// Log and list meals
    Meal(MealCommand),

    /// Show the recently logged entries
    Recent(RecentCommand),

    /// Rebuild the recent list from the database
    Resync,

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "platelog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    // Showing the configuration must not create the database
    if let Commands::Config(cmd) = &command {
        return cmd.run(&config);
    }

    let engine = Engine::open(&config).await?;

    match command {
        Commands::Food(cmd) => cmd.run(&engine).await?,
        Commands::Dish(cmd) => cmd.run(&engine).await?,
        Commands::Meal(cmd) => cmd.run(&engine).await?,
        Commands::Recent(cmd) => cmd.run(&engine).await?,
        Commands::Config(cmd) => cmd.run(&config)?,
        Commands::Resync => {
            let report = engine.resynchronize().await?;
            println!(
                "Resynchronized: {} entries ({} added, {} removed, {} reclassified, {} skipped)",
                report.entries, report.added, report.removed, report.reclassified, report.skipped
            );
            return Ok(());
        }
    }

    // Every run ends like an app being terminated
    engine.handle_lifecycle(LifecycleEvent::Terminating).await?;
    Ok(())
}
