//! Plans granule recipes: queries the catalog, looks up provider credentials,
//! and writes the assembled pipeline as a JSON job description.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use granule_recipe::credentials::Netrc;
use granule_recipe::recipe::{gpm_imerg_toml, plan, Recipe};
use granule_recipe::Mode;

#[derive(Parser)]
#[command(name = "granule-recipe")]
#[command(about = "Assemble data-pipeline jobs from catalog granules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the catalog and write the job description
    Plan {
        /// Path to the recipe file
        #[arg(short, long, default_value = "recipe.toml")]
        recipe: PathBuf,

        /// Override the output mode set in the recipe
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,

        /// Netrc file holding provider credentials (default: $NETRC or ~/.netrc)
        #[arg(long)]
        netrc: Option<PathBuf>,

        /// Where to write the job description
        #[arg(short, long, default_value = "./outputs/job.json")]
        output: PathBuf,
    },

    /// Check that a recipe parses and its query is well formed
    Validate {
        #[arg(short, long, default_value = "recipe.toml")]
        recipe: PathBuf,
    },

    /// Write the GPM IMERG recipe as a starting point
    Template {
        #[arg(short, long, default_value = "recipe.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            recipe,
            mode,
            netrc,
            output,
        } => plan_command(recipe, mode, netrc, output).await,
        Commands::Validate { recipe } => validate_command(recipe),
        Commands::Template { output } => template_command(output),
    }
}

async fn plan_command(
    recipe_path: PathBuf,
    mode: Option<Mode>,
    netrc: Option<PathBuf>,
    output: PathBuf,
) -> Result<()> {
    let recipe = Recipe::read(&recipe_path)?;

    let netrc_path = Netrc::locate(netrc.as_deref())?;
    let credentials = Netrc::read(&netrc_path)?;

    let catalog = recipe.catalog()?;
    let job = plan(&recipe, &catalog, &credentials, mode)
        .await
        .with_context(|| format!("Error planning recipe: {}", recipe.id))?;

    job.write(&output)
        .with_context(|| format!("Error writing job description: {}", output.display()))?;
    tracing::info!(path = %output.display(), files = job.source().len(), "Wrote job description");
    Ok(())
}

fn validate_command(recipe_path: PathBuf) -> Result<()> {
    let recipe = Recipe::read(&recipe_path)?;
    let params = recipe.query_parameters()?;
    tracing::info!(
        recipe = %recipe.id,
        short_name = params.short_name(),
        version = params.version(),
        mode = %recipe.output.mode,
        "Recipe is valid"
    );
    Ok(())
}

fn template_command(output: PathBuf) -> Result<()> {
    let recipe = Recipe::from_template(&gpm_imerg_toml())?;
    recipe.write(&output)?;
    tracing::info!(path = %output.display(), "Wrote recipe template");
    Ok(())
}
