//! CLI command handlers.

mod args;

pub use args::{AnalyzeCliArgs, Cli, CliCommand};

use crate::app;
use crate::config::Config;
use anyhow::{bail, Result};

/// Run the analysis pipeline against a local file and print the result as
/// JSON. Useful for exercising provider configuration without the HTTP
/// layer.
pub async fn handle_analyze_command(args: AnalyzeCliArgs) -> Result<()> {
    if !args.file.exists() {
        bail!("Audio file not found: {:?}", args.file);
    }

    let config = Config::load()?;
    let pipeline = app::build_pipeline(&config)?;

    let analysis = pipeline.analyze(&args.file).await?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);

    Ok(())
}
