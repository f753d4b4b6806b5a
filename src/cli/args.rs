use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meetscribe")]
#[command(about = "Meeting capture, transcription and minutes extraction", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// Run the analysis pipeline against a local audio file
    Analyze(AnalyzeCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct AnalyzeCliArgs {
    /// Path to the audio file to transcribe and analyze
    pub file: PathBuf,
}
