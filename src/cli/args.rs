use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::sources::SourceSelection;

#[derive(Parser, Debug)]
#[command(name = "meeting-recap")]
#[command(about = "Transcribe and summarize recorded meetings", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Process every video on a wiki page or meeting and publish summaries
    Run(RunCliArgs),
    /// Validate configuration and tool availability without processing anything
    Check(CheckCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct RunCliArgs {
    /// Wiki page whose attachments are processed and under which summaries are published
    #[arg(long)]
    pub page_id: Option<String>,
    /// Meeting whose cloud recordings are processed
    #[arg(long)]
    pub meeting_id: Option<String>,
    /// Which sources to read media from
    #[arg(long, value_enum, default_value_t = SourceSelection::Wiki)]
    pub source: SourceSelection,
    /// Regenerate transcripts and summaries and republish pages
    #[arg(long = "override")]
    pub overwrite: bool,
    /// Hide download progress bars
    #[arg(long)]
    pub no_progress: bool,
    /// Config file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct CheckCliArgs {
    /// Which sources to validate credentials for
    #[arg(long, value_enum, default_value_t = SourceSelection::Wiki)]
    pub source: SourceSelection,
    /// Config file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,
}
