use clap::{Args, Parser, Subcommand};

use crate::model::filter::Filter;

#[derive(Parser)]
#[command(name = "tm", about = concat!("[x] taskmaster v", env!("CARGO_PKG_VERSION"), " - a small task list"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use this data directory instead of searching for .taskmaster/
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a .taskmaster/ directory here
    Init(InitArgs),
    /// Add a task to the end of the list
    Add(AddArgs),
    /// Mark a task completed, or pending again
    Toggle(IdArgs),
    /// Delete a task
    Rm(IdArgs),
    /// Show tasks
    List(ViewArgs),
    /// Move a task within a filtered view
    Mv(MvArgs),
    /// Show tasks and keep refreshing when another process changes them
    Watch(ViewArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Reinitialize even if .taskmaster/ already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task text (words are joined with spaces)
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

#[derive(Args)]
pub struct IdArgs {
    /// Task id or unique id prefix
    pub id: String,
}

#[derive(Args)]
pub struct ViewArgs {
    /// all, pending or completed (default: list.default_filter from config)
    #[arg(long, short)]
    pub filter: Option<Filter>,
}

#[derive(Args)]
pub struct MvArgs {
    /// Current position in the view (1-based)
    pub from: usize,
    /// New position in the view (1-based)
    pub to: usize,
    /// View the positions refer to
    #[arg(long, short)]
    pub filter: Option<Filter>,
}
