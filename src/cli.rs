use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "qcdoc",
    version,
    about = "Quality-control inspection reports from a shared spreadsheet export"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the root and table, and show how columns map onto fields.
    Inspect(InspectArgs),
    /// Create one folder per unit under the root.
    Folders(BatchArgs),
    /// Move referenced photos from the root into unit folders.
    MovePhotos(BatchArgs),
    /// Move referenced photos from unit folders back to the root.
    MoveBack(BatchArgs),
    /// Render every record and write its document at the root.
    Render(BatchArgs),
    /// Move generated documents into unit folders.
    MoveDocs(BatchArgs),
    /// Folders, photos, documents and placement in one pass.
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Table file name under the root, or a path.
    #[arg(long)]
    pub csv: PathBuf,

    /// JSON layout profile; the built-in layout is used when omitted.
    #[arg(long)]
    pub layout: Option<PathBuf>,

    #[arg(long)]
    pub banner_rows: Option<usize>,
}

impl BatchArgs {
    pub fn csv_path(&self) -> PathBuf {
        if self.csv.is_absolute() {
            self.csv.clone()
        } else {
            self.root.join(&self.csv)
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    #[arg(long, default_value_t = 5)]
    pub preview_rows: usize,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    #[arg(long, default_value_t = false)]
    pub restore_photos: bool,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}
