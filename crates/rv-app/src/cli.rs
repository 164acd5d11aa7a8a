use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "remote-view",
    about = "Browse a table through the streaming navigation protocol",
    author,
    version
)]
pub struct Cli {
    /// CSV file to serve
    pub csv: PathBuf,

    /// Client settings as camelCase JSON (rowsPerPage, quantilePrecision, ...)
    #[arg(long, env = "REMOTE_VIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Field delimiter of the CSV file
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// The first line is data, not column names
    #[arg(long)]
    pub no_header: bool,

    /// Partial results streamed per window request
    #[arg(long, default_value_t = 4)]
    pub partitions: usize,

    /// Overrides the configured page size
    #[arg(long)]
    pub rows: Option<usize>,
}
