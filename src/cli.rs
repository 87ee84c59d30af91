use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "vidtrack",
    version,
    about = "Browse the TMDB catalog and watch through the VidKing player with progress tracking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search the catalog and print matching titles
    Search { query: String },
    /// Launch the player for one title and track playback until it exits
    Watch {
        media_id: String,
        #[arg(long = "type", value_name = "movie|tv", default_value = "movie")]
        media_type: String,
        #[arg(long)]
        season: Option<u32>,
        #[arg(long)]
        episode: Option<u32>,
    },
    /// Print the watch-history ledger
    History,
    /// Print bookmarked titles
    Bookmarks,
    Tui,
}
