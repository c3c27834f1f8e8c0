use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "live-counting-bridge")]
#[command(version)]
#[command(about = "Relays live thread updates into a chat bridge API")]
pub struct Args {
    /// Load this config file instead of searching the working directory and its parents
    #[arg(long, short, env = "LIVE_COUNTING_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,
}
