use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["text", "image"])))]
pub struct Cli {
    /// Free-text description of the meals to analyse
    #[arg(short, long)]
    pub text: Option<String>,

    /// Path to a photo of a single food
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Nutrition CSV sources, tried in order; missing files are skipped
    #[arg(
        short,
        long,
        num_args = 1..,
        default_values = ["nutrients.csv", "dishes.csv", "fastfood.csv", "nutrition.csv"]
    )]
    pub sources: Vec<PathBuf>,

    /// Number of matching rows included per food
    #[arg(long, default_value_t = 1)]
    pub top_k: usize,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
