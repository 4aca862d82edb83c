use anyhow::{Context, Result};
use porsipas::advisor::{EncodedImage, OpenRouterAdvisor, API_KEY_ENV_VAR};
use porsipas::cli::parse_args;
use porsipas::dataset::DatasetCache;
use porsipas::session::{self, Role, Session};
use tokio::fs;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env file for API keys

    let cli_args = parse_args();

    println!("Loading nutrition databases...");
    let mut cache = DatasetCache::new();
    let dataset = cache
        .get_or_load(&cli_args.sources)
        .context("Failed to load any nutrition database")?;
    for warning in &dataset.warnings {
        eprintln!(
            "Warning: failed to load {}: {}",
            warning.path.display(),
            warning.message
        );
    }
    println!(
        "Loaded {} records covering {} distinct foods.",
        dataset.table.len(),
        dataset.food_names.len()
    );

    let advisor = OpenRouterAdvisor::new(API_KEY_ENV_VAR);
    let mut session = Session::new();

    if let Some(text) = &cli_args.text {
        println!("\nAnalysing your menu...");
        match session::analyze_text(&mut session, &dataset, &advisor, text, cli_args.top_k).await {
            Ok(report) => {
                if !report.detected.is_empty() {
                    println!("Foods detected in your sentence: {}", report.detected.join(", "));
                }
                if !report.not_found.is_empty() {
                    eprintln!("No data found for: {}", report.not_found.join(", "));
                }
            }
            Err(e) => eprintln!("Analysis failed: {:#}", e),
        }
    } else if let Some(image_path) = &cli_args.image {
        println!("\nAnalysing your photo...");
        let bytes = fs::read(image_path)
            .await
            .with_context(|| format!("Failed to read image file '{}'", image_path.display()))?;
        let image = EncodedImage::from_path_bytes(image_path, bytes);

        match session::analyze_image(&mut session, &dataset, &advisor, &image, cli_args.top_k).await
        {
            Ok(report) => match &report.matched {
                Some(matched) => println!(
                    "Image identified as '{}', data found for: {}",
                    report.detected, matched
                ),
                None => eprintln!(
                    "Food identified as '{}', but no data was found for it.",
                    report.detected
                ),
            },
            Err(e) => eprintln!("Image analysis failed: {:#}", e),
        }
    }

    for entry in session.messages() {
        let speaker = match entry.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        println!("\n[{}] {}", speaker, entry.content);
    }

    Ok(())
}
