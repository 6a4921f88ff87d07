use anyhow::Context;
use omero_meta_rust::config::ImportConfig;
use omero_meta_rust::{import_event_log, FileGraphStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let config = ImportConfig::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let input = config.input_path(std::env::args().nth(1))?;
    let json = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("Failed to read event log {}", input.display()))?;

    let store = FileGraphStore::new(config.store_directory()).await?;
    let (hash, summary) = import_event_log(&json, &store, config.store.compress)
        .await
        .with_context(|| format!("Import of {} aborted", input.display()))?;

    log::info!("Imported {}: {}", input.display(), summary);
    println!("{}", hash);

    Ok(())
}
