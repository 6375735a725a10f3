//! Change a few settings of an index and print the result.
//!
//! Run:
//! `cargo run --example update_settings`
//!
//! Optional env vars:
//! - `MEILI_URL` (defaults to `http://localhost:7700`)
//! - `MEILI_API_KEY`

use meilisearch_async_client::{MeiliClient, Settings, TypoTolerance};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::var("MEILI_URL").unwrap_or_else(|_| "http://localhost:7700".to_owned());
    let mut client = MeiliClient::new(url)?;
    if let Ok(key) = std::env::var("MEILI_API_KEY") {
        client = client.with_api_key(key);
    }

    client.get_or_create_index("movies", Some("id")).await?;
    let index = client.index("movies");

    let settings = Settings::new()
        .with_searchable_attributes(["title", "overview"])
        .with_sortable_attributes(["release_date"])
        .with_typo_tolerance(TypoTolerance::disabled());
    let accepted = index.update_settings(&settings).await?;
    index.wait_for_task(accepted.uid).await?.into_result()?;

    println!("{}", serde_json::to_string_pretty(&index.get_settings().await?)?);
    client.close();
    Ok(())
}
