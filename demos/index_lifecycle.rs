//! Create an index, read it back and delete it again.
//!
//! Run:
//! `cargo run --example index_lifecycle`
//!
//! Optional env vars:
//! - `MEILI_URL` (defaults to `http://localhost:7700`)
//! - `MEILI_API_KEY`

use meilisearch_async_client::MeiliClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::var("MEILI_URL").unwrap_or_else(|_| "http://localhost:7700".to_owned());
    let mut client = MeiliClient::new(url)?;
    if let Ok(key) = std::env::var("MEILI_API_KEY") {
        client = client.with_api_key(key);
    }

    let info = client.get_or_create_index("movies", Some("id")).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);

    let stats = client.index("movies").get_stats().await?;
    println!("{} documents", stats.number_of_documents);

    let deleted = client.delete_index_if_exists("movies").await?;
    println!("deleted: {deleted}");

    client.close();
    Ok(())
}
