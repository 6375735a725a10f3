//! Load documents from a json, ndjson or csv file into an index.
//!
//! Run:
//! `cargo run --example add_documents_from_file -- movies.json`
//!
//! Optional env vars:
//! - `MEILI_URL` (defaults to `http://localhost:7700`)
//! - `MEILI_API_KEY`

use std::path::PathBuf;

use meilisearch_async_client::MeiliClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("Pass the path of a documents file.");
        std::process::exit(2);
    };

    let url = std::env::var("MEILI_URL").unwrap_or_else(|_| "http://localhost:7700".to_owned());
    let mut client = MeiliClient::new(url)?;
    if let Ok(key) = std::env::var("MEILI_API_KEY") {
        client = client.with_api_key(key);
    }

    let index = client.index("movies");
    let accepted = index.add_documents_from_file(&path, Some("id")).await?;
    let task = index.wait_for_task(accepted.uid).await?;
    println!("{}", serde_json::to_string_pretty(&task)?);

    client.close();
    Ok(())
}
