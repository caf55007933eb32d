use std::sync::Arc;

use catalog_http::{ApiMetrics, CatalogClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catalog_http=debug")),
        )
        .init();

    let metrics = Arc::new(ApiMetrics::new());
    let client = CatalogClient::from_env()?.with_metrics(metrics.clone());

    let status = client.service_status().await;
    println!("service status: {status:?}");

    for movie in client.movies().await? {
        let producer = movie
            .producer
            .as_ref()
            .and_then(|producer| producer.populated())
            .map_or("Unknown", |producer| producer.name.as_str());
        println!(
            "{} ({}) directed by {}, produced by {producer}",
            movie.name,
            movie
                .year_of_release
                .map_or_else(|| "n/a".to_owned(), |year| year.to_string()),
            movie.director,
        );
    }

    println!("{}", serde_json::to_string_pretty(&metrics.snapshot())?);
    Ok(())
}
