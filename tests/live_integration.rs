use std::time::{SystemTime, UNIX_EPOCH};

use catalog_http::{CatalogClient, ClientOptions, Gender, NewPerson};

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock must be after epoch")
        .as_millis()
}

#[tokio::test]
async fn live_health_and_actor_roundtrip() {
    let options = match ClientOptions::from_env() {
        Ok(options) => options,
        Err(_) => {
            eprintln!("skipping live test: CATALOG_BACKEND_URL not set");
            return;
        }
    };
    let client = CatalogClient::new(options);

    let health = client.health().await.expect("health check must succeed");
    assert!(health.database_connected(), "backend database must be connected");

    let name = format!("Live Actor {}", unique_suffix());
    client
        .add_actor(&NewPerson {
            name: name.clone(),
            bio: "Created by the live integration test".to_owned(),
            image: "https://example.com/actor.jpg".to_owned(),
            dob: "1980-05-17".to_owned(),
            gender: Gender::Others,
        })
        .await
        .expect("add actor must succeed");

    let actors = client.actors().await.expect("actors must load");
    let created = actors
        .iter()
        .find(|actor| actor.name == name)
        .expect("created actor must be listed");
    let id = created.id.clone().expect("listed actor must have an id");

    let fetched = client.actor(&id).await.expect("actor must load by id");
    assert_eq!(fetched.name, name);

    client
        .delete_actor(&id)
        .await
        .expect("cleanup delete must succeed");
}
