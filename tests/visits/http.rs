//! HTTP surface tests: starts an axum server and drives it with reqwest.

use std::sync::Arc;
use std::time::Duration;

use petclinic_bus::bus::{InMemoryBroker, Subscriber};
use petclinic_bus::publisher::VisitPublisher;
use petclinic_bus::topology::TopologyContract;
use petclinic_bus::visits::{self, InMemoryVisitStore, VisitService};
use serde_json::{json, Value};

/// Bind to port 0 and return the base URL.
async fn start_server(broker: &InMemoryBroker) -> String {
    let contract = TopologyContract::pet_clinic();
    contract.declare(broker).unwrap();
    let service = Arc::new(VisitService::new(
        InMemoryVisitStore::new(),
        VisitPublisher::new(broker.clone(), contract),
    ));

    let app = visits::router(service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_check() {
    let base = start_server(&InMemoryBroker::new()).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn post_visit_returns_created_and_publishes() {
    let broker = InMemoryBroker::new();
    let base = start_server(&broker).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/owners/1/pets/7/visits"))
        .json(&json!({ "date": "2024-05-01", "description": "rabies shot" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "id": 1, "petId": 7, "date": "2024-05-01", "description": "rabies shot" })
    );

    let delivery = broker
        .receive("visit-info", Duration::from_millis(50))
        .unwrap()
        .unwrap();
    assert_eq!(delivery.trace_id(), Some("pet.id.7"));
}

#[tokio::test]
async fn list_visits_for_one_and_many_pets() {
    let base = start_server(&InMemoryBroker::new()).await;
    let client = reqwest::Client::new();

    for pet_id in [1, 2, 3] {
        let resp = client
            .post(format!("{base}/owners/1/pets/{pet_id}/visits"))
            .json(&json!({ "date": "2024-05-01", "description": "checkup" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let one: Value = client
        .get(format!("{base}/owners/1/pets/2/visits"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(one.as_array().unwrap().len(), 1);
    assert_eq!(one[0]["petId"], 2);

    let many: Value = client
        .get(format!("{base}/pets/visits?petId=1,3"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let pets: Vec<u64> = many["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["petId"].as_u64().unwrap())
        .collect();
    assert_eq!(pets, vec![1, 3]);

    let repeated: Value = client
        .get(format!("{base}/pets/visits?petId=2&petId=3"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(repeated["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn bad_pet_ids_are_rejected() {
    let base = start_server(&InMemoryBroker::new()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/owners/1/pets/0/visits"))
        .json(&json!({ "description": "checkup" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .get(format!("{base}/owners/1/pets/0/visits"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .get(format!("{base}/pets/visits?petId=1,0"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .get(format!("{base}/pets/visits?petId=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
