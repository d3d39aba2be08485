//! The feed service against a mock Metlink API

use metlink_relay::{web, Configuration, FeedError, FeedKey, FeedService};
use serde_json::json;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use warp::http::StatusCode;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};
use zip::write::SimpleFileOptions;

const API_KEY: &str = "test-key";

const VEHICLE_POSITIONS: &str = r#"{
  "header": { "gtfsRealtimeVersion": "2.0", "incrementality": 0, "timestamp": 1705276800 },
  "entity": [
    {
      "id": "2181",
      "vehicle": {
        "trip": { "tripId": "83__0__101__TZM__501__1", "routeId": 830, "scheduleRelationship": 0 },
        "vehicle": { "id": "2181" },
        "position": { "latitude": -41.2865, "longitude": 174.7762, "bearing": 210 },
        "timestamp": 1705276795
      }
    }
  ]
}"#;

fn archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn metlink_archive() -> Vec<u8> {
    archive(&[
        ("routes.txt", "route_id,route_type,route_color\n10,3,308ad9\n"),
        (
            "stops.txt",
            "stop_id,stop_code,stop_name,stop_lat,stop_lon\n5000,5000,\"Lambton Quay, Stop A\",-41.2795,174.7767\n",
        ),
    ])
}

fn config(server: &MockServer) -> Configuration {
    Configuration {
        api_key: Some(API_KEY.to_owned()),
        static_feed_url: format!("{}/gtfs/full.zip", server.uri()),
        realtime_feed_url: format!("{}/gtfs-rt/vehiclepositions", server.uri()),
        ..Configuration::default()
    }
}

fn service(config: Configuration) -> Arc<FeedService> {
    Arc::new(FeedService::new(config).unwrap())
}

fn key(name: &str) -> FeedKey {
    FeedKey::new(name).unwrap()
}

async fn json_of(service: &Arc<FeedService>, name: &str) -> serde_json::Value {
    let payload = service.get_feed(&key(name)).await.unwrap();
    serde_json::from_slice(&payload.decoded().unwrap()).unwrap()
}

async fn mount_archive(server: &MockServer, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/gtfs/full.zip"))
        .and(header("x-api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(metlink_archive()))
        .expect(expected_fetches)
        .mount(server)
        .await;
}

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gtfs/full.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(metlink_archive())
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let service = service(config(&server));

    let requests = (0..16).map(|i| {
        let service = Arc::clone(&service);
        let table = if i % 2 == 0 { "routes" } else { "stops" };
        tokio::spawn(async move { service.get_feed(&key(table)).await })
    });
    let payloads = futures::future::join_all(requests).await;

    let routes = service.get_feed(&key("routes")).await.unwrap();
    for (i, payload) in payloads.into_iter().enumerate() {
        let payload = payload.unwrap().unwrap();
        if i % 2 == 0 {
            assert_eq!(routes, payload);
        }
    }
    assert_eq!(1, server.received_requests().await.unwrap().len());
}

#[tokio::test]
async fn routes_are_served_typed() {
    let server = MockServer::start().await;
    mount_archive(&server, 1).await;
    let filter = web::routes(service(config(&server)));

    let response = warp::test::request().path("/api/routes").reply(&filter).await;
    assert_eq!(StatusCode::OK, response.status());
    let routes: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(
        json!([{"route_id": "10", "route_type": 3, "route_color": "308ad9"}]),
        routes
    );

    let response = warp::test::request().path("/stops").reply(&filter).await;
    let stops: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!("Lambton Quay, Stop A", stops[0]["stop_name"]);
    assert_eq!("5000", stops[0]["stop_code"]);
    assert_eq!(-41.2795, stops[0]["stop_lat"]);
}

#[tokio::test]
async fn archive_index_lists_the_tables() {
    let server = MockServer::start().await;
    mount_archive(&server, 1).await;
    let service = service(config(&server));

    let index = json_of(&service, "gtfs").await;
    assert_eq!(json!(["routes", "stops"]), index["tables"]);
    assert_eq!(json!(["routes.txt", "stops.txt"]), index["files"]);
    assert_eq!(64, index["sha256"].as_str().unwrap().len());
}

#[tokio::test]
async fn unknown_table_is_not_found_without_refetching() {
    let server = MockServer::start().await;
    mount_archive(&server, 1).await;
    let service = service(config(&server));

    assert_eq!(
        Err(FeedError::TableNotFound(key("fare_rules"))),
        service.get_feed(&key("fare_rules")).await
    );
    assert_eq!(
        Err(FeedError::TableNotFound(key("transfers"))),
        service.get_feed(&key("transfers")).await
    );
    assert!(service.get_feed(&key("routes")).await.is_ok());
}

#[tokio::test]
async fn missing_credential_never_reaches_upstream() {
    let server = MockServer::start().await;
    mount_archive(&server, 0).await;
    let filter = web::routes(service(Configuration {
        api_key: None,
        ..config(&server)
    }));

    let response = warp::test::request().path("/api/routes").reply(&filter).await;
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, response.status());
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn upstream_failure_without_cache_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let service = service(config(&server));

    assert_eq!(
        Err(FeedError::UpstreamHttp { status: 500 }),
        service.get_feed(&key("routes")).await
    );

    let response = warp::test::request()
        .path("/api/vehiclepositions")
        .reply(&web::routes(service))
        .await;
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, response.status());
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(metlink_archive())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let service = service(Configuration {
        upstream_timeout: Duration::from_millis(200),
        ..config(&server)
    });

    assert_eq!(
        Err(FeedError::UpstreamTimeout),
        service.get_feed(&key("routes")).await
    );
}

#[tokio::test]
async fn corrupt_archive_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gtfs/full.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    let service = service(config(&server));

    let outcome = service.get_feed(&key("routes")).await;
    assert!(matches!(outcome, Err(FeedError::CorruptArchive(_))));
}

#[tokio::test]
async fn expired_entries_are_refetched() {
    let server = MockServer::start().await;
    mount_archive(&server, 2).await;
    let service = service(Configuration {
        static_ttl: Duration::ZERO,
        ..config(&server)
    });

    assert!(service.get_feed(&key("routes")).await.is_ok());
    assert!(service.get_feed(&key("routes")).await.is_ok());
}

#[tokio::test]
async fn small_capacity_does_not_refetch_fresh_tables() {
    let server = MockServer::start().await;
    mount_archive(&server, 1).await;
    let service = service(Configuration {
        cache_capacity: 2,
        ..config(&server)
    });

    for _ in 0..3 {
        for table in ["routes", "stops", "gtfs"] {
            assert!(service.get_feed(&key(table)).await.is_ok(), "{table}");
        }
    }
    assert_eq!(3, service.cache().len());
}

#[tokio::test]
async fn expired_entry_is_served_when_refresh_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gtfs/full.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(metlink_archive()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gtfs/full.zip"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let service = service(Configuration {
        static_ttl: Duration::ZERO,
        ..config(&server)
    });

    let fresh = service.get_feed(&key("routes")).await.unwrap();
    let stale = service.get_feed(&key("routes")).await.unwrap();
    assert_eq!(fresh, stale);
    assert_eq!(2, server.received_requests().await.unwrap().len());
}

#[tokio::test]
async fn expired_entry_is_not_served_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gtfs/full.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(metlink_archive()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gtfs/full.zip"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let service = service(Configuration {
        static_ttl: Duration::ZERO,
        serve_stale: false,
        ..config(&server)
    });

    assert!(service.get_feed(&key("routes")).await.is_ok());
    assert_eq!(
        Err(FeedError::UpstreamHttp { status: 503 }),
        service.get_feed(&key("routes")).await
    );
}

#[tokio::test]
async fn vehicle_positions_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gtfs-rt/vehiclepositions"))
        .and(header("x-api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_raw(VEHICLE_POSITIONS, "application/json"))
        .expect(1)
        .mount(&server)
        .await;
    let service = service(config(&server));

    let feed = json_of(&service, "vehiclepositions").await;
    let vehicle = &feed["entity"][0]["vehicle"];
    assert_eq!("830", vehicle["trip"]["route_id"]);
    assert_eq!("83__0__101__TZM__501__1", vehicle["trip"]["trip_id"]);
    assert_eq!("2181", vehicle["vehicle"]["id"]);
    assert_eq!(1_705_276_800u64, feed["header"]["timestamp"]);
    assert_eq!("2.0", feed["header"]["gtfs_realtime_version"]);

    // Within the realtime ttl
    json_of(&service, "vehiclepositions").await;
}

#[tokio::test]
async fn realtime_and_static_fetches_are_independent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gtfs/full.zip"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gtfs-rt/vehiclepositions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(VEHICLE_POSITIONS, "application/json"))
        .mount(&server)
        .await;
    let service = service(config(&server));

    assert!(service.get_feed(&key("routes")).await.is_err());
    assert!(service.get_feed(&key("vehiclepositions")).await.is_ok());
}

#[tokio::test]
async fn malformed_vehicle_entities_do_not_fail_the_feed() {
    let server = MockServer::start().await;
    let document = json!({
        "header": { "gtfsRealtimeVersion": "2.0", "incrementality": "FULL_DATASET", "timestamp": 1705276800 },
        "entity": [
            { "vehicle": { "position": { "latitude": -41.29, "longitude": 174.78 } } },
            {
                "id": "2181",
                "vehicle": {
                    "trip": { "routeId": 830 },
                    "position": { "latitude": "north", "longitude": 174.7762 },
                    "occupancyStatus": "NO_DATA"
                }
            },
            { "id": "2204", "vehicle": { "trip": { "routeId": "14" } } }
        ]
    });
    Mock::given(method("GET"))
        .and(path("/gtfs-rt/vehiclepositions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document))
        .expect(1)
        .mount(&server)
        .await;
    let filter = web::routes(service(config(&server)));

    let response = warp::test::request()
        .path("/api/vehiclepositions")
        .reply(&filter)
        .await;
    assert_eq!(StatusCode::OK, response.status());
    let feed: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    let entities = feed["entity"].as_array().unwrap();
    assert_eq!(2, entities.len());
    assert_eq!("2181", entities[0]["id"]);
    assert_eq!("830", entities[0]["vehicle"]["trip"]["route_id"]);
    assert!(entities[0]["vehicle"].get("position").is_none());
    assert!(entities[0]["vehicle"].get("occupancy_status").is_none());
    assert_eq!("14", entities[1]["vehicle"]["trip"]["route_id"]);
}
