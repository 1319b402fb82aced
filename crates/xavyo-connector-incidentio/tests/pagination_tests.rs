//! Integration tests for cursor pagination across list endpoints.

mod common;

use common::*;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xavyo_connector_incidentio::{IncidentIoClient, IncidentIoError};

#[tokio::test]
async fn test_list_all_schedules_follows_cursor() {
    let server = MockServer::start().await;
    let schedules: Vec<_> = (0..7)
        .map(|i| schedule_json(&format!("S{i}"), &format!("Schedule {i}")))
        .collect();

    Mock::given(method("GET"))
        .and(path("/v2/schedules"))
        .respond_with(PagedSchedules {
            schedules,
            page_size: 3,
        })
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let all = client
        .list_all_schedules(&CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["S0", "S1", "S2", "S3", "S4", "S5", "S6"]);
}

#[tokio::test]
async fn test_repeating_cursor_hits_page_cap() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_envelope(
            "users",
            vec![user_json("U1", "Alice")],
            Some("same-cursor"),
        )))
        .expect(10)
        .mount(&server)
        .await;

    let config = config_builder(&server.uri()).max_pages(10).build().unwrap();
    let client = IncidentIoClient::new(config).unwrap();

    let error = client
        .list_all_users(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error.root(),
        IncidentIoError::PaginationExceeded { max_pages: 10 }
    ));
    assert!(error.to_string().starts_with("list users: "));
}

#[tokio::test]
async fn test_default_page_cap_is_one_hundred() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_envelope(
            "schedules",
            vec![],
            Some("cursor-to-nowhere"),
        )))
        .expect(100)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client
        .list_all_schedules(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error.root(),
        IncidentIoError::PaginationExceeded { max_pages: 100 }
    ));
}

#[tokio::test]
async fn test_error_on_second_page_fails_listing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .and(query_param("after", "page-2"))
        .respond_with(ResponseTemplate::new(400).set_body_json(error_envelope(
            "validation_error",
            400,
            "Invalid pagination cursor",
        )))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_envelope(
            "users",
            vec![user_json("U1", "Alice")],
            Some("page-2"),
        )))
        .with_priority(2)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client
        .list_all_users(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(error.root(), IncidentIoError::Validation(_)));
}

#[tokio::test]
async fn test_entries_follow_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/schedule_entries"))
        .and(query_param("after", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_envelope(
            "schedule_entries",
            vec![entry_json("E2", "S1", "U2", "bob@example.com")],
            None,
        )))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/schedule_entries"))
        .and(query_param("schedule_id", "S1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_envelope(
            "schedule_entries",
            vec![entry_json("E1", "S1", "U1", "alice@example.com")],
            Some("next"),
        )))
        .with_priority(2)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let entries = client
        .list_entries("S1", None, None, &CancellationToken::new())
        .await
        .unwrap();
    let users: Vec<_> = entries.iter().map(|e| e.user.id.as_str()).collect();
    assert_eq!(users, ["U1", "U2"]);
}
