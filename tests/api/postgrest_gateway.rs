use claim::{assert_err, assert_ok, assert_ok_eq};
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use thesis_vault::core::config::{GatewayConfig, StorageConfig};
use thesis_vault::core::AppErrorType;
use thesis_vault::db::{access_requests, storage, theses};
use thesis_vault::gateway::{Gateway, PostgrestGateway, Table};
use thesis_vault::models::access_requests::{NewAccessRequest, RequestStatus};

fn gateway(server: &MockServer) -> PostgrestGateway {
    PostgrestGateway::new(&GatewayConfig {
        base_url: server.uri(),
        api_key: Secret::new("anon-key".to_string()),
        timeout_seconds: 2,
    })
    .unwrap()
}

#[tokio::test]
async fn select_sends_key_headers_and_postgrest_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/thesestwo"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .and(query_param("thesis_id", "eq.42"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "thesis_id": 42,
            "title": "Edge Caching for Rural Clinics",
            "author": "R. Santos",
            "college": "College of Computing",
            "batch": "2023",
            "abstract": null,
            "file_url": "thesis-pdfs/edge.pdf",
            "qr_code_url": null,
            "available_copies": 2,
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let thesis = assert_ok!(theses::get_thesis_by_id(&gateway(&server), 42).await).unwrap();

    assert_eq!(thesis.title, "Edge Caching for Rural Clinics");
    assert_eq!(thesis.available_copies, 2);
}

#[tokio::test]
async fn file_name_lookup_uses_an_ilike_wildcard() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/thesestwo"))
        .and(query_param("file_url", "ilike.*edge.pdf*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let found = assert_ok!(theses::get_thesis_by_file_name(&gateway(&server), "edge.pdf").await);

    assert!(found.is_none());
}

#[tokio::test]
async fn a_409_on_insert_is_a_duplicate_pending_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/borrowing_requests"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = NewAccessRequest {
        user_id: 7,
        thesis_id: 42,
        status: RequestStatus::Pending,
        request_date: chrono::Utc::now(),
        approved_date: None,
        duration_days: 7,
        borrow_method: None,
    };
    let error = assert_err!(access_requests::insert_request(&gateway(&server), &request).await);

    assert!(error.is(AppErrorType::DuplicatePendingError));
}

#[tokio::test]
async fn count_reads_the_content_range_total() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/borrowing_requests"))
        .and(header("prefer", "count=exact"))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/2"))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok_eq!(access_requests::count_pending_requests(&gateway(&server), 7, 42).await, 2);
}

#[tokio::test]
async fn compare_and_swap_reports_a_lost_race() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/thesestwo"))
        .and(query_param("available_copies", "eq.3"))
        .and(body_json(json!({ "available_copies": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok_eq!(theses::swap_available_copies(&gateway(&server), 42, 3).await, false);
}

#[tokio::test]
async fn signed_urls_are_made_absolute() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/sign/thesis_files/thesis-pdfs/edge.pdf"))
        .and(body_json(json!({ "expiresIn": 3600 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "signedURL": "/object/sign/thesis_files/thesis-pdfs/edge.pdf?token=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = assert_ok!(
        storage::signed_document_url(
            &gateway(&server),
            &StorageConfig::default(),
            "https://x.supabase.co/storage/v1/object/public/thesis_files/thesis-pdfs/edge.pdf",
        )
        .await
    );

    assert_eq!(
        url,
        format!(
            "{}/storage/v1/object/sign/thesis_files/thesis-pdfs/edge.pdf?token=abc",
            server.uri()
        )
    );
}

#[tokio::test]
async fn server_errors_surface_as_gateway_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let error = assert_err!(
        gateway(&server)
            .select(Table::Users, &thesis_vault::gateway::Query::new().eq("id", 1))
            .await
    );

    assert!(error.to_string().contains("500"));
}
