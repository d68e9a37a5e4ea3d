//! Supabase auth, storage and table calls against a mocked project.

use std::time::Duration;

use frame_contracts::payload::ImagePayload;
use frame_contracts::records::{AuthSession, ImagePage, NewImageRecord};
use frame_engine::{ImageStore, StoreError, SupabaseStore};
use mockito::Matcher;
use serde_json::{json, Map};

fn store(server: &mockito::Server) -> SupabaseStore {
    SupabaseStore::new(
        server.url(),
        Some("anon-key".to_string()),
        Duration::from_secs(5),
    )
    .expect("store client")
}

fn session() -> AuthSession {
    AuthSession {
        access_token: "user-jwt".to_string(),
        user_id: "u1".to_string(),
    }
}

#[test]
fn password_sign_in_returns_session() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/auth/v1/token")
        .match_query(Matcher::UrlEncoded(
            "grant_type".to_string(),
            "password".to_string(),
        ))
        .match_header("apikey", "anon-key")
        .match_body(Matcher::Json(
            json!({"email": "a@example.com", "password": "hunter2"}),
        ))
        .with_status(200)
        .with_body(r#"{"access_token": "user-jwt", "user": {"id": "u1"}}"#)
        .create();

    let session = store(&server)
        .sign_in_with_password("a@example.com", "hunter2")
        .expect("session");
    assert_eq!(session.user_id, "u1");
    assert_eq!(session.access_token, "user-jwt");
    mock.assert();
}

#[test]
fn rejected_sign_in_keeps_server_message() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/auth/v1/token")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#)
        .create();

    let err = store(&server)
        .sign_in_with_password("a@example.com", "wrong")
        .err();
    assert_eq!(
        err,
        Some(StoreError::Request {
            status: 400,
            message: "Invalid login credentials".to_string(),
        })
    );
}

#[test]
fn plain_text_errors_are_capped() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/rest/v1/images")
        .match_query(Matcher::Any)
        .with_status(502)
        .with_body("bad gateway ".repeat(400))
        .create();

    let err = store(&server)
        .list_images(&session(), ImagePage::default())
        .err();
    let Some(StoreError::Request { status, message }) = err else {
        panic!("expected a request error, got {err:?}");
    };
    assert_eq!(status, 502);
    assert!(message.starts_with("bad gateway"));
    assert!(message.chars().count() <= 513, "{} chars", message.chars().count());
}

#[test]
fn get_image_reads_one_row_or_not_found() {
    let mut server = mockito::Server::new();
    let found = server
        .mock("GET", "/rest/v1/images")
        .match_query(Matcher::UrlEncoded("id".to_string(), "eq.rec-1".to_string()))
        .with_status(200)
        .with_body(
            json!([{
                "id": "rec-1",
                "user_id": "u1",
                "original_image_url": "https://cdn.example/o.jpg",
                "enhanced_image_url": "https://cdn.example/e.jpg",
                "milestone_id": "engagement",
                "milestone_name": "Engagement",
                "prompt": null,
                "created_at": "2026-02-01T00:00:00Z"
            }])
            .to_string(),
        )
        .create();
    server
        .mock("GET", "/rest/v1/images")
        .match_query(Matcher::UrlEncoded("id".to_string(), "eq.rec-2".to_string()))
        .with_status(200)
        .with_body("[]")
        .create();

    let client = store(&server);
    let record = client.get_image(&session(), "rec-1").expect("row");
    assert_eq!(record.milestone_name.as_deref(), Some("Engagement"));
    assert_eq!(
        client.get_image(&session(), "rec-2"),
        Err(StoreError::NotFound("rec-2".to_string()))
    );
    found.assert();
}

#[test]
fn upload_posts_bytes_under_user_folder() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock(
            "POST",
            Matcher::Regex(r"^/storage/v1/object/images/u1/originals/\d+-[0-9a-f]{8}\.png$".to_string()),
        )
        .match_header("authorization", "Bearer user-jwt")
        .match_header("content-type", "image/png")
        .match_header("x-upsert", "false")
        .match_body("png-bytes")
        .with_status(200)
        .with_body(r#"{"Key": "images/u1/originals/x.png"}"#)
        .create();

    let client = store(&server);
    let stored = client
        .upload_image(
            &session(),
            &ImagePayload::from_bytes(b"png-bytes", "image/png"),
            "originals",
        )
        .expect("upload");
    assert!(stored.path.starts_with("u1/originals/"));
    assert_eq!(stored.url, client.public_url(&stored.path));
    mock.assert();
}

#[test]
fn upload_of_non_data_payload_never_calls_out() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", Matcher::Regex("^/storage/".to_string()))
        .expect(0)
        .create();

    let err = store(&server)
        .upload_image(&session(), &ImagePayload::new("photo.jpg"), "originals")
        .err();
    assert!(matches!(err, Some(StoreError::InvalidPayload(_))));
    mock.assert();
}

#[test]
fn create_record_returns_representation() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/rest/v1/images")
        .match_header("prefer", "return=representation")
        .match_body(Matcher::PartialJson(json!({
            "user_id": "u1",
            "milestone_id": "wedding",
            "status": "completed",
        })))
        .with_status(201)
        .with_body(
            json!([{
                "id": "rec-1",
                "user_id": "u1",
                "original_image_url": "https://cdn.example/o.jpg",
                "enhanced_image_url": "https://cdn.example/e.jpg",
                "milestone_id": "wedding",
                "milestone_name": "Wedding Day",
                "prompt": "p",
                "status": "completed",
                "metadata": {},
                "created_at": "2026-01-01T00:00:00Z"
            }])
            .to_string(),
        )
        .create();

    let record = store(&server)
        .create_image_record(
            &session(),
            NewImageRecord {
                user_id: "someone-else".to_string(),
                original_image_url: "https://cdn.example/o.jpg".to_string(),
                enhanced_image_url: "https://cdn.example/e.jpg".to_string(),
                milestone_id: "wedding".to_string(),
                milestone_name: "Wedding Day".to_string(),
                prompt: "p".to_string(),
                status: "completed".to_string(),
                metadata: Map::new(),
            },
        )
        .expect("record");
    assert_eq!(record.id, "rec-1");
    mock.assert();
}

#[test]
fn list_is_scoped_ordered_and_paged() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/rest/v1/images")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("user_id".to_string(), "eq.u1".to_string()),
            Matcher::UrlEncoded("order".to_string(), "created_at.desc".to_string()),
            Matcher::UrlEncoded("limit".to_string(), "10".to_string()),
            Matcher::UrlEncoded("offset".to_string(), "20".to_string()),
        ]))
        .with_status(200)
        .with_body(
            json!([
                {
                    "id": "rec-2",
                    "user_id": "u1",
                    "original_image_url": "base64-uploaded",
                    "enhanced_image_url": null,
                    "milestone_id": "vacation",
                    "milestone_name": null,
                    "prompt": null,
                    "created_at": "2026-02-01T00:00:00Z"
                }
            ])
            .to_string(),
        )
        .create();

    let rows = store(&server)
        .list_images(&session(), ImagePage { limit: 10, offset: 20 })
        .expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].milestone_id, "vacation");
    assert_eq!(rows[0].status, "completed");
    mock.assert();
}

#[test]
fn delete_of_missing_row_is_not_found() {
    let mut server = mockito::Server::new();
    server
        .mock("DELETE", "/rest/v1/images")
        .match_query(Matcher::UrlEncoded("id".to_string(), "eq.rec-404".to_string()))
        .with_status(200)
        .with_body("[]")
        .create();

    assert_eq!(
        store(&server).delete_image(&session(), "rec-404"),
        Err(StoreError::NotFound("rec-404".to_string()))
    );
}
