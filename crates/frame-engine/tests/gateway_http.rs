//! End-to-end gateway paths against mocked backend and vendor endpoints.

use std::sync::Arc;
use std::time::Duration;

use frame_contracts::payload::ImagePayload;
use frame_contracts::records::{
    AuthSession, ImagePage, ImageRecord, NewImageRecord, StoredObject,
};
use frame_engine::{
    BackendClient, EnhancementGateway, EnhancementPath, EnhancementResult, GatewayContext,
    ImageStore, MemoryImageStore, RequestBuilder, StoreError, VendorClient,
};
use mockito::Matcher;
use serde_json::json;

const ENHANCE_PATH: &str = "/functions/v1/enhance-image";
const VENDOR_PATH: &str = "/api/v1/images/generate";
const TIMEOUT: Duration = Duration::from_secs(5);

fn signed_in() -> GatewayContext {
    GatewayContext::authenticated(AuthSession {
        access_token: "user-jwt".to_string(),
        user_id: "u1".to_string(),
    })
}

fn backend(server: &mockito::Server) -> BackendClient {
    BackendClient::new(
        format!("{}/functions/v1", server.url()),
        Some("anon-key".to_string()),
        TIMEOUT,
    )
    .expect("backend client")
}

fn vendor(server: &mockito::Server) -> VendorClient {
    VendorClient::new(format!("{}{VENDOR_PATH}", server.url()), "vendor-key", TIMEOUT)
        .expect("vendor client")
}

fn gateway() -> EnhancementGateway {
    EnhancementGateway::new(RequestBuilder::default()).with_demo_delay(Duration::ZERO)
}

#[test]
fn signed_in_user_goes_through_backend_even_with_vendor_key() {
    let mut server = mockito::Server::new();
    let backend_mock = server
        .mock("POST", ENHANCE_PATH)
        .match_header("authorization", "Bearer user-jwt")
        .match_header("apikey", "anon-key")
        .match_body(Matcher::PartialJson(json!({
            "image_url": "https://photos.example/p.jpg",
            "milestone_id": "wedding",
            "milestone_name": "Wedding Day",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"success": true, "enhanced_image_url": "https://cdn.example/e.jpg", "image_id": "rec-1"}"#,
        )
        .expect(1)
        .create();
    let vendor_mock = server.mock("POST", VENDOR_PATH).expect(0).create();

    let gateway = gateway()
        .with_backend(backend(&server))
        .with_vendor(vendor(&server));
    let outcome = gateway.run(
        &ImagePayload::new("https://photos.example/p.jpg"),
        "wedding",
        &signed_in(),
    );

    assert_eq!(outcome.path, EnhancementPath::BackendProxied);
    assert_eq!(
        outcome.result,
        EnhancementResult::Success {
            image_url: "https://cdn.example/e.jpg".to_string(),
            record_id: Some("rec-1".to_string()),
        }
    );
    backend_mock.assert();
    vendor_mock.assert();
}

#[test]
fn uploaded_original_is_sent_by_url() {
    let mut server = mockito::Server::new();
    let backend_mock = server
        .mock("POST", ENHANCE_PATH)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""image_url":"memory://images/u1/originals/[^"]+\.jpg""#.to_string()),
            Matcher::PartialJson(json!({"milestone_id": "anniversary"})),
        ]))
        .with_status(200)
        .with_body(r#"{"success": true, "enhanced_image_url": "https://cdn.example/a.jpg"}"#)
        .create();

    let store = Arc::new(MemoryImageStore::default());
    let gateway = gateway()
        .with_backend(backend(&server))
        .with_store(store.clone());
    let outcome = gateway.run(
        &ImagePayload::from_bytes(b"jpeg", "image/jpeg"),
        "anniversary",
        &signed_in(),
    );

    assert!(outcome.result.is_success());
    assert_eq!(outcome.upload_error, None);
    assert_eq!(store.object_count(), 1);
    backend_mock.assert();
}

/// Storage that rejects every upload, as an expired bucket policy would.
struct RejectingStore;

impl ImageStore for RejectingStore {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn upload_image(
        &self,
        _session: &AuthSession,
        _payload: &ImagePayload,
        _folder: &str,
    ) -> Result<StoredObject, StoreError> {
        Err(StoreError::Request {
            status: 403,
            message: "new row violates row-level security policy".to_string(),
        })
    }

    fn create_image_record(
        &self,
        _session: &AuthSession,
        _record: NewImageRecord,
    ) -> Result<ImageRecord, StoreError> {
        Err(StoreError::Other("read-only".to_string()))
    }

    fn get_image(&self, _session: &AuthSession, image_id: &str) -> Result<ImageRecord, StoreError> {
        Err(StoreError::NotFound(image_id.to_string()))
    }

    fn list_images(
        &self,
        _session: &AuthSession,
        _page: ImagePage,
    ) -> Result<Vec<ImageRecord>, StoreError> {
        Ok(Vec::new())
    }

    fn delete_image(&self, _session: &AuthSession, image_id: &str) -> Result<(), StoreError> {
        Err(StoreError::NotFound(image_id.to_string()))
    }
}

#[test]
fn failed_upload_falls_back_to_inline_payload() {
    let mut server = mockito::Server::new();
    let backend_mock = server
        .mock("POST", ENHANCE_PATH)
        .match_body(Matcher::PartialJson(
            json!({"image_base64": "data:image/jpeg;base64,AAAA"}),
        ))
        .with_status(200)
        .with_body(r#"{"success": true, "enhanced_image_url": "https://cdn.example/v.jpg"}"#)
        .create();

    let gateway = gateway()
        .with_backend(backend(&server))
        .with_store(Arc::new(RejectingStore));
    let outcome = gateway.run(
        &ImagePayload::new("data:image/jpeg;base64,AAAA"),
        "vacation",
        &signed_in(),
    );

    assert!(outcome.result.is_success());
    let upload_error = outcome.upload_error.unwrap_or_default();
    assert!(upload_error.starts_with("Failed to upload source image:"));
    assert!(upload_error.contains("row-level security"));
    backend_mock.assert();
}

#[test]
fn remote_photo_is_forwarded_without_upload() {
    let mut server = mockito::Server::new();
    let backend_mock = server
        .mock("POST", ENHANCE_PATH)
        .match_body(Matcher::PartialJson(
            json!({"image_url": "https://cdn.example/couple.jpg"}),
        ))
        .with_status(200)
        .with_body(r#"{"success": true, "enhanced_image_url": "https://cdn.example/w.jpg"}"#)
        .create();

    let store = Arc::new(MemoryImageStore::default());
    let gateway = gateway()
        .with_backend(backend(&server))
        .with_store(store.clone());
    let outcome = gateway.run(
        &ImagePayload::new("https://cdn.example/couple.jpg"),
        "wedding",
        &signed_in(),
    );

    assert!(outcome.result.is_success());
    assert!(outcome.upload_error.is_none());
    assert_eq!(store.object_count(), 0);
    backend_mock.assert();
}

#[test]
fn local_reference_is_sent_inline_without_warning() {
    let mut server = mockito::Server::new();
    let backend_mock = server
        .mock("POST", ENHANCE_PATH)
        .match_body(Matcher::PartialJson(json!({"image_base64": "photo.jpg"})))
        .with_status(200)
        .with_body(r#"{"success": true, "enhanced_image_url": "https://cdn.example/v.jpg"}"#)
        .create();

    let gateway = gateway()
        .with_backend(backend(&server))
        .with_store(Arc::new(MemoryImageStore::default()));
    let outcome = gateway.run(&ImagePayload::new("photo.jpg"), "vacation", &signed_in());

    assert!(outcome.result.is_success());
    assert!(outcome.upload_error.is_none());
    backend_mock.assert();
}

#[test]
fn backend_error_field_becomes_the_failure_message() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", ENHANCE_PATH)
        .with_status(429)
        .with_body(r#"{"error": "Daily limit reached"}"#)
        .create();

    let gateway = gateway().with_backend(backend(&server));
    let result = gateway.enhance(&ImagePayload::new("photo.jpg"), "wedding", &signed_in());
    assert_eq!(
        result,
        EnhancementResult::Failure {
            message: "Daily limit reached".to_string()
        }
    );
}

#[test]
fn backend_error_without_body_reports_status() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", ENHANCE_PATH)
        .with_status(500)
        .with_body("upstream exploded")
        .create();

    let gateway = gateway().with_backend(backend(&server));
    let result = gateway.enhance(&ImagePayload::new("photo.jpg"), "wedding", &signed_in());
    assert_eq!(
        result,
        EnhancementResult::Failure {
            message: "request failed with status 500".to_string()
        }
    );
}

#[test]
fn backend_success_flag_and_missing_url_are_failures() {
    let mut server = mockito::Server::new();
    let gateway = gateway().with_backend(backend(&server));
    let image = ImagePayload::new("photo.jpg");

    let unflagged = server
        .mock("POST", ENHANCE_PATH)
        .with_status(200)
        .with_body(r#"{"success": false}"#)
        .create();
    assert_eq!(
        gateway.enhance(&image, "wedding", &signed_in()),
        EnhancementResult::Failure {
            message: "An unexpected error occurred".to_string()
        }
    );
    unflagged.remove();

    server
        .mock("POST", ENHANCE_PATH)
        .with_status(200)
        .with_body(r#"{"success": true, "image_id": "rec-9"}"#)
        .create();
    assert_eq!(
        gateway.enhance(&image, "wedding", &signed_in()),
        EnhancementResult::Failure {
            message: "No image URL in API response".to_string()
        }
    );
}

#[test]
fn unreadable_backend_body_is_quoted_but_capped() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", ENHANCE_PATH)
        .with_status(200)
        .with_body(format!("<html>{}</html>", "x".repeat(4_000)))
        .create();

    let gateway = gateway().with_backend(backend(&server));
    let EnhancementResult::Failure { message } =
        gateway.enhance(&ImagePayload::new("photo.jpg"), "wedding", &signed_in())
    else {
        panic!("an html body is not a backend reply");
    };
    assert!(message.starts_with("backend returned an unreadable body: <html>"));
    assert!(message.chars().count() < 600, "{} chars", message.chars().count());
}

#[test]
fn anonymous_user_with_key_calls_vendor_directly() {
    let mut server = mockito::Server::new();
    let backend_mock = server.mock("POST", ENHANCE_PATH).expect(0).create();
    let vendor_mock = server
        .mock("POST", VENDOR_PATH)
        .match_header("authorization", "Bearer vendor-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "nano-banana-pro",
            "image_input": ["data:image/jpeg;base64,AAAA"],
            "resolution": "4K",
            "aspect_ratio": "4:3",
            "preserve_faces": true,
            "quality": "ultra",
        })))
        .with_status(200)
        .with_body(r#"{"data": {"image_url": "https://cdn.example/y.jpg"}}"#)
        .create();

    let gateway = gateway()
        .with_backend(backend(&server))
        .with_vendor(vendor(&server));
    let outcome = gateway.run(
        &ImagePayload::new("data:image/jpeg;base64,AAAA"),
        "first-date",
        &GatewayContext::anonymous(),
    );

    assert_eq!(outcome.path, EnhancementPath::DirectVendor);
    assert!(outcome.reason.contains("no signed-in session"));
    assert_eq!(
        outcome.result,
        EnhancementResult::Success {
            image_url: "https://cdn.example/y.jpg".to_string(),
            record_id: None,
        }
    );
    vendor_mock.assert();
    backend_mock.assert();
}

#[test]
fn vendor_prompt_carries_milestone_template_and_suffix() {
    let mut server = mockito::Server::new();
    let expected_prompt = RequestBuilder::default()
        .build_prompt("celebration")
        .expect("known milestone");
    let vendor_mock = server
        .mock("POST", VENDOR_PATH)
        .match_body(Matcher::PartialJson(json!({ "prompt": expected_prompt })))
        .with_status(200)
        .with_body(r#"{"image_url": "https://cdn.example/c.jpg"}"#)
        .create();

    let gateway = gateway().with_vendor(vendor(&server));
    let result = gateway.enhance(
        &ImagePayload::new("photo.jpg"),
        "celebration",
        &GatewayContext::anonymous(),
    );
    assert!(result.is_success());
    vendor_mock.assert();
}

#[test]
fn vendor_unknown_body_shape_is_reported() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", VENDOR_PATH)
        .with_status(200)
        .with_body(r#"{"unexpected": "field"}"#)
        .create();

    let gateway = gateway().with_vendor(vendor(&server));
    let result = gateway.enhance(
        &ImagePayload::new("photo.jpg"),
        "wedding",
        &GatewayContext::anonymous(),
    );
    assert_eq!(
        result,
        EnhancementResult::Failure {
            message: "Unexpected API response format".to_string()
        }
    );
}

#[test]
fn vendor_error_message_is_surfaced() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", VENDOR_PATH)
        .with_status(402)
        .with_body(r#"{"message": "Insufficient credits"}"#)
        .create();

    let gateway = gateway().with_vendor(vendor(&server));
    let result = gateway.enhance(
        &ImagePayload::new("photo.jpg"),
        "wedding",
        &GatewayContext::anonymous(),
    );
    assert_eq!(
        result,
        EnhancementResult::Failure {
            message: "Insufficient credits".to_string()
        }
    );
}

#[test]
fn demo_path_makes_no_network_calls() {
    let mut server = mockito::Server::new();
    let backend_mock = server.mock("POST", ENHANCE_PATH).expect(0).create();

    let gateway = gateway().with_backend(backend(&server));
    let outcome = gateway.run(
        &ImagePayload::new("photo.jpg"),
        "wedding",
        &GatewayContext::anonymous(),
    );

    assert_eq!(outcome.path, EnhancementPath::Demonstration);
    assert_eq!(
        outcome.result,
        EnhancementResult::Success {
            image_url: "photo.jpg".to_string(),
            record_id: None,
        }
    );
    backend_mock.assert();
}

#[test]
fn unknown_milestone_never_reaches_the_network() {
    let mut server = mockito::Server::new();
    let backend_mock = server.mock("POST", ENHANCE_PATH).expect(0).create();
    let vendor_mock = server.mock("POST", VENDOR_PATH).expect(0).create();

    let gateway = gateway()
        .with_backend(backend(&server))
        .with_vendor(vendor(&server));
    for context in [signed_in(), GatewayContext::anonymous()] {
        let result = gateway.enhance(&ImagePayload::new("photo.jpg"), "graduation", &context);
        assert_eq!(
            result,
            EnhancementResult::Failure {
                message: "Unknown milestone: graduation".to_string()
            }
        );
    }
    backend_mock.assert();
    vendor_mock.assert();
}

#[test]
fn backend_health_reflects_reachability() {
    let mut server = mockito::Server::new();
    server.mock("GET", ENHANCE_PATH).with_status(200).create();
    let healthy = backend(&server).health();
    assert!(healthy.healthy);
    assert_eq!(healthy.status, Some(200));

    let unreachable = BackendClient::new("http://127.0.0.1:9/functions/v1", None, TIMEOUT)
        .expect("backend client")
        .health();
    assert!(!unreachable.healthy);
    assert!(unreachable.error.is_some());
}
