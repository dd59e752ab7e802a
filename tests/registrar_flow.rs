//! End-to-end flows: the real registrar client against the in-memory mock registrar

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use ticket_desk::domain::{EventInfo, QrPayload, RegistrationRequest};
use ticket_desk::io::{ApiClient, ApiError, AssetKind, MockServer, RegistrarApi};
use ticket_desk::services::{
    Avatar, AvatarError, DirectoryReader, RegistrationError, RegistrationForm,
    RegistrationSubmitter, TicketVerifier, VerificationOutcome, DEFAULT_MAX_AVATAR_BYTES,
};

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

async fn start() -> (MockServer, Arc<ApiClient>) {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = MockServer::start(addr, EventInfo::default()).await.unwrap();
    let client = ApiClient::new(&server.base_url(), Duration::from_secs(5), "/uploads", "/qr_codes")
        .unwrap();
    (server, Arc::new(client))
}

async fn register(client: &Arc<ApiClient>, name: &str, email: &str, github: &str) -> String {
    let submitter = RegistrationSubmitter::new(client.clone());
    let participant =
        submitter.submit(&RegistrationForm::new(name, email, github)).await.unwrap();
    participant.ticket_id
}

#[tokio::test]
async fn test_register_then_verify() {
    let (server, client) = start().await;

    let submitter = RegistrationSubmitter::new(client.clone());
    let form = RegistrationForm::new("Ada Lovelace", "ada@example.com", "@ada")
        .with_avatar(Avatar::from_bytes(PNG_HEADER.to_vec(), DEFAULT_MAX_AVATAR_BYTES).unwrap());
    let participant = submitter.submit(&form).await.unwrap();

    assert!(!participant.ticket_id.is_empty());
    assert!(participant.ticket_id.starts_with("TC"));
    assert_eq!(participant.github_username, "ada");
    assert!(participant.avatar_filename.is_some());
    assert_eq!(server.registrar().len(), 1);

    let verifier = TicketVerifier::new(client.clone());
    match verifier.verify(&format!("#{}", participant.ticket_id)).await {
        VerificationOutcome::Valid { participant: found } => assert_eq!(found, participant),
        other => panic!("expected valid, got {:?}", other),
    }

    let result = verifier.verify(&participant.ticket_id).await.into_result();
    assert!(result.valid);
    assert_eq!(result.participant.unwrap().email, "ada@example.com");
}

#[tokio::test]
async fn test_verify_unknown_and_malformed() {
    let (_server, client) = start().await;
    register(&client, "Alan Turing", "alan@example.com", "alan").await;
    let verifier = TicketVerifier::new(client.clone());

    let outcome = verifier.verify("TC000000").await;
    assert!(matches!(outcome, VerificationOutcome::NotFound { .. }));
    let result = outcome.into_result();
    assert!(!result.valid);
    assert_eq!(result.error.as_deref(), Some("Ticket not found"));

    let outcome = verifier.verify("not a ticket!").await;
    assert!(matches!(outcome, VerificationOutcome::Malformed { .. }));
    assert!(!outcome.into_result().valid);

    // Malformed input never reaches the registrar
    assert_eq!(client.metrics().requests_total(), 2);
}

#[tokio::test]
async fn test_verify_unreachable_registrar_is_unavailable() {
    let (server, client) = start().await;
    drop(server);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcome = TicketVerifier::new(client).verify("TC123456").await;
    assert!(matches!(outcome, VerificationOutcome::Unavailable { .. }), "{:?}", outcome);
}

#[tokio::test]
async fn test_verify_through_wrong_path_prefix_is_unavailable() {
    let (server, client) = start().await;
    let ticket = register(&client, "Ada", "ada@example.com", "ada").await;

    // Routes under /conf do not exist; the registrar's generic 404 is not a lookup answer
    let misrouted = ApiClient::new(
        &format!("{}/conf", server.base_url()),
        Duration::from_secs(5),
        "/uploads",
        "/qr_codes",
    )
    .unwrap();
    let outcome = TicketVerifier::new(Arc::new(misrouted)).verify(&ticket).await;
    match &outcome {
        VerificationOutcome::Unavailable { message, .. } => assert_eq!(message, "Endpoint not found"),
        other => panic!("expected unavailable, got {:?}", other),
    }

    // Same ticket through the right base is valid
    assert!(TicketVerifier::new(client).verify(&ticket).await.is_valid());
}

#[tokio::test]
async fn test_duplicate_email_surfaces_server_message() {
    let (server, client) = start().await;
    register(&client, "Ada", "ada@example.com", "ada").await;

    let submitter = RegistrationSubmitter::new(client.clone());
    let err = submitter
        .submit(&RegistrationForm::new("Other Ada", "ADA@example.com", "ada2"))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Email already registered");
    assert_eq!(server.registrar().len(), 1);
}

#[tokio::test]
async fn test_directory_filter_by_email_substring() {
    let (_server, client) = start().await;
    register(&client, "Ada Lovelace", "ada@example.com", "ada").await;
    let grace = register(&client, "Grace Hopper", "grace@navy.mil", "grace").await;
    register(&client, "Alan Turing", "alan@bletchley.org", "alan").await;

    let directory = DirectoryReader::new(client.clone()).load().await.unwrap();
    assert_eq!(directory.len(), 3);
    assert_eq!(directory.stats.total_participants, 3);
    assert_eq!(directory.stats.today_registrations, 3);
    assert!(!directory.truncated);

    // newest first
    assert_eq!(directory.participants[0].full_name, "Alan Turing");

    let hits = directory.filter("NAVY.MIL");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].ticket_id, grace);
}

#[tokio::test]
async fn test_oversized_avatar_rejected_before_submission() {
    let (server, client) = start().await;

    let mut bytes = PNG_HEADER.to_vec();
    bytes.resize(DEFAULT_MAX_AVATAR_BYTES + 1, 0);
    let err = Avatar::from_bytes(bytes, DEFAULT_MAX_AVATAR_BYTES).unwrap_err();
    assert!(matches!(err, AvatarError::TooLarge { .. }));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.png");
    let mut bytes = PNG_HEADER.to_vec();
    bytes.resize(DEFAULT_MAX_AVATAR_BYTES * 2, 0);
    std::fs::write(&path, bytes).unwrap();
    let err = Avatar::from_path(&path, DEFAULT_MAX_AVATAR_BYTES).await.unwrap_err();
    assert!(matches!(RegistrationError::from(err), RegistrationError::Avatar(_)));

    assert!(server.registrar().is_empty());
    assert_eq!(client.metrics().requests_total(), 0);
}

#[tokio::test]
async fn test_registrar_rejects_oversized_body() {
    let (server, client) = start().await;

    let request = RegistrationRequest {
        full_name: "Big".to_string(),
        email: "big@example.com".to_string(),
        github_username: "big".to_string(),
        avatar: Some(format!("data:image/png;base64,{}", "A".repeat(600 * 1024))),
    };
    let err = client.register(&request).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 413, .. }), "{:?}", err);
    assert_eq!(err.user_message(), "File too large. Maximum size is 500KB");
    assert!(server.registrar().is_empty());
}

#[tokio::test]
async fn test_missing_field_rejected_by_registrar() {
    let (_server, client) = start().await;
    let request = RegistrationRequest {
        full_name: "No Email".to_string(),
        github_username: "none".to_string(),
        ..Default::default()
    };
    let err = client.register(&request).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.user_message(), "email is required");
}

#[tokio::test]
async fn test_qr_asset_download() {
    let (server, client) = start().await;
    let ticket = register(&client, "Ada", "ada@example.com", "ada").await;
    let participant = server.registrar().participants().remove(0);
    let filename = participant.qr_code_filename.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = client.save_asset(AssetKind::QrCode, &filename, dir.path()).await.unwrap();
    assert_eq!(path, dir.path().join(&filename));

    let payload: QrPayload = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(payload.ticket_id, ticket);
    assert_eq!(payload.event, "Coding Conf 2025");

    // The payload is itself a valid scan input
    let outcome = TicketVerifier::new(client.clone()).verify(&payload_text(&path)).await;
    assert!(outcome.is_valid());

    let err = client.fetch_asset(AssetKind::Avatar, "avatar_missing.png").await.unwrap_err();
    assert!(err.to_string().contains("404"));
}

fn payload_text(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_server, client) = start().await;
    let health = client.health().await.unwrap();
    assert!(health.is_healthy());
    assert!(health.version.is_some());
}
