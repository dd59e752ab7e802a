//! In-memory registrar speaking the registrar HTTP contract
//!
//! Used by the `mock-registrar` binary for local runs and by the integration
//! tests. Uses hyper for the HTTP server.
//!
//! Routes:
//! - POST /api/register
//! - GET  /api/verify/{ticket_id}
//! - GET  /api/participants
//! - GET  /api/stats
//! - GET  /api/health
//! - GET  /uploads/{filename}, /qr_codes/{filename}
//!
//! QR assets hold the `QrPayload` JSON text rather than a rendered image.

use crate::domain::ticket::{EventInfo, QrPayload};
use crate::domain::types::{
    ErrorBody, HealthStatus, Participant, ParticipantsPage, RegisterResponse, RegistrationRequest,
    Stats, VerifyResponse,
};
use crate::services::registration::ImageKind;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDateTime, Utc};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Largest accepted request body (500 KiB)
pub const MAX_REQUEST_BYTES: usize = 500 * 1024;

/// Oversized bodies up to this size are read off the socket before the 413 is sent
const DRAIN_LIMIT_BYTES: usize = 16 * 1024 * 1024;

const AVATAR_ROUTE: &str = "/uploads/";
const QR_ROUTE: &str = "/qr_codes/";
const VERIFY_ROUTE: &str = "/api/verify/";

/// A stored static asset
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub content_type: &'static str,
    pub bytes: Bytes,
}

/// Why a registration was refused (status + registrar message)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: String,
}

impl Rejection {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

#[derive(Default)]
struct Registry {
    participants: Vec<Participant>,
    by_ticket: FxHashMap<String, usize>,
    by_email: FxHashMap<String, usize>,
    avatars: FxHashMap<String, StoredAsset>,
    qr_codes: FxHashMap<String, StoredAsset>,
    next_id: i64,
}

/// `@` present and a `.` in the part after it
pub fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let _local = parts.next();
    matches!(parts.next(), Some(domain) if domain.contains('.'))
}

/// Decode an inline `data:` URL (or bare base64) into bytes
pub fn decode_data_url(data: &str) -> Option<Vec<u8>> {
    let encoded = match data.split_once(',') {
        Some((_, encoded)) => encoded,
        None => data,
    };
    STANDARD.decode(encoded.trim()).ok()
}

/// Random uppercase hex, taken from the random tail of a UUIDv7
fn random_hex(len_bytes: usize) -> String {
    let uuid = Uuid::now_v7();
    let bytes = uuid.as_bytes();
    hex::encode_upper(&bytes[16 - len_bytes..])
}

pub struct MockRegistrar {
    registry: Mutex<Registry>,
    event: EventInfo,
}

impl MockRegistrar {
    pub fn new(event: EventInfo) -> Self {
        Self { registry: Mutex::new(Registry { next_id: 1, ..Default::default() }), event }
    }

    /// Validate and store a registration, issuing its ticket and QR asset
    pub fn register(
        &self,
        request: RegistrationRequest,
        now: NaiveDateTime,
    ) -> Result<Participant, Rejection> {
        for (field, value) in [
            ("full_name", &request.full_name),
            ("email", &request.email),
            ("github_username", &request.github_username),
        ] {
            if value.trim().is_empty() {
                return Err(Rejection::bad_request(format!("{} is required", field)));
            }
        }

        let email = request.email.trim().to_lowercase();
        if !is_plausible_email(&email) {
            return Err(Rejection::bad_request("Invalid email format"));
        }

        let avatar = match request.avatar.as_deref().filter(|a| !a.is_empty()) {
            Some(data) => {
                let bytes = decode_data_url(data)
                    .ok_or_else(|| Rejection::bad_request("Failed to process avatar image"))?;
                let kind = ImageKind::sniff(&bytes)
                    .ok_or_else(|| Rejection::bad_request("Failed to process avatar image"))?;
                Some((kind, bytes))
            }
            None => None,
        };

        let mut registry = self.registry.lock();
        if registry.by_email.contains_key(&email) {
            return Err(Rejection::bad_request("Email already registered"));
        }

        let ticket_id = loop {
            let candidate = format!("TC{}", random_hex(3));
            if !registry.by_ticket.contains_key(&candidate) {
                break candidate;
            }
        };

        let avatar_filename = avatar.map(|(kind, bytes)| {
            let filename = format!("avatar_{}.{}", random_hex(4).to_lowercase(), kind.extension());
            registry.avatars.insert(
                filename.clone(),
                StoredAsset { content_type: kind.mime(), bytes: Bytes::from(bytes) },
            );
            filename
        });

        let id = registry.next_id;
        registry.next_id += 1;

        let mut participant = Participant {
            id,
            ticket_id: ticket_id.clone(),
            full_name: request.full_name.trim().to_string(),
            email: email.clone(),
            github_username: request.github_username.trim().replace('@', ""),
            avatar_filename,
            qr_code_filename: None,
            registration_date: Some(now),
        };

        let qr_filename = format!("qr_{}.json", ticket_id);
        let payload = QrPayload::for_participant(&participant, &self.event, now);
        registry.qr_codes.insert(
            qr_filename.clone(),
            StoredAsset { content_type: "application/json", bytes: Bytes::from(payload.to_json()) },
        );
        participant.qr_code_filename = Some(qr_filename);

        let index = registry.participants.len();
        registry.participants.push(participant.clone());
        registry.by_ticket.insert(ticket_id, index);
        registry.by_email.insert(email, index);

        Ok(participant)
    }

    /// Exact lookup after stripping markers and uppercasing
    pub fn verify(&self, raw_ticket_id: &str) -> Option<Participant> {
        let clean = raw_ticket_id.trim().replace('#', "").to_uppercase();
        let registry = self.registry.lock();
        registry.by_ticket.get(&clean).map(|&index| registry.participants[index].clone())
    }

    /// All participants, newest first
    pub fn participants(&self) -> Vec<Participant> {
        let registry = self.registry.lock();
        registry.participants.iter().rev().cloned().collect()
    }

    /// Totals for all time, the current UTC day and the current ISO week
    pub fn stats(&self, now: NaiveDateTime) -> Stats {
        let today = now.date();
        let week_start = today - ChronoDuration::days(today.weekday().num_days_from_monday() as i64);

        let registry = self.registry.lock();
        let mut today_registrations = 0;
        let mut week_registrations = 0;
        for date in registry.participants.iter().filter_map(|p| p.registration_date) {
            if date.date() == today {
                today_registrations += 1;
            }
            if date.date() >= week_start {
                week_registrations += 1;
            }
        }

        Stats {
            total_participants: registry.participants.len() as u64,
            today_registrations,
            week_registrations: Some(week_registrations),
            last_updated: Some(now),
        }
    }

    pub fn avatar(&self, filename: &str) -> Option<StoredAsset> {
        self.registry.lock().avatars.get(filename).cloned()
    }

    pub fn qr_code(&self, filename: &str) -> Option<StoredAsset> {
        self.registry.lock().qr_codes.get(filename).cloned()
    }

    pub fn len(&self) -> usize {
        self.registry.lock().participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now_utc() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => with_body(status, "application/json", Bytes::from(json)),
        Err(e) => {
            error!(error = %e, "mock_registrar_encode_error");
            with_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                Bytes::from_static(br#"{"error":"Internal server error"}"#),
            )
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &ErrorBody::new(message))
}

fn asset_response(asset: Option<StoredAsset>, missing: &str) -> Response<Full<Bytes>> {
    match asset {
        Some(asset) => with_body(StatusCode::OK, asset.content_type, asset.bytes),
        None => error_response(StatusCode::NOT_FOUND, missing),
    }
}

fn too_large() -> Response<Full<Bytes>> {
    error_response(StatusCode::PAYLOAD_TOO_LARGE, "File too large. Maximum size is 500KB")
}

async fn handle_register(req: Request<Incoming>, registrar: &MockRegistrar) -> Response<Full<Bytes>> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > MAX_REQUEST_BYTES) {
        // Drain so the client is not reset mid-upload
        let _ = Limited::new(req.into_body(), DRAIN_LIMIT_BYTES).collect().await;
        return too_large();
    }

    let body = match Limited::new(req.into_body(), MAX_REQUEST_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => return too_large(),
        Err(e) => {
            warn!(error = %e, "mock_registrar_body_error");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    let request: RegistrationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body"),
    };

    match registrar.register(request, now_utc()) {
        Ok(participant) => {
            info!(
                ticket_id = %participant.ticket_id,
                id = %participant.id,
                "mock_registration_created"
            );
            json_response(
                StatusCode::CREATED,
                &RegisterResponse {
                    success: true,
                    message: Some("Registration successful".to_string()),
                    ticket_id: Some(participant.ticket_id.clone()),
                    participant: Some(participant),
                },
            )
        }
        Err(rejection) => {
            info!(status = %rejection.status.as_u16(), reason = %rejection.message, "mock_registration_rejected");
            error_response(rejection.status, &rejection.message)
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    registrar: Arc<MockRegistrar>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/api/register") => handle_register(req, &registrar).await,
        (&Method::GET, "/api/participants") => {
            let participants = registrar.participants();
            let count = participants.len() as u64;
            json_response(
                StatusCode::OK,
                &ParticipantsPage {
                    participants,
                    total: Some(count),
                    pages: Some(1),
                    current_page: Some(1),
                    per_page: Some(count),
                },
            )
        }
        (&Method::GET, "/api/stats") => json_response(StatusCode::OK, &registrar.stats(now_utc())),
        (&Method::GET, "/api/health") => json_response(
            StatusCode::OK,
            &HealthStatus {
                status: "healthy".to_string(),
                timestamp: Some(now_utc()),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
        ),
        (&Method::GET, p) if p.starts_with(VERIFY_ROUTE) => {
            let ticket_id = &p[VERIFY_ROUTE.len()..];
            match registrar.verify(ticket_id) {
                Some(participant) => json_response(
                    StatusCode::OK,
                    &VerifyResponse {
                        valid: true,
                        participant: Some(participant),
                        verified_at: Some(now_utc()),
                        ..Default::default()
                    },
                ),
                None => json_response(
                    StatusCode::NOT_FOUND,
                    &VerifyResponse {
                        valid: false,
                        message: Some("Ticket not found".to_string()),
                        ..Default::default()
                    },
                ),
            }
        }
        (&Method::GET, p) if p.starts_with(AVATAR_ROUTE) => {
            asset_response(registrar.avatar(&p[AVATAR_ROUTE.len()..]), "File not found")
        }
        (&Method::GET, p) if p.starts_with(QR_ROUTE) => {
            asset_response(registrar.qr_code(&p[QR_ROUTE.len()..]), "QR code not found")
        }
        _ => error_response(StatusCode::NOT_FOUND, "Endpoint not found"),
    };

    Ok(response)
}

/// Serve the mock registrar on an already-bound listener until shutdown
pub async fn serve(
    listener: TcpListener,
    registrar: Arc<MockRegistrar>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "mock_registrar_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let registrar = registrar.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let registrar = registrar.clone();
                                async move { handle_request(req, registrar).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "mock_registrar_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "mock_registrar_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("mock_registrar_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

/// A mock registrar running on a background task
///
/// Dropping the handle stops the server.
pub struct MockServer {
    addr: SocketAddr,
    registrar: Arc<MockRegistrar>,
    shutdown_tx: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

impl MockServer {
    /// Bind `addr` (use port 0 for an ephemeral port) and start serving
    pub async fn start(addr: SocketAddr, event: EventInfo) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let registrar = Arc::new(MockRegistrar::new(event));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server_registrar = registrar.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = serve(listener, server_registrar, shutdown_rx).await {
                error!(error = %e, "mock_registrar_error");
            }
        });

        Ok(Self { addr, registrar, shutdown_tx, _task: task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn registrar(&self) -> &Arc<MockRegistrar> {
        &self.registrar
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
