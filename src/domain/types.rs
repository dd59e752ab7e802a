//! Registrar wire types shared by the client, the dashboard and the mock registrar

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A registered attendee as issued by the registrar
///
/// Created once by the registrar on a successful registration and never
/// modified by the client afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub id: i64,
    pub ticket_id: String,
    pub full_name: String,
    pub email: String,
    /// External-account handle (GitHub username)
    pub github_username: String,
    #[serde(default)]
    pub avatar_filename: Option<String>,
    #[serde(default)]
    pub qr_code_filename: Option<String>,
    /// Naive UTC timestamp, ISO 8601 without offset
    #[serde(default)]
    pub registration_date: Option<NaiveDateTime>,
}

impl Participant {
    /// Case-insensitive substring match against name, email and handle.
    ///
    /// `needle` must already be lowercased.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        self.full_name.to_lowercase().contains(needle)
            || self.email.to_lowercase().contains(needle)
            || self.github_username.to_lowercase().contains(needle)
    }

    /// Handle with the conventional `@` prefix
    pub fn handle(&self) -> String {
        format!("@{}", self.github_username.trim_start_matches('@'))
    }
}

/// Aggregate registration counters (read-only snapshot)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_participants: u64,
    pub today_registrations: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_registrations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<NaiveDateTime>,
}

/// Flat verification view: valid flag, participant when valid, error otherwise
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /api/register` body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub github_username: String,
    /// Inline image as a `data:<mime>;base64,<data>` URL
    #[serde(default)]
    pub avatar: Option<String>,
}

/// `POST /api/register` success body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Participant>,
}

/// `GET /api/verify/{ticket_id}` body, for both the 200 and the 404 case
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<NaiveDateTime>,
}

/// `GET /api/participants` body
///
/// The paging fields are informational only; the client never requests pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantsPage {
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
}

impl ParticipantsPage {
    /// True when the registrar reports more rows than it returned
    pub fn is_truncated(&self) -> bool {
        self.total.is_some_and(|total| total > self.participants.len() as u64)
    }
}

/// `GET /api/health` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// Error envelope returned on non-2xx responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), message: None }
    }

    /// Server-provided text, preferring `error` over `message`
    pub fn into_text(self) -> Option<String> {
        self.error.or(self.message).filter(|text| !text.trim().is_empty())
    }
}

#[cfg(test)]
pub(crate) fn sample_participant(ticket_id: &str, name: &str, email: &str) -> Participant {
    Participant {
        id: 1,
        ticket_id: ticket_id.to_string(),
        full_name: name.to_string(),
        email: email.to_string(),
        github_username: name.to_lowercase().replace(' ', ""),
        avatar_filename: None,
        qr_code_filename: Some(format!("qr_{}.png", ticket_id)),
        registration_date: None,
    }
}
