//! Ticket identity, QR payload and the printable ticket card

use crate::domain::types::Participant;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Optional marker shown in front of ticket ids (`#TC1A2B3C`)
pub const TICKET_MARKER: char = '#';

/// Normalized ticket identifier
///
/// Only `[A-Za-z0-9_-]` survives normalization, so the id is always safe to
/// place in a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

#[inline]
fn is_ticket_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl TicketId {
    /// Normalize a typed identifier: trim, drop one leading marker, trim again.
    ///
    /// Returns `None` for malformed input (empty or containing other characters).
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let unmarked = trimmed.strip_prefix(TICKET_MARKER).unwrap_or(trimmed).trim();
        if unmarked.is_empty() || !unmarked.chars().all(is_ticket_char) {
            return None;
        }
        Some(Self(unmarked.to_string()))
    }

    /// Accept either a typed identifier or the JSON text read from a ticket's QR code
    pub fn from_scan(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            let payload: QrPayload = serde_json::from_str(trimmed).ok()?;
            return Self::parse(&payload.ticket_id);
        }
        Self::parse(trimmed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier with the display marker (`#TC1A2B3C`)
    pub fn marked(&self) -> String {
        format!("{}{}", TICKET_MARKER, self.0)
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event details printed on tickets and embedded in QR payloads
///
/// Missing keys keep their defaults, so a partial `[event]` section parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventInfo {
    pub name: String,
    pub location: String,
    pub date: String,
}

impl Default for EventInfo {
    fn default() -> Self {
        Self {
            name: "Coding Conf 2025".to_string(),
            location: "Austin, TX".to_string(),
            date: "2025-08-23".to_string(),
        }
    }
}

/// JSON document encoded into a ticket's QR image
///
/// A scanner only needs `ticket_id`; every other field is tolerated missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    pub ticket_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub generated_at: Option<NaiveDateTime>,
}

impl QrPayload {
    pub fn for_participant(
        participant: &Participant,
        event: &EventInfo,
        generated_at: NaiveDateTime,
    ) -> Self {
        Self {
            ticket_id: participant.ticket_id.clone(),
            name: participant.full_name.clone(),
            email: participant.email.clone(),
            github: participant.github_username.clone(),
            event: event.name.clone(),
            location: event.location.clone(),
            date: event.date.clone(),
            verified: true,
            generated_at: Some(generated_at),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Render a participant's ticket as a boxed text card
pub fn render_ticket(participant: &Participant, event: &EventInfo, qr_url: Option<&str>) -> String {
    let registered = participant
        .registration_date
        .map(|d| d.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        event.name.clone(),
        format!("{} | {}", event.date, event.location),
        String::new(),
        participant.full_name.clone(),
        participant.handle(),
        participant.email.clone(),
        String::new(),
        format!("Ticket     {}{}", TICKET_MARKER, participant.ticket_id),
        format!("Registered {}", registered),
    ];
    if let Some(url) = qr_url {
        lines.push(format!("QR         {}", url));
    }

    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let mut card = String::with_capacity((width + 4) * (lines.len() + 2) * 3);
    card.push('╭');
    card.push_str(&"─".repeat(width + 2));
    card.push_str("╮\n");
    for line in &lines {
        let pad = width - line.chars().count();
        card.push_str("│ ");
        card.push_str(line);
        card.push_str(&" ".repeat(pad));
        card.push_str(" │\n");
    }
    card.push('╰');
    card.push_str(&"─".repeat(width + 2));
    card.push('╯');
    card
}
