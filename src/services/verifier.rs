//! Ticket verifier
//!
//! Exact-match lookup of a ticket identifier against the registrar. The
//! outcome keeps "the registrar does not know this ticket" apart from "the
//! registrar could not be asked", which the flat `VerificationResult` folds
//! together.

use crate::domain::ticket::TicketId;
use crate::domain::types::{Participant, VerificationResult};
use crate::io::api::{RegistrarApi, GENERIC_ERROR_MESSAGE};
use std::sync::Arc;
use tracing::{info, warn};

const NOT_FOUND_MESSAGE: &str = "Ticket not found";
const MALFORMED_MESSAGE: &str = "Invalid ticket ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The registrar holds a participant with this exact ticket id
    Valid { participant: Participant },
    /// The registrar answered and does not know the ticket
    NotFound { ticket: TicketId, message: String },
    /// Input could not be normalized into a ticket id; nothing was sent
    Malformed { input: String },
    /// Network failure, server error or an unreadable answer
    Unavailable { ticket: TicketId, message: String },
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid { .. })
    }

    /// Short uppercase label for banners and logs
    pub fn label(&self) -> &'static str {
        match self {
            VerificationOutcome::Valid { .. } => "VALID",
            VerificationOutcome::NotFound { .. } => "NOT FOUND",
            VerificationOutcome::Malformed { .. } => "MALFORMED",
            VerificationOutcome::Unavailable { .. } => "UNAVAILABLE",
        }
    }

    /// The single user-facing message for non-valid outcomes
    pub fn message(&self) -> Option<&str> {
        match self {
            VerificationOutcome::Valid { .. } => None,
            VerificationOutcome::NotFound { message, .. }
            | VerificationOutcome::Unavailable { message, .. } => Some(message),
            VerificationOutcome::Malformed { .. } => Some(MALFORMED_MESSAGE),
        }
    }

    /// Flatten into the valid/participant/error view
    pub fn into_result(self) -> VerificationResult {
        match self {
            VerificationOutcome::Valid { participant } => {
                VerificationResult { valid: true, participant: Some(participant), error: None }
            }
            VerificationOutcome::NotFound { message, .. }
            | VerificationOutcome::Unavailable { message, .. } => {
                VerificationResult { valid: false, participant: None, error: Some(message) }
            }
            VerificationOutcome::Malformed { .. } => VerificationResult {
                valid: false,
                participant: None,
                error: Some(MALFORMED_MESSAGE.to_string()),
            },
        }
    }
}

pub struct TicketVerifier {
    api: Arc<dyn RegistrarApi>,
}

impl TicketVerifier {
    pub fn new(api: Arc<dyn RegistrarApi>) -> Self {
        Self { api }
    }

    /// Verify a typed ticket id or a scanned QR payload
    pub async fn verify(&self, input: &str) -> VerificationOutcome {
        let Some(ticket) = TicketId::from_scan(input) else {
            info!(input_len = %input.len(), "ticket_malformed");
            return VerificationOutcome::Malformed { input: input.to_string() };
        };

        let outcome = match self.api.verify(&ticket).await {
            Ok(response) => match (response.valid, response.participant) {
                (true, Some(participant)) => VerificationOutcome::Valid { participant },
                (true, None) => VerificationOutcome::Unavailable {
                    ticket: ticket.clone(),
                    message: GENERIC_ERROR_MESSAGE.to_string(),
                },
                (false, _) => VerificationOutcome::NotFound {
                    ticket: ticket.clone(),
                    message: response
                        .error
                        .or(response.message)
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| NOT_FOUND_MESSAGE.to_string()),
                },
            },
            Err(e) => {
                warn!(ticket_id = %ticket, error = %e, "ticket_verify_unavailable");
                VerificationOutcome::Unavailable { ticket: ticket.clone(), message: e.user_message() }
            }
        };

        info!(ticket_id = %ticket, outcome = %outcome.label(), "ticket_verified");
        outcome
    }
}
