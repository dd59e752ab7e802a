//! Domain models - registrar records and ticket identity
//!
//! This module contains the canonical data types used throughout the crate:
//! - `Participant` - a registered attendee as issued by the registrar
//! - `Stats` - aggregate registration counters
//! - `VerificationResult` - flat valid/invalid verification view
//! - `TicketId` - normalized ticket identifier, the sole verification key
//! - `QrPayload` - the document encoded into a ticket's QR image

pub mod ticket;
pub mod types;

// Re-export commonly used types at module level
pub use ticket::{render_ticket, EventInfo, QrPayload, TicketId, TICKET_MARKER};
pub use types::{
    ErrorBody, HealthStatus, Participant, ParticipantsPage, RegisterResponse, RegistrationRequest,
    Stats, VerificationResult, VerifyResponse,
};
