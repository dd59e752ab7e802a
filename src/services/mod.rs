//! Services - the three client workflows
//!
//! - `registration` - validates attendee details and submits a registration
//! - `verifier` - exact-match ticket verification with a distinguishing outcome
//! - `directory` - participant list plus stats, filtered client-side

pub mod directory;
pub mod registration;
pub mod verifier;

#[cfg(test)]
pub(crate) mod fake;

// Re-export commonly used types
pub use directory::{filter_participants, Directory, DirectoryReader};
pub use registration::{
    Avatar, AvatarError, ImageKind, RegistrationError, RegistrationForm, RegistrationSubmitter,
    DEFAULT_MAX_AVATAR_BYTES,
};
pub use verifier::{TicketVerifier, VerificationOutcome};
