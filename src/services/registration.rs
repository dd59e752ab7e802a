//! Registration submitter
//!
//! Packages the attendee fields and an optional avatar into one request and
//! forwards it to the registrar. Required fields and the avatar are checked
//! before anything is sent; the registrar's own validation errors come back
//! as its message. No retry.

use crate::domain::types::{Participant, RegistrationRequest};
use crate::io::api::{ApiError, RegistrarApi};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Raw avatar size limit, in bytes
pub const DEFAULT_MAX_AVATAR_BYTES: usize = 500_000;

/// Image formats accepted as avatars, identified by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvatarError {
    #[error("avatar file is empty")]
    Empty,

    #[error("File size exceeds {}KB limit ({size} bytes)", kilobytes(.limit))]
    TooLarge { size: u64, limit: usize },

    #[error("avatar must be a PNG, JPEG, GIF or WebP image")]
    NotAnImage,

    #[error("could not read avatar {path}: {message}")]
    Read { path: String, message: String },
}

fn kilobytes(bytes: &usize) -> usize {
    bytes / 1000
}

/// A validated avatar image
#[derive(Debug, Clone)]
pub struct Avatar {
    kind: ImageKind,
    bytes: Bytes,
}

impl Avatar {
    /// Validate raw image bytes against the size limit and accepted formats
    pub fn from_bytes(bytes: impl Into<Bytes>, limit: usize) -> Result<Self, AvatarError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(AvatarError::Empty);
        }
        if bytes.len() > limit {
            return Err(AvatarError::TooLarge { size: bytes.len() as u64, limit });
        }
        let kind = ImageKind::sniff(&bytes).ok_or(AvatarError::NotAnImage)?;
        Ok(Self { kind, bytes })
    }

    /// Read and validate an image file; oversized files are refused before reading
    pub async fn from_path(path: &Path, limit: usize) -> Result<Self, AvatarError> {
        let read_error =
            |e: std::io::Error| AvatarError::Read { path: path.display().to_string(), message: e.to_string() };

        let size = tokio::fs::metadata(path).await.map_err(read_error)?.len();
        if size > limit as u64 {
            return Err(AvatarError::TooLarge { size, limit });
        }
        let bytes = tokio::fs::read(path).await.map_err(read_error)?;
        Self::from_bytes(bytes, limit)
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Inline `data:<mime>;base64,<data>` URL, as sent to the registrar
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.kind.mime(), STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Avatar(#[from] AvatarError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl RegistrationError {
    /// The single message surfaced to users
    pub fn user_message(&self) -> String {
        match self {
            RegistrationError::MissingField(_) | RegistrationError::Avatar(_) => self.to_string(),
            RegistrationError::Api(e) => e.user_message(),
        }
    }

    /// True when the form was refused before any request was made
    pub fn is_local(&self) -> bool {
        !matches!(self, RegistrationError::Api(_))
    }
}

/// Attendee details as entered
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub github_username: String,
    pub avatar: Option<Avatar>,
}

impl RegistrationForm {
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        github_username: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            github_username: github_username.into(),
            avatar: None,
        }
    }

    pub fn with_avatar(mut self, avatar: Avatar) -> Self {
        self.avatar = Some(avatar);
        self
    }

    /// All three text fields must be non-empty after trimming
    pub fn validate(&self) -> Result<(), RegistrationError> {
        for (field, value) in [
            ("full_name", &self.full_name),
            ("email", &self.email),
            ("github_username", &self.github_username),
        ] {
            if value.trim().is_empty() {
                return Err(RegistrationError::MissingField(field));
            }
        }
        Ok(())
    }

    pub fn to_request(&self) -> RegistrationRequest {
        RegistrationRequest {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            github_username: self.github_username.trim().to_string(),
            avatar: self.avatar.as_ref().map(Avatar::to_data_url),
        }
    }
}

pub struct RegistrationSubmitter {
    api: Arc<dyn RegistrarApi>,
}

impl RegistrationSubmitter {
    pub fn new(api: Arc<dyn RegistrarApi>) -> Self {
        Self { api }
    }

    /// Submit a registration once; the returned participant always carries a ticket id
    pub async fn submit(&self, form: &RegistrationForm) -> Result<Participant, RegistrationError> {
        if let Err(e) = form.validate() {
            info!(reason = %e, "registration_refused_locally");
            return Err(e);
        }

        let request = form.to_request();
        let participant = match self.api.register(&request).await {
            Ok(participant) => participant,
            Err(e) => {
                warn!(
                    error = %e,
                    user_message = %e.user_message(),
                    "registration_failed"
                );
                return Err(e.into());
            }
        };

        if participant.ticket_id.trim().is_empty() {
            warn!(id = %participant.id, "registration_missing_ticket_id");
            return Err(RegistrationError::Api(ApiError::Decode {
                endpoint: "register",
                message: "participant has no ticket id".to_string(),
            }));
        }

        info!(
            ticket_id = %participant.ticket_id,
            id = %participant.id,
            avatar = %participant.avatar_filename.is_some(),
            "registration_submitted"
        );
        Ok(participant)
    }
}
