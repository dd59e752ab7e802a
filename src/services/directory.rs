//! Participant directory reader
//!
//! One round trip each for the list and the stats, joined into a snapshot.
//! Filtering happens client-side over the snapshot.

use crate::domain::types::{Participant, Stats};
use crate::io::api::{ApiError, RegistrarApi};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Case-insensitive substring match against name, email and handle.
/// An empty or whitespace-only query keeps every participant; any other
/// query is matched as typed, surrounding spaces included.
pub fn filter_participants<'a>(participants: &'a [Participant], query: &str) -> Vec<&'a Participant> {
    if query.trim().is_empty() {
        return participants.iter().collect();
    }
    let needle = query.to_lowercase();
    participants.iter().filter(|p| p.matches_lowercase(&needle)).collect()
}

/// A loaded directory snapshot
#[derive(Debug, Clone)]
pub struct Directory {
    pub participants: Vec<Participant>,
    pub stats: Stats,
    /// The registrar reported more rows than it returned
    pub truncated: bool,
    pub loaded_at: DateTime<Utc>,
}

impl Directory {
    pub fn filter(&self, query: &str) -> Vec<&Participant> {
        filter_participants(&self.participants, query)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

pub struct DirectoryReader {
    api: Arc<dyn RegistrarApi>,
}

impl DirectoryReader {
    pub fn new(api: Arc<dyn RegistrarApi>) -> Self {
        Self { api }
    }

    /// Fetch list and stats concurrently; either failure fails the load
    pub async fn load(&self) -> Result<Directory, ApiError> {
        let (page, stats) = tokio::try_join!(self.api.participants(), self.api.stats())?;

        let truncated = page.is_truncated();
        if truncated {
            warn!(
                returned = %page.participants.len(),
                total = %page.total.unwrap_or_default(),
                "directory_truncated"
            );
        }

        info!(
            participants = %page.participants.len(),
            total = %stats.total_participants,
            today = %stats.today_registrations,
            "directory_loaded"
        );

        Ok(Directory { participants: page.participants, stats, truncated, loaded_at: Utc::now() })
    }
}
