//! In-process `RegistrarApi` used by the service unit tests

use crate::domain::ticket::TicketId;
use crate::domain::types::{
    Participant, ParticipantsPage, RegistrationRequest, Stats, VerifyResponse,
};
use crate::io::api::{ApiError, RegistrarApi};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub(crate) struct FakeRegistrar {
    participants: Mutex<Vec<Participant>>,
    register_failure: Mutex<Option<ApiError>>,
    verify_failure: Mutex<Option<ApiError>>,
    stats_failure: Mutex<Option<ApiError>>,
    blank_tickets: Mutex<bool>,
    reported_total: Mutex<Option<u64>>,
    register_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl FakeRegistrar {
    pub(crate) fn with_participants(participants: Vec<Participant>) -> Self {
        let fake = Self::default();
        *fake.participants.lock() = participants;
        fake
    }

    /// Next register call fails with `error`
    pub(crate) fn fail_register_with(&self, error: ApiError) {
        *self.register_failure.lock() = Some(error);
    }

    /// Next verify call fails with `error`
    pub(crate) fn fail_verify_with(&self, error: ApiError) {
        *self.verify_failure.lock() = Some(error);
    }

    /// Next stats call fails with `error`
    pub(crate) fn fail_stats_with(&self, error: ApiError) {
        *self.stats_failure.lock() = Some(error);
    }

    pub(crate) fn issue_blank_tickets(&self) {
        *self.blank_tickets.lock() = true;
    }

    /// Report a list total different from the rows returned
    pub(crate) fn report_total(&self, total: u64) {
        *self.reported_total.lock() = Some(total);
    }

    pub(crate) fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RegistrarApi for FakeRegistrar {
    async fn register(&self, request: &RegistrationRequest) -> Result<Participant, ApiError> {
        self.register_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.register_failure.lock().take() {
            return Err(error);
        }

        let mut participants = self.participants.lock();
        let id = participants.len() as i64 + 1;
        let ticket_id =
            if *self.blank_tickets.lock() { String::new() } else { format!("TC{:06X}", id) };
        let participant = Participant {
            id,
            ticket_id: ticket_id.clone(),
            full_name: request.full_name.clone(),
            email: request.email.clone(),
            github_username: request.github_username.trim_start_matches('@').to_string(),
            avatar_filename: request.avatar.as_ref().map(|_| format!("avatar_{:08x}.png", id)),
            qr_code_filename: Some(format!("qr_{}.json", ticket_id)),
            registration_date: None,
        };
        participants.push(participant.clone());
        Ok(participant)
    }

    async fn verify(&self, ticket: &TicketId) -> Result<VerifyResponse, ApiError> {
        self.verify_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.verify_failure.lock().take() {
            return Err(error);
        }

        let found =
            self.participants.lock().iter().find(|p| p.ticket_id == ticket.as_str()).cloned();
        Ok(match found {
            Some(participant) => {
                VerifyResponse { valid: true, participant: Some(participant), ..Default::default() }
            }
            None => VerifyResponse {
                valid: false,
                message: Some("Ticket not found".to_string()),
                ..Default::default()
            },
        })
    }

    async fn participants(&self) -> Result<ParticipantsPage, ApiError> {
        let participants = self.participants.lock().clone();
        let total = self.reported_total.lock().unwrap_or(participants.len() as u64);
        Ok(ParticipantsPage { participants, total: Some(total), ..Default::default() })
    }

    async fn stats(&self) -> Result<Stats, ApiError> {
        if let Some(error) = self.stats_failure.lock().take() {
            return Err(error);
        }
        let total = self.participants.lock().len() as u64;
        Ok(Stats { total_participants: total, today_registrations: total, ..Default::default() })
    }
}
