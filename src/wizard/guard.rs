//! Client-side gate against double submission.
//!
//! This is advisory concurrency control for a single wizard. It keeps one
//! client from firing the same commit twice; it gives no exactly-once
//! guarantee on the server side.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::time::Instant;
use tracing::debug;

/// Identity of one submission attempt: the normalized project name and the
/// moment the commit started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    name_key: String,
    started_at: Instant,
}

impl Fingerprint {
    pub fn new(project_name: &str, started_at: Instant) -> Self {
        Self {
            name_key: project_name.trim().to_lowercase(),
            started_at,
        }
    }

    pub fn now(project_name: &str) -> Self {
        Self::new(project_name, Instant::now())
    }

    pub fn name_key(&self) -> &str {
        &self.name_key
    }
}

#[derive(Debug, Default)]
struct GuardState {
    in_flight: bool,
    accepted: Vec<Fingerprint>,
}

/// Single-flight plus duplicate-window gate. Cloning shares the state.
#[derive(Debug, Clone)]
pub struct SubmissionGuard {
    window: Duration,
    state: Arc<Mutex<GuardState>>,
}

impl SubmissionGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Arc::new(Mutex::new(GuardState::default())),
        }
    }

    /// Try to start a submission. Returns `None` while another submission is
    /// in flight, or when a submission with the same project name was
    /// accepted within the trailing window, even if it already finished.
    ///
    /// The returned permit clears the in-flight flag when dropped; the
    /// accepted fingerprint stays on record until its window expires.
    pub fn try_acquire(&self, fingerprint: Fingerprint) -> Option<SubmissionPermit> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let window = self.window;
        let now = fingerprint.started_at;
        state
            .accepted
            .retain(|seen| now.saturating_duration_since(seen.started_at) < window);

        if state.in_flight {
            debug!(name = fingerprint.name_key(), "submission rejected: in flight");
            return None;
        }
        if state
            .accepted
            .iter()
            .any(|seen| seen.name_key == fingerprint.name_key)
        {
            debug!(name = fingerprint.name_key(), "submission rejected: duplicate within window");
            return None;
        }

        state.in_flight = true;
        state.accepted.push(fingerprint);
        Some(SubmissionPermit {
            state: self.state.clone(),
        })
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().map(|s| s.in_flight).unwrap_or(false)
    }
}

/// Held for the duration of one commit.
#[derive(Debug)]
pub struct SubmissionPermit {
    state: Arc<Mutex<GuardState>>,
}

impl Drop for SubmissionPermit {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_flight = false;
    }
}
