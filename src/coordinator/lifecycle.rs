use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::request::{QueryName, Source};
use crate::errors::{FederationError, FederationResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestState {
    Received,
    Dispatched(Source),
    Normalized,
    Returned,
    Failed,
    ErrorReported,
}

impl RequestState {
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Received, Dispatched(_))
                | (Received, Failed)
                | (Dispatched(_), Normalized)
                | (Dispatched(_), Failed)
                | (Normalized, Returned)
                | (Failed, ErrorReported)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Returned | RequestState::ErrorReported)
    }
}

/// State trail of one logical request.
#[derive(Debug)]
pub struct RequestLifecycle {
    query: QueryName,
    trail: Vec<RequestState>,
}

impl RequestLifecycle {
    pub fn new(query: QueryName) -> Self {
        debug!(query = query.as_str(), state = ?RequestState::Received, "request state");
        Self {
            query,
            trail: vec![RequestState::Received],
        }
    }

    pub fn query(&self) -> QueryName {
        self.query
    }

    pub fn current(&self) -> RequestState {
        self.trail
            .last()
            .copied()
            .unwrap_or(RequestState::Received)
    }

    pub fn advance(&mut self, next: RequestState) -> FederationResult<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!(query = self.query.as_str(), from = ?current, to = ?next, "invalid request transition");
            return Err(FederationError::query(format!(
                "{} cannot move from {current:?} to {next:?}",
                self.query
            )));
        }
        debug!(query = self.query.as_str(), state = ?next, "request state");
        self.trail.push(next);
        Ok(())
    }

    /// Moves a request that failed in any non-terminal state to
    /// `ErrorReported`.
    pub fn fail(&mut self) {
        if self.current() != RequestState::Failed {
            self.trail.push(RequestState::Failed);
        }
        self.trail.push(RequestState::ErrorReported);
        debug!(query = self.query.as_str(), state = ?RequestState::ErrorReported, "request state");
    }

    pub fn trail(&self) -> &[RequestState] {
        &self.trail
    }

    pub fn into_trail(self) -> Vec<RequestState> {
        self.trail
    }
}
