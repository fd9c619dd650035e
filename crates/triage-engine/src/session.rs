use std::fmt;

use serde::{Deserialize, Serialize};
use triage_core::{TicketAnalysis, TicketRecord};
use triage_tokens::UsageMeter;
use uuid::Uuid;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Fetching,
    Analyzing,
    Cancelled,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Fetching => "fetch",
            Phase::Analyzing => "analyze",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A ticket that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub ticket_id: String,
    pub error: String,
}

/// State of one fetch/analyze run
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    phase: Phase,
    pub tickets: Vec<TicketRecord>,
    pub fetch_failures: Vec<FetchFailure>,
    pub analyses: Vec<TicketAnalysis>,
    pub usage: UsageMeter,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Idle,
            tickets: Vec::new(),
            fetch_failures: Vec::new(),
            analyses: Vec::new(),
            usage: UsageMeter::default(),
        }
    }

    /// Session seeded with previously fetched tickets
    pub fn with_tickets(tickets: Vec<TicketRecord>) -> Self {
        Self {
            tickets,
            ..Self::new()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Enter `phase`; only allowed from `Idle`
    pub fn begin(&mut self, phase: Phase) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(EngineError::Busy(self.phase));
        }
        self.phase = phase;
        Ok(())
    }

    /// Leave the running phase. A cancelled run stays `Cancelled` until `reset`.
    pub(crate) fn finish<T>(&mut self, result: &Result<T>) {
        self.phase = match result {
            Err(EngineError::Cancelled) => Phase::Cancelled,
            _ => Phase::Idle,
        };
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_requires_idle() {
        let mut session = Session::new();
        session.begin(Phase::Fetching).unwrap();

        let err = session.begin(Phase::Analyzing).unwrap_err();
        assert!(matches!(err, EngineError::Busy(Phase::Fetching)));
        assert_eq!(err.to_string(), "A fetch phase is already running");
    }

    #[test]
    fn test_cancelled_phase_sticks_until_reset() {
        let mut session = Session::new();
        let id = session.id;
        session.begin(Phase::Fetching).unwrap();
        session.finish::<()>(&Err(EngineError::Cancelled));

        assert_eq!(session.phase(), Phase::Cancelled);
        assert!(session.begin(Phase::Fetching).is_err());

        session.reset();
        assert_eq!(session.phase(), Phase::Idle);
        assert_ne!(session.id, id);
        session.begin(Phase::Fetching).unwrap();
    }

    #[test]
    fn test_failed_phase_returns_to_idle() {
        let mut session = Session::new();
        session.begin(Phase::Analyzing).unwrap();
        session.finish::<()>(&Err(EngineError::Precondition("no model".into())));
        assert_eq!(session.phase(), Phase::Idle);
    }
}
