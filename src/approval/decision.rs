//! Client decision values and their response templates
//!
//! A decision is one of exactly three literals. Anything else is rejected
//! as input before any state machinery runs. Each decision has a fixed
//! response template (confirmation message + next-steps text) returned to
//! the client on a verified submission.

use std::fmt;

use crate::store::ClientStatus;

/// A client's decision on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientDecision {
    Approved,
    ChangesRequested,
    Rejected,
}

impl ClientDecision {
    /// Parse the wire literal. Strict: no aliases, no case folding.
    /// An unknown value is an input error, never a state transition.
    pub fn parse(raw: &str) -> Option<ClientDecision> {
        match raw {
            "approved" => Some(ClientDecision::Approved),
            "changes-requested" => Some(ClientDecision::ChangesRequested),
            "rejected" => Some(ClientDecision::Rejected),
            _ => None,
        }
    }

    /// Wire representation
    pub fn as_str(self) -> &'static str {
        match self {
            ClientDecision::Approved => "approved",
            ClientDecision::ChangesRequested => "changes-requested",
            ClientDecision::Rejected => "rejected",
        }
    }

    /// The client-facing status this decision transitions the record to
    pub fn as_status(self) -> ClientStatus {
        match self {
            ClientDecision::Approved => ClientStatus::Approved,
            ClientDecision::ChangesRequested => ClientStatus::ChangesRequested,
            ClientDecision::Rejected => ClientStatus::Rejected,
        }
    }

    /// Confirmation message for the submission response
    pub fn message(self) -> &'static str {
        match self {
            ClientDecision::Approved => "Thank you! Your approval has been recorded.",
            ClientDecision::ChangesRequested => "Your change request has been recorded.",
            ClientDecision::Rejected => "Your decision has been recorded.",
        }
    }

    /// Next-steps text for the submission response
    pub fn next_steps(self) -> &'static str {
        match self {
            ClientDecision::Approved => {
                "We will be in touch shortly to arrange the next steps and get the project underway."
            }
            ClientDecision::ChangesRequested => {
                "The team will review your feedback and send you a revised proposal."
            }
            ClientDecision::Rejected => {
                "The team has been notified. If you have any feedback you'd like to share, just reply to the original email."
            }
        }
    }
}

impl fmt::Display for ClientDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
