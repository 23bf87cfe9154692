//! Lifecycle shared by every confidential computation that ends in a reveal.
//!
//! ```text
//! Open -> Computing -> AwaitingReveal -> Finalized
//!             |               |
//!             +--> Rejected <-+
//! ```
//!
//! `Finalized` and `Rejected` are terminal.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// accepting inputs
    #[default]
    Open,
    /// inputs are closed, the result is being computed
    Computing,
    /// a reveal of the result has been requested
    AwaitingReveal,
    Finalized,
    /// the computation ended without a result, for a public reason
    Rejected,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PhaseError {
    #[error("phase {from} is terminal")]
    Terminal { from: Phase },
    #[error("cannot go from {from} to {to}")]
    Illegal { from: Phase, to: Phase },
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finalized | Phase::Rejected)
    }

    pub fn can_advance(self, to: Phase) -> bool {
        matches!(
            (self, to),
            (Phase::Open, Phase::Computing)
                | (Phase::Computing, Phase::AwaitingReveal)
                | (Phase::Computing, Phase::Rejected)
                | (Phase::AwaitingReveal, Phase::Finalized)
                | (Phase::AwaitingReveal, Phase::Rejected)
        )
    }

    /// Move to `to`, or leave `self` untouched if the transition is illegal.
    pub fn advance(&mut self, to: Phase) -> Result<(), PhaseError> {
        if self.is_terminal() {
            return Err(PhaseError::Terminal { from: *self });
        }
        if !self.can_advance(to) {
            return Err(PhaseError::Illegal { from: *self, to });
        }
        *self = to;
        Ok(())
    }

    /// Fail unless the current phase is `expected`.
    pub fn expect(self, expected: Phase) -> Result<(), PhaseError> {
        if self == expected {
            Ok(())
        } else if self.is_terminal() {
            Err(PhaseError::Terminal { from: self })
        } else {
            Err(PhaseError::Illegal {
                from: self,
                to: expected,
            })
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Open => "open",
            Phase::Computing => "computing",
            Phase::AwaitingReveal => "awaiting-reveal",
            Phase::Finalized => "finalized",
            Phase::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 5] = [
        Phase::Open,
        Phase::Computing,
        Phase::AwaitingReveal,
        Phase::Finalized,
        Phase::Rejected,
    ];

    #[test]
    fn happy_path() {
        let mut phase = Phase::default();
        phase.advance(Phase::Computing).expect("open -> computing");
        phase
            .advance(Phase::AwaitingReveal)
            .expect("computing -> awaiting");
        phase.advance(Phase::Finalized).expect("awaiting -> finalized");
        assert!(phase.is_terminal());
    }

    #[test]
    fn terminal_phases_never_move() {
        for terminal in [Phase::Finalized, Phase::Rejected] {
            for to in ALL {
                let mut phase = terminal;
                assert_eq!(
                    phase.advance(to),
                    Err(PhaseError::Terminal { from: terminal })
                );
                assert_eq!(phase, terminal);
            }
        }
    }

    #[test]
    fn no_skipping_ahead() {
        let mut phase = Phase::Open;
        assert_eq!(
            phase.advance(Phase::Finalized),
            Err(PhaseError::Illegal {
                from: Phase::Open,
                to: Phase::Finalized
            })
        );
        assert_eq!(phase, Phase::Open);
        assert!(phase.expect(Phase::Open).is_ok());
        assert!(phase.expect(Phase::Computing).is_err());
    }
}
