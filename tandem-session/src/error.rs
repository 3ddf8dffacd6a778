use crate::session::{NegotiationPhase, PhaseEvent};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("illegal negotiation transition: {event:?} while {from:?}")]
    IllegalTransition {
        from: NegotiationPhase,
        event: PhaseEvent,
    },

    #[error("session has shut down")]
    Closed,
}
