use crate::error::SessionError;

/// Where the current engine instance is in the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationPhase {
    /// Announcing; nothing has been offered on this engine.
    #[default]
    Discovering,
    /// Our offer is out, waiting for the answer.
    Offering,
    /// Offer and answer are both applied; ICE is checking.
    Negotiated,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    OfferSent,
    /// We applied a remote offer and sent our answer.
    OfferAnswered,
    /// The peer's answer to our offer was applied.
    AnswerApplied,
    EngineConnected,
    Reset,
}

impl NegotiationPhase {
    /// The single transition table of the negotiation.
    pub fn next(self, event: PhaseEvent) -> Result<NegotiationPhase, SessionError> {
        use NegotiationPhase::*;

        let next = match (self, event) {
            (_, PhaseEvent::OfferSent) => Offering,
            (_, PhaseEvent::OfferAnswered) => Negotiated,
            (Offering, PhaseEvent::AnswerApplied) => Negotiated,
            (Negotiated | Connected, PhaseEvent::EngineConnected) => Connected,
            (_, PhaseEvent::Reset) => Discovering,
            (from, event) => return Err(SessionError::IllegalTransition { from, event }),
        };
        Ok(next)
    }

    /// Apply `event` in place; the phase is left untouched on error.
    pub fn advance(&mut self, event: PhaseEvent) -> Result<NegotiationPhase, SessionError> {
        let next = self.next(event)?;
        *self = next;
        Ok(next)
    }

    pub fn accepts(self, event: PhaseEvent) -> bool {
        self.next(event).is_ok()
    }
}
