//! Result of evaluating a state transition against a stored record.

/// What a record says about an incoming event.
///
/// Transitions are computed from the current document before anything is
/// written, so a redelivered event resolves to `AlreadyApplied` instead of
/// a second write.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<P> {
    /// Write this partial patch.
    Apply(P),
    /// The record already reflects the event.
    AlreadyApplied,
    /// A newer or terminal state wins; the event is dropped.
    Superseded(&'static str),
}

impl<P> Transition<P> {
    /// Returns the patch if the transition should be written.
    pub fn into_patch(self) -> Option<P> {
        match self {
            Transition::Apply(patch) => Some(patch),
            Transition::AlreadyApplied | Transition::Superseded(_) => None,
        }
    }

    /// Converts the patch, leaving the other variants as they are.
    pub fn try_map<Q, E>(self, f: impl FnOnce(P) -> Result<Q, E>) -> Result<Transition<Q>, E> {
        Ok(match self {
            Transition::Apply(patch) => Transition::Apply(f(patch)?),
            Transition::AlreadyApplied => Transition::AlreadyApplied,
            Transition::Superseded(reason) => Transition::Superseded(reason),
        })
    }
}
