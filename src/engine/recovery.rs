//! What the controller does when something goes wrong (or a track ends)
//!
//! Every failure the controller sees goes through [`decide`]; the controller
//! never improvises a recovery of its own.

use crate::source::SourceKind;

/// Whether a session plays a list or loops one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindShape {
    /// Advances through a resolved list
    List,
    /// Loops a single track
    Single,
}

impl KindShape {
    /// Shape of a session playing `kind`
    pub fn of(kind: SourceKind) -> Self {
        if kind.is_list_based() {
            KindShape::List
        } else {
            KindShape::Single
        }
    }
}

/// Event that needs a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Resolution yielded no tracks
    ResolutionEmpty,
    /// The current track failed to open, decode or start
    PlaybackError,
    /// Connectivity dropped during a streaming session
    NetworkLost,
    /// The current track played to its end
    Completed,
}

/// What to do about a [`Trigger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Replace the track list with the bundled tone
    SubstituteFallback,
    /// Drop the current track and move on; falls back once the list is empty
    SkipTrack,
    /// Move to the next track, wrapping at the end
    Advance,
    /// Play the current track again
    Restart,
    /// Stop the session and report the failure
    Fatal,
}

/// Decide how to handle `trigger`.
///
/// `on_fallback` is true once the session is playing the bundled tone;
/// nothing is left to fall back to at that point.
pub fn decide(shape: KindShape, trigger: Trigger, on_fallback: bool) -> RecoveryAction {
    match (trigger, shape, on_fallback) {
        (Trigger::NetworkLost, _, _) => RecoveryAction::Fatal,
        (Trigger::ResolutionEmpty, _, _) => RecoveryAction::SubstituteFallback,
        (Trigger::PlaybackError, _, true) => RecoveryAction::Fatal,
        (Trigger::PlaybackError, KindShape::List, false) => RecoveryAction::SkipTrack,
        (Trigger::PlaybackError, KindShape::Single, false) => RecoveryAction::SubstituteFallback,
        (Trigger::Completed, KindShape::List, false) => RecoveryAction::Advance,
        (Trigger::Completed, _, _) => RecoveryAction::Restart,
    }
}
