//! Edge detection between the last known state and a fresh result.
//!
//! Pure decision, separated from the alert/event side effects so the
//! alerting matrix is testable without any I/O.

/// State transition that warrants an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Camera went offline (or was first seen offline)
    Down,
    /// Camera came back after being offline
    Recovered,
}

/// Decide whether a transition occurred.
///
/// - prior false, new true: Recovered
/// - prior differs from new and new is false: Down (this includes a
///   camera whose very first result is offline)
/// - anything else, including first-seen online: no alert
pub fn detect(prev: Option<bool>, new: bool) -> Option<Transition> {
    if prev == Some(false) && new {
        return Some(Transition::Recovered);
    }
    if prev != Some(new) && !new {
        return Some(Transition::Down);
    }
    None
}
