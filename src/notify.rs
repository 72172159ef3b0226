//! Error reporting seam between the engine and its host.
//!
//! The engine never lets a failure escape into the host as a panic; it hands
//! it to a `Notifier` and carries on.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::MixError;

/// Receives every reportable failure exactly once.
pub trait Notifier: Send {
    fn report(&self, error: &MixError);
}

/// Default notifier: writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn report(&self, error: &MixError) {
        match error {
            MixError::InvalidParameter { .. } => log::debug!("{}", error),
            MixError::GraphState(_) => log::warn!("{}", error),
            _ => log::error!("{}", error),
        }
    }
}

/// Keeps reported errors so a host can drain and display them.
#[derive(Debug, Default, Clone)]
pub struct CollectingNotifier {
    errors: Arc<Mutex<Vec<MixError>>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every error reported so far
    pub fn drain(&self) -> Vec<MixError> {
        std::mem::take(&mut *self.errors.lock())
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }
}

impl Notifier for CollectingNotifier {
    fn report(&self, error: &MixError) {
        log::warn!("{}", error);
        self.errors.lock().push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TrackId;

    #[test]
    fn collecting_notifier_shares_errors_between_clones() {
        let notifier = CollectingNotifier::new();
        let handle = notifier.clone();
        notifier.report(&MixError::GraphState(TrackId::from("drums")));
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.drain(), vec![MixError::GraphState(TrackId::from("drums"))]);
        assert!(notifier.is_empty());
    }
}
