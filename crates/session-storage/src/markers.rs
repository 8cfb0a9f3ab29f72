//! Ephemeral redirect-transition markers.

use crate::{KeyValueStore, StorageKeys, StorageResult};
use tracing::warn;

/// An in-progress (or finished) external redirect login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMarker {
    /// Epoch millis when the redirect began
    pub started_at_ms: i64,
    /// Epoch millis when the flow returned, if it has
    pub completed_at_ms: Option<i64>,
}

impl TransitionMarker {
    /// True if the flow has not completed.
    pub fn is_pending(&self) -> bool {
        self.completed_at_ms.is_none()
    }

    /// Milliseconds since the flow began.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.started_at_ms)
    }
}

/// Tab-scoped transition markers.
pub struct EphemeralMarkers {
    storage: Box<dyn KeyValueStore>,
}

impl EphemeralMarkers {
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Record the start of a redirect flow, replacing any previous marker.
    pub fn mark_start(&self, now_ms: i64) -> StorageResult<()> {
        self.storage.delete(StorageKeys::AUTH_TRANSITION_COMPLETE)?;
        self.storage
            .set(StorageKeys::AUTH_TRANSITION_START, &now_ms.to_string())
    }

    /// Record completion of the current redirect flow.
    pub fn mark_complete(&self, now_ms: i64) -> StorageResult<()> {
        self.storage
            .set(StorageKeys::AUTH_TRANSITION_COMPLETE, &now_ms.to_string())
    }

    /// Read the current marker.
    ///
    /// Unparseable timestamps are discarded and the marker is treated as absent.
    pub fn marker(&self) -> StorageResult<Option<TransitionMarker>> {
        let Some(started_at_ms) = self.read_millis(StorageKeys::AUTH_TRANSITION_START)? else {
            return Ok(None);
        };
        let completed_at_ms = self.read_millis(StorageKeys::AUTH_TRANSITION_COMPLETE)?;

        Ok(Some(TransitionMarker {
            started_at_ms,
            completed_at_ms,
        }))
    }

    /// Remove both markers.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::AUTH_TRANSITION_START)?;
        self.storage.delete(StorageKeys::AUTH_TRANSITION_COMPLETE)?;
        Ok(())
    }

    fn read_millis(&self, key: &str) -> StorageResult<Option<i64>> {
        let Some(raw) = self.storage.get(key)? else {
            return Ok(None);
        };

        match raw.trim().parse::<i64>() {
            Ok(ms) => Ok(Some(ms)),
            Err(e) => {
                warn!(key = %key, value = %raw, error = %e, "Discarding corrupt transition marker");
                self.storage.delete(key)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn create_markers() -> EphemeralMarkers {
        EphemeralMarkers::new(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_no_marker_initially() {
        let markers = create_markers();
        assert_eq!(markers.marker().unwrap(), None);
    }

    #[test]
    fn test_start_then_complete() {
        let markers = create_markers();
        markers.mark_start(1_000).unwrap();

        let marker = markers.marker().unwrap().unwrap();
        assert!(marker.is_pending());
        assert_eq!(marker.age_ms(4_000), 3_000);

        markers.mark_complete(2_500).unwrap();
        let marker = markers.marker().unwrap().unwrap();
        assert_eq!(marker.completed_at_ms, Some(2_500));
        assert!(!marker.is_pending());
    }

    #[test]
    fn test_restart_clears_previous_completion() {
        let markers = create_markers();
        markers.mark_start(1_000).unwrap();
        markers.mark_complete(2_000).unwrap();
        markers.mark_start(5_000).unwrap();

        let marker = markers.marker().unwrap().unwrap();
        assert_eq!(marker.started_at_ms, 5_000);
        assert!(marker.is_pending());
    }

    #[test]
    fn test_completion_without_start_is_no_marker() {
        let markers = create_markers();
        markers.mark_complete(2_000).unwrap();
        assert_eq!(markers.marker().unwrap(), None);
    }

    #[test]
    fn test_corrupt_start_is_discarded() {
        let store = MemoryStore::new();
        store
            .set(StorageKeys::AUTH_TRANSITION_START, "yesterday")
            .unwrap();
        let markers = EphemeralMarkers::new(Box::new(store));

        assert_eq!(markers.marker().unwrap(), None);
    }

    #[test]
    fn test_clear() {
        let markers = create_markers();
        markers.mark_start(1_000).unwrap();
        markers.mark_complete(1_500).unwrap();
        markers.clear().unwrap();
        assert_eq!(markers.marker().unwrap(), None);
    }
}
