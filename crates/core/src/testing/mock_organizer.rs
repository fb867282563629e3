//! Mock organizer for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::organizer::{Organizer, OrganizerError, OrganizerResult};

/// Organizer returning a preset result and counting invocations.
#[derive(Default)]
pub struct MockOrganizer {
    result: Mutex<OrganizerResult>,
    calls: AtomicUsize,
}

impl MockOrganizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(result: OrganizerResult) -> Self {
        Self {
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Organizer for MockOrganizer {
    async fn organize(&self) -> Result<OrganizerResult, OrganizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.result.lock().unwrap())
    }
}
