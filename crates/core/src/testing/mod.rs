//! Controllable mock implementations for tests.

mod mock_organizer;
mod mock_provider;

pub use mock_organizer::MockOrganizer;
pub use mock_provider::{MockProvider, UnrestrictOutcome};
