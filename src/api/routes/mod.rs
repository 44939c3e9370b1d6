//! API route modules.

pub mod bots;
pub mod status;

use crate::fleet::MeetingStore;

/// Shared state for fleet routes.
#[derive(Clone)]
pub struct FleetState {
    pub store: MeetingStore,
}
