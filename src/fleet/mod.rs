//! Desired-state bot fleet.
//!
//! Keeps the set of joined bots in each meeting converged with what the
//! operator declared:
//! - [`registry`] - per-meeting participants and in-flight launches
//! - [`reconciler`] - add/remove delta for one meeting
//! - [`audio`] - which new launch, if any, gets the microphone
//! - [`launcher`] - bounded worker pool for joins
//! - [`store`] - the service tying it all together

pub mod audio;
pub mod launcher;
pub mod reconciler;
pub mod registry;
pub mod status;
pub mod store;

pub use launcher::{LaunchQueue, LaunchQueueStats};
pub use registry::{DesiredState, ParticipantId};
pub use status::{MeetingDetail, MeetingStatus, ParticipantView};
pub use store::{FleetError, MeetingStore};
