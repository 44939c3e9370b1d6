//! Microphone assignment. A meeting has a single mic slot and it goes to
//! the first eligible new launch, video group first.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicGrant {
    None,
    /// The first new camera-on launch gets the mic.
    Video,
    /// The first new camera-off launch gets the mic.
    NonVideo,
}

/// Decides which group's first new launch receives the mic.
///
/// `occupied` is true when a remaining participant or an in-flight launch
/// already holds the slot.
pub fn resolve_mic(
    audio_policy: bool,
    occupied: bool,
    video_launches: usize,
    non_video_launches: usize,
) -> MicGrant {
    if !audio_policy || occupied {
        return MicGrant::None;
    }
    if video_launches > 0 {
        MicGrant::Video
    } else if non_video_launches > 0 {
        MicGrant::NonVideo
    } else {
        MicGrant::None
    }
}
