use std::time::Duration;

/// Tunables for the collab system.
#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// Length of generated room codes.
    pub room_code_length: usize,
    /// Songs longer than this are rejected before they reach the queue.
    pub max_song_duration_secs: u32,
    /// How often the polling change feed checks for updates when the push
    /// channel is unavailable.
    pub poll_interval: Duration,
    /// API key for the external media metadata lookup.
    pub youtube_api_key: String,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            room_code_length: 6,
            max_song_duration_secs: 600,
            poll_interval: Duration::from_secs(5),
            youtube_api_key: String::new(),
        }
    }
}
