mod youtube;

use thiserror::Error;

pub use youtube::*;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Input did not match any supported source")]
    NoMatch,
    #[error("Input is invalid: {0}")]
    Invalid(String),
    #[error("Resource referenced by input does not exist")]
    NotFound,
    #[error("Failed to fetch resource: {0}")]
    Fetch(String),
    #[error("Failed to parse resource: {0}")]
    Parse(String),
}

/// Resolved details of an external media reference, ready to queue.
#[derive(Debug, Clone)]
pub struct TrackDetails {
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    pub duration_secs: u32,
}

/// Any external resource that can be turned into a queued song.
#[derive(Debug, PartialEq)]
pub enum Input {
    YouTube(YouTubeVideoInput),
}

impl Input {
    /// Parses a user-supplied query into a supported input.
    pub fn parse(query: &str) -> Result<Self, InputError> {
        let query = query.trim();

        if YouTubeVideoInput::test(query) {
            return Ok(Self::YouTube(YouTubeVideoInput::from_query(query)?));
        }

        Err(InputError::NoMatch)
    }

    /// Resolves the input into track details via a metadata lookup.
    pub async fn resolve(&self, metadata: &MetadataClient) -> Result<TrackDetails, InputError> {
        match self {
            Self::YouTube(input) => input.resolve(metadata).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_route_to_the_right_input() {
        let input = Input::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(
            input,
            Input::YouTube(YouTubeVideoInput {
                id: "dQw4w9WgXcQ".to_string()
            })
        );

        assert_eq!(
            Input::parse("https://example.com/song.mp3"),
            Err(InputError::NoMatch)
        );
        assert_eq!(Input::parse("not a url"), Err(InputError::NoMatch));
    }
}
