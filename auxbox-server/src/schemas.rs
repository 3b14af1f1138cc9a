//! Request bodies accepted by the endpoints, along with the validation
//! wrapper that rejects malformed ones before handlers see them.

use auxbox_collab::VoteDirection;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewSessionSchema {
    /// Stable user id from the external identity provider
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(length(max = 128))]
    pub name: Option<String>,
    #[validate(email, length(max = 254))]
    pub email: Option<String>,
    #[validate(length(max = 2048))]
    pub avatar: Option<String>,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewQueueItemSchema {
    /// A URL pointing at the media to queue
    #[validate(length(min = 1, max = 2048))]
    pub query: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoteSchema {
    pub direction: VoteChoice,
}

/// Mirror of the collab vote direction so it can appear in the API
/// schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Up,
    Down,
}

impl From<VoteChoice> for VoteDirection {
    fn from(value: VoteChoice) -> Self {
        match value {
            VoteChoice::Up => Self::Up,
            VoteChoice::Down => Self::Down,
        }
    }
}

impl From<VoteDirection> for VoteChoice {
    fn from(value: VoteDirection) -> Self {
        match value {
            VoteDirection::Up => Self::Up,
            VoteDirection::Down => Self::Down,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum PlaybackActionSchema {
    /// Start or resume playback, optionally from a position
    Play { from: Option<f32> },
    Pause,
    Seek { to: f32 },
    /// The current song finished, move to the next one. Carries the id
    /// of the song the client saw finish, so duplicate reports from
    /// racing clients collapse into one transition.
    Advance { ended_song_id: Option<i64> },
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::UNPROCESSABLE_ENTITY, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
