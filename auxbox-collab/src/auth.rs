use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::{util::random_string, Database, DatabaseError, NewSession, SessionData, UserData};

const SESSION_TOKEN_LENGTH: usize = 32;

/// Exchanges verified identities for bearer sessions. Identity
/// verification itself happens upstream, this only keeps the user
/// snapshot fresh and hands out tokens.
pub struct Auth<Db> {
    database: Arc<Db>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Session does not exist")]
    UnknownSession,
    #[error(transparent)]
    Db(DatabaseError),
}

/// A verified profile handed over by the external identity provider.
#[derive(Debug, Clone)]
pub struct IdentityProfile {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl IdentityProfile {
    /// Falls back to the email local part when the provider sends no
    /// name, and to "Anonymous" when it sends neither.
    fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Anonymous".to_string())
    }
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    pub fn new(database: &Arc<Db>) -> Self {
        Self {
            database: database.clone(),
        }
    }

    /// Upserts the user from the profile and creates a session for them.
    pub async fn login(&self, profile: IdentityProfile) -> Result<SessionData, AuthError> {
        let user = self
            .database
            .upsert_user(UserData {
                id: profile.id.clone(),
                display_name: profile.display_name(),
                email: profile.email.clone(),
                avatar: profile.image.clone(),
            })
            .await
            .map_err(AuthError::Db)?;

        info!("{} logged in", user.display_name);

        self.database
            .create_session(NewSession {
                token: random_string(SESSION_TOKEN_LENGTH),
                user_id: user.id,
            })
            .await
            .map_err(AuthError::Db)
    }

    /// Deletes the session behind a token, if it exists.
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.database.delete_session_by_token(token).await
    }

    /// The session behind a bearer token.
    pub async fn session(&self, token: &str) -> Result<SessionData, AuthError> {
        self.database.session_by_token(token).await.map_err(|e| {
            if e.is_not_found() {
                AuthError::UnknownSession
            } else {
                AuthError::Db(e)
            }
        })
    }
}
