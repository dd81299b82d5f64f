//! Auth handshake engine.
//!
//! Register, track, login and logout. Every call that reaches the box first
//! probes `/api_version` to build the versioned API root; a failed probe
//! aborts the operation with [`Error::UpstreamUnavailable`].

use std::sync::Arc;

use freebox_api::models::{ApiVersion, AppIdentity, AppToken, AuthorizationTrack, Session};
use freebox_api::response::{MISSING_RESULT, UNKNOWN_ERROR};
use freebox_api::{ApiBase, FreeboxClient, FreeboxError, FreeboxResponse, compute_password};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::credentials::{AppCredential, CredentialStore};
use crate::{Error, Result};

/// Message of the envelope returned when the box did not confirm a logout.
pub const UNCONFIRMED_LOGOUT_MSG: &str =
    "Local credential cleared; the Freebox did not confirm the logout";

/// Answer of the credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialCheck {
    pub success: bool,
    pub has_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_data: Option<AppCredential>,
}

pub struct AuthEngine<S: CredentialStore + ?Sized = dyn CredentialStore> {
    client: FreeboxClient,
    identity: AppIdentity,
    store: Arc<S>,
}

impl<S: CredentialStore + ?Sized> AuthEngine<S> {
    pub fn new(client: FreeboxClient, identity: AppIdentity, store: Arc<S>) -> Self {
        Self {
            client,
            identity,
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn resolve_api(&self) -> Result<ApiBase> {
        self.client.resolve_api().await.map_err(Error::probe_failed)
    }

    /// Forward the box's version information.
    pub async fn version(&self) -> Result<ApiVersion> {
        self.client.api_version().await.map_err(Error::probe_failed)
    }

    /// Report whether a usable credential is stored. A corrupt token file
    /// reads as no credential, so the caller registers again.
    pub async fn check(&self) -> Result<CredentialCheck> {
        let stored = if self.store.exists().await {
            match self.store.load().await {
                Ok(stored) => stored,
                Err(e) if e.requires_registration() => {
                    warn!(error = %e, "Stored credential is unreadable");
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        let token_data = stored.filter(AppCredential::is_usable);
        Ok(CredentialCheck {
            success: true,
            has_token: token_data.is_some(),
            token_data,
        })
    }

    /// Request a new app token. The box shows a prompt the user has to
    /// accept; the token is persisted right away either way.
    #[instrument(skip(self), fields(app_id = %self.identity.app_id))]
    pub async fn register(&self) -> Result<FreeboxResponse<AppToken>> {
        let api = self.resolve_api().await?;
        let response = self
            .client
            .authorize(&api, &self.identity)
            .await
            .map_err(|e| rejected(e, registration_rejected))?;

        match &response.result {
            Some(token) if response.success => {
                self.store
                    .save(&AppCredential::new(&token.app_token, token.track_id))
                    .await?;
                info!(track_id = token.track_id, "Application registered, waiting for approval");
                Ok(response)
            }
            _ => {
                let (code, message) = rejection(&response);
                warn!(%code, %message, "Freebox refused the registration");
                Err(registration_rejected(code, message))
            }
        }
    }

    /// Read the authorization status. Never touches the stored credential.
    #[instrument(skip(self))]
    pub async fn track(&self, track_id: u64) -> Result<FreeboxResponse<AuthorizationTrack>> {
        let api = self.resolve_api().await?;
        let response = self.client.track_authorization(&api, track_id).await?;
        if let Some(track) = &response.result {
            debug!(status = %track.status, "Authorization status");
        }
        Ok(response)
    }

    /// Open a session: fetch a challenge, sign it with the app token, then
    /// exchange the signature for a session token.
    #[instrument(skip_all)]
    pub async fn login(&self, app_token: &str) -> Result<FreeboxResponse<Session>> {
        if app_token.is_empty() {
            return Err(Error::unauthorized("app_token required"));
        }
        let api = self.resolve_api().await?;

        let challenge = match self.client.login_challenge(&api).await {
            Ok(response) if response.success => response
                .result
                .and_then(|login| login.challenge)
                .filter(|challenge| !challenge.is_empty()),
            Ok(response) => {
                return Err(Error::ChallengeUnavailable(response.message()));
            }
            Err(e @ FreeboxError::Http(_)) => {
                return Err(Error::UpstreamUnavailable(e.to_string()));
            }
            Err(e) => return Err(Error::ChallengeUnavailable(e.to_string())),
        };
        let Some(challenge) = challenge else {
            return Err(Error::ChallengeUnavailable(
                "Freebox returned no login challenge".to_string(),
            ));
        };

        let password = compute_password(app_token, &challenge);
        let response = self
            .client
            .open_session(&api, &self.identity.app_id, &password)
            .await
            .map_err(|e| rejected(e, login_rejected))?;

        if response.success && response.result.is_some() {
            info!("Session opened");
            Ok(response)
        } else {
            let (code, message) = rejection(&response);
            warn!(%code, %message, "Freebox refused the login");
            Err(login_rejected(code, message))
        }
    }

    /// Close the session and forget the app token.
    ///
    /// The upstream call is best-effort; the stored credential is deleted
    /// regardless of its outcome.
    #[instrument(skip_all)]
    pub async fn logout(&self, session_token: &str) -> Result<FreeboxResponse<Value>> {
        if session_token.is_empty() {
            return Err(Error::unauthorized("session_token required"));
        }

        let upstream = match self.resolve_api().await {
            Ok(api) => match self.client.logout(&api, session_token).await {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!(error = %e, "Freebox logout failed");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Skipping Freebox logout");
                None
            }
        };

        self.store.delete().await?;
        info!(confirmed = upstream.is_some(), "Logged out");

        Ok(upstream.unwrap_or_else(|| FreeboxResponse {
            success: true,
            result: None,
            error_code: None,
            msg: Some(UNCONFIRMED_LOGOUT_MSG.to_string()),
            uid: None,
        }))
    }
}

fn registration_rejected(code: String, message: String) -> Error {
    Error::RegistrationRejected { code, message }
}

fn login_rejected(code: String, message: String) -> Error {
    Error::LoginRejected { code, message }
}

/// Non-2xx answers with an envelope are explicit refusals; anything else is
/// handled like any other upstream failure.
fn rejected(err: FreeboxError, reject: fn(String, String) -> Error) -> Error {
    match err {
        FreeboxError::Api { envelope, .. } => {
            let (code, message) = rejection(&envelope);
            reject(code, message)
        }
        other => other.into(),
    }
}

fn rejection<T>(response: &FreeboxResponse<T>) -> (String, String) {
    let code = match (&response.error_code, response.success) {
        (Some(code), _) => code.clone(),
        (None, true) => MISSING_RESULT.to_string(),
        (None, false) => UNKNOWN_ERROR.to_string(),
    };
    (code, response.message())
}
