//! Application login handshake.
//!
//! 1. `POST /login/authorize` registers the app and returns an app token plus
//!    a track id; the user confirms on the box.
//! 2. `GET /login/authorize/{track_id}` reports the authorization status.
//! 3. `GET /login` hands out a challenge; the session password is
//!    `hex(HMAC-SHA1(key = app_token, message = challenge))`.
//! 4. `POST /login/session` exchanges `{app_id, password}` for a session token.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::instrument;

use crate::Result;
use crate::client::{APP_AUTH_HEADER, ApiBase, FreeboxClient};
use crate::models::{
    AppIdentity, AppToken, AuthorizationTrack, LoginChallenge, Session, SessionRequest,
};
use crate::response::FreeboxResponse;

type HmacSha1 = Hmac<Sha1>;

/// Session password for a challenge. Key and message order matter: swapping
/// them still yields a well-formed digest that the box rejects.
pub fn compute_password(app_token: &str, challenge: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(app_token.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(challenge.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

impl FreeboxClient {
    #[instrument(skip(self, api, identity), fields(app_id = %identity.app_id))]
    pub async fn authorize(
        &self,
        api: &ApiBase,
        identity: &AppIdentity,
    ) -> Result<FreeboxResponse<AppToken>> {
        let request = self
            .http()
            .post(api.endpoint("login/authorize"))
            .json(identity);
        self.send(request).await
    }

    #[instrument(skip(self, api))]
    pub async fn track_authorization(
        &self,
        api: &ApiBase,
        track_id: u64,
    ) -> Result<FreeboxResponse<AuthorizationTrack>> {
        let request = self
            .http()
            .get(api.endpoint(&format!("login/authorize/{track_id}")));
        self.send(request).await
    }

    #[instrument(skip(self, api))]
    pub async fn login_challenge(&self, api: &ApiBase) -> Result<FreeboxResponse<LoginChallenge>> {
        self.send(self.http().get(api.endpoint("login"))).await
    }

    #[instrument(skip(self, api, password))]
    pub async fn open_session(
        &self,
        api: &ApiBase,
        app_id: &str,
        password: &str,
    ) -> Result<FreeboxResponse<Session>> {
        let request = self
            .http()
            .post(api.endpoint("login/session"))
            .json(&SessionRequest { app_id, password });
        self.send(request).await
    }

    #[instrument(skip_all)]
    pub async fn logout(
        &self,
        api: &ApiBase,
        session_token: &str,
    ) -> Result<FreeboxResponse<serde_json::Value>> {
        let request = self
            .http()
            .post(api.endpoint("login/logout"))
            .header(APP_AUTH_HEADER, session_token);
        self.send(request).await
    }
}
