//! Supabase Auth client implementing `SessionSource`.

use crate::redirect::{self, RedirectTokens};
use crate::{SupabaseError, SupabaseResult, SupabaseUser, TokenRecord, TokenResponse, TokenStore};
use async_trait::async_trait;
use auth_reconciler::{AuthEvent, AuthResult, Identity, Provider, SessionSource};
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Session source over the Supabase Auth REST API.
pub struct SupabaseSessionSource {
    base_url: Url,
    publishable_key: String,
    http_client: Client,
    tokens: TokenStore,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseSessionSource {
    pub fn new(base_url: Url, publishable_key: impl Into<String>, tokens: TokenStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            base_url,
            publishable_key: publishable_key.into(),
            http_client: Client::new(),
            tokens,
            events,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sign in with email and password. Emits `SignedIn`.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let url = self.token_endpoint("password")?;
        debug!(url = %url, email = %email, "Attempting email/password sign-in");

        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.publishable_key)
            .json(&PasswordRequest { email, password })
            .send()
            .await
            .map_err(SupabaseError::from)?;
        let data: TokenResponse = check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::from)?;

        let record = TokenRecord::from_response(data, Utc::now());
        self.tokens.save(&record)?;

        let identity = record.identity();
        info!(user_id = %identity.id, "Signed in with password");
        self.emit(AuthEvent::signed_in(identity.clone()));
        Ok(identity)
    }

    /// URL to open for a redirect sign-in with `provider`.
    pub fn authorize_url(&self, provider: Provider, redirect_to: &Url) -> AuthResult<Url> {
        Ok(redirect::authorize_url(&self.base_url, provider, redirect_to)?)
    }

    /// Finish a redirect sign-in from the callback URL. Emits `SignedIn`.
    pub async fn complete_redirect(&self, callback_url: &str) -> AuthResult<Identity> {
        let RedirectTokens {
            access_token,
            refresh_token,
            expires_in,
        } = redirect::parse_redirect(callback_url)?;

        let user = self.fetch_user(&access_token).await?;
        let record = TokenRecord::from_response(
            TokenResponse {
                access_token,
                refresh_token,
                expires_in,
                user,
            },
            Utc::now(),
        );
        self.tokens.save(&record)?;

        let identity = record.identity();
        info!(user_id = %identity.id, provider = identity.provider.as_str(), "Redirect sign-in completed");
        self.emit(AuthEvent::signed_in(identity.clone()));
        Ok(identity)
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let full = format!("{}/auth/v1/{}", url.path().trim_end_matches('/'), path);
        url.set_path(&full);
        url
    }

    fn token_endpoint(&self, grant_type: &str) -> SupabaseResult<Url> {
        let mut url = self.endpoint("token");
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }

    async fn fetch_user(&self, access_token: &str) -> SupabaseResult<SupabaseUser> {
        let url = self.endpoint("user");
        debug!(url = %url, "Verifying session with Supabase");

        let response = self
            .http_client
            .get(url)
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Map non-success responses onto rejected or unavailable.
async fn check(response: Response) -> SupabaseResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        warn!(status = %status, "Supabase unavailable");
        return Err(SupabaseError::Unavailable {
            status: status.as_u16(),
        });
    }

    warn!(status = %status, body = %body, "Supabase rejected request");
    Err(SupabaseError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SessionSource for SupabaseSessionSource {
    async fn get_session(&self) -> AuthResult<Option<Identity>> {
        let Some(mut record) = self.tokens.load()? else {
            debug!("No stored Supabase session");
            return Ok(None);
        };

        if record.is_expired_at(Utc::now()) {
            debug!(user_id = %record.user.id, "Stored Supabase session expired");
            return Ok(None);
        }

        let user = self.fetch_user(&record.access_token).await?;
        if user != record.user {
            record.user = user;
            self.tokens.save(&record)?;
        }

        debug!(user_id = %record.user.id, "Session verified with server");
        Ok(Some(record.identity()))
    }

    async fn refresh_session(&self) -> AuthResult<Option<Identity>> {
        let Some(record) = self.tokens.load()? else {
            debug!("No refresh token available");
            return Ok(None);
        };

        let url = self.token_endpoint("refresh_token")?;
        debug!(url = %url, "Refreshing token");

        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.publishable_key)
            .json(&RefreshRequest {
                refresh_token: &record.refresh_token,
            })
            .send()
            .await
            .map_err(SupabaseError::from)?;

        let data: TokenResponse = match check(response).await {
            Ok(response) => response.json().await.map_err(SupabaseError::from)?,
            Err(e @ SupabaseError::Rejected { .. }) => {
                warn!(error = %e, "Refresh token rejected, clearing stored session");
                self.tokens.clear()?;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let record = TokenRecord::from_response(data, Utc::now());
        self.tokens.save(&record)?;

        let identity = record.identity();
        info!(user_id = %identity.id, "Token refreshed successfully");
        self.emit(AuthEvent::token_refreshed(identity.clone()));
        Ok(Some(identity))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        if let Some(record) = self.tokens.load()? {
            let url = self.endpoint("logout");
            let result = self
                .http_client
                .post(url)
                .header("apikey", &self.publishable_key)
                .bearer_auth(&record.access_token)
                .send()
                .await;

            match result {
                Ok(response) => {
                    if let Err(e) = check(response).await {
                        warn!(error = %e, "Remote logout failed");
                    }
                }
                Err(e) => warn!(error = %e, "Remote logout unreachable"),
            }
        }

        self.tokens.clear()?;
        info!("Signed out of Supabase");
        self.emit(AuthEvent::signed_out());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
