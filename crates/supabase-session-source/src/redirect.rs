//! OAuth redirect helpers.

use crate::{SupabaseError, SupabaseResult};
use auth_reconciler::Provider;
use std::collections::HashMap;
use url::Url;

const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Tokens carried back on the redirect URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Build the provider authorization URL for a redirect sign-in.
pub fn authorize_url(base: &Url, provider: Provider, redirect_to: &Url) -> SupabaseResult<Url> {
    let provider_name = match provider {
        Provider::OauthGoogle => "google",
        Provider::OauthGithub => "github",
        other => {
            return Err(SupabaseError::Redirect(format!(
                "{} does not sign in by redirect",
                other.as_str()
            )))
        }
    };

    let mut url = base.clone();
    let path = format!("{}/auth/v1/authorize", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .append_pair("provider", provider_name)
        .append_pair("redirect_to", redirect_to.as_str());
    Ok(url)
}

/// Extract tokens from the callback URL.
///
/// Implicit-flow tokens arrive in the fragment; the query string is also
/// consulted, and the fragment wins when both carry a key.
pub fn parse_redirect(callback: &str) -> SupabaseResult<RedirectTokens> {
    let url = Url::parse(callback)?;

    let mut params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    if let Some(fragment) = url.fragment() {
        params.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }

    if let Some(error) = params
        .get("error_description")
        .or_else(|| params.get("error"))
    {
        return Err(SupabaseError::Redirect(error.clone()));
    }

    let access_token = params
        .remove("access_token")
        .ok_or_else(|| SupabaseError::Redirect("callback is missing access_token".to_string()))?;
    let refresh_token = params
        .remove("refresh_token")
        .ok_or_else(|| SupabaseError::Redirect("callback is missing refresh_token".to_string()))?;
    let expires_in = match params.get("expires_in") {
        Some(raw) => raw
            .parse()
            .map_err(|_| SupabaseError::Redirect(format!("invalid expires_in: {}", raw)))?,
        None => DEFAULT_EXPIRES_IN,
    };

    Ok(RedirectTokens {
        access_token,
        refresh_token,
        expires_in,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url() {
        let base = Url::parse("https://abc.supabase.co").unwrap();
        let redirect = Url::parse("http://localhost:3000/auth/callback").unwrap();

        let url = authorize_url(&base, Provider::OauthGoogle, &redirect).unwrap();
        assert_eq!(url.path(), "/auth/v1/authorize");

        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["provider"], "google");
        assert_eq!(pairs["redirect_to"], "http://localhost:3000/auth/callback");
    }

    #[test]
    fn test_authorize_url_keeps_base_path() {
        let base = Url::parse("https://example.com/supabase/").unwrap();
        let redirect = Url::parse("http://localhost/cb").unwrap();
        let url = authorize_url(&base, Provider::OauthGithub, &redirect).unwrap();
        assert_eq!(url.path(), "/supabase/auth/v1/authorize");
    }

    #[test]
    fn test_authorize_url_rejects_non_oauth() {
        let base = Url::parse("https://abc.supabase.co").unwrap();
        let redirect = Url::parse("http://localhost/cb").unwrap();
        assert!(authorize_url(&base, Provider::Password, &redirect).is_err());
        assert!(authorize_url(&base, Provider::Guest, &redirect).is_err());
    }

    #[test]
    fn test_parse_fragment_tokens() {
        let tokens = parse_redirect(
            "http://localhost:3000/auth/callback#access_token=at&refresh_token=rt&expires_in=1800&token_type=bearer",
        )
        .unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.refresh_token, "rt");
        assert_eq!(tokens.expires_in, 1800);
    }

    #[test]
    fn test_parse_defaults_expiry() {
        let tokens =
            parse_redirect("http://localhost/cb#access_token=at&refresh_token=rt").unwrap();
        assert_eq!(tokens.expires_in, DEFAULT_EXPIRES_IN);
    }

    #[test]
    fn test_parse_error_callback() {
        let err = parse_redirect(
            "http://localhost/cb?error=access_denied&error_description=User%20cancelled",
        )
        .unwrap_err();
        assert!(err.to_string().contains("User cancelled"));
    }

    #[test]
    fn test_parse_missing_tokens() {
        assert!(parse_redirect("http://localhost/cb#access_token=at").is_err());
        assert!(parse_redirect("http://localhost/cb").is_err());
        assert!(parse_redirect("not a url").is_err());
    }

    #[test]
    fn test_parse_invalid_expiry() {
        assert!(
            parse_redirect("http://localhost/cb#access_token=a&refresh_token=r&expires_in=soon")
                .is_err()
        );
    }
}
