//! Sign-in, sign-out and redirect commands.

use auth_reconciler::{AuthEvent, Provider, SessionState};
use tracing::{info, warn};

use crate::app::SessionApp;
use crate::output;

/// Read the password without echo; an empty answer is an error.
pub fn read_password<F>(prompt: F) -> Result<String, Box<dyn std::error::Error>>
where
    F: FnOnce() -> std::io::Result<String>,
{
    let password = prompt()?;
    if password.is_empty() {
        return Err("Password is required".into());
    }
    Ok(password)
}

/// Sign in with email and password.
pub async fn sign_in(app: &SessionApp, email: &str, password: &str) -> bool {
    match app.source.sign_in_with_password(email, password).await {
        Ok(identity) => {
            // Nothing is subscribed in a one-shot run, so apply the event directly.
            app.reconciler().apply_event(AuthEvent::signed_in(identity.clone()));
            output::print_success(&format!(
                "Signed in as {}",
                identity.email.as_deref().unwrap_or(&identity.id)
            ));
            true
        }
        Err(e) => {
            warn!(error = %e, "Sign-in failed");
            output::print_error(&format!("Sign-in failed: {}", e));
            false
        }
    }
}

pub async fn sign_out(app: &SessionApp) -> bool {
    let state = app.handle.sign_out().await;
    info!(state = %state, "Sign-out finished");
    output::print_success("Signed out");
    state == SessionState::Consistent
}

/// Mark a redirect as in flight and print the URL to open.
pub fn oauth_start(
    app: &SessionApp,
    provider: Provider,
) -> Result<bool, Box<dyn std::error::Error>> {
    let redirect_to = app.config.redirect_url()?;
    let url = app.source.authorize_url(provider, &redirect_to)?;

    app.handle.mark_transition_start();
    output::print_success("Open this URL to continue signing in:");
    println!("{}", url);
    Ok(true)
}

/// Complete a redirect sign-in from the callback URL.
pub async fn oauth_finish(app: &SessionApp, callback_url: &str) -> bool {
    match app.source.complete_redirect(callback_url).await {
        Ok(identity) => {
            let state = app.handle.mark_transition_complete(identity.clone());
            output::print_success(&format!(
                "Signed in with {} as {}",
                identity.provider.as_str(),
                identity.email.as_deref().unwrap_or(&identity.id)
            ));
            state == SessionState::Consistent
        }
        Err(e) => {
            warn!(error = %e, "Redirect sign-in failed");
            output::print_error(&format!("Redirect sign-in failed: {}", e));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_config_and_utils::{Config, Paths};
    use tempfile::tempdir;

    fn open_in(dir: &std::path::Path) -> SessionApp {
        let mut config = Config::new();
        config.supabase_url = "http://127.0.0.1:9".to_string();
        SessionApp::open(&Paths::with_base_dir(dir.to_path_buf()), config).unwrap()
    }

    #[test]
    fn test_read_password_rejects_empty() {
        assert!(read_password(|| Ok(String::new())).is_err());
        assert!(read_password(|| Err(std::io::Error::other("no tty"))).is_err());
        assert_eq!(
            read_password(|| Ok("hunter2".to_string())).unwrap(),
            "hunter2"
        );
    }

    #[test]
    fn test_oauth_start_marks_transition() {
        let dir = tempdir().unwrap();
        let app = open_in(dir.path());

        assert!(oauth_start(&app, Provider::OauthGithub).unwrap());
        let marker = app.reconciler().transition_marker().unwrap();
        assert!(marker.is_pending());
    }

    #[test]
    fn test_oauth_start_rejects_password_provider() {
        let dir = tempdir().unwrap();
        let app = open_in(dir.path());

        assert!(oauth_start(&app, Provider::Password).is_err());
        assert!(app.reconciler().transition_marker().is_none());
    }

    #[tokio::test]
    async fn test_oauth_finish_with_error_callback() {
        let dir = tempdir().unwrap();
        let app = open_in(dir.path());
        app.handle.mark_transition_start();

        assert!(!oauth_finish(&app, "http://localhost/cb?error=access_denied").await);
        assert!(app.reconciler().transition_marker().unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_guest_sign_out_is_local() {
        let dir = tempdir().unwrap();
        let app = open_in(dir.path());
        app.handle.continue_as_guest();

        // Port 9 is closed; a guest sign-out never reaches it.
        assert!(sign_out(&app).await);
        assert!(!app.reconciler().is_guest());
        assert!(app.handle.current().identity.is_none());
    }
}
