//! Access token acquisition and account verification
//!
//! The `dev` workspace uses the pre-generated `DROPBOX_ACCESS_TOKEN`. The `prod`
//! workspace uses it when present and otherwise asks for a token with hidden input.
//! Either way the token is checked against `users/get_current_account` before any
//! transfer, and the client is scoped to the account's root namespace so team
//! folders resolve.

use tracing::{debug, info};

use crate::app::client::{Account, DropboxClient};
use crate::config::{ClientSettings, Config, Workspace};
use crate::errors::{AuthError, AuthResult, FetchError};

/// Where the access token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `DROPBOX_ACCESS_TOKEN`
    Environment,
    /// Entered at the terminal
    Prompt,
}

/// An authenticated, namespace-scoped client with the account it belongs to
#[derive(Debug)]
pub struct Session {
    pub client: DropboxClient,
    pub account: Account,
    pub token_source: TokenSource,
}

/// Pick the access token for the configured workspace
///
/// `prompt` is only called in the `prod` workspace when no token is configured.
pub fn resolve_token<P>(config: &Config, prompt: P) -> AuthResult<(String, TokenSource)>
where
    P: FnOnce() -> AuthResult<String>,
{
    let configured = config
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match (config.workspace, configured) {
        (Workspace::Test, _) => Err(AuthError::OfflineWorkspace),
        (_, Some(token)) => {
            validate_token(token)?;
            Ok((token.to_string(), TokenSource::Environment))
        }
        (Workspace::Dev, None) => Err(AuthError::MissingToken),
        (Workspace::Prod, None) => {
            let token = prompt()?;
            let token = token.trim();
            if token.is_empty() {
                return Err(AuthError::MissingToken);
            }
            validate_token(token)?;
            Ok((token.to_string(), TokenSource::Prompt))
        }
    }
}

/// Ask for an access token without echoing it
pub fn prompt_token() -> AuthResult<String> {
    println!("Generate an access token in the Dropbox app console and paste it below.");
    let token = rpassword::prompt_password("Dropbox access token: ")?;
    Ok(token)
}

/// Reject tokens that cannot be sent in an `Authorization` header
fn validate_token(token: &str) -> AuthResult<()> {
    if token.is_ascii() && !token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Ok(());
    }
    Err(AuthError::InvalidToken)
}

/// Check the connected account against an optional expected team
pub fn check_team(account: &Account, expected_team: Option<&str>) -> AuthResult<()> {
    let Some(expected) = expected_team else {
        return Ok(());
    };
    match account.team_name.as_deref() {
        Some(team) if team == expected => Ok(()),
        other => Err(AuthError::TeamMismatch {
            expected: expected.to_string(),
            actual: other.unwrap_or("no team").to_string(),
        }),
    }
}

/// Resolve a token, verify it and return a namespace-scoped client
pub async fn connect<P>(config: &Config, settings: &ClientSettings, prompt: P) -> AuthResult<Session>
where
    P: FnOnce() -> AuthResult<String>,
{
    let (token, token_source) = resolve_token(config, prompt)?;
    debug!("Using access token from {:?}", token_source);

    let client = DropboxClient::new(token, &settings.to_runtime_config())?;
    let account = client.current_account().await.map_err(|e| match e {
        FetchError::Unauthorized => AuthError::InvalidToken,
        other => AuthError::Account(other),
    })?;
    check_team(&account, settings.expected_team.as_deref())?;

    info!(
        "Authenticated as {} ({})",
        account.display_name,
        account.team_name.as_deref().unwrap_or("no team")
    );
    let client = client.with_path_root(account.root_namespace_id.clone());
    Ok(Session {
        client,
        account,
        token_source,
    })
}
