//! OAuth2 authorization-code login for the CLI

use anyhow::{bail, Context, Result};
use oauth2::CsrfToken;
use url::Url;

use super::{AuthMode, AuthStatus};
use crate::api;
use crate::config::Config;

/// Print the authorization URL and remember its state for `login`.
pub fn authorize() -> Result<()> {
    let mut config = Config::load()?;
    let access = api::open(&config)?;

    let creds = config.oauth_credentials();
    let state = CsrfToken::new_random();
    let url = access
        .authorization_url(&creds, state.secret())
        .context("Cannot build authorization URL. Run 'figma-fetch configure --client-id ...'")?;

    config.oauth_state = Some(state.secret().clone());
    config.save()?;

    println!();
    println!("To authorize, visit:");
    println!("  {}", url);
    println!();
    println!(
        "Then run 'figma-fetch login <code>' with the code (or the full URL) Figma redirects to {}.",
        creds.effective_redirect_uri()
    );
    Ok(())
}

/// Split user input into (code, state). Accepts a bare code or the full
/// redirect URL with `code` and `state` query parameters.
pub fn parse_callback(input: &str) -> Result<(String, Option<String>)> {
    let input = input.trim();
    if !input.contains("://") {
        return Ok((input.to_string(), None));
    }

    let url = Url::parse(input).context("Invalid redirect URL")?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => bail!("Authorization was denied: {}", value),
            _ => {}
        }
    }
    let code = code.context("Redirect URL has no 'code' parameter")?;
    Ok((code, state))
}

/// Exchange an authorization code for tokens and store them.
pub async fn login(input: &str) -> Result<()> {
    let mut config = Config::load()?;
    let (code, state) = parse_callback(input)?;

    if let (Some(expected), Some(returned)) = (config.oauth_state.as_deref(), state.as_deref()) {
        if expected != returned {
            bail!("State mismatch: the redirect does not belong to the last 'authorize'. Run 'figma-fetch authorize' again.");
        }
    }

    let creds = config.oauth_credentials();
    let access = api::open(&config)?;

    tracing::info!("Exchanging authorization code...");
    access
        .auth()
        .exchange_code(
            &code,
            &creds.client_id,
            &creds.client_secret,
            creds.redirect_uri.as_deref(),
        )
        .await
        .context("Failed to exchange authorization code")?;

    config.tokens = (*access.auth().tokens()).clone();
    config.oauth_state = None;
    if config.auth_mode != AuthMode::OAuth {
        tracing::warn!("Tokens stored, but auth mode is 'token'; OAuth tokens will not be used");
    }
    config.save()?;

    println!("Login successful.");
    Ok(())
}

/// Clear stored tokens
pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    let access = api::open(&config)?;

    access.auth().revoke();
    config.tokens = (*access.auth().tokens()).clone();
    config.oauth_state = None;
    config.save()?;

    println!("Logged out.");
    Ok(())
}

/// Display current auth and cache status
pub async fn status() -> Result<()> {
    let config = Config::load()?;
    let access = api::open(&config)?;
    let auth = access.auth();

    match config.auth_mode {
        AuthMode::OAuth => println!("Auth mode:   OAuth"),
        AuthMode::Token => println!("Auth mode:   personal access token"),
    }

    let state = match auth.status() {
        AuthStatus::Unconfigured => "not configured (client ID/secret missing)",
        AuthStatus::Configured => "configured, not authorized",
        AuthStatus::Authorized => "authorized",
        AuthStatus::Expiring => "authorized, token expired or expiring",
    };
    println!("OAuth:       {}", state);

    let tokens = auth.tokens();
    if let Some(exp) = tokens.expires_at {
        println!("  expires_at: {}", exp.to_rfc3339());
    }
    match tokens.refresh() {
        Some(_) => println!("Refresh tok: present"),
        None => println!("Refresh tok: none"),
    }

    match config.personal_token.as_deref() {
        Some(t) if !t.trim().is_empty() => println!("Personal tk: present"),
        _ => println!("Personal tk: none"),
    }

    let stats = access.cache().stats();
    println!(
        "Cache:       {} file(s), {} bytes in {}",
        stats.entries,
        stats.total_bytes,
        access.cache().root().display()
    );

    if config.auth_mode == AuthMode::OAuth && !auth.is_authorized() {
        println!("\nRun 'figma-fetch authorize' to authenticate.");
    }
    Ok(())
}
