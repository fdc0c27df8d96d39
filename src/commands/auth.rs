use std::io::{self, Write};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::info;

use crate::cli::{LoginArgs, LogoutArgs, SignupArgs};
use crate::commands::connect;
use crate::model::Credentials;
use crate::session::{Session, SessionStore};
use crate::util::now_utc_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("Please fill in all fields")]
    MissingField,
    #[error("username must be an email address")]
    NotAnEmail,
    #[error("Passwords don't match")]
    PasswordMismatch,
}

fn email_pattern() -> Result<Regex> {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").context("failed to compile email regex")
}

pub fn validate_credentials(username: &str, password: &str) -> Result<Credentials> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(CredentialError::MissingField.into());
    }
    if !email_pattern()?.is_match(username) {
        return Err(CredentialError::NotAnEmail.into());
    }

    Ok(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

pub async fn signup(args: SignupArgs) -> Result<()> {
    if let Some(confirm) = &args.confirm_password {
        if confirm != &args.password {
            return Err(CredentialError::PasswordMismatch.into());
        }
    }
    let credentials = validate_credentials(&args.username, &args.password)?;

    let (client, _) = connect(&args.connection)?;
    info!(username = %credentials.username, api = %client.base_url(), "signing up");
    let response = client
        .signup(&credentials)
        .await
        .context("signup failed")?;

    let mut output = io::stdout().lock();
    writeln!(
        output,
        "{}",
        response.message.as_deref().unwrap_or("User created")
    )?;
    writeln!(output, "Signup successful! Please log in with `contractwise login`.")?;
    Ok(())
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let credentials = validate_credentials(&args.username, &args.password)?;

    let (client, store) = connect(&args.connection)?;
    info!(username = %credentials.username, api = %client.base_url(), "signing in");
    let token = client
        .login(&credentials)
        .await
        .context("login failed")?;

    let session = Session {
        username: credentials.username,
        token: token.access_token,
        token_type: token.token_type,
        issued_at: now_utc_string(),
    };
    store.save(&session)?;
    info!(path = %store.path().display(), "session stored");

    writeln!(io::stdout().lock(), "Signed in as {}", session.username)?;
    Ok(())
}

pub fn logout(args: LogoutArgs) -> Result<()> {
    let store = SessionStore::new(&args.cache_root);
    if store.clear()? {
        info!(path = %store.path().display(), "session cleared");
        writeln!(io::stdout().lock(), "Signed out")?;
    } else {
        info!("no stored session");
        writeln!(io::stdout().lock(), "Not signed in")?;
    }
    Ok(())
}
