//! Login state: the backend's opaque token kept in the persisted store.

use color_eyre::Result;
use thiserror::Error;
use tracing::info;

use crate::api::{ApiClient, ApiError};
use crate::cache::SharedStore;

pub const TOKEN_KEY: &str = "auth-token";

const MIN_PASSWORD_LEN: usize = 6;

/// Sign-up form problems caught before anything is sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignupError {
  #[error("Please enter all fields!")]
  MissingField,
  #[error("Password should have a minimum of 6 characters!")]
  PasswordTooShort,
  #[error("Passwords do not match!")]
  PasswordMismatch,
}

pub fn validate_signup(email: &str, password: &str, confirm: &str) -> Result<(), SignupError> {
  if email.trim().is_empty() || password.is_empty() || confirm.is_empty() {
    return Err(SignupError::MissingField);
  }
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(SignupError::PasswordTooShort);
  }
  if password != confirm {
    return Err(SignupError::PasswordMismatch);
  }
  Ok(())
}

#[derive(Clone)]
pub struct Session {
  store: SharedStore,
}

impl Session {
  pub fn new(store: SharedStore) -> Self {
    Self { store }
  }

  pub fn token(&self) -> Result<Option<String>> {
    Ok(self.store.get(TOKEN_KEY)?.filter(|t| !t.is_empty()))
  }

  pub fn require_token(&self) -> Result<String> {
    self.token()?.ok_or_else(|| ApiError::Unauthenticated.into())
  }

  pub fn is_logged_in(&self) -> Result<bool> {
    Ok(self.token()?.is_some())
  }

  pub async fn login(&self, api: &ApiClient, email: &str, password: &str) -> Result<()> {
    let token = api.login(email, password).await?;
    self.store.set(TOKEN_KEY, &token)?;
    info!(email, "logged in");
    Ok(())
  }

  /// Create an account. The user still has to log in afterwards.
  pub async fn signup(
    &self,
    api: &ApiClient,
    email: &str,
    password: &str,
    confirm: &str,
  ) -> Result<()> {
    validate_signup(email, password, confirm)?;
    api.register(email, password).await?;
    info!(email, "signed up");
    Ok(())
  }

  pub fn logout(&self) -> Result<()> {
    self.store.remove(TOKEN_KEY)?;
    info!("logged out");
    Ok(())
  }
}
