// Copyright (C) 2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of hello-cafe.
//
// hello-cafe is free software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// hello-cafe is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with hello-cafe.  If not,
// see <http://www.gnu.org/licenses/>.

//! # Admin sessions
//!
//! Sign-up, sign-in & sign-out for hello-cafe admins, along with the token check used to gate the
//! catalog API.
//!
//! Access tokens are stateless JWTs (see [token](crate::token)), which on their own can't be
//! invalidated before they expire. Signing-out therefore writes the token into a *revocation
//! ledger*, and [Sessions::check_token] consults that ledger in addition to checking the signature
//! & expiry. A second sign-out with the same token is rejected with [Error::AlreadyLoggedOut]
//! rather than quietly accepted; that's usually a client bug worth surfacing.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use snafu::{prelude::*, Backtrace, IntoError};
use tracing::{debug, info};

use crate::{
    entities::{self, validate_password, Admin, NewAdmin, Phone},
    storage::{self, AdminBackend},
    token::{self, mint_token, verify_token, SigningKey},
};

/// Tokens are good for twenty minutes
pub const TOKEN_LIFETIME_SECS: i64 = 20 * 60;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Token already logged-out for {phone}"))]
    AlreadyLoggedOut { phone: Phone, backtrace: Backtrace },
    #[snafu(display("An admin with phone number {phone} already exists"))]
    DuplicateAdmin { phone: Phone, backtrace: Backtrace },
    #[snafu(display("Failed to hash or check a password: {source}"))]
    Hash {
        source: entities::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Incorrect password for {phone}"))]
    IncorrectPassword { phone: Phone, backtrace: Backtrace },
    #[snafu(display("Invalid password: {source}"))]
    InvalidPassword {
        source: entities::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Invalid phone number: {source}"))]
    InvalidPhone {
        source: entities::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Invalid access token: {source}"))]
    InvalidToken {
        source: token::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to mint an access token: {source}"))]
    Mint {
        source: token::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("No password supplied"))]
    MissingPassword { backtrace: Backtrace },
    #[snafu(display("No phone number supplied"))]
    MissingPhone { backtrace: Backtrace },
    #[snafu(display("No access token supplied"))]
    MissingToken { backtrace: Backtrace },
    #[snafu(display("Access token for {phone} has been logged-out"))]
    RevokedToken { phone: Phone, backtrace: Backtrace },
    #[snafu(display("Storage error: {source}"))]
    Storage {
        source: storage::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("No admin with phone number {phone}"))]
    UnknownAccount { phone: String, backtrace: Backtrace },
}

impl Error {
    /// A stable, machine-readable name for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::AlreadyLoggedOut { .. } => "already-logged-out",
            Error::DuplicateAdmin { .. } => "duplicate-admin",
            Error::IncorrectPassword { .. } => "incorrect-password",
            Error::InvalidPassword { .. } => "invalid-password",
            Error::InvalidPhone { .. } => "invalid-phone",
            Error::InvalidToken { .. } => "invalid-token",
            Error::MissingPassword { .. } => "missing-password",
            Error::MissingPhone { .. } => "missing-phone",
            Error::MissingToken { .. } => "missing-token",
            Error::RevokedToken { .. } => "revoked-token",
            Error::UnknownAccount { .. } => "unknown-account",
            Error::Hash { .. } | Error::Mint { .. } | Error::Storage { .. } => "internal",
        }
    }
    pub fn as_status_and_msg(&self) -> (StatusCode, String) {
        match self {
            ////////////////////////////////////////////////////////////////////////////////////////
            // Broken requests-- tell the caller how to fix it
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::InvalidPassword { .. } => (StatusCode::BAD_REQUEST, format!("{}", self)),
            Error::InvalidPhone { .. } => (StatusCode::BAD_REQUEST, format!("{}", self)),
            Error::MissingPassword { .. } => (StatusCode::BAD_REQUEST, format!("{}", self)),
            Error::MissingPhone { .. } => (StatusCode::BAD_REQUEST, format!("{}", self)),
            ////////////////////////////////////////////////////////////////////////////////////////
            // Conflicts-- the caller needs to change their input
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::AlreadyLoggedOut { .. } => (StatusCode::CONFLICT, format!("{}", self)),
            Error::DuplicateAdmin { phone, .. } => (
                StatusCode::CONFLICT,
                format!("Phone number {} is already registered; sorry", phone),
            ),
            ////////////////////////////////////////////////////////////////////////////////////////
            // Authentication failures-- don't tell a potential attacker how they failed
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::IncorrectPassword { .. } | Error::UnknownAccount { .. } => (
                StatusCode::UNAUTHORIZED,
                "Unknown phone number or incorrect password".to_owned(),
            ),
            Error::InvalidToken { .. } | Error::RevokedToken { .. } => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_owned())
            }
            Error::MissingToken { .. } => (
                StatusCode::UNAUTHORIZED,
                "No Authorization header or access-token".to_owned(),
            ),
            ////////////////////////////////////////////////////////////////////////////////////////
            // Our fault-- don't leak the details
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::Hash { .. } | Error::Mint { .. } | Error::Storage { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_owned(),
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Pull a non-blank value out of an optional request field
fn required<'a>(field: Option<&'a str>) -> Option<&'a str> {
    match field {
        Some(text) if !text.trim().is_empty() => Some(text),
        _ => None,
    }
}

/// The Credential & Session Lifecycle Manager
pub struct Sessions {
    admins: Arc<dyn AdminBackend + Send + Sync>,
    signing_key: SigningKey,
    token_lifetime: Duration,
}

impl Sessions {
    pub fn new(admins: Arc<dyn AdminBackend + Send + Sync>, signing_key: SigningKey) -> Sessions {
        Sessions {
            admins,
            signing_key,
            token_lifetime: Duration::seconds(TOKEN_LIFETIME_SECS),
        }
    }
    pub fn with_token_lifetime(mut self, token_lifetime: Duration) -> Sessions {
        self.token_lifetime = token_lifetime;
        self
    }
    /// Register a new admin
    ///
    /// Both the phone number & the password are checked for format before storage is touched.
    pub async fn sign_up(
        &self,
        phone: Option<&str>,
        password: Option<&SecretString>,
        name: Option<&str>,
    ) -> Result<Admin> {
        let phone = required(phone).context(MissingPhoneSnafu)?;
        let password = match password {
            Some(password) if !password.expose_secret().is_empty() => password,
            _ => return MissingPasswordSnafu.fail(),
        };
        let phone = Phone::new(phone.trim()).context(InvalidPhoneSnafu)?;
        validate_password(password).context(InvalidPasswordSnafu)?;

        if self
            .admins
            .admin_for_phone(&phone)
            .await
            .context(StorageSnafu)?
            .is_some()
        {
            return DuplicateAdminSnafu { phone }.fail();
        }

        let new_admin =
            NewAdmin::new(&phone, password, name.unwrap_or_default()).context(HashSnafu)?;
        // The store has the final word on uniqueness; we may have raced another sign-up
        match self.admins.add_admin(&new_admin).await {
            Ok(admin) => {
                info!("Created admin {} ({})", admin.id(), admin.phone());
                Ok(admin)
            }
            Err(storage::Error::PhoneClaimed { phone, .. }) => DuplicateAdminSnafu { phone }.fail(),
            Err(err) => Err(StorageSnafu.into_error(err)),
        }
    }
    /// Check an admin's credentials & mint an access token
    pub async fn sign_in(
        &self,
        phone: Option<&str>,
        password: Option<&SecretString>,
    ) -> Result<String> {
        let phone = required(phone).context(MissingPhoneSnafu)?;
        let password = match password {
            Some(password) if !password.expose_secret().is_empty() => password,
            _ => return MissingPasswordSnafu.fail(),
        };
        let admin = self.admin_for_phone(phone).await?;
        match admin.check_password(password) {
            Ok(()) => (),
            Err(entities::Error::BadPassword { .. }) => {
                return IncorrectPasswordSnafu {
                    phone: admin.phone().clone(),
                }
                .fail()
            }
            Err(err) => return Err(HashSnafu.into_error(err)),
        }
        let token =
            mint_token(admin.phone(), &self.signing_key, &self.token_lifetime).context(MintSnafu)?;
        debug!("Minted an access token for {}", admin.phone());
        Ok(token)
    }
    /// Log-out `token`
    ///
    /// Succeeds exactly once per (phone, token) pair.
    pub async fn sign_out(&self, phone: Option<&str>, token: Option<&str>) -> Result<()> {
        let phone = required(phone).context(MissingPhoneSnafu)?;
        let token = required(token).context(MissingTokenSnafu)?;
        let admin = self.admin_for_phone(phone).await?;
        if self
            .admins
            .revocation(admin.id(), token)
            .await
            .context(StorageSnafu)?
            .is_some()
        {
            return AlreadyLoggedOutSnafu {
                phone: admin.phone().clone(),
            }
            .fail();
        }
        match self.admins.add_revocation(admin.id(), token).await {
            Ok(_) => {
                info!("Admin {} logged-out", admin.phone());
                Ok(())
            }
            Err(storage::Error::AlreadyRevoked { .. }) => AlreadyLoggedOutSnafu {
                phone: admin.phone().clone(),
            }
            .fail(),
            Err(err) => Err(StorageSnafu.into_error(err)),
        }
    }
    /// Resolve an access token to the [Admin] it names
    ///
    /// A token is good if and only if its signature checks out under our key, it's unexpired, and
    /// it has not been logged-out.
    pub async fn check_token(&self, token: Option<&str>) -> Result<Admin> {
        let token = required(token).context(MissingTokenSnafu)?;
        let phone = verify_token(token, &self.signing_key).context(InvalidTokenSnafu)?;
        let admin = self.admin_for_phone(&phone).await?;
        if self
            .admins
            .revocation(admin.id(), token)
            .await
            .context(StorageSnafu)?
            .is_some()
        {
            return RevokedTokenSnafu { phone }.fail();
        }
        Ok(admin)
    }
    /// A phone number that can't be valid can't name an account, so it's reported just like one
    /// that isn't registered
    async fn admin_for_phone(&self, phone: &str) -> Result<Admin> {
        let parsed = match Phone::new(phone.trim()) {
            Ok(parsed) => parsed,
            Err(_) => {
                return UnknownAccountSnafu {
                    phone: phone.to_owned(),
                }
                .fail()
            }
        };
        self.admins
            .admin_for_phone(&parsed)
            .await
            .context(StorageSnafu)?
            .context(UnknownAccountSnafu {
                phone: phone.to_owned(),
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::memory;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    fn sessions() -> Sessions {
        Sessions::new(Arc::new(memory::Store::new()), SigningKey::default())
    }

    #[tokio::test]
    async fn validation_precedes_storage() {
        let sessions = sessions();
        let pw = secret("abc12345");
        assert!(matches!(
            sessions.sign_up(None, Some(&pw), None).await,
            Err(Error::MissingPhone { .. })
        ));
        assert!(matches!(
            sessions.sign_up(Some("  "), Some(&pw), None).await,
            Err(Error::MissingPhone { .. })
        ));
        assert!(matches!(
            sessions.sign_up(Some("010-1234-5678"), None, None).await,
            Err(Error::MissingPassword { .. })
        ));
        assert!(matches!(
            sessions.sign_up(Some("555-1234"), Some(&pw), None).await,
            Err(Error::InvalidPhone { .. })
        ));
        assert!(matches!(
            sessions
                .sign_up(Some("010-1234-5678"), Some(&secret("short")), None)
                .await,
            Err(Error::InvalidPassword { .. })
        ));
        assert!(matches!(
            sessions.sign_in(Some("010-1234-5678"), Some(&pw)).await,
            Err(Error::UnknownAccount { .. })
        ));
        assert!(matches!(
            sessions.sign_out(Some("010-1234-5678"), None).await,
            Err(Error::MissingToken { .. })
        ));
    }

    #[tokio::test]
    async fn lifecycle() {
        let sessions = sessions();
        let phone = Some("010-1234-5678");
        let admin = sessions
            .sign_up(phone, Some(&secret("abc12345")), Some("Jane"))
            .await
            .unwrap();
        assert!(matches!(
            sessions.sign_up(phone, Some(&secret("xyz98765")), None).await,
            Err(Error::DuplicateAdmin { .. })
        ));
        // Password format isn't re-checked at sign-in: a wrong password is just wrong
        assert!(matches!(
            sessions.sign_in(phone, Some(&secret("x"))).await,
            Err(Error::IncorrectPassword { .. })
        ));
        let token = sessions
            .sign_in(phone, Some(&secret("abc12345")))
            .await
            .unwrap();
        assert_eq!(
            admin.id(),
            sessions.check_token(Some(&token)).await.unwrap().id()
        );
        sessions.sign_out(phone, Some(&token)).await.unwrap();
        assert!(matches!(
            sessions.check_token(Some(&token)).await,
            Err(Error::RevokedToken { .. })
        ));
        assert!(matches!(
            sessions.sign_out(phone, Some(&token)).await,
            Err(Error::AlreadyLoggedOut { .. })
        ));
    }

    #[tokio::test]
    async fn foreign_and_expired_tokens() {
        let store = Arc::new(memory::Store::new());
        let ours = Sessions::new(store.clone(), SigningKey::from("ours".to_owned()));
        let theirs = Sessions::new(store.clone(), SigningKey::from("theirs".to_owned()));
        let stale = Sessions::new(store, SigningKey::from("ours".to_owned()))
            .with_token_lifetime(Duration::seconds(-60));
        let phone = Some("010-1234-5678");
        let pw = secret("abc12345");
        ours.sign_up(phone, Some(&pw), None).await.unwrap();

        let token = theirs.sign_in(phone, Some(&pw)).await.unwrap();
        assert!(matches!(
            ours.check_token(Some(&token)).await,
            Err(Error::InvalidToken { .. })
        ));
        let token = stale.sign_in(phone, Some(&pw)).await.unwrap();
        assert!(matches!(
            ours.check_token(Some(&token)).await,
            Err(Error::InvalidToken { .. })
        ));
        assert!(matches!(
            ours.check_token(Some("")).await,
            Err(Error::MissingToken { .. })
        ));
    }
}
