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

//! # hello-cafe Access Tokens
//!
//! Access tokens are [JWT]s signed with HMAC-SHA256 under a single shared secret, naming the admin
//! by phone number. They're stateless: nothing is written down when one is minted. Logging-out is
//! implemented by the revocation ledger in [sessions](crate::sessions), not here.
//!
//! [JWT]: https://www.rfc-editor.org/rfc/rfc7519.html

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{Header, SignWithKey, Token, VerifyWithKey};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use snafu::{prelude::*, Backtrace};
use uuid::Uuid;

use crate::entities::Phone;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module Error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Token expired at {expires}"))]
    Expired {
        expires: DateTime<Utc>,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to create an HMAC: {source}"))]
    Hmac {
        source: hmac::digest::InvalidLength,
        backtrace: Backtrace,
    },
    #[snafu(display("Invalid token: not before {not_before}"))]
    NotBefore {
        not_before: DateTime<Utc>,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to sign JWT claims: {source}"))]
    Signature {
        source: jwt::error::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Verification failure: {source}"))]
    Verification {
        source: jwt::error::Error,
        backtrace: Backtrace,
    },
}

type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          SigningKey                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

const INSECURE_DEFAULT_KEY: &str = "default key";

/// The shared secret under which access tokens are signed
///
/// The [Default] implementation yields a fixed, publicly-known key. That's convenient for local
/// development (tokens survive a restart) & useless for anything else; [SigningKey::is_insecure]
/// lets the daemon complain loudly when it's in use.
#[derive(Clone, Debug, Deserialize)]
#[serde(transparent)]
pub struct SigningKey(SecretString);

impl SigningKey {
    pub fn new(secret: SecretString) -> SigningKey {
        SigningKey(secret)
    }
    pub fn is_insecure(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_KEY || self.0.expose_secret().is_empty()
    }
    fn hmac(&self) -> Result<Hmac<Sha256>> {
        Hmac::new_from_slice(self.0.expose_secret().as_bytes()).context(HmacSnafu)
    }
}

impl Default for SigningKey {
    fn default() -> Self {
        SigningKey(SecretString::from(INSECURE_DEFAULT_KEY.to_owned()))
    }
}

impl From<String> for SigningKey {
    fn from(value: String) -> Self {
        SigningKey(SecretString::from(value))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                   the hello-cafe Access Token                                  //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// hello-cafe access [JWT] claims
#[derive(Clone, Debug, Deserialize, Serialize)]
struct AccessClaims {
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    issued_at: DateTime<Utc>,
    #[serde(rename = "nbf", with = "chrono::serde::ts_seconds")]
    not_before: DateTime<Utc>,
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    expires: DateTime<Utc>,
    #[serde(rename = "sub")]
    subject: Phone,
    /// Distinguishes tokens minted for the same admin within the same second
    #[serde(rename = "jti")]
    id: Uuid,
}

/// Mint a new JWT
///
/// Mint a new token naming `phone`, signed using `signing_key`, valid for `lifetime`. The fully
/// serialized JWT is returned.
pub fn mint_token(phone: &Phone, signing_key: &SigningKey, lifetime: &Duration) -> Result<String> {
    let now = Utc::now();
    let claims = AccessClaims {
        issued_at: now,
        not_before: now,
        expires: now + *lifetime,
        subject: phone.clone(),
        id: Uuid::new_v4(),
    };
    Ok(Token::new(Header::default(), claims)
        .sign_with_key(&signing_key.hmac()?)
        .context(SignatureSnafu)?
        .as_str()
        .to_owned())
}

/// Verify a JWT's signature & validity period, returning the phone number it names
pub fn verify_token(token_string: &str, signing_key: &SigningKey) -> Result<Phone> {
    let token: Token<Header, AccessClaims, _> = token_string
        .verify_with_key(&signing_key.hmac()?)
        .context(VerificationSnafu)?;
    let claims = token.claims();
    // Timestamps travel at one-second resolution
    let now = Utc::now();
    if now + Duration::seconds(1) < claims.not_before {
        return NotBeforeSnafu {
            not_before: claims.not_before,
        }
        .fail();
    }
    if now > claims.expires {
        return ExpiredSnafu {
            expires: claims.expires,
        }
        .fail();
    }
    Ok(claims.subject.clone())
}

#[cfg(test)]
mod test {
    use super::*;

    fn phone() -> Phone {
        Phone::new("010-1234-5678").unwrap(/* known good */)
    }

    #[test]
    fn verify_minted_token() {
        let key = SigningKey::from("Not all who wander are lost".to_owned());
        let token = mint_token(&phone(), &key, &Duration::minutes(20)).unwrap();
        assert_eq!(phone(), verify_token(&token, &key).unwrap());
    }

    #[test]
    fn distinct_tokens() {
        let key = SigningKey::default();
        let lifetime = Duration::minutes(20);
        let first = mint_token(&phone(), &key, &lifetime).unwrap();
        let second = mint_token(&phone(), &key, &lifetime).unwrap();
        assert_ne!(first, second);
        assert_eq!(phone(), verify_token(&second, &key).unwrap());
    }

    #[test]
    fn wrong_key() {
        let token = mint_token(
            &phone(),
            &SigningKey::from("one secret".to_owned()),
            &Duration::minutes(20),
        )
        .unwrap();
        assert!(matches!(
            verify_token(&token, &SigningKey::from("another secret".to_owned())),
            Err(Error::Verification { .. })
        ));
        assert!(matches!(
            verify_token("not.a.jwt", &SigningKey::default()),
            Err(Error::Verification { .. })
        ));
    }

    #[test]
    fn expired() {
        let key = SigningKey::default();
        assert!(key.is_insecure());
        let token = mint_token(&phone(), &key, &Duration::seconds(-30)).unwrap();
        assert!(matches!(
            verify_token(&token, &key),
            Err(Error::Expired { .. })
        ));
    }
}
