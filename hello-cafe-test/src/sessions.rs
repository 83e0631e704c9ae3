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

//! Integration tests for the session lifecycle.

use std::sync::Arc;

use hello_cafe::{http::Cafe, sessions::Error};
use libtest_mimic::Failed;

use crate::{secret, signed_in};

/// Sign-up, sign-in & resolve the token back to the admin
pub async fn test_sign_up_and_in(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let password = secret("americano1");
    let admin = cafe
        .sessions
        .sign_up(Some("010-1234-5678"), Some(&password), Some("  Kim  "))
        .await?;
    assert_eq!("010-1234-5678", &**admin.phone());
    assert_eq!("Kim", admin.name());

    let token = cafe
        .sessions
        .sign_in(Some("010-1234-5678"), Some(&password))
        .await?;
    let resolved = cafe.sessions.check_token(Some(&token)).await?;
    assert_eq!(admin.id(), resolved.id());

    assert!(matches!(
        cafe.sessions
            .sign_up(Some("010-1234-5678"), Some(&secret("different1")), None)
            .await,
        Err(Error::DuplicateAdmin { .. })
    ));

    Ok(())
}

/// Malformed sign-up requests are rejected before anything is written
pub async fn test_sign_up_validation(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let password = secret("password1234");
    assert!(matches!(
        cafe.sessions.sign_up(None, Some(&password), None).await,
        Err(Error::MissingPhone { .. })
    ));
    assert!(matches!(
        cafe.sessions
            .sign_up(Some("010-1234-5678"), None, None)
            .await,
        Err(Error::MissingPassword { .. })
    ));
    assert!(matches!(
        cafe.sessions
            .sign_up(Some("02-123-4567"), Some(&password), None)
            .await,
        Err(Error::InvalidPhone { .. })
    ));
    assert!(matches!(
        cafe.sessions
            .sign_up(Some("010-1234-5678"), Some(&secret("short1")), None)
            .await,
        Err(Error::InvalidPassword { .. })
    ));
    assert!(matches!(
        cafe.sessions
            .sign_up(Some("010-1234-5678"), Some(&secret("no spaces allowed")), None)
            .await,
        Err(Error::InvalidPassword { .. })
    ));
    // None of the above should have left an account behind
    assert!(matches!(
        cafe.sessions
            .sign_in(Some("010-1234-5678"), Some(&password))
            .await,
        Err(Error::UnknownAccount { .. })
    ));
    Ok(())
}

/// The canonical wrong-password scenario
pub async fn test_wrong_password_scenario(cafe: Arc<Cafe>) -> Result<(), Failed> {
    cafe.sessions
        .sign_up(Some("010-1234-5678"), Some(&secret("abc12345")), Some("Lee"))
        .await?;
    let token = cafe
        .sessions
        .sign_in(Some("010-1234-5678"), Some(&secret("abc12345")))
        .await?;
    assert!(!token.is_empty());
    assert!(matches!(
        cafe.sessions
            .sign_in(Some("010-1234-5678"), Some(&secret("wrong1234")))
            .await,
        Err(Error::IncorrectPassword { .. })
    ));
    Ok(())
}

pub async fn test_bad_credentials(cafe: Arc<Cafe>) -> Result<(), Failed> {
    signed_in(&cafe, "010-2222-3333").await?;

    let err = match cafe
        .sessions
        .sign_in(Some("010-2222-3333"), Some(&secret("wrongpassword")))
        .await
    {
        Err(err) => err,
        Ok(_) => return Err("signed-in with the wrong password".into()),
    };
    assert!(matches!(err, Error::IncorrectPassword { .. }));
    assert_eq!("incorrect-password", err.code());

    assert!(matches!(
        cafe.sessions
            .sign_in(Some("010-9999-9999"), Some(&secret("password1234")))
            .await,
        Err(Error::UnknownAccount { .. })
    ));
    assert!(matches!(
        cafe.sessions
            .sign_in(Some("010-2222-3333"), None)
            .await,
        Err(Error::MissingPassword { .. })
    ));
    Ok(())
}

/// Signing-out & straight back in yields a live token
pub async fn test_sign_in_after_sign_out(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, token) = signed_in(&cafe, "010-4444-6666").await?;
    cafe.sessions
        .sign_out(Some("010-4444-6666"), Some(&token))
        .await?;
    let fresh = cafe
        .sessions
        .sign_in(Some("010-4444-6666"), Some(&secret("password1234")))
        .await?;
    assert_ne!(token, fresh);
    assert_eq!(admin.id(), cafe.sessions.check_token(Some(&fresh)).await?.id());
    // ...and may itself be signed-out
    cafe.sessions
        .sign_out(Some("010-4444-6666"), Some(&fresh))
        .await?;
    Ok(())
}

/// A token can be logged-out exactly once, and is dead thereafter
pub async fn test_sign_out(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (_, token) = signed_in(&cafe, "010-4444-5555").await?;
    // A second token for the same admin is unaffected by the first's sign-out
    let other = cafe
        .sessions
        .sign_in(Some("010-4444-5555"), Some(&secret("password1234")))
        .await?;

    cafe.sessions
        .sign_out(Some("010-4444-5555"), Some(&token))
        .await?;
    assert!(matches!(
        cafe.sessions
            .sign_out(Some("010-4444-5555"), Some(&token))
            .await,
        Err(Error::AlreadyLoggedOut { .. })
    ));
    assert!(matches!(
        cafe.sessions.check_token(Some(&token)).await,
        Err(Error::RevokedToken { .. })
    ));

    assert_ne!(other, token);
    cafe.sessions.check_token(Some(&other)).await?;

    assert!(matches!(
        cafe.sessions.sign_out(Some("010-4444-5555"), None).await,
        Err(Error::MissingToken { .. })
    ));
    assert!(matches!(
        cafe.sessions
            .sign_out(Some("010-0000-0000"), Some(&token))
            .await,
        Err(Error::UnknownAccount { .. })
    ));
    Ok(())
}

pub async fn test_bad_tokens(cafe: Arc<Cafe>) -> Result<(), Failed> {
    assert!(matches!(
        cafe.sessions.check_token(None).await,
        Err(Error::MissingToken { .. })
    ));
    assert!(matches!(
        cafe.sessions.check_token(Some("not.a.token")).await,
        Err(Error::InvalidToken { .. })
    ));
    let (_, token) = signed_in(&cafe, "010-6666-7777").await?;
    // Truncate the signature
    let tampered = &token[..token.len() - 3];
    assert!(matches!(
        cafe.sessions.check_token(Some(tampered)).await,
        Err(Error::InvalidToken { .. })
    ));
    Ok(())
}
