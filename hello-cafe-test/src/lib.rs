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

//! # The hello-cafe Integration Tests
//!
//! # Introduction
//!
//! The Rust test framework has no notion of fixtures; the integration tests in this crate get one
//! by opting-out of the default harness:
//!
//! ```toml
//! [[test]]
//!     name = "memory"
//!     harness = false
//! ```
//!
//! `tests/memory.rs` & `tests/sqlite.rs` each supply a `main()` that uses [libtest-mimic] to
//! present a conventional test runner, and hands every test a freshly-built [Cafe] over the store
//! it's exercising.
//!
//! [libtest-mimic]: https://docs.rs/libtest-mimic/latest/libtest_mimic/index.html
//!
//! # Project Structure
//!
//! The test logic itself knows nothing about which store it's running against, and lives in this
//! library ([sessions], [catalog] & [http]). Code relating to the test framework (the `Test`
//! struct) belongs in `tests/common`.
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use hello_cafe::{
    catalog::{Catalog, ItemFields},
    entities::Admin,
    http::Cafe,
    sessions::Sessions,
    storage::{AdminBackend, ItemBackend},
    token::SigningKey,
};
use libtest_mimic::Failed;
use secrecy::SecretString;

pub mod catalog;
pub mod http;
pub mod sessions;

/// Assemble a [Cafe] over the given stores
pub fn make_cafe(
    admins: Arc<dyn AdminBackend + Send + Sync>,
    items: Arc<dyn ItemBackend + Send + Sync>,
) -> Arc<Cafe> {
    Arc::new(Cafe {
        sessions: Sessions::new(
            admins.clone(),
            SigningKey::from("hello-cafe integration tests".to_owned()),
        ),
        catalog: Catalog::new(admins, items),
    })
}

pub fn secret(text: &str) -> SecretString {
    SecretString::from(text.to_owned())
}

/// A complete, valid set of item fields
pub fn item_fields(barcode: &str, name: &str) -> ItemFields {
    ItemFields {
        category: Some(0),
        barcode: Some(barcode.to_owned()),
        price: Some(4500),
        cost: Some(1200),
        name: Some(name.to_owned()),
        description: Some("Made fresh to order".to_owned()),
        expires: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).single(),
        size: Some(0),
    }
}

/// Sign-up a new admin & sign them in
pub async fn signed_in(cafe: &Cafe, phone: &str) -> Result<(Admin, String), Failed> {
    let password = secret("password1234");
    let admin = cafe
        .sessions
        .sign_up(Some(phone), Some(&password), Some("Test Owner"))
        .await?;
    let token = cafe.sessions.sign_in(Some(phone), Some(&password)).await?;
    Ok((admin, token))
}
