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

//! # storage
//!
//! Abstractions for the hello-cafe storage layer.
//!
//! There are two: [AdminBackend] persists admins & the revoked-token ledger, [ItemBackend] persists
//! the catalog. A single implementation may (and both of ours do) implement both.
//!
//! Lookups that may legitimately find nothing return `Option`; "not found" is never an error at
//! this layer. The uniqueness invariants (phone, barcode, revoked token) are enforced *here*, by
//! the store, not merely checked by callers beforehand: a conflicting insert fails with
//! [Error::PhoneClaimed], [Error::BarcodeClaimed] or [Error::AlreadyRevoked] respectively.

use async_trait::async_trait;
use snafu::{prelude::*, Backtrace, IntoError};

use crate::entities::{
    Admin, AdminId, Item, ItemDiff, ItemId, NewAdmin, NewItem, Phone, RevokedToken,
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Token already revoked for admin {admin_id}"))]
    AlreadyRevoked {
        admin_id: AdminId,
        backtrace: Backtrace,
    },
    #[snafu(display("Storage backend failure: {source}"))]
    Backend {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        backtrace: Backtrace,
    },
    #[snafu(display("Barcode {barcode} is already in use"))]
    BarcodeClaimed {
        barcode: String,
        backtrace: Backtrace,
    },
    #[snafu(display("No item with id {id}"))]
    NoSuchItem { id: ItemId, backtrace: Backtrace },
    #[snafu(display("Phone number {phone} is already registered"))]
    PhoneClaimed { phone: Phone, backtrace: Backtrace },
}

impl Error {
    /// Wrap an implementation-specific failure
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        BackendSnafu.into_error(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[async_trait]
pub trait AdminBackend {
    /// Persist a new admin, assigning its id; fails with [Error::PhoneClaimed] if the phone number
    /// is taken
    async fn add_admin(&self, admin: &NewAdmin) -> Result<Admin>;
    /// Record that `token` has been logged-out by `admin_id`; fails with [Error::AlreadyRevoked] if
    /// that's already been recorded
    async fn add_revocation(&self, admin_id: AdminId, token: &str) -> Result<RevokedToken>;
    /// Retrieve an [Admin] by id. None means there is no such admin.
    async fn admin_for_id(&self, id: AdminId) -> Result<Option<Admin>>;
    /// Retrieve an [Admin] by phone number. None means there is no such admin.
    async fn admin_for_phone(&self, phone: &Phone) -> Result<Option<Admin>>;
    /// Look-up a ledger entry
    async fn revocation(&self, admin_id: AdminId, token: &str) -> Result<Option<RevokedToken>>;
}

#[async_trait]
pub trait ItemBackend {
    /// Persist a new item, assigning its id & setting both timestamps; fails with
    /// [Error::BarcodeClaimed] if the barcode is in use anywhere in the catalog
    async fn add_item(&self, item: &NewItem) -> Result<Item>;
    /// Remove an item; fails with [Error::NoSuchItem] if it's not there
    async fn delete_item(&self, id: ItemId) -> Result<()>;
    async fn item_for_barcode(&self, barcode: &str) -> Result<Option<Item>>;
    async fn item_for_id(&self, id: ItemId) -> Result<Option<Item>>;
    /// One page of `admin_id`'s items, newest first
    ///
    /// With a `cursor`, only items whose id is strictly less than it are considered. At most `limit`
    /// items are returned.
    async fn items_page(
        &self,
        admin_id: AdminId,
        cursor: Option<ItemId>,
        limit: usize,
    ) -> Result<Vec<Item>>;
    /// All of `admin_id`'s items whose name or initial-consonant index contains `text`
    /// (case-sensitively), newest first
    async fn search_items(&self, admin_id: AdminId, text: &str) -> Result<Vec<Item>>;
    /// Atomically apply `diff` to an item & bump its modification time, returning the result
    ///
    /// Fails with [Error::NoSuchItem] if the item is gone, and [Error::BarcodeClaimed] if the diff
    /// would give it a barcode already held by another item.
    async fn update_item(&self, id: ItemId, diff: &ItemDiff) -> Result<Item>;
}
