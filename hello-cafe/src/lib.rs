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

//! # hello-cafe
//!
//! A multi-tenant catalog service for cafe owners: admins sign-up with a phone number, sign-in for
//! a short-lived access token, and manage a catalog of items that only they can see.
//!
//! The two engines are [sessions::Sessions] (credentials & the token revocation ledger) and
//! [catalog::Catalog] (item invariants, keyset pagination & search). Both are written against the
//! traits in [storage], which are implemented by [memory] & [sqlite]. [http] assembles the HTTP
//! API out of [admins] & [items].
pub mod admins;
pub mod catalog;
pub mod entities;
pub mod hangul;
pub mod http;
pub mod items;
pub mod memory;
pub mod sessions;
pub mod sqlite;
pub mod storage;
pub mod token;
