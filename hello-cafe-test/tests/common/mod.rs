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

//! Test framework plumbing shared by every integration test program.
//!
//! Each program includes this module, so every test registered here runs once against each store.

use std::sync::Arc;

use futures::future::{FutureExt, LocalBoxFuture};
use hello_cafe::http::Cafe;
use hello_cafe_test::{catalog, http, sessions};
use libtest_mimic::Failed;

pub struct Test {
    pub name: &'static str,
    pub test_fn: fn(cafe: Arc<Cafe>) -> LocalBoxFuture<'static, Result<(), Failed>>,
}

inventory::collect!(Test);

inventory::submit!(Test {
    name: "sign_up_and_in",
    test_fn: |cafe| sessions::test_sign_up_and_in(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "sign_up_validation",
    test_fn: |cafe| sessions::test_sign_up_validation(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "wrong_password_scenario",
    test_fn: |cafe| sessions::test_wrong_password_scenario(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "bad_credentials",
    test_fn: |cafe| sessions::test_bad_credentials(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "sign_out",
    test_fn: |cafe| sessions::test_sign_out(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "sign_in_after_sign_out",
    test_fn: |cafe| sessions::test_sign_in_after_sign_out(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "bad_tokens",
    test_fn: |cafe| sessions::test_bad_tokens(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "create_and_get",
    test_fn: |cafe| catalog::test_create_and_get(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "create_validation",
    test_fn: |cafe| catalog::test_create_validation(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "duplicate_barcode",
    test_fn: |cafe| catalog::test_duplicate_barcode(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "concurrent_barcode_claims",
    test_fn: |cafe| catalog::test_concurrent_barcode_claims(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "partial_update",
    test_fn: |cafe| catalog::test_partial_update(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "update_barcode_conflict",
    test_fn: |cafe| catalog::test_update_barcode_conflict(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "foreign_items",
    test_fn: |cafe| catalog::test_foreign_items(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "delete",
    test_fn: |cafe| catalog::test_delete(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "keyset_pages",
    test_fn: |cafe| catalog::test_keyset_pages(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "small_pages",
    test_fn: |cafe| catalog::test_small_pages(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "page_limits",
    test_fn: |cafe| catalog::test_page_limits(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "search",
    test_fn: |cafe| catalog::test_search(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "healthcheck",
    test_fn: |cafe| http::test_healthcheck(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "session_round_trip",
    test_fn: |cafe| http::test_session_round_trip(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "unauthenticated",
    test_fn: |cafe| http::test_unauthenticated(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "item_errors",
    test_fn: |cafe| http::test_item_errors(cafe).boxed_local(),
});

inventory::submit!(Test {
    name: "malformed_requests",
    test_fn: |cafe| http::test_malformed_requests(cafe).boxed_local(),
});
