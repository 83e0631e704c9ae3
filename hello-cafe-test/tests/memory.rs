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

//! # hello-cafe Integration Tests: In-Memory Store
//!
//! Run every registered test against a fresh in-memory store. This program replaces the default
//! test harness (`harness = false` in Cargo.toml); [libtest-mimic] supplies the usual command-line
//! interface (filtering, `--list` & so on).
//!
//! [libtest-mimic]: https://docs.rs/libtest-mimic/latest/libtest_mimic/index.html

use std::sync::Arc;

use hello_cafe::memory::Store;
use hello_cafe_test::make_cafe;
use libtest_mimic::{Arguments, Trial};

mod common;

fn main() {
    let args = Arguments::from_args();

    let conclusion = libtest_mimic::run(
        &args,
        inventory::iter::<common::Test>
            .into_iter()
            .map(|test| {
                let test_fn = test.test_fn;
                Trial::test(test.name, move || {
                    let store = Arc::new(Store::new());
                    tokio::runtime::Runtime::new()?
                        .block_on(test_fn(make_cafe(store.clone(), store)))
                })
            })
            .collect(),
    );

    conclusion.exit();
}
