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

//! # hello-cafe Integration Tests: SQLite Store
//!
//! Run every registered test against a SQLite store. Each test gets its own database file under
//! the system temporary directory, removed before & after the test runs.

use std::{
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use hello_cafe::sqlite::{self, Store};
use hello_cafe_test::{item_fields, make_cafe, signed_in};
use libtest_mimic::{Arguments, Failed, Trial};
use snafu::prelude::*;

mod common;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Failed to open {pth:?}: {source}"))]
    Open { pth: PathBuf, source: sqlite::Error },
    #[snafu(display("Failed to remove {pth:?}: {source}"))]
    Remove {
        pth: PathBuf,
        source: std::io::Error,
    },
}

type Result<T> = std::result::Result<T, Error>;

fn database_for(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("hello-cafe-test-{}-{}.db", process::id(), name))
}

/// Remove `pth`; a file that's not there is fine
fn teardown(pth: &Path) -> Result<()> {
    match std::fs::remove_file(pth) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).context(RemoveSnafu { pth }),
    }
}

fn open(pth: &Path) -> Result<Arc<Store>> {
    Ok(Arc::new(Store::open(pth).context(OpenSnafu { pth })?))
}

/// Everything written should be there after closing & re-opening the database
async fn test_reopen(pth: PathBuf) -> std::result::Result<(), Failed> {
    let (admin, item) = {
        let store = open(&pth)?;
        let cafe = make_cafe(store.clone(), store);
        let (admin, _) = signed_in(&cafe, "010-5000-0001").await?;
        let item = cafe
            .catalog
            .create_item(admin.id(), &item_fields("880099999", "아메리카노"))
            .await?;
        (admin, item)
    };

    let store = open(&pth)?;
    let cafe = make_cafe(store.clone(), store);
    assert_eq!(item, cafe.catalog.get_item(admin.id(), item.id.raw()).await?);
    assert!(cafe.catalog.check_duplicate_barcode("880099999").await?);
    // The admin's credentials survived, too
    cafe.sessions
        .sign_in(
            Some("010-5000-0001"),
            Some(&hello_cafe_test::secret("password1234")),
        )
        .await?;
    Ok(())
}

/// Set up a fresh database for one test, run it, & clean up
fn run_with_database<F>(name: &str, body: F) -> std::result::Result<(), Failed>
where
    F: FnOnce(PathBuf) -> std::result::Result<(), Failed>,
{
    let pth = database_for(name);
    teardown(&pth)?;
    let result = body(pth.clone());
    teardown(&pth)?;
    result
}

fn main() {
    let args = Arguments::from_args();

    let mut trials: Vec<Trial> = inventory::iter::<common::Test>
        .into_iter()
        .map(|test| {
            let name = test.name;
            let test_fn = test.test_fn;
            Trial::test(name, move || {
                run_with_database(name, |pth| {
                    let store = open(&pth)?;
                    tokio::runtime::Runtime::new()?.block_on(test_fn(make_cafe(store.clone(), store)))
                })
            })
        })
        .collect();

    trials.push(Trial::test("reopen", || {
        run_with_database("reopen", |pth| {
            tokio::runtime::Runtime::new()?.block_on(test_reopen(pth))
        })
    }));

    libtest_mimic::run(&args, trials).exit();
}
