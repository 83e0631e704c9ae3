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

//! # SQLite storage
//!
//! hello-cafe's persistent store. The uniqueness invariants are written into the schema (`UNIQUE`
//! on `admin.phone`, `item.barcode` & `revoked_token(admin_id, token)`), so a racing writer that
//! slips past an application-level check still can't commit a duplicate; the constraint violation
//! comes back as the corresponding [storage::Error] variant.
//!
//! [rusqlite] is synchronous; every operation hops onto the blocking thread pool via
//! [tokio::task::spawn_blocking] & takes the (single) connection's lock for its duration.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, ToSql, TransactionBehavior,
};
use snafu::{prelude::*, Backtrace, IntoError};
use tracing::debug;

use crate::{
    entities::{Admin, AdminId, Item, ItemDiff, ItemId, NewAdmin, NewItem, Phone, RevokedToken},
    storage::{
        self, AdminBackend, AlreadyRevokedSnafu, BarcodeClaimedSnafu, ItemBackend,
        NoSuchItemSnafu, PhoneClaimedSnafu,
    },
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("The blocking database task failed: {source}"))]
    Join {
        source: tokio::task::JoinError,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to open {}: {source}", pth.display()))]
    Open {
        pth: PathBuf,
        source: rusqlite::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("The database connection lock was poisoned"))]
    Poisoned { backtrace: Backtrace },
    #[snafu(display("Database query {op} failed: {source}"))]
    Query {
        op: &'static str,
        source: rusqlite::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to create the database schema: {source}"))]
    Schema {
        source: rusqlite::Error,
        backtrace: Backtrace,
    },
}

type Result<T> = std::result::Result<T, Error>;

fn map_db_err(op: &'static str) -> impl FnOnce(rusqlite::Error) -> storage::Error {
    move |err| storage::Error::new(QuerySnafu { op }.into_error(err))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                             schema                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS admin (
            admin_id        INTEGER PRIMARY KEY AUTOINCREMENT,
            phone           TEXT    NOT NULL UNIQUE,
            password_hash   TEXT    NOT NULL,
            name            TEXT    NOT NULL,
            created_at      TEXT    NOT NULL,
            modified_at     TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS revoked_token (
            revoked_id      INTEGER PRIMARY KEY AUTOINCREMENT,
            admin_id        INTEGER NOT NULL REFERENCES admin (admin_id),
            token           TEXT    NOT NULL,
            created_at      TEXT    NOT NULL,
            UNIQUE (admin_id, token)
        );

        CREATE TABLE IF NOT EXISTS item (
            item_id         INTEGER PRIMARY KEY AUTOINCREMENT,
            admin_id        INTEGER NOT NULL REFERENCES admin (admin_id),
            category        INTEGER NOT NULL CHECK (category IN (0, 1)),
            barcode         TEXT    NOT NULL UNIQUE,
            price           INTEGER NOT NULL CHECK (price >= 0),
            cost            INTEGER NOT NULL CHECK (cost >= 0),
            name            TEXT    NOT NULL,
            initials        TEXT    NOT NULL,
            description     TEXT    NOT NULL,
            expires_at      TEXT    NOT NULL,
            size            INTEGER NOT NULL CHECK (size IN (0, 1)),
            created_at      TEXT    NOT NULL,
            modified_at     TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_item_admin
        ON item (admin_id, item_id DESC);",
    )
    .context(SchemaSnafu)
}

const ADMIN_COLUMNS: &str = "admin_id, phone, password_hash, name, created_at, modified_at";

const ITEM_COLUMNS: &str = "item_id, admin_id, category, barcode, price, cost, name, initials, \
                            description, expires_at, size, created_at, modified_at";

fn admin_from_row(row: &Row<'_>) -> rusqlite::Result<Admin> {
    Ok(Admin::from_parts(
        row.get("admin_id")?,
        row.get("phone")?,
        row.get("password_hash")?,
        row.get("name")?,
        row.get("created_at")?,
        row.get("modified_at")?,
    ))
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get("item_id")?,
        admin_id: row.get("admin_id")?,
        category: row.get("category")?,
        barcode: row.get("barcode")?,
        price: row.get("price")?,
        cost: row.get("cost")?,
        name: row.get("name")?,
        initials: row.get("initials")?,
        description: row.get("description")?,
        expires: row.get("expires_at")?,
        size: row.get("size")?,
        created: row.get("created_at")?,
        modified: row.get("modified_at")?,
    })
}

fn select_item(conn: &Connection, id: ItemId) -> rusqlite::Result<Option<Item>> {
    conn.query_row(
        &format!("SELECT {} FROM item WHERE item_id = ?1", ITEM_COLUMNS),
        params![id],
        item_from_row,
    )
    .optional()
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                             Store                                              //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if need be) the database at `pth`
    pub fn open(pth: &Path) -> Result<Store> {
        let conn = Connection::open(pth).context(OpenSnafu {
            pth: pth.to_path_buf(),
        })?;
        debug!("Opened SQLite database at {}", pth.display());
        Store::with_connection(conn)
    }
    /// A private, in-memory database; handy for testing
    pub fn open_in_memory() -> Result<Store> {
        let conn = Connection::open_in_memory().context(OpenSnafu {
            pth: PathBuf::from(":memory:"),
        })?;
        Store::with_connection(conn)
    }
    fn with_connection(conn: Connection) -> Result<Store> {
        ensure_schema(&conn)?;
        Ok(Store {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
    /// Run `f` against the connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> storage::Result<T>
    where
        F: FnOnce(&mut Connection) -> storage::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| storage::Error::new(PoisonedSnafu.build()))?;
            f(&mut guard)
        })
        .await
        .map_err(|err| storage::Error::new(JoinSnafu.into_error(err)))?
    }
}

#[async_trait]
impl AdminBackend for Store {
    async fn add_admin(&self, admin: &NewAdmin) -> storage::Result<Admin> {
        let admin = admin.clone();
        self.with_conn(move |conn| {
            let now = Utc::now();
            match conn.execute(
                "INSERT INTO admin (phone, password_hash, name, created_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![admin.phone(), admin.password_hash(), admin.name(), now],
            ) {
                Ok(_) => {
                    let id = AdminId::new(conn.last_insert_rowid());
                    Ok(admin.into_admin(id, now))
                }
                Err(err) if is_constraint_violation(&err) => PhoneClaimedSnafu {
                    phone: admin.phone().clone(),
                }
                .fail(),
                Err(err) => Err(map_db_err("add_admin")(err)),
            }
        })
        .await
    }

    async fn add_revocation(&self, admin_id: AdminId, token: &str) -> storage::Result<RevokedToken> {
        let token = token.to_owned();
        self.with_conn(move |conn| {
            let created = Utc::now();
            match conn.execute(
                "INSERT INTO revoked_token (admin_id, token, created_at) VALUES (?1, ?2, ?3)",
                params![admin_id, token, created],
            ) {
                Ok(_) => Ok(RevokedToken {
                    admin_id,
                    token,
                    created,
                }),
                Err(err) if is_constraint_violation(&err) => {
                    AlreadyRevokedSnafu { admin_id }.fail()
                }
                Err(err) => Err(map_db_err("add_revocation")(err)),
            }
        })
        .await
    }

    async fn admin_for_id(&self, id: AdminId) -> storage::Result<Option<Admin>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM admin WHERE admin_id = ?1", ADMIN_COLUMNS),
                params![id],
                admin_from_row,
            )
            .optional()
            .map_err(map_db_err("admin_for_id"))
        })
        .await
    }

    async fn admin_for_phone(&self, phone: &Phone) -> storage::Result<Option<Admin>> {
        let phone = phone.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM admin WHERE phone = ?1", ADMIN_COLUMNS),
                params![phone],
                admin_from_row,
            )
            .optional()
            .map_err(map_db_err("admin_for_phone"))
        })
        .await
    }

    async fn revocation(
        &self,
        admin_id: AdminId,
        token: &str,
    ) -> storage::Result<Option<RevokedToken>> {
        let token = token.to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT admin_id, token, created_at FROM revoked_token
                 WHERE admin_id = ?1 AND token = ?2",
                params![admin_id, token],
                |row| {
                    Ok(RevokedToken {
                        admin_id: row.get(0)?,
                        token: row.get(1)?,
                        created: row.get::<_, DateTime<Utc>>(2)?,
                    })
                },
            )
            .optional()
            .map_err(map_db_err("revocation"))
        })
        .await
    }
}

#[async_trait]
impl ItemBackend for Store {
    async fn add_item(&self, item: &NewItem) -> storage::Result<Item> {
        let item = item.clone();
        self.with_conn(move |conn| {
            let now = Utc::now();
            match conn.execute(
                "INSERT INTO item (admin_id, category, barcode, price, cost, name, initials,
                                   description, expires_at, size, created_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    item.admin_id(),
                    item.category(),
                    item.barcode(),
                    item.price(),
                    item.cost(),
                    item.name(),
                    item.initials(),
                    item.description(),
                    item.expires(),
                    item.size(),
                    now
                ],
            ) {
                Ok(_) => {
                    let id = ItemId::new(conn.last_insert_rowid());
                    Ok(item.into_item(id, now))
                }
                // `barcode` is the only UNIQUE column; the CHECKs are upheld by the types
                Err(err) if is_constraint_violation(&err) => BarcodeClaimedSnafu {
                    barcode: item.barcode().to_owned(),
                }
                .fail(),
                Err(err) => Err(map_db_err("add_item")(err)),
            }
        })
        .await
    }

    async fn delete_item(&self, id: ItemId) -> storage::Result<()> {
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM item WHERE item_id = ?1", params![id])
                .map_err(map_db_err("delete_item"))?;
            ensure!(deleted > 0, NoSuchItemSnafu { id });
            Ok(())
        })
        .await
    }

    async fn item_for_barcode(&self, barcode: &str) -> storage::Result<Option<Item>> {
        let barcode = barcode.to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM item WHERE barcode = ?1", ITEM_COLUMNS),
                params![barcode],
                item_from_row,
            )
            .optional()
            .map_err(map_db_err("item_for_barcode"))
        })
        .await
    }

    async fn item_for_id(&self, id: ItemId) -> storage::Result<Option<Item>> {
        self.with_conn(move |conn| select_item(conn, id).map_err(map_db_err("item_for_id")))
            .await
    }

    async fn items_page(
        &self,
        admin_id: AdminId,
        cursor: Option<ItemId>,
        limit: usize,
    ) -> storage::Result<Vec<Item>> {
        self.with_conn(move |conn| {
            // No cursor means "start from the top", which is the same as a cursor of +infinity
            let cursor = cursor.map(|id| id.raw()).unwrap_or(i64::MAX);
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let mut stmt = conn
                .prepare_cached(&format!(
                    "SELECT {} FROM item WHERE admin_id = ?1 AND item_id < ?2
                     ORDER BY item_id DESC LIMIT ?3",
                    ITEM_COLUMNS
                ))
                .map_err(map_db_err("items_page"))?;
            let items = stmt
                .query_map(params![admin_id, cursor, limit], item_from_row)
                .map_err(map_db_err("items_page"))?
                .collect::<rusqlite::Result<Vec<Item>>>()
                .map_err(map_db_err("items_page"))?;
            Ok(items)
        })
        .await
    }

    async fn search_items(&self, admin_id: AdminId, text: &str) -> storage::Result<Vec<Item>> {
        let text = text.to_owned();
        self.with_conn(move |conn| {
            // `instr` rather than `LIKE`: the match is case-sensitive & the text needs no escaping
            let mut stmt = conn
                .prepare_cached(&format!(
                    "SELECT {} FROM item
                     WHERE admin_id = ?1 AND (instr(name, ?2) > 0 OR instr(initials, ?2) > 0)
                     ORDER BY item_id DESC",
                    ITEM_COLUMNS
                ))
                .map_err(map_db_err("search_items"))?;
            let items = stmt
                .query_map(params![admin_id, text], item_from_row)
                .map_err(map_db_err("search_items"))?
                .collect::<rusqlite::Result<Vec<Item>>>()
                .map_err(map_db_err("search_items"))?;
            Ok(items)
        })
        .await
    }

    async fn update_item(&self, id: ItemId, diff: &ItemDiff) -> storage::Result<Item> {
        let diff = diff.clone();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_db_err("update_item"))?;

            let mut columns: Vec<&'static str> = Vec::new();
            let mut values: Vec<Box<dyn ToSql>> = Vec::new();
            if let Some(category) = diff.category() {
                columns.push("category");
                values.push(Box::new(category));
            }
            if let Some(barcode) = diff.barcode() {
                columns.push("barcode");
                values.push(Box::new(barcode.to_owned()));
            }
            if let Some(price) = diff.price() {
                columns.push("price");
                values.push(Box::new(price));
            }
            if let Some(cost) = diff.cost() {
                columns.push("cost");
                values.push(Box::new(cost));
            }
            if let Some((name, initials)) = diff.name() {
                columns.push("name");
                values.push(Box::new(name.to_owned()));
                columns.push("initials");
                values.push(Box::new(initials.to_owned()));
            }
            if let Some(description) = diff.description() {
                columns.push("description");
                values.push(Box::new(description.to_owned()));
            }
            if let Some(expires) = diff.expires() {
                columns.push("expires_at");
                values.push(Box::new(expires));
            }
            if let Some(size) = diff.size() {
                columns.push("size");
                values.push(Box::new(size));
            }
            columns.push("modified_at");
            values.push(Box::new(Utc::now()));
            values.push(Box::new(id));

            let sql = format!(
                "UPDATE item SET {} WHERE item_id = ?{}",
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| format!("{} = ?{}", column, i + 1))
                    .collect::<Vec<String>>()
                    .join(", "),
                values.len()
            );
            let updated = match tx.execute(
                &sql,
                rusqlite::params_from_iter(values.iter().map(|value| value.as_ref())),
            ) {
                Ok(n) => n,
                Err(err) if is_constraint_violation(&err) => {
                    return BarcodeClaimedSnafu {
                        barcode: diff.barcode().unwrap_or_default().to_owned(),
                    }
                    .fail()
                }
                Err(err) => return Err(map_db_err("update_item")(err)),
            };
            ensure!(updated > 0, NoSuchItemSnafu { id });

            let item = select_item(&tx, id)
                .map_err(map_db_err("update_item"))?
                .context(NoSuchItemSnafu { id })?;
            tx.commit().map_err(map_db_err("update_item"))?;
            Ok(item)
        })
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use chrono::Duration;
    use secrecy::SecretString;

    use crate::entities::{Category, Size};

    async fn admin(store: &Store, phone: &str) -> Admin {
        store
            .add_admin(
                &NewAdmin::new(
                    &Phone::new(phone).unwrap(),
                    &SecretString::from("abc12345".to_owned()),
                    "Jane",
                )
                .unwrap(),
            )
            .await
            .unwrap()
    }

    fn new_item(admin_id: AdminId, barcode: &str, name: &str) -> NewItem {
        NewItem::new(
            admin_id,
            Category::Food,
            barcode,
            6000,
            2500,
            name,
            "a sandwich",
            Utc::now() + Duration::days(2),
            Size::Large,
        )
    }

    #[tokio::test]
    async fn admins_and_ledger() {
        let store = Store::open_in_memory().unwrap();
        let jane = admin(&store, "010-1234-5678").await;
        assert!(jane.id().raw() > 0);

        let found = store
            .admin_for_phone(jane.phone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(jane.id(), found.id());
        assert!(found.check_password(&SecretString::from("abc12345".to_owned())).is_ok());
        assert!(store.admin_for_id(AdminId::new(99)).await.unwrap().is_none());

        assert!(matches!(
            store
                .add_admin(
                    &NewAdmin::new(
                        jane.phone(),
                        &SecretString::from("xyz98765".to_owned()),
                        "John",
                    )
                    .unwrap(),
                )
                .await,
            Err(storage::Error::PhoneClaimed { .. })
        ));

        assert!(store.revocation(jane.id(), "tok").await.unwrap().is_none());
        store.add_revocation(jane.id(), "tok").await.unwrap();
        assert!(store.revocation(jane.id(), "tok").await.unwrap().is_some());
        assert!(matches!(
            store.add_revocation(jane.id(), "tok").await,
            Err(storage::Error::AlreadyRevoked { .. })
        ));
    }

    #[tokio::test]
    async fn items() {
        let store = Store::open_in_memory().unwrap();
        let jane = admin(&store, "010-1234-5678").await;
        let john = admin(&store, "010-8765-4321").await;

        let sandwich = store
            .add_item(&new_item(jane.id(), "880012345", "샌드위치"))
            .await
            .unwrap();
        assert_eq!("ㅅㄷㅇㅊ", sandwich.initials);
        assert!(matches!(
            store.add_item(&new_item(john.id(), "880012345", "Bagel")).await,
            Err(storage::Error::BarcodeClaimed { .. })
        ));
        let bagel = store
            .add_item(&new_item(jane.id(), "880012346", "Bagel"))
            .await
            .unwrap();
        store
            .add_item(&new_item(john.id(), "880012347", "샌드위치"))
            .await
            .unwrap();

        let found = store.item_for_barcode("880012345").await.unwrap().unwrap();
        assert_eq!(sandwich, found);

        let page = store.items_page(jane.id(), None, 10).await.unwrap();
        assert_eq!(vec![bagel.id, sandwich.id], page.iter().map(|i| i.id).collect::<Vec<_>>());
        let page = store.items_page(jane.id(), Some(bagel.id), 10).await.unwrap();
        assert_eq!(vec![sandwich.id], page.iter().map(|i| i.id).collect::<Vec<_>>());

        let hits = store.search_items(jane.id(), "ㅅㄷ").await.unwrap();
        assert_eq!(1, hits.len());
        assert_eq!(0, store.search_items(jane.id(), "bagel").await.unwrap().len());
        assert_eq!(1, store.search_items(jane.id(), "Bag").await.unwrap().len());

        let updated = store
            .update_item(sandwich.id, &ItemDiff::default().with_name("토스트").with_price(7000))
            .await
            .unwrap();
        assert_eq!("토스트", updated.name);
        assert_eq!("ㅌㅅㅌ", updated.initials);
        assert_eq!(7000, updated.price);
        assert_eq!(sandwich.cost, updated.cost);
        assert_eq!(sandwich.barcode, updated.barcode);
        assert!(matches!(
            store
                .update_item(bagel.id, &ItemDiff::default().with_barcode("880012345"))
                .await,
            Err(storage::Error::BarcodeClaimed { .. })
        ));
        assert!(matches!(
            store
                .update_item(ItemId::new(1000), &ItemDiff::default().with_cost(1))
                .await,
            Err(storage::Error::NoSuchItem { .. })
        ));

        store.delete_item(bagel.id).await.unwrap();
        assert!(store.item_for_id(bagel.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete_item(bagel.id).await,
            Err(storage::Error::NoSuchItem { .. })
        ));
    }
}
