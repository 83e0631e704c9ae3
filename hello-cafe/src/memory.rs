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

//! # In-memory storage
//!
//! A [Store] implementing both storage traits over plain collections, for development & testing.
//! All state sits behind a single [RwLock]; every operation that checks an invariant & then
//! mutates does both under one write guard, so concurrent callers can't interleave between the
//! check & the write.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use snafu::prelude::*;
use tokio::sync::RwLock;

use crate::{
    entities::{Admin, AdminId, Item, ItemDiff, ItemId, NewAdmin, NewItem, Phone, RevokedToken},
    storage::{
        self, AdminBackend, AlreadyRevokedSnafu, BarcodeClaimedSnafu, ItemBackend,
        NoSuchItemSnafu, PhoneClaimedSnafu,
    },
};

#[derive(Debug, Default)]
struct State {
    next_admin_id: i64,
    next_item_id: i64,
    admins: BTreeMap<AdminId, Admin>,
    phones: HashMap<Phone, AdminId>,
    revocations: HashMap<(AdminId, String), RevokedToken>,
    // Ordered by id, so a keyset scan is a reverse range walk
    items: BTreeMap<ItemId, Item>,
    barcodes: HashMap<String, ItemId>,
}

#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<State>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }
}

#[async_trait]
impl AdminBackend for Store {
    async fn add_admin(&self, admin: &NewAdmin) -> storage::Result<Admin> {
        let mut state = self.state.write().await;
        ensure!(
            !state.phones.contains_key(admin.phone()),
            PhoneClaimedSnafu {
                phone: admin.phone().clone(),
            }
        );
        state.next_admin_id += 1;
        let id = AdminId::new(state.next_admin_id);
        let admin = admin.clone().into_admin(id, Utc::now());
        state.phones.insert(admin.phone().clone(), id);
        state.admins.insert(id, admin.clone());
        Ok(admin)
    }

    async fn add_revocation(&self, admin_id: AdminId, token: &str) -> storage::Result<RevokedToken> {
        let mut state = self.state.write().await;
        let key = (admin_id, token.to_owned());
        ensure!(
            !state.revocations.contains_key(&key),
            AlreadyRevokedSnafu { admin_id }
        );
        let entry = RevokedToken {
            admin_id,
            token: token.to_owned(),
            created: Utc::now(),
        };
        state.revocations.insert(key, entry.clone());
        Ok(entry)
    }

    async fn admin_for_id(&self, id: AdminId) -> storage::Result<Option<Admin>> {
        Ok(self.state.read().await.admins.get(&id).cloned())
    }

    async fn admin_for_phone(&self, phone: &Phone) -> storage::Result<Option<Admin>> {
        let state = self.state.read().await;
        Ok(state
            .phones
            .get(phone)
            .and_then(|id| state.admins.get(id))
            .cloned())
    }

    async fn revocation(
        &self,
        admin_id: AdminId,
        token: &str,
    ) -> storage::Result<Option<RevokedToken>> {
        Ok(self
            .state
            .read()
            .await
            .revocations
            .get(&(admin_id, token.to_owned()))
            .cloned())
    }
}

#[async_trait]
impl ItemBackend for Store {
    async fn add_item(&self, item: &NewItem) -> storage::Result<Item> {
        let mut state = self.state.write().await;
        ensure!(
            !state.barcodes.contains_key(item.barcode()),
            BarcodeClaimedSnafu {
                barcode: item.barcode().to_owned(),
            }
        );
        state.next_item_id += 1;
        let id = ItemId::new(state.next_item_id);
        let item = item.clone().into_item(id, Utc::now());
        state.barcodes.insert(item.barcode.clone(), id);
        state.items.insert(id, item.clone());
        Ok(item)
    }

    async fn delete_item(&self, id: ItemId) -> storage::Result<()> {
        let mut state = self.state.write().await;
        let item = state.items.remove(&id).context(NoSuchItemSnafu { id })?;
        state.barcodes.remove(&item.barcode);
        Ok(())
    }

    async fn item_for_barcode(&self, barcode: &str) -> storage::Result<Option<Item>> {
        let state = self.state.read().await;
        Ok(state
            .barcodes
            .get(barcode)
            .and_then(|id| state.items.get(id))
            .cloned())
    }

    async fn item_for_id(&self, id: ItemId) -> storage::Result<Option<Item>> {
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn items_page(
        &self,
        admin_id: AdminId,
        cursor: Option<ItemId>,
        limit: usize,
    ) -> storage::Result<Vec<Item>> {
        let state = self.state.read().await;
        let scan = match cursor {
            Some(cursor) => state.items.range(..cursor),
            None => state.items.range(..),
        };
        Ok(scan
            .rev()
            .map(|(_, item)| item)
            .filter(|item| item.admin_id == admin_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search_items(&self, admin_id: AdminId, text: &str) -> storage::Result<Vec<Item>> {
        Ok(self
            .state
            .read()
            .await
            .items
            .values()
            .rev()
            .filter(|item| {
                item.admin_id == admin_id
                    && (item.name.contains(text) || item.initials.contains(text))
            })
            .cloned()
            .collect())
    }

    async fn update_item(&self, id: ItemId, diff: &ItemDiff) -> storage::Result<Item> {
        let mut state = self.state.write().await;
        let current = state
            .items
            .get(&id)
            .cloned()
            .context(NoSuchItemSnafu { id })?;
        if let Some(barcode) = diff.barcode() {
            if let Some(holder) = state.barcodes.get(barcode) {
                ensure!(
                    *holder == id,
                    BarcodeClaimedSnafu {
                        barcode: barcode.to_owned(),
                    }
                );
            }
        }
        let mut item = current.clone();
        item.apply(diff, Utc::now());
        if item.barcode != current.barcode {
            state.barcodes.remove(&current.barcode);
            state.barcodes.insert(item.barcode.clone(), id);
        }
        state.items.insert(id, item.clone());
        Ok(item)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use chrono::Duration;

    use crate::entities::{Category, Size};

    fn new_item(admin_id: AdminId, barcode: &str, name: &str) -> NewItem {
        NewItem::new(
            admin_id,
            Category::Beverage,
            barcode,
            4500,
            1500,
            name,
            "a drink",
            Utc::now() + Duration::days(7),
            Size::Small,
        )
    }

    #[tokio::test]
    async fn keyset_scan() {
        let store = Store::new();
        let a = AdminId::new(1);
        let b = AdminId::new(2);
        for i in 0..5 {
            store
                .add_item(&new_item(a, &format!("a-{}", i), "라떼"))
                .await
                .unwrap();
            store
                .add_item(&new_item(b, &format!("b-{}", i), "라떼"))
                .await
                .unwrap();
        }
        let first = store.items_page(a, None, 3).await.unwrap();
        assert_eq!(3, first.len());
        assert!(first.iter().all(|item| item.admin_id == a));
        assert!(first.windows(2).all(|w| w[0].id > w[1].id));
        let second = store
            .items_page(a, Some(first[2].id), 3)
            .await
            .unwrap();
        assert_eq!(2, second.len());
        assert!(second[0].id < first[2].id);
    }

    #[tokio::test]
    async fn uniqueness() {
        let store = Store::new();
        let a = AdminId::new(1);
        let first = store.add_item(&new_item(a, "880012345", "라떼")).await.unwrap();
        let second = store.add_item(&new_item(a, "880012346", "모카")).await.unwrap();
        assert!(matches!(
            store.add_item(&new_item(a, "880012345", "에스프레소")).await,
            Err(storage::Error::BarcodeClaimed { .. })
        ));
        assert!(matches!(
            store
                .update_item(second.id, &ItemDiff::default().with_barcode("880012345"))
                .await,
            Err(storage::Error::BarcodeClaimed { .. })
        ));
        // Re-asserting an item's own barcode is fine
        assert!(store
            .update_item(first.id, &ItemDiff::default().with_barcode("880012345"))
            .await
            .is_ok());
        store.delete_item(first.id).await.unwrap();
        assert!(matches!(
            store.delete_item(first.id).await,
            Err(storage::Error::NoSuchItem { .. })
        ));
        // ...and once deleted, the barcode is free again
        assert!(store.add_item(&new_item(a, "880012345", "라떼")).await.is_ok());
    }
}
