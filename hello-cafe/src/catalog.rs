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

//! # The catalog
//!
//! Item management for authenticated admins. Every operation is scoped to the acting admin: an item
//! belonging to someone else is reported exactly as though it didn't exist.
//!
//! Requests arrive as [ItemFields], in which every field is optional & category/size are raw
//! integer codes. They're validated into an [NewItem] or [ItemDiff] up-front, before any storage
//! access, so that everything downstream works with well-typed values only.
//!
//! Barcodes are unique across the whole catalog (not merely per admin). We check before writing so
//! as to fail fast with a helpful error, but the store enforces the constraint as well, and a
//! conflict reported by the store on write is mapped to the same [Error::DuplicateItem].
//!
//! Listing uses keyset pagination: items come back newest (highest id) first, and the caller
//! resumes by passing the last id it saw as the cursor. Unlike offset pagination, this neither
//! skips nor repeats items when the catalog changes between pages.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::{prelude::*, Backtrace, IntoError};
use tracing::info;

use crate::{
    entities::{self, AdminId, Category, Item, ItemDiff, ItemId, NewItem, Size},
    storage::{self, AdminBackend, ItemBackend},
};

/// Page size used when the caller doesn't ask for a positive one
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page we'll return, absent configuration
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("An item with barcode {barcode} already exists"))]
    DuplicateItem {
        barcode: String,
        backtrace: Backtrace,
    },
    #[snafu(display("No admin with id {admin_id}"))]
    InvalidAdmin {
        admin_id: AdminId,
        backtrace: Backtrace,
    },
    #[snafu(display("Invalid category: {source}"))]
    InvalidCategory {
        source: entities::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Invalid cost {cost}; costs may not be negative"))]
    InvalidCost { cost: i64, backtrace: Backtrace },
    #[snafu(display("{id} is not a valid item id"))]
    InvalidItem { id: i64, backtrace: Backtrace },
    #[snafu(display("Invalid price {price}; prices may not be negative"))]
    InvalidPrice { price: i64, backtrace: Backtrace },
    #[snafu(display("Invalid size: {source}"))]
    InvalidSize {
        source: entities::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("No barcode supplied"))]
    MissingBarcode { backtrace: Backtrace },
    #[snafu(display("No category supplied"))]
    MissingCategory { backtrace: Backtrace },
    #[snafu(display("No cost supplied"))]
    MissingCost { backtrace: Backtrace },
    #[snafu(display("No description supplied"))]
    MissingDescription { backtrace: Backtrace },
    #[snafu(display("No expiry supplied"))]
    MissingExpiry { backtrace: Backtrace },
    #[snafu(display("No name supplied"))]
    MissingName { backtrace: Backtrace },
    #[snafu(display("No price supplied"))]
    MissingPrice { backtrace: Backtrace },
    #[snafu(display("No search text supplied"))]
    MissingSearchText { backtrace: Backtrace },
    #[snafu(display("No size supplied"))]
    MissingSize { backtrace: Backtrace },
    #[snafu(display("Item {id} does not exist"))]
    NotExistItem { id: ItemId, backtrace: Backtrace },
    #[snafu(display("Storage error: {source}"))]
    Storage {
        source: storage::Error,
        backtrace: Backtrace,
    },
}

impl Error {
    /// A stable, machine-readable name for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::DuplicateItem { .. } => "duplicate-item",
            Error::InvalidAdmin { .. } => "invalid-admin",
            Error::InvalidCategory { .. } => "invalid-category",
            Error::InvalidCost { .. } => "invalid-cost",
            Error::InvalidItem { .. } => "invalid-item",
            Error::InvalidPrice { .. } => "invalid-price",
            Error::InvalidSize { .. } => "invalid-size",
            Error::MissingBarcode { .. } => "missing-barcode",
            Error::MissingCategory { .. } => "missing-category",
            Error::MissingCost { .. } => "missing-cost",
            Error::MissingDescription { .. } => "missing-description",
            Error::MissingExpiry { .. } => "missing-expiry",
            Error::MissingName { .. } => "missing-name",
            Error::MissingPrice { .. } => "missing-price",
            Error::MissingSearchText { .. } => "missing-search-text",
            Error::MissingSize { .. } => "missing-size",
            Error::NotExistItem { .. } => "not-exist-item",
            Error::Storage { .. } => "internal",
        }
    }
    pub fn as_status_and_msg(&self) -> (StatusCode, String) {
        match self {
            Error::DuplicateItem { .. } => (StatusCode::CONFLICT, format!("{}", self)),
            Error::NotExistItem { .. } => (StatusCode::NOT_FOUND, format!("{}", self)),
            Error::Storage { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_owned(),
            ),
            // Everything else is a malformed request
            _ => (StatusCode::BAD_REQUEST, format!("{}", self)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       request validation                                       //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Item fields as supplied by a caller
///
/// Everything is optional here; what's mandatory depends on whether we're creating or updating.
/// `category` & `size` are the raw integer codes.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ItemFields {
    pub category: Option<i64>,
    pub barcode: Option<String>,
    pub price: Option<i64>,
    pub cost: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub size: Option<i64>,
}

/// `field`, as given, unless it's absent or all whitespace
fn non_blank(field: Option<&str>) -> Option<&str> {
    match field {
        Some(text) if !text.trim().is_empty() => Some(text),
        _ => None,
    }
}

fn category(raw: i64) -> Result<Category> {
    Category::try_from(raw).context(InvalidCategorySnafu)
}

fn size(raw: i64) -> Result<Size> {
    Size::try_from(raw).context(InvalidSizeSnafu)
}

fn price(price: i64) -> Result<i64> {
    ensure!(price >= 0, InvalidPriceSnafu { price });
    Ok(price)
}

fn cost(cost: i64) -> Result<i64> {
    ensure!(cost >= 0, InvalidCostSnafu { cost });
    Ok(cost)
}

impl ItemFields {
    /// Validate these fields for creation: all are mandatory
    pub fn to_new_item(&self, admin_id: AdminId) -> Result<NewItem> {
        let category = category(self.category.context(MissingCategorySnafu)?)?;
        let barcode = non_blank(self.barcode.as_deref()).context(MissingBarcodeSnafu)?;
        let price = price(self.price.context(MissingPriceSnafu)?)?;
        let cost = cost(self.cost.context(MissingCostSnafu)?)?;
        let name = non_blank(self.name.as_deref()).context(MissingNameSnafu)?;
        let description =
            non_blank(self.description.as_deref()).context(MissingDescriptionSnafu)?;
        let expires = self.expires.context(MissingExpirySnafu)?;
        let size = size(self.size.context(MissingSizeSnafu)?)?;
        Ok(NewItem::new(
            admin_id,
            category,
            barcode,
            price,
            cost,
            name,
            description,
            expires,
            size,
        ))
    }
    /// Validate these fields for update: any subset may be present, but those that are must be
    /// valid (a mandatory string can't be blanked-out)
    pub fn to_diff(&self) -> Result<ItemDiff> {
        let mut diff = ItemDiff::default();
        if let Some(raw) = self.category {
            diff = diff.with_category(category(raw)?);
        }
        if let Some(barcode) = self.barcode.as_deref() {
            diff = diff.with_barcode(non_blank(Some(barcode)).context(MissingBarcodeSnafu)?);
        }
        if let Some(raw) = self.price {
            diff = diff.with_price(price(raw)?);
        }
        if let Some(raw) = self.cost {
            diff = diff.with_cost(cost(raw)?);
        }
        if let Some(name) = self.name.as_deref() {
            diff = diff.with_name(non_blank(Some(name)).context(MissingNameSnafu)?);
        }
        if let Some(description) = self.description.as_deref() {
            diff = diff
                .with_description(non_blank(Some(description)).context(MissingDescriptionSnafu)?);
        }
        if let Some(expires) = self.expires {
            diff = diff.with_expires(expires);
        }
        if let Some(raw) = self.size {
            diff = diff.with_size(size(raw)?);
        }
        Ok(diff)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            Catalog                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// One page of a keyset scan
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ItemsPage {
    pub items: Vec<Item>,
    /// Pass this as the cursor to get the next page; absent when this page came up short
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<ItemId>,
}

/// The Catalog Consistency & Search Engine
pub struct Catalog {
    admins: Arc<dyn AdminBackend + Send + Sync>,
    items: Arc<dyn ItemBackend + Send + Sync>,
    max_page_size: usize,
}

impl Catalog {
    pub fn new(
        admins: Arc<dyn AdminBackend + Send + Sync>,
        items: Arc<dyn ItemBackend + Send + Sync>,
    ) -> Catalog {
        Catalog {
            admins,
            items,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Catalog {
        self.max_page_size = max_page_size.max(1);
        self
    }
    /// Is `barcode` already in use anywhere in the catalog?
    pub async fn check_duplicate_barcode(&self, barcode: &str) -> Result<bool> {
        let barcode = non_blank(Some(barcode)).context(MissingBarcodeSnafu)?;
        Ok(self
            .items
            .item_for_barcode(barcode)
            .await
            .context(StorageSnafu)?
            .is_some())
    }
    pub async fn create_item(&self, admin_id: AdminId, fields: &ItemFields) -> Result<Item> {
        let new_item = fields.to_new_item(admin_id)?;
        self.ensure_admin(admin_id).await?;
        if self.check_duplicate_barcode(new_item.barcode()).await? {
            return DuplicateItemSnafu {
                barcode: new_item.barcode().to_owned(),
            }
            .fail();
        }
        match self.items.add_item(&new_item).await {
            Ok(item) => {
                info!("Admin {} created item {} ({})", admin_id, item.id, item.barcode);
                Ok(item)
            }
            Err(storage::Error::BarcodeClaimed { barcode, .. }) => {
                DuplicateItemSnafu { barcode }.fail()
            }
            Err(err) => Err(StorageSnafu.into_error(err)),
        }
    }
    pub async fn delete_item(&self, admin_id: AdminId, item_id: i64) -> Result<()> {
        let id = item_id_from(item_id)?;
        self.owned_item(admin_id, id).await?;
        match self.items.delete_item(id).await {
            Ok(()) => {
                info!("Admin {} deleted item {}", admin_id, id);
                Ok(())
            }
            Err(storage::Error::NoSuchItem { id, .. }) => NotExistItemSnafu { id }.fail(),
            Err(err) => Err(StorageSnafu.into_error(err)),
        }
    }
    /// List `admin_id`'s items, newest first
    ///
    /// A `cursor` greater than zero restricts the listing to items with ids strictly less than
    /// it. A `limit` that's not positive gets [DEFAULT_PAGE_SIZE]; one that's too large is clamped.
    pub async fn find_items(&self, admin_id: AdminId, cursor: i64, limit: i64) -> Result<ItemsPage> {
        self.ensure_admin(admin_id).await?;
        let cursor = (cursor > 0).then_some(ItemId::new(cursor));
        let limit = match usize::try_from(limit) {
            Ok(0) | Err(_) => DEFAULT_PAGE_SIZE,
            Ok(n) => n.min(self.max_page_size),
        };
        let items = self
            .items
            .items_page(admin_id, cursor, limit)
            .await
            .context(StorageSnafu)?;
        let next = if items.len() == limit {
            items.last().map(|item| item.id)
        } else {
            None
        };
        Ok(ItemsPage { items, next })
    }
    pub async fn get_item(&self, admin_id: AdminId, item_id: i64) -> Result<Item> {
        self.owned_item(admin_id, item_id_from(item_id)?).await
    }
    /// Find `admin_id`'s items whose name, or initial-consonant index, contains `text`
    pub async fn search_items(&self, admin_id: AdminId, text: Option<&str>) -> Result<Vec<Item>> {
        self.ensure_admin(admin_id).await?;
        let text = non_blank(text).context(MissingSearchTextSnafu)?;
        self.items
            .search_items(admin_id, text)
            .await
            .context(StorageSnafu)
    }
    /// Apply the supplied fields to an item, leaving the rest as they are
    pub async fn update_item(
        &self,
        admin_id: AdminId,
        item_id: i64,
        fields: &ItemFields,
    ) -> Result<Item> {
        let id = item_id_from(item_id)?;
        let diff = fields.to_diff()?;
        let current = self.owned_item(admin_id, id).await?;
        if let Some(barcode) = diff.barcode() {
            if let Some(holder) = self
                .items
                .item_for_barcode(barcode)
                .await
                .context(StorageSnafu)?
            {
                ensure!(
                    holder.id == id,
                    DuplicateItemSnafu {
                        barcode: barcode.to_owned()
                    }
                );
            }
        }
        if diff.is_empty() {
            return Ok(current);
        }
        match self.items.update_item(id, &diff).await {
            Ok(item) => {
                info!("Admin {} updated item {}", admin_id, id);
                Ok(item)
            }
            Err(storage::Error::NoSuchItem { id, .. }) => NotExistItemSnafu { id }.fail(),
            Err(storage::Error::BarcodeClaimed { barcode, .. }) => {
                DuplicateItemSnafu { barcode }.fail()
            }
            Err(err) => Err(StorageSnafu.into_error(err)),
        }
    }
    async fn ensure_admin(&self, admin_id: AdminId) -> Result<()> {
        ensure!(admin_id.raw() > 0, InvalidAdminSnafu { admin_id });
        self.admins
            .admin_for_id(admin_id)
            .await
            .context(StorageSnafu)?
            .context(InvalidAdminSnafu { admin_id })
            .map(|_| ())
    }
    /// Fetch an item, insisting that it belong to `admin_id`
    async fn owned_item(&self, admin_id: AdminId, id: ItemId) -> Result<Item> {
        self.items
            .item_for_id(id)
            .await
            .context(StorageSnafu)?
            .filter(|item| item.admin_id == admin_id)
            .context(NotExistItemSnafu { id })
    }
}

fn item_id_from(item_id: i64) -> Result<ItemId> {
    ensure!(item_id > 0, InvalidItemSnafu { id: item_id });
    Ok(ItemId::new(item_id))
}

#[cfg(test)]
mod test {
    use super::*;

    use async_trait::async_trait;
    use chrono::Duration;
    use secrecy::SecretString;

    use crate::{
        entities::{NewAdmin, Phone},
        memory,
    };

    fn fields() -> ItemFields {
        ItemFields {
            category: Some(0),
            barcode: Some("880012345".to_owned()),
            price: Some(4500),
            cost: Some(1500),
            name: Some(" 아메리카노 ".to_owned()),
            description: Some("hot or iced".to_owned()),
            expires: Some(Utc::now() + Duration::days(1)),
            size: Some(1),
        }
    }

    #[test]
    fn creation_rules() {
        let admin = AdminId::new(1);
        let item = fields().to_new_item(admin).unwrap();
        // The name is kept as given; only the index ignores the padding
        assert_eq!(" 아메리카노 ", item.name());
        assert_eq!("ㅇㅁㄹㅋㄴ", item.initials());
        assert_eq!(Size::Large, item.size());

        let mut f = fields();
        f.category = None;
        assert!(matches!(f.to_new_item(admin), Err(Error::MissingCategory { .. })));
        let mut f = fields();
        f.category = Some(3);
        assert!(matches!(f.to_new_item(admin), Err(Error::InvalidCategory { .. })));
        let mut f = fields();
        f.barcode = Some("   ".to_owned());
        assert!(matches!(f.to_new_item(admin), Err(Error::MissingBarcode { .. })));
        let mut f = fields();
        f.price = Some(-1);
        assert!(matches!(f.to_new_item(admin), Err(Error::InvalidPrice { .. })));
        let mut f = fields();
        f.cost = None;
        assert!(matches!(f.to_new_item(admin), Err(Error::MissingCost { .. })));
        let mut f = fields();
        f.description = None;
        assert!(matches!(f.to_new_item(admin), Err(Error::MissingDescription { .. })));
        let mut f = fields();
        f.expires = None;
        assert!(matches!(f.to_new_item(admin), Err(Error::MissingExpiry { .. })));
        let mut f = fields();
        f.size = Some(2);
        assert!(matches!(f.to_new_item(admin), Err(Error::InvalidSize { .. })));
        let mut f = fields();
        f.size = None;
        assert!(matches!(f.to_new_item(admin), Err(Error::MissingSize { .. })));
    }

    #[test]
    fn update_rules() {
        assert!(ItemFields::default().to_diff().unwrap().is_empty());
        let diff = ItemFields {
            name: Some("카페라떼".to_owned()),
            ..Default::default()
        }
        .to_diff()
        .unwrap();
        assert_eq!(Some(("카페라떼", "ㅋㅍㄹㄸ")), diff.name());
        assert_eq!(None, diff.price());
        assert!(matches!(
            ItemFields {
                name: Some(String::new()),
                ..Default::default()
            }
            .to_diff(),
            Err(Error::MissingName { .. })
        ));
        assert!(matches!(
            ItemFields {
                size: Some(9),
                ..Default::default()
            }
            .to_diff(),
            Err(Error::InvalidSize { .. })
        ));
    }

    /// An item store whose barcode lookups always come up empty, as though another writer claimed
    /// the barcode between our check & our write
    struct LateClaims(memory::Store);

    #[async_trait]
    impl ItemBackend for LateClaims {
        async fn add_item(&self, item: &NewItem) -> storage::Result<Item> {
            self.0.add_item(item).await
        }
        async fn delete_item(&self, id: ItemId) -> storage::Result<()> {
            self.0.delete_item(id).await
        }
        async fn item_for_barcode(&self, _barcode: &str) -> storage::Result<Option<Item>> {
            Ok(None)
        }
        async fn item_for_id(&self, id: ItemId) -> storage::Result<Option<Item>> {
            self.0.item_for_id(id).await
        }
        async fn items_page(
            &self,
            admin_id: AdminId,
            cursor: Option<ItemId>,
            limit: usize,
        ) -> storage::Result<Vec<Item>> {
            self.0.items_page(admin_id, cursor, limit).await
        }
        async fn search_items(&self, admin_id: AdminId, text: &str) -> storage::Result<Vec<Item>> {
            self.0.search_items(admin_id, text).await
        }
        async fn update_item(&self, id: ItemId, diff: &ItemDiff) -> storage::Result<Item> {
            self.0.update_item(id, diff).await
        }
    }

    #[tokio::test]
    async fn store_conflicts_are_duplicates() {
        let admins = Arc::new(memory::Store::new());
        let admin = admins
            .add_admin(
                &NewAdmin::new(
                    &Phone::new("010-1234-5678").unwrap(),
                    &SecretString::from("abc12345".to_owned()),
                    "Kim",
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let catalog = Catalog::new(admins, Arc::new(LateClaims(memory::Store::new())));

        let mut f = fields();
        f.name = Some("카페라떼".to_owned());
        let latte = catalog.create_item(admin.id(), &f).await.unwrap();
        assert!(matches!(
            catalog.create_item(admin.id(), &fields()).await,
            Err(Error::DuplicateItem { .. })
        ));

        f.barcode = Some("880012346".to_owned());
        let mocha = catalog.create_item(admin.id(), &f).await.unwrap();
        assert!(matches!(
            catalog
                .update_item(
                    admin.id(),
                    mocha.id.raw(),
                    &ItemFields {
                        barcode: Some(latte.barcode.clone()),
                        ..Default::default()
                    }
                )
                .await,
            Err(Error::DuplicateItem { .. })
        ));
    }
}
