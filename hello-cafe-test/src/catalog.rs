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

//! Integration tests for the catalog.
//!
//! Backend-agnostic test logic for item creation, update, deletion, pagination & search.

use std::{collections::HashSet, sync::Arc};

use hello_cafe::{
    catalog::{Error, ItemFields},
    entities::{AdminId, Category, ItemId, Size},
    http::Cafe,
};
use libtest_mimic::Failed;

use crate::{item_fields, signed_in};

pub async fn test_create_and_get(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, _) = signed_in(&cafe, "010-1000-0001").await?;
    let item = cafe
        .catalog
        .create_item(admin.id(), &item_fields("880000000001", "아메리카노"))
        .await?;
    assert_eq!(admin.id(), item.admin_id);
    assert_eq!(Category::Beverage, item.category);
    assert_eq!(Size::Small, item.size);
    assert_eq!("ㅇㅁㄹㅋㄴ", item.initials);
    assert_eq!(item.created, item.modified);

    let fetched = cafe.catalog.get_item(admin.id(), item.id.raw()).await?;
    assert_eq!(item, fetched);

    assert!(matches!(
        cafe.catalog.get_item(admin.id(), 0).await,
        Err(Error::InvalidItem { .. })
    ));
    assert!(matches!(
        cafe.catalog.get_item(admin.id(), item.id.raw() + 100).await,
        Err(Error::NotExistItem { .. })
    ));
    Ok(())
}

/// Every field is mandatory on creation, and the enumerated & numeric ones are range-checked
pub async fn test_create_validation(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, _) = signed_in(&cafe, "010-1000-0002").await?;

    let missing_name = ItemFields {
        name: None,
        ..item_fields("880000000002", "라떼")
    };
    assert!(matches!(
        cafe.catalog.create_item(admin.id(), &missing_name).await,
        Err(Error::MissingName { .. })
    ));
    let blank_barcode = ItemFields {
        barcode: Some("   ".to_owned()),
        ..item_fields("880000000002", "라떼")
    };
    assert!(matches!(
        cafe.catalog.create_item(admin.id(), &blank_barcode).await,
        Err(Error::MissingBarcode { .. })
    ));
    let bad_category = ItemFields {
        category: Some(3),
        ..item_fields("880000000002", "라떼")
    };
    assert!(matches!(
        cafe.catalog.create_item(admin.id(), &bad_category).await,
        Err(Error::InvalidCategory { .. })
    ));
    let bad_size = ItemFields {
        size: Some(2),
        ..item_fields("880000000002", "라떼")
    };
    assert!(matches!(
        cafe.catalog.create_item(admin.id(), &bad_size).await,
        Err(Error::InvalidSize { .. })
    ));
    let bad_price = ItemFields {
        price: Some(-1),
        ..item_fields("880000000002", "라떼")
    };
    assert!(matches!(
        cafe.catalog.create_item(admin.id(), &bad_price).await,
        Err(Error::InvalidPrice { .. })
    ));

    assert!(matches!(
        cafe.catalog
            .create_item(AdminId::new(424242), &item_fields("880000000002", "라떼"))
            .await,
        Err(Error::InvalidAdmin { .. })
    ));

    // Nothing was written
    assert!(!cafe.catalog.check_duplicate_barcode("880000000002").await?);
    Ok(())
}

/// Barcodes are unique across the entire catalog, not just one admin's items
pub async fn test_duplicate_barcode(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (a, _) = signed_in(&cafe, "010-1000-0003").await?;
    let (b, _) = signed_in(&cafe, "010-1000-0004").await?;

    assert!(!cafe.catalog.check_duplicate_barcode("880012345").await?);
    cafe.catalog
        .create_item(a.id(), &item_fields("880012345", "카페라떼"))
        .await?;
    assert!(cafe.catalog.check_duplicate_barcode("880012345").await?);

    let err = match cafe
        .catalog
        .create_item(b.id(), &item_fields("880012345", "카페모카"))
        .await
    {
        Err(err) => err,
        Ok(_) => return Err("created an item with a duplicate barcode".into()),
    };
    assert!(matches!(err, Error::DuplicateItem { .. }));
    assert_eq!("duplicate-item", err.code());

    let page = cafe.catalog.find_items(b.id(), 0, 0).await?;
    assert!(page.items.is_empty());

    assert!(matches!(
        cafe.catalog.check_duplicate_barcode("").await,
        Err(Error::MissingBarcode { .. })
    ));
    Ok(())
}

pub async fn test_partial_update(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, _) = signed_in(&cafe, "010-1000-0005").await?;
    let item = cafe
        .catalog
        .create_item(admin.id(), &item_fields("880000000005", "아메리카노"))
        .await?;

    let updated = cafe
        .catalog
        .update_item(
            admin.id(),
            item.id.raw(),
            &ItemFields {
                name: Some("카페라떼".to_owned()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!("카페라떼", updated.name);
    assert_eq!("ㅋㅍㄹㄸ", updated.initials);
    assert_eq!(item.barcode, updated.barcode);
    assert_eq!(item.price, updated.price);
    assert_eq!(item.cost, updated.cost);
    assert_eq!(item.description, updated.description);
    assert_eq!(item.expires, updated.expires);
    assert_eq!(item.size, updated.size);
    assert_eq!(item.category, updated.category);
    assert_eq!(item.created, updated.created);
    assert!(updated.modified >= item.modified);
    assert_eq!(
        updated,
        cafe.catalog.get_item(admin.id(), item.id.raw()).await?
    );

    // Keeping one's own barcode is fine
    let updated = cafe
        .catalog
        .update_item(
            admin.id(),
            item.id.raw(),
            &ItemFields {
                barcode: Some("880000000005".to_owned()),
                price: Some(5000),
                size: Some(1),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(5000, updated.price);
    assert_eq!(Size::Large, updated.size);

    // An empty update changes nothing
    assert_eq!(
        updated,
        cafe.catalog
            .update_item(admin.id(), item.id.raw(), &ItemFields::default())
            .await?
    );

    assert!(matches!(
        cafe.catalog
            .update_item(
                admin.id(),
                item.id.raw(),
                &ItemFields {
                    name: Some(" ".to_owned()),
                    ..Default::default()
                },
            )
            .await,
        Err(Error::MissingName { .. })
    ));
    assert!(matches!(
        cafe.catalog
            .update_item(
                admin.id(),
                item.id.raw(),
                &ItemFields {
                    cost: Some(-5),
                    ..Default::default()
                },
            )
            .await,
        Err(Error::InvalidCost { .. })
    ));
    Ok(())
}

pub async fn test_update_barcode_conflict(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, _) = signed_in(&cafe, "010-1000-0006").await?;
    cafe.catalog
        .create_item(admin.id(), &item_fields("880000000061", "바닐라라떼"))
        .await?;
    let second = cafe
        .catalog
        .create_item(admin.id(), &item_fields("880000000062", "녹차라떼"))
        .await?;

    assert!(matches!(
        cafe.catalog
            .update_item(
                admin.id(),
                second.id.raw(),
                &ItemFields {
                    barcode: Some("880000000061".to_owned()),
                    ..Default::default()
                },
            )
            .await,
        Err(Error::DuplicateItem { .. })
    ));
    assert_eq!(
        "880000000062",
        cafe.catalog
            .get_item(admin.id(), second.id.raw())
            .await?
            .barcode
    );
    Ok(())
}

/// Another admin's items are indistinguishable from items that don't exist
pub async fn test_foreign_items(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (a, _) = signed_in(&cafe, "010-1000-0007").await?;
    let (b, _) = signed_in(&cafe, "010-1000-0008").await?;
    let item = cafe
        .catalog
        .create_item(a.id(), &item_fields("880000000007", "에스프레소"))
        .await?;

    assert!(matches!(
        cafe.catalog.get_item(b.id(), item.id.raw()).await,
        Err(Error::NotExistItem { .. })
    ));
    assert!(matches!(
        cafe.catalog
            .update_item(
                b.id(),
                item.id.raw(),
                &ItemFields {
                    price: Some(1),
                    ..Default::default()
                },
            )
            .await,
        Err(Error::NotExistItem { .. })
    ));
    assert!(matches!(
        cafe.catalog.delete_item(b.id(), item.id.raw()).await,
        Err(Error::NotExistItem { .. })
    ));
    assert!(cafe
        .catalog
        .search_items(b.id(), Some("에스"))
        .await?
        .is_empty());

    // and A's item is untouched
    assert_eq!(item, cafe.catalog.get_item(a.id(), item.id.raw()).await?);
    Ok(())
}

pub async fn test_delete(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, _) = signed_in(&cafe, "010-1000-0009").await?;
    let item = cafe
        .catalog
        .create_item(admin.id(), &item_fields("880000000009", "카푸치노"))
        .await?;

    cafe.catalog.delete_item(admin.id(), item.id.raw()).await?;
    assert!(matches!(
        cafe.catalog.get_item(admin.id(), item.id.raw()).await,
        Err(Error::NotExistItem { .. })
    ));
    assert!(matches!(
        cafe.catalog.delete_item(admin.id(), item.id.raw()).await,
        Err(Error::NotExistItem { .. })
    ));
    // The barcode is free once more
    assert!(!cafe.catalog.check_duplicate_barcode("880000000009").await?);
    cafe.catalog
        .create_item(admin.id(), &item_fields("880000000009", "카푸치노"))
        .await?;
    Ok(())
}

/// Walk two pages, inserting an item between them; the second page should pick up exactly where
/// the first left off
pub async fn test_keyset_pages(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, _) = signed_in(&cafe, "010-1000-0010").await?;
    let (other, _) = signed_in(&cafe, "010-1000-0011").await?;
    let mut created = Vec::new();
    for i in 0..15 {
        created.push(
            cafe.catalog
                .create_item(
                    admin.id(),
                    &item_fields(&format!("8801000{:05}", i), &format!("item {}", i)),
                )
                .await?
                .id,
        );
        // Interleave another admin's items; they must never show up
        cafe.catalog
            .create_item(
                other.id(),
                &item_fields(&format!("8802000{:05}", i), &format!("other {}", i)),
            )
            .await?;
    }

    let first = cafe.catalog.find_items(admin.id(), 0, 10).await?;
    assert_eq!(10, first.items.len());
    let ids: Vec<ItemId> = first.items.iter().map(|item| item.id).collect();
    let mut expected: Vec<ItemId> = created.iter().rev().cloned().collect();
    assert_eq!(&expected[..10], &ids[..]);
    let next = first.next.ok_or("expected a cursor after a full page")?;
    assert_eq!(ids[9], next);

    let newcomer = cafe
        .catalog
        .create_item(admin.id(), &item_fields("880300000000", "newcomer"))
        .await?;

    let second = cafe.catalog.find_items(admin.id(), next.raw(), 10).await?;
    let ids: Vec<ItemId> = second.items.iter().map(|item| item.id).collect();
    assert_eq!(&expected[10..], &ids[..]);
    assert!(second.next.is_none());
    assert!(!ids.contains(&newcomer.id));
    assert!(second.items.iter().all(|item| item.admin_id == admin.id()));

    // Starting over picks up the newcomer first
    let restart = cafe.catalog.find_items(admin.id(), 0, 10).await?;
    assert_eq!(newcomer.id, restart.items[0].id);

    // No duplicates, no gaps
    let seen: HashSet<ItemId> = first
        .items
        .iter()
        .chain(second.items.iter())
        .map(|item| item.id)
        .collect();
    assert_eq!(15, seen.len());
    expected.sort();
    let mut seen: Vec<ItemId> = seen.into_iter().collect();
    seen.sort();
    assert_eq!(expected, seen);
    Ok(())
}

pub async fn test_page_limits(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, _) = signed_in(&cafe, "010-1000-0012").await?;
    for i in 0..12 {
        cafe.catalog
            .create_item(
                admin.id(),
                &item_fields(&format!("8804000{:05}", i), &format!("item {}", i)),
            )
            .await?;
    }
    // Non-positive limits get the default page size
    assert_eq!(10, cafe.catalog.find_items(admin.id(), 0, 0).await?.items.len());
    assert_eq!(10, cafe.catalog.find_items(admin.id(), -3, -5).await?.items.len());
    let all = cafe.catalog.find_items(admin.id(), 0, 1000).await?;
    assert_eq!(12, all.items.len());
    assert!(all.next.is_none());
    assert!(all.items.windows(2).all(|w| w[0].id > w[1].id));
    Ok(())
}

pub async fn test_search(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, _) = signed_in(&cafe, "010-1000-0013").await?;
    let americano = cafe
        .catalog
        .create_item(admin.id(), &item_fields("880500000001", "아메리카노"))
        .await?;
    let latte = cafe
        .catalog
        .create_item(admin.id(), &item_fields("880500000002", "카페라떼"))
        .await?;
    let tea = cafe
        .catalog
        .create_item(admin.id(), &item_fields("880500000003", "Green Tea"))
        .await?;
    let iced = cafe
        .catalog
        .create_item(admin.id(), &item_fields("880500000004", "아이스 아메리카노"))
        .await?;

    let ids = |items: Vec<hello_cafe::entities::Item>| -> Vec<ItemId> {
        items.into_iter().map(|item| item.id).collect()
    };

    // By initials; newest first
    assert_eq!(
        vec![iced.id, americano.id],
        ids(cafe.catalog.search_items(admin.id(), Some("ㅇㅁㄹ")).await?)
    );
    assert_eq!(
        vec![americano.id],
        ids(cafe.catalog.search_items(admin.id(), Some("아메리카노")).await?)
            .into_iter()
            .filter(|id| *id != iced.id)
            .collect::<Vec<ItemId>>()
    );
    assert_eq!(
        vec![latte.id],
        ids(cafe.catalog.search_items(admin.id(), Some("ㅋㅍ")).await?)
    );
    // By name
    assert_eq!(
        vec![latte.id],
        ids(cafe.catalog.search_items(admin.id(), Some("라떼")).await?)
    );
    assert_eq!(
        vec![tea.id],
        ids(cafe.catalog.search_items(admin.id(), Some(" Tea")).await?)
    );
    // Search text is matched as given, surrounding whitespace included
    assert!(cafe
        .catalog
        .search_items(admin.id(), Some("Tea "))
        .await?
        .is_empty());
    assert!(cafe
        .catalog
        .search_items(admin.id(), Some("모카"))
        .await?
        .is_empty());

    assert!(matches!(
        cafe.catalog.search_items(admin.id(), Some("  ")).await,
        Err(Error::MissingSearchText { .. })
    ));
    assert!(matches!(
        cafe.catalog.search_items(admin.id(), None).await,
        Err(Error::MissingSearchText { .. })
    ));
    Ok(())
}

/// Page through five items two at a time, inserting an item between the first two calls
pub async fn test_small_pages(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (admin, _) = signed_in(&cafe, "010-1000-0014").await?;
    let mut created = Vec::new();
    for i in 0..5 {
        created.push(
            cafe.catalog
                .create_item(
                    admin.id(),
                    &item_fields(&format!("8806000{:05}", i), &format!("item {}", i)),
                )
                .await?
                .id,
        );
    }

    let mut seen: Vec<ItemId> = Vec::new();
    let mut cursor = 0;
    let mut inserted = None;
    loop {
        let page = cafe.catalog.find_items(admin.id(), cursor, 2).await?;
        assert!(page.items.len() <= 2);
        seen.extend(page.items.iter().map(|item| item.id));
        if inserted.is_none() {
            inserted = Some(
                cafe.catalog
                    .create_item(admin.id(), &item_fields("880700000000", "late arrival"))
                    .await?
                    .id,
            );
        }
        match page.next {
            Some(next) => cursor = next.raw(),
            None => break,
        }
    }

    // Strictly decreasing, so no duplicates...
    assert!(seen.windows(2).all(|w| w[0] > w[1]));
    // ...and every item that existed when we started, and nothing else
    created.reverse();
    assert_eq!(created, seen);
    assert!(inserted.is_some_and(|id| !seen.contains(&id)));
    Ok(())
}

/// Two admins racing to claim one barcode: exactly one wins
pub async fn test_concurrent_barcode_claims(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let (a, _) = signed_in(&cafe, "010-1000-0015").await?;
    let (b, _) = signed_in(&cafe, "010-1000-0016").await?;
    let first = item_fields("880800000001", "카페라떼");
    let second = item_fields("880800000001", "카페모카");
    let (first, second) = futures::join!(
        cafe.catalog.create_item(a.id(), &first),
        cafe.catalog.create_item(b.id(), &second),
    );
    let (winner, loser) = match (first, second) {
        (Ok(item), Err(err)) | (Err(err), Ok(item)) => (item, err),
        (Ok(_), Ok(_)) => return Err("both creations succeeded".into()),
        (Err(e1), Err(e2)) => {
            return Err(format!("both creations failed: {}; {}", e1, e2).into())
        }
    };
    assert!(matches!(loser, Error::DuplicateItem { .. }));
    assert_eq!(
        Some(winner.id),
        cafe.catalog
            .find_items(winner.admin_id, 0, 10)
            .await?
            .items
            .first()
            .map(|item| item.id)
    );
    Ok(())
}
