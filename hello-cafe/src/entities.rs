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

//! # hello-cafe entities
//!
//! The core nouns of hello-cafe: admins, their revoked tokens, and the items they sell. Where a
//! value carries a format constraint (phone numbers, password hashes, category & size codes) it's
//! modeled as a refined type that can only be constructed in a valid state, so that the rest of the
//! crate never has to re-check.

use std::{fmt::Display, ops::Deref, str::FromStr};

use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use password_hash::{rand_core::OsRng, PasswordHashString, SaltString};
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use snafu::{prelude::*, Backtrace, IntoError};
use tap::pipe::Pipe;

use crate::hangul;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{value} is not a valid category code"))]
    BadCategory { value: i64, backtrace: Backtrace },
    #[snafu(display("Incorrect password"))]
    BadPassword { backtrace: Backtrace },
    #[snafu(display("{text} is not a valid phone number"))]
    BadPhone { text: String, backtrace: Backtrace },
    #[snafu(display("{value} is not a valid size code"))]
    BadSize { value: i64, backtrace: Backtrace },
    #[snafu(display("Failed to check the password for {phone}: {source}"))]
    CheckPassword {
        phone: Phone,
        source: password_hash::errors::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to hash password: {source}"))]
    HashPassword {
        source: password_hash::errors::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to parse a password hash string: {source}"))]
    HashString {
        source: password_hash::errors::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Passwords must be at least eight ASCII letters and digits"))]
    PasswordFormat { backtrace: Backtrace },
}

type Result<T> = std::result::Result<T, Error>;

type StdResult<T, E> = std::result::Result<T, E>;

fn mk_serde_de_err<'de, D: serde::Deserializer<'de>>(err: impl std::error::Error) -> D::Error {
    <D::Error as serde::de::Error>::custom(format!("{}", err))
}

fn mk_sql_err(err: Error) -> FromSqlError {
    FromSqlError::Other(Box::new(err))
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          Identifiers                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Declare an opaque, store-assigned numeric identifier
///
/// Both of our stores hand out monotonically increasing integer keys (SQLite's `INTEGER PRIMARY
/// KEY`, a counter in the in-memory store), and keyset pagination leans on that ordering, so unlike
/// a UUID these identifiers are ordered. The macro gives each entity its own type so that an admin
/// id can't be passed where an item id is expected.
macro_rules! define_id {
    ($type_name:ident) => {
        #[derive(
            Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
        )]
        #[serde(transparent)]
        pub struct $type_name(i64);
        impl $type_name {
            pub fn new(id: i64) -> $type_name {
                $type_name(id)
            }
            pub fn raw(&self) -> i64 {
                self.0
            }
        }
        impl Display for $type_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl FromStr for $type_name {
            type Err = std::num::ParseIntError;
            fn from_str(s: &str) -> StdResult<Self, Self::Err> {
                Ok($type_name(s.parse::<i64>()?))
            }
        }
        impl From<$type_name> for i64 {
            fn from(value: $type_name) -> Self {
                value.0
            }
        }
        impl ToSql for $type_name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }
        impl FromSql for $type_name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map($type_name)
            }
        }
    };
}

define_id!(AdminId);
define_id!(ItemId);

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                             Phone                                              //
////////////////////////////////////////////////////////////////////////////////////////////////////

lazy_static! {
    static ref PHONE: Regex = Regex::new("^01[016789]-[0-9]{3,4}-[0-9]{4}$").unwrap(/* known good */);
}

/// A refined type representing an admin's phone number; the admin's business key
///
/// Phone numbers are Korean mobile numbers in dashed form: "01X-NNN(N)-NNNN", where X is one of 0,
/// 1, 6, 7, 8 or 9.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    pub fn new(text: &str) -> Result<Phone> {
        PHONE
            .is_match(text)
            .then_some(Phone(text.to_owned()))
            .ok_or(
                BadPhoneSnafu {
                    text: text.to_owned(),
                }
                .build(),
            )
    }
}

impl AsRef<str> for Phone {
    fn as_ref(&self) -> &str {
        self.deref()
    }
}

impl Deref for Phone {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Phone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Phone {
    type Err = Error;

    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        Phone::new(s)
    }
}

impl TryFrom<String> for Phone {
    type Error = Error;

    fn try_from(text: String) -> StdResult<Self, Self::Error> {
        if PHONE.is_match(&text) {
            Ok(Phone(text))
        } else {
            BadPhoneSnafu { text }.fail()
        }
    }
}

// Implement `Deserialize` by hand to fail if the serialized value isn't a legit `Phone`
impl<'de> Deserialize<'de> for Phone {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Phone::try_from(s).map_err(mk_serde_de_err::<'de, D>)
    }
}

impl ToSql for Phone {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for Phone {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Phone::try_from(String::column_result(value)?).map_err(mk_sql_err)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                           Passwords                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

lazy_static! {
    static ref PASSWORD: Regex = Regex::new("^[a-zA-Z0-9]{8,}$").unwrap(/* known good */);
}

/// Apply password format rules
///
/// Passwords must be at least eight characters long & consist solely of ASCII letters & digits.
/// This is only applied at sign-up; sign-in just checks the hash.
pub fn validate_password(password: &SecretString) -> Result<()> {
    PASSWORD
        .is_match(password.expose_secret())
        .then_some(())
        .context(PasswordFormatSnafu)
}

/// Newtype idiom to work around Rust's orphaned trait rule
///
/// The hash is kept as a [PasswordHashString] (i.e. the PHC string format) which carries the
/// algorithm, version, parameters & salt along with the hash itself.
#[derive(Clone, Debug, PartialEq)]
pub struct AdminHashString(PasswordHashString);

impl AdminHashString {
    pub fn password_hash(&self) -> PasswordHash<'_> {
        self.0.password_hash()
    }
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for AdminHashString {
    type Error = Error;

    fn try_from(s: String) -> StdResult<Self, Self::Error> {
        Ok(AdminHashString(
            PasswordHashString::new(&s).context(HashStringSnafu)?,
        ))
    }
}

impl ToSql for AdminHashString {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for AdminHashString {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value)?
            .pipe(AdminHashString::try_from)
            .map_err(mk_sql_err)
    }
}

/// Create the hello-cafe password hasher
///
/// Argon2id with the crate's default version & parameters (m=19456 (19 MiB), t=2, p=1). Per the
/// OWASP Password Storage [Cheat Sheet], that's one of the recommended configurations.
///
/// [Cheat Sheet]: https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html#password-hashing-algorithms
fn create_password_hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::default(), Params::default())
}

/// Salt & hash a password
pub fn hash_password(password: &SecretString) -> Result<AdminHashString> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(AdminHashString(
        create_password_hasher()
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .context(HashPasswordSnafu)?
            .serialize(),
    ))
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                             Admin                                              //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An admin who has not yet been written to a store (and so has no id)
#[derive(Clone, Debug)]
pub struct NewAdmin {
    phone: Phone,
    password_hash: AdminHashString,
    name: String,
}

impl NewAdmin {
    /// Validate `password`, then salt & hash it
    ///
    /// This constructor does *not* check the phone number for uniqueness; that's the store's job.
    pub fn new(phone: &Phone, password: &SecretString, name: &str) -> Result<NewAdmin> {
        validate_password(password)?;
        Ok(NewAdmin {
            phone: phone.clone(),
            password_hash: hash_password(password)?,
            name: name.trim().to_owned(),
        })
    }
    pub fn phone(&self) -> &Phone {
        &self.phone
    }
    pub fn password_hash(&self) -> &AdminHashString {
        &self.password_hash
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Attach a store-assigned identity
    pub fn into_admin(self, id: AdminId, created: DateTime<Utc>) -> Admin {
        Admin {
            id,
            phone: self.phone,
            password_hash: self.password_hash,
            name: self.name,
            created,
            modified: created,
        }
    }
}

/// A hello-cafe administrator
#[derive(Clone, Debug)]
pub struct Admin {
    id: AdminId,
    phone: Phone,
    password_hash: AdminHashString,
    name: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl Admin {
    /// Reassemble an [Admin] read back from a store
    pub fn from_parts(
        id: AdminId,
        phone: Phone,
        password_hash: AdminHashString,
        name: String,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Admin {
        Admin {
            id,
            phone,
            password_hash,
            name,
            created,
            modified,
        }
    }
    /// Check a password against this admin's stored hash
    ///
    /// An incorrect password is reported as [Error::BadPassword]; any other failure (a corrupt hash,
    /// say) is reported separately so the caller can tell the two apart.
    pub fn check_password(&self, password: &SecretString) -> Result<()> {
        match create_password_hasher().verify_password(
            password.expose_secret().as_bytes(),
            &self.password_hash.password_hash(),
        ) {
            Ok(_) => Ok(()),
            Err(password_hash::errors::Error::Password) => BadPasswordSnafu.fail(),
            Err(err) => Err(CheckPasswordSnafu {
                phone: self.phone.clone(),
            }
            .into_error(err)),
        }
    }
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }
    pub fn id(&self) -> AdminId {
        self.id
    }
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn password_hash(&self) -> &AdminHashString {
        &self.password_hash
    }
    pub fn phone(&self) -> &Phone {
        &self.phone
    }
}

/// An entry in the revocation ledger: `token` was explicitly logged-out by `admin_id`
#[derive(Clone, Debug, PartialEq)]
pub struct RevokedToken {
    pub admin_id: AdminId,
    pub token: String,
    pub created: DateTime<Utc>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       Category & Size                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Item categories
///
/// On the wire & in the database these are the integer codes 0 & 1.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Category {
    Beverage,
    Food,
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Beverage => write!(f, "beverage"),
            Category::Food => write!(f, "food"),
        }
    }
}

impl TryFrom<i64> for Category {
    type Error = Error;

    fn try_from(value: i64) -> StdResult<Self, Self::Error> {
        match value {
            0 => Ok(Category::Beverage),
            1 => Ok(Category::Food),
            _ => BadCategorySnafu { value }.fail(),
        }
    }
}

impl From<Category> for i64 {
    fn from(value: Category) -> Self {
        match value {
            Category::Beverage => 0,
            Category::Food => 1,
        }
    }
}

/// Item sizes; integer codes 0 & 1
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Size {
    Small,
    Large,
}

impl Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Size::Small => write!(f, "small"),
            Size::Large => write!(f, "large"),
        }
    }
}

impl TryFrom<i64> for Size {
    type Error = Error;

    fn try_from(value: i64) -> StdResult<Self, Self::Error> {
        match value {
            0 => Ok(Size::Small),
            1 => Ok(Size::Large),
            _ => BadSizeSnafu { value }.fail(),
        }
    }
}

impl From<Size> for i64 {
    fn from(value: Size) -> Self {
        match value {
            Size::Small => 0,
            Size::Large => 1,
        }
    }
}

macro_rules! sql_code {
    ($type_name:ident) => {
        impl ToSql for $type_name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(i64::from(*self)))
            }
        }
        impl FromSql for $type_name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                $type_name::try_from(i64::column_result(value)?).map_err(mk_sql_err)
            }
        }
    };
}

sql_code!(Category);
sql_code!(Size);

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                              Item                                              //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A validated item that has not yet been written to a store
///
/// The initial-consonant index is derived from the name here, and nowhere else.
#[derive(Clone, Debug, PartialEq)]
pub struct NewItem {
    admin_id: AdminId,
    category: Category,
    barcode: String,
    price: i64,
    cost: i64,
    name: String,
    initials: String,
    description: String,
    expires: DateTime<Utc>,
    size: Size,
}

impl NewItem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        admin_id: AdminId,
        category: Category,
        barcode: &str,
        price: i64,
        cost: i64,
        name: &str,
        description: &str,
        expires: DateTime<Utc>,
        size: Size,
    ) -> NewItem {
        NewItem {
            admin_id,
            category,
            barcode: barcode.to_owned(),
            price,
            cost,
            name: name.to_owned(),
            initials: hangul::initials(name),
            description: description.to_owned(),
            expires,
            size,
        }
    }
    pub fn admin_id(&self) -> AdminId {
        self.admin_id
    }
    pub fn barcode(&self) -> &str {
        &self.barcode
    }
    pub fn category(&self) -> Category {
        self.category
    }
    pub fn cost(&self) -> i64 {
        self.cost
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }
    pub fn initials(&self) -> &str {
        &self.initials
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn price(&self) -> i64 {
        self.price
    }
    pub fn size(&self) -> Size {
        self.size
    }
    /// Attach a store-assigned identity; both timestamps are set to `now`
    pub fn into_item(self, id: ItemId, now: DateTime<Utc>) -> Item {
        Item {
            id,
            admin_id: self.admin_id,
            category: self.category,
            barcode: self.barcode,
            price: self.price,
            cost: self.cost,
            name: self.name,
            initials: self.initials,
            description: self.description,
            expires: self.expires,
            size: self.size,
            created: now,
            modified: now,
        }
    }
}

/// A catalog item
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(rename = "admin-id")]
    pub admin_id: AdminId,
    pub category: Category,
    pub barcode: String,
    pub price: i64,
    pub cost: i64,
    pub name: String,
    pub initials: String,
    pub description: String,
    pub expires: DateTime<Utc>,
    pub size: Size,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Item {
    /// Apply `diff` to this item in-place, bumping the modification time to `now`
    pub fn apply(&mut self, diff: &ItemDiff, now: DateTime<Utc>) {
        if let Some(category) = diff.category {
            self.category = category;
        }
        if let Some(barcode) = &diff.barcode {
            self.barcode = barcode.clone();
        }
        if let Some(price) = diff.price {
            self.price = price;
        }
        if let Some(cost) = diff.cost {
            self.cost = cost;
        }
        if let Some((name, initials)) = &diff.name {
            self.name = name.clone();
            self.initials = initials.clone();
        }
        if let Some(description) = &diff.description {
            self.description = description.clone();
        }
        if let Some(expires) = diff.expires {
            self.expires = expires;
        }
        if let Some(size) = diff.size {
            self.size = size;
        }
        self.modified = now;
    }
}

/// A validated, partial update to an [Item]
///
/// Only the fields that are set will be written. Setting the name always sets the
/// initial-consonant index along with it; the index can't be set on its own.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemDiff {
    category: Option<Category>,
    barcode: Option<String>,
    price: Option<i64>,
    cost: Option<i64>,
    name: Option<(String, String)>,
    description: Option<String>,
    expires: Option<DateTime<Utc>>,
    size: Option<Size>,
}

impl ItemDiff {
    pub fn with_category(mut self, category: Category) -> ItemDiff {
        self.category = Some(category);
        self
    }
    pub fn with_barcode(mut self, barcode: &str) -> ItemDiff {
        self.barcode = Some(barcode.to_owned());
        self
    }
    pub fn with_price(mut self, price: i64) -> ItemDiff {
        self.price = Some(price);
        self
    }
    pub fn with_cost(mut self, cost: i64) -> ItemDiff {
        self.cost = Some(cost);
        self
    }
    pub fn with_name(mut self, name: &str) -> ItemDiff {
        self.name = Some((name.to_owned(), hangul::initials(name)));
        self
    }
    pub fn with_description(mut self, description: &str) -> ItemDiff {
        self.description = Some(description.to_owned());
        self
    }
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> ItemDiff {
        self.expires = Some(expires);
        self
    }
    pub fn with_size(mut self, size: Size) -> ItemDiff {
        self.size = Some(size);
        self
    }
    pub fn barcode(&self) -> Option<&str> {
        self.barcode.as_deref()
    }
    pub fn category(&self) -> Option<Category> {
        self.category
    }
    pub fn cost(&self) -> Option<i64> {
        self.cost
    }
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }
    /// The new name & its initial-consonant index
    pub fn name(&self) -> Option<(&str, &str)> {
        self.name
            .as_ref()
            .map(|(name, initials)| (name.as_str(), initials.as_str()))
    }
    pub fn price(&self) -> Option<i64> {
        self.price
    }
    pub fn size(&self) -> Option<Size> {
        self.size
    }
    pub fn is_empty(&self) -> bool {
        *self == ItemDiff::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[test]
    fn phones() {
        assert!(Phone::new("010-1234-5678").is_ok());
        assert!(Phone::new("011-123-4567").is_ok());
        assert!(Phone::new("019-9999-0000").is_ok());
        assert!(Phone::new("012-1234-5678").is_err());
        assert!(Phone::new("010-12-5678").is_err());
        assert!(Phone::new("01012345678").is_err());
        assert!(Phone::new("010-1234-5678 ").is_err());
        assert!(Phone::new("").is_err());

        let phone: Phone = serde_json::from_str("\"010-1234-5678\"").unwrap();
        assert_eq!("010-1234-5678", phone.as_ref());
        assert!(serde_json::from_str::<Phone>("\"call me\"").is_err());
    }

    #[test]
    fn password_format() {
        assert!(validate_password(&secret("abc12345")).is_ok());
        assert!(validate_password(&secret("ABCdef0123456789")).is_ok());
        assert!(validate_password(&secret("abc1234")).is_err());
        assert!(validate_password(&secret("abc 12345")).is_err());
        assert!(validate_password(&secret("abc12345!")).is_err());
    }

    #[test]
    fn passwords() {
        let phone = Phone::new("010-1234-5678").unwrap();
        let admin = NewAdmin::new(&phone, &secret("abc12345"), " Jane ")
            .unwrap()
            .into_admin(AdminId::new(1), Utc::now());
        assert_eq!("Jane", admin.name());
        assert!(admin.check_password(&secret("abc12345")).is_ok());
        assert!(matches!(
            admin.check_password(&secret("wrong1234")),
            Err(Error::BadPassword { .. })
        ));
        // Hash strings survive a trip through their textual form
        let text = admin.password_hash().as_str().to_owned();
        assert!(text.starts_with("$argon2id$"));
        assert!(AdminHashString::try_from(text).is_ok());
        assert!(AdminHashString::try_from("not a hash".to_owned()).is_err());
    }

    #[test]
    fn codes() {
        assert_eq!(Category::Beverage, Category::try_from(0).unwrap());
        assert_eq!(Category::Food, Category::try_from(1).unwrap());
        assert!(matches!(
            Category::try_from(2),
            Err(Error::BadCategory { value: 2, .. })
        ));
        assert_eq!(Size::Large, Size::try_from(1).unwrap());
        assert!(Size::try_from(-1).is_err());
        assert_eq!("1", serde_json::to_string(&Size::Large).unwrap());
        assert!(serde_json::from_str::<Category>("7").is_err());
    }

    #[test]
    fn diffs() {
        let now = Utc::now();
        let mut item = NewItem::new(
            AdminId::new(1),
            Category::Beverage,
            "880012345",
            4500,
            1200,
            "아메리카노",
            "hot",
            now,
            Size::Small,
        )
        .into_item(ItemId::new(1), now);
        assert_eq!("ㅇㅁㄹㅋㄴ", item.initials);

        assert!(ItemDiff::default().is_empty());
        let diff = ItemDiff::default().with_name("카페라떼");
        assert!(!diff.is_empty());
        assert_eq!(Some(("카페라떼", "ㅋㅍㄹㄸ")), diff.name());

        let before = item.clone();
        item.apply(&diff, now);
        assert_eq!("카페라떼", item.name);
        assert_eq!("ㅋㅍㄹㄸ", item.initials);
        assert_eq!(before.barcode, item.barcode);
        assert_eq!(before.price, item.price);
        assert_eq!(before.description, item.description);
    }
}
