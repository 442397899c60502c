//! Row types, one per table.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::serde_ext::{datetime, id, option_id};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(with = "id")]
    pub id: i64,
    pub username: String,
    pub name: String,
    /// MD5 hex digest; never written to clients.
    #[serde(skip_serializing, default)]
    pub password: String,
    pub phone: String,
    pub sex: String,
    pub id_number: String,
    pub status: i32,
    #[serde(with = "datetime")]
    pub create_time: NaiveDateTime,
    #[serde(with = "datetime")]
    pub update_time: NaiveDateTime,
    #[serde(default, with = "option_id")]
    pub create_user: Option<i64>,
    #[serde(default, with = "option_id")]
    pub update_user: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(with = "id")]
    pub id: i64,
    /// 1 = dish category, 2 = set meal category.
    #[serde(rename = "type")]
    pub kind: i32,
    pub name: String,
    pub sort: i32,
    #[serde(with = "datetime")]
    pub create_time: NaiveDateTime,
    #[serde(with = "datetime")]
    pub update_time: NaiveDateTime,
    #[serde(default, with = "option_id")]
    pub create_user: Option<i64>,
    #[serde(default, with = "option_id")]
    pub update_user: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    #[serde(with = "id")]
    pub id: i64,
    pub name: String,
    #[serde(with = "id")]
    pub category_id: i64,
    pub price: Decimal,
    pub code: String,
    pub image: String,
    pub description: Option<String>,
    pub status: i32,
    pub sort: i32,
    #[serde(with = "datetime")]
    pub create_time: NaiveDateTime,
    #[serde(with = "datetime")]
    pub update_time: NaiveDateTime,
    #[serde(default, with = "option_id")]
    pub create_user: Option<i64>,
    #[serde(default, with = "option_id")]
    pub update_user: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishFlavor {
    #[serde(with = "id")]
    pub id: i64,
    #[serde(with = "id")]
    pub dish_id: i64,
    pub name: String,
    /// JSON-encoded list of choices, stored verbatim.
    pub value: String,
    #[serde(with = "datetime")]
    pub create_time: NaiveDateTime,
    #[serde(with = "datetime")]
    pub update_time: NaiveDateTime,
    #[serde(default, with = "option_id")]
    pub create_user: Option<i64>,
    #[serde(default, with = "option_id")]
    pub update_user: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setmeal {
    #[serde(with = "id")]
    pub id: i64,
    #[serde(with = "id")]
    pub category_id: i64,
    pub name: String,
    pub price: Decimal,
    pub status: i32,
    pub code: String,
    pub description: Option<String>,
    pub image: String,
    #[serde(with = "datetime")]
    pub create_time: NaiveDateTime,
    #[serde(with = "datetime")]
    pub update_time: NaiveDateTime,
    #[serde(default, with = "option_id")]
    pub create_user: Option<i64>,
    #[serde(default, with = "option_id")]
    pub update_user: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetmealDish {
    #[serde(with = "id")]
    pub id: i64,
    #[serde(with = "id")]
    pub setmeal_id: i64,
    #[serde(with = "id")]
    pub dish_id: i64,
    /// Dish name at the time the set meal was saved.
    pub name: String,
    pub price: Decimal,
    pub copies: i32,
    pub sort: i32,
    #[serde(with = "datetime")]
    pub create_time: NaiveDateTime,
    #[serde(with = "datetime")]
    pub update_time: NaiveDateTime,
    #[serde(default, with = "option_id")]
    pub create_user: Option<i64>,
    #[serde(default, with = "option_id")]
    pub update_user: Option<i64>,
}

/// A customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(with = "id")]
    pub id: i64,
    pub name: Option<String>,
    /// Login identifier. Verification codes are delivered by email, so this
    /// usually holds an email address.
    pub phone: String,
    pub sex: Option<String>,
    pub id_number: Option<String>,
    pub avatar: Option<String>,
    pub status: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBook {
    #[serde(with = "id")]
    pub id: i64,
    #[serde(with = "id")]
    pub user_id: i64,
    pub consignee: String,
    pub sex: String,
    pub phone: String,
    pub province_code: Option<String>,
    pub province_name: Option<String>,
    pub city_code: Option<String>,
    pub city_name: Option<String>,
    pub district_code: Option<String>,
    pub district_name: Option<String>,
    pub detail: Option<String>,
    pub label: Option<String>,
    pub is_default: i32,
    #[serde(with = "datetime")]
    pub create_time: NaiveDateTime,
    #[serde(with = "datetime")]
    pub update_time: NaiveDateTime,
    #[serde(default, with = "option_id")]
    pub create_user: Option<i64>,
    #[serde(default, with = "option_id")]
    pub update_user: Option<i64>,
}

impl AddressBook {
    /// Province, city, district and detail concatenated; missing parts are
    /// skipped.
    pub fn full_address(&self) -> String {
        [
            &self.province_name,
            &self.city_name,
            &self.district_name,
            &self.detail,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingCart {
    #[serde(with = "id")]
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    #[serde(with = "id")]
    pub user_id: i64,
    #[serde(default, with = "option_id")]
    pub dish_id: Option<i64>,
    #[serde(default, with = "option_id")]
    pub setmeal_id: Option<i64>,
    pub dish_flavor: Option<String>,
    pub number: i32,
    /// Unit price.
    pub amount: Decimal,
    #[serde(with = "datetime")]
    pub create_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(with = "id")]
    pub id: i64,
    pub number: String,
    pub status: i32,
    #[serde(with = "id")]
    pub user_id: i64,
    #[serde(with = "id")]
    pub address_book_id: i64,
    #[serde(with = "datetime")]
    pub order_time: NaiveDateTime,
    #[serde(with = "datetime")]
    pub checkout_time: NaiveDateTime,
    pub pay_method: i32,
    pub amount: Decimal,
    pub remark: Option<String>,
    pub phone: String,
    pub address: String,
    pub user_name: Option<String>,
    pub consignee: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(with = "id")]
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    #[serde(with = "id")]
    pub order_id: i64,
    #[serde(default, with = "option_id")]
    pub dish_id: Option<i64>,
    #[serde(default, with = "option_id")]
    pub setmeal_id: Option<i64>,
    pub dish_flavor: Option<String>,
    pub number: i32,
    /// Unit price.
    pub amount: Decimal,
}
