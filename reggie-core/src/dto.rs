//! Request payloads and composite response views.
//!
//! Update payloads carry `Option` fields: `None` leaves the column untouched.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entity::{Category, Dish, DishFlavor, Order, OrderDetail, Setmeal, SetmealDish};
use crate::serde_ext::{id, option_id};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeForm {
    pub username: String,
    pub name: String,
    pub phone: String,
    pub sex: String,
    pub id_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeUpdate {
    #[serde(with = "id")]
    pub id: i64,
    pub username: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub sex: Option<String>,
    pub id_number: Option<String>,
    pub status: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryForm {
    #[serde(rename = "type")]
    pub kind: i32,
    pub name: String,
    #[serde(default)]
    pub sort: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    #[serde(with = "id")]
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: Option<i32>,
    pub name: Option<String>,
    pub sort: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlavorForm {
    pub name: String,
    pub value: String,
}

/// Create/update payload for a dish and its flavors.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishForm {
    #[serde(default, with = "option_id")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(with = "id")]
    pub category_id: i64,
    pub price: Decimal,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub image: String,
    pub description: Option<String>,
    pub status: Option<i32>,
    pub sort: Option<i32>,
    #[serde(default)]
    pub flavors: Vec<FlavorForm>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetmealDishForm {
    #[serde(with = "id")]
    pub dish_id: i64,
    pub name: String,
    pub price: Decimal,
    pub copies: i32,
    #[serde(default)]
    pub sort: i32,
}

/// Create/update payload for a set meal and its dishes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetmealForm {
    #[serde(default, with = "option_id")]
    pub id: Option<i64>,
    #[serde(with = "id")]
    pub category_id: i64,
    pub name: String,
    pub price: Decimal,
    pub status: Option<i32>,
    #[serde(default)]
    pub code: String,
    pub description: Option<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub setmeal_dishes: Vec<SetmealDishForm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendCodeForm {
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserLoginForm {
    pub phone: String,
    pub code: Option<String>,
}

/// Cart add/sub payload. `sub` only reads the dish/set meal ids.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemForm {
    pub name: Option<String>,
    pub image: Option<String>,
    #[serde(default, with = "option_id")]
    pub dish_id: Option<i64>,
    #[serde(default, with = "option_id")]
    pub setmeal_id: Option<i64>,
    pub dish_flavor: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressForm {
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
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressUpdate {
    #[serde(with = "id")]
    pub id: i64,
    pub consignee: Option<String>,
    pub sex: Option<String>,
    pub phone: Option<String>,
    pub province_code: Option<String>,
    pub province_name: Option<String>,
    pub city_code: Option<String>,
    pub city_name: Option<String>,
    pub district_code: Option<String>,
    pub district_name: Option<String>,
    pub detail: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdForm {
    #[serde(with = "id")]
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmitForm {
    #[serde(with = "id")]
    pub address_book_id: i64,
    #[serde(default = "default_pay_method")]
    pub pay_method: i32,
    pub remark: Option<String>,
}

fn default_pay_method() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusForm {
    #[serde(with = "id")]
    pub id: i64,
    pub status: i32,
}

/// Dish with its flavors and category name, as shown in menus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishDto {
    #[serde(flatten)]
    pub dish: Dish,
    #[serde(default)]
    pub flavors: Vec<DishFlavor>,
    pub category_name: Option<String>,
    /// Portions inside a set meal; only set for `/setmeal/dish/{id}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copies: Option<i32>,
}

impl DishDto {
    pub fn new(dish: Dish, category: Option<&Category>) -> Self {
        Self {
            dish,
            flavors: Vec::new(),
            category_name: category.map(|c| c.name.clone()),
            copies: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetmealDto {
    #[serde(flatten)]
    pub setmeal: Setmeal,
    #[serde(default)]
    pub setmeal_dishes: Vec<SetmealDish>,
    pub category_name: Option<String>,
}

/// Order with its line items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    #[serde(flatten)]
    pub order: Order,
    pub sum_num: i32,
    pub order_details: Vec<OrderDetail>,
}

impl OrderDto {
    pub fn new(order: Order, order_details: Vec<OrderDetail>) -> Self {
        let sum_num = order_details.iter().map(|d| d.number).sum();
        Self {
            order,
            sum_num,
            order_details,
        }
    }
}
