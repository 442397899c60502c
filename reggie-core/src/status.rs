//! Integer status codes stored in the database and sent on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Enabled / on-sale flag shared by employees, customers, dishes and set meals.
pub const ENABLED: i32 = 1;
pub const DISABLED: i32 = 0;

/// Category type for dish categories.
pub const CATEGORY_DISH: i32 = 1;
/// Category type for set meal categories.
pub const CATEGORY_SETMEAL: i32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown order status {0}")]
pub struct UnknownOrderStatus(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum OrderStatus {
    PendingPayment = 1,
    AwaitingDelivery = 2,
    Delivering = 3,
    Completed = 4,
    Cancelled = 5,
}

impl TryFrom<i32> for OrderStatus {
    type Error = UnknownOrderStatus;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::PendingPayment),
            2 => Ok(Self::AwaitingDelivery),
            3 => Ok(Self::Delivering),
            4 => Ok(Self::Completed),
            5 => Ok(Self::Cancelled),
            other => Err(UnknownOrderStatus(other)),
        }
    }
}

impl From<OrderStatus> for i32 {
    fn from(status: OrderStatus) -> Self {
        status as i32
    }
}

/// Parse an on-sale flag from a path segment such as `/dish/status/1`.
pub fn parse_sale_status(raw: &str) -> Option<i32> {
    match raw.trim() {
        "0" => Some(DISABLED),
        "1" => Some(ENABLED),
        _ => None,
    }
}
