//! Turning a shopping cart into an order.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::entity::{AddressBook, Order, OrderDetail, ShoppingCart, User};
use crate::status::OrderStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderDraftError {
    #[error("Shopping cart is empty")]
    EmptyCart,
    #[error("Invalid delivery address")]
    InvalidAddress,
}

/// Everything an order needs besides the cart itself.
#[derive(Debug, Clone)]
pub struct OrderRequest<'a> {
    pub order_id: i64,
    pub user: &'a User,
    pub address: Option<&'a AddressBook>,
    pub pay_method: i32,
    pub remark: Option<String>,
    pub now: NaiveDateTime,
}

/// Build the order row and its line items from the cart.
///
/// The address must belong to the ordering user. `next_id` supplies one id
/// per line item.
pub fn draft_order(
    request: OrderRequest<'_>,
    cart: &[ShoppingCart],
    mut next_id: impl FnMut() -> i64,
) -> Result<(Order, Vec<OrderDetail>), OrderDraftError> {
    if cart.is_empty() {
        return Err(OrderDraftError::EmptyCart);
    }
    let address = request
        .address
        .filter(|a| a.user_id == request.user.id)
        .ok_or(OrderDraftError::InvalidAddress)?;

    let details: Vec<OrderDetail> = cart
        .iter()
        .map(|item| OrderDetail {
            id: next_id(),
            name: item.name.clone(),
            image: item.image.clone(),
            order_id: request.order_id,
            dish_id: item.dish_id,
            setmeal_id: item.setmeal_id,
            dish_flavor: item.dish_flavor.clone(),
            number: item.number,
            amount: item.amount,
        })
        .collect();

    let order = Order {
        id: request.order_id,
        number: request.order_id.to_string(),
        status: OrderStatus::AwaitingDelivery.into(),
        user_id: request.user.id,
        address_book_id: address.id,
        order_time: request.now,
        checkout_time: request.now,
        pay_method: request.pay_method,
        amount: order_total(cart),
        remark: request.remark,
        phone: address.phone.clone(),
        address: address.full_address(),
        user_name: request.user.name.clone(),
        consignee: address.consignee.clone(),
    };

    Ok((order, details))
}

/// Sum of unit price times quantity.
pub fn order_total(cart: &[ShoppingCart]) -> Decimal {
    cart.iter()
        .map(|item| item.amount * Decimal::from(item.number))
        .sum()
}
