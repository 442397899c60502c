use std::collections::HashMap;

use chrono::NaiveDateTime;
use reggie_core::order::{draft_order, OrderRequest};
use reggie_core::response::PageRequest;
use reggie_core::{Order, OrderDetail, OrderDto, OrderSubmitForm, Page, ShoppingCart};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};

use super::address_book::address_of;
use super::shopping_cart::{
    cart_rows, clear_cart, find_cart_row, insert_cart_row, set_cart_number, CartMatch,
};
use super::user::find_user;
use super::{
    datetime_value, decimal_value, get_decimal, id_values, placeholders, query_page, sql_err,
    Database, Filter, RepositoryError,
};

const COLUMNS: &str = "id, number, status, user_id, address_book_id, order_time, checkout_time, \
                       pay_method, amount, remark, phone, address, user_name, consignee";

const DETAIL_COLUMNS: &str =
    "id, name, image, order_id, dish_id, setmeal_id, dish_flavor, number, amount";

fn map_order(row: &Row) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        number: row.get(1)?,
        status: row.get(2)?,
        user_id: row.get(3)?,
        address_book_id: row.get(4)?,
        order_time: row.get(5)?,
        checkout_time: row.get(6)?,
        pay_method: row.get(7)?,
        amount: get_decimal(row, 8)?,
        remark: row.get(9)?,
        phone: row.get(10)?,
        address: row.get(11)?,
        user_name: row.get(12)?,
        consignee: row.get(13)?,
    })
}

fn map_detail(row: &Row) -> rusqlite::Result<OrderDetail> {
    Ok(OrderDetail {
        id: row.get(0)?,
        name: row.get(1)?,
        image: row.get(2)?,
        order_id: row.get(3)?,
        dish_id: row.get(4)?,
        setmeal_id: row.get(5)?,
        dish_flavor: row.get(6)?,
        number: row.get(7)?,
        amount: get_decimal(row, 8)?,
    })
}

fn insert_order(
    tx: &Transaction,
    order: &Order,
    details: &[OrderDetail],
) -> Result<(), RepositoryError> {
    tx.execute(
        &format!(
            "INSERT INTO orders ({}) VALUES
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            COLUMNS
        ),
        params![
            order.id,
            order.number,
            order.status,
            order.user_id,
            order.address_book_id,
            order.order_time,
            order.checkout_time,
            order.pay_method,
            decimal_value(order.amount),
            order.remark,
            order.phone,
            order.address,
            order.user_name,
            order.consignee,
        ],
    )
    .map_err(sql_err("insert_order"))?;

    let mut stmt = tx
        .prepare(&format!(
            "INSERT INTO order_detail ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            DETAIL_COLUMNS
        ))
        .map_err(sql_err("insert_order"))?;
    for detail in details {
        stmt.execute(params![
            detail.id,
            detail.name,
            detail.image,
            detail.order_id,
            detail.dish_id,
            detail.setmeal_id,
            detail.dish_flavor,
            detail.number,
            decimal_value(detail.amount),
        ])
        .map_err(sql_err("insert_order"))?;
    }
    Ok(())
}

/// Line items of every order in `order_ids`, grouped by order.
fn details_for(
    conn: &Connection,
    order_ids: &[i64],
) -> Result<HashMap<i64, Vec<OrderDetail>>, RepositoryError> {
    let mut grouped: HashMap<i64, Vec<OrderDetail>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM order_detail WHERE order_id IN ({}) ORDER BY id",
            DETAIL_COLUMNS,
            placeholders(order_ids.len())
        ))
        .map_err(sql_err("details_for"))?;
    let rows = stmt
        .query_map(params_from_iter(id_values(order_ids)), map_detail)
        .map_err(sql_err("details_for"))?;
    for detail in rows {
        let detail = detail.map_err(sql_err("details_for"))?;
        grouped.entry(detail.order_id).or_default().push(detail);
    }
    Ok(grouped)
}

fn with_details(conn: &Connection, page: Page<Order>) -> Result<Page<OrderDto>, RepositoryError> {
    let ids: Vec<i64> = page.records.iter().map(|o| o.id).collect();
    let mut details = details_for(conn, &ids)?;
    Ok(page.map(|order| {
        let items = details.remove(&order.id).unwrap_or_default();
        OrderDto::new(order, items)
    }))
}

/// Admin order search filters.
#[derive(Debug, Clone, Default)]
pub struct OrderSearch {
    pub number: Option<String>,
    pub begin_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

impl Database {
    /// Turn the user's cart into an order.
    ///
    /// Loading the cart, writing the order with its line items and clearing
    /// the cart happen in one transaction. An empty cart or an address the
    /// user does not own rejects the whole order.
    pub async fn submit_order(
        &self,
        user_id: i64,
        form: OrderSubmitForm,
        now: NaiveDateTime,
    ) -> Result<Order, RepositoryError> {
        let ids = self.ids.clone();
        self.call("submit_order", move |conn| {
            let tx = conn.transaction().map_err(sql_err("submit_order"))?;

            let cart = cart_rows(&tx, user_id)?;
            let user = find_user(&tx, user_id)?
                .ok_or_else(|| RepositoryError::rejected("User not found"))?;
            let address = address_of(&tx, user_id, form.address_book_id)?;

            let (order, details) = draft_order(
                OrderRequest {
                    order_id: ids.next_id(),
                    user: &user,
                    address: address.as_ref(),
                    pay_method: form.pay_method,
                    remark: form.remark,
                    now,
                },
                &cart,
                || ids.next_id(),
            )
            .map_err(|e| RepositoryError::rejected(e.to_string()))?;

            insert_order(&tx, &order, &details)?;
            clear_cart(&tx, user_id)?;
            tx.commit().map_err(sql_err("submit_order"))?;
            Ok(order)
        })
        .await
    }

    /// The user's own orders, newest first, with line items.
    pub async fn user_orders(
        &self,
        user_id: i64,
        request: PageRequest,
    ) -> Result<Page<OrderDto>, RepositoryError> {
        self.call("user_orders", move |conn| {
            let page = query_page(
                conn,
                "user_orders",
                COLUMNS,
                "orders",
                &Filter::new().push("user_id = ?", user_id),
                "order_time DESC, id DESC",
                request,
                map_order,
            )?;
            with_details(conn, page)
        })
        .await
    }

    /// All orders matching `search`, newest first, with line items. Time
    /// bounds are exclusive.
    pub async fn order_page(
        &self,
        search: OrderSearch,
        request: PageRequest,
    ) -> Result<Page<OrderDto>, RepositoryError> {
        self.call("order_page", move |conn| {
            let filter = Filter::new()
                .push_opt(
                    "number = ?",
                    search.number.filter(|n| !n.trim().is_empty()),
                )
                .push_opt("order_time > ?", search.begin_time.map(datetime_value))
                .push_opt("order_time < ?", search.end_time.map(datetime_value));
            let page = query_page(
                conn,
                "order_page",
                COLUMNS,
                "orders",
                &filter,
                "order_time DESC, id DESC",
                request,
                map_order,
            )?;
            with_details(conn, page)
        })
        .await
    }

    /// Copy the line items of one of the user's orders back into their
    /// cart, merging with rows already there.
    pub async fn reorder(
        &self,
        user_id: i64,
        order_id: i64,
        now: NaiveDateTime,
    ) -> Result<(), RepositoryError> {
        let ids = self.ids.clone();
        self.call("reorder", move |conn| {
            let tx = conn.transaction().map_err(sql_err("reorder"))?;

            let owner: Option<i64> = tx
                .query_row(
                    "SELECT user_id FROM orders WHERE id = ?1",
                    params![order_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err("reorder"))?;
            if owner != Some(user_id) {
                return Err(RepositoryError::rejected("Order not found"));
            }

            let details = details_for(&tx, &[order_id])?
                .remove(&order_id)
                .unwrap_or_default();
            for detail in details {
                let existing = find_cart_row(
                    &tx,
                    user_id,
                    detail.dish_id,
                    detail.setmeal_id,
                    CartMatch::ItemAndFlavor(detail.dish_flavor.as_deref()),
                )?;
                match existing {
                    Some(row) => set_cart_number(&tx, row.id, row.number + detail.number)?,
                    None => insert_cart_row(
                        &tx,
                        &ShoppingCart {
                            id: ids.next_id(),
                            name: detail.name,
                            image: detail.image,
                            user_id,
                            dish_id: detail.dish_id,
                            setmeal_id: detail.setmeal_id,
                            dish_flavor: detail.dish_flavor,
                            number: detail.number,
                            amount: detail.amount,
                            create_time: now,
                        },
                    )?,
                }
            }

            tx.commit().map_err(sql_err("reorder"))
        })
        .await
    }

    /// Returns false if the order does not exist.
    pub async fn set_order_status(&self, id: i64, status: i32) -> Result<bool, RepositoryError> {
        self.call("set_order_status", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE orders SET status = ?2 WHERE id = ?1",
                    params![id, status],
                )
                .map_err(sql_err("set_order_status"))?;
            Ok(changed > 0)
        })
        .await
    }
}
