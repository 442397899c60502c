//! Shopping cart rows, scoped to the owning user.

use reggie_core::ShoppingCart;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decimal_value, get_decimal, query_all, sql_err, Database, Filter, RepositoryError};

const COLUMNS: &str = "id, name, image, user_id, dish_id, setmeal_id, dish_flavor, number, \
                       amount, create_time";

fn map_cart(row: &Row) -> rusqlite::Result<ShoppingCart> {
    Ok(ShoppingCart {
        id: row.get(0)?,
        name: row.get(1)?,
        image: row.get(2)?,
        user_id: row.get(3)?,
        dish_id: row.get(4)?,
        setmeal_id: row.get(5)?,
        dish_flavor: row.get(6)?,
        number: row.get(7)?,
        amount: get_decimal(row, 8)?,
        create_time: row.get(9)?,
    })
}

/// Which existing row an incoming item lands on.
#[derive(Debug, Clone, Copy)]
pub(super) enum CartMatch<'a> {
    /// Same dish or same set meal.
    Item,
    /// Same set meal, or same dish with the same flavor.
    ItemAndFlavor(Option<&'a str>),
}

pub(super) fn find_cart_row(
    conn: &Connection,
    user_id: i64,
    dish_id: Option<i64>,
    setmeal_id: Option<i64>,
    matching: CartMatch<'_>,
) -> Result<Option<ShoppingCart>, RepositoryError> {
    let row = match (dish_id, setmeal_id, matching) {
        (Some(dish_id), _, CartMatch::Item) => conn.query_row(
            &format!(
                "SELECT {} FROM shopping_cart WHERE user_id = ?1 AND dish_id = ?2
                 ORDER BY create_time ASC LIMIT 1",
                COLUMNS
            ),
            params![user_id, dish_id],
            map_cart,
        ),
        (Some(dish_id), _, CartMatch::ItemAndFlavor(flavor)) => conn.query_row(
            &format!(
                "SELECT {} FROM shopping_cart
                 WHERE user_id = ?1 AND dish_id = ?2 AND dish_flavor IS ?3
                 ORDER BY create_time ASC LIMIT 1",
                COLUMNS
            ),
            params![user_id, dish_id, flavor],
            map_cart,
        ),
        (None, Some(setmeal_id), _) => conn.query_row(
            &format!(
                "SELECT {} FROM shopping_cart WHERE user_id = ?1 AND setmeal_id = ?2
                 ORDER BY create_time ASC LIMIT 1",
                COLUMNS
            ),
            params![user_id, setmeal_id],
            map_cart,
        ),
        (None, None, _) => return Ok(None),
    };
    row.optional().map_err(sql_err("find_cart_row"))
}

pub(super) fn insert_cart_row(
    conn: &Connection,
    item: &ShoppingCart,
) -> Result<(), RepositoryError> {
    conn.execute(
        &format!(
            "INSERT INTO shopping_cart ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            COLUMNS
        ),
        params![
            item.id,
            item.name,
            item.image,
            item.user_id,
            item.dish_id,
            item.setmeal_id,
            item.dish_flavor,
            item.number,
            decimal_value(item.amount),
            item.create_time,
        ],
    )
    .map_err(sql_err("insert_cart_row"))?;
    Ok(())
}

pub(super) fn set_cart_number(
    conn: &Connection,
    id: i64,
    number: i32,
) -> Result<(), RepositoryError> {
    conn.execute(
        "UPDATE shopping_cart SET number = ?2 WHERE id = ?1",
        params![id, number],
    )
    .map_err(sql_err("set_cart_number"))?;
    Ok(())
}

pub(super) fn cart_rows(
    conn: &Connection,
    user_id: i64,
) -> Result<Vec<ShoppingCart>, RepositoryError> {
    query_all(
        conn,
        "cart_rows",
        COLUMNS,
        "shopping_cart",
        &Filter::new().push("user_id = ?", user_id),
        "create_time ASC, id ASC",
        map_cart,
    )
}

pub(super) fn clear_cart(conn: &Connection, user_id: i64) -> Result<(), RepositoryError> {
    conn.execute(
        "DELETE FROM shopping_cart WHERE user_id = ?1",
        params![user_id],
    )
    .map_err(sql_err("clear_cart"))?;
    Ok(())
}

impl Database {
    /// Add one of an item to the user's cart.
    ///
    /// If the same dish or set meal is already there its count goes up by
    /// one; otherwise `item` is inserted as given. Returns the resulting row.
    pub async fn add_to_cart(&self, item: ShoppingCart) -> Result<ShoppingCart, RepositoryError> {
        self.call("add_to_cart", move |conn| {
            let tx = conn.transaction().map_err(sql_err("add_to_cart"))?;
            let existing = find_cart_row(
                &tx,
                item.user_id,
                item.dish_id,
                item.setmeal_id,
                CartMatch::Item,
            )?;
            let row = match existing {
                Some(mut row) => {
                    row.number += 1;
                    set_cart_number(&tx, row.id, row.number)?;
                    row
                }
                None => {
                    insert_cart_row(&tx, &item)?;
                    item
                }
            };
            tx.commit().map_err(sql_err("add_to_cart"))?;
            Ok(row)
        })
        .await
    }

    /// Take one of an item out of the user's cart, removing the row when its
    /// count reaches zero. Returns the row with its new count, or `None` if
    /// the item is not in the cart.
    pub async fn sub_from_cart(
        &self,
        user_id: i64,
        dish_id: Option<i64>,
        setmeal_id: Option<i64>,
    ) -> Result<Option<ShoppingCart>, RepositoryError> {
        self.call("sub_from_cart", move |conn| {
            let tx = conn.transaction().map_err(sql_err("sub_from_cart"))?;
            let Some(mut row) = find_cart_row(&tx, user_id, dish_id, setmeal_id, CartMatch::Item)?
            else {
                return Ok(None);
            };
            row.number -= 1;
            if row.number > 0 {
                set_cart_number(&tx, row.id, row.number)?;
            } else {
                tx.execute("DELETE FROM shopping_cart WHERE id = ?1", params![row.id])
                    .map_err(sql_err("sub_from_cart"))?;
            }
            tx.commit().map_err(sql_err("sub_from_cart"))?;
            Ok(Some(row))
        })
        .await
    }

    /// The user's cart, oldest first.
    pub async fn cart_items(&self, user_id: i64) -> Result<Vec<ShoppingCart>, RepositoryError> {
        self.call("cart_items", move |conn| cart_rows(conn, user_id))
            .await
    }

    pub async fn clean_cart(&self, user_id: i64) -> Result<(), RepositoryError> {
        self.call("clean_cart", move |conn| clear_cart(conn, user_id))
            .await
    }
}
