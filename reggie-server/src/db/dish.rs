use std::collections::HashMap;

use reggie_core::response::PageRequest;
use reggie_core::status::ENABLED;
use reggie_core::{Audit, Dish, DishDto, DishFlavor, DishForm, Page};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};

use super::{
    datetime_value, decimal_value, get_decimal, id_values, placeholders, query_all, query_page,
    sql_err, Database, Filter, RepositoryError,
};

const COLUMNS: &str = "d.id, d.name, d.category_id, d.price, d.code, d.image, d.description, \
                       d.status, d.sort, d.create_time, d.update_time, d.create_user, \
                       d.update_user, c.name";
const FROM: &str = "dish d LEFT JOIN category c ON c.id = d.category_id";

const FLAVOR_COLUMNS: &str =
    "id, dish_id, name, value, create_time, update_time, create_user, update_user";

pub(super) fn map_dish(row: &Row) -> rusqlite::Result<Dish> {
    Ok(Dish {
        id: row.get(0)?,
        name: row.get(1)?,
        category_id: row.get(2)?,
        price: get_decimal(row, 3)?,
        code: row.get(4)?,
        image: row.get(5)?,
        description: row.get(6)?,
        status: row.get(7)?,
        sort: row.get(8)?,
        create_time: row.get(9)?,
        update_time: row.get(10)?,
        create_user: row.get(11)?,
        update_user: row.get(12)?,
    })
}

/// Dish plus the joined category name; flavors are filled in separately.
fn map_dish_dto(row: &Row) -> rusqlite::Result<DishDto> {
    Ok(DishDto {
        dish: map_dish(row)?,
        flavors: Vec::new(),
        category_name: row.get(13)?,
        copies: None,
    })
}

fn map_flavor(row: &Row) -> rusqlite::Result<DishFlavor> {
    Ok(DishFlavor {
        id: row.get(0)?,
        dish_id: row.get(1)?,
        name: row.get(2)?,
        value: row.get(3)?,
        create_time: row.get(4)?,
        update_time: row.get(5)?,
        create_user: row.get(6)?,
        update_user: row.get(7)?,
    })
}

fn insert_flavors(tx: &Transaction, flavors: &[DishFlavor]) -> Result<(), RepositoryError> {
    let mut stmt = tx
        .prepare(&format!(
            "INSERT INTO dish_flavor ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            FLAVOR_COLUMNS
        ))
        .map_err(sql_err("insert_flavors"))?;
    for flavor in flavors {
        stmt.execute(params![
            flavor.id,
            flavor.dish_id,
            flavor.name,
            flavor.value,
            flavor.create_time,
            flavor.update_time,
            flavor.create_user,
            flavor.update_user,
        ])
        .map_err(sql_err("insert_flavors"))?;
    }
    Ok(())
}

/// Flavors of every dish in `dish_ids`, grouped by dish.
fn flavors_for(
    conn: &Connection,
    dish_ids: &[i64],
) -> Result<HashMap<i64, Vec<DishFlavor>>, RepositoryError> {
    let mut grouped: HashMap<i64, Vec<DishFlavor>> = HashMap::new();
    if dish_ids.is_empty() {
        return Ok(grouped);
    }
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM dish_flavor WHERE dish_id IN ({}) ORDER BY id",
            FLAVOR_COLUMNS,
            placeholders(dish_ids.len())
        ))
        .map_err(sql_err("flavors_for"))?;
    let rows = stmt
        .query_map(params_from_iter(id_values(dish_ids)), map_flavor)
        .map_err(sql_err("flavors_for"))?;
    for flavor in rows {
        let flavor = flavor.map_err(sql_err("flavors_for"))?;
        grouped.entry(flavor.dish_id).or_default().push(flavor);
    }
    Ok(grouped)
}

/// Category ids of the given dishes, deduplicated.
fn categories_of(conn: &Connection, ids: &[i64]) -> Result<Vec<i64>, RepositoryError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT DISTINCT category_id FROM dish WHERE id IN ({})",
            placeholders(ids.len())
        ))
        .map_err(sql_err("dish categories"))?;
    let rows = stmt
        .query_map(params_from_iter(id_values(ids)), |row| row.get(0))
        .map_err(sql_err("dish categories"))?;
    rows.collect::<Result<Vec<i64>, _>>()
        .map_err(sql_err("dish categories"))
}

impl Database {
    /// Insert a dish and its flavors in one transaction.
    pub async fn insert_dish(
        &self,
        dish: Dish,
        flavors: Vec<DishFlavor>,
    ) -> Result<(), RepositoryError> {
        self.call("insert_dish", move |conn| {
            let tx = conn.transaction().map_err(sql_err("insert_dish"))?;
            tx.execute(
                "INSERT INTO dish (id, name, category_id, price, code, image, description,
                                   status, sort, create_time, update_time, create_user, update_user)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    dish.id,
                    dish.name,
                    dish.category_id,
                    decimal_value(dish.price),
                    dish.code,
                    dish.image,
                    dish.description,
                    dish.status,
                    dish.sort,
                    dish.create_time,
                    dish.update_time,
                    dish.create_user,
                    dish.update_user,
                ],
            )
            .map_err(sql_err("insert_dish"))?;
            insert_flavors(&tx, &flavors)?;
            tx.commit().map_err(sql_err("insert_dish"))
        })
        .await
    }

    /// Dish with category name and flavors.
    pub async fn dish_with_flavors(&self, id: i64) -> Result<Option<DishDto>, RepositoryError> {
        self.call("dish_with_flavors", move |conn| {
            let dto = conn
                .query_row(
                    &format!("SELECT {} FROM {} WHERE d.id = ?1", COLUMNS, FROM),
                    params![id],
                    map_dish_dto,
                )
                .optional()
                .map_err(sql_err("dish_with_flavors"))?;
            let Some(mut dto) = dto else {
                return Ok(None);
            };
            dto.flavors = flavors_for(conn, &[id])?.remove(&id).unwrap_or_default();
            Ok(Some(dto))
        })
        .await
    }

    /// Overwrite a dish from `form` and replace its flavors.
    ///
    /// Returns the category the dish belonged to before the update, or `None`
    /// if the dish does not exist. `status` and `sort` are kept when absent.
    pub async fn update_dish(
        &self,
        id: i64,
        form: DishForm,
        flavors: Vec<DishFlavor>,
        audit: Audit,
    ) -> Result<Option<i64>, RepositoryError> {
        self.call("update_dish", move |conn| {
            let tx = conn.transaction().map_err(sql_err("update_dish"))?;
            let previous_category: Option<i64> = tx
                .query_row(
                    "SELECT category_id FROM dish WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err("update_dish"))?;
            if previous_category.is_none() {
                return Ok(None);
            }

            tx.execute(
                "UPDATE dish SET
                    name = ?2,
                    category_id = ?3,
                    price = ?4,
                    code = ?5,
                    image = ?6,
                    description = ?7,
                    status = COALESCE(?8, status),
                    sort = COALESCE(?9, sort),
                    update_time = ?10,
                    update_user = ?11
                 WHERE id = ?1",
                params![
                    id,
                    form.name,
                    form.category_id,
                    decimal_value(form.price),
                    form.code,
                    form.image,
                    form.description,
                    form.status,
                    form.sort,
                    audit.at,
                    audit.by,
                ],
            )
            .map_err(sql_err("update_dish"))?;

            tx.execute("DELETE FROM dish_flavor WHERE dish_id = ?1", params![id])
                .map_err(sql_err("update_dish"))?;
            insert_flavors(&tx, &flavors)?;
            tx.commit().map_err(sql_err("update_dish"))?;
            Ok(previous_category)
        })
        .await
    }

    /// Set the on-sale flag of several dishes. Returns the categories they
    /// belong to.
    pub async fn set_dish_status(
        &self,
        ids: Vec<i64>,
        status: i32,
        audit: Audit,
    ) -> Result<Vec<i64>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.call("set_dish_status", move |conn| {
            let tx = conn.transaction().map_err(sql_err("set_dish_status"))?;
            let categories = categories_of(&tx, &ids)?;
            let mut values: Vec<Value> =
                vec![status.into(), datetime_value(audit.at), audit.by.into()];
            values.extend(id_values(&ids));
            tx.execute(
                &format!(
                    "UPDATE dish SET status = ?, update_time = ?, update_user = ?
                     WHERE id IN ({})",
                    placeholders(ids.len())
                ),
                params_from_iter(values),
            )
            .map_err(sql_err("set_dish_status"))?;
            tx.commit().map_err(sql_err("set_dish_status"))?;
            Ok(categories)
        })
        .await
    }

    /// Delete dishes and their flavors. Refused while any of them is on
    /// sale. Returns the categories they belonged to.
    pub async fn delete_dishes(&self, ids: Vec<i64>) -> Result<Vec<i64>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.call("delete_dishes", move |conn| {
            let tx = conn.transaction().map_err(sql_err("delete_dishes"))?;
            let in_list = placeholders(ids.len());

            let mut values: Vec<Value> = vec![ENABLED.into()];
            values.extend(id_values(&ids));
            let on_sale: i64 = tx
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM dish WHERE status = ? AND id IN ({})",
                        in_list
                    ),
                    params_from_iter(values),
                    |row| row.get(0),
                )
                .map_err(sql_err("delete_dishes"))?;
            if on_sale > 0 {
                return Err(RepositoryError::rejected(
                    "Cannot delete dishes that are on sale",
                ));
            }

            let categories = categories_of(&tx, &ids)?;
            tx.execute(
                &format!("DELETE FROM dish_flavor WHERE dish_id IN ({})", in_list),
                params_from_iter(id_values(&ids)),
            )
            .map_err(sql_err("delete_dishes"))?;
            tx.execute(
                &format!("DELETE FROM dish WHERE id IN ({})", in_list),
                params_from_iter(id_values(&ids)),
            )
            .map_err(sql_err("delete_dishes"))?;
            tx.commit().map_err(sql_err("delete_dishes"))?;
            Ok(categories)
        })
        .await
    }

    pub async fn dish_page(
        &self,
        name: Option<String>,
        request: PageRequest,
    ) -> Result<Page<DishDto>, RepositoryError> {
        self.call("dish_page", move |conn| {
            let filter = Filter::new().contains("d.name", name.as_deref());
            query_page(
                conn,
                "dish_page",
                COLUMNS,
                FROM,
                &filter,
                "d.update_time DESC, d.id DESC",
                request,
                map_dish_dto,
            )
        })
        .await
    }

    /// On-sale dishes with flavors and category name, by sort then most
    /// recently updated.
    pub async fn list_dishes(
        &self,
        category_id: Option<i64>,
        name: Option<String>,
    ) -> Result<Vec<DishDto>, RepositoryError> {
        self.call("list_dishes", move |conn| {
            let filter = Filter::new()
                .push("d.status = ?", ENABLED)
                .push_opt("d.category_id = ?", category_id)
                .contains("d.name", name.as_deref());
            let mut dishes = query_all(
                conn,
                "list_dishes",
                COLUMNS,
                FROM,
                &filter,
                "d.sort ASC, d.update_time DESC",
                map_dish_dto,
            )?;

            let ids: Vec<i64> = dishes.iter().map(|d| d.dish.id).collect();
            let mut flavors = flavors_for(conn, &ids)?;
            for dto in &mut dishes {
                dto.flavors = flavors.remove(&dto.dish.id).unwrap_or_default();
            }
            Ok(dishes)
        })
        .await
    }
}
