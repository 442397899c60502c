use reggie_core::response::PageRequest;
use reggie_core::status::ENABLED;
use reggie_core::{Audit, DishDto, Page, Setmeal, SetmealDish, SetmealDto, SetmealForm};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row, Transaction};

use super::dish::map_dish;
use super::{
    datetime_value, decimal_value, get_decimal, id_values, placeholders, query_all, query_page,
    sql_err, Database, Filter, RepositoryError,
};

const COLUMNS: &str = "s.id, s.category_id, s.name, s.price, s.status, s.code, s.description, \
                       s.image, s.create_time, s.update_time, s.create_user, s.update_user, \
                       c.name";
const FROM: &str = "setmeal s LEFT JOIN category c ON c.id = s.category_id";

const DISH_COLUMNS: &str = "id, setmeal_id, dish_id, name, price, copies, sort, \
                            create_time, update_time, create_user, update_user";

fn map_setmeal(row: &Row) -> rusqlite::Result<Setmeal> {
    Ok(Setmeal {
        id: row.get(0)?,
        category_id: row.get(1)?,
        name: row.get(2)?,
        price: get_decimal(row, 3)?,
        status: row.get(4)?,
        code: row.get(5)?,
        description: row.get(6)?,
        image: row.get(7)?,
        create_time: row.get(8)?,
        update_time: row.get(9)?,
        create_user: row.get(10)?,
        update_user: row.get(11)?,
    })
}

fn map_setmeal_dto(row: &Row) -> rusqlite::Result<SetmealDto> {
    Ok(SetmealDto {
        setmeal: map_setmeal(row)?,
        setmeal_dishes: Vec::new(),
        category_name: row.get(12)?,
    })
}

fn map_setmeal_dish(row: &Row) -> rusqlite::Result<SetmealDish> {
    Ok(SetmealDish {
        id: row.get(0)?,
        setmeal_id: row.get(1)?,
        dish_id: row.get(2)?,
        name: row.get(3)?,
        price: get_decimal(row, 4)?,
        copies: row.get(5)?,
        sort: row.get(6)?,
        create_time: row.get(7)?,
        update_time: row.get(8)?,
        create_user: row.get(9)?,
        update_user: row.get(10)?,
    })
}

fn insert_setmeal_dishes(tx: &Transaction, dishes: &[SetmealDish]) -> Result<(), RepositoryError> {
    let mut stmt = tx
        .prepare(&format!(
            "INSERT INTO setmeal_dish ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            DISH_COLUMNS
        ))
        .map_err(sql_err("insert_setmeal_dishes"))?;
    for dish in dishes {
        stmt.execute(params![
            dish.id,
            dish.setmeal_id,
            dish.dish_id,
            dish.name,
            decimal_value(dish.price),
            dish.copies,
            dish.sort,
            dish.create_time,
            dish.update_time,
            dish.create_user,
            dish.update_user,
        ])
        .map_err(sql_err("insert_setmeal_dishes"))?;
    }
    Ok(())
}

impl Database {
    /// Insert a set meal and its dishes in one transaction.
    pub async fn insert_setmeal(
        &self,
        setmeal: Setmeal,
        dishes: Vec<SetmealDish>,
    ) -> Result<(), RepositoryError> {
        self.call("insert_setmeal", move |conn| {
            let tx = conn.transaction().map_err(sql_err("insert_setmeal"))?;
            tx.execute(
                "INSERT INTO setmeal (id, category_id, name, price, status, code, description,
                                      image, create_time, update_time, create_user, update_user)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    setmeal.id,
                    setmeal.category_id,
                    setmeal.name,
                    decimal_value(setmeal.price),
                    setmeal.status,
                    setmeal.code,
                    setmeal.description,
                    setmeal.image,
                    setmeal.create_time,
                    setmeal.update_time,
                    setmeal.create_user,
                    setmeal.update_user,
                ],
            )
            .map_err(sql_err("insert_setmeal"))?;
            insert_setmeal_dishes(&tx, &dishes)?;
            tx.commit().map_err(sql_err("insert_setmeal"))
        })
        .await
    }

    /// Set meal with category name and dishes.
    pub async fn setmeal_with_dishes(
        &self,
        id: i64,
    ) -> Result<Option<SetmealDto>, RepositoryError> {
        self.call("setmeal_with_dishes", move |conn| {
            let dto = conn
                .query_row(
                    &format!("SELECT {} FROM {} WHERE s.id = ?1", COLUMNS, FROM),
                    params![id],
                    map_setmeal_dto,
                )
                .optional()
                .map_err(sql_err("setmeal_with_dishes"))?;
            let Some(mut dto) = dto else {
                return Ok(None);
            };
            dto.setmeal_dishes = query_all(
                conn,
                "setmeal_with_dishes",
                DISH_COLUMNS,
                "setmeal_dish",
                &Filter::new().push("setmeal_id = ?", id),
                "sort ASC, id ASC",
                map_setmeal_dish,
            )?;
            Ok(Some(dto))
        })
        .await
    }

    /// Overwrite a set meal from `form` and replace its dishes. Returns false
    /// if it does not exist.
    pub async fn update_setmeal(
        &self,
        id: i64,
        form: SetmealForm,
        dishes: Vec<SetmealDish>,
        audit: Audit,
    ) -> Result<bool, RepositoryError> {
        self.call("update_setmeal", move |conn| {
            let tx = conn.transaction().map_err(sql_err("update_setmeal"))?;
            let changed = tx
                .execute(
                    "UPDATE setmeal SET
                        category_id = ?2,
                        name = ?3,
                        price = ?4,
                        status = COALESCE(?5, status),
                        code = ?6,
                        description = ?7,
                        image = ?8,
                        update_time = ?9,
                        update_user = ?10
                     WHERE id = ?1",
                    params![
                        id,
                        form.category_id,
                        form.name,
                        decimal_value(form.price),
                        form.status,
                        form.code,
                        form.description,
                        form.image,
                        audit.at,
                        audit.by,
                    ],
                )
                .map_err(sql_err("update_setmeal"))?;
            if changed == 0 {
                return Ok(false);
            }

            tx.execute(
                "DELETE FROM setmeal_dish WHERE setmeal_id = ?1",
                params![id],
            )
            .map_err(sql_err("update_setmeal"))?;
            insert_setmeal_dishes(&tx, &dishes)?;
            tx.commit().map_err(sql_err("update_setmeal"))?;
            Ok(true)
        })
        .await
    }

    pub async fn set_setmeal_status(
        &self,
        ids: Vec<i64>,
        status: i32,
        audit: Audit,
    ) -> Result<(), RepositoryError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.call("set_setmeal_status", move |conn| {
            let mut values: Vec<Value> =
                vec![status.into(), datetime_value(audit.at), audit.by.into()];
            values.extend(id_values(&ids));
            conn.execute(
                &format!(
                    "UPDATE setmeal SET status = ?, update_time = ?, update_user = ?
                     WHERE id IN ({})",
                    placeholders(ids.len())
                ),
                params_from_iter(values),
            )
            .map_err(sql_err("set_setmeal_status"))?;
            Ok(())
        })
        .await
    }

    /// Delete set meals and their dish links. Refused while any of them is
    /// on sale.
    pub async fn delete_setmeals(&self, ids: Vec<i64>) -> Result<(), RepositoryError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.call("delete_setmeals", move |conn| {
            let tx = conn.transaction().map_err(sql_err("delete_setmeals"))?;
            let in_list = placeholders(ids.len());

            let mut values: Vec<Value> = vec![ENABLED.into()];
            values.extend(id_values(&ids));
            let on_sale: i64 = tx
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM setmeal WHERE status = ? AND id IN ({})",
                        in_list
                    ),
                    params_from_iter(values),
                    |row| row.get(0),
                )
                .map_err(sql_err("delete_setmeals"))?;
            if on_sale > 0 {
                return Err(RepositoryError::rejected(
                    "Set meal is on sale, stop selling it before deleting",
                ));
            }

            tx.execute(
                &format!("DELETE FROM setmeal_dish WHERE setmeal_id IN ({})", in_list),
                params_from_iter(id_values(&ids)),
            )
            .map_err(sql_err("delete_setmeals"))?;
            tx.execute(
                &format!("DELETE FROM setmeal WHERE id IN ({})", in_list),
                params_from_iter(id_values(&ids)),
            )
            .map_err(sql_err("delete_setmeals"))?;
            tx.commit().map_err(sql_err("delete_setmeals"))
        })
        .await
    }

    pub async fn setmeal_page(
        &self,
        name: Option<String>,
        request: PageRequest,
    ) -> Result<Page<SetmealDto>, RepositoryError> {
        self.call("setmeal_page", move |conn| {
            let filter = Filter::new().contains("s.name", name.as_deref());
            query_page(
                conn,
                "setmeal_page",
                COLUMNS,
                FROM,
                &filter,
                "s.update_time DESC, s.id DESC",
                request,
                map_setmeal_dto,
            )
        })
        .await
    }

    pub async fn list_setmeals(
        &self,
        category_id: Option<i64>,
        status: Option<i32>,
    ) -> Result<Vec<Setmeal>, RepositoryError> {
        self.call("list_setmeals", move |conn| {
            let filter = Filter::new()
                .push_opt("s.category_id = ?", category_id)
                .push_opt("s.status = ?", status);
            query_all(
                conn,
                "list_setmeals",
                COLUMNS,
                FROM,
                &filter,
                "s.update_time DESC",
                map_setmeal,
            )
        })
        .await
    }

    /// The dishes inside a set meal as full dish records, each carrying the
    /// number of portions it contributes.
    pub async fn setmeal_dish_details(&self, id: i64) -> Result<Vec<DishDto>, RepositoryError> {
        self.call("setmeal_dish_details", move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT d.id, d.name, d.category_id, d.price, d.code, d.image, d.description,
                            d.status, d.sort, d.create_time, d.update_time, d.create_user,
                            d.update_user, sd.copies
                     FROM setmeal_dish sd JOIN dish d ON d.id = sd.dish_id
                     WHERE sd.setmeal_id = ?1
                     ORDER BY sd.sort ASC, sd.id ASC",
                )
                .map_err(sql_err("setmeal_dish_details"))?;
            let rows = stmt
                .query_map(params![id], |row| {
                    Ok(DishDto {
                        dish: map_dish(row)?,
                        flavors: Vec::new(),
                        category_name: None,
                        copies: Some(row.get(13)?),
                    })
                })
                .map_err(sql_err("setmeal_dish_details"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(sql_err("setmeal_dish_details"))
        })
        .await
    }
}
