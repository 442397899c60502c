use reggie_core::response::PageRequest;
use reggie_core::{Audit, Category, CategoryUpdate, Page};
use rusqlite::{params, OptionalExtension, Row};

use super::{query_all, query_page, sql_err, Database, Filter, RepositoryError};

const COLUMNS: &str =
    "id, type, name, sort, create_time, update_time, create_user, update_user";

fn map_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        kind: row.get(1)?,
        name: row.get(2)?,
        sort: row.get(3)?,
        create_time: row.get(4)?,
        update_time: row.get(5)?,
        create_user: row.get(6)?,
        update_user: row.get(7)?,
    })
}

impl Database {
    pub async fn insert_category(&self, category: Category) -> Result<(), RepositoryError> {
        self.call("insert_category", move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO category ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    COLUMNS
                ),
                params![
                    category.id,
                    category.kind,
                    category.name,
                    category.sort,
                    category.create_time,
                    category.update_time,
                    category.create_user,
                    category.update_user,
                ],
            )
            .map_err(sql_err("insert_category"))?;
            Ok(())
        })
        .await
    }

    pub async fn category_by_id(&self, id: i64) -> Result<Option<Category>, RepositoryError> {
        self.call("category_by_id", move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM category WHERE id = ?1", COLUMNS),
                params![id],
                map_category,
            )
            .optional()
            .map_err(sql_err("category_by_id"))
        })
        .await
    }

    pub async fn update_category(
        &self,
        update: CategoryUpdate,
        audit: Audit,
    ) -> Result<bool, RepositoryError> {
        self.call("update_category", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE category SET
                        type = COALESCE(?2, type),
                        name = COALESCE(?3, name),
                        sort = COALESCE(?4, sort),
                        update_time = ?5,
                        update_user = ?6
                     WHERE id = ?1",
                    params![
                        update.id,
                        update.kind,
                        update.name,
                        update.sort,
                        audit.at,
                        audit.by
                    ],
                )
                .map_err(sql_err("update_category"))?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn category_page(
        &self,
        request: PageRequest,
    ) -> Result<Page<Category>, RepositoryError> {
        self.call("category_page", move |conn| {
            query_page(
                conn,
                "category_page",
                COLUMNS,
                "category",
                &Filter::new(),
                "sort ASC, id ASC",
                request,
                map_category,
            )
        })
        .await
    }

    /// Categories of one type (or all), by sort then most recently updated.
    pub async fn categories(&self, kind: Option<i32>) -> Result<Vec<Category>, RepositoryError> {
        self.call("categories", move |conn| {
            let filter = Filter::new().push_opt("type = ?", kind);
            query_all(
                conn,
                "categories",
                COLUMNS,
                "category",
                &filter,
                "sort ASC, update_time DESC",
                map_category,
            )
        })
        .await
    }

    /// Delete a category nothing refers to.
    ///
    /// Refused with [`RepositoryError::Rejected`] while dishes or set meals
    /// still belong to it.
    pub async fn delete_category(&self, id: i64) -> Result<(), RepositoryError> {
        self.call("delete_category", move |conn| {
            let tx = conn.transaction().map_err(sql_err("delete_category"))?;

            let dishes: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM dish WHERE category_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(sql_err("delete_category"))?;
            if dishes > 0 {
                return Err(RepositoryError::rejected("Category has dishes attached"));
            }

            let setmeals: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM setmeal WHERE category_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(sql_err("delete_category"))?;
            if setmeals > 0 {
                return Err(RepositoryError::rejected(
                    "Category has set meals attached",
                ));
            }

            tx.execute("DELETE FROM category WHERE id = ?1", params![id])
                .map_err(sql_err("delete_category"))?;
            tx.commit().map_err(sql_err("delete_category"))
        })
        .await
    }
}
