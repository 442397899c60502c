//! Address book rows. Every query is scoped to the owning user.

use reggie_core::{AddressBook, AddressUpdate, Audit};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{id_values, placeholders, query_all, sql_err, Database, Filter, RepositoryError};

const COLUMNS: &str = "id, user_id, consignee, sex, phone, province_code, province_name, \
                       city_code, city_name, district_code, district_name, detail, label, \
                       is_default, create_time, update_time, create_user, update_user";

fn map_address(row: &Row) -> rusqlite::Result<AddressBook> {
    Ok(AddressBook {
        id: row.get(0)?,
        user_id: row.get(1)?,
        consignee: row.get(2)?,
        sex: row.get(3)?,
        phone: row.get(4)?,
        province_code: row.get(5)?,
        province_name: row.get(6)?,
        city_code: row.get(7)?,
        city_name: row.get(8)?,
        district_code: row.get(9)?,
        district_name: row.get(10)?,
        detail: row.get(11)?,
        label: row.get(12)?,
        is_default: row.get(13)?,
        create_time: row.get(14)?,
        update_time: row.get(15)?,
        create_user: row.get(16)?,
        update_user: row.get(17)?,
    })
}

pub(super) fn address_of(
    conn: &Connection,
    user_id: i64,
    id: i64,
) -> Result<Option<AddressBook>, RepositoryError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM address_book WHERE id = ?1 AND user_id = ?2",
            COLUMNS
        ),
        params![id, user_id],
        map_address,
    )
    .optional()
    .map_err(sql_err("address_of"))
}

impl Database {
    pub async fn insert_address(&self, address: AddressBook) -> Result<(), RepositoryError> {
        self.call("insert_address", move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO address_book ({}) VALUES
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                      ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                    COLUMNS
                ),
                params![
                    address.id,
                    address.user_id,
                    address.consignee,
                    address.sex,
                    address.phone,
                    address.province_code,
                    address.province_name,
                    address.city_code,
                    address.city_name,
                    address.district_code,
                    address.district_name,
                    address.detail,
                    address.label,
                    address.is_default,
                    address.create_time,
                    address.update_time,
                    address.create_user,
                    address.update_user,
                ],
            )
            .map_err(sql_err("insert_address"))?;
            Ok(())
        })
        .await
    }

    /// The user's addresses, most recently updated first.
    pub async fn addresses(&self, user_id: i64) -> Result<Vec<AddressBook>, RepositoryError> {
        self.call("addresses", move |conn| {
            query_all(
                conn,
                "addresses",
                COLUMNS,
                "address_book",
                &Filter::new().push("user_id = ?", user_id),
                "update_time DESC, id DESC",
                map_address,
            )
        })
        .await
    }

    pub async fn address_by_id(
        &self,
        user_id: i64,
        id: i64,
    ) -> Result<Option<AddressBook>, RepositoryError> {
        self.call("address_by_id", move |conn| address_of(conn, user_id, id))
            .await
    }

    pub async fn default_address(
        &self,
        user_id: i64,
    ) -> Result<Option<AddressBook>, RepositoryError> {
        self.call("default_address", move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM address_book WHERE user_id = ?1 AND is_default = 1
                     ORDER BY update_time DESC LIMIT 1",
                    COLUMNS
                ),
                params![user_id],
                map_address,
            )
            .optional()
            .map_err(sql_err("default_address"))
        })
        .await
    }

    /// Make `id` the user's only default address. Returns the updated row,
    /// or `None` if the user has no such address.
    pub async fn set_default_address(
        &self,
        user_id: i64,
        id: i64,
        audit: Audit,
    ) -> Result<Option<AddressBook>, RepositoryError> {
        self.call("set_default_address", move |conn| {
            let tx = conn.transaction().map_err(sql_err("set_default_address"))?;
            if address_of(&tx, user_id, id)?.is_none() {
                return Ok(None);
            }
            tx.execute(
                "UPDATE address_book SET is_default = 0 WHERE user_id = ?1 AND is_default <> 0",
                params![user_id],
            )
            .map_err(sql_err("set_default_address"))?;
            tx.execute(
                "UPDATE address_book SET is_default = 1, update_time = ?3, update_user = ?4
                 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id, audit.at, audit.by],
            )
            .map_err(sql_err("set_default_address"))?;
            let updated = address_of(&tx, user_id, id)?;
            tx.commit().map_err(sql_err("set_default_address"))?;
            Ok(updated)
        })
        .await
    }

    pub async fn update_address(
        &self,
        user_id: i64,
        update: AddressUpdate,
        audit: Audit,
    ) -> Result<bool, RepositoryError> {
        self.call("update_address", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE address_book SET
                        consignee = COALESCE(?3, consignee),
                        sex = COALESCE(?4, sex),
                        phone = COALESCE(?5, phone),
                        province_code = COALESCE(?6, province_code),
                        province_name = COALESCE(?7, province_name),
                        city_code = COALESCE(?8, city_code),
                        city_name = COALESCE(?9, city_name),
                        district_code = COALESCE(?10, district_code),
                        district_name = COALESCE(?11, district_name),
                        detail = COALESCE(?12, detail),
                        label = COALESCE(?13, label),
                        update_time = ?14,
                        update_user = ?15
                     WHERE id = ?1 AND user_id = ?2",
                    params![
                        update.id,
                        user_id,
                        update.consignee,
                        update.sex,
                        update.phone,
                        update.province_code,
                        update.province_name,
                        update.city_code,
                        update.city_name,
                        update.district_code,
                        update.district_name,
                        update.detail,
                        update.label,
                        audit.at,
                        audit.by,
                    ],
                )
                .map_err(sql_err("update_address"))?;
            Ok(changed > 0)
        })
        .await
    }

    /// Delete several of the user's addresses. Nothing is deleted unless all
    /// of them exist.
    pub async fn delete_addresses(
        &self,
        user_id: i64,
        mut ids: Vec<i64>,
    ) -> Result<(), RepositoryError> {
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(RepositoryError::rejected("Address not found"));
        }
        self.call("delete_addresses", move |conn| {
            let tx = conn.transaction().map_err(sql_err("delete_addresses"))?;
            let mut values: Vec<Value> = vec![user_id.into()];
            values.extend(id_values(&ids));
            let deleted = tx
                .execute(
                    &format!(
                        "DELETE FROM address_book WHERE user_id = ? AND id IN ({})",
                        placeholders(ids.len())
                    ),
                    params_from_iter(values),
                )
                .map_err(sql_err("delete_addresses"))?;
            if deleted != ids.len() {
                // Dropping the transaction rolls the partial delete back.
                return Err(RepositoryError::rejected("Address not found"));
            }
            tx.commit().map_err(sql_err("delete_addresses"))
        })
        .await
    }
}
