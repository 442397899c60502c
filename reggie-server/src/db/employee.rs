use reggie_core::response::PageRequest;
use reggie_core::{Audit, Employee, EmployeeUpdate, Page};
use rusqlite::{params, OptionalExtension, Row};

use super::{query_page, sql_err, Database, Filter, RepositoryError};

const COLUMNS: &str = "id, username, name, password, phone, sex, id_number, status, \
                       create_time, update_time, create_user, update_user";

fn map_employee(row: &Row) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        password: row.get(3)?,
        phone: row.get(4)?,
        sex: row.get(5)?,
        id_number: row.get(6)?,
        status: row.get(7)?,
        create_time: row.get(8)?,
        update_time: row.get(9)?,
        create_user: row.get(10)?,
        update_user: row.get(11)?,
    })
}

impl Database {
    pub async fn employee_by_username(
        &self,
        username: String,
    ) -> Result<Option<Employee>, RepositoryError> {
        self.call("employee_by_username", move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM employee WHERE username = ?1", COLUMNS),
                params![username],
                map_employee,
            )
            .optional()
            .map_err(sql_err("employee_by_username"))
        })
        .await
    }

    pub async fn employee_by_id(&self, id: i64) -> Result<Option<Employee>, RepositoryError> {
        self.call("employee_by_id", move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM employee WHERE id = ?1", COLUMNS),
                params![id],
                map_employee,
            )
            .optional()
            .map_err(sql_err("employee_by_id"))
        })
        .await
    }

    /// Fails with [`RepositoryError::Duplicate`] when the username is taken.
    pub async fn insert_employee(&self, employee: Employee) -> Result<(), RepositoryError> {
        self.call("insert_employee", move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO employee ({}) VALUES
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    COLUMNS
                ),
                params![
                    employee.id,
                    employee.username,
                    employee.name,
                    employee.password,
                    employee.phone,
                    employee.sex,
                    employee.id_number,
                    employee.status,
                    employee.create_time,
                    employee.update_time,
                    employee.create_user,
                    employee.update_user,
                ],
            )
            .map_err(sql_err("insert_employee"))?;
            Ok(())
        })
        .await
    }

    /// Apply the present fields of `update`. Returns false if no such
    /// employee exists.
    pub async fn update_employee(
        &self,
        update: EmployeeUpdate,
        audit: Audit,
    ) -> Result<bool, RepositoryError> {
        self.call("update_employee", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE employee SET
                        username = COALESCE(?2, username),
                        name = COALESCE(?3, name),
                        phone = COALESCE(?4, phone),
                        sex = COALESCE(?5, sex),
                        id_number = COALESCE(?6, id_number),
                        status = COALESCE(?7, status),
                        update_time = ?8,
                        update_user = ?9
                     WHERE id = ?1",
                    params![
                        update.id,
                        update.username,
                        update.name,
                        update.phone,
                        update.sex,
                        update.id_number,
                        update.status,
                        audit.at,
                        audit.by,
                    ],
                )
                .map_err(sql_err("update_employee"))?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn employee_page(
        &self,
        name: Option<String>,
        request: PageRequest,
    ) -> Result<Page<Employee>, RepositoryError> {
        self.call("employee_page", move |conn| {
            let filter = Filter::new().contains("name", name.as_deref());
            query_page(
                conn,
                "employee_page",
                COLUMNS,
                "employee",
                &filter,
                "update_time DESC, id DESC",
                request,
                map_employee,
            )
        })
        .await
    }

    pub async fn count_employees(&self) -> Result<u64, RepositoryError> {
        self.call("count_employees", |conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM employee", [], |row| row.get(0))
                .map_err(sql_err("count_employees"))?;
            u64::try_from(count).map_err(|_| RepositoryError::corruption("employee count"))
        })
        .await
    }
}
