//! Audit columns shared by every catalog and admin table.

use chrono::{Local, NaiveDateTime, Timelike};

/// Who is writing, and when.
///
/// Built once per request from the logged-in identity and handed to every
/// repository write, which stamps `create_*`/`update_*` columns from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Audit {
    pub at: NaiveDateTime,
    pub by: Option<i64>,
}

impl Audit {
    pub fn now(by: Option<i64>) -> Self {
        Self { at: now(), by }
    }

    /// Stamp for writes made outside any request (CLI, bootstrap).
    pub fn system() -> Self {
        Self::now(None)
    }
}

/// Current local time truncated to whole seconds, matching the wire format.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
