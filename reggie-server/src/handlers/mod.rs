//! REST handlers, one module per resource. Each module exposes a `router()`
//! carrying its full paths so `build_router` only has to merge them.

pub mod address_book;
pub mod category;
pub mod common;
pub mod dish;
pub mod employee;
pub mod order;
pub mod setmeal;
pub mod shopping_cart;
pub mod user;

use reggie_core::response::PageRequest;
use reggie_core::{parse_id_list, Audit};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiError;

/// `?page=1&pageSize=10&name=...`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub name: Option<String>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

/// `?ids=1,2,3`
#[derive(Debug, Deserialize)]
pub struct IdsQuery {
    #[serde(default)]
    pub ids: String,
}

impl IdsQuery {
    pub fn parse(&self) -> Result<Vec<i64>, ApiError> {
        let ids = parse_id_list(&self.ids).map_err(ApiError::BadRequest)?;
        if ids.is_empty() {
            return Err(ApiError::BadRequest("ids must not be empty".to_string()));
        }
        Ok(ids)
    }
}

/// Audit stamp for a write made by the caller.
pub fn audit(current: &CurrentUser) -> Audit {
    Audit::now(Some(current.id()))
}
