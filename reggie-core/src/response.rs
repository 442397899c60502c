//! Response envelope and pagination shapes expected by the web console.

use serde::Serialize;

/// Uniform JSON envelope: `code` 1 on success, 0 on failure.
#[derive(Debug, Clone, Serialize)]
pub struct R<T> {
    pub code: i32,
    pub msg: Option<String>,
    pub data: Option<T>,
    pub map: serde_json::Map<String, serde_json::Value>,
}

impl<T> R<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 1,
            msg: None,
            data: Some(data),
            map: serde_json::Map::new(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            code: 0,
            msg: Some(msg.into()),
            data: None,
            map: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.map.insert(key.into(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == 1
    }
}

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 500;

/// Page request after defaults and bounds are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
            page_size: page_size
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .min(MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub size: u64,
    pub current: u64,
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn new(records: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            records,
            total,
            size: request.page_size,
            current: request.page,
            pages: total.div_ceil(request.page_size),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            records: self.records.into_iter().map(f).collect(),
            total: self.total,
            size: self.size,
            current: self.current,
            pages: self.pages,
        }
    }
}
