pub mod audit;
pub mod cache_keys;
pub mod dto;
pub mod entity;
pub mod id;
pub mod order;
pub mod password;
pub mod path_match;
pub mod response;
pub mod serde_ext;
pub mod status;
pub mod verification;

pub use audit::Audit;
pub use dto::*;
pub use entity::*;
pub use id::{parse_id_list, IdGenerator};
pub use response::{Page, R};
