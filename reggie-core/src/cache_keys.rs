//! Cache key layout.
//!
//! Dish menus are cached per category under `dish_{category}_1`; only on-sale
//! dishes are ever listed so the status suffix is fixed. Set meal menus live
//! under the `setmealCache::` namespace and are evicted as a whole.

use std::time::Duration;

pub const MENU_TTL: Duration = Duration::from_secs(60 * 60);
pub const CODE_TTL: Duration = Duration::from_secs(5 * 60);

pub const SETMEAL_NAMESPACE: &str = "setmealCache::";
const SESSION_PREFIX: &str = "session:";
const CODE_PREFIX: &str = "login_code:";

fn segment(id: Option<i64>) -> String {
    id.map_or_else(|| "null".to_string(), |id| id.to_string())
}

pub fn dish_list(category_id: Option<i64>) -> String {
    format!("dish_{}_1", segment(category_id))
}

/// Keys to drop after dishes of `category_id` change.
pub fn dish_evictions(category_id: i64) -> [String; 2] {
    [dish_list(Some(category_id)), dish_list(None)]
}

pub fn setmeal_list(category_id: Option<i64>, status: Option<i32>) -> String {
    let status = status.map_or_else(|| "null".to_string(), |s| s.to_string());
    format!("{}{}_{}", SETMEAL_NAMESPACE, segment(category_id), status)
}

pub fn session(id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, id)
}

pub fn login_code(recipient: &str) -> String {
    format!("{}{}", CODE_PREFIX, recipient.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dish_keys() {
        assert_eq!(dish_list(Some(1397844263642378242)), "dish_1397844263642378242_1");
        assert_eq!(dish_list(None), "dish_null_1");
        assert_eq!(dish_evictions(7), ["dish_7_1".to_string(), "dish_null_1".to_string()]);
    }

    #[test]
    fn test_setmeal_keys_share_namespace() {
        let key = setmeal_list(Some(3), Some(1));
        assert_eq!(key, "setmealCache::3_1");
        assert!(setmeal_list(None, None).starts_with(SETMEAL_NAMESPACE));
    }

    #[test]
    fn test_login_code_key_normalizes_recipient() {
        assert_eq!(login_code(" Foo@Example.com "), "login_code:foo@example.com");
    }
}
