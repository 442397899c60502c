//! End-to-end tests driving the full router: sessions, the login filter and
//! every handler, against an in-memory database and cache.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use reggie_core::audit::now;
use reggie_core::cache_keys;
use reggie_core::status::{CATEGORY_DISH, DISABLED, ENABLED};
use reggie_core::{Category, Dish, User};
use reggie_server::cache::InMemoryCache;
use reggie_server::notify::NotifyError;
use reggie_server::{build_router, AppState, Cache, CodeSender, Config, Database};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// Records codes instead of mailing them.
#[derive(Default)]
struct CapturingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingSender {
    fn last_code_for(&self, recipient: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == recipient)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl CodeSender for CapturingSender {
    async fn send_code(&self, recipient: &str, code: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), code.to_string()));
        Ok(())
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    mailer: Arc<CapturingSender>,
    _dir: TempDir,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

impl Reply {
    fn code(&self) -> i64 {
        self.body["code"].as_i64().unwrap_or(-1)
    }

    fn msg(&self) -> &str {
        self.body["msg"].as_str().unwrap_or("")
    }

    fn data(&self) -> &Value {
        &self.body["data"]
    }
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            port: 0,
            database_path: ":memory:".into(),
            redis_url: None,
            upload_dir: dir.path().join("uploads"),
            static_dir: None,
            session_ttl: Duration::from_secs(30 * 60),
            worker_id: 1,
            smtp: None,
            bootstrap_admin: true,
        };
        let db = Database::new_in_memory().unwrap();
        db.ensure_admin().await.unwrap();

        let mailer = Arc::new(CapturingSender::default());
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        let state = Arc::new(AppState {
            db: Arc::new(db),
            cache,
            mailer: mailer.clone(),
            config,
        });
        Self {
            router: build_router(state.clone()),
            state,
            mailer,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, cookie, bytes.to_vec())
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, cookie, bytes) = self.send(request).await;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply {
            status,
            cookie,
            body,
        }
    }

    async fn get(&self, uri: &str, cookie: &str) -> Reply {
        self.call(Method::GET, uri, Some(cookie), None).await
    }

    async fn post(&self, uri: &str, cookie: &str, body: Value) -> Reply {
        self.call(Method::POST, uri, Some(cookie), Some(body)).await
    }

    async fn put(&self, uri: &str, cookie: &str, body: Value) -> Reply {
        self.call(Method::PUT, uri, Some(cookie), Some(body)).await
    }

    async fn admin_login(&self) -> String {
        let reply = self
            .call(
                Method::POST,
                "/employee/login",
                None,
                Some(json!({"username": "admin", "password": "123456"})),
            )
            .await;
        assert_eq!(reply.code(), 1, "admin login failed: {}", reply.body);
        reply.cookie.expect("login should issue a session cookie")
    }

    async fn customer_login(&self, email: &str) -> String {
        let sent = self
            .call(Method::POST, "/user/sendMsg", None, Some(json!({"phone": email})))
            .await;
        assert_eq!(sent.code(), 1);
        let code = self.mailer.last_code_for(email).unwrap();

        let reply = self
            .call(
                Method::POST,
                "/user/login",
                None,
                Some(json!({"phone": email, "code": code})),
            )
            .await;
        assert_eq!(reply.code(), 1, "customer login failed: {}", reply.body);
        reply.cookie.expect("login should issue a session cookie")
    }

    /// Put a category with one on-sale dish straight into the database.
    async fn seed_dish(&self, name: &str, price: &str) -> (Category, Dish) {
        let at = now();
        let category = Category {
            id: self.state.db.next_id(),
            kind: CATEGORY_DISH,
            name: format!("{} category", name),
            sort: 1,
            create_time: at,
            update_time: at,
            create_user: None,
            update_user: None,
        };
        self.state.db.insert_category(category.clone()).await.unwrap();
        let dish = Dish {
            id: self.state.db.next_id(),
            name: name.to_string(),
            category_id: category.id,
            price: price.parse::<Decimal>().unwrap(),
            code: String::new(),
            image: format!("{}.jpg", name),
            description: None,
            status: ENABLED,
            sort: 0,
            create_time: at,
            update_time: at,
            create_user: None,
            update_user: None,
        };
        self.state.db.insert_dish(dish.clone(), vec![]).await.unwrap();
        (category, dish)
    }
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Session & login filter
// =============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let reply = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "healthy");
    assert_eq!(reply.body["service"], "reggie");
    assert!(reply.cookie.is_none());
}

#[tokio::test]
async fn test_protected_route_requires_login() {
    let app = TestApp::new().await;
    for uri in ["/employee/page", "/shoppingCart/list", "/order/userPage"] {
        let reply = app.call(Method::GET, uri, None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.code(), 0);
        assert_eq!(reply.msg(), "NOTLOGIN");
    }

    let forged = app
        .get("/employee/page", "REGGIE_SESSION=67e55044-10b1-426f-9247-bb680e5fe0c8")
        .await;
    assert_eq!(forged.msg(), "NOTLOGIN");
}

#[tokio::test]
async fn test_employee_login_failures() {
    let app = TestApp::new().await;
    let wrong = app
        .call(
            Method::POST,
            "/employee/login",
            None,
            Some(json!({"username": "admin", "password": "nope"})),
        )
        .await;
    assert_eq!(wrong.msg(), "Incorrect password");
    assert!(wrong.cookie.is_none());

    let unknown = app
        .call(
            Method::POST,
            "/employee/login",
            None,
            Some(json!({"username": "ghost", "password": "123456"})),
        )
        .await;
    assert_eq!(unknown.msg(), "Login failed");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/employee/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\":"))
        .unwrap();
    let (status, _, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 0);
}

#[tokio::test]
async fn test_admin_session_and_logout() {
    let app = TestApp::new().await;
    let cookie = app.admin_login().await;

    let page = app.get("/employee/page?page=1&pageSize=10", &cookie).await;
    assert_eq!(page.code(), 1);
    assert_eq!(page.data()["total"], 1);
    let admin = &page.data()["records"][0];
    assert_eq!(admin["username"], "admin");
    assert!(admin.get("password").is_none());

    let logout = app.post("/employee/logout", &cookie, json!({})).await;
    assert_eq!(logout.code(), 1);
    let after = app.get("/employee/page", &cookie).await;
    assert_eq!(after.msg(), "NOTLOGIN");
}

#[tokio::test]
async fn test_customers_are_kept_out_of_the_console() {
    let app = TestApp::new().await;
    let (category, _) = app.seed_dish("Dumplings", "9").await;
    let cookie = app.customer_login("diner@example.com").await;

    let create = app
        .post(
            "/employee",
            &cookie,
            json!({
                "username": "intruder",
                "name": "Intruder",
                "phone": "13900000009",
                "sex": "1",
                "idNumber": "110101199001010099"
            }),
        )
        .await;
    assert_eq!(create.msg(), "NOTLOGIN");
    assert!(app
        .state
        .db
        .employee_by_username("intruder".to_string())
        .await
        .unwrap()
        .is_none());

    for uri in ["/employee/page", "/category/page", "/dish/page", "/setmeal/page", "/order/page"] {
        assert_eq!(app.get(uri, &cookie).await.msg(), "NOTLOGIN", "{}", uri);
    }
    let category_write = app
        .post("/category", &cookie, json!({"type": 1, "name": "Mine", "sort": 1}))
        .await;
    assert_eq!(category_write.msg(), "NOTLOGIN");

    // The storefront reads stay open to customers.
    let menu = app
        .get(&format!("/dish/list?categoryId={}", category.id), &cookie)
        .await;
    assert_eq!(menu.code(), 1);
    assert_eq!(menu.data().as_array().unwrap().len(), 1);
    assert_eq!(app.get("/category/list", &cookie).await.code(), 1);
    assert_eq!(app.get("/setmeal/list", &cookie).await.code(), 1);
}

// =============================================================================
// Employees
// =============================================================================

#[tokio::test]
async fn test_employee_crud() {
    let app = TestApp::new().await;
    let cookie = app.admin_login().await;
    let form = json!({
        "username": "zhangsan",
        "name": "Zhang San",
        "phone": "13900000001",
        "sex": "1",
        "idNumber": "110101199001010011"
    });

    assert_eq!(app.post("/employee", &cookie, form.clone()).await.code(), 1);
    let duplicate = app.post("/employee", &cookie, form).await;
    assert_eq!(duplicate.msg(), "Username zhangsan already exists");

    let page = app.get("/employee/page?name=Zhang", &cookie).await;
    assert_eq!(page.data()["total"], 1);
    let id = id_of(&page.data()["records"][0]);

    let found = app.get(&format!("/employee/{}", id), &cookie).await;
    assert_eq!(found.data()["name"], "Zhang San");
    assert_eq!(found.data()["status"], 1);

    let disabled = app
        .put("/employee", &cookie, json!({"id": id, "status": 0}))
        .await;
    assert_eq!(disabled.code(), 1);
    let found = app.get(&format!("/employee/{}", id), &cookie).await;
    assert_eq!(found.data()["status"], 0);
    assert_eq!(found.data()["phone"], "13900000001");

    let login = app
        .call(
            Method::POST,
            "/employee/login",
            None,
            Some(json!({"username": "zhangsan", "password": "123456"})),
        )
        .await;
    assert_eq!(login.msg(), "Account disabled");

    let missing = app.get("/employee/1", &cookie).await;
    assert_eq!(missing.msg(), "Employee not found");
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_category_and_dish_flow() {
    let app = TestApp::new().await;
    let cookie = app.admin_login().await;

    let created = app
        .post("/category", &cookie, json!({"type": 1, "name": "Sichuan", "sort": 1}))
        .await;
    assert_eq!(created.code(), 1);
    let categories = app.get("/category/list?type=1", &cookie).await;
    let category_id = id_of(&categories.data()[0]);

    let dish = json!({
        "name": "Mapo Tofu",
        "categoryId": category_id,
        "price": 18.5,
        "code": "",
        "image": "tofu.jpg",
        "description": "spicy",
        "status": 1,
        "flavors": [{"name": "Spice", "value": "[\"mild\",\"hot\"]"}]
    });
    assert_eq!(app.post("/dish", &cookie, dish).await.code(), 1);

    let list_uri = format!("/dish/list?categoryId={}&status=1", category_id);
    let listed = app.get(&list_uri, &cookie).await;
    assert_eq!(listed.data().as_array().unwrap().len(), 1);
    assert_eq!(listed.data()[0]["categoryName"], "Sichuan");
    assert_eq!(listed.data()[0]["flavors"][0]["name"], "Spice");

    let key = format!("dish_{}_1", category_id);
    assert!(app.state.cache.get(&key).await.unwrap().is_some());

    let second = json!({
        "name": "Twice Cooked Pork",
        "categoryId": category_id,
        "price": 32,
        "image": "pork.jpg",
        "flavors": []
    });
    assert_eq!(app.post("/dish", &cookie, second).await.code(), 1);
    assert!(app.state.cache.get(&key).await.unwrap().is_none());
    let listed = app.get(&list_uri, &cookie).await;
    assert_eq!(listed.data().as_array().unwrap().len(), 2);

    let blocked = app
        .call(
            Method::DELETE,
            &format!("/category?id={}", category_id),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(blocked.msg(), "Category has dishes attached");

    let dish_id = id_of(&listed.data()[0]);
    let on_sale = app
        .call(
            Method::DELETE,
            &format!("/dish?ids={}", dish_id),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(on_sale.msg(), "Cannot delete dishes that are on sale");

    let stopped = app
        .post(&format!("/dish/status/0?ids={}", dish_id), &cookie, json!({}))
        .await;
    assert_eq!(stopped.code(), 1);
    let listed = app.get(&list_uri, &cookie).await;
    assert_eq!(listed.data().as_array().unwrap().len(), 1);

    let bad_status = app
        .post(&format!("/dish/status/7?ids={}", dish_id), &cookie, json!({}))
        .await;
    assert_eq!(bad_status.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_moving_a_dish_evicts_both_categories() {
    let app = TestApp::new().await;
    let cookie = app.admin_login().await;
    let (soups, soup) = app.seed_dish("Soup", "8").await;
    let (mains, _) = app.seed_dish("Fish", "48").await;

    let old_uri = format!("/dish/list?categoryId={}", soups.id);
    let new_uri = format!("/dish/list?categoryId={}", mains.id);
    app.get(&old_uri, &cookie).await;
    app.get(&new_uri, &cookie).await;
    app.get("/dish/list", &cookie).await;

    let old_key = cache_keys::dish_list(Some(soups.id));
    let new_key = cache_keys::dish_list(Some(mains.id));
    let all_key = cache_keys::dish_list(None);
    for key in [&old_key, &new_key, &all_key] {
        assert!(app.state.cache.get(key).await.unwrap().is_some(), "{}", key);
    }

    let moved = app
        .put(
            "/dish",
            &cookie,
            json!({
                "id": soup.id.to_string(),
                "name": "Soup",
                "categoryId": mains.id.to_string(),
                "price": 8,
                "image": "Soup.jpg",
                "flavors": []
            }),
        )
        .await;
    assert_eq!(moved.code(), 1, "update failed: {}", moved.body);

    for key in [&old_key, &new_key, &all_key] {
        assert!(app.state.cache.get(key).await.unwrap().is_none(), "{}", key);
    }
    assert!(app
        .get(&old_uri, &cookie)
        .await
        .data()
        .as_array()
        .unwrap()
        .is_empty());
    assert_eq!(
        app.get(&new_uri, &cookie)
            .await
            .data()
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_setmeal_list_cache_is_evicted_on_write() {
    let app = TestApp::new().await;
    let cookie = app.admin_login().await;
    let (_, rice) = app.seed_dish("Rice", "2").await;

    app.post("/category", &cookie, json!({"type": 2, "name": "Sets", "sort": 1}))
        .await;
    let categories = app.get("/category/list?type=2", &cookie).await;
    let category_id = id_of(&categories.data()[0]);

    let setmeal = json!({
        "categoryId": category_id,
        "name": "Lunch set",
        "price": 25,
        "status": 1,
        "image": "lunch.jpg",
        "setmealDishes": [
            {"dishId": rice.id.to_string(), "name": "Rice", "price": 2, "copies": 2}
        ]
    });
    assert_eq!(app.post("/setmeal", &cookie, setmeal).await.code(), 1);

    let list_uri = format!("/setmeal/list?categoryId={}&status=1", category_id);
    let listed = app.get(&list_uri, &cookie).await;
    assert_eq!(listed.data().as_array().unwrap().len(), 1);
    let key = format!("setmealCache::{}_1", category_id);
    assert!(app.state.cache.get(&key).await.unwrap().is_some());

    let setmeal_id = id_of(&listed.data()[0]);
    let dishes = app.get(&format!("/setmeal/dish/{}", setmeal_id), &cookie).await;
    assert_eq!(dishes.data()[0]["copies"], 2);
    assert_eq!(dishes.data()[0]["image"], "Rice.jpg");

    let refused = app
        .call(
            Method::DELETE,
            &format!("/setmeal?ids={}", setmeal_id),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(
        refused.msg(),
        "Set meal is on sale, stop selling it before deleting"
    );

    app.post(&format!("/setmeal/status/0?ids={}", setmeal_id), &cookie, json!({}))
        .await;
    assert!(app.state.cache.get(&key).await.unwrap().is_none());
    let listed = app.get(&list_uri, &cookie).await;
    assert!(listed.data().as_array().unwrap().is_empty());
}

// =============================================================================
// Customer journey
// =============================================================================

#[tokio::test]
async fn test_customer_code_login() {
    let app = TestApp::new().await;

    let empty = app
        .call(Method::POST, "/user/sendMsg", None, Some(json!({"phone": ""})))
        .await;
    assert_eq!(empty.msg(), "Failed to send verification code");

    app.call(
        Method::POST,
        "/user/sendMsg",
        None,
        Some(json!({"phone": "diner@example.com"})),
    )
    .await;
    let wrong = app
        .call(
            Method::POST,
            "/user/login",
            None,
            Some(json!({"phone": "diner@example.com", "code": "00000"})),
        )
        .await;
    assert_eq!(wrong.msg(), "Login failed");

    let cookie = app.customer_login("diner@example.com").await;
    let user = app
        .state
        .db
        .user_by_phone("diner@example.com".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.status, 1);
    assert!(app
        .state
        .cache
        .get(&cache_keys::login_code("diner@example.com"))
        .await
        .unwrap()
        .is_none());

    let cart = app.get("/shoppingCart/list", &cookie).await;
    assert_eq!(cart.code(), 1);

    app.post("/user/loginout", &cookie, json!({})).await;
    assert_eq!(app.get("/shoppingCart/list", &cookie).await.msg(), "NOTLOGIN");
}

#[tokio::test]
async fn test_disabled_customer_cannot_log_in() {
    let app = TestApp::new().await;
    app.state
        .db
        .insert_user(User {
            id: app.state.db.next_id(),
            name: None,
            phone: "banned@example.com".to_string(),
            sex: None,
            id_number: None,
            avatar: None,
            status: DISABLED,
        })
        .await
        .unwrap();

    app.call(
        Method::POST,
        "/user/sendMsg",
        None,
        Some(json!({"phone": "banned@example.com"})),
    )
    .await;
    let code = app.mailer.last_code_for("banned@example.com").unwrap();
    let reply = app
        .call(
            Method::POST,
            "/user/login",
            None,
            Some(json!({"phone": "banned@example.com", "code": code})),
        )
        .await;
    assert_eq!(reply.code(), 0);
    assert_eq!(reply.msg(), "Account disabled");
    assert!(reply.cookie.is_none());
}

#[tokio::test]
async fn test_address_case_does_not_split_accounts() {
    let app = TestApp::new().await;
    let first = app
        .call(
            Method::POST,
            "/user/sendMsg",
            None,
            Some(json!({"phone": " Diner@Example.com"})),
        )
        .await;
    assert_eq!(first.code(), 1);
    let code = app.mailer.last_code_for("diner@example.com").unwrap();
    let upper = app
        .call(
            Method::POST,
            "/user/login",
            None,
            Some(json!({"phone": "DINER@EXAMPLE.COM", "code": code})),
        )
        .await;
    assert_eq!(upper.code(), 1, "login failed: {}", upper.body);
    assert_eq!(upper.data()["phone"], "diner@example.com");

    app.customer_login("diner@example.com").await;
    let user = app
        .state
        .db
        .user_by_phone("diner@example.com".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(upper.data()["id"], user.id.to_string());
    assert!(app
        .state
        .db
        .user_by_phone("DINER@EXAMPLE.COM".to_string())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_cart_checkout_and_reorder() {
    let app = TestApp::new().await;
    let (_, noodles) = app.seed_dish("Noodles", "12.50").await;
    let cookie = app.customer_login("hungry@example.com").await;

    let address = app
        .post(
            "/addressBook",
            &cookie,
            json!({
                "consignee": "Li Si",
                "sex": "0",
                "phone": "13700000000",
                "provinceName": "Zhejiang",
                "cityName": "Hangzhou",
                "districtName": "Xihu",
                "detail": " No.8 Lane",
                "label": "home"
            }),
        )
        .await;
    let address_id = id_of(address.data());

    assert_eq!(
        app.get("/addressBook/default", &cookie).await.msg(),
        "No default address"
    );
    let default = app
        .put("/addressBook/default", &cookie, json!({"id": address_id}))
        .await;
    assert_eq!(default.data()["isDefault"], 1);
    assert_eq!(
        id_of(app.get("/addressBook/default", &cookie).await.data()),
        address_id
    );

    let item = json!({
        "name": "Noodles",
        "image": "Noodles.jpg",
        "dishId": noodles.id.to_string(),
        "dishFlavor": "hot",
        "amount": 12.5
    });
    app.post("/shoppingCart/add", &cookie, item.clone()).await;
    let added = app.post("/shoppingCart/add", &cookie, item).await;
    assert_eq!(added.data()["number"], 2);

    let empty_sub = app.post("/shoppingCart/sub", &cookie, json!({})).await;
    assert_eq!(empty_sub.msg(), "Item not found in cart");

    let order = app
        .post(
            "/order/submit",
            &cookie,
            json!({"addressBookId": address_id, "payMethod": 1, "remark": ""}),
        )
        .await;
    assert_eq!(order.code(), 1, "submit failed: {}", order.body);
    assert_eq!(order.data()["amount"].as_f64(), Some(25.0));
    assert_eq!(order.data()["status"], 2);
    assert_eq!(order.data()["address"], "ZhejiangHangzhouXihu No.8 Lane");
    let order_id = id_of(order.data());

    let cart = app.get("/shoppingCart/list", &cookie).await;
    assert!(cart.data().as_array().unwrap().is_empty());

    let again_empty = app
        .post(
            "/order/submit",
            &cookie,
            json!({"addressBookId": address_id}),
        )
        .await;
    assert_eq!(again_empty.msg(), "Shopping cart is empty");

    let history = app.get("/order/userPage?page=1&pageSize=5", &cookie).await;
    assert_eq!(history.data()["total"], 1);
    assert_eq!(history.data()["records"][0]["sumNum"], 2);
    assert_eq!(
        history.data()["records"][0]["orderDetails"][0]["dishFlavor"],
        "hot"
    );

    let reorder = app.post("/order/again", &cookie, json!({"id": order_id})).await;
    assert_eq!(reorder.code(), 1);
    let cart = app.get("/shoppingCart/list", &cookie).await;
    assert_eq!(cart.data()[0]["number"], 2);

    let sub = app
        .post(
            "/shoppingCart/sub",
            &cookie,
            json!({"dishId": noodles.id.to_string()}),
        )
        .await;
    assert_eq!(sub.data()["number"], 1);

    let own_dispatch = app
        .put("/order", &cookie, json!({"id": order_id, "status": 3}))
        .await;
    assert_eq!(own_dispatch.msg(), "NOTLOGIN");

    let admin = app.admin_login().await;
    let bad_status = app
        .put("/order", &admin, json!({"id": order_id, "status": 9}))
        .await;
    assert_eq!(bad_status.status, StatusCode::BAD_REQUEST);
    let delivering = app
        .put("/order", &admin, json!({"id": order_id, "status": 3}))
        .await;
    assert_eq!(delivering.code(), 1);
    let history = app.get("/order/userPage", &cookie).await;
    assert_eq!(history.data()["records"][0]["status"], 3);
}

#[tokio::test]
async fn test_addresses_are_private() {
    let app = TestApp::new().await;
    let owner = app.customer_login("owner@example.com").await;
    let other = app.customer_login("other@example.com").await;

    let address = app
        .post(
            "/addressBook",
            &owner,
            json!({"consignee": "Owner", "sex": "1", "phone": "13600000000"}),
        )
        .await;
    let address_id = id_of(address.data());

    let peek = app.get(&format!("/addressBook/{}", address_id), &other).await;
    assert_eq!(peek.msg(), "Address not found");
    assert!(app
        .get("/addressBook/list", &other)
        .await
        .data()
        .as_array()
        .unwrap()
        .is_empty());

    let removed = app
        .call(
            Method::DELETE,
            &format!("/addressBook?ids={}", address_id),
            Some(&other),
            None,
        )
        .await;
    assert_eq!(removed.msg(), "Address not found");
    assert_eq!(
        app.get("/addressBook/list", &owner)
            .await
            .data()
            .as_array()
            .unwrap()
            .len(),
        1
    );
}

// =============================================================================
// Files
// =============================================================================

#[tokio::test]
async fn test_upload_then_download() {
    let app = TestApp::new().await;
    let boundary = "reggieboundary";
    let payload = b"\xff\xd8\xff\xe0fake-jpeg";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"tofu.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/common/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, _, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let reply: Value = serde_json::from_slice(&bytes).unwrap();
    let name = reply["data"].as_str().unwrap().to_string();
    assert!(name.ends_with(".jpg"));

    let request = Request::builder()
        .uri(format!("/common/download?name={}", name))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let downloaded = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&downloaded[..], &payload[..]);
}

#[tokio::test]
async fn test_download_rejects_bad_names() {
    let app = TestApp::new().await;
    let traversal = app
        .call(Method::GET, "/common/download?name=..%2Fsecret", None, None)
        .await;
    assert_eq!(traversal.status, StatusCode::BAD_REQUEST);

    let missing = app
        .call(Method::GET, "/common/download?name=nothing.jpg", None, None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}
