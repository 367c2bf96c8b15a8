//! End-to-end tests driving the router over a real socket

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use common::database::init_memory_pool;
use library::{
    AppState,
    config::ServerConfig,
    middleware::{access_log, catch_panic},
    password::Argon2Hasher,
    routes::create_router,
    session::MemorySessionStore,
};
use reqwest::{
    Client, StatusCode,
    header::{COOKIE, LOCATION, SET_COOKIE},
    multipart::{Form, Part},
};
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestApp {
    base: String,
    client: Client,
    upload_dir: TempDir,
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    format!("http://{}", addr)
}

fn client() -> Client {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn spawn_app() -> TestApp {
    let pool = init_memory_pool().await.expect("Failed to open database");
    let upload_dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        upload_dir: upload_dir.path().to_path_buf(),
        ..ServerConfig::default()
    };

    let state = AppState::new(
        pool,
        Arc::new(Argon2Hasher::with_params(1024, 1, 1).unwrap()),
        Arc::new(MemorySessionStore::new()),
        config,
    );
    state.uploads.ensure_dirs().await.unwrap();

    TestApp {
        base: serve(create_router(state)).await,
        client: client(),
        upload_dir,
    }
}

/// `session_id=<token>` from a response's Set-Cookie headers
fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("session_id="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn register(&self, username: &str) -> String {
        let email = format!("{}@x.com", username);
        let response = self
            .client
            .post(self.url("/register"))
            .form(&[
                ("username", username),
                ("email", email.as_str()),
                ("password", "pw1"),
            ])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        session_cookie(&response).expect("register sets a session cookie")
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        request.send().await.unwrap()
    }

    async fn post_form(&self, path: &str, cookie: Option<&str>, form: &[(&str, &str)]) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).form(form);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        request.send().await.unwrap()
    }

    async fn upload(&self, cookie: &str, title: &str, tags: &str, content: &str) -> reqwest::Response {
        let form = Form::new()
            .text("title", title.to_string())
            .text("author", "Ann Author")
            .text("description", "A test book")
            .text("tags", tags.to_string())
            .part(
                "book_file",
                Part::bytes(content.as_bytes().to_vec()).file_name(format!("{}.txt", title)),
            );

        self.client
            .post(self.url("/upload"))
            .header(COOKIE, cookie)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_register_login_upload_and_search() {
    let app = spawn_app().await;
    app.register("alice").await;

    let response = app.login("alice", "pw1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&response).expect("login sets a session cookie");

    let response = app.upload(&cookie, "Foo", "sci-fi,drama", "Once upon a time").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile");

    let by_tag = app.get("/search?tags=sci-fi", None).await.text().await.unwrap();
    assert!(by_tag.contains(r#"href="/books/1""#));

    let by_title = app.get("/search?q=Foo", None).await.text().await.unwrap();
    assert!(by_title.contains(r#"href="/books/1""#));

    let miss = app.get("/search?q=bar", None).await.text().await.unwrap();
    assert!(!miss.contains(r#"href="/books/"#));
    assert!(miss.contains("No books found."));

    let reading = app.get("/books/1/read", None).await.text().await.unwrap();
    assert!(reading.contains("Once upon a time"));

    let download = app.get("/books/1/download", None).await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.bytes().await.unwrap().as_ref(), b"Once upon a time");

    assert!(app.upload_dir.path().join("uploads").join("1_Foo.txt").exists());
}

#[tokio::test]
async fn test_protected_routes_redirect_to_login() {
    let app = spawn_app().await;

    for path in ["/upload", "/profile", "/edit-profile", "/books/1/edit"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
        assert_eq!(location(&response), "/login", "{}", path);
    }

    let response = app
        .get("/profile", Some("session_id=00000000000000000000000000000000"))
        .await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let app = spawn_app().await;
    let cookie = app.register("alice").await;

    let response = app.get("/profile", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("alice@x.com"));

    let response = app.post_form("/logout", Some(&cookie), &[]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(session_cookie(&response).as_deref(), Some("session_id="));

    let response = app.get("/profile", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_bad_credentials_are_unauthorized() {
    let app = spawn_app().await;
    app.register("alice").await;

    let response = app.login("alice", "wrong").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&response).is_none());

    let response = app.login("nobody", "pw1").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let app = spawn_app().await;
    app.register("alice").await;

    let response = app
        .post_form(
            "/register",
            None,
            &[("username", "alice"), ("email", "other@x.com"), ("password", "pw1")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_auth_pages_redirect_signed_in_users() {
    let app = spawn_app().await;
    let cookie = app.register("alice").await;

    for path in ["/login", "/register"] {
        let response = app.get(path, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_ratings_from_two_users_average() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let carol = app.register("carol").await;

    app.upload(&alice, "Foo", "", "text").await;

    let response = app.post_form("/books/1/rate", Some(&bob), &[("rating", "4")]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/books/1");
    app.post_form("/books/1/rate", Some(&carol), &[("rating", "2")]).await;

    let page = app.get("/books/1", Some(&bob)).await.text().await.unwrap();
    assert!(page.contains("Rating: 3.0 from 2 ratings"));
    assert!(page.contains(r#"<option value="4" selected>"#));
}

#[tokio::test]
async fn test_unfiltered_search_honours_sort_order() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    app.upload(&alice, "Older", "", "first").await;
    app.upload(&alice, "Newer", "", "second").await;
    app.post_form("/books/1/rate", Some(&bob), &[("rating", "5")]).await;

    let newest = app.get("/search", None).await.text().await.unwrap();
    let older = newest.find(r#"href="/books/1""#).unwrap();
    let newer = newest.find(r#"href="/books/2""#).unwrap();
    assert!(newer < older);

    let by_rating = app.get("/search?sort=rating", None).await.text().await.unwrap();
    let older = by_rating.find(r#"href="/books/1""#).unwrap();
    let newer = by_rating.find(r#"href="/books/2""#).unwrap();
    assert!(older < newer);
}

#[tokio::test]
async fn test_rating_requires_session_and_valid_value() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;
    app.upload(&alice, "Foo", "", "text").await;

    let response = app.post_form("/books/1/rate", None, &[("rating", "4")]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    for rating in ["0", "6", "five"] {
        let response = app
            .post_form("/books/1/rate", Some(&alice), &[("rating", rating)])
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", rating);
    }

    let response = app
        .post_form("/books/99/rate", Some(&alice), &[("rating", "3")])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_owner_can_edit_or_delete() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    app.upload(&alice, "Foo", "", "original").await;

    let response = app.post_form("/books/1/delete", Some(&bob), &[]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/books/1/edit", Some(&bob)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_form(
            "/books/1/update",
            Some(&alice),
            &[
                ("title", "Foo Revised"),
                ("author", "Ann Author"),
                ("tags", "classic"),
                ("content", "rewritten"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let page = app.get("/books/1", None).await.text().await.unwrap();
    assert!(page.contains("Foo Revised"));
    let reading = app.get("/books/1/read", None).await.text().await.unwrap();
    assert!(reading.contains("rewritten"));

    let stored = app.upload_dir.path().join("uploads").join("1_Foo.txt");
    assert!(stored.exists());

    let response = app.post_form("/books/1/delete", Some(&alice), &[]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile");
    assert!(!stored.exists());

    let response = app.get("/books/1", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_changes_need_current_password() {
    let app = spawn_app().await;
    let cookie = app.register("alice").await;

    let form = Form::new()
        .text("username", "alicia")
        .text("email", "alice@x.com")
        .text("current_password", "wrong")
        .text("new_password", "");
    let response = app
        .client
        .post(app.url("/update-profile"))
        .header(COOKIE, &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let form = Form::new()
        .text("username", "alicia")
        .text("email", "alice@x.com")
        .text("current_password", "pw1")
        .text("new_password", "")
        .part(
            "avatar",
            Part::bytes(vec![0x89, b'P', b'N', b'G']).file_name("me.png"),
        );
    let response = app
        .client
        .post(app.url("/update-profile"))
        .header(COOKIE, &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let profile = app.get("/profile", Some(&cookie)).await.text().await.unwrap();
    assert!(profile.contains("alicia"));

    let avatar = app.get("/users/1/avatar", None).await;
    assert_eq!(avatar.status(), StatusCode::OK);
    assert_eq!(avatar.headers()["content-type"], "image/png");
}

#[tokio::test]
async fn test_malformed_book_id_is_bad_request() {
    let app = spawn_app().await;

    assert_eq!(app.get("/books/abc", None).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.get("/books/42", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;

    let body: serde_json::Value = app.get("/health", None).await.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_panicking_handler_becomes_server_error() {
    let app = Router::new()
        .route("/boom", get(|| async { panic!("boom") as () }))
        .route("/ok", get(|| async { "ok" }))
        .layer(middleware::from_fn(catch_panic))
        .layer(middleware::from_fn(access_log));
    let base = serve(app).await;
    let client = client();

    let response = client.get(format!("{}/boom", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = client.get(format!("{}/ok", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}
