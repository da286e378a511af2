use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{AppState, ad_handlers, auth_handlers, middleware as auth_middleware};

pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(|| async { "adboard API running" }))
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/logout", post(auth_handlers::logout));

    // Everything else needs a valid session cookie
    let protected_routes = Router::new()
        .route("/me", get(auth_handlers::me))
        .route("/ads", get(ad_handlers::list_ads).post(ad_handlers::create_ad))
        .route(
            "/ads/{id}",
            get(ad_handlers::get_ad)
                .put(ad_handlers::update_ad)
                .delete(ad_handlers::delete_ad),
        )
        .route("/ads/{id}/image", get(ad_handlers::get_ad_image))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ads::{AdsService, InMemoryAdRepository};
    use auth::{AuthService, InMemoryUserRepository, TokenService};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, Response, StatusCode, header},
    };
    use serde_json::{Value, json};
    use std::time::Duration;
    use storage::MemoryObjectStore;
    use tower::ServiceExt;

    const SECRET: &str = "test_secret";
    const BOUNDARY: &str = "adboard-test-boundary";

    async fn app() -> Router {
        let auth = AuthService::new(
            Arc::new(InMemoryUserRepository::new()),
            TokenService::new(SECRET, chrono::Duration::seconds(3600)),
            Duration::from_secs(30),
        );
        let ads = AdsService::new(
            Arc::new(InMemoryAdRepository::new()),
            Arc::new(MemoryObjectStore::new("ads")),
            1024,
        );
        ads.init_bucket().await.unwrap();

        router(Arc::new(AppState::new(auth, ads, 64 * 1024)))
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// `name=value` part of the Set-Cookie header, ready to send back.
    fn cookie_pair(response: &Response<Body>) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("Set-Cookie header")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn register(app: &Router, username: &str, email: &str) -> (Response<Body>, String) {
        let response = send(
            app,
            json_request(
                "/register",
                json!({"username": username, "email": email, "password": "Secret123!"}),
            ),
        )
        .await;
        let cookie = cookie_pair(&response);
        (response, cookie)
    }

    fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, data)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(method: &str, uri: &str, cookie: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn ad_fields(title: &str, price: &str) -> Vec<(&'static str, String)> {
        vec![
            ("title", title.to_string()),
            ("description", "Barely used, new tyres".to_string()),
            ("price", price.to_string()),
        ]
    }

    fn as_refs<'a>(fields: &'a [(&'static str, String)]) -> Vec<(&'static str, &'a str)> {
        fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }

    async fn create_ad(app: &Router, cookie: &str, title: &str, price: &str) -> Value {
        let fields = ad_fields(title, price);
        let body = multipart_body(&as_refs(&fields), Some(("bike.png", "image/png", &b"png-bytes"[..])));
        let response = send(app, multipart_request("POST", "/ads", cookie, body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    #[tokio::test]
    async fn test_register_sets_cookie_and_identifies_user() {
        let app = app().await;

        let (response, cookie) = register(&app, "alice", "a@x.com").await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Strict"));
        assert!(set_cookie.contains("Max-Age=3600"));

        let body = body_json(response).await;
        assert_eq!(body["username"], "alice");
        assert_eq!(body["email"], "a@x.com");
        assert!(body.get("created_at").is_some());
        assert!(body.get("password").is_none());

        let me = send(&app, get_with_cookie("/me", &cookie)).await;
        assert_eq!(me.status(), StatusCode::OK);
        let me = body_json(me).await;
        assert_eq!(me["username"], "alice");
        assert_eq!(me["id"], 1);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_and_duplicate() {
        let app = app().await;

        let response = send(
            &app,
            json_request(
                "/register",
                json!({"username": "al", "email": "nope", "password": "weak"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        register(&app, "alice", "a@x.com").await;
        let response = send(
            &app,
            json_request(
                "/register",
                json!({"username": "alice2", "email": "A@x.com", "password": "Secret123!"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "user with this email already exists");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = app().await;
        let request = Request::post("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_login() {
        let app = app().await;
        register(&app, "alice", "a@x.com").await;

        let response = send(
            &app,
            json_request("/login", json!({"email": "a@x.com", "password": "Secret123!"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = cookie_pair(&response);
        assert_eq!(body_json(response).await["message"], "logged in");

        let me = send(&app, get_with_cookie("/me", &cookie)).await;
        assert_eq!(me.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_wrong_password_sets_no_cookie() {
        let app = app().await;
        register(&app, "alice", "a@x.com").await;

        let wrong_password = send(
            &app,
            json_request("/login", json!({"email": "a@x.com", "password": "Wrong123!"})),
        )
        .await;
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert!(wrong_password.headers().get(header::SET_COOKIE).is_none());

        let unknown = send(
            &app,
            json_request("/login", json!({"email": "b@x.com", "password": "Secret123!"})),
        )
        .await;
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(body_json(wrong_password).await, body_json(unknown).await);
    }

    #[tokio::test]
    async fn test_protected_route_without_cookie() {
        let app = app().await;

        let response = send(&app, Request::get("/me").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "authentication required");

        let response = send(&app, get_with_cookie("/ads", "jwt=")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_route_with_expired_cookie() {
        let app = app().await;
        register(&app, "alice", "a@x.com").await;

        let expired = TokenService::new(SECRET, chrono::Duration::seconds(-10))
            .issue(1)
            .unwrap();
        let response = send(&app, get_with_cookie("/me", &format!("jwt={expired}"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "invalid token");
    }

    #[tokio::test]
    async fn test_protected_route_with_tampered_cookie() {
        let app = app().await;
        let (_, cookie) = register(&app, "alice", "a@x.com").await;

        let mut bytes = cookie.into_bytes();
        let first_dot = bytes.iter().position(|b| *b == b'.').unwrap();
        let i = first_dot + 5;
        bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        let response = send(&app, get_with_cookie("/me", &tampered)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "invalid token");
    }

    #[tokio::test]
    async fn test_logout_clears_cookie_but_token_stays_valid() {
        let app = app().await;
        let (_, cookie) = register(&app, "alice", "a@x.com").await;

        let logout = Request::post("/logout")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = send(&app, logout).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cleared.starts_with("jwt=;"));
        assert!(cleared.contains("Max-Age=0"));

        // Stateless tokens are not revoked; only the client copy is cleared.
        let me = send(&app, get_with_cookie("/me", &cookie)).await;
        assert_eq!(me.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_logout_without_cookie_still_clears() {
        let app = app().await;

        let response = send(&app, Request::post("/logout").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::SET_COOKIE].to_str().unwrap().starts_with("jwt=;"));
    }

    #[tokio::test]
    async fn test_ads_crud() {
        let app = app().await;
        let (_, cookie) = register(&app, "alice", "a@x.com").await;

        let ad = create_ad(&app, &cookie, "Red bike", "120.5").await;
        assert_eq!(ad["author_id"], 1);
        assert_eq!(ad["price"], 120.5);
        let id = ad["id"].as_str().unwrap().to_string();

        let fetched = send(&app, get_with_cookie(&format!("/ads/{id}"), &cookie)).await;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(body_json(fetched).await["title"], "Red bike");

        let image = send(&app, get_with_cookie(&format!("/ads/{id}/image"), &cookie)).await;
        assert_eq!(image.status(), StatusCode::OK);
        assert_eq!(image.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(image.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"png-bytes");

        let fields = ad_fields("Blue bike", "99");
        let update = multipart_request(
            "PUT",
            &format!("/ads/{id}"),
            &cookie,
            multipart_body(&as_refs(&fields), None),
        );
        let updated = send(&app, update).await;
        assert_eq!(updated.status(), StatusCode::OK);
        let updated = body_json(updated).await;
        assert_eq!(updated["title"], "Blue bike");
        assert_eq!(updated["image_key"], ad["image_key"]);

        let delete = Request::delete(format!("/ads/{id}"))
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, delete).await.status(), StatusCode::NO_CONTENT);

        let gone = send(&app, get_with_cookie(&format!("/ads/{id}"), &cookie)).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_ad_id_is_json_bad_request() {
        let app = app().await;
        let (_, cookie) = register(&app, "alice", "a@x.com").await;

        for uri in ["/ads/not-a-uuid", "/ads/not-a-uuid/image"] {
            let response = send(&app, get_with_cookie(uri, &cookie)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert!(body_json(response).await["error"].is_string());
        }

        let delete = Request::delete("/ads/not-a-uuid")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = send(&app, delete).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_ads_list_sorted_by_price() {
        let app = app().await;
        let (_, cookie) = register(&app, "alice", "a@x.com").await;
        for price in ["30", "10", "20"] {
            create_ad(&app, &cookie, "Some bike", price).await;
        }

        let response = send(
            &app,
            get_with_cookie("/ads?sort_field=price&sort_asc=true&limit=2", &cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let ads = body_json(response).await;
        let prices: Vec<f64> = ads
            .as_array()
            .unwrap()
            .iter()
            .map(|ad| ad["price"].as_f64().unwrap())
            .collect();
        assert_eq!(prices, vec![10.0, 20.0]);
    }

    #[tokio::test]
    async fn test_ads_only_author_may_delete() {
        let app = app().await;
        let (_, alice) = register(&app, "alice", "a@x.com").await;
        let (_, bob) = register(&app, "bob", "b@x.com").await;

        let ad = create_ad(&app, &alice, "Red bike", "120").await;
        let id = ad["id"].as_str().unwrap();

        let delete = Request::delete(format!("/ads/{id}"))
            .header(header::COOKIE, &bob)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, delete).await.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_ads_rejects_bad_uploads() {
        let app = app().await;
        let (_, cookie) = register(&app, "alice", "a@x.com").await;
        let fields = ad_fields("Red bike", "120");

        let too_large = vec![0u8; 2048];
        let body = multipart_body(&as_refs(&fields), Some(("big.png", "image/png", too_large.as_slice())));
        let response = send(&app, multipart_request("POST", "/ads", &cookie, body)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = multipart_body(&as_refs(&fields), Some(("notes.txt", "text/plain", &b"hello"[..])));
        let response = send(&app, multipart_request("POST", "/ads", &cookie, body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = multipart_body(&as_refs(&fields), None);
        let response = send(&app, multipart_request("POST", "/ads", &cookie, body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "missing field: image");

        let fields = ad_fields("Red bike", "cheap");
        let body = multipart_body(&as_refs(&fields), Some(("bike.png", "image/png", &b"png"[..])));
        let response = send(&app, multipart_request("POST", "/ads", &cookie, body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
