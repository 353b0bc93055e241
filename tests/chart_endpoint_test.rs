use chart_engine::settings::Config;
use chart_engine::{AppState, init_openapi_route};
use poem::{
    Endpoint,
    http::StatusCode,
    test::{TestClient, TestResponse},
};
use serde_json::{Value, json};
use std::sync::Arc;

const FOO_PARAMS: &[(&str, &str)] = &[("chl", "foo"), ("chs", "100x100"), ("chld", "M")];

fn client_with(config: Config) -> (TestClient<impl Endpoint>, Arc<AppState>) {
    let app_state = Arc::new(AppState::from_config(&config));
    let app = init_openapi_route(app_state.clone(), &config);
    (TestClient::new(app), app_state)
}

fn client() -> TestClient<impl Endpoint> {
    client_with(Config::default()).0
}

async fn get_chart<E: Endpoint>(
    cli: &TestClient<E>,
    path: &str,
    params: &[(&str, &str)],
) -> TestResponse {
    let mut req = cli.get(path);
    for (name, value) in params {
        req = req.query(*name, value);
    }
    req.send().await
}

async fn body_bytes(resp: TestResponse) -> Vec<u8> {
    resp.0.into_body().into_vec().await.unwrap()
}

async fn body_json(resp: TestResponse) -> Value {
    let body = resp.0.into_body().into_string().await.unwrap();
    serde_json::from_str(&body).unwrap()
}

#[tokio::test]
async fn test_chart_renders_every_format() {
    let cli = client();

    for (extension, signature) in [
        ("png", &b"\x89PNG"[..]),
        ("jpeg", &[0xFF, 0xD8, 0xFF][..]),
        ("gif", &b"GIF8"[..]),
    ] {
        let resp = get_chart(&cli, &format!("/image.{extension}"), FOO_PARAMS).await;
        resp.assert_status_is_ok();
        resp.assert_content_type(&format!("image/{extension}"));

        let body = body_bytes(resp).await;
        assert!(!body.is_empty(), "{extension} body should not be empty");
        assert!(body.starts_with(signature), "{extension} signature mismatch");
    }
}

#[tokio::test]
async fn test_jpg_extension_serves_jpeg() {
    let cli = client();

    let resp = get_chart(&cli, "/image.jpg", FOO_PARAMS).await;
    resp.assert_status_is_ok();
    resp.assert_content_type("image/jpeg");
}

#[tokio::test]
async fn test_png_has_requested_dimensions() {
    let cli = client();

    let resp = get_chart(
        &cli,
        "/image.png",
        &[("chl", "foo"), ("chs", "150x120"), ("chld", "M|2")],
    )
    .await;
    resp.assert_status_is_ok();

    let body = body_bytes(resp).await;
    // IHDR width and height
    let width = u32::from_be_bytes(body[16..20].try_into().unwrap());
    let height = u32::from_be_bytes(body[20..24].try_into().unwrap());
    assert_eq!((width, height), (150, 120));
}

#[tokio::test]
async fn test_same_request_twice_is_independent() {
    let cli = client();

    let first = get_chart(&cli, "/image.png", FOO_PARAMS).await;
    first.assert_status_is_ok();
    let second = get_chart(&cli, "/image.png", FOO_PARAMS).await;
    second.assert_status_is_ok();

    assert_eq!(body_bytes(first).await, body_bytes(second).await);
}

#[tokio::test]
async fn test_thousand_requests_are_not_throttled() {
    let cli = client();

    for i in 0..1000 {
        let resp = get_chart(&cli, "/image.png", FOO_PARAMS).await;
        assert_eq!(resp.0.status(), StatusCode::OK, "request {i} failed");
        assert!(!body_bytes(resp).await.is_empty());
    }
}

#[tokio::test]
async fn test_missing_chl_is_bad_request() {
    let cli = client();

    let resp = get_chart(&cli, "/image.png", &[("chs", "100x100"), ("chld", "M")]).await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body = body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("chl"));
}

#[tokio::test]
async fn test_malformed_parameters_are_bad_request() {
    let cli = client();

    let cases: &[&[(&str, &str)]] = &[
        &[("chl", ""), ("chs", "100x100")],
        &[("chl", "foo")],
        &[("chl", "foo"), ("chs", "100")],
        &[("chl", "foo"), ("chs", "5000x5000")],
        &[("chl", "foo"), ("chs", "0x100")],
        &[("chl", "foo"), ("chs", "100x100"), ("chld", "Z")],
        &[("chl", "foo"), ("chs", "100x100"), ("chld", "M|x")],
        &[("chl", "foo"), ("chs", "100x100"), ("choe", "Shift_JIS")],
        &[("chl", "foo"), ("chs", "100x100"), ("cht", "p3")],
    ];

    for params in cases {
        let resp = get_chart(&cli, "/image.png", params).await;
        assert_eq!(
            resp.0.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for {params:?}"
        );
    }
}

#[tokio::test]
async fn test_content_too_long_for_symbol_is_bad_request() {
    let cli = client();
    let content = "a".repeat(3000);

    let resp = get_chart(
        &cli,
        "/image.png",
        &[("chl", content.as_str()), ("chs", "100x100"), ("chld", "H")],
    )
    .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsupported_extension_is_not_found() {
    let cli = client();

    for path in ["/image.bmp", "/image", "/..%2F..%2Fetc%2Fpasswd"] {
        let resp = get_chart(&cli, path, FOO_PARAMS).await;
        assert_eq!(
            resp.0.status(),
            StatusCode::NOT_FOUND,
            "expected 404 for {path}"
        );
    }
}

#[tokio::test]
async fn test_post_body_is_encoded() {
    let cli = client();

    let resp = cli
        .post("/image.gif")
        .query("chs", &"120x120")
        .query("chld", &"Q")
        .content_type("text/plain")
        .body("content sent as the request body")
        .send()
        .await;
    resp.assert_status_is_ok();
    resp.assert_content_type("image/gif");
    assert!(!body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn test_json_render_returns_binary() {
    let cli = client();

    let resp = cli
        .post("/render")
        .body_json(&json!({
            "content": "https://example.com",
            "width": 200,
            "height": 200,
            "format": "jpeg",
            "error_correction": "H",
            "quality": 60
        }))
        .send()
        .await;
    resp.assert_status_is_ok();
    resp.assert_content_type("image/jpeg");
    assert!(!body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn test_json_render_returns_base64() {
    let cli = client();

    let resp = cli
        .post("/render")
        .body_json(&json!({
            "content": "foo",
            "width": 100,
            "height": 100,
            "format": "png",
            "return_base64": true
        }))
        .send()
        .await;
    resp.assert_status_is_ok();

    let body = body_json(resp).await;
    assert_eq!(body["mime_type"], "image/png");
    assert!(!body["data"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_json_render_rejects_empty_content() {
    let cli = client();

    let resp = cli
        .post("/render")
        .body_json(&json!({
            "content": "",
            "width": 100,
            "height": 100,
            "format": "gif"
        }))
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_json_render_base64_rejects_content_too_long() {
    let cli = client();

    let resp = cli
        .post("/render")
        .body_json(&json!({
            "content": "a".repeat(3000),
            "width": 100,
            "height": 100,
            "format": "png",
            "error_correction": "H",
            "return_base64": true
        }))
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_configured_max_dimension_applies_to_every_route() {
    let (cli, _) = client_with(Config {
        max_dimension: 6000,
        ..Default::default()
    });

    let resp = get_chart(&cli, "/image.png", &[("chl", "x"), ("chs", "5000x100")]).await;
    resp.assert_status_is_ok();

    let resp = cli
        .post("/render")
        .body_json(&json!({
            "content": "x",
            "width": 5000,
            "height": 100,
            "format": "png"
        }))
        .send()
        .await;
    resp.assert_status_is_ok();
    resp.assert_content_type("image/png");

    let resp = get_chart(&cli, "/image.png", &[("chl", "x"), ("chs", "6001x100")]).await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = cli
        .post("/render")
        .body_json(&json!({
            "content": "x",
            "width": 6001,
            "height": 100,
            "format": "png"
        }))
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lowered_max_dimension_rejects_json_render() {
    let (cli, _) = client_with(Config {
        max_dimension: 200,
        ..Default::default()
    });

    let resp = cli
        .post("/render")
        .body_json(&json!({
            "content": "x",
            "width": 300,
            "height": 100,
            "format": "gif"
        }))
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_wait_for_a_render_slot() {
    let config = Config {
        max_concurrent_renders: 1,
        ..Default::default()
    };
    let app_state = Arc::new(AppState::from_config(&config));

    let mut handles = vec![];
    for i in 1..=16 {
        let app_state_clone = app_state.clone();
        let config_clone = config.clone();
        let handle = tokio::spawn(async move {
            let app = init_openapi_route(app_state_clone, &config_clone);
            let client = TestClient::new(app);
            let content = format!("request {i}");

            let resp = client
                .get("/image.png")
                .query("chl", &content)
                .query("chs", &"300x300")
                .query("chld", &"H")
                .send()
                .await;

            let status = resp.0.status();
            let body = resp.0.into_body().into_vec().await.unwrap();
            (i, status, body.len())
        });
        handles.push(handle);
    }

    for handle in handles {
        let (i, status, len) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK, "request {i} failed");
        assert!(len > 0, "request {i} returned an empty body");
    }

    let health = app_state.engine.health_check();
    assert_eq!(health.available_permits, 1);
    assert_eq!(health.max_concurrent, 1);
}

#[tokio::test]
async fn test_formats_lists_aliases() {
    let cli = client();

    let resp = cli.get("/formats").send().await;
    resp.assert_status_is_ok();

    let formats = body_json(resp).await;
    let formats = formats.as_array().unwrap();
    assert_eq!(formats.len(), 4);
    assert!(formats.iter().any(|f| f["extension"] == "jpg"
        && f["format"] == "jpeg"
        && f["content_type"] == "image/jpeg"));
}

#[tokio::test]
async fn test_health_reports_render_slots() {
    let (cli, _) = client_with(Config {
        max_concurrent_renders: 3,
        ..Default::default()
    });

    let resp = cli.get("/health").send().await;
    resp.assert_status_is_ok();

    let health = body_json(resp).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["render_slots"]["capacity"], 3);
    assert_eq!(health["render_slots"]["available"], 3);
    assert_eq!(health["rate_limit"]["enabled"], false);
}

#[tokio::test]
async fn test_rate_limit_rejects_after_burst() {
    let (cli, _) = client_with(Config {
        rate_limit_per_sec: 1,
        rate_limit_burst: Some(2),
        ..Default::default()
    });

    get_chart(&cli, "/image.png", FOO_PARAMS)
        .await
        .assert_status_is_ok();
    get_chart(&cli, "/image.png", FOO_PARAMS)
        .await
        .assert_status_is_ok();

    let resp = get_chart(&cli, "/image.png", FOO_PARAMS).await;
    resp.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.0.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn test_shutdown_engine_is_unavailable() {
    let (cli, state) = client_with(Config::default());
    state.engine.shutdown();

    let resp = get_chart(&cli, "/image.png", FOO_PARAMS).await;
    resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let resp = cli.get("/health").send().await;
    let health = body_json(resp).await;
    assert_eq!(health["status"], "shutting_down");
}

#[tokio::test]
async fn test_prefix_mounts_api() {
    let (cli, _) = client_with(Config {
        prefix: Some("/chart".to_string()),
        ..Default::default()
    });

    let resp = get_chart(&cli, "/chart/image.png", FOO_PARAMS).await;
    resp.assert_status_is_ok();
    resp.assert_content_type("image/png");
}
