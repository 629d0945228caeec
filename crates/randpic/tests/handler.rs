use randpic::config::{Config, Selection};
use randpic::event::{HttpContext, ProxyEvent, RequestContext};
use randpic::handler::{PhotoHandler, PhotoHandlerBuilder};
use randpic::http::ExtractMode;
use randpic::select::{FixedRandom, SequenceRandom};
use randpic::store::MemoryStore;

use std::collections::BTreeMap;
use std::sync::{Arc, Once};

use bytes::Bytes;
use http::{Method, Request, StatusCode, header};

const BUCKET: &str = "cats";
const BOUNDARY: &str = "----RandpicBoundary7MA4YWxk";

const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\r\n--not-a-boundary\xff\xd9";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

fn setup_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn build(store: &Arc<MemoryStore>, config: Config, random: impl randpic::select::RandomSource, mode: ExtractMode) -> PhotoHandler {
    setup_tracing();
    let mut builder = PhotoHandlerBuilder::new(config, Arc::clone(store));
    builder.set_random(random);
    builder.set_extract_mode(mode);
    builder.build()
}

fn counted(store: &Arc<MemoryStore>, index: usize) -> PhotoHandler {
    build(store, Config::new(BUCKET), FixedRandom::new(index), ExtractMode::Compat)
}

fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, content)) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n").as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

fn post(body: Vec<u8>) -> Request<Bytes> {
    Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, content_type())
        .body(Bytes::from(body))
        .unwrap()
}

fn event(method: &str, headers: &[(&str, &str)], body: Option<String>, is_base64_encoded: bool) -> ProxyEvent {
    ProxyEvent {
        http_method: method.to_owned(),
        path: Some("/".to_owned()),
        headers: headers.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect::<BTreeMap<_, _>>(),
        body,
        is_base64_encoded,
        ..ProxyEvent::default()
    }
}

#[tokio::test]
async fn get_counted_photo() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "4.txt", "Photo by Mo on Unsplash\n", Some("text/plain"));

    let handler = counted(&store, 3);
    let res = handler.handle(Request::new(Bytes::new()), false).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    let html = res.body();
    assert!(html.contains("<title>Random Cat Photo</title>"));
    assert!(html.contains(r#"src="memory://cats/4.jpg?X-Amz-Expires=300""#));
    assert!(html.contains("<p>Photo by Mo on Unsplash</p>"));
}

#[tokio::test]
async fn get_respects_ttl_and_count() {
    let store = Arc::new(MemoryStore::new());
    let mut config = Config::new(BUCKET);
    config.image_count = 2;
    config.presign_ttl_secs = 60;
    let handler = build(&store, config, SequenceRandom::new(vec![0, 1, 2]), ExtractMode::Compat);

    let mut keys = Vec::new();
    for _ in 0..3 {
        let photo = handler.random_photo().await.unwrap();
        assert!(photo.image_url.ends_with("?X-Amz-Expires=60"));
        keys.push(photo.image_key);
    }
    assert_eq!(keys, ["1.jpg", "2.jpg", "1.jpg"]);
}

#[tokio::test]
async fn get_listed_photo() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "a.png", PNG, None);
    store.insert(BUCKET, "a.txt", "PNG credit", None);
    store.insert(BUCKET, "b.jpg", JPEG, None);
    store.insert(BUCKET, "readme.md", "not an image", None);

    let mut config = Config::new(BUCKET);
    config.selection = Selection::Listed;
    let handler = build(&store, config, FixedRandom::new(0), ExtractMode::Compat);

    let photo = handler.random_photo().await.unwrap();
    assert_eq!(photo.image_key, "a.png");
    assert_eq!(photo.attribution, "PNG credit");
}

#[tokio::test]
async fn get_listed_without_images() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "1.txt", "orphan", None);

    let mut config = Config::new(BUCKET);
    config.selection = Selection::Listed;
    let handler = build(&store, config, FixedRandom::new(0), ExtractMode::Compat);

    let res = handler.dispatch(&Method::GET, None, b"", false).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.body().starts_with("Error: "));
}

#[tokio::test]
async fn get_without_attribution() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let res = handler.dispatch(&Method::GET, None, b"", false).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.body().contains("<p></p>"));
}

#[tokio::test]
async fn post_jpeg() {
    let store = Arc::new(MemoryStore::new());
    let mut config = Config::new(BUCKET);
    config.upload_prefix = "uploads/".to_owned();
    let handler = build(&store, config, FixedRandom::new(0), ExtractMode::Compat);

    let body = multipart(&[("title", "Sleepy cat")], Some(("cat.jpg", JPEG)));
    let upload = handler.upload(&body, Some(&content_type()), false).await.unwrap();

    assert!(upload.key.starts_with("uploads/"));
    assert!(upload.key.ends_with(".jpg"));
    assert_eq!(upload.size, JPEG.len());

    let stored = store.get(BUCKET, &upload.key).unwrap();
    assert_eq!(stored.body.as_ref(), JPEG);
    assert_eq!(stored.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn post_png_created() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let res = handler.handle(post(multipart(&[], Some(("cat.png", PNG)))), false).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.body().contains("Upload complete"));
    assert!(res.body().contains(".png"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn post_rejects_non_image() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let res = handler.handle(post(multipart(&[], Some(("notes.txt", &b"GIF89a"[..])))), false).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.body().contains("Invalid image"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn post_without_file() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let res = handler.handle(post(multipart(&[("title", "no file")], None)), false).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.body().contains("No file was found in the upload"));
}

#[tokio::test]
async fn post_empty_file() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let res = handler.handle(post(multipart(&[], Some(("empty.jpg", &b""[..])))), false).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.body().contains("The uploaded file is empty"));
}

#[tokio::test]
async fn post_too_large() {
    let store = Arc::new(MemoryStore::new());
    let mut config = Config::new(BUCKET);
    config.max_upload_size = 16;
    let handler = build(&store, config, FixedRandom::new(0), ExtractMode::Compat);

    let res = handler.handle(post(multipart(&[], Some(("cat.jpg", JPEG)))), false).await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(store.is_empty());
}

#[tokio::test]
async fn compat_and_structured_modes_differ() {
    // a plain field mentioning "filename" comes before the real file
    let body = multipart(&[("note", "see filename below")], Some(("cat.png", PNG)));

    let store = Arc::new(MemoryStore::new());
    let compat = counted(&store, 0);
    let res = compat.dispatch(&Method::POST, Some(&content_type()), &body, false).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let structured = build(&store, Config::new(BUCKET), FixedRandom::new(0), ExtractMode::Structured);
    let upload = structured.upload(&body, Some(&content_type()), false).await.unwrap();
    assert!(upload.key.ends_with(".png"));
    assert_eq!(store.get(BUCKET, &upload.key).unwrap().body.as_ref(), PNG);
}

#[tokio::test]
async fn proxy_event_base64_upload() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let body = base64_simd::STANDARD.encode_to_string(&multipart(&[], Some(("cat.jpg", JPEG))));
    let ct = content_type();
    let res = handler
        .handle_event(&event("POST", &[("Content-Type", ct.as_str())], Some(body), true))
        .await;

    assert_eq!(res.status_code, 201);
    assert_eq!(res.headers.get("content-type").map(String::as_str), Some("text/html; charset=utf-8"));
    assert!(!res.is_base64_encoded);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn proxy_event_invalid_base64() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let ct = content_type();
    let res = handler
        .handle_event(&event("POST", &[("content-type", ct.as_str())], Some("***".to_owned()), true))
        .await;
    assert_eq!(res.status_code, 400);
    assert!(res.body.contains("not valid base64"));
}

#[tokio::test]
async fn proxy_event_wrong_content_type() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let res = handler
        .handle_event(&event("POST", &[("content-type", "application/json")], Some("{}".to_owned()), false))
        .await;
    assert_eq!(res.status_code, 400);
    assert!(res.body.contains("multipart/form-data"));
}

#[tokio::test]
async fn proxy_event_get() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "2.txt", "Kitten", None);
    let handler = counted(&store, 1);

    let res = handler.handle_event(&event("GET", &[], None, false)).await;
    assert_eq!(res.status_code, 200);
    assert!(res.body.contains("memory://cats/2.jpg"));
    assert!(res.body.contains("<p>Kitten</p>"));
}

#[tokio::test]
async fn proxy_event_unsupported_methods() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    for method in ["PUT", "DELETE", "not a method"] {
        let res = handler.handle_event(&event(method, &[], None, false)).await;
        assert_eq!(res.status_code, 405, "{method}");
        assert_eq!(res.headers.get("allow").map(String::as_str), Some("GET, POST"));
    }
}

#[tokio::test]
async fn proxy_event_v2_get() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "3.txt", "Tabby", None);
    let handler = counted(&store, 2);

    let json = r#"{
        "version": "2.0",
        "routeKey": "$default",
        "rawPath": "/",
        "headers": {"accept": "text/html"},
        "requestContext": {"http": {"method": "GET", "path": "/"}},
        "isBase64Encoded": false
    }"#;
    let event: ProxyEvent = serde_json::from_str(json).unwrap();

    let res = handler.handle_event(&event).await;
    assert_eq!(res.status_code, 200);
    assert!(res.body.contains("memory://cats/3.jpg"));
    assert!(res.body.contains("<p>Tabby</p>"));
}

#[tokio::test]
async fn proxy_event_v2_upload() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let event = ProxyEvent {
        version: Some("2.0".to_owned()),
        headers: BTreeMap::from([("content-type".to_owned(), content_type())]),
        request_context: Some(RequestContext {
            http: Some(HttpContext {
                method: "POST".to_owned(),
                path: Some("/".to_owned()),
            }),
        }),
        body: Some(base64_simd::STANDARD.encode_to_string(&multipart(&[], Some(("cat.png", PNG))))),
        is_base64_encoded: true,
        ..ProxyEvent::default()
    };

    let res = handler.handle_event(&event).await;
    assert_eq!(res.status_code, 201);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn direct_invocation_serves_photo() {
    let store = Arc::new(MemoryStore::new());
    let handler = counted(&store, 0);

    let event: ProxyEvent = serde_json::from_str("{}").unwrap();
    let res = handler.handle_event(&event).await;
    assert_eq!(res.status_code, 200);
    assert!(res.body.contains("memory://cats/1.jpg"));
}
