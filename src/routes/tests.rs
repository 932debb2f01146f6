use crate::{
    config::Credentials,
    routes::routes::routes,
    services::{dav_service::DavService, memory_store::MemoryStore},
};
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        Self::with(MemoryStore::default(), None)
    }

    fn with(store: MemoryStore, credentials: Option<Credentials>) -> Self {
        let store = Arc::new(store);
        let service = DavService::new(store.clone(), 4);
        Self {
            router: routes(service, credentials.as_ref(), 600),
            store,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: impl Into<Body>,
    ) -> (StatusCode, HeaderMap, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body.into()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn status(&self, method: &str, uri: &str, headers: &[(&str, &str)]) -> StatusCode {
        self.send(method, uri, headers, Body::empty()).await.0
    }

    async fn put(&self, uri: &str, body: &'static str) {
        let status = self.send("PUT", uri, &[], body).await.0;
        assert_eq!(status, StatusCode::CREATED, "PUT {uri}");
    }

    async fn mkcol(&self, uri: &str) {
        assert_eq!(self.status("MKCOL", uri, &[]).await, StatusCode::CREATED, "MKCOL {uri}");
    }

    async fn body(&self, uri: &str) -> Option<String> {
        let (status, _, body) = self.send("GET", uri, &[], Body::empty()).await;
        (status == StatusCode::OK).then_some(body)
    }

    /// C/, C/x, C/y/, C/y/z
    async fn seed_tree(&self) {
        self.mkcol("/C").await;
        self.put("/C/x", "x-content").await;
        self.mkcol("/C/y").await;
        self.put("/C/y/z", "z-content").await;
    }
}

fn responses(body: &str) -> usize {
    body.matches("<response>").count()
}

#[tokio::test]
async fn mkcol_then_propfind_reports_collection() {
    let app = TestApp::new();
    app.mkcol("/photos").await;
    let (status, headers, body) = app
        .send("PROPFIND", "/photos", &[("depth", "0")], Body::empty())
        .await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("application/xml"));
    assert_eq!(responses(&body), 1);
    assert!(body.contains("<href>/photos/</href>"));
    assert!(body.contains("<resourcetype><collection /></resourcetype>"));
    assert!(body.contains("<getcontentlength>0</getcontentlength>"));
}

#[tokio::test]
async fn put_then_get_round_trips_body() {
    let app = TestApp::new();
    let (status, _, _) = app
        .send(
            "PUT",
            "/notes.txt",
            &[("content-type", "text/plain"), ("content-language", "en")],
            "hello webdav",
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, headers, body) = app.send("GET", "/notes.txt", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello webdav");
    assert_eq!(headers[header::CONTENT_LENGTH], "12");
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(headers[header::CONTENT_LANGUAGE], "en");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert!(headers[header::ETAG].to_str().unwrap().starts_with('"'));

    let (status, headers, body) = app.send("HEAD", "/notes.txt", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(headers[header::CONTENT_LENGTH], "12");
}

#[tokio::test]
async fn get_honours_ranges() {
    let app = TestApp::new();
    app.put("/digits", "0123456789").await;

    let (status, headers, body) = app
        .send("GET", "/digits", &[("range", "bytes=2-5")], Body::empty())
        .await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, "2345");
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 2-5/10");
    assert_eq!(headers[header::CONTENT_LENGTH], "4");

    let status = app.status("GET", "/digits", &[("range", "bytes=50-")]).await;
    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn missing_resources_are_404() {
    let app = TestApp::new();
    assert_eq!(app.status("GET", "/nope", &[]).await, StatusCode::NOT_FOUND);
    assert_eq!(app.status("HEAD", "/nope", &[]).await, StatusCode::NOT_FOUND);
    assert_eq!(app.status("PROPFIND", "/nope", &[]).await, StatusCode::NOT_FOUND);
    assert_eq!(app.status("GET", "/nope/", &[]).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_requires_collection_parent() {
    let app = TestApp::new();
    assert_eq!(
        app.send("PUT", "/missing/file", &[], "x").await.0,
        StatusCode::CONFLICT
    );
    app.put("/plain", "x").await;
    assert_eq!(
        app.send("PUT", "/plain/child", &[], "x").await.0,
        StatusCode::CONFLICT
    );
    assert_eq!(
        app.send("PUT", "/dir/", &[], "x").await.0,
        StatusCode::METHOD_NOT_ALLOWED
    );
    app.mkcol("/dir").await;
    assert_eq!(
        app.send("PUT", "/dir", &[], "x").await.0,
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[tokio::test]
async fn mkcol_preconditions() {
    let app = TestApp::new();
    app.mkcol("/a").await;
    assert_eq!(app.status("MKCOL", "/a", &[]).await, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(app.status("MKCOL", "/a/", &[]).await, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(app.status("MKCOL", "/", &[]).await, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(app.status("MKCOL", "/x/y", &[]).await, StatusCode::CONFLICT);
    app.mkcol("/a/b/").await;
}

#[tokio::test]
async fn delete_is_idempotent_in_effect() {
    let app = TestApp::new();
    app.put("/gone.txt", "bye").await;
    assert_eq!(app.status("DELETE", "/gone.txt", &[]).await, StatusCode::NO_CONTENT);
    assert_eq!(app.status("DELETE", "/gone.txt", &[]).await, StatusCode::NOT_FOUND);
    assert!(app.store.keys().await.is_empty());
}

#[tokio::test]
async fn delete_collection_removes_subtree_only() {
    let app = TestApp::new();
    app.seed_tree().await;
    app.put("/Cx", "sibling").await;
    assert_eq!(app.status("DELETE", "/C/", &[]).await, StatusCode::NO_CONTENT);
    assert_eq!(app.store.keys().await, vec!["Cx".to_string()]);
}

#[tokio::test]
async fn delete_root_empties_store() {
    let app = TestApp::with(MemoryStore::new(2), None);
    app.seed_tree().await;
    app.put("/top", "t").await;
    assert_eq!(app.status("DELETE", "/", &[]).await, StatusCode::NO_CONTENT);
    assert!(app.store.keys().await.is_empty());
}

#[tokio::test]
async fn propfind_depth_one_lists_immediate_children() {
    let app = TestApp::new();
    app.mkcol("/c").await;
    app.put("/c/a", "a").await;
    app.mkcol("/c/b").await;
    app.put("/c/b/deep", "d").await;

    let (status, _, body) = app
        .send("PROPFIND", "/c/", &[("depth", "1")], Body::empty())
        .await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(responses(&body), 3);
    assert!(body.contains("<href>/c/a</href>"));
    assert!(body.contains("<href>/c/b/</href>"));
    assert!(!body.contains("deep"));

    let (_, _, body) = app.send("PROPFIND", "/c", &[], Body::empty()).await;
    assert_eq!(responses(&body), 4);
}

#[tokio::test]
async fn propfind_rejects_unknown_depth() {
    let app = TestApp::new();
    app.mkcol("/c").await;
    assert_eq!(
        app.status("PROPFIND", "/c", &[("depth", "2")]).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn propfind_on_root_synthesizes_collection() {
    let app = TestApp::new();
    app.put("/file", "x").await;
    let (status, _, body) = app
        .send("PROPFIND", "/", &[("depth", "1")], Body::empty())
        .await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(responses(&body), 2);
    assert!(body.contains("<href>/</href>"));
}

#[tokio::test]
async fn propfind_enumerates_every_page() {
    let app = TestApp::with(MemoryStore::new(3), None);
    app.mkcol("/many").await;
    let names: Vec<String> = (0..10).map(|i| format!("/many/f{:02}", i)).collect();
    for name in &names {
        let status = app.send("PUT", name, &[], "x").await.0;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, _, body) = app
        .send("PROPFIND", "/many", &[("depth", "1")], Body::empty())
        .await;
    assert_eq!(responses(&body), 11);
    let positions: Vec<usize> = names
        .iter()
        .map(|name| body.find(&format!("<href>{}</href>", name)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn propfind_prop_request_splits_statuses() {
    let app = TestApp::new();
    app.put("/doc", "x").await;
    let body = r#"<?xml version="1.0"?>
        <D:propfind xmlns:D="DAV:"><D:prop><D:getcontentlength/><D:nosuch/></D:prop></D:propfind>"#;
    let (status, _, xml) = app.send("PROPFIND", "/doc", &[("depth", "0")], body).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(xml.contains("<getcontentlength>1</getcontentlength>"));
    assert!(xml.contains("<nosuch /></prop><status>HTTP/1.1 404 Not Found</status>"));

    let status = app
        .send("PROPFIND", "/doc", &[], "<propfind><prop>")
        .await
        .0;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn proppatch_sets_and_removes_custom_properties() {
    let app = TestApp::new();
    app.put("/doc", "keep me").await;
    let patch = r#"<?xml version="1.0"?>
        <D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:x">
          <D:set><D:prop><Z:author>Ada</Z:author><Z:draft>yes</Z:draft></D:prop></D:set>
        </D:propertyupdate>"#;
    let (status, _, body) = app.send("PROPPATCH", "/doc", &[], patch).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(body.contains("<author /><draft />"));
    assert!(body.contains("HTTP/1.1 200 OK"));

    let (_, _, props) = app.send("PROPFIND", "/doc", &[("depth", "0")], Body::empty()).await;
    assert!(props.contains("<author>Ada</author>"));
    assert!(props.contains("<draft>yes</draft>"));
    assert_eq!(app.body("/doc").await.as_deref(), Some("keep me"));

    let remove = r#"<propertyupdate xmlns="DAV:"><remove><prop><draft/></prop></remove></propertyupdate>"#;
    assert_eq!(
        app.send("PROPPATCH", "/doc", &[], remove).await.0,
        StatusCode::MULTI_STATUS
    );
    let (_, _, props) = app.send("PROPFIND", "/doc", &[("depth", "0")], Body::empty()).await;
    assert!(props.contains("<author>Ada</author>"));
    assert!(!props.contains("<draft>"));
}

#[tokio::test]
async fn proppatch_preconditions() {
    let app = TestApp::new();
    let patch = r#"<propertyupdate xmlns="DAV:"><set><prop><a>1</a></prop></set></propertyupdate>"#;
    assert_eq!(
        app.send("PROPPATCH", "/missing", &[], patch).await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.send("PROPPATCH", "/", &[], patch).await.0,
        StatusCode::FORBIDDEN
    );
    app.put("/doc", "x").await;
    assert_eq!(
        app.send("PROPPATCH", "/doc", &[], "not xml <").await.0,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn recursive_copy_preserves_structure() {
    let app = TestApp::new();
    app.seed_tree().await;
    let status = app
        .status(
            "COPY",
            "/C",
            &[("destination", "http://localhost/D"), ("depth", "infinity")],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let keys = app.store.keys().await;
    for key in ["C", "C/x", "C/y", "C/y/z", "D", "D/x", "D/y", "D/y/z"] {
        assert!(keys.contains(&key.to_string()), "missing {key}");
    }
    assert_eq!(app.body("/D/x").await.as_deref(), Some("x-content"));
    assert_eq!(app.body("/D/y/z").await.as_deref(), Some("z-content"));
    let (_, _, props) = app.send("PROPFIND", "/D/y", &[("depth", "0")], Body::empty()).await;
    assert!(props.contains("<collection />"));
}

#[tokio::test]
async fn shallow_copy_copies_only_the_collection() {
    let app = TestApp::new();
    app.seed_tree().await;
    let status = app
        .status("COPY", "/C", &[("destination", "/D"), ("depth", "0")])
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!app.store.keys().await.contains(&"D/x".to_string()));
    assert_eq!(
        app.status("COPY", "/C", &[("destination", "/E"), ("depth", "1")]).await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn copy_with_overwrite_false_leaves_destination() {
    let app = TestApp::new();
    app.put("/src", "new").await;
    app.put("/dst", "old").await;
    let status = app
        .status("COPY", "/src", &[("destination", "/dst"), ("overwrite", "F")])
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(app.body("/dst").await.as_deref(), Some("old"));

    let status = app.status("COPY", "/src", &[("destination", "/dst")]).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.body("/dst").await.as_deref(), Some("new"));
}

#[tokio::test]
async fn copy_error_mapping() {
    let app = TestApp::new();
    app.seed_tree().await;
    assert_eq!(
        app.status("COPY", "/C", &[]).await,
        StatusCode::BAD_REQUEST,
        "missing destination"
    );
    assert_eq!(
        app.status("COPY", "/absent", &[("destination", "/D")]).await,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.status("COPY", "/C/x", &[("destination", "/nowhere/x")]).await,
        StatusCode::CONFLICT
    );
    assert_eq!(
        app.status("COPY", "/C", &[("destination", "/C/y/inner")]).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.status("COPY", "/C", &[("destination", "/C")]).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.status("COPY", "/", &[("destination", "/R")]).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn recursive_move_relocates_subtree() {
    let app = TestApp::new();
    app.seed_tree().await;
    let status = app
        .status("MOVE", "/C/", &[("destination", "http://example.com/D/")])
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.store.keys().await, vec!["D", "D/x", "D/y", "D/y/z"]);
    assert_eq!(app.body("/D/y/z").await.as_deref(), Some("z-content"));
    assert_eq!(app.status("PROPFIND", "/C", &[]).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn move_requires_explicit_overwrite() {
    let app = TestApp::new();
    app.seed_tree().await;
    app.mkcol("/D").await;
    app.put("/D/stale", "stale").await;

    assert_eq!(
        app.status("MOVE", "/C", &[("destination", "/D")]).await,
        StatusCode::PRECONDITION_FAILED
    );
    assert_eq!(
        app.status("MOVE", "/C", &[("destination", "/D"), ("overwrite", "F")]).await,
        StatusCode::PRECONDITION_FAILED
    );
    assert_eq!(
        app.status("MOVE", "/C", &[("destination", "/D"), ("overwrite", "T")]).await,
        StatusCode::NO_CONTENT
    );
    let keys = app.store.keys().await;
    assert_eq!(keys, vec!["D", "D/x", "D/y", "D/y/z"]);
}

#[tokio::test]
async fn move_rejects_self_and_bad_depth() {
    let app = TestApp::new();
    app.put("/f", "x").await;
    assert_eq!(
        app.status("MOVE", "/f", &[("destination", "/f")]).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.status("MOVE", "/f", &[("destination", "/g"), ("depth", "0")]).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.status("MOVE", "/f", &[("destination", "/g")]).await,
        StatusCode::CREATED
    );
    assert_eq!(app.store.keys().await, vec!["g"]);
}

#[tokio::test]
async fn fan_out_failure_fails_request_without_rollback() {
    let app = TestApp::new();
    app.seed_tree().await;
    app.store.fail_on("D/y/z").await;
    let status = app
        .status("COPY", "/C", &[("destination", "/D")])
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let keys = app.store.keys().await;
    assert!(keys.contains(&"D".to_string()));
    assert!(!keys.contains(&"D/y/z".to_string()));
}

#[tokio::test]
async fn store_calls_are_not_retried() {
    let app = TestApp::new();
    app.store.fail_on("flaky").await;
    let before = app.store.calls();
    let (status, headers, _) = app.send("PUT", "/flaky", &[], "x").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
    // One HEAD for the existing-collection check, one PUT.
    assert_eq!(app.store.calls() - before, 2);
}

#[tokio::test]
async fn collection_get_renders_index() {
    let app = TestApp::new();
    app.mkcol("/docs").await;
    app.put("/docs/a%20b.txt", "x").await;
    app.mkcol("/docs/sub").await;
    let (status, headers, body) = app.send("GET", "/docs/", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert!(body.contains(r#"<a href="/docs/a%20b.txt">a b.txt</a>"#));
    assert!(body.contains(r#"<a href="/docs/sub/">sub/</a>"#));
}

#[tokio::test]
async fn options_advertises_dav() {
    let app = TestApp::new();
    let (status, headers, _) = app.send("OPTIONS", "/anything", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(headers["dav"], "1");
    let allow = headers[header::ALLOW].to_str().unwrap();
    assert!(allow.contains("PROPFIND") && allow.contains("MOVE"));
}

#[tokio::test]
async fn unknown_methods_are_rejected() {
    let app = TestApp::new();
    assert_eq!(app.status("LOCK", "/x", &[]).await, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(app.status("PATCH", "/x", &[]).await, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn unauthenticated_requests_get_401() {
    let credentials = Credentials {
        username: "alice".into(),
        password: "s3cret".into(),
    };
    let app = TestApp::with(MemoryStore::default(), Some(credentials));

    for method in ["GET", "PUT", "PROPFIND", "MKCOL", "DELETE", "COPY", "MOVE", "PROPPATCH"] {
        let (status, headers, _) = app.send(method, "/x", &[], Body::empty()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method}");
        assert!(headers.contains_key(header::WWW_AUTHENTICATE), "{method}");
    }
    let wrong = [("authorization", "Basic YWxpY2U6d3Jvbmc=")];
    assert_eq!(app.status("GET", "/", &wrong).await, StatusCode::UNAUTHORIZED);

    assert_eq!(app.status("OPTIONS", "/x", &[]).await, StatusCode::NO_CONTENT);
    assert_eq!(app.status("GET", "/.gateway/healthz", &[]).await, StatusCode::OK);

    let good = [("authorization", "Basic YWxpY2U6czNjcmV0")];
    assert_eq!(app.status("MKCOL", "/x", &good).await, StatusCode::CREATED);
}

#[tokio::test]
async fn cors_echoes_origin() {
    let app = TestApp::new();
    let (status, headers, _) = app
        .send(
            "OPTIONS",
            "/x",
            &[
                ("origin", "https://app.example"),
                ("access-control-request-method", "PROPFIND"),
            ],
            Body::empty(),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(headers["dav"], "1");
    assert_eq!(headers["access-control-allow-origin"], "https://app.example");
    assert_eq!(headers["access-control-max-age"], "600");
    assert_eq!(headers["access-control-allow-credentials"], "false");
    assert!(headers["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .contains("PROPPATCH"));

    let (_, headers, _) = app
        .send("GET", "/.gateway/healthz", &[("origin", "https://app.example")], Body::empty())
        .await;
    assert_eq!(headers["access-control-allow-origin"], "https://app.example");

    let (_, headers, _) = app.send("GET", "/.gateway/healthz", &[], Body::empty()).await;
    assert!(!headers.contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn readiness_reports_store() {
    let app = TestApp::new();
    let (status, _, body) = app.send("GET", "/.gateway/readyz", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ok":true"#));
}

#[tokio::test]
async fn gateway_prefix_is_not_an_auth_bypass() {
    let credentials = Credentials {
        username: "alice".into(),
        password: "s3cret".into(),
    };
    let app = TestApp::with(MemoryStore::default(), Some(credentials));
    let good = [("authorization", "Basic YWxpY2U6czNjcmV0")];
    assert_eq!(app.status("MKCOL", "/C", &good).await, StatusCode::CREATED);
    assert_eq!(
        app.send("PUT", "/C/precious", &good, "keep").await.0,
        StatusCode::CREATED
    );

    assert_eq!(app.status("MKCOL", "/.gateway/", &[]).await, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.send("PUT", "/.gateway/x", &[], "x").await.0,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.status(
            "MOVE",
            "/.gateway/x",
            &[("destination", "/C"), ("overwrite", "T")]
        )
        .await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.status("PUT", "/.gateway/healthz", &[]).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(app.status("GET", "/.gateway/readyz", &[]).await, StatusCode::OK);
    assert_eq!(app.store.keys().await, vec!["C", "C/precious"]);
}

#[tokio::test]
async fn copy_onto_an_ancestor_is_rejected_without_loss() {
    let app = TestApp::new();
    app.seed_tree().await;
    assert_eq!(
        app.status("COPY", "/C/y", &[("destination", "/C")]).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(app.store.keys().await, vec!["C", "C/x", "C/y", "C/y/z"]);
}

#[tokio::test]
async fn move_onto_an_ancestor_is_rejected_without_loss() {
    let app = TestApp::new();
    app.seed_tree().await;
    assert_eq!(
        app.status("MOVE", "/C/y", &[("destination", "/C"), ("overwrite", "T")])
            .await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.status("MOVE", "/C/y/z", &[("destination", "/C/y"), ("overwrite", "T")])
            .await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(app.store.keys().await, vec!["C", "C/x", "C/y", "C/y/z"]);
}

#[tokio::test]
async fn proppatch_cannot_touch_live_properties() {
    let app = TestApp::new();
    app.put("/f", "abc").await;
    let patch = r#"<propertyupdate xmlns="DAV:"><set><prop>
        <getetag>fake</getetag><author>Ada</author>
        </prop></set></propertyupdate>"#;
    let (status, _, body) = app.send("PROPPATCH", "/f", &[], patch).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(body.contains("<getetag /></prop><status>HTTP/1.1 403 Forbidden</status>"));
    assert!(body.contains("<author /></prop><status>HTTP/1.1 424 Failed Dependency</status>"));

    let (_, _, props) = app.send("PROPFIND", "/f", &[("depth", "0")], Body::empty()).await;
    assert_eq!(props.matches("<getetag>").count(), 1);
    assert!(!props.contains("fake"));
    assert!(!props.contains("<author>"));
}

#[tokio::test]
async fn non_utf8_paths_are_rejected() {
    let app = TestApp::new();
    assert_eq!(
        app.send("PUT", "/caf%E9", &[], "x").await.0,
        StatusCode::BAD_REQUEST
    );
    app.put("/src", "x").await;
    assert_eq!(
        app.status("COPY", "/src", &[("destination", "/caf%FF")]).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(app.store.keys().await, vec!["src"]);
}
