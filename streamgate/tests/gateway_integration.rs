//! End-to-end HTTP gateway scenarios that don't require a real `ffmpeg`/
//! `ffprobe` on PATH (spec §8 scenarios S2-S4): wait-and-serve, query
//! propagation through the playlist enricher, and the done marker.
//! Scenarios that require an actual transcode (S1, S5, S6) are covered at
//! the unit level in `planner`/`idle`/`orchestrator` instead.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use clap::Parser;
use streamgate::config::GatewayConfig;
use streamgate::gateway::{self, AppState};
use tower::ServiceExt;

fn cfg_for(output: &std::path::Path) -> GatewayConfig {
    GatewayConfig::parse_from([
        "streamgate",
        "--output",
        output.to_str().expect("tempdir path must be utf-8"),
    ])
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn missing_source_url_returns_bad_request() {
    let root = tempfile::tempdir().unwrap();
    let state = AppState::new(cfg_for(root.path()));
    let router = gateway::router(state);

    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn done_marker_flow_s4() {
    let root = tempfile::tempdir().unwrap();
    let state = AppState::new(cfg_for(root.path()));
    let router = gateway::router(state.clone());

    let request = |uri: &str| {
        Request::builder()
            .uri(uri)
            .header("x-source-url", "http://host/a.mp4")
            .body(Body::empty())
            .unwrap()
    };

    // No output directory/marker yet: 404.
    let response = router.clone().oneshot(request("/?done")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Write the marker directly (bypassing the transcoder) and retry.
    let hash = streamgate::distributor::hash_of_source("http://host/a.mp4");
    let output_dir = root.path().join(hash);
    tokio::fs::create_dir_all(&output_dir).await.unwrap();
    tokio::fs::write(output_dir.join("done"), b"").await.unwrap();

    let response = router.clone().oneshot(request("/?done")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Delete it again: back to 404 (spec §8 S4).
    tokio::fs::remove_file(output_dir.join("done")).await.unwrap();
    let response = router.oneshot(request("/?done")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn segment_request_blocks_until_file_appears_s2() {
    let root = tempfile::tempdir().unwrap();
    let state = AppState::new(cfg_for(root.path()));
    let router = gateway::router(state);

    let hash = streamgate::distributor::hash_of_source("http://host/a.mp4");
    let output_dir = root.path().join(hash);

    let write_dir = output_dir.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        tokio::fs::create_dir_all(&write_dir).await.unwrap();
        tokio::fs::write(write_dir.join("v0-0.ts"), b"segment-bytes").await.unwrap();
    });

    let request = Request::builder()
        .uri("/v0-0.ts")
        .header("x-source-url", "http://host/a.mp4")
        .body(Body::empty())
        .unwrap();

    let response = tokio::time::timeout(std::time::Duration::from_secs(5), router.oneshot(request))
        .await
        .expect("segment request should not hang past the file appearing");
    let response = response.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "segment-bytes");
}

#[tokio::test]
async fn sub_playlist_request_rewrites_query_and_event_marker_s3() {
    let root = tempfile::tempdir().unwrap();
    let state = AppState::new(cfg_for(root.path()));
    let router = gateway::router(state);

    let hash = streamgate::distributor::hash_of_source("http://host/a.mp4");
    let output_dir = root.path().join(hash);
    tokio::fs::create_dir_all(&output_dir).await.unwrap();
    tokio::fs::write(
        output_dir.join("v0.m3u8"),
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n#EXT-X-MEDIA-SEQUENCE:0\n#EXTINF:4.0,\nv0-0.ts\n",
    )
    .await
    .unwrap();

    let request = Request::builder()
        .uri("/v0.m3u8?token=X")
        .header("x-source-url", "http://host/a.mp4")
        .body(Body::empty())
        .unwrap();

    let response = tokio::time::timeout(std::time::Duration::from_secs(5), router.oneshot(request))
        .await
        .expect("sub-playlist request should not hang")
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("v0-0.ts?token=X"));
    assert!(body.contains("#EXT-X-PLAYLIST-TYPE:EVENT"));
}
