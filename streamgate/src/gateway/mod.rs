//! HTTP Gateway (C6, §4.6).
//!
//! A single handler implements the middleware chain in order — context
//! setup, done intercept, touch, CORS, wait-for-playlist, playlist
//! enrichment, transcode trigger, static file — rather than a `tower`
//! layer stack, since every step after CORS needs the same
//! [`context::RequestContext`] and most are conditional on the request
//! path. `router` is the single entry point [`crate::orchestrator`] binds
//! to a listener.

pub mod context;
pub mod player;
pub mod state;

use std::path::Path;
use std::time::Duration;

use axum::extract::{OriginalUri, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;
use crate::planner::HLSPlan;
use crate::{enricher, planner, probe, transcoder};
use context::RequestContext;
pub use state::AppState;

const MASTER_PLAYLIST: &str = "index.m3u8";
const DONE_MARKER: &str = "done";
const PLAYLIST_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn router(state: AppState) -> Router {
    Router::new().route("/", any(handle)).route("/{*path}", any(handle)).with_state(state)
}

async fn handle(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().trim_start_matches('/').to_string();
    let query = uri.query().unwrap_or("").to_string();

    if state.cfg.player && (path.is_empty() || path == "player" || path == "player/") {
        let source_url = context::resolve(&state.cfg, &headers, &query)
            .await
            .map(|ctx| ctx.source_url)
            .unwrap_or_default();
        return player_response(&source_url);
    }

    let ctx = match context::resolve(&state.cfg, &headers, &query).await {
        Ok(ctx) => ctx,
        Err(e) => return ApiError::from(e).into_response(),
    };

    if has_done_query(&query) {
        return done_response(&ctx).await;
    }

    let job = match state.job_for(&ctx.output_dir).await {
        Ok(job) => job,
        Err(e) => return ApiError::from(e).into_response(),
    };

    if job.should_touch() {
        let touch_path = ctx.output_dir.join(".touch");
        if let Err(e) = tokio::fs::write(&touch_path, b"").await {
            tracing::warn!(path = %touch_path.display(), error = %e, "failed to write touch marker");
        }
    }
    state.idle.touch();

    let response = if path.is_empty() {
        ApiError::from(crate::Error::InputInvalid).into_response()
    } else if path == MASTER_PLAYLIST {
        serve_master_playlist(&state, &ctx).await
    } else if path.ends_with(".m3u8") {
        serve_sub_playlist(&ctx, &path, &query).await
    } else {
        serve_waited_file(&job, &ctx, &path).await
    };

    apply_cors(response, &headers)
}

fn has_done_query(query: &str) -> bool {
    url::form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == "done")
}

async fn done_response(ctx: &RequestContext) -> Response {
    match tokio::fs::try_exists(ctx.output_dir.join(DONE_MARKER)).await {
        Ok(true) => StatusCode::OK.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn player_response(source_url: &str) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        player::render(source_url),
    )
        .into_response()
}

fn apply_cors(mut response: Response, headers: &HeaderMap) -> Response {
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    if headers.contains_key(header::ORIGIN) {
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    response
}

/// §4.6 step 7: ensure `outputDir`, probe, plan, write the master
/// playlist, then kick off the transcoder. Idempotent: once
/// `index.m3u8` exists on disk it is served as-is without re-probing.
async fn serve_master_playlist(state: &AppState, ctx: &RequestContext) -> Response {
    let master_path = ctx.output_dir.join(MASTER_PLAYLIST);

    let plan = match tokio::fs::read(&master_path).await {
        Ok(bytes) => return raw_file_response(&master_path, bytes),
        Err(_) => match build_and_write_plan(state, ctx, &master_path).await {
            Ok(plan) => plan,
            Err(e) => return ApiError::from(e).into_response(),
        },
    };

    spawn_transcoder(state, ctx, plan);

    match tokio::fs::read(&master_path).await {
        Ok(bytes) => raw_file_response(&master_path, bytes),
        Err(e) => ApiError::from(crate::Error::io_path("reading master playlist", &master_path, e)).into_response(),
    }
}

async fn build_and_write_plan(state: &AppState, ctx: &RequestContext, master_path: &Path) -> crate::Result<HLSPlan> {
    let input = ctx.source_url.clone();
    let output_dir = ctx.output_dir.clone();
    let cfg = state.cfg.clone();
    let probe_cache = state.probe_cache.clone();

    let probe_result = probe_cache
        .get_or_probe(&input, &output_dir, move || {
            let input = input.clone();
            let output_dir = output_dir.clone();
            let cfg = cfg.clone();
            async move { probe::probe(&input, &output_dir, &cfg).await.map_err(|e| e.to_string()) }
        })
        .await
        .map_err(crate::Error::ProbeUnavailable)?;

    let plan = planner::plan(&ctx.source_url, &probe_result, &state.cfg)?;

    let bytes = plan.master_playlist.as_bytes();
    crate::utils::fs::write_atomic(master_path, bytes).await?;

    Ok(plan)
}

/// Fire the transcoder in the background; the pool's LoadOrStore ensures
/// only the first caller for `output_dir` actually spawns a subprocess
/// (§4.3 at-most-one guarantee).
fn spawn_transcoder(state: &AppState, ctx: &RequestContext, plan: HLSPlan) {
    let pool = state.transcode_pool.clone();
    let cfg = state.cfg.clone();
    let input = ctx.source_url.clone();
    let output_dir = ctx.output_dir.clone();
    let key = output_dir.display().to_string();
    let failure_dir = output_dir.clone();
    let guard = state.track_transcode();

    tokio::spawn(async move {
        let _guard = guard;
        let outcome = pool
            .ensure_running(&key, || async move {
                transcoder::run(&input, &output_dir, &plan, &cfg, CancellationToken::new())
                    .await
                    .map_err(|e| e.to_string())
            })
            .await;

        if let Err(message) = outcome {
            crate::orchestrator::record_transcode_failure(&failure_dir, &message).await;
        }
    });
}

/// §4.6 step 5 + §4.5: poll every 500 ms until the sub-playlist exists and
/// passes validation (or the connection drops and this future is
/// dropped), then return the enriched body.
async fn serve_sub_playlist(ctx: &RequestContext, path: &str, query: &str) -> Response {
    let file_path = ctx.output_dir.join(path);

    loop {
        match tokio::fs::read_to_string(&file_path).await {
            Ok(body) => match enricher::enrich(&body, query) {
                Ok((rewritten, _ended)) => {
                    return (
                        [
                            (header::CONTENT_TYPE, "application/vnd.apple.mpegurl"),
                            (header::CONTENT_LENGTH, &rewritten.len().to_string()),
                        ],
                        rewritten,
                    )
                        .into_response();
                }
                Err(_) => tokio::time::sleep(PLAYLIST_POLL_INTERVAL).await,
            },
            Err(_) => tokio::time::sleep(PLAYLIST_POLL_INTERVAL).await,
        }
    }
}

/// §4.6 step 8 for everything that isn't a playlist: block on the Waiter
/// (C4) until the file exists, then serve its raw bytes.
async fn serve_waited_file(job: &state::JobState, ctx: &RequestContext, path: &str) -> Response {
    use crate::waiter::WaitOutcome;

    match job.waiter.wait(path, CancellationToken::new()).await {
        WaitOutcome::Cancelled => StatusCode::from_u16(499).unwrap().into_response(),
        WaitOutcome::Released => {
            let file_path = ctx.output_dir.join(path);
            match tokio::fs::read(&file_path).await {
                Ok(bytes) => raw_file_response(&file_path, bytes),
                Err(_) => StatusCode::NOT_FOUND.into_response(),
            }
        }
    }
}

fn raw_file_response(path: &Path, bytes: Vec<u8>) -> Response {
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("vtt") => "text/vtt",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    };
    ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
}
