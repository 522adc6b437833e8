// HTTP surface
//
// Four JSON/audio endpoints under /api plus an optional static site. Handlers
// stay thin: they parse the request, hand off to the pipeline or the clip
// operations, and turn the outcome into either an mp3 attachment or a JSON
// error body.

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State, multipart::Field, rejection::JsonRejection},
    http::{HeaderValue, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mime_guess::MimeGuess;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::clip::{ClipOperations, Track, split_filename};
use crate::config::Config;
use crate::effects::{DEFAULT_EFFECT, EFFECTS, EffectSpec};
use crate::error::{Result, VibeError};
use crate::job::ProcessingJob;
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::pipeline::ProcessingPipeline;

/// Shared, immutable request context
pub struct AppState {
    pub pipeline: ProcessingPipeline,
    pub clips: ClipOperations,
    pub temp_root: PathBuf,
    pub www_root: Option<PathBuf>,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            details: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<VibeError> for ApiError {
    fn from(err: VibeError) -> Self {
        match &err {
            VibeError::Validation(message) => Self::bad_request(message.clone()),
            _ if err.verification_required() => {
                warn!("Request blocked by host verification: {}", err);
                Self::bad_request(
                    "The video host asked for a sign-in or bot check. Try again later or pick another video.",
                )
                .with_details(err.to_string())
            }
            VibeError::AcquisitionExhausted { .. } => {
                warn!("{}", err);
                Self::bad_request("Could not download audio for this video").with_details(err.to_string())
            }
            VibeError::Media(details) => {
                error!("Media processing failed: {}", details);
                Self::internal("Audio processing failed").with_details(details.clone())
            }
            VibeError::EffectProcessing(details) => {
                Self::internal("Failed to process audio").with_details(details.clone())
            }
            _ => {
                error!("Request failed: {}", err);
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": self.message,
        });
        if let Some(details) = self.details {
            body["details"] = serde_json::Value::String(details);
        }
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct TransformRequest {
    pub url: Option<String>,
    pub effect_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct EffectsPayload {
    default: &'static str,
    effects: Vec<EffectSpec>,
}

/// Build the router around an existing state
pub fn router(state: SharedState, max_upload_mb: usize) -> Router {
    Router::new()
        .route("/api/transform", post(transform))
        .route("/api/split", post(split))
        .route("/api/mix", post(mix))
        .route("/api/health", get(health))
        .route("/api/effects", get(effects))
        .fallback(static_fallback)
        .layer(DefaultBodyLimit::max(max_upload_mb.saturating_mul(1024 * 1024)))
        .with_state(state)
}

/// Wire the service together from configuration and serve until Ctrl+C
pub async fn serve(config: Config) -> Result<()> {
    let media: Arc<dyn MediaProcessorTrait> =
        Arc::from(MediaProcessorFactory::create_processor(config.media.clone()));
    match media.check_availability().await {
        Ok(()) => {
            if let Ok(version) = media.get_version_info().await {
                info!("Using {}", version);
            }
        }
        Err(e) => warn!("{}; effect, split and mix requests will fail", e),
    }

    tokio::fs::create_dir_all(&config.workspace.temp_root).await?;

    let state = Arc::new(AppState {
        pipeline: ProcessingPipeline::new(&config, media.clone())?,
        clips: ClipOperations::new(media),
        temp_root: config.workspace.temp_root.clone(),
        www_root: config.server.www_root.clone(),
    });
    let app = router(state, config.server.max_upload_mb);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| VibeError::Config(format!("invalid listen address: {}", e)))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "message": "Service is running",
    }))
}

async fn effects() -> Json<EffectsPayload> {
    Json(EffectsPayload {
        default: DEFAULT_EFFECT,
        effects: EFFECTS.to_vec(),
    })
}

async fn transform(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<TransformRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::bad_request("Request must be JSON").with_details(rejection.body_text())
    })?;

    let url = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            ApiError::bad_request("No URL provided").with_details("Request body must include a url field")
        })?;
    info!("Transform requested for {}", url);

    let processed = state
        .pipeline
        .process(url.trim(), request.effect_type.as_deref())
        .await?;

    let filename = processed.suggested_filename();
    Ok(audio_attachment(processed.bytes, &filename))
}

async fn split(State(state): State<SharedState>, mut multipart: Multipart) -> ApiResult<Response> {
    let job = ProcessingJob::create(&state.temp_root).await?;
    let mut input = None;
    let mut start = None;
    let mut end = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio_file" => {
                let path = job.file(&upload_name("input", field.file_name()));
                save_field(field, &path).await?;
                input = Some(path);
            }
            "start_time" => start = Some(parse_number("start_time", &field_text(field).await?)?),
            "end_time" => end = Some(parse_number("end_time", &field_text(field).await?)?),
            other => warn!("Ignoring unexpected split field '{}'", other),
        }
    }

    let input = input.ok_or_else(|| ApiError::bad_request("No audio file provided"))?;
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ApiError::bad_request("Both start_time and end_time are required"));
    };

    let output = job.output_path();
    state.clips.split(&input, &output, start, end).await?;

    let bytes = read_output(&output).await?;
    job.finish();
    Ok(audio_attachment(bytes, &split_filename(start, end)))
}

/// Per-index fields collected from a mix form
#[derive(Debug, Default)]
struct TrackFields {
    path: Option<PathBuf>,
    volume: Option<f64>,
    start_time: Option<f64>,
    trim_length: Option<f64>,
}

async fn mix(State(state): State<SharedState>, mut multipart: Multipart) -> ApiResult<Response> {
    let job = ProcessingJob::create(&state.temp_root).await?;
    let mut fields: BTreeMap<usize, TrackFields> = BTreeMap::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        let Some((kind, index)) = parse_indexed_name(&name) else {
            warn!("Ignoring unexpected mix field '{}'", name);
            continue;
        };

        let entry = fields.entry(index).or_default();
        match kind {
            "track" => {
                let path = job.file(&upload_name(&format!("track_{}", index), field.file_name()));
                save_field(field, &path).await?;
                entry.path = Some(path);
            }
            "volume" => entry.volume = Some(parse_number(&name, &field_text(field).await?)?),
            "start_time" => entry.start_time = Some(parse_number(&name, &field_text(field).await?)?),
            "trim_length" => entry.trim_length = parse_optional_number(&name, &field_text(field).await?)?,
            _ => warn!("Ignoring unexpected mix field '{}'", name),
        }
    }

    let tracks = collect_tracks(fields);
    if tracks.is_empty() {
        return Err(ApiError::bad_request("No tracks provided"));
    }

    let output = job.output_path();
    state.clips.mix(&tracks, &output).await?;

    let bytes = read_output(&output).await?;
    job.finish();
    Ok(audio_attachment(bytes, "mixed.mp3"))
}

/// Ordered by index; parameters whose track never arrived are dropped
fn collect_tracks(fields: BTreeMap<usize, TrackFields>) -> Vec<Track> {
    fields
        .into_iter()
        .filter_map(|(index, fields)| {
            let Some(path) = fields.path else {
                warn!("Parameters for track {} arrived without a file", index);
                return None;
            };
            let mut track = Track::new(path);
            if let Some(volume) = fields.volume {
                track.volume = volume;
            }
            if let Some(start_time) = fields.start_time {
                track.start_time = start_time;
            }
            track.trim_length = fields.trim_length;
            Some(track)
        })
        .collect()
}

/// Split `volume_3` into ("volume", 3)
fn parse_indexed_name(name: &str) -> Option<(&str, usize)> {
    let (kind, index) = name.rsplit_once('_')?;
    let index = index.parse().ok()?;
    matches!(kind, "track" | "volume" | "start_time" | "trim_length").then_some((kind, index))
}

fn parse_number(name: &str, text: &str) -> ApiResult<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::bad_request(format!("Invalid value for {}: '{}'", name, text.trim())))
}

/// Blank means "not set"
fn parse_optional_number(name: &str, text: &str) -> ApiResult<Option<f64>> {
    if text.trim().is_empty() {
        Ok(None)
    } else {
        parse_number(name, text).map(Some)
    }
}

/// Local name for an upload, keeping a sane extension from the client's name
fn upload_name(stem: &str, client_name: Option<&str>) -> String {
    let extension = client_name
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}

async fn save_field(mut field: Field<'_>, path: &Path) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path).await.map_err(VibeError::from)?;
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
        file.write_all(&chunk).await.map_err(VibeError::from)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(VibeError::from)?;

    if written == 0 {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    Ok(written)
}

async fn field_text(field: Field<'_>) -> ApiResult<String> {
    field.text().await.map_err(bad_multipart)
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request("Invalid multipart form").with_details(err.body_text())
}

async fn read_output(path: &Path) -> ApiResult<Vec<u8>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        error!("Could not read {}: {}", path.display(), e);
        ApiError::internal("Audio processing failed")
    })?;
    if bytes.is_empty() {
        return Err(ApiError::internal("Audio processing failed").with_details("output is empty"));
    }
    Ok(bytes)
}

fn audio_attachment(bytes: Vec<u8>, filename: &str) -> Response {
    let length = bytes.len();
    let mut response = Body::from(bytes).into_response();
    let headers = response.headers_mut();

    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    response
}

async fn static_fallback(State(state): State<SharedState>, req: Request<Body>) -> Response {
    let path = req.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::not_found("endpoint not found").into_response();
    }

    let Some(root) = state.www_root.as_deref() else {
        return ApiError::not_found("file not found").into_response();
    };

    match serve_www_path(root, path).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn serve_www_path(root: &Path, request_path: &str) -> ApiResult<Response> {
    let mut target = resolve_www_path(root, request_path)?;
    if tokio::fs::metadata(&target).await.map(|m| m.is_dir()).unwrap_or(false) {
        target = target.join("index.html");
    }

    let bytes = tokio::fs::read(&target)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let mime = MimeGuess::from_path(&target).first_or_octet_stream();

    let mut response = Body::from(bytes).into_response();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}

fn resolve_www_path(root: &Path, request_path: &str) -> ApiResult<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(root.join("index.html"));
    }
    let candidate = Path::new(trimmed);
    if candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::not_found("file not found"));
    }
    Ok(root.join(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::{AcquisitionBackend, AcquisitionOrchestrator, AcquisitionResult, MockAcquisitionBackend};
    use crate::effects::EffectEngine;
    use crate::media::MockMediaProcessorTrait;
    use axum::body::to_bytes;
    use axum::extract::FromRequest;
    use serde_json::Value;

    struct TestContext {
        _temp: tempfile::TempDir,
        state: SharedState,
    }

    impl TestContext {
        fn new(backends: Vec<MockAcquisitionBackend>, media: MockMediaProcessorTrait) -> Self {
            let temp = tempfile::tempdir().unwrap();
            let temp_root = temp.path().join("jobs");
            std::fs::create_dir_all(&temp_root).unwrap();
            let www_root = temp.path().join("www");
            std::fs::create_dir_all(&www_root).unwrap();

            let media: Arc<dyn MediaProcessorTrait> = Arc::new(media);
            let backends = backends
                .into_iter()
                .map(|b| Box::new(b) as Box<dyn AcquisitionBackend>)
                .collect();
            let pipeline = ProcessingPipeline::with_parts(
                temp_root.clone(),
                AcquisitionOrchestrator::new(backends),
                EffectEngine::new(media.clone()),
            );

            let state = Arc::new(AppState {
                pipeline,
                clips: ClipOperations::new(media),
                temp_root,
                www_root: Some(www_root),
            });
            Self { _temp: temp, state }
        }

        fn jobs_left(&self) -> usize {
            std::fs::read_dir(&self.state.temp_root).unwrap().count()
        }
    }

    fn untouched(name: &'static str) -> MockAcquisitionBackend {
        let mut backend = MockAcquisitionBackend::new();
        backend.expect_name().return_const(name);
        backend.expect_fetch().times(0);
        backend
    }

    fn idle_media() -> MockMediaProcessorTrait {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_apply_filter_graph().times(0);
        media.expect_split_audio().times(0);
        media.expect_mix_audio().times(0);
        media
    }

    fn transform_body(url: Option<&str>, effect: Option<&str>) -> std::result::Result<Json<TransformRequest>, JsonRejection> {
        Ok(Json(TransformRequest {
            url: url.map(str::to_string),
            effect_type: effect.map(str::to_string),
        }))
    }

    async fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Multipart {
        let boundary = "vibeshift-test-boundary";
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            let disposition = match filename {
                Some(file) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\nContent-Type: audio/mpeg\r\n\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn transform_rejects_non_url_without_backend_calls() {
        let ctx = TestContext::new(vec![untouched("native"), untouched("yt-dlp"), untouched("remote-api")], idle_media());

        let err = transform(State(ctx.state.clone()), transform_body(Some("not a url"), None))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid YouTube URL");
        assert_eq!(ctx.jobs_left(), 0);
    }

    #[tokio::test]
    async fn transform_requires_url() {
        let ctx = TestContext::new(vec![untouched("native")], idle_media());

        let err = transform(State(ctx.state.clone()), transform_body(None, Some("dark")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "No URL provided");
    }

    #[tokio::test]
    async fn transform_returns_attachment() {
        let mut backend = MockAcquisitionBackend::new();
        backend.expect_name().return_const("native");
        backend
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(AcquisitionResult::bytes("native", b"source".to_vec())));

        let mut media = MockMediaProcessorTrait::new();
        media.expect_apply_filter_graph().times(1).returning(|_, output, _| {
            std::fs::write(output, b"ID3cute").unwrap();
            Ok(())
        });

        let ctx = TestContext::new(vec![backend], media);
        let response = transform(
            State(ctx.state.clone()),
            transform_body(Some("https://youtu.be/dQw4w9WgXcQ"), Some("cute")),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "audio/mpeg");
        assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "7");
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"cute_dQw4w9WgXcQ.mp3\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"ID3cute");
        assert_eq!(ctx.jobs_left(), 0);
    }

    #[tokio::test]
    async fn exhausted_sources_map_to_bad_request() {
        let err = ApiError::from(VibeError::AcquisitionExhausted {
            failures: vec!["native: blocked".into()],
            verification_required: true,
        });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("bot check"));
        assert!(err.details.unwrap().contains("native: blocked"));

        let err = ApiError::from(VibeError::Internal("secret path /tmp/x".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.details.is_none());
    }

    #[tokio::test]
    async fn split_checks_range_before_ffmpeg() {
        let ctx = TestContext::new(vec![], idle_media());
        let form = multipart(&[
            ("audio_file", Some("song.mp3"), b"ID3data"),
            ("start_time", None, b"10"),
            ("end_time", None, b"10"),
        ])
        .await;

        let err = split(State(ctx.state.clone()), form).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(ctx.jobs_left(), 0);
    }

    #[tokio::test]
    async fn split_rejects_unparsable_numbers() {
        let ctx = TestContext::new(vec![], idle_media());
        let form = multipart(&[
            ("audio_file", Some("song.mp3"), b"ID3data"),
            ("start_time", None, b"ten"),
            ("end_time", None, b"20"),
        ])
        .await;

        let err = split(State(ctx.state.clone()), form).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("start_time"));
    }

    #[tokio::test]
    async fn split_returns_named_attachment() {
        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_split_audio()
            .withf(|_, _, start, duration| *start == 5.0 && *duration == 7.5)
            .times(1)
            .returning(|_, output, _, _| {
                std::fs::write(output, b"ID3clip").unwrap();
                Ok(())
            });

        let ctx = TestContext::new(vec![], media);
        let form = multipart(&[
            ("audio_file", Some("song.mp3"), b"ID3data"),
            ("start_time", None, b"5"),
            ("end_time", None, b"12.5"),
        ])
        .await;

        let response = split(State(ctx.state.clone()), form).await.unwrap();
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"split_5_12.5.mp3\""
        );
        assert_eq!(ctx.jobs_left(), 0);
    }

    #[tokio::test]
    async fn mix_without_tracks_is_bad_request() {
        let ctx = TestContext::new(vec![], idle_media());
        let form = multipart(&[("volume_0", None, b"80")]).await;

        let err = mix(State(ctx.state.clone()), form).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "No tracks provided");
    }

    #[tokio::test]
    async fn mix_orders_tracks_by_index() {
        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_mix_audio()
            .withf(|inputs, _, graph| {
                inputs.len() == 2
                    && inputs[0].file_name().unwrap() == "track_0.mp3"
                    && inputs[1].file_name().unwrap() == "track_2.wav"
                    && graph.contains("[1:a]volume=0.5,adelay=1000|1000[a1]")
            })
            .times(1)
            .returning(|_, output, _| {
                std::fs::write(output, b"ID3mix").unwrap();
                Ok(())
            });

        let ctx = TestContext::new(vec![], media);
        let form = multipart(&[
            ("track_2", Some("second.wav"), b"RIFF"),
            ("volume_2", None, b"50"),
            ("start_time_2", None, b"1"),
            ("track_0", Some("first.mp3"), b"ID3"),
            ("trim_length_0", None, b""),
        ])
        .await;

        let response = mix(State(ctx.state.clone()), form).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"mixed.mp3\""
        );
    }

    #[test]
    fn indexed_names() {
        assert_eq!(parse_indexed_name("track_0"), Some(("track", 0)));
        assert_eq!(parse_indexed_name("start_time_12"), Some(("start_time", 12)));
        assert_eq!(parse_indexed_name("trim_length_3"), Some(("trim_length", 3)));
        assert_eq!(parse_indexed_name("track_x"), None);
        assert_eq!(parse_indexed_name("pan_1"), None);
    }

    #[test]
    fn upload_names_keep_simple_extensions() {
        assert_eq!(upload_name("input", Some("My Song.MP3")), "input.mp3");
        assert_eq!(upload_name("input", Some("../../etc/passwd")), "input");
        assert_eq!(upload_name("input", None), "input");
    }

    #[tokio::test]
    async fn health_reports_running() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["message"], "Service is running");
    }

    #[tokio::test]
    async fn effects_lists_table() {
        let Json(payload) = effects().await;
        assert_eq!(payload.default, "slow_reverb");
        assert_eq!(payload.effects.len(), 10);
    }

    #[tokio::test]
    async fn static_fallback_serves_index_and_rejects_traversal() {
        let ctx = TestContext::new(vec![], idle_media());
        let root = ctx.state.www_root.clone().unwrap();
        std::fs::write(root.join("index.html"), "<html>vibe</html>").unwrap();

        let response = serve_www_path(&root, "/").await.unwrap();
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/html");

        let err = serve_www_path(&root, "/../secret.txt").await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_api_route_is_json_404() {
        let ctx = TestContext::new(vec![], idle_media());
        let request = Request::builder().uri("/api/nope").body(Body::empty()).unwrap();

        let response = static_fallback(State(ctx.state.clone()), request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "endpoint not found");
    }
}
