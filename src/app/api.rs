use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use tower_http::services::ServeDir;

use crate::{
    app::{Interrupt, Interrupts, PickError, Settings, blocking, detect},
    motion::{MotionReport, MotionState},
    robot::Pose,
    store::DetectionStore,
    transform::Homography,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Job {
    Detect,
    Pick,
}

/// Runs are non-reentrant: at most one job at a time
#[derive(Debug, Default)]
struct Runs {
    job: Option<Job>,
    last: Option<MotionReport>,
    error: Option<String>,
}

#[derive(Clone)]
struct ApiState {
    settings: Arc<Settings>,
    runs: Arc<Mutex<Runs>>,
    interrupts: Interrupts,
}

impl ApiState {
    fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            runs: Arc::new(Mutex::new(Runs::default())),
            interrupts: Interrupts::new(),
        }
    }

    fn runs(&self) -> MutexGuard<'_, Runs> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, job: Job) -> Result<RunGuard, (StatusCode, Json<ApiError>)> {
        let mut runs = self.runs();
        if let Some(active) = runs.job {
            log::warn!("Rejecting {:?} while {:?} is running", job, active);
            return Err((
                StatusCode::CONFLICT,
                Json(ApiError {
                    ok: false,
                    error: format!("{:?} already running", active),
                }),
            ));
        }
        runs.job = Some(job);
        Ok(RunGuard {
            runs: self.runs.clone(),
        })
    }
}

/// Clears the active job when the blocking work it travels with finishes
struct RunGuard {
    runs: Arc<Mutex<Runs>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).job = None;
    }
}

#[derive(Clone, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[derive(Clone, Debug, Serialize)]
struct ApiError {
    ok: bool,
    error: String,
}

#[derive(Clone, Debug, Serialize)]
struct ApiResponse {
    ok: bool,
    error: String,
}

#[derive(Clone, Debug, Serialize)]
struct RobotStatus {
    link: String,
    /// The arm is held by a pick run
    connected: bool,
    status: String,
    state: Option<MotionState>,
    position: Option<Pose>,
    error: Option<String>,
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<ApiError>)>;

fn failure(e: PickError) -> (StatusCode, Json<ApiError>) {
    let code = if e.is_fatal() {
        log::error!("API request failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        log::warn!("API request ended: {}", e);
        StatusCode::OK
    };
    (
        code,
        Json(ApiError {
            ok: false,
            error: e.to_string(),
        }),
    )
}

fn routes(state: ApiState) -> Router {
    Router::new()
        .nest_service("/static", ServeDir::new("./static"))
        .route("/api/health", get(get_health))
        .route("/api/colors", get(get_colors))
        .route("/api/positions", get(get_positions))
        .route("/api/matrix", get(get_matrix))
        .route("/api/detect", post(post_detect))
        .route("/api/pick", post(post_pick))
        .route("/api/stop", post(post_stop))
        .route("/api/robot/status", get(get_robot_status))
        .with_state(state)
}

/// HTTP front end: status of the shared files and the arm, and triggers for
/// detect and pick runs
pub async fn serve(settings: Settings) -> Result<(), PickError> {
    let listener = tokio::net::TcpListener::bind(&settings.bind)
        .await
        .map_err(|e| PickError::DeviceUnavailable(format!("{}: {}", settings.bind, e)))?;
    log::info!("Serving API on {}", settings.bind);

    let state = ApiState::new(settings);
    let interrupts = state.interrupts.clone();
    axum::serve(listener, routes(state))
        .with_graceful_shutdown(async move {
            super::shutdown_signal().await;
            if interrupts.deliver() == Interrupt::Forwarded {
                log::info!("Stopping detection for shutdown");
            }
        })
        .await
        .map_err(|e| PickError::DeviceUnavailable(e.to_string()))
}

#[axum::debug_handler]
async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[axum::debug_handler]
async fn get_colors(State(state): State<ApiState>) -> ApiResult {
    let path = state.settings.profiles.clone();
    blocking(move || {
        if !path.exists() {
            return Ok(Value::Object(Default::default()));
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| PickError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| PickError::Config(e.to_string()))
    })
    .await
    .map(Json)
    .map_err(failure)
}

#[axum::debug_handler]
async fn get_positions(State(state): State<ApiState>) -> ApiResult {
    let store = DetectionStore::new(&state.settings.record);
    match blocking(move || store.load()).await {
        Ok(d) => Ok(Json(serde_json::json!([d]))),
        Err(PickError::NotFound(_)) => Ok(Json(serde_json::json!([]))),
        Err(e) => Err(failure(e)),
    }
}

#[axum::debug_handler]
async fn get_matrix(State(state): State<ApiState>) -> ApiResult {
    let path = state.settings.matrix.clone();
    blocking(move || {
        if !path.exists() {
            return Ok(Value::Null);
        }
        Homography::load(&path).map(|h| serde_json::json!(h.rows()))
    })
    .await
    .map(Json)
    .map_err(failure)
}

#[axum::debug_handler]
async fn post_detect(State(state): State<ApiState>) -> ApiResult {
    let guard = state.begin(Job::Detect)?;
    let settings = state.settings.clone();
    let interrupts = state.interrupts.clone();
    let quit = interrupts.arm();

    let res = blocking(move || {
        let _guard = guard;
        let res = detect::run_detect(&settings, quit);
        interrupts.disarm();
        res
    })
    .await;

    state.runs().error = res.as_ref().err().map(|e| e.to_string());
    res.map(|d| Json(serde_json::json!({ "ok": true, "detection": d })))
        .map_err(failure)
}

#[axum::debug_handler]
async fn post_pick(State(state): State<ApiState>) -> ApiResult {
    let guard = state.begin(Job::Pick)?;
    let settings = state.settings.clone();

    let res = blocking(move || {
        let _guard = guard;
        detect::run_pick(&settings)
    })
    .await;

    let mut runs = state.runs();
    match res {
        Ok(report) => {
            runs.last = Some(report);
            runs.error = None;
            Ok(Json(serde_json::json!({ "ok": true, "report": report })))
        }
        Err(e) => {
            runs.error = Some(e.to_string());
            Err(failure(e))
        }
    }
}

/// Ask a running detection to stop at its next frame
#[axum::debug_handler]
async fn post_stop(State(state): State<ApiState>) -> Json<ApiResponse> {
    match state.interrupts.deliver() {
        Interrupt::Forwarded => Json(ApiResponse {
            ok: true,
            error: "".to_string(),
        }),
        Interrupt::Unhandled => Json(ApiResponse {
            ok: false,
            error: "No detection running".to_string(),
        }),
    }
}

#[axum::debug_handler]
async fn get_robot_status(State(state): State<ApiState>) -> Json<RobotStatus> {
    let runs = state.runs();
    let status = match runs.job {
        None => "ready",
        Some(Job::Detect) => "detecting",
        Some(Job::Pick) => "picking",
    };
    Json(RobotStatus {
        link: state.settings.link.info(),
        connected: runs.job == Some(Job::Pick),
        status: status.to_string(),
        state: runs.last.map(|r| r.state),
        position: runs.last.and_then(|r| r.pose),
        error: runs.error.clone(),
    })
}
