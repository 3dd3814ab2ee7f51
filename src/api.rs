//! REST API for the placement service.
//!
//! Accepts plan requests, streams sequence progress and answers the
//! interactive queries (snap points, moving pick checks). Uses Axum as the
//! web framework and supports CORS.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::annotate::{ApproachOverride, ApproachSettings, PlacementAnnotation};
use crate::collision::{CollisionChecker, Violation};
use crate::config::{ApiConfig, PlanningConfig};
use crate::error::{ErrorKind, PlanError, PlanResult};
use crate::frame::{CoordinateFrame, ProjectedLayer};
use crate::metrics::SequenceMetrics;
use crate::model::{
    BlockId, Box3D, BoxOverride, Corner, Layer, LayerSequence, OrientationMode, Pallet, Pick,
    PickId, Tool,
};
use crate::pipeline::{LevelReport, PlanJob, PlanOutcome, PlanningPipeline};
use crate::sequence::{SequenceEvent, SequenceRequest};
use crate::snap::{SnapPoint, SnapPointGenerator, ToolPose};
use crate::types::Vec3;
use crate::types::validation::validate_non_negative;

#[derive(Clone)]
struct ApiState {
    pipeline: PlanningPipeline,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>stack-it-now API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
</html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the plan endpoints.
///
/// Block-keyed maps accept keys like `"B3"` or `"3"`. Everything except
/// pallet, box and tool is optional.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "pallet": { "id": "EUR", "width": 1200.0, "depth": 800.0, "height": 144.0 },
        "box": { "id": "BX-40", "width": 400.0, "depth": 300.0, "height": 150.0, "weight": 5.0 },
        "tool": { "id": "VAC-1", "width": 100.0, "depth": 100.0 },
        "sequence": { "layers": 4, "corners": ["SW", "NE"] }
    })
)]
pub struct PlanRequest {
    pub pallet: Pallet,
    #[serde(rename = "box")]
    pub box_spec: Box3D,
    #[serde(default)]
    #[schema(nullable = true)]
    pub box_override: Option<BoxOverride>,
    pub tool: Tool,
    #[serde(default)]
    pub corner: Corner,
    #[serde(default)]
    pub orientation_mode: OrientationMode,
    #[serde(default)]
    #[schema(nullable = true)]
    pub overhang_x: Option<f64>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub overhang_y: Option<f64>,
    #[serde(default)]
    pub block_offsets: BTreeMap<String, Vec3>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub sequence: Option<SequenceRequest>,
    #[serde(default)]
    pub frame: CoordinateFrame,
    #[serde(default)]
    #[schema(nullable = true)]
    pub approach: Option<ApproachSettings>,
    #[serde(default)]
    pub approach_overrides: BTreeMap<String, ApproachOverride>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub check_approach: Option<bool>,
}

impl PlanRequest {
    fn into_job(self) -> PlanResult<PlanJob> {
        let block_offsets = parse_block_keys(self.block_offsets)?;
        let approach_overrides = parse_block_keys(self.approach_overrides)?;

        let mut job = PlanJob::new(self.pallet, self.box_spec, self.tool);
        job.box_override = self.box_override;
        job.corner = self.corner;
        job.orientation_mode = self.orientation_mode;
        job.overhang_x = self.overhang_x;
        job.overhang_y = self.overhang_y;
        job.block_offsets = block_offsets;
        if let Some(sequence) = self.sequence {
            job.sequence = sequence;
        }
        job.frame = self.frame;
        job.approach = self.approach;
        job.approach_overrides = approach_overrides;
        job.check_approach = self.check_approach;
        Ok(job)
    }
}

fn parse_block_keys<T>(entries: BTreeMap<String, T>) -> PlanResult<BTreeMap<BlockId, T>> {
    entries
        .into_iter()
        .map(|(key, value)| Ok((key.parse::<BlockId>()?, value)))
        .collect()
}

/// Complete plan. `sequence` is in the native pallet frame, all other
/// coordinates are expressed in `frame`.
#[derive(Serialize, ToSchema)]
pub struct PlanResponse {
    pub frame: CoordinateFrame,
    pub sequence: LayerSequence,
    pub layers: Vec<ProjectedLayer>,
    pub annotations: Vec<PlacementAnnotation>,
    pub reports: Vec<LevelReport>,
    pub metrics: SequenceMetrics,
    pub violation_count: usize,
    pub is_clean: bool,
}

impl From<PlanOutcome> for PlanResponse {
    fn from(outcome: PlanOutcome) -> Self {
        let violation_count = outcome.violation_count();
        let PlanOutcome {
            frame,
            sequence,
            layers,
            annotations,
            reports,
            metrics,
        } = outcome;

        Self {
            frame,
            sequence,
            layers,
            annotations,
            reports,
            metrics,
            violation_count,
            is_clean: violation_count == 0,
        }
    }
}

/// Snap point query against a layer snapshot in native coordinates.
#[derive(Deserialize, ToSchema)]
pub struct SnapPointsRequest {
    pub layer: Layer,
    pub tool: Tool,
    #[serde(default)]
    #[schema(nullable = true)]
    pub pose: Option<ToolPose>,
    #[serde(default)]
    pub frame: CoordinateFrame,
}

#[derive(Serialize, ToSchema)]
pub struct SnapPointsResponse {
    pub frame: CoordinateFrame,
    pub points: Vec<SnapPoint>,
}

/// Validation of a pick being moved within a layer snapshot.
#[derive(Deserialize, ToSchema)]
pub struct CheckPickRequest {
    pub layer: Layer,
    pub pick: Pick,
    #[serde(default)]
    #[schema(nullable = true)]
    pub clearance: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckPickResponse {
    pub pick: PickId,
    pub valid: bool,
    pub violations: Vec<Violation>,
}

fn snap_points(request: SnapPointsRequest) -> PlanResult<SnapPointsResponse> {
    request.layer.pallet.validate()?;
    request.tool.validate()?;
    let points = SnapPointGenerator.generate(
        &request.layer,
        &request.layer.pallet,
        &request.tool,
        request.pose.as_ref(),
    );
    let transform = request.frame.transform(&request.layer.pallet);
    Ok(SnapPointsResponse {
        frame: request.frame,
        points: transform.project_snap_points(&points),
    })
}

fn check_pick(
    request: CheckPickRequest,
    defaults: &CollisionChecker,
) -> PlanResult<CheckPickResponse> {
    request.layer.pallet.validate()?;
    request.layer.box_spec.validate()?;
    if !request.pick.center.is_finite() {
        return Err(PlanError::invalid_parameter(format!(
            "position of {} must be finite",
            request.pick.id
        )));
    }
    let checker = match request.clearance {
        Some(clearance) => {
            validate_non_negative(clearance, "clearance")?;
            CollisionChecker::new(clearance)
        }
        None => *defaults,
    };

    let violations = checker.check_moving_pick(&request.layer, &request.pick);
    Ok(CheckPickResponse {
        pick: request.pick.id,
        valid: violations.is_empty(),
        violations,
    })
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn plan_error(err: PlanError) -> Response {
    match err.kind() {
        ErrorKind::Configuration => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid input data",
            err.to_string(),
        ),
        ErrorKind::InvariantBreach => {
            error!(%err, "planner produced an inconsistent layer");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Planner invariant breached",
                err.to_string(),
            )
        }
    }
}

fn parse_plan_request(
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<PlanJob, Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;
    payload.into_job().map_err(plan_error)
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_plan, handle_plan_stream, handle_snap_points, handle_check_pick),
    components(
        schemas(
            PlanRequest,
            PlanResponse,
            SnapPointsRequest,
            SnapPointsResponse,
            CheckPickRequest,
            CheckPickResponse,
            ErrorResponse,
            SequenceEvent,
            Violation,
            LevelReport
        )
    ),
    tags(
        (name = "planning", description = "Pallet layer and stack planning"),
        (name = "interactive", description = "Queries for interactive placement correction")
    )
)]
struct ApiDoc;

/// Builds the router with all endpoints.
fn router(pipeline: PlanningPipeline) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/plan", post(handle_plan))
        .route("/plan_stream", post(handle_plan_stream))
        .route("/snap_points", post(handle_snap_points))
        .route("/check_pick", post(handle_check_pick))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ApiState { pipeline })
}

/// Starts the API server and blocks until it terminates.
///
/// Fails only when the listener cannot be bound.
pub async fn start_api_server(
    config: ApiConfig,
    planning: PlanningConfig,
) -> std::io::Result<()> {
    let app = router(planning.pipeline());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("Local access: http://localhost:{}", config.port());
    }
    info!("Endpoints: POST /plan, POST /plan_stream, POST /snap_points, POST /check_pick");
    info!("Documentation: GET /docs, GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        error!("API server terminated with an error: {err}");
    }
    Ok(())
}

/// Handler for POST /plan.
///
/// Plans the base layer, stacks it, checks and annotates every level and
/// returns the projected result.
#[utoipa::path(
    post,
    path = "/plan",
    request_body = PlanRequest,
    responses(
        (status = 200, description = "Plan computed", body = PlanResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid dimensions, parameters or block references",
            body = ErrorResponse
        ),
        (
            status = INTERNAL_SERVER_ERROR,
            description = "Planner produced an inconsistent decomposition",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_plan(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Response {
    let job = match parse_plan_request(payload) {
        Ok(job) => job,
        Err(response) => return response,
    };

    info!(
        pallet = %job.pallet.id,
        box_id = %job.box_spec.id,
        levels = job.sequence.layers,
        "new plan request"
    );
    match state.pipeline.run(&job) {
        Ok(outcome) => (StatusCode::OK, Json(PlanResponse::from(outcome))).into_response(),
        Err(err) => plan_error(err),
    }
}

/// Handler for POST /plan_stream (SSE).
///
/// Streams sequence events while the plan is computed, followed by a final
/// `Plan` event with the complete result or a `Failed` event.
#[utoipa::path(
    post,
    path = "/plan_stream",
    request_body = PlanRequest,
    responses(
        (
            status = 200,
            description = "Streams sequence events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_plan_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Response {
    let job = match parse_plan_request(payload) {
        Ok(job) => job,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);
    let pipeline = state.pipeline;

    tokio::task::spawn_blocking(move || {
        let result = pipeline.run_with_progress(&job, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver only means the client went away.
                let _ = tx.blocking_send(json);
            }
        });
        let last = match result {
            Ok(outcome) => json!({ "type": "Plan", "plan": PlanResponse::from(outcome) }),
            Err(err) => {
                warn!(%err, "streamed plan failed");
                json!({ "type": "Failed", "error": err.to_string() })
            }
        };
        let _ = tx.blocking_send(last.to_string());
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /snap_points.
#[utoipa::path(
    post,
    path = "/snap_points",
    request_body = SnapPointsRequest,
    responses(
        (status = 200, description = "Snap points in the requested frame", body = SnapPointsResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "interactive"
)]
async fn handle_snap_points(payload: Result<Json<SnapPointsRequest>, JsonRejection>) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    match snap_points(request) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => plan_error(err),
    }
}

/// Handler for POST /check_pick.
///
/// Violations are findings, not errors: the response is 200 either way.
#[utoipa::path(
    post,
    path = "/check_pick",
    request_body = CheckPickRequest,
    responses(
        (status = 200, description = "Check result for the moved pick", body = CheckPickResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "interactive"
)]
async fn handle_check_pick(
    State(state): State<ApiState>,
    payload: Result<Json<CheckPickRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    match check_pick(request, state.pipeline.checker()) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => plan_error(err),
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
