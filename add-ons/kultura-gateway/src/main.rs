//! Axum-based API gateway for KulturaMind. Config-driven via KulturaConfig.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    extract::Json,
    http::{Method, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use futures_util::stream::StreamExt;
use kultura_core::{
    CommunityLedger, ContributionType, KnowledgeStore, KulturaConfig, MetricsTracker, StoreError,
};
use kultura_pipeline::{
    LlmClient, QueryOptions, RagPipeline, Reasoner, SearchIndex, WebAgent,
};
use std::path::Path as StdPath;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pre-flight check: verify the Sled DBs open, seed files parse, and the
/// port is available.
fn run_verify() -> Result<(), String> {
    let config = KulturaConfig::load().map_err(|e| format!("Config load failed: {}", e))?;
    let storage = StdPath::new(&config.storage_path);

    print!("Checking kultura_knowledge... ");
    let store = KnowledgeStore::open_path(storage.join("kultura_knowledge"))
        .map_err(|e| format!("kultura_knowledge LOCKED or inaccessible: {}", e))?;
    let items = store
        .item_count()
        .map_err(|e| format!("item scan failed: {}", e))?;
    drop(store);
    println!("OK ({} items)", items);

    print!("Checking kultura_community... ");
    let community = CommunityLedger::open_path(storage.join("kultura_community"))
        .map_err(|e| format!("kultura_community LOCKED or inaccessible: {}", e))?;
    drop(community);
    println!("OK");

    print!("Checking seed files... ");
    for path in [&config.dataset_path, &config.artifacts_path] {
        if StdPath::new(path).exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
            serde_json::from_str::<serde_json::Value>(&raw)
                .map_err(|e| format!("{} is not valid JSON: {}", path, e))?;
        }
    }
    println!("OK");

    let port = config.port;
    print!("Checking port {}... ", port);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    match std::net::TcpListener::bind(addr) {
        Ok(listener) => {
            drop(listener);
            println!("OK (available)");
        }
        Err(e) => {
            return Err(format!("Port {} BLOCKED: {}", port, e));
        }
    }

    println!("\n✅ SUCCESS: All systems GO. Ready to start gateway.");
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!(
            "[kultura-gateway] .env not loaded: {} (using system environment)",
            e
        );
    }

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--verify") {
        match run_verify() {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("❌ PRE-FLIGHT FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(KulturaConfig::load().expect("load KulturaConfig"));
    let storage = StdPath::new(&config.storage_path);

    let store = Arc::new(
        KnowledgeStore::open_path(storage.join("kultura_knowledge"))
            .expect("open kultura_knowledge"),
    );
    match store.seed_from_json(
        StdPath::new(&config.dataset_path),
        StdPath::new(&config.artifacts_path),
    ) {
        Ok((items, artifacts)) if items + artifacts > 0 => {
            tracing::info!(items, artifacts, "knowledge store seeded");
        }
        Ok(_) => tracing::debug!("knowledge store already populated"),
        Err(e) => tracing::warn!(error = %e, "seeding failed, continuing with existing data"),
    }

    let community = Arc::new(
        CommunityLedger::open_path(storage.join("kultura_community"))
            .expect("open kultura_community"),
    );
    let metrics = Arc::new(
        MetricsTracker::open_path(storage.join("kultura_metrics")).expect("open kultura_metrics"),
    );

    let index = SearchIndex::from_store(&store).expect("index knowledge store");
    let reasoner = Reasoner::from_store(&store).expect("load reasoning items");
    tracing::info!(documents = index.len(), "retrieval index built");

    let pipeline = Arc::new(RagPipeline::new(
        index,
        reasoner,
        LlmClient::from_config(&config),
        WebAgent::new(config.offline),
    ));
    let web = Arc::new(WebAgent::new(config.offline));

    let app = build_app(AppState {
        config: Arc::clone(&config),
        store,
        pipeline,
        community,
        metrics,
        web,
    });

    let port = config.port;
    let app_name = config.app_name.clone();
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("{} listening on {}", app_name, addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}

fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/info", get(info))
        .route("/api/artifacts", get(list_artifacts))
        .route("/api/artifacts/:id", get(get_artifact))
        .route("/api/artifacts/culture/:culture", get(artifacts_by_culture))
        .route("/api/search", post(search))
        .route("/api/query", post(query))
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/community/contribute", post(contribute))
        .route("/api/community/register-expert", post(register_expert))
        .route("/api/community/review", post(review))
        .route("/api/community/pending", get(pending_contributions))
        .route("/api/community/stats", get(community_stats))
        .route("/api/metrics", get(metrics_raw))
        .route("/api/metrics/impact", get(metrics_impact))
        .with_state(state)
        .layer(cors)
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<KulturaConfig>,
    pub(crate) store: Arc<KnowledgeStore>,
    pub(crate) pipeline: Arc<RagPipeline>,
    pub(crate) community: Arc<CommunityLedger>,
    pub(crate) metrics: Arc<MetricsTracker>,
    pub(crate) web: Arc<WebAgent>,
}

type ApiResult = Result<axum::Json<serde_json::Value>, (StatusCode, axum::Json<serde_json::Value>)>;

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> (StatusCode, axum::Json<serde_json::Value>) {
    (
        status,
        axum::Json(serde_json::json!({ "error": message.to_string() })),
    )
}

fn store_error(e: StoreError) -> (StatusCode, axum::Json<serde_json::Value>) {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e)
}

/// GET / – welcome banner for anyone poking the base URL.
async fn root(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": state.config.app_name,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "description": "Cultural heritage knowledge API for African cultures",
    }))
}

/// GET /health – liveness check. Readiness reflects the constructed
/// pipeline, not the data volume; an empty store is still healthy.
async fn health(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let store_ready = state.store.item_count().is_ok();
    axum::Json(serde_json::json!({
        "status": "healthy",
        "rag_pipeline_ready": true,
        "store_ready": store_ready,
        "documents_indexed": state.pipeline.document_count(),
    }))
}

/// GET /api/info – system identity and data coverage.
async fn info(State(state): State<AppState>) -> ApiResult {
    let cultures = state.store.cultures().map_err(store_error)?;
    Ok(axum::Json(serde_json::json!({
        "name": state.config.app_name,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Cultural heritage knowledge API for African cultures",
        "llm_mode": state.config.llm_mode,
        "components": {
            "rag_pipeline": "ready",
            "knowledge_store": "ready",
            "community_ledger": "ready",
            "metrics_tracker": "ready",
        },
        "data": {
            "cultural_items": state.store.item_count().map_err(store_error)?,
            "artifacts": state.store.artifact_count().map_err(store_error)?,
            "cultures": cultures,
        },
    })))
}

/// GET /api/artifacts
async fn list_artifacts(State(state): State<AppState>) -> ApiResult {
    let artifacts = state.store.artifacts().map_err(store_error)?;
    Ok(axum::Json(serde_json::json!({
        "count": artifacts.len(),
        "artifacts": artifacts,
    })))
}

/// GET /api/artifacts/:id – 404 when missing; web context is best-effort.
async fn get_artifact(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let artifact = state
        .store
        .get_artifact(&id)
        .map_err(store_error)?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("artifact not found: {id}")))?;
    let web_context = state.web.enrich_artifact(&artifact.name, &artifact.culture).await;
    Ok(axum::Json(serde_json::json!({
        "artifact": artifact,
        "web_context": web_context,
    })))
}

/// GET /api/artifacts/culture/:culture
async fn artifacts_by_culture(
    State(state): State<AppState>,
    Path(culture): Path<String>,
) -> ApiResult {
    let artifacts = state
        .store
        .artifacts_by_culture(&culture)
        .map_err(store_error)?;
    Ok(axum::Json(serde_json::json!({
        "culture": culture,
        "count": artifacts.len(),
        "artifacts": artifacts,
    })))
}

#[derive(serde::Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_search_top_k")]
    top_k: usize,
    #[serde(default)]
    score_threshold: f32,
}

fn default_search_top_k() -> usize {
    5
}

/// POST /api/search – retrieval only, no generation.
async fn search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> ApiResult {
    let results = state
        .pipeline
        .search(&req.query, req.top_k, req.score_threshold);
    Ok(axum::Json(serde_json::json!({
        "query": req.query,
        "count": results.len(),
        "results": results,
    })))
}

#[derive(serde::Deserialize)]
struct QueryRequest {
    message: String,
    #[serde(flatten)]
    options: QueryOptions,
}

/// POST /api/query – the full pipeline, non-streaming.
async fn query(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> ApiResult {
    if req.message.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "message is required"));
    }
    tracing::info!(chars = req.message.len(), "query received");
    let outcome = state.pipeline.query(&req.message, &req.options).await;
    track_outcome_culture(&state, &outcome.sources);
    Ok(axum::Json(serde_json::json!({
        "response": outcome.response,
        "sources": outcome.sources,
        "reasoning": outcome.reasoning,
        "web_enriched": outcome.web_enriched,
    })))
}

/// Records one answered query against the top source's culture.
fn track_outcome_culture(state: &AppState, sources: &[kultura_pipeline::SourceDoc]) {
    let top_culture = sources
        .first()
        .map(|s| s.culture.as_str())
        .filter(|c| !c.is_empty());
    state.metrics.track_query(top_culture, "en");
}

/// POST /api/chat/stream – NDJSON chunk stream.
///
/// Zero or more `{"type":"content","data":<accumulated>,"done":false}`
/// chunks followed by exactly one terminal chunk, either `complete` (with
/// sources and reasoning) or `error`.
async fn chat_stream(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> Response {
    use async_stream::stream;

    let message = req.message.trim().to_string();
    let options = req.options.clone();

    let stream = stream! {
        if message.is_empty() {
            yield serde_json::json!({
                "type": "error",
                "error": "message is required",
                "done": true,
            });
            return;
        }

        let outcome = state.pipeline.query(&message, &options).await;
        track_outcome_culture(&state, &outcome.sources);

        let mut accumulated = String::new();
        for word in outcome.response.split_inclusive(char::is_whitespace) {
            accumulated.push_str(word);
            yield serde_json::json!({
                "type": "content",
                "data": accumulated,
                "done": false,
            });
        }

        yield serde_json::json!({
            "type": "complete",
            "data": outcome.response,
            "sources": outcome.sources,
            "reasoning": outcome.reasoning,
            "web_enriched": outcome.web_enriched,
            "done": true,
        });
    };

    let body_stream = stream.map(|chunk| {
        Ok::<_, std::convert::Infallible>(format!("{}\n", chunk))
    });
    let body = Body::from_stream(body_stream);

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/x-ndjson")
        .header("Cache-Control", "no-cache")
        .body(body)
        .unwrap()
}

#[derive(serde::Deserialize)]
struct ContributeRequest {
    contributor_address: String,
    contribution_type: String,
    culture: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// POST /api/community/contribute – unknown contribution types are a 400.
async fn contribute(State(state): State<AppState>, Json(req): Json<ContributeRequest>) -> ApiResult {
    let contribution_type = ContributionType::parse(&req.contribution_type).ok_or_else(|| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("unknown contribution_type: {}", req.contribution_type),
        )
    })?;
    let receipt = state
        .community
        .submit(&req.contributor_address, contribution_type, &req.culture, req.data)
        .map_err(store_error)?;
    Ok(axum::Json(serde_json::to_value(receipt).map_err(|e| {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
    })?))
}

#[derive(serde::Deserialize)]
struct RegisterExpertRequest {
    expert_address: String,
    culture: String,
    #[serde(default)]
    credentials: serde_json::Value,
}

/// POST /api/community/register-expert
async fn register_expert(
    State(state): State<AppState>,
    Json(req): Json<RegisterExpertRequest>,
) -> ApiResult {
    state
        .community
        .register_expert(&req.expert_address, &req.culture, req.credentials)
        .map_err(store_error)?;
    Ok(axum::Json(serde_json::json!({
        "status": "registered",
        "expert_address": req.expert_address,
        "culture": req.culture,
    })))
}

#[derive(serde::Deserialize)]
struct ReviewRequest {
    contribution_id: String,
    expert_address: String,
    approved: bool,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    suggested_changes: Option<serde_json::Value>,
}

/// POST /api/community/review – 404 for unknown contributions, 400 for
/// unregistered experts.
async fn review(State(state): State<AppState>, Json(req): Json<ReviewRequest>) -> ApiResult {
    let contribution = state
        .community
        .submit_review(
            &req.contribution_id,
            &req.expert_address,
            req.approved,
            &req.feedback,
            req.suggested_changes,
        )
        .map_err(store_error)?;
    Ok(axum::Json(serde_json::json!({
        "contribution": contribution,
    })))
}

#[derive(serde::Deserialize)]
struct PendingQuery {
    #[serde(default)]
    culture: Option<String>,
}

/// GET /api/community/pending?culture=
async fn pending_contributions(
    State(state): State<AppState>,
    Query(q): Query<PendingQuery>,
) -> ApiResult {
    let pending = state
        .community
        .pending(q.culture.as_deref())
        .map_err(store_error)?;
    Ok(axum::Json(serde_json::json!({
        "count": pending.len(),
        "contributions": pending,
    })))
}

/// GET /api/community/stats
async fn community_stats(State(state): State<AppState>) -> ApiResult {
    let stats = state.community.stats().map_err(store_error)?;
    Ok(axum::Json(serde_json::to_value(stats).map_err(|e| {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
    })?))
}

/// GET /api/metrics – raw usage counters.
async fn metrics_raw(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(state.metrics.metrics())
}

/// GET /api/metrics/impact – preservation impact with community stats
/// folded in.
async fn metrics_impact(State(state): State<AppState>) -> ApiResult {
    let stats = state.community.stats().map_err(store_error)?;
    let cultures = state.store.cultures().map_err(store_error)?;
    let total_items =
        state.store.item_count().map_err(store_error)? + state.store.artifact_count().map_err(store_error)?;
    Ok(axum::Json(
        state.metrics.impact_summary(cultures.len(), total_items, &stats),
    ))
}
