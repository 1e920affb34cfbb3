use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use tracelens_core::cancel::Cancel;
use tracelens_core::error::EngineError;
use tracelens_core::ids::TraceId;
use tracelens_core::model::Attribute;
use tracelens_core::model::log::LogRecord;
use tracelens_core::model::span::SpanRecord;
use tracelens_core::model::trace::{TraceTree, TraceView};
use tracelens_core::query::{
    IngestReport, QuerySpec, StatusResponse, TimeSeriesValue, TraceSearchRequest,
};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

pub fn router(state: AppState) -> Router {
    // The dashboard is served from another origin; the original backend ran
    // with permissive CORS as well.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/traces", get(search_traces))
        .route("/traces/{id}", get(get_trace))
        .route("/traces/{id}/spans", get(get_trace_spans))
        .route("/traces/{id}/tree", get(get_trace_tree))
        .route("/spans", get(list_spans).post(ingest_spans))
        .route("/logs", get(list_logs).post(ingest_logs))
        .route("/span-attributes", get(span_attribute_keys))
        .route("/query", post(time_series))
        .route("/status", get(status))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// `GET /traces` query string; `span_attributes` arrives JSON-encoded.
#[derive(Debug, Default, Deserialize)]
struct TraceSearchParams {
    service_name: Option<String>,
    operation_name: Option<String>,
    min_duration_ns: Option<i64>,
    max_duration_ns: Option<i64>,
    status_code: Option<i32>,
    span_attributes: Option<String>,
    offset: Option<usize>,
    limit: Option<usize>,
}

impl TraceSearchParams {
    fn into_request(self, state: &AppState) -> ApiResult<TraceSearchRequest> {
        let span_attributes = match self.span_attributes.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => parse_span_attributes(raw)?,
        };
        Ok(TraceSearchRequest {
            service_name: self.service_name.filter(|s| !s.is_empty()),
            operation_name: self.operation_name.filter(|s| !s.is_empty()),
            min_duration_ns: self.min_duration_ns,
            max_duration_ns: self.max_duration_ns,
            status_code: self.status_code,
            span_attributes,
            offset: self.offset,
            limit: Some(clamp_limit(self.limit, state)),
        })
    }
}

fn parse_span_attributes(raw: &str) -> ApiResult<Vec<Attribute>> {
    serde_json::from_str::<Vec<Attribute>>(raw).map_err(|e| {
        ApiError(EngineError::Validation(format!(
            "malformed span_attributes parameter: {e}"
        )))
    })
}

fn clamp_limit(requested: Option<usize>, state: &AppState) -> usize {
    requested.unwrap_or(state.default_limit).min(state.max_limit)
}

fn query_cancel(state: &AppState) -> Cancel {
    Cancel::after(state.query_timeout)
}

async fn search_traces(
    State(state): State<AppState>,
    params: Result<Query<TraceSearchParams>, QueryRejection>,
) -> ApiResult<Json<Vec<TraceView>>> {
    let Query(params) = params.map_err(bad_query)?;
    let req = params.into_request(&state)?;
    let traces = state.store.list_traces(&req, &query_cancel(&state))?;
    Ok(Json(traces))
}

async fn get_trace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TraceView>> {
    let id = TraceId::parse(&id)?;
    let view = state
        .store
        .trace_view(id.as_str())
        .ok_or_else(|| unknown_trace(id.as_str()))?;
    Ok(Json(view))
}

async fn get_trace_spans(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SpanRecord>>> {
    let id = TraceId::parse(&id)?;
    let spans = state.store.get_spans_by_trace(id.as_str());
    if spans.is_empty() {
        return Err(unknown_trace(id.as_str()));
    }
    Ok(Json(spans))
}

async fn get_trace_tree(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TraceTree>> {
    let id = TraceId::parse(&id)?;
    let tree = state
        .store
        .trace_tree(id.as_str())
        .ok_or_else(|| unknown_trace(id.as_str()))?;
    Ok(Json(tree))
}

async fn list_spans(State(state): State<AppState>) -> ApiResult<Json<Vec<SpanRecord>>> {
    let spans = state.store.list_spans(&[], &query_cancel(&state))?;
    Ok(Json(spans))
}

async fn list_logs(State(state): State<AppState>) -> ApiResult<Json<Vec<LogRecord>>> {
    let logs = state.store.list_logs(&[], &query_cancel(&state))?;
    Ok(Json(logs))
}

async fn span_attribute_keys(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let keys = state.store.span_attribute_keys(&query_cancel(&state))?;
    Ok(Json(keys))
}

async fn time_series(
    State(state): State<AppState>,
    spec: Result<Json<QuerySpec>, JsonRejection>,
) -> ApiResult<Json<Vec<TimeSeriesValue>>> {
    let Json(spec) = spec.map_err(bad_body)?;
    let series = state.store.time_series(&spec, &query_cancel(&state))?;
    Ok(Json(series))
}

async fn ingest_spans(
    State(state): State<AppState>,
    body: Result<Json<Vec<SpanRecord>>, JsonRejection>,
) -> ApiResult<Json<IngestReport>> {
    let Json(spans) = body.map_err(bad_body)?;
    let report = state.store.insert_spans(spans);
    if !report.rejected.is_empty() {
        tracing::warn!(
            accepted = report.accepted,
            rejected = report.rejected.len(),
            "span batch partially rejected"
        );
    }
    Ok(Json(report))
}

async fn ingest_logs(
    State(state): State<AppState>,
    body: Result<Json<Vec<LogRecord>>, JsonRejection>,
) -> ApiResult<Json<IngestReport>> {
    let Json(logs) = body.map_err(bad_body)?;
    Ok(Json(state.store.insert_logs(logs)))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.store.status())
}

fn unknown_trace(id: &str) -> ApiError {
    ApiError(EngineError::NotFound(format!("unknown trace: {id}")))
}

fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError(EngineError::Validation(format!(
        "invalid query parameters: {rejection}"
    )))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError(EngineError::Validation(format!(
        "invalid request body: {rejection}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_store::Store;

    fn state() -> AppState {
        AppState {
            store: Store::new(),
            query_timeout: std::time::Duration::from_secs(5),
            default_limit: 100,
            max_limit: 1000,
        }
    }

    #[test]
    fn span_attributes_parameter_round_trips() {
        let attrs = parse_span_attributes(r#"[{"key":"peer","value":"redis:6379"}]"#).unwrap();
        assert_eq!(attrs, vec![Attribute::new("peer", "redis:6379")]);

        assert!(parse_span_attributes("not-json").is_err());
        assert!(parse_span_attributes(r#"{"key":"peer"}"#).is_err());
    }

    #[test]
    fn limits_clamp_to_configured_maximum() {
        let state = state();
        assert_eq!(clamp_limit(None, &state), 100);
        assert_eq!(clamp_limit(Some(10), &state), 10);
        assert_eq!(clamp_limit(Some(10_000), &state), 1000);
    }

    #[test]
    fn search_params_convert_to_request() {
        let state = state();
        let params = TraceSearchParams {
            service_name: Some("api".into()),
            operation_name: Some(String::new()),
            status_code: Some(2),
            span_attributes: Some(r#"[{"key":"peer","value":"redis:6379"}]"#.into()),
            ..TraceSearchParams::default()
        };
        let req = params.into_request(&state).unwrap();
        assert_eq!(req.service_name.as_deref(), Some("api"));
        // Empty strings from the query builder mean "no filter".
        assert_eq!(req.operation_name, None);
        assert_eq!(req.status_code, Some(2));
        assert_eq!(req.span_attributes.len(), 1);
        assert_eq!(req.limit, Some(100));
    }
}
