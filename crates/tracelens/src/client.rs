use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracelens_core::model::log::LogRecord;
use tracelens_core::model::span::SpanRecord;
use tracelens_core::model::trace::{TraceTree, TraceView};
use tracelens_core::query::{QuerySpec, StatusResponse, TimeSeriesValue, TraceSearchRequest};

/// Thin client for the query facade. Error bodies are `{"message": ...}`;
/// the message is surfaced verbatim.
pub struct QueryClient {
    base: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl QueryClient {
    pub fn connect(addr: Option<String>) -> Self {
        let base = addr
            .or_else(|| std::env::var("TRACELENS_HTTP_ADDR").ok())
            .unwrap_or_else(|| "127.0.0.1:8080".to_string());
        Self {
            base: normalize_base(&base),
            http: reqwest::Client::new(),
        }
    }

    pub async fn traces(&self, req: &TraceSearchRequest) -> anyhow::Result<Vec<TraceView>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(v) = &req.service_name {
            query.push(("service_name", v.clone()));
        }
        if let Some(v) = &req.operation_name {
            query.push(("operation_name", v.clone()));
        }
        if let Some(v) = req.min_duration_ns {
            query.push(("min_duration_ns", v.to_string()));
        }
        if let Some(v) = req.max_duration_ns {
            query.push(("max_duration_ns", v.to_string()));
        }
        if let Some(v) = req.status_code {
            query.push(("status_code", v.to_string()));
        }
        if !req.span_attributes.is_empty() {
            // Same encoding the dashboard uses: a JSON array in one
            // parameter.
            query.push((
                "span_attributes",
                serde_json::to_string(&req.span_attributes)?,
            ));
        }
        if let Some(v) = req.offset {
            query.push(("offset", v.to_string()));
        }
        if let Some(v) = req.limit {
            query.push(("limit", v.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/traces", self.base))
            .query(&query)
            .send()
            .await
            .context("request /traces")?;
        read_json(response).await
    }

    pub async fn trace_tree(&self, trace_id: &str) -> anyhow::Result<TraceTree> {
        self.get(&format!("/traces/{trace_id}/tree")).await
    }

    pub async fn trace_spans(&self, trace_id: &str) -> anyhow::Result<Vec<SpanRecord>> {
        self.get(&format!("/traces/{trace_id}/spans")).await
    }

    pub async fn spans(&self) -> anyhow::Result<Vec<SpanRecord>> {
        self.get("/spans").await
    }

    pub async fn logs(&self) -> anyhow::Result<Vec<LogRecord>> {
        self.get("/logs").await
    }

    pub async fn span_attributes(&self) -> anyhow::Result<Vec<String>> {
        self.get("/span-attributes").await
    }

    pub async fn query(&self, spec: &QuerySpec) -> anyhow::Result<Vec<TimeSeriesValue>> {
        self.post("/query", spec).await
    }

    pub async fn status(&self) -> anyhow::Result<StatusResponse> {
        self.get("/status").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let response = self
            .http
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .with_context(|| format!("request {path}"))?;
        read_json(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .json(body)
            .send()
            .await
            .with_context(|| format!("request {path}"))?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> anyhow::Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.context("decode response body");
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .map(|b| b.message)
        .unwrap_or_else(|_| format!("server returned {status}"));
    anyhow::bail!("{message}")
}

fn normalize_base(addr: &str) -> String {
    let with_scheme = if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_base("127.0.0.1:8080"), "http://127.0.0.1:8080");
        assert_eq!(
            normalize_base("http://127.0.0.1:8080/"),
            "http://127.0.0.1:8080"
        );
        assert_eq!(
            normalize_base("https://telemetry.example.com"),
            "https://telemetry.example.com"
        );
    }
}
