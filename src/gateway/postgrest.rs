use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Filter, FilterOp, Gateway, GatewayError, Query, Table};
use crate::core::config::GatewayConfig;

/// Gateway over a PostgREST-style REST+SQL backend with a storage API
/// (the layout Supabase exposes).
pub struct PostgrestGateway {
    client: Client,
    base_url: String,
    api_key: Secret<String>,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl PostgrestGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(key) = HeaderValue::from_str(self.api_key.expose_secret()) {
            headers.insert("apikey", key);
        }
        if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose_secret())) {
            headers.insert(AUTHORIZATION, bearer);
        }
        headers
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn request(&self, builder: RequestBuilder, filters: &[Filter]) -> RequestBuilder {
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        builder.headers(self.headers()).query(&params)
    }

    async fn rows(response: Response) -> Result<Vec<Value>, GatewayError> {
        let response = check_status(response).await?;
        let body: Value = response.json().await?;
        match body {
            Value::Array(rows) => Ok(rows),
            other => Err(GatewayError::Decode(format!("expected a row array, got {}", other))),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::CONFLICT => Err(GatewayError::Conflict(body)),
        status => Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        }),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn filter_param(filter: &Filter) -> (String, String) {
    let operand = match (&filter.op, &filter.value) {
        (FilterOp::In, Value::Array(values)) => format!(
            "({})",
            values.iter().map(render_value).collect::<Vec<_>>().join(",")
        ),
        (FilterOp::ILike, Value::String(pattern)) => pattern.replace('%', "*"),
        (_, value) => render_value(value),
    };
    (
        filter.column.clone(),
        format!("{}.{}", filter.op.as_str(), operand),
    )
}

/// `Content-Range: 0-24/3573` or `*/0`.
fn parse_total(content_range: &str) -> Option<u64> {
    content_range.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl Gateway for PostgrestGateway {
    #[tracing::instrument(name = "Gateway select", skip(self, query), fields(table = table.as_str()))]
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, GatewayError> {
        let mut builder = self
            .request(self.client.get(self.table_url(table)), &query.filters)
            .query(&[("select", "*")]);
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            builder = builder.query(&[("order", format!("{}.{}", order.column, direction))]);
        }
        if let Some(limit) = query.limit {
            builder = builder.query(&[("limit", limit.to_string())]);
        }
        Self::rows(builder.send().await?).await
    }

    #[tracing::instrument(name = "Gateway insert", skip(self, row), fields(table = table.as_str()))]
    async fn insert(&self, table: Table, row: Value) -> Result<Value, GatewayError> {
        let response = self
            .request(self.client.post(self.table_url(table)), &[])
            .header("Prefer", "return=representation")
            .json(&json!([row]))
            .send()
            .await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Decode("insert returned no row".to_string()))
    }

    #[tracing::instrument(name = "Gateway update", skip(self, filters, patch), fields(table = table.as_str()))]
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, GatewayError> {
        let response = self
            .request(self.client.patch(self.table_url(table)), filters)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Self::rows(response).await
    }

    #[tracing::instrument(name = "Gateway count", skip(self, filters), fields(table = table.as_str()))]
    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64, GatewayError> {
        let response = self
            .request(self.client.head(self.table_url(table)), filters)
            .query(&[("select", "*")])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_total)
            .ok_or_else(|| GatewayError::Decode("missing Content-Range total".to_string()))
    }

    #[tracing::instrument(name = "Gateway sign url", skip(self))]
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/storage/v1/object/sign/{}/{}", self.base_url, bucket, path);
        let response = self
            .client
            .post(url)
            .headers(self.headers())
            .json(&json!({ "expiresIn": expires_in.as_secs() }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::ObjectNotFound(format!("{}/{}", bucket, path)));
        }
        let signed: SignedUrlResponse = check_status(response).await?.json().await?;
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }
}
