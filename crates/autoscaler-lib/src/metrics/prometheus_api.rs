//! Prometheus HTTP API instant-query source

use super::MetricsSource;
use crate::config::MetricsConfig;
use crate::error::MetricsError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

/// Instant-query client for a Prometheus-compatible HTTP API
pub struct PrometheusSource {
    client: Client,
    query_url: Url,
}

impl PrometheusSource {
    /// Create a source with a bounded request timeout
    pub fn new(config: &MetricsConfig) -> Result<Self, MetricsError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Self::with_client(client, &config.url)
    }

    /// Create a source from an existing HTTP client
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, MetricsError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let query_url = Url::parse(&base)?.join("api/v1/query")?;

        Ok(Self { client, query_url })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }
}

#[async_trait]
impl MetricsSource for PrometheusSource {
    async fn instant_query(&self, query: &str) -> Result<f64, MetricsError> {
        let response = self
            .client
            .get(self.query_url.clone())
            .query(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let parsed: QueryResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(MetricsError::Status {
                    status: status.to_string(),
                    error_type: "http".to_string(),
                    message: body,
                })
            }
            Err(e) => return Err(MetricsError::Malformed(e.to_string())),
        };

        parsed.latest_value()
    }
}

/// Envelope of `/api/v1/query`
#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum QueryData {
    Vector(Vec<VectorSeries>),
    Matrix(Vec<MatrixSeries>),
    Scalar(Sample),
    String(Sample),
}

#[derive(Debug, Deserialize)]
struct VectorSeries {
    value: Sample,
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    values: Vec<Sample>,
}

/// `[unix_timestamp, "value"]`
#[derive(Debug, Deserialize)]
struct Sample(f64, String);

impl Sample {
    fn parse(&self) -> Result<f64, MetricsError> {
        self.1
            .parse::<f64>()
            .map_err(|_| MetricsError::InvalidValue(self.1.clone()))
    }
}

impl QueryResponse {
    /// Most recent value of the first result series
    fn latest_value(self) -> Result<f64, MetricsError> {
        if self.status != "success" {
            return Err(MetricsError::Status {
                status: self.status,
                error_type: self.error_type.unwrap_or_default(),
                message: self.error.unwrap_or_default(),
            });
        }

        match self.data {
            Some(QueryData::Vector(series)) => series
                .first()
                .ok_or(MetricsError::EmptyResult)?
                .value
                .parse(),
            Some(QueryData::Matrix(series)) => series
                .first()
                .and_then(|s| s.values.last())
                .ok_or(MetricsError::EmptyResult)?
                .parse(),
            Some(QueryData::Scalar(sample)) => sample.parse(),
            Some(QueryData::String(sample)) => Err(MetricsError::InvalidValue(sample.1)),
            None => Err(MetricsError::EmptyResult),
        }
    }
}
