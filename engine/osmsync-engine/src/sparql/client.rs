//! SPARQL client for a QLever endpoint
//!
//! Queries go out as HTTP GET with the query URL-encoded into the query
//! string; updates as form-encoded POST. QLever reports failures in a JSON
//! envelope (`{"status": "ERROR", "exception": "…"}`) even with HTTP 200, so
//! every response body is inspected for that envelope before use. Endpoints
//! other than QLever are not supported.

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use osmsync_core::vocab;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, trace};
use url::Url;

/// Client holding one transport handle and the pending (prefixes, query)
/// buffers. Buffers are cleared after every successful call.
pub struct SparqlClient {
    http: reqwest::Client,
    endpoint: Url,
    query: String,
    prefixes: String,
    query_log: Option<PathBuf>,
}

impl SparqlClient {
    /// Build a client for the configured endpoint. Truncates the query log
    /// file if query logging is enabled.
    pub fn new(config: &Config) -> EngineResult<Self> {
        let endpoint = Url::parse(&config.sparql_endpoint_uri)
            .map_err(|e| EngineError::Config(format!("sparql_endpoint_uri: {e}")))?;

        let query_log = if config.write_sparql_queries_to_file {
            std::fs::write(&config.path_to_sparql_query_output, "")?;
            Some(config.path_to_sparql_query_output.clone())
        } else {
            None
        };

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            query: String::new(),
            prefixes: String::new(),
            query_log,
        })
    }

    /// Set the query to send. Prefixes are set separately with
    /// [`set_prefixes`](Self::set_prefixes).
    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    /// Set the `PREFIX` declarations prepended to the next request.
    pub fn set_prefixes(&mut self, prefixes: &[String]) {
        self.prefixes = prefixes.join(" ");
        if !self.prefixes.is_empty() {
            self.prefixes.push(' ');
        }
    }

    /// Convenience: all namespaces known to the engine.
    pub fn set_default_prefixes(&mut self) {
        self.set_prefixes(&vocab::prefix_declarations());
    }

    /// Send the pending query as a GET request and return the
    /// `application/sparql-results+xml` payload.
    pub async fn run_query(&mut self) -> EngineResult<String> {
        let full = format!("{}{}", self.prefixes, self.query);
        self.log_query(&full)?;

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("query", &full);
        trace!(query = %self.query, "sparql query");

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/sparql-results+xml")
            .send()
            .await?;
        let body = response.text().await?;
        check_error_envelope(&body)?;

        self.reset();
        Ok(body)
    }

    /// Send the pending query as a form-encoded `update=` POST.
    pub async fn run_update(&mut self) -> EngineResult<()> {
        let full = format!("{}{}", self.prefixes, self.query);
        self.log_query(&full)?;
        trace!(update = %self.query, "sparql update");

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("update", &full)
            .finish();
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;
        let text = response.text().await?;
        check_error_envelope(&text)?;

        self.reset();
        Ok(())
    }

    /// Ask the endpoint to drop its result cache so subsequent reads observe
    /// the new state. Must run strictly after all updates of a run.
    pub async fn clear_cache(&self) -> EngineResult<()> {
        debug!("clearing endpoint cache");
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("cmd=clear-cache")
            .send()
            .await?;
        let text = response.text().await?;
        check_error_envelope(&text)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.query.clear();
        self.prefixes.clear();
    }

    fn log_query(&self, full: &str) -> EngineResult<()> {
        if let Some(path) = &self.query_log {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{full}")?;
        }
        Ok(())
    }
}

/// Fail with [`EngineError::EndpointRejected`] if `body` is a QLever JSON
/// error envelope. Non-JSON bodies (the XML results payload) pass through.
fn check_error_envelope(body: &str) -> EngineResult<()> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('{') {
        return Ok(());
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Ok(());
    };
    if value.get("status").and_then(|s| s.as_str()) == Some("ERROR") {
        let exception = value
            .get("exception")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown endpoint error");
        return Err(EngineError::EndpointRejected(exception.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_detected() {
        let body = r#"{"status": "ERROR", "exception": "bad query near VALUES"}"#;
        match check_error_envelope(body) {
            Err(EngineError::EndpointRejected(msg)) => {
                assert_eq!(msg, "bad query near VALUES");
            }
            other => panic!("expected EndpointRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_ok_envelope_passes() {
        assert!(check_error_envelope(r#"{"status": "OK", "updated": 3}"#).is_ok());
    }

    #[test]
    fn test_xml_payload_passes() {
        let body = "<?xml version=\"1.0\"?><sparql><results/></sparql>";
        assert!(check_error_envelope(body).is_ok());
    }
}
