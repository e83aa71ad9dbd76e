//! Client for the remote Rust playground (`play.rust-lang.org`).
//!
//! Compilation and execution happen entirely on the remote service; this module
//! only shapes requests and interprets responses. Calls are single round trips
//! with no retry or caching.

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::PlaygroundError;

pub const DEFAULT_PLAYGROUND_URL: &str = "https://play.rust-lang.org";

/// Substring of rustc diagnostics; its presence in stderr marks a failed run.
const DIAGNOSTIC_MARKER: &str = "error[";

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct PlaygroundConfig {
    pub base_url: String,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PLAYGROUND_URL.into(),
        }
    }
}

impl PlaygroundConfig {
    /// Reads `COURSE_PLAYGROUND_URL`, falling back to the public playground.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("COURSE_PLAYGROUND_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PLAYGROUND_URL.into());
        Self { base_url }
    }
}

//
// ─── REQUEST OPTIONS ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Beta,
    Nightly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Debug,
    Release,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Edition {
    #[serde(rename = "2015")]
    E2015,
    #[serde(rename = "2018")]
    E2018,
    #[default]
    #[serde(rename = "2021")]
    E2021,
    #[serde(rename = "2024")]
    E2024,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrateType {
    #[default]
    Bin,
    Lib,
}

/// Knobs for an execute request. Defaults: stable, debug, 2021, binary, no
/// tests, no backtrace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub channel: Channel,
    pub mode: Mode,
    pub edition: Edition,
    pub crate_type: CrateType,
    pub tests: bool,
    pub backtrace: bool,
}

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionOutput {
    /// Build an output, deciding success from stderr rather than trusting the
    /// service's own flag.
    #[must_use]
    pub fn from_streams(stdout: String, stderr: String) -> Self {
        Self {
            success: !stderr.contains(DIAGNOSTIC_MARKER),
            stdout,
            stderr,
        }
    }

    /// Stdout followed by stderr on its own line, as shown in an output panel.
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

//
// ─── CLIENT ────────────────────────────────────────────────────────────────────
//

/// Something that can compile and run a snippet.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// # Errors
    ///
    /// Returns `PlaygroundError` if the run could not be performed.
    async fn execute(
        &self,
        code: &str,
        options: ExecuteOptions,
    ) -> Result<ExecutionOutput, PlaygroundError>;
}

#[derive(Clone)]
pub struct PlaygroundClient {
    client: Client,
    base_url: Url,
}

impl PlaygroundClient {
    /// # Errors
    ///
    /// Returns `PlaygroundError::InvalidUrl` if the base URL does not parse.
    pub fn new(config: &PlaygroundConfig) -> Result<Self, PlaygroundError> {
        let mut raw = config.base_url.trim().to_string();
        // endpoints are joined relative to the base, which needs a trailing slash
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(&raw)?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Reformat source with rustfmt (edition 2021). A response without code
    /// yields the input unchanged.
    ///
    /// # Errors
    ///
    /// Returns `PlaygroundError` on transport failure or a non-2xx status.
    pub async fn format(&self, code: &str) -> Result<String, PlaygroundError> {
        let payload = FormatRequest {
            code,
            edition: Edition::default(),
        };
        let body: FormatResponse = self.post_json("format", &payload).await?;
        Ok(body.code.unwrap_or_else(|| code.to_string()))
    }

    /// Store the snippet remotely and return a viewer URL for it.
    ///
    /// # Errors
    ///
    /// Returns `PlaygroundError` on transport failure, a non-2xx status, or an
    /// empty id in the response.
    pub async fn share(&self, code: &str) -> Result<Url, PlaygroundError> {
        let body: ShareResponse = self.post_json("meta/gist/", &ShareRequest { code }).await?;
        if body.id.trim().is_empty() {
            return Err(PlaygroundError::EmptyShareId);
        }
        Ok(self.viewer_url(&body.id))
    }

    /// Viewer URL for a shared snippet id, e.g. `https://play.rust-lang.org/?gist=<id>`.
    #[must_use]
    pub fn viewer_url(&self, id: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().clear().append_pair("gist", id);
        url
    }

    async fn post_json<T, R>(&self, path: &str, payload: &T) -> Result<R, PlaygroundError>
    where
        T: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.base_url.join(path)?;
        debug!(%url, "playground request");
        let response = self.client.post(url).json(payload).send().await?;

        if !response.status().is_success() {
            return Err(PlaygroundError::HttpStatus(response.status()));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CodeRunner for PlaygroundClient {
    async fn execute(
        &self,
        code: &str,
        options: ExecuteOptions,
    ) -> Result<ExecutionOutput, PlaygroundError> {
        let payload = ExecuteRequest::new(code, options);
        let body: ExecuteResponse = self.post_json("execute", &payload).await?;
        Ok(ExecutionOutput::from_streams(body.stdout, body.stderr))
    }
}

//
// ─── LATEST-WINS SESSION ───────────────────────────────────────────────────────
//

/// Wraps a runner so that only the newest `execute` reports a result.
///
/// Each call takes a monotonically increasing token. When a response arrives
/// after a newer call has started, it is dropped and the call yields `None`.
#[derive(Clone)]
pub struct PlaygroundSession {
    runner: Arc<dyn CodeRunner>,
    latest: Arc<AtomicU64>,
}

impl PlaygroundSession {
    #[must_use]
    pub fn new(runner: Arc<dyn CodeRunner>) -> Self {
        Self {
            runner,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `code`, returning `Ok(None)` if a newer run superseded this one.
    ///
    /// # Errors
    ///
    /// Returns `PlaygroundError` from the runner when this call is still the latest.
    pub async fn execute(
        &self,
        code: &str,
        options: ExecuteOptions,
    ) -> Result<Option<ExecutionOutput>, PlaygroundError> {
        let token = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.runner.execute(code, options).await;

        if self.latest.load(Ordering::SeqCst) != token {
            debug!(token, "discarding stale playground response");
            return Ok(None);
        }
        result.map(Some)
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    channel: Channel,
    mode: Mode,
    edition: Edition,
    crate_type: CrateType,
    tests: bool,
    code: &'a str,
    backtrace: bool,
}

impl<'a> ExecuteRequest<'a> {
    fn new(code: &'a str, options: ExecuteOptions) -> Self {
        Self {
            channel: options.channel,
            mode: options.mode,
            edition: options.edition,
            crate_type: options.crate_type,
            tests: options.tests,
            code,
            backtrace: options.backtrace,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
}

#[derive(Debug, Serialize)]
struct FormatRequest<'a> {
    code: &'a str,
    edition: Edition,
}

#[derive(Debug, Deserialize)]
struct FormatResponse {
    code: Option<String>,
}

#[derive(Debug, Serialize)]
struct ShareRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ShareResponse {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Notify;

    #[test]
    fn execute_request_uses_playground_field_names() {
        let payload = ExecuteRequest::new("fn main() {}", ExecuteOptions::default());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "channel": "stable",
                "mode": "debug",
                "edition": "2021",
                "crateType": "bin",
                "tests": false,
                "code": "fn main() {}",
                "backtrace": false,
            })
        );
    }

    #[test]
    fn custom_options_serialize() {
        let options = ExecuteOptions {
            channel: Channel::Nightly,
            mode: Mode::Release,
            edition: Edition::E2024,
            crate_type: CrateType::Lib,
            tests: true,
            backtrace: true,
        };
        let value = serde_json::to_value(ExecuteRequest::new("", options)).unwrap();
        assert_eq!(value["channel"], "nightly");
        assert_eq!(value["mode"], "release");
        assert_eq!(value["edition"], "2024");
        assert_eq!(value["crateType"], "lib");
        assert_eq!(value["tests"], true);
    }

    #[test]
    fn success_is_derived_from_stderr() {
        let ok = ExecutionOutput::from_streams(
            "Hello\n".into(),
            "   Compiling playground v0.0.1\n    Finished dev".into(),
        );
        assert!(ok.success);

        let failed = ExecutionOutput::from_streams(
            String::new(),
            "error[E0382]: borrow of moved value: `s`".into(),
        );
        assert!(!failed.success);
    }

    #[test]
    fn execute_response_tolerates_missing_streams() {
        let body: ExecuteResponse =
            serde_json::from_value(json!({"success": true, "stdout": "hi"})).unwrap();
        assert_eq!(body.stdout, "hi");
        assert_eq!(body.stderr, "");
    }

    #[test]
    fn combined_output_appends_stderr() {
        let out = ExecutionOutput::from_streams("out".into(), "warn".into());
        assert_eq!(out.combined(), "out\nwarn");
        let quiet = ExecutionOutput::from_streams("out".into(), String::new());
        assert_eq!(quiet.combined(), "out");
    }

    #[test]
    fn viewer_url_carries_gist_id() {
        let client = PlaygroundClient::new(&PlaygroundConfig::default()).unwrap();
        assert_eq!(
            client.viewer_url("abc123").as_str(),
            "https://play.rust-lang.org/?gist=abc123"
        );
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = PlaygroundClient::new(&PlaygroundConfig {
            base_url: "http://localhost:8080/api".into(),
        })
        .unwrap();
        assert_eq!(
            client.base_url().join("execute").unwrap().as_str(),
            "http://localhost:8080/api/execute"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = PlaygroundClient::new(&PlaygroundConfig {
            base_url: "not a url".into(),
        });
        assert!(matches!(err, Err(PlaygroundError::InvalidUrl(_))));
    }

    /// Echoes the code as stdout; the snippet `"slow"` blocks until released.
    struct GatedRunner {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl CodeRunner for GatedRunner {
        async fn execute(
            &self,
            code: &str,
            _options: ExecuteOptions,
        ) -> Result<ExecutionOutput, PlaygroundError> {
            if code == "slow" {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(ExecutionOutput::from_streams(code.to_string(), String::new()))
        }
    }

    #[tokio::test]
    async fn stale_execute_is_discarded() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let session = PlaygroundSession::new(Arc::new(GatedRunner {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        }));

        let slow = tokio::spawn({
            let session = session.clone();
            async move { session.execute("slow", ExecuteOptions::default()).await }
        });
        entered.notified().await;

        let fresh = session
            .execute("fast", ExecuteOptions::default())
            .await
            .unwrap();
        release.notify_one();
        let stale = slow.await.unwrap().unwrap();

        assert_eq!(fresh.unwrap().stdout, "fast");
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn sequential_executes_all_report() {
        let session = PlaygroundSession::new(Arc::new(GatedRunner {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }));
        for code in ["one", "two"] {
            let out = session
                .execute(code, ExecuteOptions::default())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(out.stdout, code);
        }
    }
}
