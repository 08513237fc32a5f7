//! HTTP-backed target
//!
//! Talks to a browser-driver bridge over a length-free JSON protocol:
//! one `POST /command` endpoint carrying a typed command envelope, with
//! request/response correlation by id. Remote procedures go straight to
//! the application's method endpoint, fixtures come from a local
//! directory, and admin commands shell out on the host running the
//! verifier.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command as TokioCommand;

use crate::common::config::{TargetConfig, Timeouts};
use crate::common::paths::default_fixtures_dir;
use crate::common::{Error, Result};
use crate::scenario::ActorSpec;

use super::{Interaction, Session, Target};

/// Driver request envelope
#[derive(Debug, Serialize)]
struct DriverRequest<'a> {
    /// Request ID for matching responses
    id: u64,
    /// The command to execute
    #[serde(flatten)]
    command: DriverCommand<'a>,
}

/// Commands understood by the driver bridge
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Authenticate {
        email: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<&'a str>,
    },
    Navigate {
        session: &'a str,
        token: &'a str,
        url: String,
    },
    QueryExistence {
        session: &'a str,
        token: &'a str,
        selector: &'a str,
    },
    QueryText {
        session: &'a str,
        token: &'a str,
        selector: &'a str,
    },
    Interact {
        session: &'a str,
        token: &'a str,
        selector: &'a str,
        #[serde(flatten)]
        interaction: WireInteraction<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "interaction", rename_all = "snake_case")]
enum WireInteraction<'a> {
    Click,
    Type { text: &'a str },
    Upload { file_name: &'a str, content: &'a str },
}

/// Driver response envelope
#[derive(Debug, Deserialize)]
struct DriverResponse {
    /// Request ID this response corresponds to
    id: u64,
    /// Whether the command succeeded
    success: bool,
    /// Result data on success
    #[serde(default)]
    result: Option<Value>,
    /// Error information on failure
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    code: String,
    message: String,
}

/// Target implementation driving a live application through a driver
/// bridge and its remote-procedure endpoint
pub struct HttpTarget {
    client: reqwest::Client,
    base_url: String,
    driver_url: String,
    rpc_url: String,
    fixtures_dir: PathBuf,
    rpc_timeout: Duration,
    next_id: AtomicU64,
}

impl HttpTarget {
    /// Build a target from the endpoint and timeout configuration
    pub fn new(target: &TargetConfig, timeouts: &Timeouts) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.driver_request_secs))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: target.base_url.trim_end_matches('/').to_string(),
            driver_url: target.driver_url.trim_end_matches('/').to_string(),
            rpc_url: target.rpc_url.trim_end_matches('/').to_string(),
            fixtures_dir: target
                .fixtures_dir
                .clone()
                .unwrap_or_else(default_fixtures_dir),
            rpc_timeout: Duration::from_secs(timeouts.rpc_request_secs),
            next_id: AtomicU64::new(1),
        })
    }

    /// Send a command envelope and unwrap the response
    async fn send_command(&self, command: DriverCommand<'_>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let endpoint = format!("{}/command", self.driver_url);
        let request = DriverRequest { id, command };

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::DriverConnection {
                url: self.driver_url.clone(),
                error: e.to_string(),
            })?;

        let response: DriverResponse = response
            .json()
            .await
            .map_err(|e| Error::driver_request_failed(&endpoint, &e.to_string()))?;

        if response.id != id {
            return Err(Error::driver_request_failed(
                &endpoint,
                &format!("response ID mismatch: expected {}, got {}", id, response.id),
            ));
        }

        if response.success {
            Ok(response.result.unwrap_or(Value::Null))
        } else {
            let error = response.error.unwrap_or(WireError {
                code: "UNKNOWN".to_string(),
                message: "unknown driver error".to_string(),
            });
            Err(Error::driver_request_failed(
                &endpoint,
                &format!("{}: {}", error.code, error.message),
            ))
        }
    }

    /// Resolve a locator against the application base URL
    fn absolute_url(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            locator.to_string()
        } else {
            format!("{}{}", self.base_url, locator)
        }
    }
}

#[async_trait]
impl Target for HttpTarget {
    async fn authenticate(&self, actor: &ActorSpec) -> Result<Session> {
        let result = self
            .send_command(DriverCommand::Authenticate {
                email: &actor.email,
                password: actor.password.as_deref(),
            })
            .await
            .map_err(|e| Error::AuthenticationFailed {
                email: actor.email.clone(),
                reason: e.to_string(),
            })?;

        let id = result["session"].as_str().unwrap_or_default().to_string();
        let token = result["token"].as_str().unwrap_or_default().to_string();
        if id.is_empty() {
            return Err(Error::AuthenticationFailed {
                email: actor.email.clone(),
                reason: "driver returned no session id".to_string(),
            });
        }

        Ok(Session {
            id,
            token,
            email: actor.email.clone(),
        })
    }

    async fn navigate(&self, session: &Session, locator: &str) -> Result<()> {
        self.send_command(DriverCommand::Navigate {
            session: &session.id,
            token: &session.token,
            url: self.absolute_url(locator),
        })
        .await?;
        Ok(())
    }

    async fn query_existence(&self, session: &Session, selector: &str) -> Result<bool> {
        let result = self
            .send_command(DriverCommand::QueryExistence {
                session: &session.id,
                token: &session.token,
                selector,
            })
            .await?;
        Ok(result["exists"].as_bool().unwrap_or(false))
    }

    async fn query_text(&self, session: &Session, selector: &str) -> Result<Option<String>> {
        let result = self
            .send_command(DriverCommand::QueryText {
                session: &session.id,
                token: &session.token,
                selector,
            })
            .await?;
        Ok(result["text"].as_str().map(|s| s.to_string()))
    }

    async fn interact(
        &self,
        session: &Session,
        selector: &str,
        action: Interaction,
    ) -> Result<()> {
        let interaction = match &action {
            Interaction::Click => WireInteraction::Click,
            Interaction::Type { text } => WireInteraction::Type { text },
            Interaction::Upload { file_name, content } => WireInteraction::Upload {
                file_name,
                content,
            },
        };
        self.send_command(DriverCommand::Interact {
            session: &session.id,
            token: &session.token,
            selector,
            interaction,
        })
        .await?;
        Ok(())
    }

    async fn invoke_remote_procedure(&self, method: &str, args: &[Value]) -> Result<Value> {
        let endpoint = format!("{}/{}", self.rpc_url, method);

        let response = self
            .client
            .post(&endpoint)
            .timeout(self.rpc_timeout)
            .json(&args)
            .send()
            .await
            .map_err(|e| Error::rpc_failed(method, &e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::rpc_failed(method, &e.to_string()))?;

        if !status.is_success() {
            // Meteor-style error body: { "error": code, "reason": text }
            let code = body["error"].as_str().unwrap_or("error");
            let reason = body["reason"].as_str().unwrap_or("remote call rejected");
            return Err(Error::rpc_failed(method, &format!("{}: {}", code, reason)));
        }

        Ok(body)
    }

    async fn load_fixture(&self, name: &str) -> Result<String> {
        let path = self.fixtures_dir.join(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| Error::FixtureNotFound {
                name: name.to_string(),
                dir: self.fixtures_dir.display().to_string(),
            })
    }

    async fn exec_admin_command(&self, command: &str) -> Result<()> {
        let status = TokioCommand::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::AdminCommandFailed {
                command: command.to_string(),
                status: e.raw_os_error().unwrap_or(-1),
            })?;

        if !status.success() {
            return Err(Error::AdminCommandFailed {
                command: command.to_string(),
                status: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}
