//! Target boundary
//!
//! The verifier depends on, but does not implement, a small set of
//! capabilities supplied by the host environment: session establishment,
//! navigation, element probes, interaction, server-side procedure calls,
//! fixture loading, and last-resort admin commands. Everything behind
//! this trait belongs to the target system; no wire format or persisted
//! state on the far side is owned by this crate.

mod http;
mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::common::Result;
use crate::scenario::ActorSpec;

pub use http::HttpTarget;
pub use memory::MemoryTarget;

/// An authenticated session, threaded through every step call
///
/// Owned by the run and passed explicitly; never ambient global state.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier minted by the target
    pub id: String,
    /// Token presented on subsequent calls
    pub token: String,
    /// Email of the authenticated actor
    pub email: String,
}

/// An interaction against a located element
#[derive(Debug, Clone)]
pub enum Interaction {
    /// Click the element
    Click,
    /// Type text into the element
    Type { text: String },
    /// Upload a file's content to the element
    Upload { file_name: String, content: String },
}

/// Boundary operations supplied by the host environment
///
/// `query_existence` and `query_text` are instantaneous probes; the
/// executor owns the bounded poll so the wait stays a single
/// configuration constant rather than a per-driver behavior.
#[async_trait]
pub trait Target: Send + Sync {
    /// Establish a session for a given actor
    async fn authenticate(&self, actor: &ActorSpec) -> Result<Session>;

    /// Move the session to an addressable location
    async fn navigate(&self, session: &Session, locator: &str) -> Result<()>;

    /// Probe whether a selector currently locates a visible element
    async fn query_existence(&self, session: &Session, selector: &str) -> Result<bool>;

    /// Read the text of a located element; `None` when absent
    async fn query_text(&self, session: &Session, selector: &str) -> Result<Option<String>>;

    /// Click, type, or upload against a located element
    async fn interact(
        &self,
        session: &Session,
        selector: &str,
        action: Interaction,
    ) -> Result<()>;

    /// Call the target system's server-side API, bypassing the UI
    async fn invoke_remote_procedure(&self, method: &str, args: &[Value]) -> Result<Value>;

    /// Read a static named data blob available to the run
    async fn load_fixture(&self, name: &str) -> Result<String>;

    /// Last-resort direct manipulation of persisted state, teardown only
    async fn exec_admin_command(&self, command: &str) -> Result<()>;
}
