//! Fixture provisioning and guaranteed cleanup
//!
//! Provisioning persists an actor, fixture data, and derived models into
//! the target system; that persisted state is the main externally
//! observable effect of a run. Cleanup removes the same state by the
//! identifiers recorded here. Teardown problems never fail the run: they
//! degrade to logged warnings so they cannot mask scenario outcomes.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{info, warn};

use crate::common::config::DuplicatePolicy;
use crate::common::{Config, Error, Result};
use crate::scenario::{ActorSpec, Suite};
use crate::target::Target;

/// A model created during provisioning
#[derive(Debug)]
pub struct ProvisionedModel {
    pub name: String,
    pub id: String,
    removed: bool,
}

/// Handle to everything a run has persisted into the target
///
/// Built incrementally during provisioning so that cleanup can see
/// exactly how far a failed provision got. Immutable from the executor's
/// point of view; only cleanup mutates it.
#[derive(Debug)]
pub struct ProvisionedContext {
    pub actor: ActorSpec,
    pub project_id: String,
    pub models: Vec<ProvisionedModel>,
    fixture_cache: HashMap<String, String>,
    actor_created: bool,
    actor_removed: bool,
    cleaned: bool,
}

impl ProvisionedContext {
    pub fn new(actor: ActorSpec) -> Self {
        Self {
            actor,
            project_id: String::new(),
            models: Vec::new(),
            fixture_cache: HashMap::new(),
            actor_created: false,
            actor_removed: false,
            cleaned: false,
        }
    }

    /// Content of a fixture loaded during provisioning, if any
    pub fn fixture(&self, name: &str) -> Option<&str> {
        self.fixture_cache.get(name).map(|s| s.as_str())
    }

    /// Resolve `{project}` and `{model.NAME}` placeholders
    pub fn expand(&self, input: &str) -> String {
        let mut out = input.replace("{project}", &self.project_id);
        for model in &self.models {
            out = out.replace(&format!("{{model.{}}}", model.name), &model.id);
        }
        out
    }

    /// Expand placeholders in every string inside a JSON value
    pub fn expand_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.expand(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.expand_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.expand_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// True once cleanup has run
    pub fn cleaned(&self) -> bool {
        self.cleaned
    }
}

impl Drop for ProvisionedContext {
    fn drop(&mut self) {
        // backstop only: the orchestrator routes every path through cleanup
        if !self.cleaned && (self.actor_created || !self.models.is_empty()) {
            warn!(
                email = %self.actor.email,
                "provisioned state dropped without cleanup; target may hold orphans"
            );
        }
    }
}

/// True for target errors that signal an already-existing identity
fn is_duplicate(err: &Error) -> bool {
    matches!(
        err,
        Error::RpcFailed { message, .. }
            if message.contains("duplicate") || message.contains("already exists")
    )
}

/// Persist the suite's actor, fixtures, and models into the target
///
/// Fills `ctx` incrementally; on error the caller still owns whatever was
/// created so far and must run cleanup on it.
pub async fn provision(
    target: &dyn Target,
    suite: &Suite,
    config: &Config,
    ctx: &mut ProvisionedContext,
) -> Result<()> {
    let methods = &config.provision.methods;

    if let Some(name) = &suite.project_fixture {
        let content = target
            .load_fixture(name)
            .await
            .map_err(|e| Error::Provisioning(e.to_string()))?;
        ctx.project_id = content.trim().to_string();
    }

    // actor first: everything else is owned by it
    let created = target
        .invoke_remote_procedure(
            &methods.create_actor,
            &[
                Value::String(suite.actor.email.clone()),
                Value::Array(
                    suite
                        .actor
                        .permissions
                        .iter()
                        .cloned()
                        .map(Value::String)
                        .collect(),
                ),
                Value::String(ctx.project_id.clone()),
            ],
        )
        .await;

    match created {
        Ok(_) => ctx.actor_created = true,
        Err(err) if is_duplicate(&err) => match config.provision.on_duplicate {
            DuplicatePolicy::Reuse => {
                info!(email = %suite.actor.email, "actor already exists, reusing");
            }
            DuplicatePolicy::Abort => {
                return Err(Error::DuplicateActor {
                    email: suite.actor.email.clone(),
                });
            }
        },
        Err(err) => return Err(Error::Provisioning(err.to_string())),
    }

    // fixtures load up front so a missing blob aborts before any scenario
    for name in &suite.fixtures {
        let content = target
            .load_fixture(name)
            .await
            .map_err(|e| Error::Provisioning(e.to_string()))?;
        ctx.fixture_cache.insert(name.clone(), content);
    }

    for model in &suite.models {
        let doc = serde_json::json!({
            "name": model.name,
            "language": model.language,
            "description": model.description,
            "published": false,
            "evaluations": [],
        });
        let id = target
            .invoke_remote_procedure(
                &methods.create_model,
                &[doc, Value::String(ctx.project_id.clone())],
            )
            .await
            .map_err(|e| Error::Provisioning(e.to_string()))?;
        let id = id
            .as_str()
            .ok_or_else(|| {
                Error::Provisioning(format!(
                    "target returned no id for model '{}'",
                    model.name
                ))
            })?
            .to_string();
        ctx.models.push(ProvisionedModel {
            name: model.name.clone(),
            id: id.clone(),
            removed: false,
        });

        if let Some(fixture) = &model.import {
            let content = match ctx.fixture_cache.get(fixture) {
                Some(content) => content.clone(),
                None => target
                    .load_fixture(fixture)
                    .await
                    .map_err(|e| Error::Provisioning(e.to_string()))?,
            };
            let payload: Value = serde_json::from_str(&content).map_err(|e| {
                Error::Provisioning(format!("fixture '{}' is not JSON: {}", fixture, e))
            })?;
            target
                .invoke_remote_procedure(
                    &methods.import_data,
                    &[payload, Value::String(id), Value::Bool(true)],
                )
                .await
                .map_err(|e| Error::Provisioning(e.to_string()))?;
        }
    }

    info!(
        suite = %suite.name,
        models = ctx.models.len(),
        fixtures = ctx.fixture_cache.len(),
        "provisioning complete"
    );
    Ok(())
}

/// Remove everything provisioning persisted, then run teardown commands
///
/// Invoked exactly once per run by the orchestrator, whatever the
/// scenario outcomes were. Tolerates partial provisioning and repeated
/// invocation: a missing item is a logged warning, a second call is a
/// warning-only no-op.
pub async fn cleanup(
    target: &dyn Target,
    ctx: &mut ProvisionedContext,
    suite: &Suite,
    config: &Config,
) {
    if ctx.cleaned {
        warn!(suite = %suite.name, "cleanup called again; nothing left to remove");
        return;
    }
    let methods = &config.provision.methods;

    // models go first: they are owned by the actor
    for model in ctx.models.iter_mut().rev() {
        if model.removed {
            continue;
        }
        match target
            .invoke_remote_procedure(&methods.remove_model, &[Value::String(model.id.clone())])
            .await
        {
            Ok(_) => model.removed = true,
            Err(err) => {
                warn!(model = %model.name, error = %err, "model removal failed; continuing");
            }
        }
    }

    if ctx.actor_created && !ctx.actor_removed {
        match target
            .invoke_remote_procedure(
                &methods.remove_actor,
                &[Value::String(ctx.actor.email.clone())],
            )
            .await
        {
            Ok(_) => ctx.actor_removed = true,
            Err(err) => {
                warn!(email = %ctx.actor.email, error = %err, "actor removal failed; continuing");
            }
        }
    } else if !ctx.actor_created {
        warn!(
            email = %ctx.actor.email,
            "actor not created by this run; leaving it in place"
        );
    }

    for step in &suite.teardown {
        if let Err(err) = target.exec_admin_command(&step.admin).await {
            warn!(command = %step.admin, error = %err, "teardown command failed; continuing");
        }
    }

    ctx.cleaned = true;
    info!(suite = %suite.name, "cleanup complete");
}

/// Teardown for a run that never finished
///
/// An interrupted process leaves no context handle, so this removes what
/// can be named from the suite alone: the actor by email, then the
/// teardown admin commands. Model ids minted by the target are gone with
/// the process; the admin commands are the suite's net for those.
pub async fn force_cleanup(target: &dyn Target, suite: &Suite, config: &Config) {
    let methods = &config.provision.methods;

    match target
        .invoke_remote_procedure(
            &methods.remove_actor,
            &[Value::String(suite.actor.email.clone())],
        )
        .await
    {
        Ok(_) => info!(email = %suite.actor.email, "orphaned actor removed"),
        Err(err) => {
            warn!(email = %suite.actor.email, error = %err, "actor removal failed; continuing");
        }
    }

    for step in &suite.teardown {
        if let Err(err) = target.exec_admin_command(&step.admin).await {
            warn!(command = %step.admin, error = %err, "teardown command failed; continuing");
        }
    }
}
