//! Cluster coordinator access.
//!
//! The resource manager owns the shared attribute store, the election
//! weighting, and the cluster-wide view of which node currently leads.
//! The warden consumes all of that through the [`Coordinator`] trait; the
//! production implementation shells out to the manager's control tool.
//! The attribute it cares about holds the last known-good metadata
//! version, default 0 when unset, persisted "forever" (it survives
//! restarts of the manager itself).

use crate::core::error::{WardenError, WardenResult};
use std::process::Command;

/// Resource-manager operations consumed by the warden.
pub trait Coordinator {
    /// Read a shared integer attribute. Unset reads as 0.
    fn attribute_get(&self, name: &str) -> WardenResult<u64>;

    /// Write a shared integer attribute with "forever" lifetime.
    ///
    /// Callers gate this on [`Coordinator::transition_pending`]: writing
    /// mid-transition can perturb an in-flight election.
    fn attribute_set(&self, name: &str, value: u64) -> WardenResult<()>;

    /// Publish this node's promotion weight, persisted across reboots.
    fn set_vote_weight(&self, weight: i64) -> WardenResult<()>;

    /// Whether the manager believes a cluster transition is in flight.
    fn transition_pending(&self) -> WardenResult<bool>;

    /// Node the cluster currently records as leader of the resource, if
    /// any.
    fn recorded_leader(&self) -> WardenResult<Option<String>>;

    /// Clear the resource's error state so standbys re-probe. Idempotent;
    /// clearing a clean resource is a no-op.
    fn clear_errors(&self) -> WardenResult<()>;
}

/// [`Coordinator`] implementation backed by the manager's control tool.
///
/// Tool invocations are short, synchronous, and parse a single stdout
/// line; any non-zero exit or unparseable output is a coordinator fault.
#[derive(Debug, Clone)]
pub struct ManagerCtl {
    tool: String,
    node: String,
    resource: String,
}

impl ManagerCtl {
    /// Create a handle for `tool`, acting as `node` on `resource`.
    pub fn new(
        tool: impl Into<String>,
        node: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            node: node.into(),
            resource: resource.into(),
        }
    }

    /// Run the tool and return trimmed stdout.
    fn run(&self, args: &[&str]) -> WardenResult<String> {
        let output = Command::new(&self.tool)
            .args(args)
            .output()
            .map_err(|e| WardenError::Coordinator(format!("{} {}: {e}", self.tool, args.join(" "))))?;
        if !output.status.success() {
            return Err(WardenError::Coordinator(format!(
                "{} {} exited with {}: {}",
                self.tool,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Coordinator for ManagerCtl {
    fn attribute_get(&self, name: &str) -> WardenResult<u64> {
        let out = self.run(&["attribute", "get", name])?;
        if out.is_empty() {
            return Ok(0);
        }
        out.parse()
            .map_err(|_| WardenError::Coordinator(format!("attribute {name} is not an integer: {out}")))
    }

    fn attribute_set(&self, name: &str, value: u64) -> WardenResult<()> {
        self.run(&[
            "attribute",
            "set",
            name,
            &value.to_string(),
            "--lifetime",
            "forever",
        ])?;
        Ok(())
    }

    fn set_vote_weight(&self, weight: i64) -> WardenResult<()> {
        self.run(&[
            "vote-weight",
            "set",
            &self.node,
            &weight.to_string(),
            "--persistent",
        ])?;
        Ok(())
    }

    fn transition_pending(&self) -> WardenResult<bool> {
        let out = self.run(&["transition", "pending"])?;
        match out.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(WardenError::Coordinator(format!(
                "unexpected transition state: {other}"
            ))),
        }
    }

    fn recorded_leader(&self) -> WardenResult<Option<String>> {
        let out = self.run(&["leader", "get", &self.resource])?;
        if out.is_empty() {
            Ok(None)
        } else {
            Ok(Some(out))
        }
    }

    fn clear_errors(&self) -> WardenResult<()> {
        self.run(&["errors", "clear", &self.resource])?;
        Ok(())
    }
}
