//! sw_install and sw_activate tool implementations.
//!
//! Deliver the install and activate lifecycle events to the worker.

use itinera_core::ServiceWorker;
use itinera_core::WorkerState;
use itinera_core::lifecycle::{ActivateReport, InstallReport};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Output from the sw_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallOutput {
    pub generation: String,
    /// Number of precached assets written.
    pub cached: usize,
    pub state: WorkerState,
    pub controlling: bool,
}

/// Output from the sw_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivateOutput {
    pub generation: String,
    /// Stale generations removed.
    pub deleted: Vec<String>,
    pub state: WorkerState,
    pub controlling: bool,
}

/// Implementation of the sw_install tool.
///
/// A successful install asks to skip waiting, so the worker activates right
/// away. On an active worker this re-seeds the precache and leaves it active.
pub async fn install_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let InstallReport { generation, cached, skip_waiting } = worker.install().await?;
    if skip_waiting {
        worker.skip_waiting().await?;
    }
    json_result(&InstallOutput { generation, cached, state: worker.state(), controlling: worker.is_controlling() })
}

/// Implementation of the sw_activate tool.
pub async fn activate_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let ActivateReport { generation, deleted } = worker.activate().await?;
    json_result(&ActivateOutput { generation, deleted, state: worker.state(), controlling: worker.is_controlling() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::support::{output, worker};

    #[tokio::test]
    async fn test_install_takes_control_immediately() {
        let (worker, _network) = worker().await;

        let installed: InstallOutput = output(&install_impl(&worker).await.unwrap());
        assert_eq!(installed.generation, "travel-planner-v1");
        assert_eq!(installed.cached, 2);
        assert_eq!(installed.state, WorkerState::Activated);
        assert!(installed.controlling);
        assert!(worker.is_controlling());
    }

    #[tokio::test]
    async fn test_activate_collects_stale_generations() {
        let (worker, _network) = worker().await;
        worker.install().await.unwrap();
        assert!(!worker.is_controlling());

        let activated: ActivateOutput = output(&activate_impl(&worker).await.unwrap());
        assert!(activated.deleted.is_empty());
        assert_eq!(activated.state, WorkerState::Activated);
        assert!(activated.controlling);

        let again: ActivateOutput = output(&activate_impl(&worker).await.unwrap());
        assert_eq!(again.state, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_install_failure_is_an_error() {
        let (worker, network) = worker().await;
        network.go_offline_everywhere();

        let err = install_impl(&worker).await.unwrap_err();
        assert_eq!(err.code.0, -32009);
        assert!(activate_impl(&worker).await.is_err());
    }
}
