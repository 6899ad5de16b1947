//! Diffs a desired instance configuration against the last-applied snapshot
//! and converges the daemon with the smallest ordered set of remote calls.
//!
//! Step order is load-bearing: the config file and the unit's interface
//! binding change first, then the service manager reloads so it sees the new
//! unit state, and only then does the instance's service restart. A failed
//! step aborts the rest of the plan; already-applied steps stay applied.

use std::fmt;

use thiserror::Error;

use crate::error::GatewayError;
use crate::instance::{ClockInstanceConfig, InstanceId};
use crate::traits::ConfigGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    UpdateConfig,
    BindInterfaces,
    ReloadManager,
    RestartService,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanStep::UpdateConfig => "config update",
            PlanStep::BindInterfaces => "interface binding",
            PlanStep::ReloadManager => "service-manager reload",
            PlanStep::RestartService => "service restart",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangePlan {
    pub steps: Vec<PlanStep>,
}

impl ChangePlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct ApplyError {
    pub step: PlanStep,
    #[source]
    pub source: GatewayError,
}

/// Compute the operations needed to take the daemon from `last_applied` to
/// `desired`. Equal configurations produce an empty plan and no remote calls.
pub fn plan(desired: &ClockInstanceConfig, last_applied: &ClockInstanceConfig) -> ChangePlan {
    let config_changed = desired.scalars_differ(last_applied);
    let interfaces_changed = desired.interfaces_differ(last_applied);

    let mut steps = Vec::new();
    if config_changed {
        steps.push(PlanStep::UpdateConfig);
    }
    if interfaces_changed {
        steps.push(PlanStep::BindInterfaces);
    }
    if config_changed || interfaces_changed {
        steps.push(PlanStep::ReloadManager);
        steps.push(PlanStep::RestartService);
    }

    ChangePlan { steps }
}

/// Run the plan against the gateway, stopping at the first failure. The
/// caller owns the snapshot swap; nothing here mutates instance state.
pub async fn apply_plan<G: ConfigGateway + ?Sized>(
    gateway: &G,
    id: InstanceId,
    desired: &ClockInstanceConfig,
    plan: &ChangePlan,
) -> Result<(), ApplyError> {
    for step in &plan.steps {
        let result = match step {
            PlanStep::UpdateConfig => gateway.put_ptp_config(id, desired.clone()).await,
            PlanStep::BindInterfaces => {
                gateway.bind_interfaces(id, desired.bound_interfaces.clone()).await
            }
            PlanStep::ReloadManager => gateway.reload_manager().await,
            PlanStep::RestartService => gateway.restart_service(id).await,
        };
        if let Err(source) = result {
            return Err(ApplyError { step: *step, source });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockConfigGateway;
    use mockall::Sequence;

    fn base_config() -> ClockInstanceConfig {
        ClockInstanceConfig {
            domain_number: 127,
            priority1: 128,
            priority2: 128,
            log_announce_interval: 0,
            announce_receipt_timeout: 6,
            log_sync_interval: -3,
            sync_receipt_timeout: 6,
            bound_interfaces: vec!["ens104".to_string()],
        }
    }

    fn rejected(endpoint: &str) -> GatewayError {
        GatewayError::Rejected {
            endpoint: endpoint.to_string(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_equal_configs_produce_empty_plan() {
        let applied = base_config();
        let desired = applied.clone();
        assert!(plan(&desired, &applied).is_empty());
    }

    #[test]
    fn test_interface_order_does_not_count_as_change() {
        let mut applied = base_config();
        applied.bound_interfaces = vec!["a".to_string(), "b".to_string()];
        let mut desired = applied.clone();
        desired.bound_interfaces = vec!["b".to_string(), "a".to_string()];
        assert!(plan(&desired, &applied).is_empty());
    }

    #[test]
    fn test_scalar_change_plans_config_reload_restart() {
        let applied = base_config();
        let mut desired = applied.clone();
        desired.domain_number = 128;
        assert_eq!(
            plan(&desired, &applied).steps,
            vec![
                PlanStep::UpdateConfig,
                PlanStep::ReloadManager,
                PlanStep::RestartService
            ]
        );
    }

    #[test]
    fn test_interface_change_skips_config_put() {
        let applied = base_config();
        let mut desired = applied.clone();
        desired.bound_interfaces = vec!["ens102".to_string()];
        assert_eq!(
            plan(&desired, &applied).steps,
            vec![
                PlanStep::BindInterfaces,
                PlanStep::ReloadManager,
                PlanStep::RestartService
            ]
        );
    }

    #[test]
    fn test_full_change_orders_all_four_steps() {
        let applied = base_config();
        let mut desired = applied.clone();
        desired.priority1 = 64;
        desired.bound_interfaces = vec!["ens102".to_string()];
        assert_eq!(
            plan(&desired, &applied).steps,
            vec![
                PlanStep::UpdateConfig,
                PlanStep::BindInterfaces,
                PlanStep::ReloadManager,
                PlanStep::RestartService
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_plan_issues_no_calls() {
        // Any gateway call would panic: no expectations are set.
        let mock = MockConfigGateway::new();
        let desired = base_config();
        let empty = ChangePlan::default();
        apply_plan(&mock, InstanceId::Ptp1, &desired, &empty)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_apply_runs_steps_in_order() {
        let mut mock = MockConfigGateway::new();
        let mut seq = Sequence::new();

        mock.expect_put_ptp_config()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_bind_interfaces()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|id, interfaces| {
                *id == InstanceId::Ptp2 && interfaces.len() == 1 && interfaces[0] == "ens102"
            })
            .returning(|_, _| Ok(()));
        mock.expect_reload_manager()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        mock.expect_restart_service()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|id| *id == InstanceId::Ptp2)
            .returning(|_| Ok(()));

        let mut desired = base_config();
        desired.domain_number = 100;
        desired.bound_interfaces = vec!["ens102".to_string()];
        let full = ChangePlan {
            steps: vec![
                PlanStep::UpdateConfig,
                PlanStep::BindInterfaces,
                PlanStep::ReloadManager,
                PlanStep::RestartService,
            ],
        };

        apply_plan(&mock, InstanceId::Ptp2, &desired, &full)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_step_aborts_rest_of_plan() {
        let mut mock = MockConfigGateway::new();
        mock.expect_put_ptp_config().times(1).returning(|_, _| Ok(()));
        mock.expect_bind_interfaces()
            .times(1)
            .returning(|_, _| Err(rejected("/api/ptp4l-service-interface")));
        mock.expect_reload_manager().times(0);
        mock.expect_restart_service().times(0);

        let desired = base_config();
        let full = ChangePlan {
            steps: vec![
                PlanStep::UpdateConfig,
                PlanStep::BindInterfaces,
                PlanStep::ReloadManager,
                PlanStep::RestartService,
            ],
        };

        let err = apply_plan(&mock, InstanceId::Ptp1, &desired, &full)
            .await
            .unwrap_err();
        assert_eq!(err.step, PlanStep::BindInterfaces);
        assert!(err.to_string().starts_with("interface binding failed"));
    }
}
