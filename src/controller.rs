//! Session controller: the one owner of all client-side clock-sync state.
//!
//! Holds the interface snapshot, both tracked clock instances, the mode
//! selector state and the poller handle, and exposes the operator-facing
//! operations. Components below this one never reach for shared globals;
//! everything they touch is passed in from here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, info};
use thiserror::Error;

use crate::config::ClientSettings;
use crate::error::GatewayError;
use crate::instance::{ClockInstance, ClockInstanceConfig, ConfigValidationError, InstanceId};
use crate::poller::{poll_instance_once, StatusPoller};
use crate::reconcile::{self, ApplyError, ChangePlan};
use crate::status::{AggregateStatus, SyncModeState};
use crate::traits::ConfigGateway;
use crate::wire::NetworkInterface;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigValidationError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("session state lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Desired matched the last-applied snapshot; no remote call was made.
    NoChanges,
    Applied(ChangePlan),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        })
    }
}

/// Everything the view needs, captured under the locks in one go.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub mode: SyncModeState,
    pub aggregate: AggregateStatus,
    pub instances: [ClockInstance; 2],
}

pub struct Controller<G: ConfigGateway + 'static> {
    gateway: Arc<G>,
    settings: ClientSettings,
    interfaces: Vec<NetworkInterface>,
    instances: [Arc<RwLock<ClockInstance>>; 2],
    mode: Arc<RwLock<SyncModeState>>,
    aggregate: Arc<RwLock<AggregateStatus>>,
    generation: Arc<AtomicU64>,
    poller: Option<StatusPoller>,
}

impl<G: ConfigGateway + 'static> Controller<G> {
    /// Load the full session state from the remote API. Both instance
    /// snapshots are seeded from the daemon's actual configuration, so the
    /// first reconciliation diffs against reality rather than defaults.
    pub async fn connect(gateway: Arc<G>, settings: ClientSettings) -> Result<Self, GatewayError> {
        let interfaces = gateway.network_interfaces().await?;
        info!("[session] {} network interfaces visible", interfaces.len());

        let instance1 = load_instance(gateway.as_ref(), InstanceId::Ptp1).await?;
        let instance2 = load_instance(gateway.as_ref(), InstanceId::Ptp2).await?;
        let mode = gateway.sync_mode().await?;

        // Aggregate status is display-only; a failure here just means the
        // first poll cycle fills it in.
        let aggregate = match gateway.system_clock_status().await {
            Ok(status) => status,
            Err(e) => {
                debug!("[session] aggregate status unavailable at startup: {}", e);
                AggregateStatus::default()
            }
        };

        Ok(Controller {
            gateway,
            settings,
            interfaces,
            instances: [
                Arc::new(RwLock::new(instance1)),
                Arc::new(RwLock::new(instance2)),
            ],
            mode: Arc::new(RwLock::new(mode)),
            aggregate: Arc::new(RwLock::new(aggregate)),
            generation: Arc::new(AtomicU64::new(0)),
            poller: None,
        })
    }

    pub fn interfaces(&self) -> &[NetworkInterface] {
        &self.interfaces
    }

    pub fn instance(&self, id: InstanceId) -> &Arc<RwLock<ClockInstance>> {
        match id {
            InstanceId::Ptp1 => &self.instances[0],
            InstanceId::Ptp2 => &self.instances[1],
        }
    }

    pub fn view_snapshot(&self) -> Result<ViewSnapshot, ControlError> {
        let mode = *self.mode.read().map_err(|_| ControlError::Poisoned)?;
        let aggregate = self
            .aggregate
            .read()
            .map_err(|_| ControlError::Poisoned)?
            .clone();
        let instances = [
            self.instances[0]
                .read()
                .map_err(|_| ControlError::Poisoned)?
                .clone(),
            self.instances[1]
                .read()
                .map_err(|_| ControlError::Poisoned)?
                .clone(),
        ];
        Ok(ViewSnapshot {
            mode,
            aggregate,
            instances,
        })
    }

    pub fn start_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }
        info!(
            "[session] polling every {:?}",
            self.settings.poll_interval()
        );
        self.poller = Some(StatusPoller::start(
            self.gateway.clone(),
            self.instances.to_vec(),
            self.mode.clone(),
            self.aggregate.clone(),
            self.settings.poll_interval(),
            self.generation.clone(),
        ));
    }

    pub fn stop_polling(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }

    /// Validate, diff against the last-applied snapshot, and run the change
    /// plan. The snapshot is swapped in a single assignment after the whole
    /// plan succeeds; a mid-plan failure leaves it untouched.
    pub async fn apply_instance(
        &self,
        id: InstanceId,
        desired: ClockInstanceConfig,
    ) -> Result<ApplyOutcome, ControlError> {
        desired.validate(&self.interfaces)?;

        let last_applied = self
            .instance(id)
            .read()
            .map_err(|_| ControlError::Poisoned)?
            .last_applied
            .clone();

        let change_plan = reconcile::plan(&desired, &last_applied);
        if change_plan.is_empty() {
            info!("[apply] {}: configuration unchanged", id);
            return Ok(ApplyOutcome::NoChanges);
        }

        reconcile::apply_plan(self.gateway.as_ref(), id, &desired, &change_plan).await?;

        {
            let mut guard = self.instance(id).write().map_err(|_| ControlError::Poisoned)?;
            guard.last_applied = desired.clone();
            guard.desired = desired;
        }
        info!(
            "[apply] {}: {} steps applied",
            id,
            change_plan.steps.len()
        );
        Ok(ApplyOutcome::Applied(change_plan))
    }

    /// Give the restarted daemon time to come back, then refresh the
    /// instance's observed status once. Guarded by the poller generation so
    /// a torn-down session is never written to.
    pub async fn settle_and_refresh(&self, id: InstanceId) {
        let expected = self.generation.load(Ordering::SeqCst);
        tokio::time::sleep(self.settings.settle_delay()).await;
        poll_instance_once(
            self.gateway.as_ref(),
            self.instance(id),
            &self.generation,
            expected,
        )
        .await;
    }

    pub async fn set_sync_mode(&self, state: SyncModeState) -> Result<(), ControlError> {
        self.gateway.set_sync_mode(state).await?;
        *self.mode.write().map_err(|_| ControlError::Poisoned)? = state;
        info!("[mode] set to {}", state.mode().as_wire());
        Ok(())
    }

    pub async fn current_primary_clock(&self) -> Result<Option<InstanceId>, ControlError> {
        Ok(self.gateway.primary_clock().await?)
    }

    pub async fn set_primary_clock(&self, id: InstanceId) -> Result<(), ControlError> {
        self.gateway.set_primary_clock(id).await?;
        let mut guard = self.mode.write().map_err(|_| ControlError::Poisoned)?;
        *guard = SyncModeState::new(guard.mode(), Some(id));
        info!("[mode] primary clock set to {}", id);
        Ok(())
    }

    pub async fn service_action(
        &self,
        id: InstanceId,
        action: ServiceAction,
    ) -> Result<(), ControlError> {
        match action {
            ServiceAction::Start => self.gateway.start_service(id).await?,
            ServiceAction::Stop => self.gateway.stop_service(id).await?,
            ServiceAction::Restart => self.gateway.restart_service(id).await?,
        }
        info!("[service] {} {}", action, id.service_name());
        Ok(())
    }

    pub async fn refresh_interfaces(&mut self) -> Result<(), ControlError> {
        self.interfaces = self.gateway.network_interfaces().await?;
        Ok(())
    }

    pub async fn save_interfaces(&self) -> Result<Option<String>, ControlError> {
        Ok(self.gateway.save_interfaces().await?)
    }

    pub async fn service_logs(&self, id: InstanceId, lines: u32) -> Result<String, ControlError> {
        Ok(self.gateway.service_logs(id, lines).await?)
    }

    pub async fn service_status_text(&self, id: InstanceId) -> Result<String, ControlError> {
        Ok(self.gateway.service_status(id).await?)
    }
}

async fn load_instance<G: ConfigGateway + ?Sized>(
    gateway: &G,
    id: InstanceId,
) -> Result<ClockInstance, GatewayError> {
    let dto = gateway.ptp_config(id).await?;
    let bound = gateway.bound_interfaces(id).await?;
    Ok(ClockInstance::new(
        id,
        ClockInstanceConfig::from_parts(dto, bound),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::PlanStep;
    use crate::status::SyncMode;
    use crate::traits::MockConfigGateway;
    use crate::wire::PtpConfigDto;
    use mockall::Sequence;

    fn default_dto() -> PtpConfigDto {
        PtpConfigDto {
            domain_number: 127,
            priority1: 128,
            priority2: 128,
            log_announce_interval: 0,
            announce_receipt_timeout: 6,
            log_sync_interval: -3,
            sync_receipt_timeout: 6,
        }
    }

    fn expect_connect(mock: &mut MockConfigGateway) {
        mock.expect_network_interfaces().returning(|| {
            Ok(vec![
                NetworkInterface {
                    name: "ens102".to_string(),
                    ip: Some("10.0.0.2".to_string()),
                    is_up: true,
                },
                NetworkInterface {
                    name: "ens104".to_string(),
                    ip: None,
                    is_up: true,
                },
            ])
        });
        mock.expect_ptp_config().returning(|_| Ok(default_dto()));
        mock.expect_bound_interfaces()
            .returning(|_| Ok(vec!["ens104".to_string()]));
        mock.expect_sync_mode()
            .returning(|| Ok(SyncModeState::new(SyncMode::Ptp, Some(InstanceId::Ptp2))));
        mock.expect_system_clock_status()
            .returning(|| Ok(AggregateStatus::default()));
    }

    async fn connected(mock: MockConfigGateway) -> Controller<MockConfigGateway> {
        Controller::connect(Arc::new(mock), ClientSettings::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_seeds_desired_from_last_applied() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut mock = MockConfigGateway::new();
        expect_connect(&mut mock);

        let controller = connected(mock).await;
        let snapshot = controller.view_snapshot().unwrap();

        assert_eq!(snapshot.mode.mode(), SyncMode::Ptp);
        assert_eq!(snapshot.mode.primary_clock(), Some(InstanceId::Ptp2));
        for instance in &snapshot.instances {
            assert_eq!(instance.desired, instance.last_applied);
            assert_eq!(instance.last_applied.domain_number, 127);
            assert_eq!(instance.last_applied.bound_interfaces, vec!["ens104"]);
        }
    }

    #[tokio::test]
    async fn test_apply_unchanged_config_issues_no_calls() {
        let mut mock = MockConfigGateway::new();
        expect_connect(&mut mock);
        // No plan-step expectations: any mutation call would panic the test.

        let controller = connected(mock).await;
        let desired = controller
            .instance(InstanceId::Ptp1)
            .read()
            .unwrap()
            .last_applied
            .clone();

        let outcome = controller
            .apply_instance(InstanceId::Ptp1, desired)
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::NoChanges);
    }

    #[tokio::test]
    async fn test_interface_only_change_skips_config_put() {
        let mut mock = MockConfigGateway::new();
        expect_connect(&mut mock);

        let mut seq = Sequence::new();
        mock.expect_put_ptp_config().times(0);
        mock.expect_bind_interfaces()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|id, interfaces| {
                *id == InstanceId::Ptp1 && interfaces == &["ens102".to_string()]
            })
            .returning(|_, _| Ok(()));
        mock.expect_reload_manager()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        mock.expect_restart_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let controller = connected(mock).await;
        let mut desired = controller
            .instance(InstanceId::Ptp1)
            .read()
            .unwrap()
            .last_applied
            .clone();
        desired.bound_interfaces = vec!["ens102".to_string()];

        let outcome = controller
            .apply_instance(InstanceId::Ptp1, desired.clone())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied(ChangePlan {
                steps: vec![
                    PlanStep::BindInterfaces,
                    PlanStep::ReloadManager,
                    PlanStep::RestartService
                ]
            })
        );

        let instance = controller.instance(InstanceId::Ptp1).read().unwrap().clone();
        assert_eq!(instance.last_applied, desired);
        assert_eq!(instance.desired, desired);
    }

    #[tokio::test]
    async fn test_failed_plan_leaves_snapshot_untouched() {
        let mut mock = MockConfigGateway::new();
        expect_connect(&mut mock);

        mock.expect_put_ptp_config().times(1).returning(|_, _| Ok(()));
        mock.expect_reload_manager().times(1).returning(|| {
            Err(GatewayError::Http {
                endpoint: "/api/systemd/reload".to_string(),
                status: 500,
            })
        });
        mock.expect_restart_service().times(0);

        let controller = connected(mock).await;
        let before = controller
            .instance(InstanceId::Ptp2)
            .read()
            .unwrap()
            .last_applied
            .clone();
        let mut desired = before.clone();
        desired.domain_number = 44;

        let err = controller
            .apply_instance(InstanceId::Ptp2, desired)
            .await
            .unwrap_err();
        match err {
            ControlError::Apply(apply) => assert_eq!(apply.step, PlanStep::ReloadManager),
            other => panic!("expected Apply error, got {other:?}"),
        }

        let after = controller
            .instance(InstanceId::Ptp2)
            .read()
            .unwrap()
            .last_applied
            .clone();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_apply_rejects_unknown_interface_before_any_call() {
        let mut mock = MockConfigGateway::new();
        expect_connect(&mut mock);

        let controller = connected(mock).await;
        let mut desired = controller
            .instance(InstanceId::Ptp1)
            .read()
            .unwrap()
            .last_applied
            .clone();
        desired.bound_interfaces = vec!["ens999".to_string()];

        let err = controller
            .apply_instance(InstanceId::Ptp1, desired)
            .await
            .unwrap_err();
        match err {
            ControlError::Invalid(ConfigValidationError::UnknownInterface(name)) => {
                assert_eq!(name, "ens999");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetched_mode_drives_rendered_state() {
        let mut mock = MockConfigGateway::new();
        expect_connect(&mut mock);

        let controller = connected(mock).await;
        let vm = crate::view::project(&controller.view_snapshot().unwrap());

        assert_eq!(vm.mode_label, "PTP");
        assert!(vm.ptp_visible);
        assert_eq!(vm.primary_clock.as_deref(), Some("ptp2"));
        assert_eq!(vm.instances.len(), 2);
    }

    #[tokio::test]
    async fn test_set_sync_mode_updates_local_state_on_success() {
        let mut mock = MockConfigGateway::new();
        expect_connect(&mut mock);
        mock.expect_set_sync_mode().times(1).returning(|_| Ok(()));

        let controller = connected(mock).await;
        let state = SyncModeState::new(SyncMode::Internal, None);
        controller.set_sync_mode(state).await.unwrap();

        let snapshot = controller.view_snapshot().unwrap();
        assert_eq!(snapshot.mode.mode(), SyncMode::Internal);
        assert_eq!(snapshot.mode.primary_clock(), None);
    }
}
