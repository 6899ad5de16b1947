use async_trait::async_trait;

use crate::error::GatewayError;
use crate::instance::{ClockInstanceConfig, InstanceId};
use crate::status::{AggregateStatus, CurrentTimeData, PortState, SyncModeState, TimeStatus};
use crate::wire::{NetworkInterface, PtpConfigDto};

/// Everything the console asks of the remote config API, one method per
/// endpoint. The HTTP implementation lives in `gateway`; tests substitute
/// the generated mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigGateway: Send + Sync {
    async fn network_interfaces(&self) -> Result<Vec<NetworkInterface>, GatewayError>;

    /// Persist the current interface snapshot server-side. Returns the file
    /// the server wrote.
    async fn save_interfaces(&self) -> Result<Option<String>, GatewayError>;

    async fn sync_mode(&self) -> Result<SyncModeState, GatewayError>;

    async fn set_sync_mode(&self, state: SyncModeState) -> Result<(), GatewayError>;

    async fn primary_clock(&self) -> Result<Option<InstanceId>, GatewayError>;

    async fn set_primary_clock(&self, id: InstanceId) -> Result<(), GatewayError>;

    async fn ptp_config(&self, id: InstanceId) -> Result<PtpConfigDto, GatewayError>;

    async fn put_ptp_config(
        &self,
        id: InstanceId,
        config: ClockInstanceConfig,
    ) -> Result<(), GatewayError>;

    async fn bound_interfaces(&self, id: InstanceId) -> Result<Vec<String>, GatewayError>;

    async fn bind_interfaces(
        &self,
        id: InstanceId,
        interfaces: Vec<String>,
    ) -> Result<(), GatewayError>;

    async fn reload_manager(&self) -> Result<(), GatewayError>;

    async fn start_service(&self, id: InstanceId) -> Result<(), GatewayError>;

    async fn stop_service(&self, id: InstanceId) -> Result<(), GatewayError>;

    async fn restart_service(&self, id: InstanceId) -> Result<(), GatewayError>;

    async fn time_status(&self, id: InstanceId, domain: u8) -> Result<TimeStatus, GatewayError>;

    async fn port_status(&self, id: InstanceId, domain: u8) -> Result<PortState, GatewayError>;

    async fn current_time_data(
        &self,
        id: InstanceId,
        domain: u8,
    ) -> Result<CurrentTimeData, GatewayError>;

    async fn system_clock_status(&self) -> Result<AggregateStatus, GatewayError>;

    async fn service_logs(&self, id: InstanceId, lines: u32) -> Result<String, GatewayError>;

    async fn service_status(&self, id: InstanceId) -> Result<String, GatewayError>;
}
