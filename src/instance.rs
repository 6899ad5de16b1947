use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::ObservedClockStatus;
use crate::wire::{NetworkInterface, PtpConfigDto};

/// The two fixed ptp4l deployments on this host. Everything that differs
/// between them (unit name, config file, management socket) hangs off this
/// key so no code path is written twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceId {
    Ptp1,
    Ptp2,
}

impl InstanceId {
    pub const ALL: [InstanceId; 2] = [InstanceId::Ptp1, InstanceId::Ptp2];

    pub fn label(self) -> &'static str {
        match self {
            InstanceId::Ptp1 => "ptp1",
            InstanceId::Ptp2 => "ptp2",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ptp1" => Some(InstanceId::Ptp1),
            "ptp2" => Some(InstanceId::Ptp2),
            _ => None,
        }
    }

    /// systemd unit running this instance's daemon.
    pub fn service_name(self) -> &'static str {
        match self {
            InstanceId::Ptp1 => "ptp4l.service",
            InstanceId::Ptp2 => "ptp4l1.service",
        }
    }

    pub fn config_path(self) -> &'static str {
        match self {
            InstanceId::Ptp1 => "/etc/linuxptp/ptp4l.conf",
            InstanceId::Ptp2 => "/etc/linuxptp/ptp4l1.conf",
        }
    }

    /// Management socket for the pmc-backed status queries.
    pub fn uds_path(self) -> &'static str {
        match self {
            InstanceId::Ptp1 => "/var/run/ptp4l",
            InstanceId::Ptp2 => "/var/run/ptp4l1",
        }
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("no network interface selected")]
    NoInterfaces,
    #[error("a service binds at most two interfaces, got {0}")]
    TooManyInterfaces(usize),
    #[error("unknown network interface '{0}'")]
    UnknownInterface(String),
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// One clock instance's configuration: the seven ptp4l keys plus the
/// interface set the service is bound to. The same struct serves as the
/// desired state under edit and as the last-applied snapshot, so the diff
/// keys and the PUT payload can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockInstanceConfig {
    pub domain_number: u8,
    pub priority1: u8,
    pub priority2: u8,
    pub log_announce_interval: i8,
    pub announce_receipt_timeout: u8,
    pub log_sync_interval: i8,
    pub sync_receipt_timeout: u8,
    pub bound_interfaces: Vec<String>,
}

impl ClockInstanceConfig {
    pub fn from_parts(dto: PtpConfigDto, bound_interfaces: Vec<String>) -> Self {
        ClockInstanceConfig {
            domain_number: dto.domain_number,
            priority1: dto.priority1,
            priority2: dto.priority2,
            log_announce_interval: dto.log_announce_interval,
            announce_receipt_timeout: dto.announce_receipt_timeout,
            log_sync_interval: dto.log_sync_interval,
            sync_receipt_timeout: dto.sync_receipt_timeout,
            bound_interfaces,
        }
    }

    pub fn dto(&self) -> PtpConfigDto {
        PtpConfigDto {
            domain_number: self.domain_number,
            priority1: self.priority1,
            priority2: self.priority2,
            log_announce_interval: self.log_announce_interval,
            announce_receipt_timeout: self.announce_receipt_timeout,
            log_sync_interval: self.log_sync_interval,
            sync_receipt_timeout: self.sync_receipt_timeout,
        }
    }

    /// A configured instance must name at least one interface, and only
    /// interfaces the host actually has at validation time.
    pub fn validate(&self, known: &[NetworkInterface]) -> Result<(), ConfigValidationError> {
        if self.bound_interfaces.is_empty() {
            return Err(ConfigValidationError::NoInterfaces);
        }
        if self.bound_interfaces.len() > 2 {
            return Err(ConfigValidationError::TooManyInterfaces(
                self.bound_interfaces.len(),
            ));
        }
        for name in &self.bound_interfaces {
            if !known.iter().any(|iface| &iface.name == name) {
                return Err(ConfigValidationError::UnknownInterface(name.clone()));
            }
        }
        if self.announce_receipt_timeout == 0 {
            return Err(ConfigValidationError::ZeroTimeout("announceReceiptTimeout"));
        }
        if self.sync_receipt_timeout == 0 {
            return Err(ConfigValidationError::ZeroTimeout("syncReceiptTimeout"));
        }
        Ok(())
    }

    pub fn scalars_differ(&self, other: &Self) -> bool {
        self.domain_number != other.domain_number
            || self.priority1 != other.priority1
            || self.priority2 != other.priority2
            || self.log_announce_interval != other.log_announce_interval
            || self.announce_receipt_timeout != other.announce_receipt_timeout
            || self.log_sync_interval != other.log_sync_interval
            || self.sync_receipt_timeout != other.sync_receipt_timeout
    }

    /// Interface sets compare order-independently.
    pub fn interfaces_differ(&self, other: &Self) -> bool {
        let mut a = self.bound_interfaces.clone();
        let mut b = other.bound_interfaces.clone();
        a.sort();
        b.sort();
        a != b
    }
}

/// Session-local view of one tracked clock: what the operator wants, what
/// was last pushed to the daemon, and what the daemon last reported.
#[derive(Debug, Clone)]
pub struct ClockInstance {
    pub id: InstanceId,
    pub desired: ClockInstanceConfig,
    pub last_applied: ClockInstanceConfig,
    pub observed: ObservedClockStatus,
}

impl ClockInstance {
    /// Seeds both copies from the remote fetch at startup.
    pub fn new(id: InstanceId, config: ClockInstanceConfig) -> Self {
        ClockInstance {
            id,
            desired: config.clone(),
            last_applied: config,
            observed: ObservedClockStatus::default(),
        }
    }

    /// Discard un-applied edits.
    pub fn revert(&mut self) {
        self.desired = self.last_applied.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(interfaces: &[&str]) -> ClockInstanceConfig {
        ClockInstanceConfig {
            domain_number: 127,
            priority1: 128,
            priority2: 128,
            log_announce_interval: 0,
            announce_receipt_timeout: 6,
            log_sync_interval: -3,
            sync_receipt_timeout: 6,
            bound_interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn host_interfaces() -> Vec<NetworkInterface> {
        vec![
            NetworkInterface {
                name: "ens102".to_string(),
                ip: Some("10.0.0.2".to_string()),
                is_up: true,
            },
            NetworkInterface {
                name: "ens104".to_string(),
                ip: None,
                is_up: false,
            },
        ]
    }

    #[test]
    fn test_instance_constants_are_distinct() {
        assert_eq!(InstanceId::Ptp1.service_name(), "ptp4l.service");
        assert_eq!(InstanceId::Ptp2.service_name(), "ptp4l1.service");
        assert_ne!(InstanceId::Ptp1.config_path(), InstanceId::Ptp2.config_path());
        assert_ne!(InstanceId::Ptp1.uds_path(), InstanceId::Ptp2.uds_path());
    }

    #[test]
    fn test_instance_label_round_trip() {
        for id in InstanceId::ALL {
            assert_eq!(InstanceId::from_label(id.label()), Some(id));
        }
        assert_eq!(InstanceId::from_label("ptp3"), None);
    }

    #[test]
    fn test_validate_rejects_empty_interface_set() {
        let config = sample_config(&[]);
        assert_eq!(
            config.validate(&host_interfaces()),
            Err(ConfigValidationError::NoInterfaces)
        );
    }

    #[test]
    fn test_validate_rejects_unknown_interface() {
        let config = sample_config(&["ens999"]);
        assert_eq!(
            config.validate(&host_interfaces()),
            Err(ConfigValidationError::UnknownInterface("ens999".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_more_than_two_interfaces() {
        let config = sample_config(&["ens102", "ens104", "ens105"]);
        assert_eq!(
            config.validate(&host_interfaces()),
            Err(ConfigValidationError::TooManyInterfaces(3))
        );
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = sample_config(&["ens102"]);
        config.announce_receipt_timeout = 0;
        assert_eq!(
            config.validate(&host_interfaces()),
            Err(ConfigValidationError::ZeroTimeout("announceReceiptTimeout"))
        );
    }

    #[test]
    fn test_validate_accepts_known_interface() {
        let config = sample_config(&["ens102"]);
        assert_eq!(config.validate(&host_interfaces()), Ok(()));
    }

    #[test]
    fn test_revert_restores_last_applied() {
        let mut instance = ClockInstance::new(InstanceId::Ptp1, sample_config(&["ens102"]));
        instance.desired.domain_number = 42;
        instance.revert();
        assert_eq!(instance.desired, instance.last_applied);
    }
}
