use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;

/// System-wide time source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Internal,
    Bb,
    Ptp,
}

impl SyncMode {
    pub fn as_wire(self) -> &'static str {
        match self {
            SyncMode::Internal => "internal",
            SyncMode::Bb => "BB",
            SyncMode::Ptp => "PTP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Some(SyncMode::Internal),
            "bb" => Some(SyncMode::Bb),
            "ptp" => Some(SyncMode::Ptp),
            _ => None,
        }
    }
}

/// Mode selector state. `primary_clock` only carries meaning in PTP mode;
/// the constructor drops it otherwise so the invariant holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncModeState {
    mode: SyncMode,
    primary_clock: Option<InstanceId>,
}

impl SyncModeState {
    pub fn new(mode: SyncMode, primary_clock: Option<InstanceId>) -> Self {
        let primary_clock = match mode {
            SyncMode::Ptp => primary_clock,
            _ => None,
        };
        SyncModeState { mode, primary_clock }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn primary_clock(&self) -> Option<InstanceId> {
        self.primary_clock
    }
}

impl Default for SyncModeState {
    fn default() -> Self {
        SyncModeState::new(SyncMode::Internal, None)
    }
}

/// ptp4l port states as reported by the port-status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortState {
    Initializing,
    Listening,
    Uncalibrated,
    Slave,
    Master,
    Faulty,
    Disabled,
    Unknown,
}

impl PortState {
    /// Unrecognized strings map to `Unknown` rather than failing the poll.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "INITIALIZING" => PortState::Initializing,
            "LISTENING" => PortState::Listening,
            "UNCALIBRATED" => PortState::Uncalibrated,
            "SLAVE" => PortState::Slave,
            "MASTER" => PortState::Master,
            "FAULTY" => PortState::Faulty,
            "DISABLED" => PortState::Disabled,
            _ => PortState::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortState::Initializing => "INITIALIZING",
            PortState::Listening => "LISTENING",
            PortState::Uncalibrated => "UNCALIBRATED",
            PortState::Slave => "SLAVE",
            PortState::Master => "MASTER",
            PortState::Faulty => "FAULTY",
            PortState::Disabled => "DISABLED",
            PortState::Unknown => "UNKNOWN",
        }
    }
}

/// Fields of the TIME_STATUS_NP grandmaster query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStatus {
    pub gm_identity: Option<String>,
    pub gm_present: bool,
}

/// Fields of the CURRENT_DATA_SET query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentTimeData {
    pub offset_from_master_ns: Option<i64>,
    pub mean_path_delay_ns: Option<i64>,
}

/// Last observed daemon state for one clock instance.
///
/// Replaced wholesale on every successful poll cycle and left untouched on a
/// failed one, so the fields are always from a single generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedClockStatus {
    pub gm_identity: Option<String>,
    pub gm_present: bool,
    pub port_state: PortState,
    pub offset_from_master_ns: Option<i64>,
    pub mean_path_delay_ns: Option<i64>,
    pub updated_at: Option<DateTime<Local>>,
}

impl Default for ObservedClockStatus {
    fn default() -> Self {
        ObservedClockStatus {
            gm_identity: None,
            gm_present: false,
            port_state: PortState::Unknown,
            offset_from_master_ns: None,
            mean_path_delay_ns: None,
            updated_at: None,
        }
    }
}

/// Host-level clock summary from the aggregate status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateStatus {
    pub status: String,
    pub locked: bool,
    pub offset_ns: Option<i64>,
    pub primary_clock: Option<InstanceId>,
}

impl Default for AggregateStatus {
    fn default() -> Self {
        AggregateStatus {
            status: "unknown".to_string(),
            locked: false,
            offset_ns: None,
            primary_clock: None,
        }
    }
}
