//! JSON shapes of the config-API endpoints.
//!
//! These mirror the wire format exactly; the richer model types live in
//! `instance` and `status`. Response envelopes come in two flavors the
//! server mixes freely: `{"success": bool, "error": ...}` and
//! `{"status": "success", "message": ...}`.

use serde::{Deserialize, Deserializer, Serialize};

/// Read-only snapshot of one host network adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    #[serde(default)]
    pub ip: Option<String>,
    pub is_up: bool,
}

#[derive(Debug, Deserialize)]
pub struct InterfaceListResponse {
    pub interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Deserialize)]
pub struct SyncModeResponse {
    pub success: bool,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub primary_clock: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncModeRequest<'a> {
    pub mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_clock: Option<&'a str>,
}

/// The seven ptp4l config keys, camelCased as the config API spells them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtpConfigDto {
    pub domain_number: u8,
    pub priority1: u8,
    pub priority2: u8,
    pub log_announce_interval: i8,
    pub announce_receipt_timeout: u8,
    pub log_sync_interval: i8,
    pub sync_receipt_timeout: u8,
}

#[derive(Debug, Deserialize)]
pub struct PtpConfigResponse {
    pub success: bool,
    pub config: PtpConfigDto,
}

#[derive(Debug, Serialize)]
pub struct PtpConfigUpdate<'a> {
    pub config_file: &'a str,
    #[serde(flatten)]
    pub config: PtpConfigDto,
}

#[derive(Debug, Deserialize)]
pub struct BoundInterfacesResponse {
    pub success: bool,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BindInterfacesRequest<'a> {
    pub interfaces: &'a [String],
    pub service_name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ServiceRequest<'a> {
    pub service_name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TimeStatusResponse {
    pub success: bool,
    #[serde(rename = "gmIdentity", default)]
    pub gm_identity: Option<String>,
    #[serde(rename = "gmPresent", default, deserialize_with = "bool_from_wire")]
    pub gm_present: bool,
}

#[derive(Debug, Deserialize)]
pub struct PortStatusResponse {
    pub success: bool,
    #[serde(rename = "portState", default)]
    pub port_state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentTimeDataResponse {
    pub success: bool,
    #[serde(rename = "offsetFromMaster", default)]
    pub offset_from_master: Option<i64>,
    #[serde(rename = "meanPathDelay", default)]
    pub mean_path_delay: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PrimaryClockResponse {
    pub success: bool,
    #[serde(default)]
    pub primary_clock: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PrimaryClockRequest<'a> {
    pub primary_clock: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SystemClockStatusResponse {
    pub success: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub primary_clock: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceLogsResponse {
    pub service: String,
    pub logs: String,
}

#[derive(Debug, Deserialize)]
pub struct ServiceStatusResponse {
    pub service: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveInterfacesResponse {
    pub status: String,
    #[serde(default)]
    pub file: Option<String>,
}

/// pmc-backed endpoints report `gmPresent` as the literal text "true"/"false"
/// in some firmware revisions and as a JSON bool in others. Accept both.
fn bool_from_wire<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.eq_ignore_ascii_case("true"),
    })
}
