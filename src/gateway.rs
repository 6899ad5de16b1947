//! HTTP implementation of the [`ConfigGateway`] seam.
//!
//! All failures come back as values; nothing here retries. Retry/refresh
//! policy belongs to the poller and the operator.

use async_trait::async_trait;
use log::debug;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientSettings;
use crate::error::GatewayError;
use crate::instance::{ClockInstanceConfig, InstanceId};
use crate::status::{
    AggregateStatus, CurrentTimeData, PortState, SyncMode, SyncModeState, TimeStatus,
};
use crate::traits::ConfigGateway;
use crate::wire::{
    BindInterfacesRequest, BoundInterfacesResponse, CurrentTimeDataResponse,
    InterfaceListResponse, NetworkInterface, PortStatusResponse, PrimaryClockRequest,
    PrimaryClockResponse, PtpConfigDto, PtpConfigResponse, PtpConfigUpdate,
    SaveInterfacesResponse, ServiceLogsResponse, ServiceRequest, ServiceStatusResponse,
    SyncModeRequest, SyncModeResponse, SystemClockStatusResponse, TimeStatusResponse,
};

pub struct HttpGateway {
    client: reqwest::Client,
    base: String,
}

impl HttpGateway {
    pub fn new(settings: &ClientSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(HttpGateway {
            client,
            base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Issue one request and return the decoded JSON body. Non-2xx statuses
    /// and unreachable hosts surface as transport errors; the per-endpoint
    /// success envelope is checked by the typed wrappers.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.base, path);
        debug!("[gateway] {} {}", method, path);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|source| GatewayError::Network {
            endpoint: path.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|source| GatewayError::Network {
            endpoint: path.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| GatewayError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let value = self.call(Method::GET, path, None).await?;
        decode(path, value)
    }

    /// PUT/POST with a `{"success": ..., "error": ...}` acknowledgement.
    async fn send_checked(
        &self,
        method: Method,
        path: &str,
        body: Value,
    ) -> Result<(), GatewayError> {
        let value = self.call(method, path, Some(body)).await?;
        check_success(path, &value)
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|source| GatewayError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn encode<T: serde::Serialize>(endpoint: &str, body: &T) -> Result<Value, GatewayError> {
    serde_json::to_value(body).map_err(|source| GatewayError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Check the `{"success": bool}` envelope. Endpoints without the field
/// (plain data responses) pass through.
fn check_success(endpoint: &str, value: &Value) -> Result<(), GatewayError> {
    match value.get("success").and_then(Value::as_bool) {
        Some(true) | None => Ok(()),
        Some(false) => Err(GatewayError::Rejected {
            endpoint: endpoint.to_string(),
            message: envelope_message(value),
        }),
    }
}

/// Check the `{"status": "success"}` envelope used by the interface-binding
/// and save endpoints.
fn check_status_tag(endpoint: &str, value: &Value) -> Result<(), GatewayError> {
    match value.get("status").and_then(Value::as_str) {
        Some("success") => Ok(()),
        _ => Err(GatewayError::Rejected {
            endpoint: endpoint.to_string(),
            message: envelope_message(value),
        }),
    }
}

fn envelope_message(value: &Value) -> String {
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unspecified server error")
        .to_string()
}

#[async_trait]
impl ConfigGateway for HttpGateway {
    async fn network_interfaces(&self) -> Result<Vec<NetworkInterface>, GatewayError> {
        let parsed: InterfaceListResponse = self.get("/api/network-interfaces").await?;
        Ok(parsed.interfaces)
    }

    async fn save_interfaces(&self) -> Result<Option<String>, GatewayError> {
        let path = "/api/network-interfaces/save";
        let value = self.call(Method::POST, path, None).await?;
        check_status_tag(path, &value)?;
        let parsed: SaveInterfacesResponse = decode(path, value)?;
        Ok(parsed.file)
    }

    async fn sync_mode(&self) -> Result<SyncModeState, GatewayError> {
        let path = "/api/clock-sync-mode";
        let value = self.call(Method::GET, path, None).await?;
        check_success(path, &value)?;
        let parsed: SyncModeResponse = decode(path, value)?;

        let mode = parsed
            .mode
            .as_deref()
            .and_then(SyncMode::parse)
            .unwrap_or(SyncMode::Internal);
        let primary = parsed.primary_clock.as_deref().and_then(InstanceId::from_label);
        Ok(SyncModeState::new(mode, primary))
    }

    async fn set_sync_mode(&self, state: SyncModeState) -> Result<(), GatewayError> {
        let path = "/api/clock-sync-mode";
        let body = encode(
            path,
            &SyncModeRequest {
                mode: state.mode().as_wire(),
                primary_clock: state.primary_clock().map(InstanceId::label),
            },
        )?;
        self.send_checked(Method::PUT, path, body).await
    }

    async fn primary_clock(&self) -> Result<Option<InstanceId>, GatewayError> {
        let path = "/api/primary-clock";
        let value = self.call(Method::GET, path, None).await?;
        check_success(path, &value)?;
        let parsed: PrimaryClockResponse = decode(path, value)?;
        Ok(parsed.primary_clock.as_deref().and_then(InstanceId::from_label))
    }

    async fn set_primary_clock(&self, id: InstanceId) -> Result<(), GatewayError> {
        let path = "/api/primary-clock";
        let body = encode(
            path,
            &PrimaryClockRequest {
                primary_clock: id.label(),
            },
        )?;
        self.send_checked(Method::PUT, path, body).await
    }

    async fn ptp_config(&self, id: InstanceId) -> Result<PtpConfigDto, GatewayError> {
        let path = format!("/api/ptp-config?config_file={}", id.config_path());
        let value = self.call(Method::GET, &path, None).await?;
        check_success(&path, &value)?;
        let parsed: PtpConfigResponse = decode(&path, value)?;
        Ok(parsed.config)
    }

    async fn put_ptp_config(
        &self,
        id: InstanceId,
        config: ClockInstanceConfig,
    ) -> Result<(), GatewayError> {
        let path = "/api/ptp-config";
        let body = encode(
            path,
            &PtpConfigUpdate {
                config_file: id.config_path(),
                config: config.dto(),
            },
        )?;
        self.send_checked(Method::PUT, path, body).await
    }

    async fn bound_interfaces(&self, id: InstanceId) -> Result<Vec<String>, GatewayError> {
        let path = format!("/api/systemd/service-interfaces/{}", id.service_name());
        let value = self.call(Method::GET, &path, None).await?;
        check_success(&path, &value)?;
        let parsed: BoundInterfacesResponse = decode(&path, value)?;
        Ok(parsed.interfaces)
    }

    async fn bind_interfaces(
        &self,
        id: InstanceId,
        interfaces: Vec<String>,
    ) -> Result<(), GatewayError> {
        let path = "/api/ptp4l-service-interface";
        let body = encode(
            path,
            &BindInterfacesRequest {
                interfaces: &interfaces,
                service_name: id.service_name(),
            },
        )?;
        let value = self.call(Method::PUT, path, Some(body)).await?;
        check_status_tag(path, &value)
    }

    async fn reload_manager(&self) -> Result<(), GatewayError> {
        let path = "/api/systemd/reload";
        let value = self.call(Method::POST, path, None).await?;
        check_success(path, &value)
    }

    async fn start_service(&self, id: InstanceId) -> Result<(), GatewayError> {
        self.service_op("start-service", id).await
    }

    async fn stop_service(&self, id: InstanceId) -> Result<(), GatewayError> {
        self.service_op("stop-service", id).await
    }

    async fn restart_service(&self, id: InstanceId) -> Result<(), GatewayError> {
        self.service_op("restart-service", id).await
    }

    async fn time_status(&self, id: InstanceId, domain: u8) -> Result<TimeStatus, GatewayError> {
        let path = format!(
            "/api/ptp-timestatus?uds_path={}&domain={}",
            id.uds_path(),
            domain
        );
        let value = self.call(Method::GET, &path, None).await?;
        check_success(&path, &value)?;
        let parsed: TimeStatusResponse = decode(&path, value)?;
        Ok(TimeStatus {
            gm_identity: parsed.gm_identity,
            gm_present: parsed.gm_present,
        })
    }

    async fn port_status(&self, id: InstanceId, domain: u8) -> Result<PortState, GatewayError> {
        let path = format!(
            "/api/ptp-port-status?uds_path={}&domain={}",
            id.uds_path(),
            domain
        );
        let value = self.call(Method::GET, &path, None).await?;
        check_success(&path, &value)?;
        let parsed: PortStatusResponse = decode(&path, value)?;
        Ok(parsed
            .port_state
            .as_deref()
            .map(PortState::parse)
            .unwrap_or(PortState::Unknown))
    }

    async fn current_time_data(
        &self,
        id: InstanceId,
        domain: u8,
    ) -> Result<CurrentTimeData, GatewayError> {
        let path = format!(
            "/api/ptp-currenttimedata?uds_path={}&domain={}",
            id.uds_path(),
            domain
        );
        let value = self.call(Method::GET, &path, None).await?;
        check_success(&path, &value)?;
        let parsed: CurrentTimeDataResponse = decode(&path, value)?;
        Ok(CurrentTimeData {
            offset_from_master_ns: parsed.offset_from_master,
            mean_path_delay_ns: parsed.mean_path_delay,
        })
    }

    async fn system_clock_status(&self) -> Result<AggregateStatus, GatewayError> {
        let path = "/api/system-clock-status";
        let value = self.call(Method::GET, path, None).await?;
        check_success(path, &value)?;
        let parsed: SystemClockStatusResponse = decode(path, value)?;
        Ok(AggregateStatus {
            status: parsed.status.unwrap_or_else(|| "unknown".to_string()),
            locked: parsed.locked,
            offset_ns: parsed.offset,
            primary_clock: parsed.primary_clock.as_deref().and_then(InstanceId::from_label),
        })
    }

    async fn service_logs(&self, id: InstanceId, lines: u32) -> Result<String, GatewayError> {
        let path = format!("/api/systemd/logs/{}?lines={}", id.service_name(), lines);
        let value = self.call(Method::GET, &path, None).await?;
        let parsed: ServiceLogsResponse = decode(&path, value)?;
        Ok(parsed.logs)
    }

    async fn service_status(&self, id: InstanceId) -> Result<String, GatewayError> {
        let path = format!("/api/systemd/status/{}", id.service_name());
        let value = self.call(Method::GET, &path, None).await?;
        let parsed: ServiceStatusResponse = decode(&path, value)?;
        Ok(parsed.status)
    }
}

impl HttpGateway {
    async fn service_op(&self, op: &str, id: InstanceId) -> Result<(), GatewayError> {
        let path = format!("/api/systemd/{}", op);
        let body = encode(
            &path,
            &ServiceRequest {
                service_name: id.service_name(),
            },
        )?;
        self.send_checked(Method::POST, &path, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_success_passes_plain_data() {
        let value = serde_json::json!({"interfaces": []});
        assert!(check_success("/api/network-interfaces", &value).is_ok());
    }

    #[test]
    fn test_check_success_carries_server_message() {
        let value = serde_json::json!({"success": false, "error": "config file not found"});
        let err = check_success("/api/ptp-config", &value).unwrap_err();
        match err {
            GatewayError::Rejected { message, .. } => {
                assert_eq!(message, "config file not found");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_check_status_tag() {
        let ok = serde_json::json!({"status": "success", "message": "ExecStart updated"});
        assert!(check_status_tag("/api/ptp4l-service-interface", &ok).is_ok());

        let failed = serde_json::json!({"status": "failed", "message": "ExecStart line missing"});
        let err = check_status_tag("/api/ptp4l-service-interface", &failed).unwrap_err();
        assert!(!err.is_transport());
        assert!(err.to_string().contains("ExecStart line missing"));
    }
}
