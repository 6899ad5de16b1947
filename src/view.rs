//! Pure projection of session state onto the presentation surface.
//!
//! `project` derives everything from the current snapshot, never from what
//! was rendered before, so repeated or out-of-order renders of the same
//! state are identical. The watch loop compares `ViewModel`s and reprints
//! only on change.

use crate::controller::ViewSnapshot;
use crate::instance::ClockInstance;
use crate::status::{PortState, SyncMode};

/// Severity class attached to a rendered value, named like the CSS classes
/// the values carry on a graphical surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Ok,
    Warn,
    Muted,
}

impl StateClass {
    pub fn tag(self) -> &'static str {
        match self {
            StateClass::Ok => "ok",
            StateClass::Warn => "warn",
            StateClass::Muted => "muted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceView {
    pub label: String,
    pub is_primary: bool,
    pub gm_identity: String,
    pub lock_label: String,
    pub lock_class: StateClass,
    pub port_state: String,
    pub port_class: StateClass,
    pub offset: String,
    pub path_delay: String,
    pub updated: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub mode_label: String,
    pub aggregate_label: String,
    pub aggregate_class: StateClass,
    /// Present only in PTP mode.
    pub primary_clock: Option<String>,
    /// PTP-only sections (per-instance status) render only when set.
    pub ptp_visible: bool,
    pub instances: Vec<InstanceView>,
}

pub fn project(snapshot: &ViewSnapshot) -> ViewModel {
    let mode = snapshot.mode.mode();
    let ptp_visible = mode == SyncMode::Ptp;

    let aggregate_class = if snapshot.aggregate.locked {
        StateClass::Ok
    } else {
        StateClass::Warn
    };
    let aggregate_label = match snapshot.aggregate.offset_ns {
        Some(offset) => format!("{} (offset {} ns)", snapshot.aggregate.status, offset),
        None => snapshot.aggregate.status.clone(),
    };

    let primary = snapshot.mode.primary_clock();
    let instances = if ptp_visible {
        snapshot
            .instances
            .iter()
            .map(|instance| project_instance(instance, primary == Some(instance.id)))
            .collect()
    } else {
        Vec::new()
    };

    ViewModel {
        mode_label: mode.as_wire().to_string(),
        aggregate_label,
        aggregate_class,
        primary_clock: primary.filter(|_| ptp_visible).map(|id| id.label().to_string()),
        ptp_visible,
        instances,
    }
}

fn project_instance(instance: &ClockInstance, is_primary: bool) -> InstanceView {
    let observed = &instance.observed;

    let (lock_label, lock_class) = if observed.gm_present {
        ("locked".to_string(), StateClass::Ok)
    } else {
        ("unlocked".to_string(), StateClass::Warn)
    };

    let port_class = match observed.port_state {
        PortState::Slave | PortState::Master => StateClass::Ok,
        PortState::Faulty => StateClass::Warn,
        _ => StateClass::Muted,
    };

    InstanceView {
        label: instance.id.label().to_string(),
        is_primary,
        gm_identity: observed.gm_identity.clone().unwrap_or_else(placeholder),
        lock_label,
        lock_class,
        port_state: observed.port_state.as_str().to_string(),
        port_class,
        offset: nanos_label(observed.offset_from_master_ns),
        path_delay: nanos_label(observed.mean_path_delay_ns),
        updated: observed
            .updated_at
            .map(|ts| ts.format("%H:%M:%S").to_string())
            .unwrap_or_else(placeholder),
    }
}

fn placeholder() -> String {
    "-".to_string()
}

fn nanos_label(value: Option<i64>) -> String {
    match value {
        Some(ns) => format!("{} ns", ns),
        None => placeholder(),
    }
}

/// Format the model as terminal lines. Purely a function of the model.
pub fn render_lines(vm: &ViewModel) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("Sync mode: {}", vm.mode_label));
    lines.push(format!(
        "System clock: {} [{}]",
        vm.aggregate_label,
        vm.aggregate_class.tag()
    ));
    if let Some(primary) = &vm.primary_clock {
        lines.push(format!("Primary clock: {}", primary));
    }
    for instance in &vm.instances {
        let primary_marker = if instance.is_primary { " (primary)" } else { "" };
        lines.push(format!("{}{}", instance.label, primary_marker));
        lines.push(format!(
            "  GM: {} | {} [{}] | port {} [{}]",
            instance.gm_identity,
            instance.lock_label,
            instance.lock_class.tag(),
            instance.port_state,
            instance.port_class.tag()
        ));
        lines.push(format!(
            "  offset {} | path delay {} | updated {}",
            instance.offset, instance.path_delay, instance.updated
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{ClockInstanceConfig, InstanceId};
    use crate::status::{AggregateStatus, ObservedClockStatus, SyncModeState};

    fn sample_config() -> ClockInstanceConfig {
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

    fn snapshot(mode: SyncModeState) -> ViewSnapshot {
        let mut instance1 = ClockInstance::new(InstanceId::Ptp1, sample_config());
        instance1.observed = ObservedClockStatus {
            gm_identity: Some("b8ce.f6ff.fe123456".to_string()),
            gm_present: true,
            port_state: PortState::Slave,
            offset_from_master_ns: Some(-42),
            mean_path_delay_ns: Some(310),
            updated_at: None,
        };
        let instance2 = ClockInstance::new(InstanceId::Ptp2, sample_config());
        ViewSnapshot {
            mode,
            aggregate: AggregateStatus::default(),
            instances: [instance1, instance2],
        }
    }

    #[test]
    fn test_internal_mode_hides_ptp_fields() {
        let vm = project(&snapshot(SyncModeState::new(SyncMode::Internal, None)));
        assert!(!vm.ptp_visible);
        assert!(vm.instances.is_empty());
        assert_eq!(vm.primary_clock, None);
        assert_eq!(vm.mode_label, "internal");
    }

    #[test]
    fn test_ptp_mode_shows_status_and_primary_selector() {
        let vm = project(&snapshot(SyncModeState::new(
            SyncMode::Ptp,
            Some(InstanceId::Ptp1),
        )));
        assert!(vm.ptp_visible);
        assert_eq!(vm.primary_clock.as_deref(), Some("ptp1"));
        assert_eq!(vm.instances.len(), 2);
        assert!(vm.instances[0].is_primary);
        assert!(!vm.instances[1].is_primary);
        assert_eq!(vm.instances[0].gm_identity, "b8ce.f6ff.fe123456");
        assert_eq!(vm.instances[0].lock_class, StateClass::Ok);
        assert_eq!(vm.instances[0].offset, "-42 ns");
        assert_eq!(vm.instances[1].gm_identity, "-");
        assert_eq!(vm.instances[1].lock_class, StateClass::Warn);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let snap = snapshot(SyncModeState::new(SyncMode::Ptp, Some(InstanceId::Ptp2)));
        let first = project(&snap);
        let second = project(&snap);
        assert_eq!(first, second);
        assert_eq!(render_lines(&first), render_lines(&second));
    }

    #[test]
    fn test_render_lines_follow_visibility() {
        let hidden = render_lines(&project(&snapshot(SyncModeState::new(SyncMode::Bb, None))));
        assert!(hidden.iter().all(|line| !line.contains("ptp1")));

        let shown = render_lines(&project(&snapshot(SyncModeState::new(
            SyncMode::Ptp,
            Some(InstanceId::Ptp2),
        ))));
        assert!(shown.iter().any(|line| line.starts_with("ptp1")));
        assert!(shown.iter().any(|line| line.contains("ptp2 (primary)")));
    }
}
