use std::{collections::BTreeMap, time::Duration, time::SystemTime};

use serde::{Deserialize, Serialize};

use crate::{Category, Operation, Phase, ServiceDescriptor, ServiceState};

/// Per-phase service counts. Always derived from live state, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateStatus {
    counts: BTreeMap<Phase, usize>,
}

impl AggregateStatus {
    pub fn from_phases(phases: impl IntoIterator<Item = Phase>) -> Self {
        let mut counts = BTreeMap::new();
        for phase in phases {
            *counts.entry(phase).or_insert(0) += 1;
        }
        Self { counts }
    }

    #[must_use]
    pub fn count(&self, phase: Phase) -> usize {
        self.counts.get(&phase).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, usize)> + '_ {
        self.counts.iter().map(|(phase, count)| (*phase, *count))
    }
}

impl std::fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.counts.is_empty() {
            return f.write_str("no services");
        }

        let parts: Vec<String> = self
            .iter()
            .map(|(phase, count)| {
                let label = match phase {
                    Phase::NotInstalled => "not installed".to_owned(),
                    other => other.as_str().to_lowercase(),
                };
                format!("{count} {label}")
            })
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// JSON view of one service, as served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: String,
    pub display_name: String,
    pub category: Category,
    pub ports: Vec<u16>,
    pub phase: Phase,
    pub is_installed: bool,
    pub uptime_seconds: Option<u64>,
    pub last_error: Option<String>,
    pub in_flight: Option<Operation>,
}

impl ServiceStatus {
    #[must_use]
    pub fn new(
        descriptor: &ServiceDescriptor,
        state: &ServiceState,
        in_flight: Option<Operation>,
        now: SystemTime,
    ) -> Self {
        Self {
            name: descriptor.name.clone(),
            display_name: descriptor.display_name.clone(),
            category: descriptor.category,
            ports: descriptor.ports.clone(),
            phase: state.phase,
            is_installed: state.is_installed,
            uptime_seconds: state.uptime(now).map(|d| d.as_secs()),
            last_error: state.last_error.clone(),
            in_flight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub services: Vec<ServiceStatus>,
    pub aggregate: AggregateStatus,
}

impl StatusReport {
    #[must_use]
    pub fn new(services: Vec<ServiceStatus>) -> Self {
        let aggregate = AggregateStatus::from_phases(services.iter().map(|s| s.phase));
        Self {
            services,
            aggregate,
        }
    }
}

/// Compact uptime, e.g. `2d 3h 4m`, `3h 4m`, `4m 5s` or `5s`.
#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_counts() {
        let aggregate = AggregateStatus::from_phases([
            Phase::Running,
            Phase::NotInstalled,
            Phase::NotInstalled,
        ]);
        assert_eq!(aggregate.count(Phase::Running), 1);
        assert_eq!(aggregate.count(Phase::NotInstalled), 2);
        assert_eq!(aggregate.count(Phase::Error), 0);
        assert_eq!(aggregate.total(), 3);
        assert_eq!(aggregate.to_string(), "2 not installed, 1 running");
    }

    #[test]
    fn test_aggregate_json_is_a_phase_map() {
        let aggregate = AggregateStatus::from_phases([Phase::Running, Phase::Stopped]);
        let json = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(json, serde_json::json!({"Stopped": 1, "Running": 1}));
    }

    #[test]
    fn test_status_json_shape() {
        let descriptor = ServiceDescriptor::new("web", Category::Web).with_ports([80, 443]);
        let started = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let state = ServiceState {
            phase: Phase::Running,
            is_installed: true,
            last_transition_at: started,
            last_error: None,
        };

        let status = ServiceStatus::new(&descriptor, &state, None, started + Duration::from_secs(90));
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["name"], "web");
        assert_eq!(json["phase"], "Running");
        assert_eq!(json["isInstalled"], true);
        assert_eq!(json["uptimeSeconds"], 90);
        assert_eq!(json["lastError"], serde_json::Value::Null);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(5)), "5s");
        assert_eq!(format_uptime(Duration::from_secs(4 * 60 + 5)), "4m 5s");
        assert_eq!(format_uptime(Duration::from_secs(3 * 3_600 + 4 * 60 + 5)), "3h 4m");
        assert_eq!(
            format_uptime(Duration::from_secs(2 * 86_400 + 3 * 3_600 + 4 * 60)),
            "2d 3h 4m"
        );
    }
}
