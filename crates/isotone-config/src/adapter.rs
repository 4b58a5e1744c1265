use std::{collections::HashMap, path::PathBuf, time::Duration};

use isotone_types::{Category, ServiceDescriptor};

use crate::{
    model::{
        Backend, Config, ServiceConfig, Timeouts, DEFAULT_POLL_INTERVAL,
        DEFAULT_PUBLISHER_CAPACITY, DEFAULT_SOCKET_DIR,
    },
    raw::{RawBackend, RawCategory, RawConfig, RawService},
    ConfigError,
};

impl RawConfig {
    pub(crate) fn to_config(self) -> Result<Config, ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::Validation("no services configured".into()));
        }

        let mut port_owners: HashMap<u16, String> = HashMap::new();
        let services = self
            .services
            .into_iter()
            .map(|(name, raw_service)| {
                let service = raw_service.to_service(&name)?;
                for port in &service.descriptor.ports {
                    if let Some(owner) = port_owners.insert(*port, name.clone()) {
                        return Err(ConfigError::Validation(format!(
                            "service `{name}`: port {port} is already used by `{owner}`"
                        )));
                    }
                }
                Ok(service)
            })
            .collect::<Result<Vec<ServiceConfig>, ConfigError>>()?;

        let defaults = Timeouts::default();
        let timeouts = match self.timeouts {
            Some(raw) => Timeouts {
                start: seconds("timeouts.start", raw.start, defaults.start)?,
                stop: seconds("timeouts.stop", raw.stop, defaults.stop)?,
                probe: seconds("timeouts.probe", raw.probe, defaults.probe)?,
                install: seconds("timeouts.install", raw.install, defaults.install)?,
            },
            None => defaults,
        };

        let poll_interval = match self.poller.and_then(|p| p.interval_ms) {
            Some(0) => {
                return Err(ConfigError::Validation(
                    "poller.interval_ms must be greater than zero".into(),
                ))
            }
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_POLL_INTERVAL,
        };

        let publisher_capacity = match self.publisher.and_then(|p| p.capacity) {
            Some(0) => {
                return Err(ConfigError::Validation(
                    "publisher.capacity must be greater than zero".into(),
                ))
            }
            Some(capacity) => capacity,
            None => DEFAULT_PUBLISHER_CAPACITY,
        };

        let backend = match self.backend {
            Some(RawBackend::Systemd) => Backend::Systemd,
            Some(RawBackend::Windows) => Backend::Windows,
            Some(RawBackend::Simulated) => Backend::Simulated,
            None => Backend::default(),
        };

        Ok(Config {
            version: self.version,
            backend,
            auto_start: self.auto_start.unwrap_or(false),
            socket_dir: PathBuf::from(
                self.socket_dir
                    .unwrap_or_else(|| DEFAULT_SOCKET_DIR.to_owned()),
            ),
            poll_interval,
            timeouts,
            publisher_capacity,
            services,
        })
    }
}

impl RawService {
    fn to_service(self, name: &str) -> Result<ServiceConfig, ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation("service name is empty".into()));
        }
        if name == "all" {
            return Err(ConfigError::Validation(
                "`all` is reserved and cannot be used as a service name".into(),
            ));
        }

        let ports = self.ports.unwrap_or_default();
        if ports.contains(&0) {
            return Err(ConfigError::Validation(format!(
                "service `{name}`: port 0 is not allowed"
            )));
        }

        let install = action(name, "install", self.install)?;
        let uninstall = action(name, "uninstall", self.uninstall)?;

        let category = match self.category {
            Some(RawCategory::Web) => Category::Web,
            Some(RawCategory::Database) => Category::Database,
            Some(RawCategory::Mail) => Category::Mail,
            Some(RawCategory::Tool) | None => Category::Tool,
        };

        let mut descriptor = ServiceDescriptor::new(name, category).with_ports(ports);
        if let Some(unit) = self.unit.filter(|u| !u.trim().is_empty()) {
            descriptor = descriptor.with_unit(unit);
        }
        if let Some(display_name) = self.display_name {
            descriptor = descriptor.with_display_name(display_name);
        }
        if let Some(description) = self.description {
            descriptor = descriptor.with_description(description);
        }

        Ok(ServiceConfig {
            descriptor,
            install,
            uninstall,
        })
    }
}

fn action(
    name: &str,
    verb: &str,
    cmd: Option<Vec<String>>,
) -> Result<Option<Vec<String>>, ConfigError> {
    let Some(cmd) = cmd else {
        return Ok(None);
    };
    if cmd.is_empty() {
        return Err(ConfigError::Validation(format!(
            "service `{name}`: {verb} command is empty"
        )));
    }
    if cmd.iter().any(|c| c.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "service `{name}`: {verb} command contains empty element"
        )));
    }
    Ok(Some(cmd))
}

fn seconds(key: &str, value: Option<u64>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Validation(format!(
            "{key} must be greater than zero"
        ))),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}
