use std::{path::PathBuf, time::Duration};

use isotone_types::{Category, ServiceDescriptor};

use crate::{raw::RawConfig, ConfigError};

pub const DEFAULT_SOCKET_DIR: &str = "/tmp/isotone";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_PUBLISHER_CAPACITY: usize = 64;

/// Which service-control implementation the daemon drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Systemd,
    Windows,
    Simulated,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(windows) {
            Backend::Windows
        } else {
            Backend::Systemd
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub start: Duration,
    pub stop: Duration,
    pub probe: Duration,
    pub install: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            start: Duration::from_secs(30),
            stop: Duration::from_secs(30),
            probe: Duration::from_secs(5),
            install: Duration::from_secs(120),
        }
    }
}

/// One managed service together with the commands that install and
/// uninstall it. `{service}` and `{unit}` are substituted at launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub descriptor: ServiceDescriptor,
    pub install: Option<Vec<String>>,
    pub uninstall: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub version: u32,
    pub backend: Backend,
    pub auto_start: bool,
    pub socket_dir: PathBuf,
    pub poll_interval: Duration,
    pub timeouts: Timeouts,
    pub publisher_capacity: usize,
    pub services: Vec<ServiceConfig>,
}

impl Config {
    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter().map(|s| &s.descriptor)
    }

    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.descriptor.name == name)
    }
}

impl Default for Config {
    /// The IsotoneStack catalog: Apache, MariaDB and Mailpit.
    fn default() -> Self {
        Self {
            version: 1,
            backend: Backend::default(),
            auto_start: false,
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeouts: Timeouts::default(),
            publisher_capacity: DEFAULT_PUBLISHER_CAPACITY,
            services: vec![
                builtin(
                    ServiceDescriptor::new("web", Category::Web)
                        .with_unit("IsotoneApache")
                        .with_display_name("Apache HTTP Server")
                        .with_description("Web server handling HTTP requests")
                        .with_ports([80, 443]),
                ),
                builtin(
                    ServiceDescriptor::new("db", Category::Database)
                        .with_unit("IsotoneMariaDB")
                        .with_display_name("MariaDB Database")
                        .with_description("MySQL-compatible database server")
                        .with_ports([3306]),
                ),
                builtin(
                    ServiceDescriptor::new("mail", Category::Mail)
                        .with_unit("IsotoneMailpit")
                        .with_display_name("Mailpit Email Testing")
                        .with_description("Email testing server for development")
                        .with_ports([1025, 8025]),
                ),
            ],
        }
    }
}

fn builtin(descriptor: ServiceDescriptor) -> ServiceConfig {
    ServiceConfig {
        descriptor,
        install: Some(powershell_script("Register-Services.ps1")),
        uninstall: Some(powershell_script("Unregister-Services.ps1")),
    }
}

fn powershell_script(script: &str) -> Vec<String> {
    [
        "powershell",
        "-NoProfile",
        "-ExecutionPolicy",
        "Bypass",
        "-File",
        &format!("scripts/{script}"),
        "-Service",
        "{unit}",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        raw.to_config()
    }
}
