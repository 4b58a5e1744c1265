use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Web,
    Database,
    Mail,
    Tool,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Web => "web",
            Category::Database => "database",
            Category::Mail => "mail",
            Category::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// Static identity of a managed service.
///
/// `name` is the key every command uses; `unit` is the name the operating
/// system's service manager knows the service by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub unit: String,
    pub display_name: String,
    pub description: String,
    pub ports: Vec<u16>,
    pub category: Category,
}

impl ServiceDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        let name = name.into();
        Self {
            unit: name.clone(),
            display_name: name.clone(),
            description: String::new(),
            ports: Vec::new(),
            category,
            name,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }
}
