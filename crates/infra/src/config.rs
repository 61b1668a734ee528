//! Configuration loading.
//!
//! Layers, later wins:
//! 1. defaults in code
//! 2. optional `config/{environment}` file (toml, yaml, json, ...)
//! 3. `FARMOPS__SECTION__KEY` environment variables
//!
//! The environment name comes from `FARMOPS_ENVIRONMENT` (default `development`).

use std::collections::HashMap;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use farmops_inventory::{ProvisioningPolicy, UnitLayout, UnitTemplates};

use crate::command_dispatcher::DEFAULT_CONFLICT_RETRIES;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FarmopsConfig {
    pub environment: String,
    pub server: ServerConfig,
    pub provisioning: ProvisioningConfig,
    pub layouts: LayoutConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    /// Shortest RFID tag accepted at validation.
    pub rfid_min_length: usize,
    /// Re-validations allowed after losing an append race.
    pub max_conflict_retries: u32,
}

/// Crop grid of newly provisioned trays (nursery) and panels (cultivation).
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LayoutConfig {
    pub tray_rows: u16,
    pub tray_columns: u16,
    pub panel_channels: u16,
    pub panel_channel_length: u16,
}

impl FarmopsConfig {
    /// Load configuration from files and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("FARMOPS_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        Self::load_with(&environment, None)
    }

    /// Load with an explicit environment name and, optionally, an explicit variable map
    /// standing in for the process environment.
    pub fn load_with(
        environment: &str,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default(
                "provisioning.rfid_min_length",
                farmops_inventory::DEFAULT_RFID_MIN_LENGTH as u64,
            )?
            .set_default("provisioning.max_conflict_retries", DEFAULT_CONFLICT_RETRIES)?
            .set_default("layouts.tray_rows", 20)?
            .set_default("layouts.tray_columns", 10)?
            .set_default("layouts.panel_channels", 6)?
            .set_default("layouts.panel_channel_length", 20)?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("FARMOPS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provisioning.rfid_min_length == 0 {
            return Err(ConfigError::Message(
                "provisioning.rfid_min_length must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("layouts.tray_rows", self.layouts.tray_rows),
            ("layouts.tray_columns", self.layouts.tray_columns),
            ("layouts.panel_channels", self.layouts.panel_channels),
            ("layouts.panel_channel_length", self.layouts.panel_channel_length),
        ] {
            if value == 0 {
                return Err(ConfigError::Message(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn policy(&self) -> ProvisioningPolicy {
        ProvisioningPolicy {
            rfid_min_length: self.provisioning.rfid_min_length,
        }
    }

    pub fn templates(&self) -> UnitTemplates {
        UnitTemplates {
            tray: UnitLayout::Tray {
                rows: self.layouts.tray_rows,
                columns: self.layouts.tray_columns,
            },
            panel: UnitLayout::Panel {
                channels: self.layouts.panel_channels,
                channel_length: self.layouts.panel_channel_length,
            },
        }
    }
}
