use crate::error::Result;
use libertree::{Group, DEFAULT_INDENT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Library-level settings, read from TOML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub name: String,
    pub indent: usize,
    pub delay_model: String,
    pub time_unit: String,
    pub voltage_unit: String,
    pub current_unit: String,
    pub pulling_resistance_unit: String,
    pub leakage_power_unit: String,
    /// Rendered as a call, e.g. `capacitive_load_unit (1,pf);`
    pub capacitive_load_unit: String,
    /// liberty2json output whose header and cells seed the library
    pub base_library: Option<PathBuf>,
    /// Replaces the built-in operation catalog
    pub catalog: Option<PathBuf>,
    /// Emit a `type (busN)` group for every bus width in use
    pub bus_types: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            name: "predlib".to_string(),
            indent: DEFAULT_INDENT,
            delay_model: "table_lookup".to_string(),
            time_unit: "1ns".to_string(),
            voltage_unit: "1V".to_string(),
            current_unit: "1mA".to_string(),
            pulling_resistance_unit: "1kohm".to_string(),
            leakage_power_unit: "1nW".to_string(),
            capacitive_load_unit: "1,pf".to_string(),
            base_library: None,
            catalog: None,
            bus_types: true,
        }
    }
}

impl LibraryConfig {
    pub fn from_toml(input: &str) -> Result<Self> {
        let value = toml::from_str(input)?;
        Ok(value)
    }

    /// Relative paths inside the file resolve against its directory.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let mut value = Self::from_toml(&input)?;
        value.resolve_paths(path);
        Ok(value)
    }

    fn resolve_paths(&mut self, path: &Path) {
        let Some(dir) = path.parent() else {
            return;
        };
        for p in [&mut self.base_library, &mut self.catalog].into_iter().flatten() {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        }
    }

    /// Header attributes of the library group.
    pub fn header(&self) -> Group {
        Group::new()
            .with_attr("delay_model", self.delay_model.as_str())
            .with_attr("time_unit", self.time_unit.as_str())
            .with_attr("voltage_unit", self.voltage_unit.as_str())
            .with_attr("current_unit", self.current_unit.as_str())
            .with_attr("pulling_resistance_unit", self.pulling_resistance_unit.as_str())
            .with_attr("leakage_power_unit", self.leakage_power_unit.as_str())
            .with_attr("capacitive_load_unit", self.capacitive_load_unit.as_str())
    }
}
