//! Machine configuration, stored as JSON

use crate::DmgError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One video frame at 4.194304 MHz / 59.73 Hz
pub const CYCLES_PER_FRAME: u64 = 70224;

/// Where execution starts after reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    /// Skip the boot program; PC starts at $0100 with post-boot registers
    #[default]
    Cartridge,
    /// Run the mounted boot ROM from $0000
    Bootrom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub boot: BootMode,
    /// Cycle budget of one `step_frame`
    pub slice_cycles: u64,
    /// Expected SHA-256 of the boot ROM, hex; `None` accepts only the retail
    /// DMG image
    pub bootrom_sha256: Option<String>,
    /// Drop CPU writes to the cartridge bytes at $0100-$80FF
    pub ignore_rom_writes: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            boot: BootMode::Cartridge,
            slice_cycles: CYCLES_PER_FRAME,
            bootrom_sha256: None,
            ignore_rom_writes: true,
        }
    }
}

impl MachineConfig {
    pub fn from_json(text: &str) -> Result<Self, DmgError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, DmgError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, DmgError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.boot, BootMode::Cartridge);
        assert_eq!(config.slice_cycles, 70224);
        assert!(config.bootrom_sha256.is_none());
        assert!(config.ignore_rom_writes);
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        assert_eq!(
            MachineConfig::from_json("{}").unwrap(),
            MachineConfig::default()
        );
    }

    #[test]
    fn test_parse_fields() {
        let config = MachineConfig::from_json(
            r#"{"boot": "bootrom", "slice_cycles": 1000, "bootrom_sha256": "ab", "ignore_rom_writes": false}"#,
        )
        .unwrap();
        assert_eq!(config.boot, BootMode::Bootrom);
        assert_eq!(config.slice_cycles, 1000);
        assert_eq!(config.bootrom_sha256.as_deref(), Some("ab"));
        assert!(!config.ignore_rom_writes);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            MachineConfig::from_json(r#"{"boot": "floppy"}"#),
            Err(DmgError::Config(_))
        ));
        assert!(matches!(
            MachineConfig::from_json("not json"),
            Err(DmgError::Config(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = MachineConfig {
            boot: BootMode::Bootrom,
            ..MachineConfig::default()
        };
        let text = config.to_json().unwrap();
        assert!(text.contains("\"bootrom\""));
        assert_eq!(MachineConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MachineConfig::load(Path::new("/nonexistent/dmg.json")).unwrap_err();
        assert!(matches!(err, DmgError::Io(_)));
    }
}
