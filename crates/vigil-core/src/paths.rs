//! Per-user file locations.
//!
//! Everything lives under `~/.vigil/`:
//!
//! - `notifications.json`: notification settings
//! - `logs/alerts.log`: alert log (JSON lines, rotated)
//! - `logs/vigil.log.*`: application diagnostics

use std::path::PathBuf;

use crate::error::{Result, VigilError};

/// Root of all per-user Vigil state.
pub fn vigil_home() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".vigil"))
        .ok_or_else(|| VigilError::internal("could not determine home directory"))
}

/// `~/.vigil/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(vigil_home()?.join("logs"))
}

/// `~/.vigil/notifications.json`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(vigil_home()?.join("notifications.json"))
}

/// `~/.vigil/logs/alerts.log`
pub fn default_alert_log_path() -> Result<PathBuf> {
    Ok(default_log_dir()?.join("alerts.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_home() {
        let Ok(home) = vigil_home() else {
            return;
        };
        assert_eq!(default_config_path().unwrap(), home.join("notifications.json"));
        assert_eq!(
            default_alert_log_path().unwrap(),
            home.join("logs").join("alerts.log")
        );
        assert_ne!(default_config_path().unwrap(), default_alert_log_path().unwrap());
    }
}
