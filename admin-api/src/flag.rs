//! Plants the proof-of-compromise file at startup.
//!
//! Every step is best-effort: a container without the low-privilege account,
//! or a run without permission to write the flag path, still starts.

use crate::config::FlagConfig;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantOutcome {
    Planted,
    AlreadyPresent,
    Failed,
}

pub fn plant_flag(config: &FlagConfig) -> PlantOutcome {
    if let Some(parent) = config.path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            debug!("Could not create {}: {}", parent.display(), e);
        }
    }

    if config.path.exists() {
        return PlantOutcome::AlreadyPresent;
    }

    if let Err(e) = std::fs::write(&config.path, &config.contents) {
        debug!("Could not write flag to {}: {}", config.path.display(), e);
        return PlantOutcome::Failed;
    }

    match chown_to_owner(&config.path, &config.owner) {
        Ok(()) => info!("Flag planted at {} for {}", config.path.display(), config.owner),
        Err(e) => debug!("Flag planted at {}; chown skipped: {}", config.path.display(), e),
    }

    PlantOutcome::Planted
}

#[cfg(unix)]
fn chown_to_owner(path: &Path, owner: &str) -> Result<(), String> {
    use nix::unistd::{chown, User};

    let user = User::from_name(owner)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no such user: {}", owner))?;
    chown(path, Some(user.uid), Some(user.gid)).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn chown_to_owner(_path: &Path, _owner: &str) -> Result<(), String> {
    Err("ownership change unsupported on this platform".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> FlagConfig {
        FlagConfig {
            path: dir.join("home").join("flag.txt"),
            owner: "no-such-user-for-tests".to_string(),
            ..FlagConfig::default()
        }
    }

    #[test]
    fn test_plants_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        assert_eq!(plant_flag(&config), PlantOutcome::Planted);
        assert_eq!(
            std::fs::read_to_string(&config.path).unwrap(),
            "FLAG{non_root_rce_obtained}\n"
        );

        std::fs::write(&config.path, "edited").unwrap();
        assert_eq!(plant_flag(&config), PlantOutcome::AlreadyPresent);
        assert_eq!(std::fs::read_to_string(&config.path).unwrap(), "edited");
    }

    #[test]
    fn test_unwritable_path_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();

        let config = FlagConfig {
            path: blocker.join("flag.txt"),
            ..config_in(dir.path())
        };
        assert_eq!(plant_flag(&config), PlantOutcome::Failed);
    }
}
