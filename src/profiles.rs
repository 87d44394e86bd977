//! Named run configurations persisted as one JSON file per profile

use crate::automation::RunConfig;
use crate::error::{AutomationError, AutomationResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const PROFILE_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// Open the store at `dir`, creating the directory if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> AutomationResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| AutomationError::ProfileIo {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, name: &str, config: &RunConfig) -> AutomationResult<PathBuf> {
        let path = self.path_for(name)?;
        let json = serde_json::to_string_pretty(config).map_err(|source| {
            AutomationError::ProfileFormat {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, json).map_err(|source| AutomationError::ProfileIo {
            path: path.clone(),
            source,
        })?;
        log::info!("💾 Saved profile '{}' to {:?}", name, path);
        Ok(path)
    }

    pub fn load(&self, name: &str) -> AutomationResult<RunConfig> {
        let path = self.path_for(name)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AutomationError::ProfileNotFound {
                    name: name.to_string(),
                    dir: self.dir.clone(),
                });
            }
            Err(source) => return Err(AutomationError::ProfileIo { path, source }),
        };
        let config = serde_json::from_str(&json)
            .map_err(|source| AutomationError::ProfileFormat { path, source })?;
        log::debug!("📂 Loaded profile '{}'", name);
        Ok(config)
    }

    /// Remove a profile. Deleting a profile that does not exist is not an error.
    pub fn delete(&self, name: &str) -> AutomationResult<()> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("🗑️ Deleted profile '{}'", name);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AutomationError::ProfileIo { path, source }),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Profile names, sorted
    pub fn list(&self) -> AutomationResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| AutomationError::ProfileIo {
            path: self.dir.clone(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(PROFILE_EXTENSION)
            })
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    fn path_for(&self, name: &str) -> AutomationResult<PathBuf> {
        let invalid = name.trim().is_empty()
            || name.contains(['/', '\\'])
            || name == "."
            || name == "..";
        if invalid {
            return Err(AutomationError::ProfileName {
                name: name.to_string(),
            });
        }
        Ok(self.dir.join(format!("{}.{}", name, PROFILE_EXTENSION)))
    }
}
