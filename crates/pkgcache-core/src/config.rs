use crate::error::{CoreError, CoreResult};
use crate::location::CacheType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    pub root_dir: Option<PathBuf>,
    pub default_type: Option<CacheType>,
}

impl CoreConfig {
    pub fn load(path: &Path) -> CoreResult<Self> {
        let data = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let cfg: CoreConfig = serde_json::from_str(&data)?;
        if let Some(root) = &cfg.cache.root_dir {
            if root.as_os_str().is_empty() {
                return Err(CoreError::Config("cache.root_dir must not be empty".to_string()));
            }
        }
        Ok(cfg)
    }
}
