use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const HTTP_SUBDIR: &str = "http";
pub const WHEEL_SUBDIR: &str = "wheels";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    Http,
    #[default]
    Wheel,
    All,
}

impl CacheType {
    pub const NAMES: [&'static str; 3] = ["all", "http", "wheel"];

    /// `All` expands to http then wheel.
    pub fn concrete(self) -> &'static [CacheType] {
        match self {
            CacheType::Http => &[CacheType::Http],
            CacheType::Wheel => &[CacheType::Wheel],
            CacheType::All => &[CacheType::Http, CacheType::Wheel],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheType::Http => "http",
            CacheType::Wheel => "wheel",
            CacheType::All => "all",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(CacheType::Http),
            "wheel" => Ok(CacheType::Wheel),
            "all" => Ok(CacheType::All),
            other => Err(CoreError::usage(format!(
                "invalid cache type {:?} (choose from {})",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

pub fn cache_location(root: &Path, cache_type: CacheType) -> PathBuf {
    match cache_type {
        CacheType::Http => root.join(HTTP_SUBDIR),
        CacheType::Wheel => root.join(WHEEL_SUBDIR),
        CacheType::All => root.to_path_buf(),
    }
}
