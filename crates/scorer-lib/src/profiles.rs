//! Profiled resource footprints of known applications
//!
//! When a workload is placed the cache is nudged by the workload's profile
//! instead of waiting for the next telemetry read.

use crate::error::{ScorerError, ScorerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Measured footprint of an application running alone on one core
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppProfile {
    pub ipc: f64,
    pub mem_read: f64,
    pub mem_write: f64,
    /// Idle residency observed while the application runs, in percent
    pub c6res: f64,
    pub duration_secs: u64,
}

impl AppProfile {
    const fn new(ipc: f64, mem_read: f64, mem_write: f64, c6res: f64, duration_secs: u64) -> Self {
        Self {
            ipc,
            mem_read,
            mem_write,
            c6res,
            duration_secs,
        }
    }
}

const BUILTIN_PROFILES: &[(&str, AppProfile)] = &[
    ("scikit-lasso", AppProfile::new(1.87, 0.1753, 0.008856, 0.003058, 69)),
    ("scikit-ada", AppProfile::new(1.10, 0.09868, 0.00669, 0.0, 138)),
    ("scikit-rfr", AppProfile::new(1.25, 0.0228, 0.00503, 0.0, 115)),
    ("scikit-rfc", AppProfile::new(1.802, 0.02423, 0.010603, 0.0, 38)),
    ("scikit-linregr", AppProfile::new(1.9464, 0.040475, 0.01974, 0.00928149, 45)),
    ("scikit-lda", AppProfile::new(1.9162, 0.0541, 0.029381, 0.003805, 53)),
    ("cloudsuite-data-serving-client", AppProfile::new(0.6619, 0.0, 0.0, 44.48, 72)),
    ("cloudsuite-in-memory-analytics", AppProfile::new(1.3399, 0.0052142, 0.61361, 3.76196, 60)),
    ("cloudsuite-web-serving-client", AppProfile::new(0.6619, 0.0, 0.0, 44.48, 203)),
    ("spec-sphinx", AppProfile::new(2.035, 0.0042372, 0.0021131, 0.07497, 592)),
    ("spec-cactus", AppProfile::new(1.353, 0.07105, 0.0273161, 0.0532267, 780)),
    ("spec-astar", AppProfile::new(0.86314, 0.0063, 0.0032874, 0.09115, 468)),
    ("spec-leslie", AppProfile::new(1.5225, 0.3221, 0.1532, 0.1215, 378)),
];

#[derive(Debug, Default, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: BTreeMap<String, AppProfile>,
}

/// Name to profile lookup table
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileCatalog {
    profiles: BTreeMap<String, AppProfile>,
}

impl ProfileCatalog {
    /// Catalog holding the benchmark profiles shipped with the scorer
    pub fn builtin() -> Self {
        Self {
            profiles: BUILTIN_PROFILES
                .iter()
                .map(|(name, profile)| (name.to_string(), *profile))
                .collect(),
        }
    }

    /// Built-in catalog extended or overridden by a profile file
    pub fn with_overrides(path: impl AsRef<Path>) -> ScorerResult<Self> {
        let path = path.as_ref();
        let file: ProfileFile = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| {
                ScorerError::ConfigUnreadable(format!("{}: {}", path.display(), e))
            })?;

        let mut catalog = Self::builtin();
        catalog.profiles.extend(file.profiles);
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&AppProfile> {
        self.profiles.get(name)
    }

    pub fn require(&self, name: &str) -> ScorerResult<&AppProfile> {
        self.get(name)
            .ok_or_else(|| ScorerError::UnknownProfile(name.to_string()))
    }

    pub fn insert(&mut self, name: impl Into<String>, profile: AppProfile) {
        self.profiles.insert(name.into(), profile);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AppProfile)> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_catalog() {
        let catalog = ProfileCatalog::builtin();
        assert_eq!(catalog.len(), 13);

        let lasso = catalog.get("scikit-lasso").unwrap();
        assert_eq!(lasso.ipc, 1.87);
        assert_eq!(lasso.duration_secs, 69);

        let leslie = catalog.require("spec-leslie").unwrap();
        assert_eq!(leslie.mem_read, 0.3221);
    }

    #[test]
    fn test_unknown_profile() {
        let catalog = ProfileCatalog::builtin();
        assert!(matches!(
            catalog.require("redis"),
            Err(ScorerError::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_overrides_extend_builtin() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
profiles:
  redis:
    ipc: 0.9
    mem_read: 0.4
    mem_write: 0.3
    c6res: 12.5
    duration_secs: 300
  spec-leslie:
    ipc: 1.6
    mem_read: 0.3
    mem_write: 0.2
    c6res: 0.1
    duration_secs: 400
"#
        )
        .unwrap();

        let catalog = ProfileCatalog::with_overrides(file.path()).unwrap();
        assert_eq!(catalog.len(), 14);
        assert_eq!(catalog.get("redis").unwrap().c6res, 12.5);
        assert_eq!(catalog.get("spec-leslie").unwrap().duration_secs, 400);
    }
}
