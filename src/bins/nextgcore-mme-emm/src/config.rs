//! MME local configuration
//!
//! Loaded from the `mme:` section of a YAML file:
//!
//! ```yaml
//! mme:
//!   plmn_id: { mcc: "001", mnc: "01" }
//!   gummei: { mme_gid: 2, mme_code: 1 }
//!   tai: { tac: 1 }
//!   security:
//!     integrity_order: [EIA2, EIA1, EIA0]
//!     ciphering_order: [EEA0, EEA1, EEA2]
//!   time:
//!     t3412: 3240
//! ```
//!
//! The resolved [`MmeConfig`] is handed to every handler; there is no
//! process-wide instance.

use std::path::Path;

use ogs_crypt::eps::{ciphering_algorithm_supported, integrity_algorithm_supported};
use ogs_nas::types::{EpsTai, PlmnId};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid PLMN ID {mcc}/{mnc}: {source}")]
    InvalidPlmnId {
        mcc: String,
        mnc: String,
        #[source]
        source: ogs_nas::NasError,
    },

    #[error("Unknown security algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("No supported algorithm in {0}")]
    NoSupportedAlgorithm(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    mme: MmeSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MmeSection {
    plmn_id: PlmnIdSection,
    gummei: GummeiSection,
    tai: TaiSection,
    security: SecuritySection,
    time: TimeSection,
}

#[derive(Debug, Deserialize)]
struct PlmnIdSection {
    mcc: String,
    mnc: String,
}

#[derive(Debug, Deserialize)]
struct GummeiSection {
    mme_gid: u16,
    mme_code: u8,
}

#[derive(Debug, Deserialize)]
struct TaiSection {
    tac: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SecuritySection {
    integrity_order: Vec<String>,
    ciphering_order: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSection {
    t3412: u32,
}

impl Default for MmeSection {
    fn default() -> Self {
        Self {
            plmn_id: PlmnIdSection { mcc: "001".into(), mnc: "01".into() },
            gummei: GummeiSection { mme_gid: 2, mme_code: 1 },
            tai: TaiSection { tac: 1 },
            security: SecuritySection::default(),
            time: TimeSection { t3412: 3240 },
        }
    }
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            integrity_order: vec!["EIA2".into(), "EIA1".into(), "EIA0".into()],
            ciphering_order: vec!["EEA0".into(), "EEA1".into(), "EEA2".into()],
        }
    }
}

/// Resolved MME configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmeConfig {
    /// Home PLMN, also the default visited PLMN of an attaching UE
    pub plmn_id: PlmnId,
    pub mme_gid: u16,
    pub mme_code: u8,
    /// Served tracking area code
    pub tac: u16,
    /// First supported entry of `integrity_order`
    pub selected_int_algorithm: u8,
    /// First supported entry of `ciphering_order`
    pub selected_enc_algorithm: u8,
    /// T3412 in seconds
    pub t3412: u32,
}

impl Default for MmeConfig {
    fn default() -> Self {
        // The built-in section always resolves
        Self {
            plmn_id: PlmnId::new([0, 0, 1], [0, 1, 0], 2),
            mme_gid: 2,
            mme_code: 1,
            tac: 1,
            selected_int_algorithm: 2,
            selected_enc_algorithm: 0,
            t3412: 3240,
        }
    }
}

impl MmeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        Self::resolve(file.mme)
    }

    fn resolve(mme: MmeSection) -> ConfigResult<Self> {
        let plmn_id = PlmnId::from_digits(&mme.plmn_id.mcc, &mme.plmn_id.mnc).map_err(|source| {
            ConfigError::InvalidPlmnId {
                mcc: mme.plmn_id.mcc.clone(),
                mnc: mme.plmn_id.mnc.clone(),
                source,
            }
        })?;

        let selected_int_algorithm = select_algorithm(
            &mme.security.integrity_order,
            "EIA",
            "integrity_order",
            integrity_algorithm_supported,
        )?;
        let selected_enc_algorithm = select_algorithm(
            &mme.security.ciphering_order,
            "EEA",
            "ciphering_order",
            ciphering_algorithm_supported,
        )?;

        let config = Self {
            plmn_id,
            mme_gid: mme.gummei.mme_gid,
            mme_code: mme.gummei.mme_code,
            tac: mme.tai.tac,
            selected_int_algorithm,
            selected_enc_algorithm,
            t3412: mme.time.t3412,
        };
        log::info!(
            "MME configuration: PLMN {} MME GID={} code={} TAC={} EIA{} EEA{}",
            config.plmn_id,
            config.mme_gid,
            config.mme_code,
            config.tac,
            config.selected_int_algorithm,
            config.selected_enc_algorithm
        );
        Ok(config)
    }

    /// Served tracking area advertised in Attach Accept
    pub fn served_tai(&self) -> EpsTai {
        EpsTai { plmn_id: self.plmn_id, tac: self.tac }
    }
}

/// Parse `EIA2`, `128-EIA2` or a bare `2`.
fn parse_algorithm(name: &str, family: &str) -> ConfigResult<u8> {
    let upper = name.trim().to_uppercase();
    let digits = upper
        .strip_prefix("128-")
        .unwrap_or(&upper)
        .strip_prefix(family)
        .unwrap_or(&upper);
    match digits.parse::<u8>() {
        Ok(id) if id <= 7 => Ok(id),
        _ => Err(ConfigError::UnknownAlgorithm(name.to_string())),
    }
}

fn select_algorithm(
    order: &[String],
    family: &str,
    field: &'static str,
    supported: fn(u8) -> bool,
) -> ConfigResult<u8> {
    for name in order {
        let id = parse_algorithm(name, family)?;
        if supported(id) {
            return Ok(id);
        }
        log::debug!("Skipping unsupported {}{} in {}", family, id, field);
    }
    Err(ConfigError::NoSupportedAlgorithm(field))
}
