//
// Copyright (c) 2024 Elide Technologies, Inc.
//
// Licensed under the MIT license (the "License"); you may not use this file except in compliance
// with the License. You may obtain a copy of the License at
//
// https://opensource.org/license/mit/
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on
// an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under the License.
//

//! Configuration loading and served-GUMMEI / PLMN matching (spec.md §4.10, §6).

use mme_types::{Gummei, Plmn};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use thiserror::Error;

/// Fatal at startup per spec.md §7 ("ConfigurationError").
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: toml::de::Error,
  },
  #[error("invalid served PLMN entry: mcc={mcc} mnc={mnc}")]
  InvalidPlmn { mcc: String, mnc: String },
}

#[derive(Debug, Deserialize)]
struct RawConfig {
  mme: RawMme,
}

#[derive(Debug, Deserialize)]
struct RawMme {
  name: Option<String>,
  ipv4: Ipv4Addr,
  #[serde(default = "default_state_dir")]
  state_directory: String,
  #[serde(rename = "servedGUMMEIs")]
  served_gummeis: Vec<RawServedGummei>,
  relative_capacity: u8,
  s6a: RawS6a,
  /// Outbound SDN controller RPC address (spec.md §6, §4.11); unset
  /// disables bearer-change notification entirely rather than failing.
  sdn_controller: Option<SocketAddr>,
}

fn default_state_dir() -> String {
  "/var/lib/aalto".to_string()
}

#[derive(Debug, Deserialize)]
struct RawServedGummei {
  served_plmns: Vec<RawPlmn>,
  served_mme_group_ids: Vec<u16>,
  served_mme_codes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct RawPlmn {
  mcc: String,
  mnc: String,
}

#[derive(Debug, Deserialize)]
struct RawS6a {
  host: String,
  db: String,
  user: String,
  password: String,
}

/// Resolved, validated MME configuration.
#[derive(Debug, Clone)]
pub struct Config {
  pub mme_name: Option<String>,
  pub ipv4: Ipv4Addr,
  pub state_directory: String,
  pub served_gummeis: Vec<Gummei>,
  pub relative_capacity: u8,
  pub s6a: S6aConfig,
  pub sdn_controller: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct S6aConfig {
  pub host: String,
  pub db: String,
  pub user: String,
  pub password: String,
}

impl Config {
  /// Load and validate a TOML config file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path_str = path.as_ref().display().to_string();
    let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
      path: path_str.clone(),
      source: e,
    })?;
    Self::parse(&text, &path_str)
  }

  fn parse(text: &str, path_str: &str) -> Result<Self, ConfigError> {
    let raw: RawConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
      path: path_str.to_string(),
      source: e,
    })?;

    let mut served_gummeis = Vec::new();
    for sg in &raw.mme.served_gummeis {
      let plmns: Result<Vec<Plmn>, ConfigError> = sg
        .served_plmns
        .iter()
        .map(|p| {
          Plmn::from_digits(&p.mcc, &p.mnc).ok_or_else(|| ConfigError::InvalidPlmn {
            mcc: p.mcc.clone(),
            mnc: p.mnc.clone(),
          })
        })
        .collect();
      let plmns = plmns?;
      for plmn in plmns {
        for &group_id in &sg.served_mme_group_ids {
          for &code in &sg.served_mme_codes {
            served_gummeis.push(Gummei {
              plmn,
              mme_group_id: group_id,
              mme_code: code,
            });
          }
        }
      }
    }

    Ok(Config {
      mme_name: raw.mme.name,
      ipv4: raw.mme.ipv4,
      state_directory: raw.mme.state_directory,
      served_gummeis,
      relative_capacity: raw.mme.relative_capacity,
      s6a: S6aConfig {
        host: raw.mme.s6a.host,
        db: raw.mme.s6a.db,
        user: raw.mme.s6a.user,
        password: raw.mme.s6a.password,
      },
      sdn_controller: raw.mme.sdn_controller,
    })
  }

  /// Every PLMN served by any of this MME's served GUMMEIs.
  pub fn served_plmns(&self) -> Vec<Plmn> {
    let mut plmns: Vec<Plmn> = self.served_gummeis.iter().map(|g| g.plmn).collect();
    plmns.dedup();
    plmns
  }

  /// Path to `MME_CONFIG`, or the default, per spec.md §6.
  pub fn resolve_path() -> String {
    std::env::var("MME_CONFIG").unwrap_or_else(|_| "/etc/aalto/mme.toml".to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"
    [mme]
    name = "aalto01"
    ipv4 = "10.0.0.1"
    relative_capacity = 10

    [[mme.servedGUMMEIs]]
    served_mme_group_ids = [1]
    served_mme_codes = [1]
    [[mme.servedGUMMEIs.served_plmns]]
    mcc = "310"
    mnc = "410"

    [mme.s6a]
    host = "hss.example.com"
    db = "hssdb"
    user = "mme"
    password = "secret"
  "#;

  #[test]
  fn parses_sample_config() {
    let cfg = Config::parse(SAMPLE, "test").unwrap();
    assert_eq!(cfg.mme_name.as_deref(), Some("aalto01"));
    assert_eq!(cfg.relative_capacity, 10);
    assert_eq!(cfg.served_gummeis.len(), 1);
    assert_eq!(cfg.state_directory, "/var/lib/aalto");
  }

  #[test]
  fn rejects_bad_plmn() {
    let bad = SAMPLE.replace("mcc = \"310\"", "mcc = \"31\"");
    assert!(Config::parse(&bad, "test").is_err());
  }
}
