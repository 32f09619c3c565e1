/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, YamlLoader, yaml};

mod value;

mod reporter;
pub use reporter::ReporterConfig;

pub fn load(config_file: &Path) -> anyhow::Result<ReporterConfig> {
    let content = fs::read_to_string(config_file)
        .map_err(|e| anyhow!("failed to read config file {}: {e}", config_file.display()))?;
    load_str(&content).context(format!(
        "failed to load config file {}",
        config_file.display()
    ))
}

pub fn load_str(content: &str) -> anyhow::Result<ReporterConfig> {
    let docs = YamlLoader::load_from_str(content)
        .map_err(|e| anyhow!("invalid yaml content: {e}"))?;

    let mut config = None;
    // allow multiple docs, and treat them as the same
    for (i, doc) in docs.iter().enumerate() {
        match doc {
            Yaml::Hash(map) => {
                load_doc(map, &mut config).context(format!("failed to load yaml doc #{i}"))?
            }
            _ => return Err(anyhow!("yaml doc root should be hash")),
        }
    }
    config.ok_or_else(|| anyhow!("no reporter config found"))
}

fn load_doc(map: &yaml::Hash, config: &mut Option<ReporterConfig>) -> anyhow::Result<()> {
    value::foreach_kv(map, |k, v| match value::normalize(k).as_str() {
        "reporter" => {
            let Yaml::Hash(map) = v else {
                return Err(anyhow!("yaml value type for key {k} should be 'map'"));
            };
            *config = Some(ReporterConfig::parse(map)?);
            Ok(())
        }
        _ => Err(anyhow!("invalid key {k} in main conf")),
    })
}

#[cfg(unix)]
pub(crate) fn local_hostname() -> String {
    rustix::system::uname()
        .nodename()
        .to_string_lossy()
        .into_owned()
}

#[cfg(not(unix))]
pub(crate) fn local_hostname() -> String {
    "localhost".to_string()
}
