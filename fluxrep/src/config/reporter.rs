/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, yaml};

use fluxrep_influxdb::{ConsistencyLevel, InfluxdbClient, TagSet};
use fluxrep_registry::MetricRegistry;

use super::value as yaml_value;
use crate::batch::WriteTarget;
use crate::dimension::{DIMENSION_FLAG_PREFIX, DimensionSet};
use crate::error::ConfigError;
use crate::reporter::{Reporter, ReporterBuilder};
use crate::tags;

const DEFAULT_ADDRESS: &str = "http://localhost:8086";
const DEFAULT_USERNAME: &str = "root";
const DEFAULT_PASSWORD: &str = "root";
const DEFAULT_DATABASE: &str = "kafka";
const DEFAULT_RETENTION_POLICY: &str = "autogen";
const DEFAULT_EMIT_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ReporterConfig {
    enabled: bool,
    address: String,
    username: String,
    password: String,
    database: String,
    retention_policy: String,
    consistency: ConsistencyLevel,
    tags: String,
    base_tags: TagSet,
    dimension_flags: Vec<(String, String)>,
    dimensions: DimensionSet,
    emit_interval: Duration,
    resource_metrics: bool,
    write_timeout: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        ReporterConfig {
            enabled: false,
            address: DEFAULT_ADDRESS.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            retention_policy: DEFAULT_RETENTION_POLICY.to_string(),
            consistency: ConsistencyLevel::default(),
            tags: format!("hostname:{}", super::local_hostname()),
            base_tags: TagSet::new(),
            dimension_flags: Vec::new(),
            dimensions: DimensionSet::all(),
            emit_interval: DEFAULT_EMIT_INTERVAL,
            resource_metrics: true,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl ReporterConfig {
    pub(crate) fn parse(map: &yaml::Hash) -> anyhow::Result<Self> {
        let mut config = ReporterConfig::default();
        yaml_value::foreach_kv(map, |k, v| config.set(k, v))?;
        config.check()?;
        Ok(config)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match yaml_value::normalize(k).as_str() {
            "enabled" | "enable" => {
                self.enabled = yaml_value::as_bool(v)?;
                Ok(())
            }
            "address" | "url" => {
                self.address = yaml_value::as_string(v)?;
                Ok(())
            }
            "username" => {
                self.username = yaml_value::as_string(v)?;
                Ok(())
            }
            "password" => {
                self.password = yaml_value::as_string(v)?;
                Ok(())
            }
            "database" | "db" => {
                self.database = yaml_value::as_string(v)?;
                Ok(())
            }
            "retention_policy" | "rp" => {
                self.retention_policy = yaml_value::as_string(v)?;
                Ok(())
            }
            "consistency" => {
                let s = yaml_value::as_string(v)?;
                self.consistency = ConsistencyLevel::from_str(&s).map_err(ConfigError::from)?;
                Ok(())
            }
            "tags" => {
                self.tags = match v {
                    Yaml::Null => String::new(),
                    _ => yaml_value::as_string(v)?,
                };
                Ok(())
            }
            "dimension" | "dimension_enabled" => {
                let Yaml::Hash(map) = v else {
                    return Err(anyhow!("yaml value type for key {k} should be 'map'"));
                };
                yaml_value::foreach_kv(map, |facet, flag| {
                    let flag = yaml_value::as_flag_string(flag)?;
                    self.dimension_flags
                        .push((format!("{DIMENSION_FLAG_PREFIX}{facet}"), flag));
                    Ok(())
                })
            }
            "emit_interval" | "polling_interval" | "interval" => {
                self.emit_interval = yaml_value::as_duration(v)?;
                Ok(())
            }
            "resource_metrics" | "jvm_metrics" => {
                self.resource_metrics = yaml_value::as_bool(v)?;
                Ok(())
            }
            "write_timeout" => {
                self.write_timeout = yaml_value::as_duration(v)?;
                Ok(())
            }
            normalized if normalized.starts_with(DIMENSION_FLAG_PREFIX) => {
                let flag = yaml_value::as_flag_string(v)?;
                self.dimension_flags.push((normalized.to_string(), flag));
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&mut self) -> anyhow::Result<()> {
        if self.emit_interval.is_zero() {
            return Err(ConfigError::ZeroInterval.into());
        }
        if self.write_timeout.is_zero() {
            return Err(anyhow!("write timeout should not be zero"));
        }
        if self.database.is_empty() {
            return Err(anyhow!("database name should not be empty"));
        }

        self.base_tags = tags::parse_base_tags(&self.tags)
            .context(format!("invalid base tag string {:?}", self.tags))?;
        self.dimensions = DimensionSet::from_flags(
            DIMENSION_FLAG_PREFIX,
            self.dimension_flags.iter().map(|(k, v)| (k, v)),
        );
        // make sure the address and the write path are valid at load time
        self.build_client()?;
        Ok(())
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn emit_interval(&self) -> Duration {
        self.emit_interval
    }

    #[inline]
    pub fn dimensions(&self) -> DimensionSet {
        self.dimensions
    }

    #[inline]
    pub fn base_tags(&self) -> &TagSet {
        &self.base_tags
    }

    #[inline]
    pub fn resource_metrics(&self) -> bool {
        self.resource_metrics
    }

    pub fn target(&self) -> WriteTarget {
        WriteTarget {
            database: self.database.clone(),
            retention_policy: self.retention_policy.clone(),
            consistency: self.consistency,
        }
    }

    pub fn build_client(&self) -> Result<InfluxdbClient, ConfigError> {
        let client = InfluxdbClient::new(
            &self.address,
            &self.username,
            &self.password,
            self.write_timeout,
        )?
        .with_target(&self.database, &self.retention_policy, self.consistency)?;
        Ok(client)
    }

    /// Prepare a reporter writing the metrics of `registry` to the configured
    /// database, the resource source is left to the caller.
    pub fn reporter_builder(
        &self,
        registry: Arc<dyn MetricRegistry>,
    ) -> Result<ReporterBuilder, ConfigError> {
        let client = self.build_client()?;
        Ok(Reporter::builder(registry, Arc::new(client), self.target())
            .base_tags(self.base_tags.clone())
            .dimensions(self.dimensions))
    }
}
