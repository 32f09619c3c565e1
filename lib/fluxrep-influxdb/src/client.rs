/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::Read;
use std::str::FromStr;
use std::time::Duration;

use base64::prelude::*;
use http::uri::PathAndQuery;
use http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use log::{debug, trace};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;

use crate::{BatchSink, ConsistencyLevel, WriteError, WriteRequest, line};

const MAX_ERROR_BODY: u64 = 64 * 1024;

/// Everything but the RFC 3986 unreserved characters.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("invalid address {0}: {1}")]
    InvalidAddress(String, String),
    #[error("unsupported scheme {0}, only http is supported")]
    UnsupportedScheme(String),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("invalid write target: {0}")]
    InvalidTarget(String),
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct BoundTarget {
    database: String,
    retention_policy: String,
    consistency: ConsistencyLevel,
    api_path: PathAndQuery,
}

/// A blocking client of the InfluxDB v1 `/write` API.
pub struct InfluxdbClient {
    http: reqwest::blocking::Client,
    authority: String,
    base_path: String,
    target: Option<BoundTarget>,
}

impl InfluxdbClient {
    /// `timeout` applies to connecting and to the whole exchange of one write.
    pub fn new(
        address: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, ClientConfigError> {
        let uri = Uri::from_str(address)
            .map_err(|e| ClientConfigError::InvalidAddress(address.to_string(), e.to_string()))?;
        match uri.scheme_str() {
            Some("http") | None => {}
            Some(s) => return Err(ClientConfigError::UnsupportedScheme(s.to_string())),
        }
        let Some(host) = uri.host() else {
            return Err(ClientConfigError::InvalidAddress(
                address.to_string(),
                "no host found".to_string(),
            ));
        };
        let authority = match uri.port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let base_path = uri.path().trim_end_matches('/').to_string();

        let mut static_headers = HeaderMap::new();
        static_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        static_headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if !username.is_empty() {
            let encoded = BASE64_STANDARD.encode(format!("{username}:{password}"));
            let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
                .map_err(|e| ClientConfigError::InvalidCredentials(e.to_string()))?;
            value.set_sensitive(true);
            static_headers.insert(header::AUTHORIZATION, value);
        }

        let http = reqwest::blocking::Client::builder()
            .default_headers(static_headers)
            .connect_timeout(timeout)
            .timeout(timeout)
            .no_proxy()
            .build()?;

        Ok(InfluxdbClient {
            http,
            authority,
            base_path,
            target: None,
        })
    }

    /// Build the write path of a target once, later writes to it reuse it.
    pub fn with_target(
        mut self,
        database: &str,
        retention_policy: &str,
        consistency: ConsistencyLevel,
    ) -> Result<Self, ClientConfigError> {
        let api_path = self.build_api_path(database, retention_policy, consistency)?;
        self.target = Some(BoundTarget {
            database: database.to_string(),
            retention_policy: retention_policy.to_string(),
            consistency,
            api_path,
        });
        Ok(self)
    }

    /// The `/write` path and query for a target, names percent-encoded.
    pub fn build_api_path(
        &self,
        database: &str,
        retention_policy: &str,
        consistency: ConsistencyLevel,
    ) -> Result<PathAndQuery, ClientConfigError> {
        if database.is_empty() {
            return Err(ClientConfigError::InvalidTarget(
                "empty database name".to_string(),
            ));
        }

        let mut path = format!(
            "{}/write?db={}",
            self.base_path,
            utf8_percent_encode(database, QUERY_VALUE)
        );
        if !retention_policy.is_empty() {
            path.push_str("&rp=");
            path.extend(utf8_percent_encode(retention_policy, QUERY_VALUE));
        }
        path.push_str("&precision=ms&consistency=");
        path.push_str(consistency.as_str());

        PathAndQuery::from_str(&path)
            .map_err(|e| ClientConfigError::InvalidTarget(format!("invalid api path {path}: {e}")))
    }

    fn api_path(&self, req: &WriteRequest) -> Result<PathAndQuery, WriteError> {
        if let Some(bound) = &self.target
            && bound.database == req.database
            && bound.retention_policy == req.retention_policy
            && bound.consistency == req.consistency
        {
            return Ok(bound.api_path.clone());
        }
        self.build_api_path(&req.database, &req.retention_policy, req.consistency)
            .map_err(|e| WriteError::InvalidRequest(e.to_string()))
    }

    fn check_response(response: reqwest::blocking::Response) -> Result<(), WriteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = Vec::new();
        if status != StatusCode::NO_CONTENT {
            response.take(MAX_ERROR_BODY).read_to_end(&mut body)?;
        }
        Err(WriteError::Response {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).trim().to_string(),
        })
    }
}

impl BatchSink for InfluxdbClient {
    fn write(&self, request: WriteRequest) -> Result<(), WriteError> {
        let mut body = Vec::new();
        let lines = line::encode_points(&mut body, &request.points);
        if lines == 0 {
            debug!("no line to write to database {}", request.database);
            return Ok(());
        }

        let api_path = self.api_path(&request)?;
        let url = format!("http://{}{api_path}", self.authority);
        let response = self
            .http
            .post(&url)
            .body(body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    WriteError::Connect {
                        peer: self.authority.clone(),
                        source: e,
                    }
                } else {
                    WriteError::Http(e)
                }
            })?;
        trace!("sent {lines} lines to {url}");

        InfluxdbClient::check_response(response)
    }
}
