// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use wlan_common::mac::{parse_mac, MacAddr};

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Station configuration: the network to scan for and join. Read once at
/// startup and replaced at runtime through the control API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "SSID")]
    pub ssid: String,
    #[serde(rename = "BSSID", default, skip_serializing_if = "Option::is_none")]
    pub bssid: Option<String>,
    #[serde(rename = "Password", default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Seconds between periodic scans while unassociated.
    #[serde(rename = "ScanInterval", default, skip_serializing_if = "Option::is_none")]
    pub scan_interval: Option<u32>,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.ssid.is_empty() {
            return Err("SSID must not be empty".to_string());
        }
        if self.ssid.len() > 32 {
            return Err(format!("SSID exceeds 32 bytes: {}", self.ssid.len()));
        }
        if let Some(bssid) = &self.bssid {
            parse_mac(bssid)?;
        }
        if let Some(password) = &self.password {
            if password.len() < 8 || password.len() > 63 {
                return Err("password must be between 8 and 63 characters".to_string());
            }
        }
        Ok(())
    }

    /// BSSID to restrict scan matches to, if one is configured.
    pub fn bssid_filter(&self) -> Option<MacAddr> {
        self.bssid.as_ref().and_then(|s| parse_mac(s).ok())
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs.into()))
            .unwrap_or(DEFAULT_SCAN_INTERVAL)
    }
}

/// Configuration for the optional AP-start mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApConfig {
    #[serde(rename = "SSID")]
    pub ssid: String,
    #[serde(rename = "BeaconPeriod")]
    pub beacon_period: u32,
    #[serde(rename = "DTIMPeriod")]
    pub dtim_period: u32,
}

/// Loads the station config. A missing file is not an error; the client
/// starts idle and waits for a connect command.
pub fn load_station_config(path: &Path) -> Result<Option<Config>, anyhow::Error> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read station config {}", path.display()))?;
    let cfg: Config = serde_json::from_slice(&data)
        .with_context(|| format!("failed to parse station config {}", path.display()))?;
    cfg.validate()
        .map_err(|e| anyhow::format_err!("invalid station config {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

pub fn load_ap_config(path: &Path) -> Result<ApConfig, anyhow::Error> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read AP config {}", path.display()))?;
    serde_json::from_slice(&data)
        .with_context(|| format!("failed to parse AP config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_station_config() {
        let cfg: Config = serde_json::from_str(
            r#"{"SSID": "home", "BSSID": "b0:70:35:8b:4a:01", "Password": "abcdefgh", "ScanInterval": 10}"#,
        )
        .expect("failed to parse config");
        assert_eq!(cfg.ssid, "home");
        assert_eq!(cfg.bssid_filter(), Some([0xB0, 0x70, 0x35, 0x8B, 0x4A, 0x01]));
        assert_eq!(cfg.password.as_deref(), Some("abcdefgh"));
        assert_eq!(cfg.scan_interval(), Duration::from_secs(10));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_optional_fields_absent() {
        let cfg: Config =
            serde_json::from_str(r#"{"SSID": "open"}"#).expect("failed to parse config");
        assert_eq!(cfg.bssid, None);
        assert_eq!(cfg.password, None);
        assert_eq!(cfg.scan_interval(), DEFAULT_SCAN_INTERVAL);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_scan_interval_uses_default() {
        let cfg = Config {
            ssid: "net".to_string(),
            bssid: None,
            password: None,
            scan_interval: Some(0),
        };
        assert_eq!(cfg.scan_interval(), DEFAULT_SCAN_INTERVAL);
    }

    #[test]
    fn test_validation() {
        let valid = Config {
            ssid: "net".to_string(),
            bssid: None,
            password: None,
            scan_interval: None,
        };
        assert!(valid.validate().is_ok());

        let mut cfg = valid.clone();
        cfg.ssid = String::new();
        assert!(cfg.validate().is_err());

        let mut cfg = valid.clone();
        cfg.ssid = "x".repeat(33);
        assert!(cfg.validate().is_err());

        let mut cfg = valid.clone();
        cfg.bssid = Some("not-a-mac".to_string());
        assert!(cfg.validate().is_err());

        let mut cfg = valid;
        cfg.password = Some("short".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_parse_ap_config() {
        let cfg: ApConfig = serde_json::from_str(
            r#"{"SSID": "testap", "BeaconPeriod": 100, "DTIMPeriod": 2}"#,
        )
        .expect("failed to parse AP config");
        assert_eq!(cfg.ssid, "testap");
        assert_eq!(cfg.beacon_period, 100);
        assert_eq!(cfg.dtim_period, 2);
    }
}
