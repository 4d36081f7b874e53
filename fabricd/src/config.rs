// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{anyhow, bail, Result};
use of_common::net::MacAddr;
use serde::Deserialize;

/// Daemon configuration, one TOML file.
///
/// ```toml
/// listen = "0.0.0.0:6653"
/// data_dir = "/var/run/fabricd"
/// apps = ["l2switch", "router", "firewall"]
///
/// [rest]
/// tls = true
/// port = 7443
/// cert_file = "/etc/fabricd/cert.pem"
/// key_file = "/etc/fabricd/key.pem"
///
/// [router]
/// mac = "00:11:22:33:44:55"
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the OpenFlow listener binds.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Where the administrative database lives.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// App chain, head first.
    #[serde(default = "default_apps")]
    pub apps: Vec<String>,

    pub rest: RestConfig,

    pub router: Option<RouterConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestConfig {
    #[serde(default)]
    pub tls: bool,
    pub port: u16,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// The virtual MAC the router answers on.
    pub mac: MacAddr,
}

fn default_listen() -> String {
    "0.0.0.0:6653".into()
}

fn default_data_dir() -> String {
    "/var/run/fabricd".into()
}

fn default_apps() -> Vec<String> {
    vec!["l2switch".into()]
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("read {path}: {e}"))?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| anyhow!("parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rest.port == 0 {
            bail!("rest.port must be nonzero");
        }
        if self.rest.tls {
            for (name, value) in [
                ("rest.cert_file", &self.rest.cert_file),
                ("rest.key_file", &self.rest.key_file),
            ] {
                match value {
                    None => bail!("{name} is required when rest.tls is set"),
                    Some(p) if !p.starts_with('/') => {
                        bail!("{name} must be an absolute path")
                    }
                    Some(_) => {}
                }
            }
        }
        if self.apps.contains(&"router".to_string()) && self.router.is_none()
        {
            bail!("the router app requires a [router] section");
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            listen = "0.0.0.0:6653"
            data_dir = "/tmp/fabricd"
            apps = ["firewall", "router", "l2switch"]

            [rest]
            tls = false
            port = 7000

            [router]
            mac = "00:11:22:33:44:55"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.apps.len(), 3);
        assert_eq!(
            config.router.unwrap().mac,
            "00:11:22:33:44:55".parse().unwrap()
        );
    }

    #[test]
    fn defaults_apply() {
        let config: Config = toml::from_str("[rest]\nport = 7000\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.listen, "0.0.0.0:6653");
        assert_eq!(config.apps, vec!["l2switch".to_string()]);
    }

    #[test]
    fn tls_requires_absolute_paths() {
        let config: Config = toml::from_str(
            r#"
            [rest]
            tls = true
            port = 7443
            cert_file = "cert.pem"
            key_file = "/etc/fabricd/key.pem"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str(
            r#"
            [rest]
            tls = true
            port = 7443
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn router_app_requires_mac() {
        let config: Config = toml::from_str(
            r#"
            apps = ["router"]
            [rest]
            port = 7000
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
