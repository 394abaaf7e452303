//! Process configuration from `FLEETLINK_*` environment variables, and the
//! per-tenant settings resolved from it once at start.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::limits::MAX_TENANT_NAME_LEN;

pub const DEFAULT_TENANT: &str = "demo";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;
/// Indigo-600.
pub const DEFAULT_PRIMARY_COLOR: ThemeColor = ThemeColor { r: 0x4f, g: 0x46, b: 0xe5 };

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { var: &'static str, value: String },
    InvalidColor(String),
    InvalidTenant(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var}: expected a number, got `{value}`")
            }
            ConfigError::InvalidColor(value) => {
                write!(f, "expected a #rgb or #rrggbb color, got `{value}`")
            }
            ConfigError::InvalidTenant(value) => write!(f, "invalid tenant name `{value}`"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends since the last compaction that trigger the next one.
    pub compact_threshold: u64,
    pub tenant: Option<String>,
    /// Host name the storefront is served from; its subdomain names a tenant.
    pub host: Option<String>,
    pub primary_color: Option<String>,
    pub domain: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| get(var).filter(|v| !v.trim().is_empty());

        let metrics_port = match get("FLEETLINK_METRICS_PORT") {
            Some(v) => Some(parse_number("FLEETLINK_METRICS_PORT", &v)?),
            None => None,
        };
        let compact_threshold = match get("FLEETLINK_COMPACT_THRESHOLD") {
            Some(v) => parse_number("FLEETLINK_COMPACT_THRESHOLD", &v)?,
            None => DEFAULT_COMPACT_THRESHOLD,
        };

        Ok(Self {
            data_dir: get("FLEETLINK_DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            metrics_port,
            compact_threshold,
            tenant: get("FLEETLINK_TENANT"),
            host: get("FLEETLINK_HOST"),
            primary_color: get("FLEETLINK_PRIMARY_COLOR"),
            domain: get("FLEETLINK_DOMAIN"),
        })
    }

    /// Settings for the tenant this process serves. `explicit` (the
    /// `--tenant` flag) wins over `FLEETLINK_TENANT`.
    pub fn tenant_config(&self, explicit: Option<&str>) -> Result<TenantConfig, ConfigError> {
        let explicit = explicit.or(self.tenant.as_deref());
        let tenant_id = resolve_tenant_id(explicit, self.host.as_deref());
        if tenant_id.len() > MAX_TENANT_NAME_LEN {
            return Err(ConfigError::InvalidTenant(tenant_id));
        }
        let primary_color = match &self.primary_color {
            Some(hex) => hex.parse()?,
            None => DEFAULT_PRIMARY_COLOR,
        };
        Ok(TenantConfig {
            tenant_id,
            primary_color,
            domain: self.domain.clone(),
        })
    }
}

fn parse_number<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}

/// Explicit name, else the host's subdomain, else [`DEFAULT_TENANT`].
///
/// A subdomain counts only when the host has more than two labels and the
/// first one is not `www` or `localhost`: `red.fleetlink.com` is `red`,
/// `fleetlink.com` and `www.fleetlink.com` fall through.
pub fn resolve_tenant_id(explicit: Option<&str>, host: Option<&str>) -> String {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    host.and_then(subdomain)
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_TENANT.to_string())
}

fn subdomain(host: &str) -> Option<&str> {
    // Port is not part of the name
    let host = host.split(':').next().unwrap_or(host);
    let labels: Vec<&str> = host.split('.').collect();
    match labels.first() {
        Some(first) if labels.len() > 2 && !matches!(*first, "www" | "localhost" | "") => {
            Some(first)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub primary_color: ThemeColor,
    pub domain: Option<String>,
}

// ── Theme color ──────────────────────────────────────────────────

/// An sRGB brand color, written `#rgb` or `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FromStr for ThemeColor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let double = |i: usize| channel(&hex[i..=i].repeat(2));
                Ok(Self {
                    r: double(0)?,
                    g: double(1)?,
                    b: double(2)?,
                })
            }
            6 => Ok(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            _ => Err(invalid()),
        }
    }
}

impl ThemeColor {
    /// Hue in whole degrees, saturation and lightness in percent to one decimal.
    pub fn hsl(&self) -> (i64, f64, f64) {
        let [r, g, b] = [self.r, self.g, self.b].map(|c| f64::from(c) / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            ((g - b) / delta) % 6.0
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        let mut hue = (hue * 60.0).round() as i64;
        if hue < 0 {
            hue += 360;
        }

        let lightness = (max + min) / 2.0;
        let saturation = if delta == 0.0 {
            0.0
        } else {
            delta / (1.0 - (2.0 * lightness - 1.0).abs())
        };
        (hue, round1(saturation * 100.0), round1(lightness * 100.0))
    }

    /// `"H S% L%"`, the form the storefront stylesheet variables take.
    pub fn hsl_css(&self) -> String {
        let (h, s, l) = self.hsl();
        format!("{h} {s}% {l}%")
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

impl fmt::Display for ThemeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
        assert_eq!(cfg.metrics_port, None);
        assert_eq!(cfg.compact_threshold, 1000);

        let tenant = cfg.tenant_config(None).unwrap();
        assert_eq!(tenant.tenant_id, "demo");
        assert_eq!(tenant.primary_color, DEFAULT_PRIMARY_COLOR);
    }

    #[test]
    fn reads_numbers_and_rejects_garbage() {
        let cfg = config(&[
            ("FLEETLINK_METRICS_PORT", "9090"),
            ("FLEETLINK_COMPACT_THRESHOLD", " 250 "),
            ("FLEETLINK_DATA_DIR", "/var/lib/fleetlink"),
        ])
        .unwrap();
        assert_eq!(cfg.metrics_port, Some(9090));
        assert_eq!(cfg.compact_threshold, 250);
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/fleetlink"));

        assert!(matches!(
            config(&[("FLEETLINK_METRICS_PORT", "http")]),
            Err(ConfigError::InvalidNumber { var: "FLEETLINK_METRICS_PORT", .. })
        ));
        assert!(config(&[("FLEETLINK_METRICS_PORT", "70000")]).is_err());
    }

    #[test]
    fn tenant_precedence() {
        assert_eq!(resolve_tenant_id(Some("red"), Some("green.fleetlink.com")), "red");
        assert_eq!(resolve_tenant_id(None, Some("green.fleetlink.com")), "green");
        assert_eq!(resolve_tenant_id(Some("  "), Some("green.fleetlink.com")), "green");
        assert_eq!(resolve_tenant_id(None, None), "demo");

        let cfg = config(&[
            ("FLEETLINK_TENANT", "red"),
            ("FLEETLINK_HOST", "green.fleetlink.com"),
        ])
        .unwrap();
        assert_eq!(cfg.tenant_config(None).unwrap().tenant_id, "red");
        assert_eq!(cfg.tenant_config(Some("blue")).unwrap().tenant_id, "blue");
    }

    #[test]
    fn subdomain_rules() {
        for (host, expected) in [
            ("red.fleetlink.com", "red"),
            ("red.fleetlink.com:8080", "red"),
            ("Red.FleetLink.com", "red"),
            ("fleetlink.com", "demo"),
            ("www.fleetlink.com", "demo"),
            ("localhost", "demo"),
            ("localhost.localdomain.test", "demo"),
        ] {
            assert_eq!(resolve_tenant_id(None, Some(host)), expected, "{host}");
        }
    }

    #[test]
    fn overlong_tenant_rejected() {
        let cfg = config(&[]).unwrap();
        let name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        assert!(matches!(
            cfg.tenant_config(Some(&name)),
            Err(ConfigError::InvalidTenant(_))
        ));
    }

    #[test]
    fn parses_short_and_long_hex() {
        let short: ThemeColor = "#f00".parse().unwrap();
        assert_eq!(short, ThemeColor { r: 255, g: 0, b: 0 });
        let long: ThemeColor = "#DC2626".parse().unwrap();
        assert_eq!(long, ThemeColor { r: 0xdc, g: 0x26, b: 0x26 });
        assert_eq!(long.to_string(), "#dc2626");

        for bad in ["f00", "#ff00", "#ggg", "#12345", "", "#"] {
            assert!(bad.parse::<ThemeColor>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn hsl_triples() {
        assert_eq!("#f00".parse::<ThemeColor>().unwrap().hsl_css(), "0 100% 50%");
        assert_eq!("#000000".parse::<ThemeColor>().unwrap().hsl_css(), "0 0% 0%");
        assert_eq!("#ffffff".parse::<ThemeColor>().unwrap().hsl_css(), "0 0% 100%");
        assert_eq!("#0000ff".parse::<ThemeColor>().unwrap().hsl_css(), "240 100% 50%");
        // Indigo-600
        assert_eq!(DEFAULT_PRIMARY_COLOR.hsl_css(), "243 75.4% 58.6%");
    }

    #[test]
    fn configured_color_flows_into_tenant() {
        let cfg = config(&[("FLEETLINK_PRIMARY_COLOR", "#059669")]).unwrap();
        let tenant = cfg.tenant_config(None).unwrap();
        assert_eq!(tenant.primary_color.to_string(), "#059669");

        let cfg = config(&[("FLEETLINK_PRIMARY_COLOR", "green")]).unwrap();
        assert!(matches!(cfg.tenant_config(None), Err(ConfigError::InvalidColor(_))));
    }
}
