use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::CollectError;

pub const DEFAULT_SECTION: &str = "default";

/// Credentials and endpoint of one vCD tenant.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TargetConfig {
    #[serde(skip)]
    pub section: String,
    #[serde(rename = "vcd_user")]
    pub user: String,
    #[serde(rename = "vcd_org")]
    pub org: String,
    #[serde(rename = "vcd_password")]
    pub password: String,
    #[serde(rename = "vcd_host")]
    pub host: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub ignore_ssl: bool,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("section", &self.section)
            .field("user", &self.user)
            .field("org", &self.org)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("ignore_ssl", &self.ignore_ssl)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("section '{section}': {source}")]
    Section {
        section: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("top level of the config file must be a mapping of sections")]
    NotAMapping,
}

/// Read-only set of configured targets, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TargetStore {
    targets: Vec<TargetConfig>,
}

impl TargetStore {
    pub fn new(targets: Vec<TargetConfig>) -> Self {
        Self { targets }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let txt = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&txt)
    }

    /// Parses `section: {vcd_user, vcd_org, vcd_password, vcd_host, ignore_ssl}`.
    pub fn from_yaml_str(txt: &str) -> Result<Self, ConfigError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc: serde_yaml::Value = serde_yaml::from_str(txt)?;
        let serde_yaml::Value::Mapping(sections) = doc else {
            return Err(ConfigError::NotAMapping);
        };

        let mut targets = Vec::with_capacity(sections.len());
        for (key, value) in sections {
            let section = match key {
                serde_yaml::Value::String(s) => s,
                other => serde_yaml::to_string(&other)?.trim().to_string(),
            };
            let mut target: TargetConfig = serde_yaml::from_value(value)
                .map_err(|source| ConfigError::Section {
                    section: section.clone(),
                    source,
                })?;
            target.section = section;
            targets.push(target);
        }
        Ok(Self { targets })
    }

    pub fn from_env() -> Self {
        Self::from_env_vars(std::env::vars())
    }

    /// Derives sections from `VCD_<SECTION>_{USER,ORG,PASSWORD,HOST,IGNORE_SSL}`.
    /// The unprefixed `VCD_*` set is the `default` section.
    pub fn from_env_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let mut targets = Vec::new();

        if let Some(target) = target_from_env(&vars, "VCD", DEFAULT_SECTION) {
            targets.push(target);
        }

        let mut sections: Vec<&str> = vars
            .keys()
            .filter(|key| key.as_str() != "VCD_USER" && key.as_str() != "VCD_HOST")
            .filter_map(|key| key.strip_prefix("VCD_")?.strip_suffix("_USER"))
            .filter(|section| !section.is_empty())
            .collect();
        sections.sort_unstable();

        for section in sections {
            let name = section.to_lowercase();
            if targets.iter().any(|t| t.section == name) {
                warn!(section = %name, "duplicate section in environment, keeping the first");
                continue;
            }
            if let Some(target) = target_from_env(&vars, &format!("VCD_{section}"), &name) {
                targets.push(target);
            }
        }
        Self { targets }
    }

    /// Looks up the requested section, `default` when none is given.
    ///
    /// Without an explicit `default` section, `default` resolves to the first
    /// declared one.
    pub fn resolve(&self, requested: Option<&str>) -> Result<&TargetConfig, CollectError> {
        let name = requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SECTION);

        if let Some(target) = self.targets.iter().find(|t| t.section == name) {
            return Ok(target);
        }
        if name == DEFAULT_SECTION {
            if let Some(first) = self.targets.first() {
                debug!(section = %first.section, "no default section, using first declared");
                return Ok(first);
            }
        }
        Err(CollectError::UnresolvedTarget(name.to_string()))
    }

    pub fn sections(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.section.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

fn target_from_env(vars: &HashMap<String, String>, prefix: &str, section: &str) -> Option<TargetConfig> {
    let get = |suffix: &str| vars.get(&format!("{prefix}_{suffix}")).cloned();

    let user = get("USER")?;
    let (Some(org), Some(password), Some(host)) = (get("ORG"), get("PASSWORD"), get("HOST")) else {
        warn!(section, "incomplete environment section, need {prefix}_ORG, {prefix}_PASSWORD and {prefix}_HOST");
        return None;
    };
    Some(TargetConfig {
        section: section.to_string(),
        user,
        org,
        password,
        host,
        ignore_ssl: get("IGNORE_SSL").as_deref().map(parse_flag).unwrap_or(false),
    })
}

/// Case-insensitive `true`, `1`, `yes`, `on`. Anything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => false,
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i == 1,
        Some(Flag::Text(s)) => parse_flag(&s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const YAML: &str = r#"
default:
  vcd_user: admin
  vcd_org: System
  vcd_password: secret
  vcd_host: vcd.example.com
prod:
  vcd_user: ops
  vcd_org: Prod
  vcd_password: hunter2
  vcd_host: vcd-prod.example.com
  ignore_ssl: true
lab:
  vcd_user: lab
  vcd_org: Lab
  vcd_password: lab
  vcd_host: https://10.0.0.5
  ignore_ssl: "Yes"
"#;

    #[test]
    fn test_yaml_sections_resolve() {
        let store = TargetStore::from_yaml_str(YAML).unwrap();
        assert_eq!(store.sections(), vec!["default", "prod", "lab"]);

        let prod = store.resolve(Some("prod")).unwrap();
        assert_eq!(prod.section, "prod");
        assert_eq!(prod.user, "ops");
        assert_eq!(prod.host, "vcd-prod.example.com");
        assert!(prod.ignore_ssl);

        assert!(store.resolve(Some("lab")).unwrap().ignore_ssl);
        assert!(!store.resolve(None).unwrap().ignore_ssl);
        assert_eq!(store.resolve(None).unwrap().user, "admin");
    }

    #[test]
    fn test_unknown_section_is_unresolved() {
        let store = TargetStore::from_yaml_str(YAML).unwrap();
        assert_eq!(
            store.resolve(Some("staging")).unwrap_err(),
            CollectError::UnresolvedTarget("staging".into())
        );
        // exact match only
        assert!(store.resolve(Some("PROD")).is_err());
    }

    #[test]
    fn test_default_falls_back_to_first_section() {
        let store = TargetStore::from_yaml_str(
            "east:\n  vcd_user: a\n  vcd_org: b\n  vcd_password: c\n  vcd_host: d\n",
        )
        .unwrap();
        assert_eq!(store.resolve(None).unwrap().section, "east");
        assert_eq!(store.resolve(Some("")).unwrap().section, "east");

        let empty = TargetStore::default();
        assert_eq!(
            empty.resolve(None).unwrap_err(),
            CollectError::UnresolvedTarget("default".into())
        );
    }

    #[test]
    fn test_yaml_missing_field_names_section() {
        let err = TargetStore::from_yaml_str("broken:\n  vcd_user: a\n").unwrap_err();
        assert!(err.to_string().starts_with("section 'broken'"));

        let err = TargetStore::from_yaml_str("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping));
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();
        let store = TargetStore::from_file(file.path()).await.unwrap();
        assert_eq!(store.len(), 3);

        let err = TargetStore::from_file("/nonexistent/vcd.yaml").await.unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_prefixed_section() {
        let store = TargetStore::from_env_vars(env(&[
            ("VCD_PROD_USER", "a"),
            ("VCD_PROD_ORG", "b"),
            ("VCD_PROD_PASSWORD", "c"),
            ("VCD_PROD_HOST", "d"),
            ("PATH", "/usr/bin"),
        ]));
        let prod = store.resolve(Some("prod")).unwrap();
        assert_eq!(
            (prod.user.as_str(), prod.org.as_str(), prod.password.as_str(), prod.host.as_str()),
            ("a", "b", "c", "d")
        );
        assert!(!prod.ignore_ssl);
    }

    #[test]
    fn test_env_default_and_multi_word_sections() {
        let store = TargetStore::from_env_vars(env(&[
            ("VCD_USER", "root"),
            ("VCD_ORG", "System"),
            ("VCD_PASSWORD", "pw"),
            ("VCD_HOST", "vcd.local"),
            ("VCD_IGNORE_SSL", "TRUE"),
            ("VCD_EU_WEST_USER", "eu"),
            ("VCD_EU_WEST_ORG", "Europe"),
            ("VCD_EU_WEST_PASSWORD", "pw2"),
            ("VCD_EU_WEST_HOST", "vcd-eu.local"),
            ("VCD_EU_WEST_IGNORE_SSL", "0"),
        ]));
        assert_eq!(store.sections(), vec!["default", "eu_west"]);

        let default = store.resolve(None).unwrap();
        assert_eq!(default.host, "vcd.local");
        assert!(default.ignore_ssl);

        let eu = store.resolve(Some("eu_west")).unwrap();
        assert_eq!(eu.org, "Europe");
        assert!(!eu.ignore_ssl);
    }

    #[test]
    fn test_env_incomplete_section_is_skipped() {
        let store = TargetStore::from_env_vars(env(&[
            ("VCD_LAB_USER", "a"),
            ("VCD_LAB_ORG", "b"),
        ]));
        assert!(store.is_empty());
    }

    #[test]
    fn test_parse_flag() {
        for truthy in ["true", "TRUE", "True", "1", "yes", " on "] {
            assert!(parse_flag(truthy), "{truthy}");
        }
        for falsy in ["false", "0", "", "no", "off", "2", "enabled"] {
            assert!(!parse_flag(falsy), "{falsy}");
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let store = TargetStore::from_yaml_str(YAML).unwrap();
        let printed = format!("{:?}", store.resolve(Some("prod")).unwrap());
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
