use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Tag, Value},
    Figment,
};

/// Flat environment names accepted alongside the `FOLIO_` prefixed ones.
const FLAT_ENV: &[(&str, &str)] = &[
    ("ROBINHOOD_USER", "brokerage.username"),
    ("ROBINHOOD_PASS", "brokerage.password"),
    ("MAIN_ACCOUNT", "accounts.primary"),
    ("IRA_ACCOUNT", "accounts.ira"),
    ("THIRD_ACCOUNT", "accounts.third"),
    ("SPREADSHEET_NAME", "sheets.spreadsheet_name"),
    ("GOOGLE_CREDENTIALS_FILE", "sheets.credentials_file"),
];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by merging `config/Config.toml`, `FOLIO_` prefixed
    /// variables and the flat brokerage/sheet variables.
    ///
    /// Validation is left to [`AppConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads configuration with an explicit TOML path. A missing file is not
    /// an error; environment values still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::figment(path).extract()?;
        Ok(config)
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("FOLIO_").split("__"))
            .merge(Self::flat_env())
    }

    /// Flat variables are taken verbatim so ids such as `007123` keep their
    /// digits. Blank values behave as unset.
    fn flat_env() -> Serialized<Dict> {
        let mut root = Dict::new();
        for &(name, path) in FLAT_ENV {
            let Ok(value) = std::env::var(name) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            let Some((section, key)) = path.split_once('.') else {
                continue;
            };
            let entry = root
                .entry(section.to_string())
                .or_insert_with(|| Value::Dict(Tag::Default, Dict::new()));
            if let Value::Dict(_, dict) = entry {
                dict.insert(key.to_string(), Value::String(Tag::Default, value));
            }
        }
        Serialized::defaults(root)
    }
}
