use crate::settings::{SettingKey, SettingsStore};
use crate::utils::style::NdviRamp;
use std::path::PathBuf;
use std::time::Duration;

/// Where the product catalog comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Sample,
    Api(String),
    Payload(String),
}

impl Source {
    /// A stored payload wins when the payload flag is set, then a non-empty
    /// API URL, then the built-in sample.
    pub fn resolve(api: Option<&str>, payload: Option<&str>, use_payload: bool) -> Self {
        if use_payload {
            if let Some(raw) = payload.filter(|p| !p.trim().is_empty()) {
                return Source::Payload(raw.to_string());
            }
        }
        match api.map(str::trim).filter(|a| !a.is_empty()) {
            Some(url) => Source::Api(url.to_string()),
            None => Source::Sample,
        }
    }

    pub fn from_settings(settings: &SettingsStore, use_payload: bool) -> Self {
        let api = settings.get(SettingKey::Api);
        let payload = settings.get(SettingKey::Payload);
        Self::resolve(api.as_deref(), payload.as_deref(), use_payload)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: Source,
    pub token: Option<String>,
    pub settings_path: PathBuf,
    pub static_dir: PathBuf,
    pub observations_path: PathBuf,
    pub recordings_dir: PathBuf,
    pub ndvi_style: Option<PathBuf>,
    pub orbit_duration: Duration,
    pub port: u16,
}

impl Config {
    /// The NDVI ramp, from the style file when one is configured.
    pub fn ndvi_ramp(&self) -> anyhow::Result<NdviRamp> {
        match &self.ndvi_style {
            Some(path) => NdviRamp::from_style_file(path)
                .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e)),
            None => Ok(NdviRamp::default()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: Source::Sample,
            token: None,
            settings_path: PathBuf::from("cogtour-settings.json"),
            static_dir: PathBuf::from("public"),
            observations_path: PathBuf::from("public/data/observations.geojson"),
            recordings_dir: PathBuf::from("recordings"),
            ndvi_style: None,
            orbit_duration: Duration::from_secs(8),
            port: 8000,
        }
    }
}
