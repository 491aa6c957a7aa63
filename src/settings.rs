use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that overrides the configured service URL.
pub const API_URL_ENV: &str = "ANNOTATOR_API_URL";

/// User-level settings, persisted as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatorSettings {
    /// Base URL of the annotation services, without a trailing slash.
    pub api_url: String,
    pub initial_zoom: f32,
    /// Opacity of the annotation layer and paint-fill preview, `0.0..=1.0`.
    pub mask_opacity: f32,
    pub request_timeout_secs: u64,
}

impl Default for AnnotatorSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".to_string(),
            initial_zoom: 0.2,
            mask_opacity: 0.7,
            request_timeout_secs: 30,
        }
    }
}

impl AnnotatorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/annotator/annotator_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Annotator\annotator_settings.cfg
    /// On macOS:   ~/Library/Application Support/Annotator/annotator_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        let config_dir = PathBuf::from(
            std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?,
        )
        .join("Annotator");
        #[cfg(target_os = "macos")]
        let config_dir = PathBuf::from(std::env::var("HOME").ok()?)
            .join("Library")
            .join("Application Support")
            .join("Annotator");
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
            .ok()?
            .join("annotator");

        let _ = std::fs::create_dir_all(&config_dir);
        Some(config_dir.join("annotator_settings.cfg"))
    }

    /// Load settings from disk (defaults if the file is missing or corrupt),
    /// then apply the environment override.
    pub fn load() -> Self {
        let mut s = Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|content| Self::from_config_str(&content))
            .unwrap_or_default();
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            s.api_url = url.trim().trim_end_matches('/').to_string();
        }
        s
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("settings: could not write {}: {}", path.display(), e);
        }
    }

    /// Parse `key=value` lines. Unknown keys and bad values keep defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "api_url" => {
                    if !val.is_empty() {
                        s.api_url = val.trim_end_matches('/').to_string();
                    }
                }
                "initial_zoom" => {
                    if let Ok(z) = val.parse::<f32>()
                        && z.is_finite()
                        && z > 0.0
                    {
                        s.initial_zoom = z;
                    }
                }
                "mask_opacity" => {
                    if let Ok(o) = val.parse::<f32>()
                        && o.is_finite()
                    {
                        s.mask_opacity = o.clamp(0.0, 1.0);
                    }
                }
                "request_timeout_secs" => {
                    s.request_timeout_secs = val.parse().unwrap_or(s.request_timeout_secs);
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "api_url={}\n\
             initial_zoom={}\n\
             mask_opacity={}\n\
             request_timeout_secs={}\n",
            self.api_url, self.initial_zoom, self.mask_opacity, self.request_timeout_secs,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
