//! Download manager configuration.

/// Configuration for the offline asset manager.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory name under the app data directory holding payloads.
    /// Namespace subdirectories are created beneath it.
    pub downloads_dir: String,
    /// Base URL of the catalogue metadata endpoint used to enrich
    /// records at download time. Enrichment is skipped when unset.
    pub catalog_endpoint: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            downloads_dir: "downloads".to_string(),
            catalog_endpoint: None,
        }
    }
}

impl DownloadConfig {
    /// Set the downloads directory name.
    pub fn with_downloads_dir(mut self, dir: impl Into<String>) -> Self {
        self.downloads_dir = dir.into();
        self
    }

    /// Set the catalogue metadata endpoint.
    pub fn with_catalog_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.catalog_endpoint = Some(endpoint.into());
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.downloads_dir.trim().is_empty() {
            return Err("downloads_dir must not be empty".to_string());
        }

        if self.downloads_dir.contains('/') || self.downloads_dir.contains('\\') {
            return Err("downloads_dir must be a single path component".to_string());
        }

        if let Some(endpoint) = &self.catalog_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("catalog_endpoint must be an http(s) URL".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DownloadConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_nested_directory() {
        let config = DownloadConfig::default().with_downloads_dir("a/b");
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let config = DownloadConfig::default().with_catalog_endpoint("ftp://catalog");
        assert!(config.validate().is_err());

        let config = DownloadConfig::default().with_catalog_endpoint("https://catalog.example.com");
        assert!(config.validate().is_ok());
    }
}
