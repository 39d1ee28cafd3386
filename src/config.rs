use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address the HTTP API listens on
    #[serde(default = "default_bind")]
    pub bind: String,
    pub news: NewsSettings,
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
    /// Local-city news; disabled when the section is absent
    #[serde(default)]
    pub local: Option<LocalSettings>,
    #[serde(default)]
    pub flash: FlashSettings,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsSettings {
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_category")]
    pub default_category: String,
}

impl NewsSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_category() -> String {
    "top".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Category {
    pub label: String,
    pub key: String,
}

impl Category {
    fn new(label: &str, key: &str) -> Self {
        Self {
            label: label.to_string(),
            key: key.to_string(),
        }
    }
}

fn default_categories() -> Vec<Category> {
    vec![
        Category::new("Top", "top"),
        Category::new("Business", "business"),
        Category::new("Technology", "technology"),
        Category::new("Sports", "sports"),
        Category::new("Entertainment", "entertainment"),
        Category::new("Science", "science"),
        Category::new("Health", "health"),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalSettings {
    pub api_key: String,
    #[serde(default = "default_local_base_url")]
    pub base_url: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cities")]
    pub cities: Vec<String>,
}

impl LocalSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_local_base_url() -> String {
    "https://newsdata.io/api/1/news".to_string()
}

fn default_country() -> String {
    "in".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_cities() -> Vec<String> {
    [
        "Bhilwara",
        "Jaipur",
        "Udaipur",
        "Jodhpur",
        "Kota",
        "Ajmer",
        "Bikaner",
        "Alwar",
        "Sikar",
        "Chittorgarh",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

/// Swipe thresholds for the single-article flash feed
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FlashSettings {
    /// Fraction of the viewport height a drag must exceed to change article
    #[serde(default = "default_threshold_fraction")]
    pub threshold_fraction: f64,
    /// Release speed (points per second) that changes article regardless of distance
    #[serde(default = "default_velocity_threshold")]
    pub velocity_threshold: f64,
    /// How many times the feed is repeated back to back
    #[serde(default = "default_repeat")]
    pub repeat: usize,
}

impl Default for FlashSettings {
    fn default() -> Self {
        Self {
            threshold_fraction: default_threshold_fraction(),
            velocity_threshold: default_velocity_threshold(),
            repeat: default_repeat(),
        }
    }
}

fn default_threshold_fraction() -> f64 {
    0.25
}

fn default_velocity_threshold() -> f64 {
    1000.0
}

fn default_repeat() -> usize {
    3
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn category(&self, key: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.key == key)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.categories.is_empty() {
            anyhow::bail!("at least one category must be configured");
        }
        if self.category(&self.news.default_category).is_none() {
            anyhow::bail!(
                "default_category '{}' is not a configured category",
                self.news.default_category
            );
        }
        if self.news.page_size == 0 {
            anyhow::bail!("news.page_size must be positive");
        }
        if self.news.timeout_secs == 0 {
            anyhow::bail!("news.timeout_secs must be positive");
        }
        if !(self.flash.threshold_fraction > 0.0 && self.flash.threshold_fraction <= 1.0) {
            anyhow::bail!("flash.threshold_fraction must be in (0, 1]");
        }
        if !(self.flash.velocity_threshold >= 0.0) {
            anyhow::bail!("flash.velocity_threshold must be a non-negative number");
        }
        if self.flash.repeat == 0 {
            anyhow::bail!("flash.repeat must be at least 1");
        }
        if let Some(local) = &self.local {
            if local.cities.is_empty() {
                anyhow::bail!("local.cities must not be empty");
            }
            if local.timeout_secs == 0 {
                anyhow::bail!("local.timeout_secs must be positive");
            }
        }
        Ok(())
    }
}
