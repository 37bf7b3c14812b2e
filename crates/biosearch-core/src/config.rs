//! Typed configuration, loaded once at startup and passed to constructors.
//!
//! Figment merges built-in defaults, `config.toml` and `BIOSEARCH_*`
//! environment variables. Nothing reads configuration mid-request.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub search: SearchTuning,
    pub recency: RecencyConfig,
    pub generation: GenerationConfig,
    pub rag: RagConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub dir: String,
    pub writer_heap_bytes: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: "data/index".to_string(),
            writer_heap_bytes: 50_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTuning {
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Cascade stage target. `None` means `max(5, page_size / 3)`.
    pub min_hits: Option<usize>,
    /// How many recency-sorted documents the universal fallback returns.
    pub fallback_cap: usize,
    pub fuzzy_max_distance: u8,
    pub title_weight: f32,
    pub abstract_weight: f32,
    pub keywords_weight: f32,
    pub authors_weight: f32,
    pub title_phrase_boost: f32,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            min_hits: None,
            fallback_cap: 10,
            fuzzy_max_distance: 1,
            title_weight: 3.0,
            abstract_weight: 2.0,
            keywords_weight: 2.0,
            authors_weight: 1.5,
            title_phrase_boost: 2.0,
        }
    }
}

impl SearchTuning {
    /// Minimum hit count a cascade stage must reach before the cascade stops.
    pub fn stage_target(&self, page_size: usize) -> usize {
        self.min_hits.unwrap_or_else(|| (page_size / 3).max(5))
    }
}

/// Gaussian recency decay, mirroring a `gauss` function-score with
/// `boost_mode: sum`: boost = weight * decay^((age / scale)^2), age counted
/// in years back from the origin and clamped at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecencyConfig {
    /// Reference year the decay is anchored to. `None` means the current
    /// year at construction time.
    pub origin_year: Option<i32>,
    /// Age in years at which the boost has decayed to `decay`.
    pub scale_years: f64,
    pub decay: f64,
    pub weight: f64,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            origin_year: None,
            scale_years: 1.0,
            decay: 0.5,
            weight: 1.0,
        }
    }
}

impl RecencyConfig {
    pub fn resolved_origin(&self) -> i32 {
        use chrono::Datelike;
        self.origin_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }

    /// Additive score boost for a document published in `year`.
    /// Monotonic: a later year never gets a smaller boost.
    pub fn boost(&self, origin: i32, year: i32) -> f32 {
        let age = f64::from((origin - year).max(0));
        let x = age / self.scale_years.max(f64::EPSILON);
        (self.weight * self.decay.powf(x * x)) as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// How many documents the answer engine retrieves.
    pub top_k: usize,
    /// Maximum total characters of the context block.
    pub context_budget: usize,
    /// Per-document abstract truncation inside the context block.
    pub snippet_chars: usize,
    /// Abstract truncation used by the extractive fallback listing.
    pub fallback_snippet_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            context_budget: 5500,
            snippet_chars: 800,
            fallback_snippet_chars: 220,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(Toml::file("config.toml"))
    }

    fn load_with(toml: impl figment::Provider) -> anyhow::Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(toml)
            .merge(Env::prefixed("BIOSEARCH_").split("__"))
            .extract()
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let invalid = |message: &str| Err(Error::InvalidConfig(message.to_string()));
        if self.search.default_page_size == 0 {
            return invalid("search.default_page_size must be at least 1");
        }
        if self.search.max_page_size < self.search.default_page_size {
            return invalid("search.max_page_size must be >= search.default_page_size");
        }
        if self.rag.top_k == 0 {
            return invalid("rag.top_k must be at least 1");
        }
        // exclusive bounds: 0 kills the boost entirely, 1 never decays
        if !(self.recency.decay > 0.0 && self.recency.decay < 1.0) {
            return invalid("recency.decay must be in (0, 1)");
        }
        Ok(())
    }
}
