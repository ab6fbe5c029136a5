//! Configuration parsing and validation.
//!
//! Evidence Harness is configured with a single TOML file (default
//! `./config/evh.toml`). Every section except `[corpus]` is optional and
//! falls back to the defaults below. See `config/evh.example.toml`.
//!
//! API keys are never read from this file; enabled OpenAI providers take
//! the key from `OPENAI_API_KEY`.

use anyhow::{bail, Context, Result};
use evidence_harness_core::facets::FacetLimits;
use evidence_harness_core::insights::{InsightSchema, SchemaGroup};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub facets: FacetsConfig,
    #[serde(default)]
    pub insights: InsightsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub trending: TrendingConfig,
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// JSON sparse table.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    /// Directory holding `passages.json` and `vectors.bin`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    #[serde(default = "default_context_chars")]
    pub context_chars_per_passage: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            excerpt_chars: default_excerpt_chars(),
            context_chars_per_passage: default_context_chars(),
        }
    }
}

fn default_top_k() -> usize {
    8
}
fn default_excerpt_chars() -> usize {
    300
}
fn default_context_chars() -> usize {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct FacetsConfig {
    #[serde(default = "default_sample_size_ceiling")]
    pub sample_size_ceiling: i64,
    #[serde(default = "default_year_range")]
    pub default_year_range: [i64; 2],
    /// `[min, slider_max, actual_max]`.
    #[serde(default = "default_sample_size")]
    pub default_sample_size: [i64; 3],
}

impl Default for FacetsConfig {
    fn default() -> Self {
        Self {
            sample_size_ceiling: default_sample_size_ceiling(),
            default_year_range: default_year_range(),
            default_sample_size: default_sample_size(),
        }
    }
}

impl FacetsConfig {
    pub fn limits(&self) -> FacetLimits {
        let [y0, y1] = self.default_year_range;
        let [s0, s1, s2] = self.default_sample_size;
        FacetLimits {
            sample_size_ceiling: self.sample_size_ceiling,
            default_year_range: (y0, y1),
            default_sample_size: (s0, s1, s2),
        }
    }
}

fn default_sample_size_ceiling() -> i64 {
    10_000
}
fn default_year_range() -> [i64; 2] {
    [2011, 2025]
}
fn default_sample_size() -> [i64; 3] {
    [50, 10_000, 15_000]
}

#[derive(Debug, Deserialize, Clone)]
pub struct InsightsConfig {
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_max_context_chars() -> usize {
    120_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_generation_retries() -> u32 {
    3
}
fn default_generation_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendingConfig {
    /// Publication years, counted back from the latest in the corpus, that
    /// make a paper "recent".
    #[serde(default = "default_recent_years")]
    pub recent_years: usize,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            recent_years: default_recent_years(),
        }
    }
}

fn default_recent_years() -> usize {
    2
}

/// One insight topic run by the bulk job.
#[derive(Debug, Deserialize, Clone)]
pub struct TopicConfig {
    pub name: String,
    /// Output slot; defaults to a slug of `name`.
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    pub groups: Vec<SchemaGroup>,
}

const DEFAULT_INSTRUCTION: &str = "Based on these insights, generate 7-10 concise bullet points \
    capturing the key findings, patterns, and implications across the studies. \
    Start each bullet with a single '•' character and do not nest bullets. \
    State the metrics and units behind every number.";

impl TopicConfig {
    pub fn slot(&self) -> String {
        self.slot.clone().unwrap_or_else(|| slugify(&self.name))
    }

    pub fn instruction(&self) -> &str {
        self.instruction.as_deref().unwrap_or(DEFAULT_INSTRUCTION)
    }

    pub fn schema(&self) -> InsightSchema {
        InsightSchema::new(self.groups.clone())
    }
}

/// `"Device Design & Safety"` -> `"device_design_safety"`.
fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

impl Config {
    pub fn topic(&self, slot: &str) -> Option<&TopicConfig> {
        self.topics.iter().find(|t| t.slot() == slot)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.facets.sample_size_ceiling <= 0 {
        bail!("facets.sample_size_ceiling must be > 0");
    }
    let [y0, y1] = config.facets.default_year_range;
    if y0 > y1 {
        bail!("facets.default_year_range must be [low, high] with low <= high");
    }
    if config.insights.max_context_chars == 0 {
        bail!("insights.max_context_chars must be > 0");
    }
    if config.trending.recent_years == 0 {
        bail!("trending.recent_years must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.generation.is_enabled() && config.generation.model.is_none() {
        bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }

    let mut slots = HashSet::new();
    for topic in &config.topics {
        if topic.name.trim().is_empty() {
            bail!("topics: name must not be empty");
        }
        let slot = topic.slot();
        if slot.is_empty() {
            bail!("topic '{}': slot must not be empty", topic.name);
        }
        if !slots.insert(slot.clone()) {
            bail!("topics: duplicate slot '{}'", slot);
        }
        if topic.groups.iter().all(|g| g.paths.is_empty()) {
            bail!("topic '{}': at least one group must list paths", topic.name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[corpus]\npath = \"corpus.json\"\n").unwrap();
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.facets.sample_size_ceiling, 10_000);
        assert_eq!(config.facets.limits().default_year_range, (2011, 2025));
        assert_eq!(config.server.bind, "127.0.0.1:7340");
        assert!(!config.embedding.is_enabled());
        assert!(config.index.path.is_none());
        assert_eq!(config.trending.recent_years, 2);
    }

    #[test]
    fn test_zero_recent_years_rejected() {
        let err = parse("[corpus]\npath = \"c.json\"\n[trending]\nrecent_years = 0\n").unwrap_err();
        assert!(err.to_string().contains("trending.recent_years"));
    }

    #[test]
    fn test_topics_and_slots() {
        let config = parse(
            r#"
[corpus]
path = "corpus.json"

[[topics]]
name = "Device Design & Safety"
groups = [{ name = "Chemicals", paths = ["chemicals_implicated.level_detected"] }]

[[topics]]
name = "Key Findings"
slot = "findings"
instruction = "Summarize."
groups = [{ name = "Findings", paths = ["main_conclusions"] }]
"#,
        )
        .unwrap();
        assert_eq!(config.topics[0].slot(), "device_design_safety");
        assert_eq!(config.topics[1].slot(), "findings");
        assert_eq!(config.topics[1].instruction(), "Summarize.");
        assert!(config.topic("findings").is_some());
        assert_eq!(config.topics[0].schema().groups[0].paths.len(), 1);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(parse("[corpus]\npath = \"c.json\"\n[retrieval]\ntop_k = 0\n").is_err());
        assert!(parse("[corpus]\npath = \"c.json\"\n[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse("[corpus]\npath = \"c.json\"\n[generation]\nprovider = \"local\"\n").is_err());
        let dup = r#"
[corpus]
path = "c.json"
[[topics]]
name = "A"
slot = "x"
groups = [{ name = "G", paths = ["p"] }]
[[topics]]
name = "B"
slot = "x"
groups = [{ name = "G", paths = ["p"] }]
"#;
        let err = parse(dup).unwrap_err().to_string();
        assert!(err.contains("duplicate slot"));
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/evh.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
