//! Pipeline configuration.
//!
//! Defaults reproduce the logistics scraping setup; a TOML file can override
//! any subset of fields. Secrets never live in the file and are read from the
//! environment instead.

use crate::dedup::TieBreak;
use crate::error::ConfigError;
use crate::filter::{KeywordTable, Topic, DEFAULT_CATEGORY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const REDDIT_CLIENT_ID_VAR: &str = "REDDIT_CLIENT_ID";
pub const REDDIT_CLIENT_SECRET_VAR: &str = "REDDIT_CLIENT_SECRET";
pub const REDDIT_USER_AGENT_VAR: &str = "REDDIT_USER_AGENT";
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub subreddits: Vec<String>,
    pub collect: CollectSettings,
    pub topics: KeywordTable,
    pub categories: KeywordTable,
    pub default_category: String,
    /// Keep at most this many posts after relevance filtering.
    pub filter_limit: Option<usize>,
    pub prefer_earliest_on_tie: bool,
    pub rewrite: RewriteSettings,
    pub files: FileSettings,
    pub sink: SinkSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectSettings {
    /// Unique-title count at which collection stops.
    pub target: usize,
    pub initial_limit: u32,
    /// Growth applied to the per-source limit when a source runs dry.
    pub limit_step: Option<u32>,
    pub max_limit: u32,
    /// Full passes over the source list before giving up.
    pub max_rounds: u32,
    pub max_comments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteSettings {
    pub cap: usize,
    pub model: String,
    pub api_base: String,
    pub system_prompt: String,
    pub user_prompt_prefix: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub scraped: PathBuf,
    pub filtered: PathBuf,
    pub ready: PathBuf,
    pub final_posts: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    pub base_url: String,
    pub delay_ms: u64,
    pub default_category: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            subreddits: [
                "logistics",
                "shipping",
                "supplychain",
                "freight",
                "transportation",
                "operations",
                "packaging",
                "warehousing",
                "3pl",
                "supplychainlogistics",
                "logisticsmanagement",
                "supplychainmanagement",
                "trucking",
                "airfreight",
                "maritimelogistics",
                "lastmiledelivery",
                "inventorymanagement",
                "sustainablelogistics",
                "freightbrokers",
                "logisticstechnology",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            collect: CollectSettings::default(),
            topics: default_topics(),
            categories: default_categories(),
            default_category: DEFAULT_CATEGORY.to_string(),
            filter_limit: None,
            prefer_earliest_on_tie: false,
            rewrite: RewriteSettings::default(),
            files: FileSettings::default(),
            sink: SinkSettings::default(),
        }
    }
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            target: 20,
            initial_limit: 100,
            limit_step: Some(50),
            // Reddit listings stop paginating around 1000 items.
            max_limit: 1000,
            max_rounds: 10,
            max_comments: crate::types::MAX_COMMENTS,
        }
    }
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            cap: 10,
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            system_prompt: "You are an assistant that paraphrases text concisely while preserving \
                            its original meaning and avoiding length increase."
                .to_string(),
            user_prompt_prefix: "Paraphrase the following content without changing its meaning \
                                 or increasing its length:"
                .to_string(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            scraped: PathBuf::from("./data/scraped_posts.json"),
            filtered: PathBuf::from("./data/filtered_posts.json"),
            ready: PathBuf::from("./data/ready_posts.json"),
            final_posts: PathBuf::from("./data/final_posts.json"),
        }
    }
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            delay_ms: 500,
            default_category: "Carrier Comparison".to_string(),
        }
    }
}

impl SinkSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn with_subreddits<I, S>(mut self, subreddits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subreddits = subreddits.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target(mut self, target: usize) -> Self {
        self.collect.target = target;
        self
    }

    pub fn with_topics(mut self, topics: KeywordTable) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_categories(mut self, categories: KeywordTable, default_label: &str) -> Self {
        self.categories = categories;
        self.default_category = default_label.to_string();
        self
    }

    pub fn with_filter_limit(mut self, limit: Option<usize>) -> Self {
        self.filter_limit = limit;
        self
    }

    pub fn with_rewrite_cap(mut self, cap: usize) -> Self {
        self.rewrite.cap = cap;
        self
    }

    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.files = FileSettings {
            scraped: dir.join("scraped_posts.json"),
            filtered: dir.join("filtered_posts.json"),
            ready: dir.join("ready_posts.json"),
            final_posts: dir.join("final_posts.json"),
        };
        self
    }

    pub fn tie_break(&self) -> TieBreak {
        if self.prefer_earliest_on_tie {
            TieBreak::UpvotesThenEarliest
        } else {
            TieBreak::Upvotes
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subreddits.is_empty() {
            return Err(ConfigError::MissingField {
                field: "subreddits".to_string(),
            });
        }
        if self.collect.target == 0 {
            return Err(invalid("collect.target", "0"));
        }
        if self.collect.initial_limit == 0 {
            return Err(invalid("collect.initial_limit", "0"));
        }
        if self.collect.max_limit < self.collect.initial_limit {
            return Err(invalid(
                "collect.max_limit",
                &self.collect.max_limit.to_string(),
            ));
        }
        if self.collect.max_rounds == 0 {
            return Err(invalid("collect.max_rounds", "0"));
        }
        if self.collect.max_comments > crate::types::MAX_COMMENTS {
            return Err(invalid(
                "collect.max_comments",
                &self.collect.max_comments.to_string(),
            ));
        }
        Url::parse(&self.rewrite.api_base)
            .map_err(|_| invalid("rewrite.api_base", &self.rewrite.api_base))?;
        Url::parse(&self.sink.base_url).map_err(|_| invalid("sink.base_url", &self.sink.base_url))?;
        Ok(())
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl RedditCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: require_env(REDDIT_CLIENT_ID_VAR)?,
            client_secret: require_env(REDDIT_CLIENT_SECRET_VAR)?,
            user_agent: require_env(REDDIT_USER_AGENT_VAR)?,
        })
    }
}

pub fn openai_api_key_from_env() -> Result<String, ConfigError> {
    require_env(OPENAI_API_KEY_VAR)
}

fn require_env(var_name: &str) -> Result<String, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvironmentVariable {
            var_name: var_name.to_string(),
        }),
    }
}

fn default_topics() -> KeywordTable {
    KeywordTable::new(vec![
        Topic::new(
            "Parcel Shipping",
            &["parcel shipping", "package shipping", "parcel delivery", "package transit"],
        ),
        Topic::new(
            "Sustainable Packaging",
            &["eco-friendly packaging", "sustainable packaging", "green packaging"],
        ),
        Topic::new(
            "Last Mile Innovation",
            &["last mile delivery", "last mile solutions", "final delivery stage"],
        ),
        Topic::new(
            "Integration",
            &["system integration", "platform integration", "integration with"],
        ),
        Topic::new(
            "Carrier Solutions",
            &["carrier options", "carrier comparison", "shipping carriers", "freight carriers"],
        ),
        Topic::new(
            "Eco-Friendly",
            &["eco-friendly", "environmentally friendly", "sustainable", "green"],
        ),
        Topic::new("3-2-1 Shipping", &["3-2-1 shipping", "3-2-1 logistics"]),
        Topic::new(
            "Just-In-Time Inventory",
            &["just-in-time inventory", "JIT inventory", "inventory management"],
        ),
        Topic::new(
            "Cross-Docking",
            &["cross-docking", "dock transfer", "direct unloading"],
        ),
        Topic::new(
            "Distributed Inventory",
            &["distributed inventory", "inventory distribution", "regional inventory"],
        ),
        Topic::new(
            "Last-Mile Delivery Solutions",
            &["last-mile solutions", "last-mile logistics", "final mile delivery"],
        ),
        Topic::new(
            "Freight Consolidation",
            &["freight consolidation", "shipment consolidation", "consolidated freight"],
        ),
        Topic::new(
            "Dynamic Routing",
            &["dynamic routing", "adaptive routing", "route optimization"],
        ),
        Topic::new(
            "Third-Party Logistics (3PL)",
            &["third-party logistics", "3PL", "outsourced logistics"],
        ),
        Topic::new(
            "Seasonal Planning",
            &["seasonal planning", "holiday planning", "peak season planning"],
        ),
        Topic::new(
            "Cycle Counting",
            &["cycle counting", "inventory counting", "inventory auditing"],
        ),
        Topic::new(
            "Sales and Operations Planning (S&OP)",
            &["sales and operations planning", "S&OP", "sales planning"],
        ),
        Topic::new(
            "Cost-to-Serve Analysis",
            &["cost-to-serve", "cost analysis", "serve cost analysis"],
        ),
    ])
}

fn default_categories() -> KeywordTable {
    KeywordTable::new(vec![
        Topic::new("logistics", &["logistics", "supply chain", "warehouse"]),
        Topic::new("freight", &["freight", "shipping", "transportation"]),
        Topic::new("packaging", &["packaging", "sustainable", "eco-friendly"]),
        Topic::new("inventory", &["inventory", "management", "stock"]),
        Topic::new("last-mile", &["last mile", "delivery", "final mile"]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.subreddits.len(), 20);
        assert_eq!(config.rewrite.cap, 10);
        assert_eq!(config.sink.delay(), Duration::from_millis(500));
        assert_eq!(config.tie_break(), TieBreak::Upvotes);
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            subreddits = ["logistics"]
            filter_limit = 10
            prefer_earliest_on_tie = true

            [collect]
            target = 5
            limit_step = 25

            [[topics]]
            name = "Cross-Docking"
            keywords = ["cross-docking"]
            "#,
        )
        .unwrap();

        assert_eq!(config.subreddits, vec!["logistics"]);
        assert_eq!(config.collect.target, 5);
        assert_eq!(config.collect.limit_step, Some(25));
        assert_eq!(config.collect.initial_limit, 100);
        assert_eq!(config.filter_limit, Some(10));
        assert_eq!(config.topics.topics().len(), 1);
        assert_eq!(config.tie_break(), TieBreak::UpvotesThenEarliest);
        assert_eq!(config.categories, default_categories());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = PipelineConfig::default().with_subreddits(Vec::<String>::new());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));

        let config = PipelineConfig::default().with_target(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let result = PipelineConfig::from_toml_str("[sink]\nbase_url = \"not a url\"");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = PipelineConfig::from_toml_str("subreddits = 3");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = PipelineConfig::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
