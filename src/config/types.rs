use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub caption: CaptionConfig,
    #[serde(default)]
    pub qa: QaConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default = "default_questions")]
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Where model files come from and how to authenticate against the hub.
///
/// The token itself never appears in this struct; only the places it can be
/// read from at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlipVariant {
    Base,
    Large,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    #[serde(default = "default_caption_model")]
    pub model_id: String,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default = "default_weights_file")]
    pub weights_file: String,
    #[serde(default)]
    pub tokenizer_repo: Option<String>,
    #[serde(default = "default_blip_variant")]
    pub variant: BlipVariant,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    #[serde(default = "default_qa_model")]
    pub model_id: String,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default = "default_weights_file")]
    pub weights_file: String,
    #[serde(default = "default_qa_tokenizer_repo")]
    pub tokenizer_repo: Option<String>,
    #[serde(default = "default_max_answer_len")]
    pub max_answer_len: usize,
    #[serde(default = "default_max_seq_len")]
    pub max_seq_len: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Hub access token. Formatting never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryToken(String);

impl RegistryToken {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() { None } else { Some(Self(token)) }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RegistryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RegistryToken(***)")
    }
}

impl fmt::Display for RegistryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            registry: RegistryConfig::default(),
            caption: CaptionConfig::default(),
            qa: QaConfig::default(),
            inference: InferenceConfig::default(),
            questions: default_questions(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logs: LogsConfig::default(),
            max_upload_bytes: default_max_upload_bytes(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            token_file: None,
            cache_dir: None,
        }
    }
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            model_id: default_caption_model(),
            revision: None,
            weights_file: default_weights_file(),
            tokenizer_repo: None,
            variant: default_blip_variant(),
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            model_id: default_qa_model(),
            revision: None,
            weights_file: default_weights_file(),
            tokenizer_repo: default_qa_tokenizer_repo(),
            max_answer_len: default_max_answer_len(),
            max_seq_len: default_max_seq_len(),
            min_score: default_min_score(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_session_ttl_secs() -> u64 {
    30 * 60
}

fn default_token_env() -> String {
    "HF_TOKEN".to_string()
}

fn default_caption_model() -> String {
    "Salesforce/blip-image-captioning-base".to_string()
}

fn default_qa_model() -> String {
    "deepset/roberta-base-squad2".to_string()
}

fn default_qa_tokenizer_repo() -> Option<String> {
    Some("FacebookAI/roberta-base".to_string())
}

fn default_weights_file() -> String {
    "model.safetensors".to_string()
}

fn default_blip_variant() -> BlipVariant {
    BlipVariant::Base
}

fn default_max_new_tokens() -> usize {
    50
}

fn default_max_answer_len() -> usize {
    15
}

fn default_max_seq_len() -> usize {
    384
}

fn default_min_score() -> f32 {
    0.0
}

fn default_timeout_secs() -> u64 {
    120
}

pub fn default_questions() -> Vec<String> {
    vec![
        "What are the ingredients?".to_string(),
        "What are the cooking actions?".to_string(),
    ]
}
