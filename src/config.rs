//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or [`Config::default`]) is a
//! valid configuration: passages under
//! `faiss_index/`, questions under `faiss_qa/`, 512-token chunks with a
//! 100-token overlap, and the `all-minilm-l6-v2` local model.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::store::IndexPaths;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub passages: PassagesConfig,
    #[serde(default)]
    pub questions: QuestionsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size in tokens, as counted by `tokenizer`. The built-in
    /// `gpt2-words` tokenizer counts GPT-2 pre-tokens (word pieces), which
    /// run coarser than BPE tokens, so windows can hold more text than a
    /// BPE-counted splitter would allow. Build with the `hf-tokenizer`
    /// feature and set `tokenizer = "huggingface"` for exact BPE counts.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// `"gpt2-words"` (built in) or `"huggingface"`.
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
    /// Path to a `tokenizer.json`; required for the `huggingface` tokenizer.
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            tokenizer: default_tokenizer(),
            tokenizer_path: None,
        }
    }
}

fn default_chunk_size() -> usize {
    512
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_tokenizer() -> String {
    "gpt2-words".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_documents_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_documents_root() -> PathBuf {
    PathBuf::from("dataset/data")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct PassagesConfig {
    #[serde(default = "default_passages_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_passages_index_file")]
    pub index_file: String,
    #[serde(default = "default_passages_payload_file")]
    pub payload_file: String,
    #[serde(default = "default_passages_top_k")]
    pub top_k: usize,
}

impl Default for PassagesConfig {
    fn default() -> Self {
        Self {
            dir: default_passages_dir(),
            index_file: default_passages_index_file(),
            payload_file: default_passages_payload_file(),
            top_k: default_passages_top_k(),
        }
    }
}

impl PassagesConfig {
    pub fn paths(&self) -> IndexPaths {
        IndexPaths::new(&self.dir, &self.index_file, &self.payload_file)
    }
}

fn default_passages_dir() -> PathBuf {
    PathBuf::from("faiss_index")
}
fn default_passages_index_file() -> String {
    "index.bin".to_string()
}
fn default_passages_payload_file() -> String {
    "texts.json".to_string()
}
fn default_passages_top_k() -> usize {
    3
}

/// Where recommended questions get their answer options from.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptionsPolicy {
    /// Options persisted next to each question at index time.
    #[default]
    Persisted,
    /// Re-read the question table on every call so option edits show up
    /// without re-indexing.
    Reload,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuestionsConfig {
    #[serde(default = "default_questions_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_questions_index_file")]
    pub index_file: String,
    #[serde(default = "default_questions_payload_file")]
    pub payload_file: String,
    #[serde(default = "default_questions_csv")]
    pub csv: PathBuf,
    #[serde(default = "default_question_column")]
    pub question_column: String,
    #[serde(default = "default_subject_column")]
    pub subject_column: String,
    #[serde(default)]
    pub options: OptionsPolicy,
    #[serde(default = "default_questions_top_k")]
    pub top_k: usize,
}

impl Default for QuestionsConfig {
    fn default() -> Self {
        Self {
            dir: default_questions_dir(),
            index_file: default_questions_index_file(),
            payload_file: default_questions_payload_file(),
            csv: default_questions_csv(),
            question_column: default_question_column(),
            subject_column: default_subject_column(),
            options: OptionsPolicy::default(),
            top_k: default_questions_top_k(),
        }
    }
}

impl QuestionsConfig {
    pub fn paths(&self) -> IndexPaths {
        IndexPaths::new(&self.dir, &self.index_file, &self.payload_file)
    }
}

fn default_questions_dir() -> PathBuf {
    PathBuf::from("faiss_qa")
}
fn default_questions_index_file() -> String {
    "qa_index.bin".to_string()
}
fn default_questions_payload_file() -> String {
    "questions.json".to_string()
}
fn default_questions_csv() -> PathBuf {
    PathBuf::from("dataset/questions.csv")
}
fn default_question_column() -> String {
    "Question".to_string()
}
fn default_subject_column() -> String {
    "Subject".to_string()
}
fn default_questions_top_k() -> usize {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }
    match config.chunking.tokenizer.as_str() {
        "gpt2-words" => {}
        "huggingface" => {
            if config.chunking.tokenizer_path.is_none() {
                bail!("chunking.tokenizer_path must be set when tokenizer is 'huggingface'");
            }
        }
        other => bail!(
            "Unknown tokenizer: '{}'. Must be gpt2-words or huggingface.",
            other
        ),
    }

    // Validate retrieval
    if config.passages.top_k < 1 {
        bail!("passages.top_k must be >= 1");
    }
    if config.questions.top_k < 1 {
        bail!("questions.top_k must be >= 1");
    }
    let (passages, questions) = (config.passages.paths(), config.questions.paths());
    if passages.index_path() == questions.index_path()
        || passages.payload_path() == questions.payload_path()
        || passages.manifest_path() == questions.manifest_path()
    {
        bail!("passages and questions must not share index files");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "local" | "hash" => {}
        "openai" | "ollama" => {
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
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hash.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    Ok(())
}
