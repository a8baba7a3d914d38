use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub exclude: ExcludeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Root directory to compile.
    pub root: PathBuf,
    /// Extra ignore globs, merged with the built-in defaults.
    #[serde(default)]
    pub ignore_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Byte budget for text/markdown chunking.
    #[serde(default = "default_text_chunk_size")]
    pub text_chunk_size_bytes: u64,
    /// Byte budget for JSON chunking.
    #[serde(default = "default_json_chunk_size")]
    pub json_chunk_size_bytes: u64,
    /// Character budget per line within a chunk.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            text_chunk_size_bytes: default_text_chunk_size(),
            json_chunk_size_bytes: default_json_chunk_size(),
            max_line_length: default_max_line_length(),
        }
    }
}

fn default_text_chunk_size() -> u64 {
    1024
}
fn default_json_chunk_size() -> u64 {
    1024
}
fn default_max_line_length() -> usize {
    80
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExcludeConfig {
    /// Skip raster images below `small_image_threshold` bytes.
    #[serde(default)]
    pub small_images: bool,
    #[serde(default = "default_small_image_threshold")]
    pub small_image_threshold: u64,
    /// Skip all image files.
    #[serde(default)]
    pub images: bool,
    /// Skip config-format files (.json/.yaml/.yml/.toml).
    #[serde(default)]
    pub config_files: bool,
    /// Skip dependency lock files.
    #[serde(default)]
    pub lock_files: bool,
}

fn default_small_image_threshold() -> u64 {
    4096
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_project_name")]
    pub project_name: String,
    /// Artifact format: `json` or `markdown`.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            project_name: default_project_name(),
            format: default_format(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_project_name() -> String {
    "knowledge".to_string()
}
fn default_format() -> String {
    "json".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.text_chunk_size_bytes == 0 {
        anyhow::bail!("chunking.text_chunk_size_bytes must be > 0");
    }
    if config.chunking.json_chunk_size_bytes == 0 {
        anyhow::bail!("chunking.json_chunk_size_bytes must be > 0");
    }
    if config.chunking.max_line_length == 0 {
        anyhow::bail!("chunking.max_line_length must be > 0");
    }
    match config.output.format.as_str() {
        "json" | "markdown" => {}
        other => anyhow::bail!("Unknown output format: '{}'. Must be json or markdown.", other),
    }
    Ok(())
}

impl Config {
    /// Config for a root directory with everything else defaulted. Used by
    /// tests and the `--root` CLI override.
    pub fn for_root(root: PathBuf) -> Self {
        Config {
            source: SourceConfig {
                root,
                ignore_globs: Vec::new(),
                follow_symlinks: false,
            },
            chunking: ChunkingConfig::default(),
            exclude: ExcludeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}
