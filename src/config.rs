use crate::analysis::{default_exclude_patterns, DEFAULT_MAX_FILES};
use crate::provider::ProviderKind;
use crate::tokens::known_models;
use anyhow::{anyhow, Result};
use dialoguer::{theme::ColorfulTheme, Input, Select};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_FILE: &str = ".complexity.yml";
const GLOBAL_CONFIG_DIR: &str = ".config/repo-complexity";

/// Non-secret settings. API keys come from flags or the environment only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: String,
    pub model: Option<String>,
    pub api_base_url: Option<String>,
    pub max_files: usize,
    pub exclude_patterns: Vec<String>,
    pub output: Option<String>,
    pub max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            api_base_url: None,
            max_files: DEFAULT_MAX_FILES,
            exclude_patterns: default_exclude_patterns(),
            output: None,
            max_attempts: 1,
        }
    }
}

impl Config {
    /// Project config, else global config, else defaults.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load_from(&config_path)
        } else if let Some(global_config) = Self::load_global()? {
            Ok(global_config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let config_path = project_dir.join(CONFIG_FILE);
        let content = serde_yaml::to_string(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    fn global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn load_global() -> Result<Option<Self>> {
        match Self::global_path() {
            Some(path) if path.exists() => Ok(Some(Self::load_from(&path)?)),
            _ => Ok(None),
        }
    }

    pub fn save_global(&self) -> Result<()> {
        let path = Self::global_path().ok_or_else(|| anyhow!("Cannot locate home directory"))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

pub fn configure_interactive(project_dir: &Path, global: bool) -> Result<()> {
    let theme = ColorfulTheme::default();
    let current_config = if global {
        Config::load_global()?.unwrap_or_default()
    } else {
        Config::load(project_dir)?
    };

    println!("\nrepo-complexity configuration");
    println!("=============================");
    if global {
        println!("Editing global configuration\n");
    } else {
        println!("Editing project configuration\n");
    }

    let providers = ProviderKind::NAMES;
    let provider_index = Select::with_theme(&theme)
        .with_prompt("Provider")
        .default(
            providers
                .iter()
                .position(|p| *p == current_config.provider)
                .unwrap_or(0),
        )
        .items(&providers)
        .interact()?;
    let provider = providers[provider_index].to_string();

    let prefix = if provider == "anthropic" { "claude" } else { "gpt" };
    let mut models: Vec<String> = vec!["(provider default)".to_string()];
    models.extend(
        known_models()
            .iter()
            .filter(|m| m.starts_with(prefix))
            .map(|m| m.to_string()),
    );
    let default_index = current_config
        .model
        .as_ref()
        .and_then(|current| models.iter().position(|m| m == current))
        .unwrap_or(0);
    let model_index = Select::with_theme(&theme)
        .with_prompt("Model")
        .default(default_index)
        .items(&models)
        .interact()?;
    let model = (model_index > 0).then(|| models[model_index].clone());

    let max_files: usize = Input::with_theme(&theme)
        .with_prompt("Maximum files")
        .default(current_config.max_files)
        .interact_text()?;

    let excludes: String = Input::with_theme(&theme)
        .with_prompt("Exclude patterns (comma separated)")
        .with_initial_text(current_config.exclude_patterns.join(","))
        .allow_empty(true)
        .interact_text()?;

    let new_config = Config {
        provider,
        model,
        max_files,
        exclude_patterns: parse_pattern_list(&excludes),
        ..current_config
    };

    if global {
        new_config.save_global()?;
        info!("Global configuration updated");
    } else {
        new_config.save(project_dir)?;
        info!("Project configuration updated");
    }
    Ok(())
}

pub fn parse_pattern_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn init_project(project_dir: &Path) -> Result<()> {
    let config_path = project_dir.join(CONFIG_FILE);
    if config_path.exists() {
        return Err(anyhow!("Config file already exists: {}", config_path.display()));
    }
    Config::default().save(project_dir)?;
    info!("Created config file: {}", config_path.display());

    let gitignore_path = project_dir.join(".gitignore");
    if gitignore_path.exists() {
        let mut content = fs::read_to_string(&gitignore_path)?;
        if !content.lines().any(|line| line.trim() == CONFIG_FILE) {
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(CONFIG_FILE);
            content.push('\n');
            fs::write(&gitignore_path, content)?;
            info!("Added {} to .gitignore", CONFIG_FILE);
        }
    } else {
        fs::write(&gitignore_path, format!("{}\n", CONFIG_FILE))?;
        info!("Created .gitignore with {}", CONFIG_FILE);
    }
    Ok(())
}
