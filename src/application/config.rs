use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::exclusion::{
    ExclusionPolicy, MarkerSignature, DEFAULT_EXTENSIONS, DEFAULT_RUNTIME_MARKERS,
    DEFAULT_SDK_SUFFIXES, DEFAULT_VENDOR_SUFFIXES,
};

/// 默认根路径列表文件名（位于用户主目录）
pub const ROOTS_FILE_NAME: &str = ".find_recent_dirs";

/// 搜索引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// 调用外部 grep
    Grep,
    /// 进程内正则搜索
    Builtin,
}

/// 应用程序配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 搜索相关配置
    pub search: SearchConfig,
    /// 排除规则配置
    pub exclude: ExcludeConfig,
    /// 显示相关配置
    pub display: DisplayConfig,
}

/// 搜索配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 每个文件最多显示的匹配行数
    pub max_matches_per_file: usize,
    pub engine: Engine,
    /// 外部 grep 程序
    pub grep_program: String,
    /// 未指定路径时读取的根路径列表，默认 ~/.find_recent_dirs
    pub roots_file: Option<PathBuf>,
}

/// 排除规则配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeConfig {
    pub skip_dotdirs: bool,
    pub skip_vendor_dirs: bool,
    pub skip_sdk_dirs: bool,
    pub skip_runtime_dirs: bool,
    pub hidden_prefix: String,
    pub vendor_suffixes: Vec<String>,
    pub sdk_suffixes: Vec<String>,
    /// 这些子目录同时存在时视为运行时发行版根目录
    pub runtime_markers: Vec<String>,
    /// 允许搜索的文件后缀
    pub extensions: Vec<String>,
}

/// 显示配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// 最大行长度
    pub max_line_length: usize,
    pub show_permission_errors: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_matches_per_file: 5,
            engine: Engine::Grep,
            grep_program: "grep".to_string(),
            roots_file: None,
        }
    }
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            skip_dotdirs: true,
            skip_vendor_dirs: true,
            skip_sdk_dirs: true,
            skip_runtime_dirs: true,
            hidden_prefix: ".".to_string(),
            vendor_suffixes: strings(DEFAULT_VENDOR_SUFFIXES),
            sdk_suffixes: strings(DEFAULT_SDK_SUFFIXES),
            runtime_markers: strings(DEFAULT_RUNTIME_MARKERS),
            extensions: strings(DEFAULT_EXTENSIONS),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_line_length: 95,
            show_permission_errors: false,
        }
    }
}

impl Config {
    /// 从配置文件加载配置，文件不存在时使用默认配置（不写入磁盘）
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 从文件加载配置
    pub fn load_from_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("无法读取配置文件: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("配置文件无效: {}", config_path.display()))?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("无法序列化配置")?;

        fs::write(config_path, content)
            .with_context(|| format!("无法写入配置文件: {}", config_path.display()))?;

        Ok(())
    }

    /// 获取配置文件的默认路径
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("无法获取配置目录")?;
        Ok(config_dir.join("find-recent").join("config.toml"))
    }

    /// 未指定路径时读取的根路径列表文件
    pub fn roots_file_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.search.roots_file {
            return Ok(path.clone());
        }
        let home = dirs::home_dir().context("无法获取用户主目录")?;
        Ok(home.join(ROOTS_FILE_NAME))
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.search.max_matches_per_file == 0 {
            anyhow::bail!("max_matches_per_file 必须大于 0");
        }

        if self.search.grep_program.trim().is_empty() {
            anyhow::bail!("grep_program 不能为空");
        }

        if self.display.max_line_length < 10 {
            anyhow::bail!("max_line_length 不能小于 10");
        }

        if self.exclude.extensions.is_empty() {
            anyhow::bail!("extensions 不能为空");
        }

        if self.exclude.skip_runtime_dirs && self.exclude.runtime_markers.is_empty() {
            anyhow::bail!("启用 skip_runtime_dirs 时 runtime_markers 不能为空");
        }

        Ok(())
    }

    /// 根据配置生成排除规则
    pub fn exclusion_policy(&self) -> ExclusionPolicy {
        let exclude = &self.exclude;
        let mut policy = ExclusionPolicy::default();
        policy.skip_hidden = exclude.skip_dotdirs;
        policy.skip_vendor = exclude.skip_vendor_dirs;
        policy.skip_sdk = exclude.skip_sdk_dirs;
        policy.skip_runtime = exclude.skip_runtime_dirs;

        policy
            .with_hidden_prefix(exclude.hidden_prefix.clone())
            .with_vendor_suffixes(exclude.vendor_suffixes.clone())
            .with_sdk_suffixes(exclude.sdk_suffixes.clone())
            .with_runtime_signature(Arc::new(MarkerSignature::new(exclude.runtime_markers.clone())))
            .with_extensions(exclude.extensions.clone())
    }
}

/// 读取根路径列表文件：每行一个路径，忽略空行和 `#` 注释
pub fn read_roots_file(path: &Path) -> Result<Vec<PathBuf>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("无法读取根路径列表: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
