use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use find_recent::application::{read_roots_file, Config, Dispatcher, Engine};
use find_recent::domain::{LineSearcher, RegexSearcher, SearchRequest, Walker};
use find_recent::infrastructure::{GrepCommand, Logger, LoggerTrait, RunTotals};
use find_recent::presentation::{OutputFormat, Renderer};

/// 按修改时间从新到旧搜索源代码文件
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 要搜索的正则表达式
    pattern: String,

    /// 要递归搜索的文件和目录，为空时读取 ~/.find_recent_dirs
    paths: Vec<PathBuf>,

    /// 忽略大小写
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// 以 JSON 格式输出（每行一个对象）
    #[arg(long)]
    json: bool,

    /// 每个文件最多显示的匹配行数 [默认: 5]
    #[arg(short = 'm', long, value_parser = clap::value_parser!(u64).range(1..))]
    max_lines: Option<u64>,

    /// 跳过以 . 开头的目录 [默认: true]
    #[arg(long, value_name = "BOOL")]
    skip_dotdirs: Option<bool>,

    /// 跳过 node_modules 目录 [默认: true]
    #[arg(long, value_name = "BOOL")]
    skip_node_module_dirs: Option<bool>,

    /// 跳过 google-cloud-sdk 目录 [默认: true]
    #[arg(long, value_name = "BOOL")]
    skip_google_cloud_sdk_dirs: Option<bool>,

    /// 跳过 anaconda 发行版目录 [默认: true]
    #[arg(long, value_name = "BOOL")]
    skip_anaconda_dirs: Option<bool>,

    /// 列出因权限不足无法搜索的文件和目录
    #[arg(long)]
    show_permission_errors: bool,

    /// 搜索引擎 [默认: grep]
    #[arg(long, value_enum)]
    engine: Option<Engine>,

    /// 配置文件路径
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 启用运行日志，日志文件保存到当前目录
    #[arg(long)]
    log: bool,
}

/// 加载配置：指定路径必须存在，默认路径不存在时使用默认配置
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path),
        None => match Config::default_config_path() {
            Ok(path) => Config::load_or_default(&path),
            Err(_) => Ok(Config::default()),
        },
    }
}

/// 命令行参数覆盖配置文件
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(max_lines) = args.max_lines {
        config.search.max_matches_per_file = max_lines as usize;
    }
    if let Some(engine) = args.engine {
        config.search.engine = engine;
    }
    if let Some(skip) = args.skip_dotdirs {
        config.exclude.skip_dotdirs = skip;
    }
    if let Some(skip) = args.skip_node_module_dirs {
        config.exclude.skip_vendor_dirs = skip;
    }
    if let Some(skip) = args.skip_google_cloud_sdk_dirs {
        config.exclude.skip_sdk_dirs = skip;
    }
    if let Some(skip) = args.skip_anaconda_dirs {
        config.exclude.skip_runtime_dirs = skip;
    }
    if args.show_permission_errors {
        config.display.show_permission_errors = true;
    }
}

/// 命令行没有给出路径时从根路径列表文件读取
fn resolve_roots(args: &Args, config: &Config, format: OutputFormat) -> Result<Vec<PathBuf>> {
    if !args.paths.is_empty() {
        return Ok(args.paths.clone());
    }

    let roots_file = config.roots_file_path()?;
    let notice = format!("未指定文件或目录，从 {} 读取", roots_file.display());
    match format {
        OutputFormat::Human => println!("{}", notice),
        OutputFormat::Json => eprintln!("{}", notice),
    }

    if !roots_file.exists() {
        Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                format!(
                    "必须在命令行指定文件或目录，或者在 {} 中写入默认路径",
                    roots_file.display()
                ),
            )
            .exit();
    }

    let roots = read_roots_file(&roots_file)?;
    if roots.is_empty() {
        anyhow::bail!("根路径列表为空: {}", roots_file.display());
    }
    Ok(roots)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate().context("参数无效")?;

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let logger = Arc::new(Logger::new(args.log)?);
    let roots = resolve_roots(&args, &config, format)?;

    if logger.is_enabled() {
        logger.log_message(&format!("搜索模式: {}", args.pattern))?;
        logger.log_message(&format!("忽略大小写: {}", args.ignore_case))?;
        logger.log_message(&format!("搜索引擎: {:?}", config.search.engine))?;
        for root in &roots {
            logger.log_message(&format!("根路径: {}", root.display()))?;
        }
    }

    let start_time = Instant::now();

    // 遍历目录，登记文件
    let policy = config.exclusion_policy();
    let mut walker = Walker::new(&policy, logger.clone()).with_progress();
    for root in &roots {
        if let Err(err) = walker.add_root(root) {
            walker.finish();
            return Err(err.into());
        }
    }
    let mut outcome = walker.finish();

    let stdout = io::stdout();
    let mut renderer = Renderer::new(stdout.lock(), format, config.display.max_line_length);
    renderer.render_preamble(
        &outcome.registry,
        &outcome.failures,
        config.display.show_permission_errors,
    )?;

    // 按修改时间逐个搜索
    let searcher: Box<dyn LineSearcher> = match config.search.engine {
        Engine::Grep => Box::new(GrepCommand::new(config.search.grep_program.clone())),
        Engine::Builtin => Box::new(RegexSearcher::new()),
    };
    let request = SearchRequest {
        pattern: args.pattern.clone(),
        case_insensitive: args.ignore_case,
        max_matches: config.search.max_matches_per_file,
    };
    let stats = Dispatcher::new(searcher.as_ref(), logger.clone()).dispatch(
        &outcome.registry,
        &request,
        &mut outcome.failures,
        &mut renderer,
    )?;

    let duration = start_time.elapsed();
    renderer.render_summary(&stats, &outcome.failures, duration)?;

    logger.finalize(
        &RunTotals {
            files_registered: outcome.registry.len(),
            files_searched: stats.files_searched,
            files_matched: stats.files_matched,
            lines_matched: stats.lines_matched,
            permission_failures: outcome.failures.len(),
        },
        duration,
    )?;
    if logger.is_enabled() {
        eprintln!("完整日志已保存到: {}", logger.log_path().display());
    }

    Ok(())
}
