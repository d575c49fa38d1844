use std::borrow::Cow;
use std::io::{self, Write};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use humansize::{format_size, BINARY};
use serde::Serialize;

use crate::application::dispatch::{DispatchStats, ReportSink};
use crate::domain::file_walker::PermissionFailures;
use crate::domain::registry::{FileRecord, FileRegistry};

/// 行被截断时追加的标记
pub const TRUNCATION_MARKER: &str = "...";

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// 人类可读
    Human,
    /// 每行一个 JSON 对象
    Json,
}

/// 格式化持续时间
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}.{:03}s", secs, duration.subsec_millis())
    }
}

/// 相对时间，例如 "3.2 小时前"
///
/// 选择数值不小于 1 的最大单位。
pub fn format_age(modified: SystemTime, now: SystemTime) -> String {
    let age = now
        .duration_since(modified)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64();

    let units = [
        ("秒", age),
        ("分钟", age / 60.0),
        ("小时", age / 3600.0),
        ("天", age / 86400.0),
        ("个月", age / 86400.0 / 365.24 * 12.0),
        ("年", age / 86400.0 / 365.24),
    ];

    let mut chosen = units[0];
    for unit in units.iter().skip(1) {
        if unit.1 < 1.0 {
            break;
        }
        chosen = *unit;
    }

    format!("{:.1} {}前", chosen.1, chosen.0)
}

/// 按字符截断到 `width`，超出时追加标记
pub fn truncate_line(line: &str, width: usize) -> Cow<'_, str> {
    match line.char_indices().nth(width) {
        Some((idx, _)) => Cow::Owned(format!("{}{}", &line[..idx], TRUNCATION_MARKER)),
        None => Cow::Borrowed(line),
    }
}

#[derive(Serialize)]
struct BeginEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    files: usize,
    bytes: u64,
    permission_errors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    inaccessible: Option<Vec<Cow<'a, str>>>,
}

#[derive(Serialize)]
struct MatchEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    file: String,
    path: Cow<'a, str>,
    modified: String,
    age: String,
    matches: &'a [String],
}

#[derive(Serialize)]
struct SummaryEvent {
    #[serde(rename = "type")]
    kind: &'static str,
    elapsed_ms: u64,
    files_searched: usize,
    files_matched: usize,
    lines_matched: usize,
    permission_errors: usize,
}

/// 搜索结果输出
///
/// 每个文件的结果写完立即 flush。
pub struct Renderer<W: Write> {
    out: W,
    format: OutputFormat,
    max_line_length: usize,
    now: SystemTime,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, format: OutputFormat, max_line_length: usize) -> Self {
        Self {
            out,
            format,
            max_line_length,
            now: SystemTime::now(),
        }
    }

    /// 指定计算相对时间用的当前时间
    pub fn with_now(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// 搜索开始前的说明：文件数量和无法访问的路径
    pub fn render_preamble(
        &mut self,
        registry: &FileRegistry,
        failures: &PermissionFailures,
        show_failures: bool,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Human => {
                let mut message = format!(
                    "正在搜索 {} 个文件 ({})。",
                    registry.len(),
                    format_size(registry.total_size(), BINARY)
                );
                if !failures.is_empty() {
                    message.push_str(&format!(
                        " ({} 个文件/目录因权限不足被跳过。)",
                        failures.len()
                    ));
                }
                writeln!(self.out, "{}", message)?;

                if show_failures && !failures.is_empty() {
                    writeln!(self.out, "无法访问:")?;
                    for (path, _) in failures.iter() {
                        writeln!(self.out, "{}", path.display())?;
                    }
                    writeln!(self.out)?;
                }
            }
            OutputFormat::Json => {
                let inaccessible = show_failures.then(|| {
                    failures
                        .iter()
                        .map(|(path, _)| path.to_string_lossy())
                        .collect()
                });
                self.write_json(&BeginEvent {
                    kind: "begin",
                    files: registry.len(),
                    bytes: registry.total_size(),
                    permission_errors: failures.len(),
                    inaccessible,
                })?;
            }
        }

        self.out.flush()
    }

    /// 搜索结束后的摘要
    pub fn render_summary(
        &mut self,
        stats: &DispatchStats,
        failures: &PermissionFailures,
        elapsed: Duration,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Human => {
                writeln!(self.out, "搜索摘要:")?;
                writeln!(self.out, "----------------------------")?;
                writeln!(self.out, "总用时: {}", format_duration(elapsed))?;
                writeln!(self.out, "已搜索文件: {}", stats.files_searched)?;
                writeln!(self.out, "匹配文件: {}", stats.files_matched)?;
                writeln!(self.out, "匹配行数: {}", stats.lines_matched)?;
                if !failures.is_empty() {
                    writeln!(self.out, "无法访问: {}", failures.len())?;
                }
            }
            OutputFormat::Json => {
                self.write_json(&SummaryEvent {
                    kind: "summary",
                    elapsed_ms: elapsed.as_millis() as u64,
                    files_searched: stats.files_searched,
                    files_matched: stats.files_matched,
                    lines_matched: stats.lines_matched,
                    permission_errors: failures.len(),
                })?;
            }
        }

        self.out.flush()
    }

    fn render_human(&mut self, record: &FileRecord, matches: &[String]) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {} ({})",
            record.file_name(),
            format_age(record.modified, self.now),
            record.path.display()
        )?;
        for line in matches {
            writeln!(self.out, "    {}", truncate_line(line, self.max_line_length))?;
        }
        writeln!(self.out)
    }

    fn render_json(&mut self, record: &FileRecord, matches: &[String]) -> io::Result<()> {
        let event = MatchEvent {
            kind: "match",
            file: record.file_name(),
            path: record.path.to_string_lossy(),
            modified: DateTime::<Local>::from(record.modified).to_rfc3339(),
            age: format_age(record.modified, self.now),
            matches,
        };
        self.write_json(&event)
    }

    fn write_json<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        writeln!(self.out)
    }
}

impl<W: Write> ReportSink for Renderer<W> {
    fn file_result(&mut self, record: &FileRecord, matches: &[String]) -> io::Result<()> {
        if matches.is_empty() {
            return Ok(());
        }

        match self.format {
            OutputFormat::Human => self.render_human(record, matches)?,
            OutputFormat::Json => self.render_json(record, matches)?,
        }

        self.out.flush()
    }
}
