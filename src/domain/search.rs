use std::cell::RefCell;
use std::io;
use std::path::Path;
use std::process::ExitStatus;

use bstr::ByteSlice;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use grep_searcher::{BinaryDetection, Searcher, SearcherBuilder, Sink, SinkMatch};
use thiserror::Error;

/// 单个文件的搜索请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub pattern: String,
    pub case_insensitive: bool,
    /// 每个文件最多返回的匹配行数
    pub max_matches: usize,
}

/// 搜索工具本身出错（不是"没有匹配"）
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("无法启动 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} 执行失败 ({status}): {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("无效的搜索模式: {0}")]
    Pattern(String),

    #[error("读取失败: {0}")]
    Io(#[from] io::Error),
}

/// 行匹配器：一次只搜索一个文件
///
/// 返回空列表表示没有匹配。
pub trait LineSearcher {
    fn search(&self, request: &SearchRequest, path: &Path) -> Result<Vec<String>, SearchError>;
}

/// 进程内搜索引擎（ripgrep 核心库）
///
/// 编译好的匹配器按 (模式, 大小写) 缓存。
#[derive(Default)]
pub struct RegexSearcher {
    cache: RefCell<Option<(String, bool, RegexMatcher)>>,
}

impl RegexSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn matcher(&self, request: &SearchRequest) -> Result<RegexMatcher, SearchError> {
        let mut cache = self.cache.borrow_mut();
        if let Some((pattern, case_insensitive, matcher)) = cache.as_ref() {
            if *pattern == request.pattern && *case_insensitive == request.case_insensitive {
                return Ok(matcher.clone());
            }
        }

        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(request.case_insensitive)
            .build(&request.pattern)
            .map_err(|err| SearchError::Pattern(err.to_string()))?;
        *cache = Some((request.pattern.clone(), request.case_insensitive, matcher.clone()));
        Ok(matcher)
    }
}

impl LineSearcher for RegexSearcher {
    fn search(&self, request: &SearchRequest, path: &Path) -> Result<Vec<String>, SearchError> {
        if request.max_matches == 0 {
            return Ok(Vec::new());
        }

        let matcher = self.matcher(request)?;
        let mut collector = LineCollector::new(request.max_matches);
        let mut searcher = SearcherBuilder::new()
            .binary_detection(BinaryDetection::quit(b'\x00'))
            .line_number(false)
            .build();

        searcher.search_path(&matcher, path, &mut collector)?;
        Ok(collector.lines)
    }
}

/// 收集匹配行，达到上限后停止
struct LineCollector {
    lines: Vec<String>,
    limit: usize,
}

impl LineCollector {
    fn new(limit: usize) -> Self {
        Self {
            lines: Vec::new(),
            limit,
        }
    }
}

impl Sink for LineCollector {
    type Error = io::Error;

    fn matched(&mut self, _searcher: &Searcher, mat: &SinkMatch<'_>) -> Result<bool, Self::Error> {
        let line = mat.bytes().trim_end_with(|c| c == '\n' || c == '\r');
        self.lines.push(line.to_str_lossy().into_owned());
        Ok(self.lines.len() < self.limit)
    }
}
