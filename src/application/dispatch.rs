use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::file_walker::{FailureKind, PermissionFailures};
use crate::domain::registry::{FileRecord, FileRegistry};
use crate::domain::search::{LineSearcher, SearchError, SearchRequest};
use crate::infrastructure::LoggerTrait;

/// 逐个文件接收搜索结果
pub trait ReportSink {
    /// `matches` 为空表示该文件没有匹配
    fn file_result(&mut self, record: &FileRecord, matches: &[String]) -> io::Result<()>;
}

/// 分发过程中的致命错误
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("搜索 {} 时出错: {source}", .path.display())]
    Tool {
        path: PathBuf,
        #[source]
        source: SearchError,
    },

    #[error("输出失败: {0}")]
    Output(#[from] io::Error),
}

/// 分发统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub files_searched: usize,
    pub files_matched: usize,
    pub lines_matched: usize,
}

/// 按修改时间从新到旧逐个搜索文件
///
/// 严格串行：上一个文件的结果输出之后才搜索下一个。遍历之后变得不可读
/// 或被删除的文件记入 `failures` 并跳过，只有搜索工具本身的错误才会中断。
pub struct Dispatcher<'a> {
    searcher: &'a dyn LineSearcher,
    logger: Arc<dyn LoggerTrait>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(searcher: &'a dyn LineSearcher, logger: Arc<dyn LoggerTrait>) -> Self {
        Self { searcher, logger }
    }

    pub fn dispatch(
        &self,
        registry: &FileRegistry,
        request: &SearchRequest,
        failures: &mut PermissionFailures,
        sink: &mut dyn ReportSink,
    ) -> Result<DispatchStats, DispatchError> {
        let mut stats = DispatchStats::default();

        for record in registry.ordered() {
            if let Err(err) = File::open(&record.path) {
                let kind = FailureKind::classify(&err);
                let _ = self
                    .logger
                    .log_file(&record.path, &format!("无法访问({}): {}", kind.as_str(), err));
                failures.record(record.path.clone(), kind);
                continue;
            }

            let mut matches = match self.searcher.search(request, &record.path) {
                Ok(matches) => matches,
                Err(source) => {
                    let _ = self
                        .logger
                        .log_file(&record.path, &format!("搜索失败: {}", source));
                    return Err(DispatchError::Tool {
                        path: record.path.clone(),
                        source,
                    });
                }
            };
            matches.truncate(request.max_matches);

            stats.files_searched += 1;
            if !matches.is_empty() {
                stats.files_matched += 1;
                stats.lines_matched += matches.len();
                let _ = self
                    .logger
                    .log_file(&record.path, &format!("匹配 {} 行", matches.len()));
            }

            sink.file_result(record, &matches)?;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RegexSearcher;
    use crate::infrastructure::Logger;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::{tempdir, TempDir};

    /// 按文件名返回固定结果的假搜索器
    struct FakeSearcher {
        calls: RefCell<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeSearcher {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail_on: None,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    fn name_of(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    impl LineSearcher for FakeSearcher {
        fn search(&self, request: &SearchRequest, path: &Path) -> Result<Vec<String>, SearchError> {
            let name = name_of(path);
            self.calls.borrow_mut().push(name.clone());
            if self.fail_on.as_deref() == Some(name.as_str()) {
                return Err(SearchError::Pattern("broken".to_string()));
            }
            if name.contains("empty") {
                return Ok(Vec::new());
            }
            // 故意返回超过上限的行数
            Ok((0..request.max_matches + 2)
                .map(|i| format!("{} line {}", request.pattern, i))
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        results: Vec<(String, Vec<String>)>,
    }

    impl ReportSink for RecordingSink {
        fn file_result(&mut self, record: &FileRecord, matches: &[String]) -> io::Result<()> {
            self.results.push((name_of(&record.path), matches.to_vec()));
            Ok(())
        }
    }

    /// 在临时目录中创建文件并按给定的修改时间登记
    fn registry(temp: &TempDir, files: &[(&str, u64)]) -> FileRegistry {
        let mut registry = FileRegistry::new();
        for (name, secs) in files {
            let path = temp.path().join(name);
            fs::write(&path, "TODO here\nnothing\n").unwrap();
            registry.register(FileRecord {
                path,
                modified: UNIX_EPOCH + Duration::from_secs(*secs),
                size: 0,
            });
        }
        registry
    }

    fn request(max_matches: usize) -> SearchRequest {
        SearchRequest {
            pattern: "TODO".to_string(),
            case_insensitive: false,
            max_matches,
        }
    }

    fn logger() -> Arc<dyn LoggerTrait> {
        Arc::new(Logger::disabled())
    }

    #[test]
    fn test_dispatch_order_and_cap() {
        let temp = tempdir().unwrap();
        let registry = registry(&temp, &[("a.py", 100), ("c.py", 300), ("b_empty.py", 200)]);
        let searcher = FakeSearcher::new();
        let mut failures = PermissionFailures::new();
        let mut sink = RecordingSink::default();

        let stats = Dispatcher::new(&searcher, logger())
            .dispatch(&registry, &request(5), &mut failures, &mut sink)
            .unwrap();

        assert_eq!(searcher.calls(), vec!["c.py", "b_empty.py", "a.py"]);
        assert_eq!(sink.results.len(), 3);
        assert_eq!(sink.results[0].1.len(), 5);
        assert!(sink.results[1].1.is_empty());
        assert!(failures.is_empty());
        assert_eq!(
            stats,
            DispatchStats {
                files_searched: 3,
                files_matched: 2,
                lines_matched: 10,
            }
        );
    }

    #[test]
    fn test_tool_error_stops_dispatch() {
        let temp = tempdir().unwrap();
        let registry = registry(&temp, &[("new.py", 300), ("mid.py", 200), ("old.py", 100)]);
        let mut searcher = FakeSearcher::new();
        searcher.fail_on = Some("mid.py".to_string());
        let mut failures = PermissionFailures::new();
        let mut sink = RecordingSink::default();

        let err = Dispatcher::new(&searcher, logger())
            .dispatch(&registry, &request(5), &mut failures, &mut sink)
            .unwrap_err();

        match &err {
            DispatchError::Tool { path, .. } => assert_eq!(path, &temp.path().join("mid.py")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("mid.py"));
        // 出错前的结果已经输出
        assert_eq!(sink.results.len(), 1);
        assert_eq!(sink.results[0].0, "new.py");
        assert_eq!(searcher.calls().len(), 2);
    }

    #[test]
    fn test_deleted_file_is_skipped_and_recorded() {
        let temp = tempdir().unwrap();
        let registry = registry(&temp, &[("new.py", 300), ("gone.py", 200), ("old.py", 100)]);
        let gone = temp.path().join("gone.py");
        fs::remove_file(&gone).unwrap();

        let searcher = RegexSearcher::new();
        let mut failures = PermissionFailures::new();
        let mut sink = RecordingSink::default();

        let stats = Dispatcher::new(&searcher, logger())
            .dispatch(&registry, &request(5), &mut failures, &mut sink)
            .unwrap();

        assert_eq!(stats.files_searched, 2);
        assert_eq!(stats.files_matched, 2);
        let names: Vec<&str> = sink.results.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["new.py", "old.py"]);
        assert_eq!(failures.len(), 1);
        assert!(failures.contains(&gone));
        assert_eq!(failures.count(FailureKind::Vanished), 1);
    }

    #[test]
    fn test_skipped_file_is_never_searched() {
        let temp = tempdir().unwrap();
        let registry = registry(&temp, &[("a.py", 200), ("b.py", 100)]);
        fs::remove_file(temp.path().join("a.py")).unwrap();

        let searcher = FakeSearcher::new();
        let mut failures = PermissionFailures::new();
        let mut sink = RecordingSink::default();

        Dispatcher::new(&searcher, logger())
            .dispatch(&registry, &request(5), &mut failures, &mut sink)
            .unwrap();

        assert_eq!(searcher.calls(), vec!["b.py"]);
    }

    // 依赖权限位，root 用户运行时直接返回；
    // 与运行用户无关的情况由 test_deleted_file_is_skipped_and_recorded 覆盖。
    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_skipped_and_recorded() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let registry = registry(&temp, &[("new.py", 300), ("secret.py", 200), ("old.py", 100)]);
        let secret = temp.path().join("secret.py");
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();

        if fs::File::open(&secret).is_ok() {
            fs::set_permissions(&secret, fs::Permissions::from_mode(0o644)).unwrap();
            return;
        }

        let searcher = RegexSearcher::new();
        let mut failures = PermissionFailures::new();
        let mut sink = RecordingSink::default();

        let result = Dispatcher::new(&searcher, logger())
            .dispatch(&registry, &request(5), &mut failures, &mut sink);
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o644)).unwrap();

        let stats = result.unwrap();
        assert_eq!(stats.files_searched, 2);
        assert_eq!(sink.results.last().map(|(name, _)| name.as_str()), Some("old.py"));
        assert_eq!(failures.count(FailureKind::AccessDenied), 1);
        assert!(failures.contains(&secret));
    }

    #[test]
    fn test_empty_registry() {
        let searcher = FakeSearcher::new();
        let mut failures = PermissionFailures::new();
        let mut sink = RecordingSink::default();

        let stats = Dispatcher::new(&searcher, logger())
            .dispatch(&FileRegistry::new(), &request(5), &mut failures, &mut sink)
            .unwrap();

        assert_eq!(stats, DispatchStats::default());
        assert!(sink.results.is_empty());
    }
}
