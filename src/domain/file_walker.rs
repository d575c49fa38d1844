use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::domain::exclusion::ExclusionPolicy;
use crate::domain::identity::{DirIdentity, IdentityTracker};
use crate::domain::registry::{FileRecord, FileRegistry};
use crate::infrastructure::LoggerTrait;

/// 无法访问的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// 权限不足
    AccessDenied,
    /// 枚举之后被删除
    Vanished,
    /// 其他 I/O 错误
    Other,
}

impl FailureKind {
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => FailureKind::AccessDenied,
            io::ErrorKind::NotFound => FailureKind::Vanished,
            _ => FailureKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::AccessDenied => "权限不足",
            FailureKind::Vanished => "已不存在",
            FailureKind::Other => "读取失败",
        }
    }
}

/// 遍历中无法访问的文件和目录
///
/// 只记录，不会中断遍历。
#[derive(Debug, Default)]
pub struct PermissionFailures {
    entries: BTreeMap<PathBuf, FailureKind>,
}

impl PermissionFailures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: PathBuf, kind: FailureKind) {
        self.entries.entry(path).or_insert(kind);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// 按路径排序
    pub fn iter(&self) -> impl Iterator<Item = (&Path, FailureKind)> {
        self.entries.iter().map(|(path, kind)| (path.as_path(), *kind))
    }

    pub fn count(&self, kind: FailureKind) -> usize {
        self.entries.values().filter(|k| **k == kind).count()
    }
}

/// 根路径错误
#[derive(Debug, Error)]
pub enum RootError {
    #[error("找不到 '{}'", .0.display())]
    NotFound(PathBuf),
}

/// 遍历结果
#[derive(Debug)]
pub struct WalkOutcome {
    pub registry: FileRegistry,
    pub failures: PermissionFailures,
    pub directories_visited: usize,
}

/// 目录遍历器
///
/// 每个物理目录只枚举一次。根路径本身可以是符号链接，根路径以下的符号链接一律不跟随。
pub struct Walker<'a> {
    policy: &'a ExclusionPolicy,
    tracker: IdentityTracker,
    registry: FileRegistry,
    failures: PermissionFailures,
    logger: Arc<dyn LoggerTrait>,
    progress: ProgressBar,
}

impl<'a> Walker<'a> {
    pub fn new(policy: &'a ExclusionPolicy, logger: Arc<dyn LoggerTrait>) -> Self {
        Self {
            policy,
            tracker: IdentityTracker::new(),
            registry: FileRegistry::new(),
            failures: PermissionFailures::new(),
            logger,
            progress: ProgressBar::hidden(),
        }
    }

    /// 在 stderr 显示进度
    pub fn with_progress(mut self) -> Self {
        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            progress.set_style(style);
        }
        progress.set_message("已发现 0 个文件");
        self.progress = progress;
        self
    }

    /// 添加一个根路径：文件直接登记，目录递归遍历
    pub fn add_root(&mut self, path: &Path) -> Result<(), RootError> {
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => {
                let _ = self.logger.log_file(path, "根路径: 文件");
                self.add_file(path);
                Ok(())
            }
            Ok(metadata) if metadata.is_dir() => {
                let _ = self.logger.log_file(path, "根路径: 目录");
                // 根路径可以是指向目录的符号链接，身份取链接目标的
                let identity = DirIdentity::from_metadata(path, &metadata).ok();
                self.walk_from(path, identity);
                Ok(())
            }
            _ => Err(RootError::NotFound(path.to_path_buf())),
        }
    }

    /// 直接登记文件，不经过任何排除规则
    pub fn add_file(&mut self, path: &Path) {
        match self.registry.register_path(path) {
            Ok(()) => self.tick(),
            Err(err) => self.record_failure(path, &err),
        }
    }

    /// 从 `root` 开始遍历
    pub fn walk(&mut self, root: &Path) {
        let identity = fs::metadata(root)
            .and_then(|metadata| DirIdentity::from_metadata(root, &metadata))
            .ok();
        self.walk_from(root, identity);
    }

    fn walk_from(&mut self, root: &Path, identity: Option<DirIdentity>) {
        let mut pending: Vec<(PathBuf, Option<DirIdentity>)> = vec![(root.to_path_buf(), identity)];

        while let Some((dir, identity)) = pending.pop() {
            self.visit(&dir, identity, &mut pending);
        }
    }

    fn visit(
        &mut self,
        dir: &Path,
        identity: Option<DirIdentity>,
        pending: &mut Vec<(PathBuf, Option<DirIdentity>)>,
    ) {
        match self.tracker.mark_and_check(dir, identity) {
            Ok(false) => {}
            Ok(true) => {
                let _ = self.logger.log_file(dir, "已跳过(重复目录)");
                return;
            }
            Err(err) => {
                self.record_failure(dir, &err);
                return;
            }
        }

        let basename = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.policy.should_skip_directory(dir, &basename, None) {
            let _ = self.logger.log_file(dir, "已跳过(排除规则)");
            return;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.record_failure(dir, &err);
                return;
            }
        };

        let mut child_dirs: Vec<(PathBuf, DirIdentity)> = Vec::new();
        let mut child_names: BTreeSet<String> = BTreeSet::new();
        let mut files: Vec<DirEntry> = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.record_failure(dir, &err);
                    continue;
                }
            };
            let path = entry.path();

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    self.record_failure(&path, &err);
                    continue;
                }
            };

            if file_type.is_symlink() {
                continue;
            }

            if file_type.is_dir() {
                let identity = entry
                    .metadata()
                    .and_then(|metadata| DirIdentity::from_metadata(&path, &metadata));
                match identity {
                    Ok(identity) => {
                        child_names.insert(entry.file_name().to_string_lossy().into_owned());
                        child_dirs.push((path, identity));
                    }
                    Err(err) => self.record_failure(&path, &err),
                }
            } else if file_type.is_file() {
                files.push(entry);
            }
        }

        // 子目录全部枚举完之后才能判断发行版签名
        if self.policy.should_skip_directory(dir, &basename, Some(&child_names)) {
            let _ = self.logger.log_file(dir, "已跳过(运行时发行版)");
            return;
        }

        for entry in files {
            let name = entry.file_name();
            if !self.policy.should_include_file(&name.to_string_lossy()) {
                continue;
            }
            self.register_entry(&entry);
        }

        child_dirs.sort_by(|a, b| a.0.cmp(&b.0));
        for (path, identity) in child_dirs.into_iter().rev() {
            pending.push((path, Some(identity)));
        }
    }

    fn register_entry(&mut self, entry: &DirEntry) {
        let path = entry.path();
        let record = entry.metadata().and_then(|metadata| {
            Ok(FileRecord {
                modified: metadata.modified()?,
                size: metadata.len(),
                path: path.clone(),
            })
        });

        match record {
            Ok(record) => {
                self.registry.register(record);
                self.tick();
            }
            Err(err) => self.record_failure(&path, &err),
        }
    }

    fn record_failure(&mut self, path: &Path, err: &io::Error) {
        let kind = FailureKind::classify(err);
        let _ = self
            .logger
            .log_file(path, &format!("无法访问({}): {}", kind.as_str(), err));
        self.failures.record(path.to_path_buf(), kind);
    }

    fn tick(&self) {
        self.progress
            .set_message(format!("已发现 {} 个文件", self.registry.len()));
        self.progress.tick();
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn failures(&self) -> &PermissionFailures {
        &self.failures
    }

    /// 结束遍历，交出登记表和失败记录
    pub fn finish(self) -> WalkOutcome {
        self.progress.finish_and_clear();
        let _ = self.logger.log_message(&format!(
            "遍历完成: {} 个目录, {} 个文件, {} 个无法访问",
            self.tracker.len(),
            self.registry.len(),
            self.failures.len()
        ));

        WalkOutcome {
            directories_visited: self.tracker.len(),
            registry: self.registry,
            failures: self.failures,
        }
    }
}
