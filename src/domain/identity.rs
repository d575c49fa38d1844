use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
#[cfg(not(unix))]
use std::path::PathBuf;

/// 目录的物理身份
///
/// 同一个目录无论通过哪条路径（`/a/b`、`/a/./b`、绑定挂载等）访问，身份都相同。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirIdentity {
    /// 设备号 + inode
    #[cfg(unix)]
    Inode { dev: u64, ino: u64 },
    /// 没有 inode 的平台上退回到规范化路径
    #[cfg(not(unix))]
    Canonical(PathBuf),
}

impl DirIdentity {
    /// 读取目录的身份（不跟随末尾的符号链接）
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        Self::from_metadata(path, &metadata)
    }

    /// 使用已经取得的元数据构造身份，避免重复 stat
    #[cfg(unix)]
    pub fn from_metadata(_path: &Path, metadata: &Metadata) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        Ok(DirIdentity::Inode {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn from_metadata(path: &Path, _metadata: &Metadata) -> io::Result<Self> {
        Ok(DirIdentity::Canonical(fs::canonicalize(path)?))
    }
}

/// 已访问目录记录器
///
/// 集合只增不减，仅用于成员判断。
#[derive(Debug, Default)]
pub struct IdentityTracker {
    visited: HashSet<DirIdentity>,
}

impl IdentityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记目录并返回它之前是否已经访问过
    ///
    /// `known` 为调用方在枚举父目录时已经解析出的身份。无法确定身份时
    /// （例如目录在发现后被删除）返回错误，而不是当作未访问处理。
    pub fn mark_and_check(&mut self, path: &Path, known: Option<DirIdentity>) -> io::Result<bool> {
        let identity = match known {
            Some(identity) => identity,
            None => DirIdentity::of(path)?,
        };

        Ok(!self.visited.insert(identity))
    }

    /// 已访问的物理目录数量
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}
