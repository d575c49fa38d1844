use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// 已登记的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    /// 发现时的修改时间
    pub modified: SystemTime,
    pub size: u64,
}

impl FileRecord {
    /// 读取文件元数据生成记录
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            modified: metadata.modified()?,
            size: metadata.len(),
        })
    }

    /// 文件名（没有文件名时返回完整路径）
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// 文件登记表：路径 -> 修改时间
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: HashMap<PathBuf, FileRecord>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记文件，同一路径只保留一条
    pub fn register(&mut self, record: FileRecord) {
        self.files.insert(record.path.clone(), record);
    }

    /// 读取元数据并登记
    pub fn register_path(&mut self, path: &Path) -> io::Result<()> {
        let record = FileRecord::from_path(path)?;
        self.register(record);
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 所有文件的总字节数
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|record| record.size).sum()
    }

    /// 按修改时间从新到旧排序，时间相同按路径排序
    pub fn ordered(&self) -> Vec<&FileRecord> {
        let mut records: Vec<&FileRecord> = self.files.values().collect();
        records.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
        records
    }
}
