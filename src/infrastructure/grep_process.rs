//! 外部 grep 进程
//!
//! 每个文件调用一次 `grep -m N [-i] -e PATTERN -- FILE`。

use std::path::Path;
use std::process::Command;

use bstr::ByteSlice;

use crate::domain::search::{LineSearcher, SearchError, SearchRequest};

/// grep 没有找到匹配时的退出码
const EXIT_NO_MATCH: i32 = 1;

/// 调用外部 grep 命令
#[derive(Debug, Clone)]
pub struct GrepCommand {
    program: String,
}

impl Default for GrepCommand {
    fn default() -> Self {
        Self::new("grep")
    }
}

impl GrepCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, request: &SearchRequest, path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-m").arg(request.max_matches.to_string());
        if request.case_insensitive {
            cmd.arg("-i");
        }
        cmd.arg("-e").arg(&request.pattern).arg("--").arg(path);
        cmd
    }
}

impl LineSearcher for GrepCommand {
    fn search(&self, request: &SearchRequest, path: &Path) -> Result<Vec<String>, SearchError> {
        let output = self
            .command(request, path)
            .output()
            .map_err(|source| SearchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // 匹配行保留行首缩进，`lines()` 只去掉行尾换行
        let stdout = output.stdout.as_bstr();
        let stderr = output.stderr.trim();

        if !output.status.success() {
            if output.status.code() == Some(EXIT_NO_MATCH) && stderr.is_empty() {
                return Ok(Vec::new());
            }
            // 非零退出但没有错误输出时，按正常结果处理
            if !stderr.is_empty() {
                return Err(SearchError::Failed {
                    program: self.program.clone(),
                    status: output.status,
                    stderr: stderr.to_str_lossy().into_owned(),
                });
            }
        }

        Ok(stdout
            .lines()
            .take(request.max_matches)
            .map(|line| line.to_str_lossy().into_owned())
            .collect())
    }
}
