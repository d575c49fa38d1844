use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// 默认允许搜索的文件后缀
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".c", ".h", ".c++", ".h++", ".cpp", ".hpp", ".js", ".ts", ".html", ".rb", ".py", ".ipynb",
    ".rs",
];

/// 依赖/包管理目录
pub const DEFAULT_VENDOR_SUFFIXES: &[&str] = &["node_modules"];

/// SDK 安装目录
pub const DEFAULT_SDK_SUFFIXES: &[&str] = &["google-cloud-sdk"];

/// conda 发行版根目录的标志子目录
pub const DEFAULT_RUNTIME_MARKERS: &[&str] = &["condabin", "bin", "conda-meta"];

/// 根据子目录名判断目录是否是某种运行时发行版的根目录
pub trait DirSignature: Send + Sync {
    fn matches(&self, child_dirs: &BTreeSet<String>) -> bool;
}

/// 所有标志子目录同时存在时命中
#[derive(Debug, Clone)]
pub struct MarkerSignature {
    markers: Vec<String>,
}

impl MarkerSignature {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }
}

impl DirSignature for MarkerSignature {
    fn matches(&self, child_dirs: &BTreeSet<String>) -> bool {
        !self.markers.is_empty() && self.markers.iter().all(|m| child_dirs.contains(m))
    }
}

/// 目录排除与文件筛选规则
///
/// 两个判断函数都只依赖输入和开关，不做任何 I/O。
#[derive(Clone)]
pub struct ExclusionPolicy {
    pub skip_hidden: bool,
    pub skip_vendor: bool,
    pub skip_sdk: bool,
    pub skip_runtime: bool,
    hidden_prefix: String,
    vendor_suffixes: Vec<String>,
    sdk_suffixes: Vec<String>,
    runtime_signature: Arc<dyn DirSignature>,
    extensions: Vec<String>,
}

impl fmt::Debug for ExclusionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionPolicy")
            .field("skip_hidden", &self.skip_hidden)
            .field("skip_vendor", &self.skip_vendor)
            .field("skip_sdk", &self.skip_sdk)
            .field("skip_runtime", &self.skip_runtime)
            .field("hidden_prefix", &self.hidden_prefix)
            .field("vendor_suffixes", &self.vendor_suffixes)
            .field("sdk_suffixes", &self.sdk_suffixes)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            skip_hidden: true,
            skip_vendor: true,
            skip_sdk: true,
            skip_runtime: true,
            hidden_prefix: ".".to_string(),
            vendor_suffixes: to_strings(DEFAULT_VENDOR_SUFFIXES),
            sdk_suffixes: to_strings(DEFAULT_SDK_SUFFIXES),
            runtime_signature: Arc::new(MarkerSignature::new(DEFAULT_RUNTIME_MARKERS.iter().copied())),
            extensions: to_strings(DEFAULT_EXTENSIONS),
        }
    }
}

impl ExclusionPolicy {
    pub fn with_hidden_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hidden_prefix = prefix.into();
        self
    }

    pub fn with_vendor_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.vendor_suffixes = suffixes;
        self
    }

    pub fn with_sdk_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.sdk_suffixes = suffixes;
        self
    }

    /// 替换运行时发行版的识别规则
    pub fn with_runtime_signature(mut self, signature: Arc<dyn DirSignature>) -> Self {
        self.runtime_signature = signature;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// 判断目录是否应该跳过
    ///
    /// `child_dirs` 为 `None` 时（目录尚未枚举）不做发行版签名检查。
    pub fn should_skip_directory(
        &self,
        path: &Path,
        basename: &str,
        child_dirs: Option<&BTreeSet<String>>,
    ) -> bool {
        if self.skip_hidden && !self.hidden_prefix.is_empty() && basename.starts_with(&self.hidden_prefix) {
            return true;
        }

        if self.skip_vendor && ends_with_any(path, &self.vendor_suffixes) {
            return true;
        }

        if self.skip_sdk && ends_with_any(path, &self.sdk_suffixes) {
            return true;
        }

        if self.skip_runtime {
            if let Some(children) = child_dirs {
                if self.runtime_signature.matches(children) {
                    return true;
                }
            }
        }

        false
    }

    /// 判断文件是否在后缀白名单内
    pub fn should_include_file(&self, filename: &str) -> bool {
        self.extensions.iter().any(|ext| filename.ends_with(ext.as_str()))
    }
}

// 按路径组件比较，`a/node_modules` 命中而 `a/my_node_modules` 不命中
fn ends_with_any(path: &Path, suffixes: &[String]) -> bool {
    suffixes
        .iter()
        .filter(|s| !s.is_empty())
        .any(|suffix| path.ends_with(suffix))
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hidden_directories() {
        let policy = ExclusionPolicy::default();
        assert!(policy.should_skip_directory(Path::new("root/.git"), ".git", None));
        assert!(!policy.should_skip_directory(Path::new("root/src"), "src", None));

        let policy = ExclusionPolicy {
            skip_hidden: false,
            ..ExclusionPolicy::default()
        };
        assert!(!policy.should_skip_directory(Path::new("root/.git"), ".git", None));
    }

    #[test]
    fn test_vendor_and_sdk_suffixes() {
        let policy = ExclusionPolicy::default();
        assert!(policy.should_skip_directory(Path::new("a/vendor/node_modules"), "node_modules", None));
        assert!(!policy.should_skip_directory(Path::new("a/my_node_modules"), "my_node_modules", None));
        assert!(policy.should_skip_directory(Path::new("/opt/google-cloud-sdk"), "google-cloud-sdk", None));

        let policy = ExclusionPolicy {
            skip_vendor: false,
            skip_sdk: false,
            ..ExclusionPolicy::default()
        };
        assert!(!policy.should_skip_directory(Path::new("a/node_modules"), "node_modules", None));
        assert!(!policy.should_skip_directory(Path::new("/opt/google-cloud-sdk"), "google-cloud-sdk", None));
    }

    #[test]
    fn test_multi_component_suffix() {
        let policy = ExclusionPolicy::default()
            .with_vendor_suffixes(vec!["lib/site-packages".to_string()]);
        let path = PathBuf::from("/usr/lib/site-packages");
        assert!(policy.should_skip_directory(&path, "site-packages", None));
        assert!(!policy.should_skip_directory(Path::new("/usr/site-packages"), "site-packages", None));
    }

    #[test]
    fn test_runtime_signature() {
        let policy = ExclusionPolicy::default();
        let conda = names(&["bin", "condabin", "conda-meta", "lib"]);
        let partial = names(&["bin", "condabin"]);

        assert!(!policy.should_skip_directory(Path::new("anaconda3"), "anaconda3", None));
        assert!(policy.should_skip_directory(Path::new("anaconda3"), "anaconda3", Some(&conda)));
        assert!(!policy.should_skip_directory(Path::new("project"), "project", Some(&partial)));

        let policy = ExclusionPolicy {
            skip_runtime: false,
            ..ExclusionPolicy::default()
        };
        assert!(!policy.should_skip_directory(Path::new("anaconda3"), "anaconda3", Some(&conda)));
    }

    #[test]
    fn test_replaced_signature() {
        struct HasVenvMarker;
        impl DirSignature for HasVenvMarker {
            fn matches(&self, child_dirs: &BTreeSet<String>) -> bool {
                child_dirs.contains("pyvenv")
            }
        }

        let policy = ExclusionPolicy::default().with_runtime_signature(Arc::new(HasVenvMarker));
        assert!(policy.should_skip_directory(Path::new("env"), "env", Some(&names(&["pyvenv"]))));
        assert!(!policy.should_skip_directory(
            Path::new("env"),
            "env",
            Some(&names(&["bin", "condabin", "conda-meta"]))
        ));
    }

    #[test]
    fn test_empty_marker_list_never_matches() {
        let signature = MarkerSignature::new(Vec::<String>::new());
        assert!(!signature.matches(&names(&["bin"])));
    }

    #[test]
    fn test_include_file() {
        let policy = ExclusionPolicy::default();
        assert!(policy.should_include_file("main.py"));
        assert!(policy.should_include_file("widget.c++"));
        assert!(policy.should_include_file("notebook.ipynb"));
        assert!(!policy.should_include_file("README.md"));
        assert!(!policy.should_include_file("python"));

        let policy = ExclusionPolicy::default().with_extensions(vec![".md".to_string()]);
        assert!(policy.should_include_file("README.md"));
        assert!(!policy.should_include_file("main.py"));
    }
}
