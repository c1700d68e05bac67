//! Path mapping between the sandbox workspace and the host.

use std::path::{Component, Path, PathBuf};

/// Maps paths between the sandbox workspace and a host directory.
///
/// Actions name files relative to the sandbox workdir (or absolutely inside
/// it). Runtimes backed by a real directory use [`PathMapper::to_host`] to find
/// where those files live.
///
/// ```
/// use boltbench_sandbox::PathMapper;
/// use std::path::PathBuf;
///
/// let mapper = PathMapper::new("/tmp/checkout", "/home/project");
///
/// assert_eq!(mapper.resolve("src/main.ts"), PathBuf::from("/home/project/src/main.ts"));
/// assert_eq!(
///     mapper.to_host("/home/project/src/main.ts"),
///     Some(PathBuf::from("/tmp/checkout/src/main.ts"))
/// );
/// assert_eq!(mapper.to_host("/etc/passwd"), None);
/// ```
#[derive(Debug, Clone)]
pub struct PathMapper {
    host_root: PathBuf,
    sandbox_root: PathBuf,
}

impl PathMapper {
    pub fn new(host_root: impl Into<PathBuf>, sandbox_root: impl Into<PathBuf>) -> Self {
        Self {
            host_root: host_root.into(),
            sandbox_root: normalize(&sandbox_root.into()),
        }
    }

    /// Identity mapping, for runtimes without a separate host directory.
    pub fn identity(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::new(root.clone(), root)
    }

    pub fn host_root(&self) -> &Path {
        &self.host_root
    }

    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// Resolve an action path to an absolute sandbox path.
    ///
    /// Relative paths are joined onto the sandbox root; `.` and `..` are
    /// folded lexically.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.sandbox_root.join(path))
        }
    }

    /// Convert a sandbox path to a host path.
    ///
    /// Returns `None` if the resolved path is not under the sandbox root.
    pub fn to_host(&self, sandbox_path: impl AsRef<Path>) -> Option<PathBuf> {
        let resolved = self.resolve(sandbox_path);
        resolved
            .strip_prefix(&self.sandbox_root)
            .ok()
            .map(|relative| self.host_root.join(relative))
    }
}

/// Lexically normalize a path. `..` never climbs above the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> PathMapper {
        PathMapper::new("/tmp/host", "/home/project")
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let m = mapper();
        assert_eq!(m.resolve("package.json"), PathBuf::from("/home/project/package.json"));
        assert_eq!(m.resolve("./src/../index.js"), PathBuf::from("/home/project/index.js"));
        assert_eq!(m.resolve("/home/project/a/b"), PathBuf::from("/home/project/a/b"));
    }

    #[test]
    fn test_to_host_rejects_escape() {
        let m = mapper();
        assert_eq!(m.to_host("../../etc/passwd"), None);
        assert_eq!(m.to_host("/usr/bin/env"), None);
        assert_eq!(m.to_host("src/x.ts"), Some(PathBuf::from("/tmp/host/src/x.ts")));
    }

    #[test]
    fn test_identity_mapping() {
        let m = PathMapper::identity("/home/project");
        assert_eq!(m.to_host("a.txt"), Some(PathBuf::from("/home/project/a.txt")));
    }
}
