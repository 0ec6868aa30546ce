//! Remote object identifiers and local folder layout
//!
//! Every remote object ends up in its own container folder on the NAS:
//!
//! ```text
//! {nas_root}/{submission_agreement_folder}/{container_name}/{file_name}
//!                                                          /{stem}_metadata.json
//!                                                          /{stem}_manifest.txt
//! ```
//!
//! `container_name` is the file stem with every `.` and space replaced by `_`. Two
//! remote names that only differ in those characters plan to the same container;
//! that collision is accepted and left to the overwrite policy.

use std::path::{Path, PathBuf};

use crate::constants::{MANIFEST_SUFFIX, METADATA_SUFFIX, REMOTE_SIDECAR_NAME};

/// An object in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteObjectRef {
    remote_folder: String,
    relative_path: String,
}

impl RemoteObjectRef {
    /// Create a reference from the remote root (slash-terminated) and a
    /// `"subfolder/filename.ext"` relative path
    pub fn new(remote_folder: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            remote_folder: remote_folder.into(),
            relative_path: relative_path.into(),
        }
    }

    /// Remote root folder
    pub fn remote_folder(&self) -> &str {
        &self.remote_folder
    }

    /// Path relative to the remote root
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Full remote path of the object
    pub fn full_path(&self) -> String {
        format!("{}{}", self.remote_folder, self.relative_path)
    }

    /// Full remote path of the object's parent folder
    pub fn parent_path(&self) -> String {
        let full = self.full_path();
        match full.rsplit_once('/') {
            Some(("", _)) => "/".to_string(),
            Some((parent, _)) => parent.to_string(),
            None => String::new(),
        }
    }

    /// Remote path of the metadata sidecar stored next to the object
    pub fn sidecar_path(&self) -> String {
        format!(
            "{}/{}",
            self.parent_path().trim_end_matches('/'),
            REMOTE_SIDECAR_NAME
        )
    }

    /// Parent folder expressed relative to the remote root
    pub fn submission_agreement_folder(&self) -> String {
        let parent = self.parent_path();
        let root = self.remote_folder.trim_end_matches('/');
        parent
            .strip_prefix(root)
            .unwrap_or(&parent)
            .trim_start_matches('/')
            .to_string()
    }

    /// Final path component (the object's file name)
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map_or(self.relative_path.as_str(), |(_, name)| name)
    }
}

/// Split a file name into stem and extension the way archive tooling does:
/// only the last extension is removed, and a leading dot is not an extension.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(index) if index > 0 && index < file_name.len() - 1 => &file_name[..index],
        _ => file_name,
    }
}

/// Container folder name for a file name: the stem with `.` and ` ` replaced by `_`
pub fn container_name(file_name: &str) -> String {
    file_stem(file_name).replace(['.', ' '], "_")
}

/// The derived local paths for one remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLayout {
    /// The remote object this layout was planned for
    pub remote: RemoteObjectRef,
    /// Remote parent folder relative to the remote root
    pub submission_agreement_folder: String,
    /// Sanitized container folder name
    pub container_name: String,
    /// `{nas_root}/{submission_agreement_folder}`, which must already exist
    pub submission_folder: PathBuf,
    /// `{submission_folder}/{container_name}`
    pub container_dir: PathBuf,
    /// The transferred object
    pub object_path: PathBuf,
    /// Metadata sidecar beside the object
    pub metadata_path: PathBuf,
    /// Checksum manifest beside the object
    pub manifest_path: PathBuf,
}

impl LocalLayout {
    /// File name of the transferred object
    pub fn object_file_name(&self) -> &str {
        self.remote.file_name()
    }
}

/// Maps remote relative paths to local layouts under fixed roots
///
/// Planning is pure string and path manipulation; nothing touches the file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPlanner {
    remote_folder: String,
    local_root: PathBuf,
}

impl PathPlanner {
    /// Create a planner for a remote root (slash-terminated) and a local root
    pub fn new(remote_folder: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            remote_folder: remote_folder.into(),
            local_root: local_root.into(),
        }
    }

    /// Create a planner from the deployment configuration
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.remote_folder.clone(), config.nas_folder.clone())
    }

    /// Remote root folder
    pub fn remote_folder(&self) -> &str {
        &self.remote_folder
    }

    /// Local root folder
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Plan the local layout for a `"subfolder/filename.ext"` relative path
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::path::Path;
    /// use archive_transfer::app::PathPlanner;
    ///
    /// let planner = PathPlanner::new("/foldername/", "/path/to/folder/");
    /// let layout = planner.plan("folder/file name_with.spaces.pdf");
    ///
    /// assert_eq!(layout.container_name, "file_name_with_spaces");
    /// assert_eq!(
    ///     layout.object_path,
    ///     Path::new("/path/to/folder/folder/file_name_with_spaces/file name_with.spaces.pdf")
    /// );
    /// ```
    pub fn plan(&self, relative_path: &str) -> LocalLayout {
        let remote = RemoteObjectRef::new(self.remote_folder.clone(), relative_path);
        let submission_agreement_folder = remote.submission_agreement_folder();

        let file_name = remote.file_name().to_string();
        let stem = file_stem(&file_name).to_string();
        let container_name = container_name(&file_name);

        let submission_folder = self.local_root.join(&submission_agreement_folder);
        let container_dir = submission_folder.join(&container_name);
        let object_path = container_dir.join(&file_name);
        let metadata_path = container_dir.join(format!("{}{}", stem, METADATA_SUFFIX));
        let manifest_path = container_dir.join(format!("{}{}", stem, MANIFEST_SUFFIX));

        LocalLayout {
            remote,
            submission_agreement_folder,
            container_name,
            submission_folder,
            container_dir,
            object_path,
            metadata_path,
            manifest_path,
        }
    }
}

/// Plan a layout without keeping a planner around
pub fn plan(remote_folder: &str, relative_path: &str, local_root: &Path) -> LocalLayout {
    PathPlanner::new(remote_folder, local_root).plan(relative_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaces_layout() -> LocalLayout {
        plan(
            "/foldername/",
            "folder/file name_with.spaces.pdf",
            Path::new("/path/to/folder/"),
        )
    }

    #[test]
    fn test_remote_paths() {
        let remote = RemoteObjectRef::new("/foldername/", "testfolder/testfile.zip");
        assert_eq!(remote.full_path(), "/foldername/testfolder/testfile.zip");
        assert_eq!(remote.parent_path(), "/foldername/testfolder");
        assert_eq!(
            remote.sidecar_path(),
            "/foldername/testfolder/default_metadata.json"
        );
        assert_eq!(remote.submission_agreement_folder(), "testfolder");
        assert_eq!(remote.file_name(), "testfile.zip");
    }

    #[test]
    fn test_container_name_replaces_dots_and_spaces() {
        let layout = spaces_layout();
        assert_eq!(layout.container_name, "file_name_with_spaces");
        assert_eq!(layout.submission_agreement_folder, "folder");
    }

    #[test]
    fn test_layout_paths() {
        let layout = spaces_layout();
        let container = Path::new("/path/to/folder/folder/file_name_with_spaces");

        assert_eq!(layout.submission_folder, Path::new("/path/to/folder/folder"));
        assert_eq!(layout.container_dir, container);
        assert_eq!(
            layout.object_path,
            container.join("file name_with.spaces.pdf")
        );
        assert_eq!(
            layout.metadata_path,
            container.join("file name_with.spaces_metadata.json")
        );
        assert_eq!(
            layout.manifest_path,
            container.join("file name_with.spaces_manifest.txt")
        );
        assert_eq!(layout.object_file_name(), "file name_with.spaces.pdf");
    }

    #[test]
    fn test_windows_style_root() {
        let layout = plan(
            "/foldername/",
            "folder/file name_with.spaces.pdf",
            Path::new("Y:/folder/"),
        );
        assert_eq!(
            layout.container_dir,
            Path::new("Y:/folder/folder/file_name_with_spaces")
        );
    }

    #[test]
    fn test_only_last_extension_is_removed() {
        assert_eq!(file_stem("file.name.exts"), "file.name");
        assert_eq!(container_name("file.name.exts"), "file_name");
        assert_eq!(container_name("report 2024.v2.tar.gz"), "report_2024_v2_tar");
        assert_eq!(file_stem(".hidden"), ".hidden");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem("trailing."), "trailing.");
    }

    #[test]
    fn test_names_differing_in_dots_and_spaces_collide() {
        let planner = PathPlanner::new("/root/", "/nas/");
        let a = planner.plan("folder/a b.pdf");
        let b = planner.plan("folder/a.b.pdf");
        assert_eq!(a.container_dir, b.container_dir);
        assert_ne!(a.object_path, b.object_path);
    }

    #[test]
    fn test_nested_submission_folder() {
        let planner = PathPlanner::new("/root/", "/nas/");
        let layout = planner.plan("agreement/batch/file.txt");
        assert_eq!(layout.submission_agreement_folder, "agreement/batch");
        assert_eq!(layout.container_dir, Path::new("/nas/agreement/batch/file"));
        assert_eq!(
            layout.remote.sidecar_path(),
            "/root/agreement/batch/default_metadata.json"
        );
    }

    #[test]
    fn test_planning_is_deterministic() {
        assert_eq!(spaces_layout(), spaces_layout());
    }
}
