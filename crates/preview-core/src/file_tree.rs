//! Helpers over the virtual project tree

use crate::error::{PreviewError, Result};
use preview_types::{FileKind, FileNode};
use std::path::Path;
use tracing::debug;

/// Find the manifest file at the top level of a project tree.
///
/// A node matches when its path or its name equals `manifest_name`.
/// Manifests inside folders are not considered: install and launch run in
/// the project root.
pub fn find_manifest<'a>(files: &'a [FileNode], manifest_name: &str) -> Option<&'a FileNode> {
    files
        .iter()
        .find(|node| node.is_file() && (node.path == manifest_name || node.name == manifest_name))
}

/// All file nodes in depth-first order
pub fn walk_files(files: &[FileNode]) -> Vec<&FileNode> {
    let mut out = Vec::new();
    collect_files(files, &mut out);
    out
}

fn collect_files<'a>(files: &'a [FileNode], out: &mut Vec<&'a FileNode>) {
    for node in files {
        match node.kind {
            FileKind::File => out.push(node),
            FileKind::Folder => collect_files(&node.children, out),
        }
    }
}

/// Parse a JSON document holding a list of [`FileNode`]
pub fn load_json(path: &Path) -> Result<Vec<FileNode>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Build a tree from a directory on disk, skipping directories named in `ignore`.
///
/// Entries are sorted by name. Files that are not valid UTF-8 are skipped.
pub fn load_from_dir(root: &Path, ignore: &[String]) -> Result<Vec<FileNode>> {
    if !root.is_dir() {
        return Err(PreviewError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        )));
    }
    read_dir_nodes(root, "", ignore)
}

fn read_dir_nodes(dir: &Path, prefix: &str, ignore: &[String]) -> Result<Vec<FileNode>> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut nodes = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if ignore.iter().any(|i| i == &name) {
                continue;
            }
            let children = read_dir_nodes(&entry.path(), &path, ignore)?;
            nodes.push(FileNode::folder(path, children));
        } else if file_type.is_file() {
            match std::fs::read_to_string(entry.path()) {
                Ok(content) => nodes.push(FileNode::file(path, content)),
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    debug!(path = %path, "Skipping non UTF-8 file");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(nodes)
}

/// Materialise a tree below `root`
pub fn write_to_dir(files: &[FileNode], root: &Path) -> Result<usize> {
    std::fs::create_dir_all(root)?;
    let mut written = 0;
    for node in files {
        if !is_plain_name(&node.name) {
            return Err(PreviewError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("refusing to write entry named {:?}", node.name),
            )));
        }
        let target = root.join(&node.name);
        match node.kind {
            FileKind::Folder => {
                written += write_to_dir(&node.children, &target)?;
            }
            FileKind::File => {
                std::fs::write(&target, node.content.as_deref().unwrap_or_default())?;
                written += 1;
            }
        }
    }
    Ok(written)
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Vec<FileNode> {
        vec![
            FileNode::folder(
                "packages",
                vec![FileNode::folder(
                    "packages/ui",
                    vec![FileNode::file("packages/ui/package.json", "{\"name\": \"ui\"}")],
                )],
            ),
            FileNode::file("index.html", "<div id=\"root\"></div>"),
            FileNode::file("package.json", "{\"name\": \"app\"}"),
        ]
    }

    #[test]
    fn test_find_manifest_uses_top_level_entry() {
        let tree = sample_tree();
        let manifest = find_manifest(&tree, "package.json").unwrap();
        assert_eq!(manifest.path, "package.json");
    }

    #[test]
    fn test_find_manifest_matches_by_name_or_path() {
        let nested_only = vec![FileNode::folder(
            "app",
            vec![FileNode::file("app/package.json", "{}")],
        )];
        assert!(find_manifest(&nested_only, "package.json").is_none());

        let mut by_path = FileNode::file("package.json", "{}");
        by_path.name = "renamed".to_string();
        assert!(find_manifest(&[by_path], "package.json").is_some());
    }

    #[test]
    fn test_find_manifest_ignores_folders_and_missing() {
        let tree = vec![
            FileNode::folder("package.json", vec![]),
            FileNode::file("README.md", "# hi"),
        ];
        assert!(find_manifest(&tree, "package.json").is_none());
    }

    #[test]
    fn test_load_and_write_directory() -> Result<()> {
        let src = tempfile::tempdir()?;
        std::fs::create_dir_all(src.path().join("src"))?;
        std::fs::create_dir_all(src.path().join("node_modules/react"))?;
        std::fs::write(src.path().join("package.json"), "{}")?;
        std::fs::write(src.path().join("src/main.ts"), "console.log(1)")?;
        std::fs::write(src.path().join("node_modules/react/index.js"), "")?;
        std::fs::write(src.path().join("logo.bin"), [0xff, 0xfe, 0x00])?;

        let tree = load_from_dir(src.path(), &["node_modules".to_string()])?;
        let paths: Vec<_> = walk_files(&tree).iter().map(|n| n.path.clone()).collect();
        assert_eq!(paths, vec!["package.json", "src/main.ts"]);

        let dst = tempfile::tempdir()?;
        assert_eq!(write_to_dir(&tree, dst.path())?, 2);
        assert_eq!(
            std::fs::read_to_string(dst.path().join("src/main.ts"))?,
            "console.log(1)"
        );
        Ok(())
    }

    #[test]
    fn test_write_rejects_escaping_names() {
        let dst = tempfile::tempdir().unwrap();
        let mut node = FileNode::file("evil", "x");
        node.name = "..".to_string();
        assert!(write_to_dir(&[node], dst.path()).is_err());
    }
}
