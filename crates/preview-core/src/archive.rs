//! Project export as a zip archive

use crate::error::{PreviewError, Result};
use preview_types::{FileKind, FileNode};
use std::io::{Seek, Write};
use std::path::Path;
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

impl From<zip::result::ZipError> for PreviewError {
    fn from(e: zip::result::ZipError) -> Self {
        PreviewError::Archive(e.to_string())
    }
}

/// Write `files` into a zip archive rooted at `project_name/`.
///
/// Returns the number of files stored. Files without content, or with empty
/// content, are left out.
pub fn write_zip<W: Write + Seek>(files: &[FileNode], project_name: &str, writer: W) -> Result<usize> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let root = format!("{}/", project_name.trim_matches('/'));
    zip.add_directory(root.as_str(), options)?;
    let count = add_nodes(&mut zip, files, &root, options)?;
    zip.finish()?;
    Ok(count)
}

fn add_nodes<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    files: &[FileNode],
    prefix: &str,
    options: FileOptions,
) -> Result<usize> {
    let mut count = 0;
    for node in files {
        match node.kind {
            FileKind::File => {
                if let Some(content) = node.non_empty_content() {
                    zip.start_file(format!("{}{}", prefix, node.name), options)?;
                    zip.write_all(content.as_bytes())?;
                    count += 1;
                }
            }
            FileKind::Folder => {
                let folder = format!("{}{}/", prefix, node.name);
                zip.add_directory(folder.as_str(), options)?;
                count += add_nodes(zip, &node.children, &folder, options)?;
            }
        }
    }
    Ok(count)
}

/// Export `files` to `output` as `<project_name>.zip` content
pub fn export_to_file(files: &[FileNode], project_name: &str, output: &Path) -> Result<usize> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(output)?;
    let count = write_zip(files, project_name, file)?;
    info!(output = %output.display(), files = count, "Project archive written");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn test_archive_mirrors_tree_layout_without_empty_files() -> Result<()> {
        let mut no_content = FileNode::file("src/pending.ts", "");
        no_content.content = None;

        let tree = vec![
            FileNode::file("package.json", "{\"name\": \"demo\"}"),
            FileNode::file(".env", ""),
            FileNode::folder(
                "src",
                vec![FileNode::file("src/main.tsx", "render()"), no_content],
            ),
        ];

        let mut buffer = Cursor::new(Vec::new());
        let count = write_zip(&tree, "demo", &mut buffer)?;
        assert_eq!(count, 2);

        let mut archive = zip::ZipArchive::new(Cursor::new(buffer.into_inner()))?;
        let mut names: Vec<_> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["demo/", "demo/package.json", "demo/src/", "demo/src/main.tsx"]
        );

        let mut main = String::new();
        archive.by_name("demo/src/main.tsx")?.read_to_string(&mut main)?;
        assert_eq!(main, "render()");
        Ok(())
    }
}
