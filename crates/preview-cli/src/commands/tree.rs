//! Tree command - Show the file tree a session would receive

use super::{load_config, ProjectSource};
use anyhow::Result;
use colored::Colorize;
use preview_core::file_tree;
use preview_types::FileNode;
use std::path::PathBuf;

pub async fn run(path: PathBuf, json: bool) -> Result<()> {
    let source = ProjectSource::from_path(&path)?;
    let (config, _) = load_config(&source)?;
    let files = source.load(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    for node in &files {
        print_node(node, 0);
    }

    let count = file_tree::walk_files(&files).len();
    let manifest = file_tree::find_manifest(&files, &config.manifest_file);
    println!();
    println!("{} files", count);
    match manifest {
        Some(node) => println!("{} {}", "📄 Manifest:".green(), node.effective_path()),
        None => println!("{} no {} found", "⚠️".yellow(), config.manifest_file),
    }
    Ok(())
}

fn print_node(node: &FileNode, depth: usize) {
    let indent = "  ".repeat(depth);
    if node.is_folder() {
        println!("{}{}/", indent, node.name.blue().bold());
        for child in &node.children {
            print_node(child, depth + 1);
        }
    } else {
        println!("{}{}", indent, node.name);
    }
}
