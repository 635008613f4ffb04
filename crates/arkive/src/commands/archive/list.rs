use arkive_core::{
    manager::ArchiveDataManager,
    tree::{ArchiveEntry, ArchiveTree, DirectoryNode},
};
use arkive_ipk::IpkOptions;
use clap::Args;
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::info;

use super::{open, ArchiveTask, Format};

#[derive(Args)]
pub struct ListArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Archive format, detected from the extension when omitted
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Sort by path instead of listing in stored order
    #[arg(long, default_value_t = false)]
    sorted: bool,

    /// Print nested directories instead of full paths
    #[arg(long, default_value_t = false, conflicts_with = "sorted")]
    tree: bool,
}

fn print_node<E: ArchiveEntry>(tree: &ArchiveTree<E>, node: &DirectoryNode, depth: usize) {
    let indent = "  ".repeat(depth);
    for index in &node.directories {
        for entry in tree.directory(*index).map(|d| d.files.as_slice()).unwrap_or_default() {
            println!("{indent}{} {}", entry.name(), entry.size().dimmed());
        }
    }
    for child in node.children.values() {
        println!("{indent}{}", child.name.bold());
        print_node(tree, child, depth + 1);
    }
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        Format::resolve(self.format, &self.file)?.run(self, IpkOptions::default())
    }
}

impl ArchiveTask for ListArgs {
    fn run<M: ArchiveDataManager>(&self, manager: M) -> Result<()> {
        let editor = open(manager, &self.file)?;
        let separator = editor.manager().path_separator();

        if self.tree {
            print_node(editor.tree(), &editor.tree().hierarchy(separator), 0);
            return Ok(());
        }

        let mut files = editor
            .tree()
            .files()
            .map(|(directory, entry)| {
                let prefix = match directory.is_root() {
                    true => String::new(),
                    false => format!("{}{separator}", directory.path),
                };
                (prefix, entry.name(), entry.size())
            })
            .collect_vec();
        if self.sorted {
            files.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        }

        for (prefix, name, size) in &files {
            println!("{:>12} {}{}", size, prefix.dimmed(), name);
        }

        let directories = editor.tree().directories().len() - 1;
        info!(
            files = files.len(),
            directories,
            bytes = files.iter().map(|f| f.2).sum::<u64>(),
            "listed {}",
            self.file.display()
        );
        Ok(())
    }
}
