//! Terminal rendering of lineage trees

use colored::Colorize;
use viewlineage_core::{LineageGraph, LineageNode, NodeType};

/// Render `graph` as an indented tree, one object per line
pub fn render_tree(graph: &LineageGraph, color: bool) -> String {
    let mut out = String::new();
    out.push_str(&label(&graph.root, color));
    out.push('\n');
    render_children(&graph.root, "", color, &mut out);
    out
}

fn render_children(node: &LineageNode, prefix: &str, color: bool, out: &mut String) {
    let count = node.sources.len();
    for (i, child) in node.sources.iter().enumerate() {
        let last = i + 1 == count;
        let (branch, indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };

        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&label(child, color));
        out.push('\n');

        render_children(child, &format!("{}{}", prefix, indent), color, out);
    }
}

fn label(node: &LineageNode, color: bool) -> String {
    let kind = format!("[{}]", node.node_type);
    let mut line = if color {
        let name = match node.node_type {
            NodeType::View => node.name.cyan().bold(),
            NodeType::Table => node.name.green(),
            NodeType::Unknown => node.name.yellow(),
            NodeType::Loop | NodeType::MaxDepth | NodeType::Truncated => node.name.dimmed(),
        };
        format!("{} {}", name, kind.dimmed())
    } else {
        format!("{} {}", node.name, kind)
    };

    if let Some(note) = &node.note {
        let note = format!("({})", note);
        line.push(' ');
        line.push_str(&if color { note.dimmed().to_string() } else { note });
    }

    if let Some(error) = &node.error {
        let error = format!("error: {}", error);
        line.push(' ');
        line.push_str(&if color { error.red().to_string() } else { error });
    }

    line
}

/// One-line summary of the nodes in `graph` by type
pub fn summarize(graph: &LineageGraph) -> String {
    let nodes = graph.root.walk();
    let count = |t: NodeType| nodes.iter().filter(|(_, n)| n.node_type == t).count();

    format!(
        "{} views, {} tables, {} unknown, {} loops, {} depth-limited, {} truncated, {} errors",
        count(NodeType::View),
        count(NodeType::Table),
        count(NodeType::Unknown),
        count(NodeType::Loop),
        count(NodeType::MaxDepth),
        count(NodeType::Truncated),
        graph.errors().len(),
    )
}
