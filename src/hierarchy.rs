use crate::bvh::{Bvh, Node};

pub const HEADER_LABELS: [&str; 3] = ["Name", "Offset", "Channels"];
const INDENT: usize = 2;

/// Display mirror of one BVH node.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeItem {
    pub name: String,
    pub offset: String,
    pub channels: String,
    pub children: Vec<TreeItem>,
}

impl TreeItem {
    fn from_node(node: &Node) -> Self {
        let children = node
            .children
            .iter()
            .filter(|child| !child.name.is_empty())
            .map(TreeItem::from_node)
            .collect();

        Self {
            name: node.name.clone(),
            offset: format_offset(&node.offset),
            channels: format_channels(node),
            children,
        }
    }

    pub fn columns(&self) -> [&str; 3] {
        [self.name.as_str(), self.offset.as_str(), self.channels.as_str()]
    }

    fn flatten<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a TreeItem)>) {
        out.push((depth, self));
        for child in &self.children {
            child.flatten(depth + 1, out);
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HierarchyTree {
    items: Vec<TreeItem>,
}

impl HierarchyTree {
    pub fn build(bvh: &Bvh) -> Self {
        Self {
            items: vec![TreeItem::from_node(&bvh.root)],
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every item, fully expanded, with its depth.
    pub fn rows(&self) -> Vec<(usize, &TreeItem)> {
        let mut out = Vec::new();
        for item in &self.items {
            item.flatten(0, &mut out);
        }
        out
    }

    /// Widest content per column in characters, header and indentation included.
    pub fn column_widths(&self) -> [usize; 3] {
        let mut widths = HEADER_LABELS.map(|label| label.chars().count());
        for (depth, item) in self.rows() {
            for (column, text) in item.columns().iter().enumerate() {
                let indent = if column == 0 { depth * INDENT } else { 0 };
                widths[column] = widths[column].max(indent + text.chars().count());
            }
        }
        widths
    }

    pub fn indent_width() -> usize {
        INDENT
    }
}

fn format_offset(offset: &[f32; 3]) -> String {
    format!("({:?}, {:?}, {:?})", offset[0], offset[1], offset[2])
}

fn format_channels(node: &Node) -> String {
    let names: Vec<&str> = node.channels.iter().map(|c| c.as_str()).collect();
    format!("[{}]", names.join(", "))
}
