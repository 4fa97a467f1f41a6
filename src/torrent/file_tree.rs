use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// One node of a multi-file torrent's directory tree. Children keep the
/// order in which the torrent first mentions them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNode {
    pub kind: NodeKind,
    pub name: String,
    /// File size, or the sum of all leaves below a directory
    pub length: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Directory,
            name: name.into(),
            length: 0,
            children: Vec::new(),
        }
    }

    pub fn file(name: impl Into<String>, length: u64) -> Self {
        Self {
            kind: NodeKind::File,
            name: name.into(),
            length,
            children: Vec::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn child(&self, name: &str) -> Option<&FileNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Insert a file below this directory, creating intermediate
    /// directories on demand.
    pub fn insert(&mut self, path: &[String], length: u64) {
        let Some((first, rest)) = path.split_first() else {
            return;
        };

        self.length += length;

        if rest.is_empty() {
            self.children.push(FileNode::file(first.clone(), length));
            return;
        }

        let pos = match self
            .children
            .iter()
            .position(|c| c.is_dir() && c.name == *first)
        {
            Some(pos) => pos,
            None => {
                self.children.push(FileNode::directory(first.clone()));
                self.children.len() - 1
            }
        };

        self.children[pos].insert(rest, length);
    }

    /// Render the tree with box-drawing indentation, one node per line
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.name);
        self.render_children("", &mut out);
        out
    }

    fn render_children(&self, prefix: &str, out: &mut String) {
        let count = self.children.len();
        for (i, child) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            if child.is_dir() {
                out.push_str(&format!("{}{}{}/\n", prefix, branch, child.name));
            } else {
                out.push_str(&format!(
                    "{}{}{} ({} bytes)\n",
                    prefix, branch, child.name, child.length
                ));
            }
            let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
            child.render_children(&next, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_builds_directories_in_order() {
        let mut root = FileNode::directory("root");
        root.insert(&path(&["b", "one.txt"]), 10);
        root.insert(&path(&["a.txt"]), 5);
        root.insert(&path(&["b", "two.txt"]), 7);

        let names: Vec<_> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["b", "a.txt"]);

        let b = root.child("b").unwrap();
        assert!(b.is_dir());
        assert_eq!(b.length, 17);
        assert_eq!(b.children.len(), 2);
        assert_eq!(root.length, 22);
    }

    #[test]
    fn test_render() {
        let mut root = FileNode::directory("album");
        root.insert(&path(&["cd1", "track.flac"]), 3);
        root.insert(&path(&["cover.jpg"]), 1);

        let rendered = root.render();
        assert!(rendered.starts_with("album\n"));
        assert!(rendered.contains("├── cd1/"));
        assert!(rendered.contains("│   └── track.flac (3 bytes)"));
        assert!(rendered.contains("└── cover.jpg (1 bytes)"));
    }
}
