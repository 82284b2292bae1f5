use std::collections::VecDeque;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TrackRequest;

pub mod chromium_library;

/// One node of the bookmark tree. A tree has exactly one root; folder names
/// need not be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkNode {
    Folder {
        name: String,
        children: Vec<BookmarkNode>,
    },
    Link {
        title: String,
        url: String,
    },
}

/// Which of the browser's bookmark roots the folder locator searches under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkRoot {
    #[default]
    BookmarkBar,
    Other,
    Synced,
}

/// Locates the music folder either by name or by its zero-based position
/// among the folders below the configured root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderLocator {
    Name(String),
    Position(usize),
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("cannot read bookmark file: {0}")]
    Io(#[from] std::io::Error),
    #[error("bookmark file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("bookmark file has no \"{0}\" root")]
    MissingRoot(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("no folder named \"{0}\" under the configured bookmark root")]
    NameNotFound(String),
    #[error("no folder at position {0} under the configured bookmark root")]
    PositionNotFound(usize),
}

pub trait Library {
    fn get_tree(&self, path: &Path, root: BookmarkRoot) -> Result<BookmarkNode, LibraryError>;
}

/// Find the folder selected by `locator` and return its Link children as
/// [`TrackRequest`]s, in child order.
///
/// Folders are enumerated breadth-first below `root` (the root itself is not
/// a candidate); a name shared by several folders resolves to the first one
/// encountered, and ordinal lookup indexes the same enumeration 0-based. The
/// traversal is iterative, so deeply nested trees cannot overflow the stack.
pub fn locate_folder(
    root: &BookmarkNode,
    locator: &FolderLocator,
) -> Result<Vec<TrackRequest>, LocateError> {
    let mut queue: VecDeque<&BookmarkNode> = VecDeque::new();
    let mut ordinal = 0;

    queue.push_back(root);

    while let Some(node) = queue.pop_front() {
        if let BookmarkNode::Folder { children, .. } = node {
            for child in children {
                if let BookmarkNode::Folder { name, .. } = child {
                    let matched = match locator {
                        FolderLocator::Name(wanted) => wanted == name,
                        FolderLocator::Position(position) => *position == ordinal,
                    };

                    if matched {
                        return Ok(link_children(child));
                    }

                    ordinal += 1;
                    queue.push_back(child);
                }
            }
        }
    }

    Err(match locator {
        FolderLocator::Name(name) => LocateError::NameNotFound(name.clone()),
        FolderLocator::Position(position) => LocateError::PositionNotFound(*position),
    })
}

fn link_children(folder: &BookmarkNode) -> Vec<TrackRequest> {
    let mut requests = vec![];

    if let BookmarkNode::Folder { children, .. } = folder {
        for child in children {
            if let BookmarkNode::Link { title, url } = child {
                requests.push(TrackRequest {
                    source_url: url.clone(),
                    raw_title: title.clone(),
                });
            }
        }
    }

    requests
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(title: &str) -> BookmarkNode {
        BookmarkNode::Link {
            title: title.to_string(),
            url: format!("https://youtube.com/watch?v={}", title),
        }
    }

    fn folder(name: &str, children: Vec<BookmarkNode>) -> BookmarkNode {
        BookmarkNode::Folder {
            name: name.to_string(),
            children,
        }
    }

    fn bar_root() -> BookmarkNode {
        folder(
            "Bookmarks bar",
            vec![
                folder("Bar", vec![link("b1"), link("b2")]),
                folder("Music", vec![link("m1")]),
                folder("Other", vec![]),
            ],
        )
    }

    #[test]
    fn it_finds_a_folder_by_name() {
        let requests =
            locate_folder(&bar_root(), &FolderLocator::Name("Music".to_string())).unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].raw_title, "m1");
    }

    #[test]
    fn it_finds_a_folder_by_position() {
        let root = bar_root();

        let first = locate_folder(&root, &FolderLocator::Position(0)).unwrap();
        let second = locate_folder(&root, &FolderLocator::Position(1)).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].raw_title, "b1");
        assert_eq!(second[0].raw_title, "m1");
    }

    #[test]
    fn it_preserves_link_order() {
        let requests = locate_folder(&bar_root(), &FolderLocator::Position(0)).unwrap();

        let titles: Vec<&str> = requests.iter().map(|r| r.raw_title.as_str()).collect();
        assert_eq!(titles, vec!["b1", "b2"]);
    }

    #[test]
    fn it_enumerates_folders_breadth_first() {
        let root = folder(
            "root",
            vec![
                folder("a", vec![folder("nested", vec![link("deep")])]),
                folder("b", vec![link("shallow")]),
            ],
        );

        // BFS order is a, b, nested: siblings come before children.
        let at_two = locate_folder(&root, &FolderLocator::Position(2)).unwrap();

        assert_eq!(at_two[0].raw_title, "deep");
    }

    #[test]
    fn it_breaks_name_ties_to_the_first_encountered() {
        let root = folder(
            "root",
            vec![
                folder("dup", vec![link("first")]),
                folder("dup", vec![link("second")]),
            ],
        );

        let requests = locate_folder(&root, &FolderLocator::Name("dup".to_string())).unwrap();

        assert_eq!(requests[0].raw_title, "first");
    }

    #[test]
    fn it_skips_links_when_counting_positions() {
        let root = folder("root", vec![link("stray"), folder("a", vec![link("inside")])]);

        let requests = locate_folder(&root, &FolderLocator::Position(0)).unwrap();

        assert_eq!(requests[0].raw_title, "inside");
    }

    #[test]
    fn it_ignores_nested_folders_when_collecting_links() {
        let root = folder(
            "root",
            vec![folder(
                "mixed",
                vec![link("one"), folder("sub", vec![link("hidden")]), link("two")],
            )],
        );

        let requests = locate_folder(&root, &FolderLocator::Name("mixed".to_string())).unwrap();

        let titles: Vec<&str> = requests.iter().map(|r| r.raw_title.as_str()).collect();
        assert_eq!(titles, vec!["one", "two"]);
    }

    #[test]
    fn it_fails_on_a_missing_name() {
        let result = locate_folder(&bar_root(), &FolderLocator::Name("Podcasts".to_string()));

        assert_eq!(result, Err(LocateError::NameNotFound("Podcasts".to_string())));
    }

    #[test]
    fn it_fails_on_an_out_of_range_position() {
        let result = locate_folder(&bar_root(), &FolderLocator::Position(3));

        assert_eq!(result, Err(LocateError::PositionNotFound(3)));
    }
}
