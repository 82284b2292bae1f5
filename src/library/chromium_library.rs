use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{BookmarkNode, BookmarkRoot, Library, LibraryError};

/// Reads Chromium's JSON `Bookmarks` export.
pub struct ChromiumLibrary;

impl Library for ChromiumLibrary {
    fn get_tree(&self, path: &Path, root: BookmarkRoot) -> Result<BookmarkNode, LibraryError> {
        let data = fs::read_to_string(path)?;

        parse_bookmarks(&data, root)
    }
}

pub fn parse_bookmarks(data: &str, root: BookmarkRoot) -> Result<BookmarkNode, LibraryError> {
    let file: ChromiumBookmarkCore = serde_json::from_str(data)?;

    let (entry, key) = match root {
        BookmarkRoot::BookmarkBar => (file.roots.bookmark_bar, "bookmark_bar"),
        BookmarkRoot::Other => (file.roots.other, "other"),
        BookmarkRoot::Synced => (file.roots.synced, "synced"),
    };

    entry
        .map(to_node)
        .ok_or(LibraryError::MissingRoot(key))
}

fn to_node(entry: ChromiumBookmark) -> BookmarkNode {
    if let Some(url) = entry.url {
        BookmarkNode::Link {
            title: entry.name,
            url,
        }
    } else {
        BookmarkNode::Folder {
            name: entry.name,
            children: entry
                .children
                .unwrap_or_default()
                .into_iter()
                .map(to_node)
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct ChromiumBookmarkCore {
    roots: ChromiumBookmarkRoots,
}

#[derive(Deserialize)]
struct ChromiumBookmarkRoots {
    bookmark_bar: Option<ChromiumBookmark>,
    other: Option<ChromiumBookmark>,
    synced: Option<ChromiumBookmark>,
}

#[derive(Deserialize)]
struct ChromiumBookmark {
    name: String,
    url: Option<String>,
    children: Option<Vec<ChromiumBookmark>>,
}
