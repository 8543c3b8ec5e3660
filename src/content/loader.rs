//! Post and comment file loading
//!
//! Posts are `*.md` files directly inside the post directory. Comments for
//! `name.md` are `*.md` files inside `<comment root>/name/`. All reads here
//! are blocking and happen before any snapshot lock is taken.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::content::header::split_document;
use crate::models::{Comment, Post};
use crate::services::blog::BlogError;
use crate::services::markdown::MarkdownRenderer;

/// Where post and comment files live
#[derive(Debug, Clone)]
pub struct ContentPaths {
    pub post_dir: PathBuf,
    pub comment_dir: PathBuf,
}

impl ContentPaths {
    pub fn new(post_dir: impl Into<PathBuf>, comment_dir: impl Into<PathBuf>) -> Self {
        Self {
            post_dir: post_dir.into(),
            comment_dir: comment_dir.into(),
        }
    }

    pub fn post_file(&self, filename: &str) -> PathBuf {
        self.post_dir.join(filename)
    }

    /// Comment directory for the post stored in `filename`
    pub fn comments_of(&self, filename: &str) -> PathBuf {
        let stem = filename.strip_suffix(".md").unwrap_or(filename);
        self.comment_dir.join(stem)
    }
}

/// True for names ending in `.md` with a non-empty stem.
pub fn is_post_filename(filename: &str) -> bool {
    filename.len() > 3 && filename.ends_with(".md")
}

/// Reads and parses one post with its comments.
pub fn load_post(
    paths: &ContentPaths,
    filename: &str,
    renderer: &MarkdownRenderer,
) -> Result<Post, BlogError> {
    if !is_post_filename(filename) {
        return Err(BlogError::InvalidFile(filename.to_string()));
    }

    let path = paths.post_file(filename);
    let raw = read_text(&path)?;
    let mut post = Post::from_document(filename, split_document(&raw), renderer);
    post.comments = load_comments(&paths.comments_of(filename), renderer)?;
    Ok(post)
}

/// Loads every comment in `dir`, oldest first. A missing directory means no
/// comments; any other read failure fails the whole load.
pub fn load_comments(dir: &Path, renderer: &MarkdownRenderer) -> Result<Vec<Comment>, BlogError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BlogError::io(dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BlogError::io(dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| BlogError::io(&entry.path(), e))?
            .is_file();
        if !is_file {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            if is_post_filename(&name) {
                names.push(name);
            }
        }
    }
    names.sort();

    let mut comments = names
        .iter()
        .map(|name| {
            let raw = read_text(&dir.join(name))?;
            Ok(Comment::from_document(split_document(&raw), renderer))
        })
        .collect::<Result<Vec<Comment>, BlogError>>()?;
    comments.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(comments)
}

/// Names of every post file in the post directory, sorted.
pub fn list_post_files(post_dir: &Path) -> Result<Vec<String>, BlogError> {
    let entries = std::fs::read_dir(post_dir).map_err(|e| BlogError::io(post_dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BlogError::io(post_dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| BlogError::io(&entry.path(), e))?
            .is_file();
        if !is_file {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            if is_post_filename(&name) {
                names.push(name);
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Loads every post in filename order. The first failure aborts the scan.
pub fn load_all_posts(
    paths: &ContentPaths,
    renderer: &MarkdownRenderer,
) -> Result<Vec<Post>, BlogError> {
    list_post_files(&paths.post_dir)?
        .iter()
        .map(|name| load_post(paths, name, renderer))
        .collect()
}

fn read_text(path: &Path) -> Result<String, BlogError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => BlogError::NotFound(path.display().to_string()),
        ErrorKind::InvalidData => BlogError::Parse {
            path: path.to_path_buf(),
            message: "file is not valid UTF-8".to_string(),
        },
        _ => BlogError::io(path, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ContentPaths) {
        let dir = TempDir::new().unwrap();
        let paths = ContentPaths::new(dir.path().join("posts"), dir.path().join("comments"));
        std::fs::create_dir_all(&paths.post_dir).unwrap();
        std::fs::create_dir_all(&paths.comment_dir).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_is_post_filename() {
        assert!(is_post_filename("hello.md"));
        assert!(!is_post_filename(".md"));
        assert!(!is_post_filename("hello.txt"));
        assert!(!is_post_filename("hello.md.swp"));
    }

    #[test]
    fn test_load_post_with_comments() {
        let (_dir, paths) = setup();
        std::fs::write(
            paths.post_file("first.md"),
            "Title: First\nDate: 2020-01-01 00:00:00\n\nHello",
        )
        .unwrap();
        let comment_dir = paths.comments_of("first.md");
        std::fs::create_dir_all(&comment_dir).unwrap();
        std::fs::write(
            comment_dir.join("2020-01-03_00-00-00.md"),
            "Author: Late\nDate: 2020-01-03 00:00:00\n\nsecond",
        )
        .unwrap();
        std::fs::write(
            comment_dir.join("2020-01-02_00-00-00.md"),
            "Author: Early\nDate: 2020-01-02 00:00:00\n\nfirst",
        )
        .unwrap();
        std::fs::write(comment_dir.join("notes.txt"), "ignored").unwrap();

        let post = load_post(&paths, "first.md", &MarkdownRenderer::new()).unwrap();
        assert_eq!(post.title, "First");
        let authors: Vec<_> = post.comments.iter().map(|c| c.author.as_str()).collect();
        assert_eq!(authors, vec!["Early", "Late"]);
    }

    #[test]
    fn test_missing_comment_dir_means_no_comments() {
        let (_dir, paths) = setup();
        std::fs::write(paths.post_file("lonely.md"), "Title: Lonely\n\nx").unwrap();

        let post = load_post(&paths, "lonely.md", &MarkdownRenderer::new()).unwrap();
        assert!(post.comments.is_empty());
    }

    #[test]
    fn test_unreadable_comment_fails_the_post() {
        let (_dir, paths) = setup();
        std::fs::write(paths.post_file("first.md"), "Title: First\n\nbody").unwrap();
        let comment_dir = paths.comments_of("first.md");
        std::fs::create_dir_all(&comment_dir).unwrap();
        std::fs::write(
            comment_dir.join("2020-01-02_00-00-00.md"),
            "Author: Fine\nDate: 2020-01-02 00:00:00\n\nok",
        )
        .unwrap();
        std::fs::write(comment_dir.join("2020-01-03_00-00-00.md"), [0xff, 0xfe]).unwrap();

        let err = load_post(&paths, "first.md", &MarkdownRenderer::new()).unwrap_err();
        assert!(matches!(err, BlogError::Parse { .. }));
        assert!(load_all_posts(&paths, &MarkdownRenderer::new()).is_err());
    }

    #[test]
    fn test_missing_post_is_not_found() {
        let (_dir, paths) = setup();
        let err = load_post(&paths, "ghost.md", &MarkdownRenderer::new()).unwrap_err();
        assert!(matches!(err, BlogError::NotFound(_)));
    }

    #[test]
    fn test_invalid_utf8_is_parse_failure() {
        let (_dir, paths) = setup();
        std::fs::write(paths.post_file("bad.md"), [0xff, 0xfe, 0x00]).unwrap();
        let err = load_post(&paths, "bad.md", &MarkdownRenderer::new()).unwrap_err();
        assert!(matches!(err, BlogError::Parse { .. }));
    }

    #[test]
    fn test_list_skips_non_posts() {
        let (_dir, paths) = setup();
        std::fs::write(paths.post_file("b.md"), "x").unwrap();
        std::fs::write(paths.post_file("a.md"), "x").unwrap();
        std::fs::write(paths.post_file("readme.txt"), "x").unwrap();
        std::fs::create_dir_all(paths.post_file("nested.md")).unwrap();

        assert_eq!(list_post_files(&paths.post_dir).unwrap(), vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_load_all_fails_on_unreadable_post() {
        let (_dir, paths) = setup();
        std::fs::write(paths.post_file("good.md"), "Title: Good\n\nx").unwrap();
        std::fs::write(paths.post_file("bad.md"), [0xff, 0xfe]).unwrap();

        assert!(load_all_posts(&paths, &MarkdownRenderer::new()).is_err());
    }

    #[test]
    fn test_missing_post_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let paths = ContentPaths::new(dir.path().join("nope"), dir.path().join("c"));
        let err = load_all_posts(&paths, &MarkdownRenderer::new()).unwrap_err();
        assert!(matches!(err, BlogError::Io { .. }));
    }
}
