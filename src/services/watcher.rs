//! Post directory watcher and reconciler
//!
//! `PostWatcher` turns OS notifications into typed `FsEvent`s on a channel.
//! `spawn_reconciler` runs the single task that drains that channel (plus
//! an optional periodic full rescan) and applies each event to the `Blog`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

use crate::content::loader::is_post_filename;
use crate::services::blog::Blog;

/// A change to the post directory, by post file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created(String),
    Modified(String),
    Removed(String),
    /// Re-read the whole directory
    Rescan,
}

impl FsEvent {
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Created(name) | Self::Modified(name) | Self::Removed(name) => Some(name),
            Self::Rescan => None,
        }
    }
}

/// Maps one notify event to post events. Paths outside the post directory,
/// nested paths and non-`.md` files are dropped.
pub fn translate(event: &Event, post_dirs: &[PathBuf]) -> Vec<FsEvent> {
    let name_at = |i: usize| event.paths.get(i).and_then(|p| post_filename(p, post_dirs));

    let mapped = match event.kind {
        EventKind::Create(_) => vec![name_at(0).map(FsEvent::Created)],
        EventKind::Remove(_) => vec![name_at(0).map(FsEvent::Removed)],
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            vec![name_at(0).map(FsEvent::Removed)]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            vec![name_at(0).map(FsEvent::Created)]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => vec![
            name_at(0).map(FsEvent::Removed),
            name_at(1).map(FsEvent::Created),
        ],
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => vec![name_at(0).map(FsEvent::Modified)],
        _ => Vec::new(),
    };

    mapped.into_iter().flatten().collect()
}

fn post_filename(path: &Path, post_dirs: &[PathBuf]) -> Option<String> {
    let parent = path.parent()?;
    if !post_dirs.iter().any(|dir| dir == parent) {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    is_post_filename(name).then(|| name.to_string())
}

/// OS watcher on the post directory. Dropping it stops notifications and
/// closes the event channel.
pub struct PostWatcher {
    _watcher: RecommendedWatcher,
}

impl PostWatcher {
    /// Starts watching `post_dir` (non-recursively).
    pub fn start(post_dir: &Path) -> Result<(Self, mpsc::UnboundedReceiver<FsEvent>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut post_dirs = vec![post_dir.to_path_buf()];
        if let Ok(canonical) = post_dir.canonicalize() {
            if canonical != post_dir {
                post_dirs.push(canonical);
            }
        }

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    for fs_event in translate(&event, &post_dirs) {
                        let _ = tx.send(fs_event);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Watcher error"),
            }
        })?;

        watcher.watch(post_dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %post_dir.display(), "Watching post directory");

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Handle to the reconciler task
pub struct ReconcilerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Stops the task after the event in progress, if any, completes.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Reconciler task failed");
        }
    }
}

/// Spawns the reconciler. `rescan_interval` of zero disables the periodic
/// full rescan.
pub fn spawn_reconciler(
    blog: Arc<Blog>,
    events: mpsc::UnboundedReceiver<FsEvent>,
    rescan_interval: Duration,
) -> ReconcilerHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run(blog, events, rescan_interval, shutdown_rx));
    ReconcilerHandle {
        shutdown: Some(shutdown_tx),
        task,
    }
}

async fn run(
    blog: Arc<Blog>,
    mut events: mpsc::UnboundedReceiver<FsEvent>,
    rescan_interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = (!rescan_interval.is_zero())
        .then(|| tokio::time::interval_at(Instant::now() + rescan_interval, rescan_interval));
    let mut events_open = true;

    loop {
        let event = tokio::select! {
            _ = &mut shutdown => break,
            received = events.recv(), if events_open => match received {
                Some(event) => event,
                None => {
                    events_open = false;
                    continue;
                }
            },
            _ = tick(&mut ticker) => FsEvent::Rescan,
        };

        reconcile(&blog, event).await;
    }

    tracing::info!("Reconciler stopped");
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn reconcile(blog: &Arc<Blog>, event: FsEvent) {
    let worker = Arc::clone(blog);
    let label = event.clone();

    match tokio::task::spawn_blocking(move || worker.apply(&event)).await {
        Ok(Ok(())) => tracing::debug!(event = ?label, "Reconciled"),
        Ok(Err(e)) if e.is_not_found() => {
            tracing::debug!(event = ?label, error = %e, "Nothing to reconcile")
        }
        Ok(Err(e)) => tracing::warn!(event = ?label, error = %e, "Dropped filesystem event"),
        Err(e) => tracing::error!(event = ?label, error = %e, "Reconciliation panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::loader::ContentPaths;
    use crate::services::markdown::MarkdownRenderer;
    use crate::services::spam::AkismetChecker;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use tempfile::TempDir;

    fn dirs() -> Vec<PathBuf> {
        vec![PathBuf::from("/blog/posts")]
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_translate_basic_kinds() {
        let created = event(EventKind::Create(CreateKind::File), &["/blog/posts/a.md"]);
        assert_eq!(translate(&created, &dirs()), vec![FsEvent::Created("a.md".into())]);

        let modified = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/blog/posts/a.md"],
        );
        assert_eq!(translate(&modified, &dirs()), vec![FsEvent::Modified("a.md".into())]);

        let removed = event(EventKind::Remove(RemoveKind::File), &["/blog/posts/a.md"]);
        assert_eq!(translate(&removed, &dirs()), vec![FsEvent::Removed("a.md".into())]);

        let touched = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
            &["/blog/posts/a.md"],
        );
        assert!(translate(&touched, &dirs()).is_empty());
    }

    #[test]
    fn test_translate_renames() {
        let both = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/blog/posts/old.md", "/blog/posts/new.md"],
        );
        assert_eq!(
            translate(&both, &dirs()),
            vec![FsEvent::Removed("old.md".into()), FsEvent::Created("new.md".into())]
        );

        let away = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/blog/posts/old.md", "/tmp/old.md"],
        );
        assert_eq!(translate(&away, &dirs()), vec![FsEvent::Removed("old.md".into())]);

        let from = event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/blog/posts/x.md"]);
        assert_eq!(translate(&from, &dirs()), vec![FsEvent::Removed("x.md".into())]);

        let to = event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/blog/posts/x.md"]);
        assert_eq!(translate(&to, &dirs()), vec![FsEvent::Created("x.md".into())]);
    }

    #[test]
    fn test_translate_ignores_other_files() {
        let swap = event(EventKind::Create(CreateKind::File), &["/blog/posts/.a.md.swp"]);
        assert!(translate(&swap, &dirs()).is_empty());

        let nested = event(EventKind::Create(CreateKind::File), &["/blog/posts/drafts/a.md"]);
        assert!(translate(&nested, &dirs()).is_empty());
    }

    #[test]
    fn test_event_filename() {
        assert_eq!(FsEvent::Modified("a.md".into()).filename(), Some("a.md"));
        assert_eq!(FsEvent::Rescan.filename(), None);
    }

    fn blog_in(dir: &TempDir) -> Arc<Blog> {
        let paths = ContentPaths::new(dir.path().join("posts"), dir.path().join("comments"));
        std::fs::create_dir_all(&paths.post_dir).unwrap();
        std::fs::write(paths.post_file("first.md"), "Title: First\nDate: 2020-01-01 00:00:00\n\nx").unwrap();
        let spam = AkismetChecker::new(None, Duration::from_secs(1)).unwrap();
        Arc::new(Blog::open(paths, MarkdownRenderer::new(), Arc::new(spam), "").unwrap())
    }

    async fn wait_for_posts(blog: &Blog, expected: usize) -> bool {
        for _ in 0..100 {
            if blog.snapshot().posts.len() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_reconciler_applies_events_in_order() {
        let dir = TempDir::new().unwrap();
        let blog = blog_in(&dir);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_reconciler(Arc::clone(&blog), rx, Duration::ZERO);

        std::fs::write(
            blog.paths().post_file("second.md"),
            "Title: Second\nDate: 2020-02-01 00:00:00\n\ny",
        )
        .unwrap();
        tx.send(FsEvent::Created("second.md".into())).unwrap();
        tx.send(FsEvent::Modified("missing.md".into())).unwrap();
        assert!(wait_for_posts(&blog, 2).await);

        tx.send(FsEvent::Removed("first.md".into())).unwrap();
        assert!(wait_for_posts(&blog, 1).await);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_periodic_rescan_picks_up_files() {
        let dir = TempDir::new().unwrap();
        let blog = blog_in(&dir);
        let (_tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_reconciler(Arc::clone(&blog), rx, Duration::from_millis(50));

        std::fs::write(blog.paths().post_file("later.md"), "Title: Later\n\nz").unwrap();
        assert!(wait_for_posts(&blog, 2).await);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconciler_survives_closed_channel() {
        let dir = TempDir::new().unwrap();
        let blog = blog_in(&dir);
        let (tx, rx) = mpsc::unbounded_channel::<FsEvent>();
        drop(tx);
        let handle = spawn_reconciler(Arc::clone(&blog), rx, Duration::from_millis(50));

        std::fs::write(blog.paths().post_file("late.md"), "Title: Late\n\nz").unwrap();
        assert!(wait_for_posts(&blog, 2).await);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_watcher_reports_new_post() {
        let dir = TempDir::new().unwrap();
        let post_dir = dir.path().join("posts");
        std::fs::create_dir_all(&post_dir).unwrap();

        let (_watcher, mut rx) = PostWatcher::start(&post_dir).unwrap();
        std::fs::write(post_dir.join("fresh.md"), "Title: Fresh\n\nx").unwrap();
        std::fs::write(post_dir.join("ignored.txt"), "x").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.filename(), Some("fresh.md"));
    }
}
