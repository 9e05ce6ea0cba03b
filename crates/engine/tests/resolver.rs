//! Resolver behavior against an in-memory history

use anchor_cache::MemoryStore;
use anchor_core::Location;
use anchor_engine::{
    EngineConfig, MarkerRequest, NotLocatedReason, ReferenceLocation, ResolveRequest, Resolver, UncommittedLocation,
};
use anchor_git::{BlameLine, BlameOptions, GitError, LineRange, Result, VersionControlRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const C1: &str = "1111111111111111111111111111111111111111";
const C2: &str = "2222222222222222222222222222222222222222";
const C3: &str = "3333333333333333333333333333333333333333";
const C4: &str = "4444444444444444444444444444444444444444";
const GONE: &str = "dddddddddddddddddddddddddddddddddddddddd";

const STREAM: &str = "stream-1";
const ROOT: &str = "/repo";

/// Three lines inserted before line 5 of foo.rs
const C1_TO_C2: &str = "diff --git a/foo.rs b/foo.rs
index 1111111..2222222 100644
--- a/foo.rs
+++ b/foo.rs
@@ -4,0 +5,3 @@
+one
+two
+three
";

/// The reverse of `C1_TO_C2`
const C2_TO_C1: &str = "@@ -5,3 +4,0 @@
-one
-two
-three
";

/// Lines 8 to 12 removed
const C4_TO_C2: &str = "@@ -8,5 +7,0 @@
-a
-b
-c
-d
-e
";

#[derive(Default)]
struct FakeHistory {
    head: Mutex<Option<String>>,
    files: HashMap<(String, String), String>,
    diffs: HashMap<(String, String), String>,
    diff_calls: AtomicUsize,
    read_calls: AtomicUsize,
    diffs_time_out: AtomicBool,
}

impl FakeHistory {
    fn knows(&self, revision: &str) -> bool {
        self.diffs.keys().any(|(a, b)| a == revision || b == revision)
            || self.files.keys().any(|(rev, _)| rev == revision)
    }

    fn set_head(&self, head: &str) {
        *self.head.lock() = Some(head.to_string());
    }
}

#[async_trait]
impl VersionControlRunner for FakeHistory {
    async fn read_file_at_revision(&self, _: &Path, path: &str, revision: &str) -> Result<String> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if !self.knows(revision) {
            return Err(GitError::RevisionNotFound {
                revision: revision.to_string(),
            });
        }
        self.files
            .get(&(revision.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| GitError::PathNotTracked { path: path.to_string() })
    }

    async fn blame(&self, _: &Path, _: &str, _: &BlameOptions) -> Result<Vec<BlameLine>> {
        Ok(vec![BlameLine {
            line: 1,
            commit: C1.to_string(),
            author_email: "a@x.com".to_string(),
        }])
    }

    async fn diff_revisions(&self, _: &Path, old: &str, new: &str, _: &str) -> Result<String> {
        self.diff_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        if self.diffs_time_out.load(Ordering::SeqCst) {
            return Err(GitError::Timeout {
                command: "diff".to_string(),
                timeout_ms: 10,
            });
        }
        for revision in [old, new] {
            if !self.knows(revision) {
                return Err(GitError::RevisionNotFound {
                    revision: revision.to_string(),
                });
            }
        }
        Ok(self
            .diffs
            .get(&(old.to_string(), new.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn current_revision(&self, _: &Path) -> Result<String> {
        self.head.lock().clone().ok_or_else(|| GitError::Failed {
            command: "rev-parse".to_string(),
            stderr: "fatal: not a git repository".to_string(),
        })
    }

    async fn list_submodules(&self, _: &Path) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

fn numbered(count: u32) -> String {
    (1..=count).map(|i| format!("line {}\n", i)).collect()
}

fn history() -> Arc<FakeHistory> {
    let mut history = FakeHistory::default();
    history.diffs.insert((C1.to_string(), C2.to_string()), C1_TO_C2.to_string());
    history.diffs.insert((C2.to_string(), C1.to_string()), C2_TO_C1.to_string());
    history.diffs.insert((C2.to_string(), C3.to_string()), String::new());
    history.diffs.insert((C4.to_string(), C2.to_string()), C4_TO_C2.to_string());
    history.files.insert((C2.to_string(), "foo.rs".to_string()), numbered(20));
    history.set_head(C2);
    Arc::new(history)
}

fn resolver(history: &Arc<FakeHistory>) -> Resolver {
    Resolver::new(
        ROOT,
        Arc::clone(history) as Arc<dyn VersionControlRunner>,
        Arc::new(MemoryStore::new()),
        &EngineConfig::default(),
    )
}

fn reference(commit: &str, location: Location, canonical: bool) -> ReferenceLocation {
    ReferenceLocation {
        commit: commit.to_string(),
        location,
        canonical,
        backtracked: false,
    }
}

fn request(marker: &str, references: Vec<ReferenceLocation>) -> ResolveRequest {
    ResolveRequest {
        file: PathBuf::from("foo.rs"),
        stream: STREAM.to_string(),
        marker: marker.to_string(),
        references,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_resolves_through_insertion() {
    let history = history();
    let resolver = resolver(&history);

    let result = resolver
        .resolve(&request("m1", vec![reference(C1, Location::new(10, 1, 12, 5), true)]))
        .await;

    assert!(result.is_located());
    assert_eq!(result.location, Location::new(13, 1, 15, 5));
    assert_eq!(result.head.as_deref(), Some(C2));
    assert!(!result.dirty);
    assert!(!result.meta.is_ambiguous());

    let cached = resolver.location_cache().committed(C2, STREAM, "m1").unwrap();
    assert_eq!(cached.map(|p| p.location), Some(Location::new(13, 1, 15, 5)));
}

#[tokio::test]
async fn test_cached_location_is_reused() {
    let history = history();
    let resolver = resolver(&history);
    let req = request("m1", vec![reference(C1, Location::new(10, 1, 12, 5), true)]);

    resolver.resolve(&req).await;
    resolver.delta_cache().clear();
    let again = resolver.resolve(&req).await;

    assert_eq!(again.location, Location::new(13, 1, 15, 5));
    assert_eq!(history.diff_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_location_keeps_deletion_flags() {
    let history = history();
    let resolver = resolver(&history);
    let req = request("m1", vec![reference(C4, Location::new(10, 1, 10, 20), true)]);

    let first = resolver.resolve(&req).await;
    assert!(first.is_located());
    assert!(first.meta.start_was_deleted && first.meta.end_was_deleted);

    let second = resolver.resolve(&req).await;
    assert_eq!(second.location, first.location);
    assert_eq!(second.meta, first.meta);
    assert_eq!(history.diff_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_git_timeout_is_git_failure() {
    let history = history();
    history.diffs_time_out.store(true, Ordering::SeqCst);
    let resolver = resolver(&history);

    let result = resolver
        .resolve(&request("m1", vec![reference(C1, Location::lines(2, 3), true)]))
        .await;

    assert!(!result.is_located());
    assert_eq!(result.head.as_deref(), Some(C2));
    assert_eq!(result.not_located.map(|n| n.reason), Some(NotLocatedReason::GitFailure));
    assert_eq!(resolver.location_cache().committed(C2, STREAM, "m1").unwrap(), None);
}

#[tokio::test]
async fn test_falls_back_to_next_reference() {
    let history = history();
    let resolver = resolver(&history);

    let result = resolver
        .resolve(&request(
            "m1",
            vec![
                reference(C1, Location::lines(2, 3), false),
                reference(GONE, Location::lines(40, 41), true),
            ],
        ))
        .await;

    assert!(result.is_located());
    assert_eq!(result.location, Location::lines(2, 3));
}

#[tokio::test]
async fn test_missing_commit_is_unplaceable() {
    let history = history();
    let resolver = resolver(&history);

    let result = resolver
        .resolve(&request("m1", vec![reference(GONE, Location::lines(4, 6), true)]))
        .await;

    assert!(!result.is_located());
    assert!(result.location.is_empty_file());
    assert!(result.meta.start_was_deleted && result.meta.end_was_deleted);
    assert_eq!(
        result.not_located.map(|n| n.reason),
        Some(NotLocatedReason::MissingOriginalCommit)
    );
    assert_eq!(resolver.location_cache().committed(C2, STREAM, "m1").unwrap(), None);
}

#[tokio::test]
async fn test_unreadable_head_is_git_failure() {
    let history = history();
    *history.head.lock() = None;
    let resolver = resolver(&history);

    let result = resolver
        .resolve(&request("m1", vec![reference(C1, Location::lines(1, 1), true)]))
        .await;

    assert_eq!(result.head, None);
    assert_eq!(result.not_located.map(|n| n.reason), Some(NotLocatedReason::GitFailure));
}

#[tokio::test]
async fn test_dirty_buffer_is_not_committed() {
    let history = history();
    let resolver = resolver(&history);
    let buffer = format!("new a\nnew b\n{}", numbered(20));

    let mut req = request("m1", vec![reference(C2, Location::new(10, 1, 12, 4), true)]);
    req.buffer = Some(buffer);
    let result = resolver.resolve(&req).await;

    assert!(result.dirty);
    assert_eq!(result.location, Location::new(12, 1, 14, 4));

    let entry = resolver.location_cache().get(C2, STREAM).unwrap().unwrap();
    assert_eq!(entry.locations.get("m1").map(|p| p.location), Some(Location::new(10, 1, 12, 4)));
    assert_eq!(entry.dirty.get("m1"), Some(&Location::new(12, 1, 14, 4)));
}

#[tokio::test]
async fn test_head_change_invalidates_dirty() {
    let history = history();
    let resolver = resolver(&history);

    let mut req = request("m1", vec![reference(C2, Location::lines(3, 4), true)]);
    req.buffer = Some(format!("top\n{}", numbered(20)));
    resolver.resolve(&req).await;
    assert!(!resolver.location_cache().get(C2, STREAM).unwrap().unwrap().dirty.is_empty());

    history.set_head(C3);
    req.buffer = None;
    let moved = resolver.resolve(&req).await;

    assert_eq!(moved.head.as_deref(), Some(C3));
    let old_entry = resolver.location_cache().get(C2, STREAM).unwrap().unwrap();
    assert!(old_entry.dirty.is_empty());
}

#[tokio::test]
async fn test_buffer_reload_invalidates_dirty() {
    let history = history();
    let resolver = resolver(&history);

    let mut req = request("m1", vec![reference(C2, Location::lines(3, 4), true)]);
    req.buffer = Some(format!("top\n{}", numbered(20)));
    resolver.resolve(&req).await;

    resolver.on_buffer_reloaded(STREAM);
    let entry = resolver.location_cache().get(C2, STREAM).unwrap().unwrap();
    assert!(entry.dirty.is_empty());
    assert_eq!(entry.locations.len(), 1);
}

#[tokio::test]
async fn test_markers_share_one_delta() {
    let history = history();
    let resolver = resolver(&history);

    let markers: Vec<MarkerRequest> = (0..5)
        .map(|i| MarkerRequest {
            marker: format!("m{}", i),
            references: vec![reference(C1, Location::lines(6 + i, 6 + i), true)],
            uncommitted: None,
        })
        .collect();

    let results = resolver
        .resolve_all(Path::new("foo.rs"), STREAM, &markers, None, None)
        .await;

    assert_eq!(results.len(), 5);
    for (i, (marker, resolution)) in results.iter().enumerate() {
        let line = 9 + i as u32;
        assert_eq!(marker, &format!("m{}", i));
        assert_eq!(resolution.location, Location::lines(line, line));
    }
    assert_eq!(history.diff_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_chain_is_walked_hop_by_hop() {
    let history = history();
    history.set_head(C3);
    let resolver = resolver(&history);

    let mut req = request("m1", vec![reference(C1, Location::lines(10, 10), true)]);
    req.commit_chain = Some(vec![C1.to_string(), C2.to_string(), C3.to_string()]);
    let result = resolver.resolve(&req).await;

    assert_eq!(result.location, Location::lines(13, 13));
    assert_eq!(history.diff_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_backtrack_to_head() {
    let history = history();
    let resolver = resolver(&history);
    let buffer = format!("new a\nnew b\n{}", numbered(20));

    let result = resolver
        .backtrack_to_head(Path::new("foo.rs"), &buffer, Location::new(12, 1, 12, 4))
        .await;

    assert!(!result.dirty);
    assert_eq!(result.head.as_deref(), Some(C2));
    assert_eq!(result.location, Location::new(10, 1, 10, 4));
    assert_eq!(history.read_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_authors() {
    let history = history();
    let resolver = resolver(&history);

    let authors = resolver.authors(Path::new("foo.rs"), LineRange::new(1, 3), None).await;
    assert_eq!(authors.into_vec(), vec!["a@x.com".to_string()]);
}

#[tokio::test]
async fn test_reference_locations_for_committed_text() {
    let history = history();
    let resolver = resolver(&history);

    let created = resolver
        .reference_locations(
            Path::new("foo.rs"),
            &numbered(20),
            Location::lines(10, 12),
            &[C3.to_string(), C2.to_string()],
        )
        .await
        .unwrap();

    assert_eq!(created.head, C2);
    assert_eq!(created.uncommitted, None);
    assert_eq!(
        created.references,
        vec![
            ReferenceLocation {
                commit: C2.to_string(),
                location: Location::lines(10, 12),
                canonical: true,
                backtracked: false,
            },
            // C1 from blame, before the three inserted lines
            ReferenceLocation {
                commit: C1.to_string(),
                location: Location::lines(7, 9),
                canonical: false,
                backtracked: true,
            },
            ReferenceLocation {
                commit: C3.to_string(),
                location: Location::lines(10, 12),
                canonical: false,
                backtracked: true,
            },
        ]
    );
}

#[tokio::test]
async fn test_reference_locations_over_uncommitted_text() {
    let history = history();
    let resolver = resolver(&history);
    let lines = numbered(20);
    let (top, rest) = lines.split_at(lines.find("line 10").unwrap());
    let buffer = format!("{}fresh a\nfresh b\n{}", top, rest);
    let location = Location::new(10, 1, 11, 8);

    let created = resolver
        .reference_locations(Path::new("foo.rs"), &buffer, location, &[])
        .await
        .unwrap();

    let first = &created.references[0];
    assert_eq!(first.commit, C2);
    assert_eq!(first.location, Location::new(10, 1, 10, 1));
    assert!(!first.canonical);
    assert!(first.backtracked);
    assert!(created.references[1..].iter().all(|r| r.backtracked && !r.canonical));
    assert_eq!(
        created.uncommitted,
        Some(UncommittedLocation {
            location,
            contents: buffer.clone(),
        })
    );
}

#[tokio::test]
async fn test_uncommitted_location_follows_buffer() {
    let history = history();
    let resolver = resolver(&history);
    let lines = numbered(20);
    let (top, rest) = lines.split_at(lines.find("line 10").unwrap());
    let snapshot = format!("{}fresh a\nfresh b\n{}", top, rest);

    let mut req = request("m1", vec![reference(GONE, Location::lines(1, 1), true)]);
    req.uncommitted = Some(UncommittedLocation {
        location: Location::lines(10, 11),
        contents: snapshot.clone(),
    });
    req.buffer = Some(format!("top\n{}", snapshot));
    let result = resolver.resolve(&req).await;

    assert!(result.is_located());
    assert!(result.dirty);
    assert_eq!(result.location, Location::lines(11, 12));
    assert_eq!(history.diff_calls.load(Ordering::SeqCst), 0);
    assert_eq!(resolver.location_cache().committed(C2, STREAM, "m1").unwrap(), None);
}

#[tokio::test]
async fn test_uncommitted_location_against_head() {
    let history = history();
    let resolver = resolver(&history);
    let lines = numbered(20);
    let (top, rest) = lines.split_at(lines.find("line 10").unwrap());
    let snapshot = format!("{}fresh a\nfresh b\n{}", top, rest);

    let mut req = request("m1", Vec::new());
    req.uncommitted = Some(UncommittedLocation {
        location: Location::lines(12, 13),
        contents: snapshot,
    });
    let result = resolver.resolve(&req).await;

    assert!(!result.dirty);
    assert_eq!(result.head.as_deref(), Some(C2));
    assert_eq!(result.location, Location::lines(10, 11));
    assert!(!result.meta.is_ambiguous());
    assert_eq!(resolver.location_cache().committed(C2, STREAM, "m1").unwrap(), None);
}
