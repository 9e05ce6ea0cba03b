//! Anchor resolution
//!
//! Moves an anchor from the commit it was recorded at to the current HEAD
//! of its repository, and from HEAD into the live buffer when one is given.
//! Resolution never fails outright: problems are reported on the returned
//! [`Resolution`], which then carries the empty-file location.

use crate::coalesce::Coalescer;
use crate::config::EngineConfig;
use anchor_cache::{DeltaCache, LocationCache, MemoryStore, PersistentStore, SledStore, StoreError};
use anchor_core::{
    diff_text, hash_text, parse_unified_diff, transform, transform_backward, transform_chain, ContentHash, Delta,
    Location, LocationMeta, ResolveError, SnapshotRef, Transformed,
};
use anchor_git::{
    AuthorSet, BlameOptions, BlameResolver, GitCommand, LineRange, RepositoryContext, VersionControlRunner,
};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One recorded position of a marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLocation {
    pub commit: String,
    pub location: Location,
    /// Canonical references are tried before the others
    pub canonical: bool,
    /// Derived by moving another reference, rather than recorded directly
    pub backtracked: bool,
}

/// A marker position in a buffer snapshot that was never committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncommittedLocation {
    pub location: Location,
    /// Full buffer text the location refers to
    pub contents: String,
}

/// References recorded for a newly created marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorReferences {
    pub head: String,
    /// The HEAD reference first, then one per backtracked revision
    pub references: Vec<ReferenceLocation>,
    /// Set when the marker has no exact counterpart at HEAD
    pub uncommitted: Option<UncommittedLocation>,
}

/// Everything needed to place one marker
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    /// File path, absolute or relative to the repository root
    pub file: PathBuf,
    pub stream: String,
    pub marker: String,
    pub references: Vec<ReferenceLocation>,
    /// Commits from the anchor's commit up to HEAD, oldest first
    pub commit_chain: Option<Vec<String>>,
    /// Live buffer text when the file has unsaved or uncommitted edits
    pub buffer: Option<String>,
    /// Snapshot position; when set it is used instead of `references`
    pub uncommitted: Option<UncommittedLocation>,
}

/// A marker within a batch request
#[derive(Debug, Clone)]
pub struct MarkerRequest {
    pub marker: String,
    pub references: Vec<ReferenceLocation>,
    pub uncommitted: Option<UncommittedLocation>,
}

/// Why a marker could not be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotLocatedReason {
    MissingOriginalCommit,
    BinaryContent,
    UntrackedPath,
    GitFailure,
}

impl From<&ResolveError> for NotLocatedReason {
    fn from(err: &ResolveError) -> Self {
        match err {
            ResolveError::RevisionUnavailable { .. } => NotLocatedReason::MissingOriginalCommit,
            ResolveError::BinaryContent { .. } => NotLocatedReason::BinaryContent,
            ResolveError::UntrackedPath { .. } => NotLocatedReason::UntrackedPath,
            ResolveError::Subprocess { .. } => NotLocatedReason::GitFailure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotLocated {
    pub reason: NotLocatedReason,
    pub details: String,
}

/// Outcome of resolving a marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub location: Location,
    pub meta: LocationMeta,
    /// HEAD the location was resolved against, when it could be read
    pub head: Option<String>,
    /// Whether `location` refers to the live buffer rather than HEAD
    pub dirty: bool,
    pub not_located: Option<NotLocated>,
}

impl Resolution {
    fn located(transformed: Transformed, head: &str, dirty: bool) -> Self {
        Self {
            location: transformed.location,
            meta: transformed.meta,
            head: Some(head.to_string()),
            dirty,
            not_located: None,
        }
    }

    /// The empty-file location with both edges flagged as deleted
    pub fn unplaceable(reason: NotLocatedReason, details: impl Into<String>, head: Option<String>) -> Self {
        let fallback = Transformed::unplaceable();
        Self {
            location: fallback.location,
            meta: fallback.meta,
            head,
            dirty: false,
            not_located: Some(NotLocated {
                reason,
                details: details.into(),
            }),
        }
    }

    fn from_error(err: &ResolveError, head: Option<String>) -> Self {
        Self::unplaceable(NotLocatedReason::from(err), err.to_string(), head)
    }

    pub fn is_located(&self) -> bool {
        self.not_located.is_none()
    }
}

/// Commit pairs to diff when moving from `anchor` to `head`
///
/// A usable chain is walked hop by hop; without one, or when it has more
/// than `max_hops` hops, a single direct pair is used.
pub fn plan_hops(anchor: &str, head: &str, chain: Option<&[String]>, max_hops: usize) -> Vec<(String, String)> {
    if anchor == head {
        return Vec::new();
    }
    let direct = vec![(anchor.to_string(), head.to_string())];

    let Some(chain) = chain else {
        return direct;
    };
    let Some(start) = chain.iter().position(|c| c == anchor) else {
        debug!("Commit chain does not contain {}, diffing directly", anchor);
        return direct;
    };

    let mut commits: Vec<&str> = chain[start..].iter().map(String::as_str).collect();
    if let Some(end) = commits.iter().position(|c| *c == head) {
        commits.truncate(end + 1);
    } else {
        commits.push(head);
    }
    commits.dedup();

    let hops: Vec<(String, String)> = commits
        .windows(2)
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .collect();

    if hops.len() > max_hops {
        debug!("Commit chain has {} hops (max {}), diffing directly", hops.len(), max_hops);
        return direct;
    }
    hops
}

type DeltaKey = (PathBuf, String, SnapshotRef, SnapshotRef);
type BlameKey = (PathBuf, LineRange, Option<ContentHash>);

/// Resolves markers of one repository
pub struct Resolver {
    repo_root: PathBuf,
    runner: Arc<dyn VersionControlRunner>,
    locations: Arc<LocationCache>,
    deltas: Arc<DeltaCache>,
    blame: Arc<BlameResolver>,
    max_chain_len: usize,
    /// Last HEAD seen per stream
    heads: DashMap<String, String>,
    delta_flights: Coalescer<DeltaKey, Result<Arc<Delta>, ResolveError>>,
    blame_flights: Coalescer<BlameKey, AuthorSet>,
}

impl Resolver {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        runner: Arc<dyn VersionControlRunner>,
        store: Arc<dyn PersistentStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            blame: Arc::new(BlameResolver::new(Arc::clone(&runner))),
            runner,
            locations: Arc::new(LocationCache::new(store)),
            deltas: Arc::new(DeltaCache::new(config.cache.delta_capacity)),
            max_chain_len: config.backtrack.max_chain_len,
            heads: DashMap::new(),
            delta_flights: Coalescer::new(),
            blame_flights: Coalescer::new(),
        }
    }

    /// Resolver running `git` with a sled store at the configured cache path
    ///
    /// Falls back to an in-memory store when no cache directory exists.
    pub fn from_config(repo_root: impl Into<PathBuf>, config: &EngineConfig) -> Result<Self, StoreError> {
        let runner = Arc::new(GitCommand::new(config.git.executable.clone(), config.git.timeout()));
        let store: Arc<dyn PersistentStore> = match config.cache.resolved_path() {
            Some(path) => Arc::new(SledStore::open(&path)?),
            None => {
                warn!("No cache directory available, locations will not persist");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::new(repo_root, runner, store, config))
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn location_cache(&self) -> &LocationCache {
        &self.locations
    }

    pub fn delta_cache(&self) -> &DeltaCache {
        &self.deltas
    }

    /// Repository context and context-relative path for a file
    async fn route(&self, file: &Path) -> (RepositoryContext, String) {
        let table = self.blame.discover(&self.repo_root).await;
        let (context, relative) = table.resolve(file);
        (context.clone(), relative)
    }

    /// Record the HEAD seen for a stream, dropping dirty locations if it moved
    fn observe_head(&self, stream: &str, head: &str) {
        let previous = self.heads.insert(stream.to_string(), head.to_string());
        if let Some(previous) = previous {
            if previous != head {
                info!("HEAD moved from {} to {} for stream {}", short(&previous), short(head), stream);
                self.locations.invalidate_dirty(stream);
            }
        }
    }

    /// Drop dirty locations after the buffer was reloaded from disk
    pub fn on_buffer_reloaded(&self, stream: &str) {
        self.locations.invalidate_dirty(stream);
    }

    /// Delta for one file between two snapshots, built at most once
    ///
    /// A buffer-side delta needs the buffer text; commit-to-commit deltas
    /// come from `git diff`.
    async fn delta(
        &self,
        context: &RepositoryContext,
        path: &str,
        old: SnapshotRef,
        new: SnapshotRef,
        buffer: Option<&str>,
    ) -> Result<Arc<Delta>, ResolveError> {
        let scope = scope_of(context, path);
        if let Some(hit) = self.deltas.get(&scope, &old, &new) {
            return Ok(hit);
        }

        let key = (context.root.clone(), path.to_string(), old.clone(), new.clone());
        let runner = Arc::clone(&self.runner);
        let cache = Arc::clone(&self.deltas);
        let root = context.root.clone();
        let path = path.to_string();
        let buffer = buffer.map(str::to_string);

        self.delta_flights
            .run(key, move || async move {
                let delta = match (&old, &new, buffer) {
                    (SnapshotRef::Commit(rev), SnapshotRef::Buffer(_), Some(text)) => {
                        let committed = runner.read_file_at_revision(&root, &path, rev).await?;
                        diff_text(old.clone(), &committed, new.clone(), &text)
                    }
                    (SnapshotRef::Commit(from), SnapshotRef::Commit(to), _) => {
                        let patch = runner.diff_revisions(&root, from, to, &path).await?;
                        parse_unified_diff(old.clone(), new.clone(), &patch)?
                    }
                    _ => {
                        return Err(ResolveError::Subprocess {
                            message: format!("cannot build delta {} -> {} without content", old, new),
                        })
                    }
                };
                Ok(cache.insert(&scope, delta))
            })
            .await
    }

    /// Delta between two texts already in hand
    fn text_delta(&self, scope: &str, old_ref: SnapshotRef, old: &str, new_ref: SnapshotRef, new: &str) -> Arc<Delta> {
        if let Some(hit) = self.deltas.get(scope, &old_ref, &new_ref) {
            return hit;
        }
        self.deltas.insert(scope, diff_text(old_ref, old, new_ref, new))
    }

    /// Move a location from `anchor` to `head` through the planned hops
    async fn to_head(
        &self,
        context: &RepositoryContext,
        path: &str,
        reference: &ReferenceLocation,
        head: &str,
        chain: Option<&[String]>,
    ) -> Result<Transformed, ResolveError> {
        let hops = plan_hops(&reference.commit, head, chain, self.max_chain_len);
        let mut deltas = Vec::with_capacity(hops.len());
        for (from, to) in hops {
            let delta = self
                .delta(context, path, SnapshotRef::Commit(from), SnapshotRef::Commit(to), None)
                .await?;
            deltas.push(delta);
        }
        Ok(transform_chain(reference.location, deltas.iter().map(|d| d.as_ref())))
    }

    /// Delta from HEAD to the live buffer
    async fn buffer_delta(
        &self,
        context: &RepositoryContext,
        path: &str,
        head: &str,
        buffer: &str,
    ) -> Result<Arc<Delta>, ResolveError> {
        let buffer_ref = SnapshotRef::Buffer(hash_text(buffer));
        self.delta(context, path, SnapshotRef::commit(head), buffer_ref, Some(buffer))
            .await
    }

    async fn head_of(&self, context: &RepositoryContext) -> Result<String, ResolveError> {
        Ok(self.runner.current_revision(&context.root).await?)
    }

    /// Committed location at HEAD, from the cache or by walking a reference
    async fn committed_at_head(
        &self,
        context: &RepositoryContext,
        path: &str,
        request: &ResolveRequest,
        head: &str,
    ) -> Result<Transformed, ResolveError> {
        match self.locations.committed(head, &request.stream, &request.marker) {
            Ok(Some(placed)) => return Ok(placed),
            Ok(None) => {}
            Err(e) => warn!("Location cache read failed for {}: {}", request.marker, e),
        }

        let mut references: Vec<&ReferenceLocation> = request.references.iter().collect();
        references.sort_by_key(|r| !r.canonical);

        let mut last_error = ResolveError::RevisionUnavailable {
            revision: "<no reference location>".to_string(),
        };
        for reference in references {
            match self
                .to_head(context, path, reference, head, request.commit_chain.as_deref())
                .await
            {
                Ok(moved) => {
                    return match self
                        .locations
                        .put_committed(head, &request.stream, &request.marker, moved)
                    {
                        Ok(winner) => Ok(winner),
                        Err(e) => {
                            warn!("Failed to persist location for {}: {}", request.marker, e);
                            Ok(moved)
                        }
                    };
                }
                Err(e) if e.is_missing_revision() => {
                    debug!("Reference at {} unusable: {}", short(&reference.commit), e);
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    /// Place a marker at HEAD, and in the live buffer when one is given
    pub async fn resolve(&self, request: &ResolveRequest) -> Resolution {
        let (context, path) = self.route(&request.file).await;

        let head = match self.head_of(&context).await {
            Ok(head) => head,
            Err(e) => return Resolution::from_error(&e, None),
        };
        self.observe_head(&request.stream, &head);

        if let Some(snapshot) = &request.uncommitted {
            return self.resolve_uncommitted(&context, &path, request, snapshot, head).await;
        }

        let committed = match self.committed_at_head(&context, &path, request, &head).await {
            Ok(committed) => committed,
            Err(e) => {
                debug!("Marker {} not located: {}", request.marker, e);
                return Resolution::from_error(&e, Some(head));
            }
        };

        let Some(buffer) = request.buffer.as_deref() else {
            return Resolution::located(committed, &head, false);
        };

        let delta = match self.buffer_delta(&context, &path, &head, buffer).await {
            Ok(delta) => delta,
            Err(e) => return Resolution::from_error(&e, Some(head)),
        };
        let dirty = transform(committed.location, &delta);
        self.locations
            .put_dirty(&head, &request.stream, &request.marker, dirty.location);

        Resolution::located(
            Transformed {
                location: dirty.location,
                meta: committed.meta.merge(dirty.meta),
            },
            &head,
            true,
        )
    }

    /// Place a marker recorded against a buffer snapshot
    ///
    /// The snapshot is diffed against the live buffer when given, otherwise
    /// against HEAD. Nothing is written to the committed cache.
    async fn resolve_uncommitted(
        &self,
        context: &RepositoryContext,
        path: &str,
        request: &ResolveRequest,
        snapshot: &UncommittedLocation,
        head: String,
    ) -> Resolution {
        let (target_ref, target, dirty) = match request.buffer.as_deref() {
            Some(buffer) => (SnapshotRef::buffer(buffer), buffer.to_string(), true),
            None => match self.runner.read_file_at_revision(&context.root, path, &head).await {
                Ok(text) => (SnapshotRef::commit(head.as_str()), text, false),
                Err(e) => return Resolution::from_error(&ResolveError::from(e), Some(head)),
            },
        };

        let delta = self.text_delta(
            &scope_of(context, path),
            SnapshotRef::buffer(&snapshot.contents),
            &snapshot.contents,
            target_ref,
            &target,
        );
        let moved = transform(snapshot.location, &delta);
        if dirty {
            self.locations
                .put_dirty(&head, &request.stream, &request.marker, moved.location);
        }
        Resolution::located(moved, &head, dirty)
    }

    /// Resolve every marker of one file
    ///
    /// Markers recorded at the same commit share one delta through the
    /// delta cache and in-flight coalescing.
    pub async fn resolve_all(
        &self,
        file: &Path,
        stream: &str,
        markers: &[MarkerRequest],
        commit_chain: Option<&[String]>,
        buffer: Option<&str>,
    ) -> Vec<(String, Resolution)> {
        let requests: Vec<ResolveRequest> = markers
            .iter()
            .map(|m| ResolveRequest {
                file: file.to_path_buf(),
                stream: stream.to_string(),
                marker: m.marker.clone(),
                references: m.references.clone(),
                commit_chain: commit_chain.map(<[String]>::to_vec),
                buffer: buffer.map(str::to_string),
                uncommitted: m.uncommitted.clone(),
            })
            .collect();

        let resolutions = join_all(requests.iter().map(|r| self.resolve(r))).await;
        requests.into_iter().map(|r| r.marker).zip(resolutions).collect()
    }

    /// Move a location in the live buffer back to HEAD
    ///
    /// Used when an anchor is created in a buffer with uncommitted edits and
    /// has to be recorded against a commit.
    pub async fn backtrack_to_head(&self, file: &Path, buffer: &str, location: Location) -> Resolution {
        let (context, path) = self.route(file).await;

        let head = match self.head_of(&context).await {
            Ok(head) => head,
            Err(e) => return Resolution::from_error(&e, None),
        };

        match self.buffer_delta(&context, &path, &head, buffer).await {
            Ok(delta) => Resolution::located(transform_backward(location, &delta), &head, false),
            Err(e) => Resolution::from_error(&e, Some(head)),
        }
    }

    /// References for a marker created at `location` in the live buffer
    ///
    /// The location is moved back to HEAD, where it is canonical unless one
    /// of its edges fell in uncommitted text. It is then carried to every
    /// revision that last touched its lines and to `extra_revisions`, so the
    /// marker can still be placed after HEAD's commit is gone. A revision
    /// that cannot be diffed is skipped.
    pub async fn reference_locations(
        &self,
        file: &Path,
        buffer: &str,
        location: Location,
        extra_revisions: &[String],
    ) -> Result<AnchorReferences, ResolveError> {
        let (context, path) = self.route(file).await;
        let head = self.head_of(&context).await?;

        let delta = self.buffer_delta(&context, &path, &head, buffer).await?;
        let at_head = transform_backward(location, &delta);
        let canonical = !at_head.meta.is_ambiguous();

        let mut revisions: Vec<String> = Vec::new();
        let blamed = self.blamed_revisions(&context, &path, &head, at_head.location).await;
        for revision in blamed.into_iter().chain(extra_revisions.iter().cloned()) {
            if revision != head && !revisions.contains(&revision) {
                revisions.push(revision);
            }
        }
        debug!("Backtracking new marker to {} revisions", revisions.len());

        let (context, path, head_ref) = (&context, &path, &head);
        let backtracked = join_all(revisions.iter().map(|revision| async move {
            let delta = self
                .delta(
                    context,
                    path,
                    SnapshotRef::commit(head_ref.as_str()),
                    SnapshotRef::commit(revision.as_str()),
                    None,
                )
                .await;
            (revision, delta)
        }))
        .await;

        let mut references = vec![ReferenceLocation {
            commit: head.clone(),
            location: at_head.location,
            canonical,
            backtracked: !canonical,
        }];
        for (revision, delta) in backtracked {
            match delta {
                Ok(delta) => references.push(ReferenceLocation {
                    commit: revision.clone(),
                    location: transform(at_head.location, &delta).location,
                    canonical: false,
                    backtracked: true,
                }),
                Err(e) => debug!("Skipping reference at {}: {}", short(revision), e),
            }
        }

        let uncommitted = (!canonical).then(|| UncommittedLocation {
            location,
            contents: buffer.to_string(),
        });

        Ok(AnchorReferences {
            head,
            references,
            uncommitted,
        })
    }

    /// Commits that last touched the lines of `location` at `head`
    async fn blamed_revisions(
        &self,
        context: &RepositoryContext,
        path: &str,
        head: &str,
        location: Location,
    ) -> Vec<String> {
        let range = match (location.start_line, location.end_line) {
            (Some(start), Some(end)) => Some(LineRange::new(start, end)),
            _ => None,
        };
        let options = BlameOptions {
            revision: Some(head.to_string()),
            range,
            contents: None,
        };

        match self.runner.blame(&context.root, path, &options).await {
            Ok(lines) => {
                let mut revisions: Vec<String> = Vec::new();
                for line in lines {
                    if !line.is_uncommitted() && !revisions.contains(&line.commit) {
                        revisions.push(line.commit);
                    }
                }
                revisions
            }
            Err(e) => {
                warn!("Blame failed for {}: {}", path, e);
                Vec::new()
            }
        }
    }

    /// Authors of a line range, blaming the live buffer when given
    pub async fn authors(&self, file: &Path, range: LineRange, contents: Option<&str>) -> AuthorSet {
        let key = (file.to_path_buf(), range, contents.map(hash_text));
        let blame = Arc::clone(&self.blame);
        let root = self.repo_root.clone();
        let file = file.to_path_buf();
        let contents = contents.map(str::to_string);

        self.blame_flights
            .run(key, move || async move {
                blame.authors(&root, &file, range, contents.as_deref()).await
            })
            .await
    }
}

/// Delta cache scope of a file
fn scope_of(context: &RepositoryContext, path: &str) -> String {
    context.root.join(path).to_string_lossy().into_owned()
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
