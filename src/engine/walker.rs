//! Suspendable depth-first enumeration of a directory tree.
//!
//! The [`Walker`] keeps its position on an explicit stack of directory frames
//! and never performs I/O itself. Whenever the frame on top of the stack has
//! not been listed yet, [`Walker::step`] returns [`Step::List`]; the caller
//! awaits [`list`] for that path and hands the result back through
//! [`Walker::listed`]. This lets the engine keep dispatching work while a
//! directory is being read.
//!
//! Order: siblings ascend by the raw bytes of their names. With
//! `directory_first` off a directory is offered after its children, otherwise
//! before them. Symbolic links are offered but never descended into.

use std::cmp::Ordering;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use tracing::trace;

/// An entry the walker wants registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub enum Step {
    /// Offer this entry for registration.
    Entry(Discovered),
    /// List this directory and pass the result to [`Walker::listed`].
    List(PathBuf),
    /// A name in `dirname` could not be decoded; it is left out of the walk.
    NoUtf8Name { dirname: String, raw: Vec<u8> },
    /// A directory could not be read; it is walked as if it were empty.
    Unreadable {
        name: String,
        path: PathBuf,
        error: io::Error,
    },
    /// The root has been fully enumerated.
    Finished,
}

/// One directory child as returned by [`list`].
#[derive(Debug, Clone)]
pub struct Child {
    pub name: OsString,
    /// False only when the entry is known not to be a real directory.
    pub maybe_dir: bool,
}

#[derive(Debug)]
pub enum Listing {
    Children(Vec<Child>),
    NotDirectory,
    Failed(io::Error),
}

/// Stats `path` and, if it is a directory, lists it sorted by raw name bytes.
pub async fn list(path: PathBuf) -> Listing {
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) => return Listing::Failed(e),
    };
    if !metadata.is_dir() {
        return Listing::NotDirectory;
    }

    let mut dir = match tokio::fs::read_dir(&path).await {
        Ok(dir) => dir,
        Err(e) => return Listing::Failed(e),
    };
    let mut children = Vec::new();
    loop {
        match dir.next_entry().await {
            Ok(Some(entry)) => {
                let maybe_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(true);
                children.push(Child {
                    name: entry.file_name(),
                    maybe_dir,
                });
            }
            Ok(None) => break,
            Err(e) => return Listing::Failed(e),
        }
    }
    children.sort_by(|a, b| a.name.as_encoded_bytes().cmp(b.name.as_encoded_bytes()));
    Listing::Children(children)
}

struct Frame {
    segments: Vec<String>,
    path: PathBuf,
    children: Option<std::vec::IntoIter<Child>>,
    /// Registered once this frame unwinds (children-first order).
    deferred: Option<Discovered>,
}

/// Decision for one entry while the walk is still positioned before the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Admit {
    register: bool,
    descend: bool,
}

const ADMIT_ALL: Admit = Admit {
    register: true,
    descend: true,
};

/// Depth-first walker positioned by an explicit stack of directory frames.
///
/// Whether a child is descended into is decided from its own file type, so a
/// symbolic link to a directory is offered as a single entry and its target is
/// never walked.
pub struct Walker {
    stack: Vec<Frame>,
    directory_first: bool,
    /// Segments of the resume marker; cleared once the walk has passed it.
    marker: Option<Vec<String>>,
    stash: Option<Step>,
}

impl Walker {
    pub fn new(root: PathBuf, directory_first: bool, marker: Option<&str>) -> Self {
        let root = Frame {
            segments: Vec::new(),
            path: root,
            children: None,
            deferred: None,
        };
        Self {
            stack: vec![root],
            directory_first,
            marker: marker.map(|m| m.split('/').map(str::to_owned).collect()),
            stash: None,
        }
    }

    /// Advances until there is something for the caller to do.
    pub fn step(&mut self) -> Step {
        if let Some(step) = self.stash.take() {
            return step;
        }
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Step::Finished;
            };
            let Some(children) = frame.children.as_mut() else {
                return Step::List(frame.path.clone());
            };
            let Some(child) = children.next() else {
                if let Some(Frame {
                    deferred: Some(entry),
                    ..
                }) = self.stack.pop()
                {
                    return Step::Entry(entry);
                }
                continue;
            };

            let Some(name) = child.name.to_str() else {
                return Step::NoUtf8Name {
                    dirname: frame.segments.join("/"),
                    raw: child.name.as_encoded_bytes().to_vec(),
                };
            };
            let mut segments = frame.segments.clone();
            segments.push(name.to_owned());
            let path = frame.path.join(name);

            let admit = self.admit(&segments);
            trace!(name = %segments.join("/"), ?admit, "walk");
            let entry = Discovered {
                name: segments.join("/"),
                path: path.clone(),
            };

            if !(admit.descend && child.maybe_dir) {
                if admit.register {
                    return Step::Entry(entry);
                }
                continue;
            }

            let (now, deferred) = match (admit.register, self.directory_first) {
                (false, _) => (None, None),
                (true, true) => (Some(entry), None),
                (true, false) => (None, Some(entry)),
            };
            self.stack.push(Frame {
                segments,
                path,
                children: None,
                deferred,
            });
            if let Some(entry) = now {
                return Step::Entry(entry);
            }
        }
    }

    /// Supplies the listing requested by the last [`Step::List`].
    pub fn listed(&mut self, listing: Listing) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        let children = match listing {
            Listing::Children(children) => children,
            Listing::NotDirectory => Vec::new(),
            Listing::Failed(error) => {
                self.stash = Some(Step::Unreadable {
                    name: frame.segments.join("/"),
                    path: frame.path.clone(),
                    error,
                });
                Vec::new()
            }
        };
        frame.children = Some(children.into_iter());
    }

    /// Applies the resume policy to an entry with the given path segments.
    fn admit(&mut self, segments: &[String]) -> Admit {
        let Some(marker) = &self.marker else {
            return ADMIT_ALL;
        };
        let shared = segments.len().min(marker.len());
        match segments[..shared].cmp(&marker[..shared]) {
            // The entry and everything under it precede the marker.
            Ordering::Less => Admit {
                register: false,
                descend: false,
            },
            // Past the marker: nothing else needs comparing.
            Ordering::Greater => {
                self.marker = None;
                ADMIT_ALL
            }
            Ordering::Equal => {
                let first = self.directory_first;
                match segments.len().cmp(&marker.len()) {
                    // The entry is the marker itself.
                    Ordering::Equal => Admit {
                        register: false,
                        descend: first,
                    },
                    // Below the marker.
                    Ordering::Greater => Admit {
                        register: first,
                        descend: first,
                    },
                    // Above the marker.
                    Ordering::Less => Admit {
                        register: !first,
                        descend: true,
                    },
                }
            }
        }
    }
}

/// Discovery over an explicit list of relative names instead of the disk.
pub struct NameList {
    root: PathBuf,
    names: std::vec::IntoIter<String>,
}

impl NameList {
    /// Names are sorted by bytes, de-duplicated, and empty names dropped.
    pub fn new(root: PathBuf, mut names: Vec<String>) -> Self {
        names.retain(|name| !name.is_empty());
        names.sort();
        names.dedup();
        Self {
            root,
            names: names.into_iter(),
        }
    }

    pub fn step(&mut self) -> Step {
        match self.names.next() {
            Some(name) => Step::Entry(Discovered {
                path: self.root.join(&name),
                name,
            }),
            None => Step::Finished,
        }
    }
}

/// Source of entries for one run.
pub enum Discovery {
    Tree(Walker),
    Names(NameList),
}

impl Discovery {
    pub fn step(&mut self) -> Step {
        match self {
            Discovery::Tree(walker) => walker.step(),
            Discovery::Names(names) => names.step(),
        }
    }

    pub fn listed(&mut self, listing: Listing) {
        if let Discovery::Tree(walker) = self {
            walker.listed(listing);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    /// a, b, c/d
    fn small_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a");
        touch(dir.path(), "b");
        touch(dir.path(), "c/d");
        dir
    }

    /// a, b, c/d/e, c/d/f, c/g, h/
    fn deep_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["a", "b", "c/d/e", "c/d/f", "c/g"] {
            touch(dir.path(), rel);
        }
        fs::create_dir(dir.path().join("h")).unwrap();
        dir
    }

    async fn walk(root: &Path, directory_first: bool, marker: Option<&str>) -> Vec<String> {
        let mut walker = Walker::new(root.to_path_buf(), directory_first, marker);
        let mut names = Vec::new();
        loop {
            match walker.step() {
                Step::Entry(entry) => names.push(entry.name),
                Step::List(path) => walker.listed(list(path).await),
                Step::Finished => break,
                other => panic!("unexpected step {other:?}"),
            }
        }
        names
    }

    #[tokio::test]
    async fn children_before_directory() {
        let dir = small_tree();
        assert_eq!(walk(dir.path(), false, None).await, ["a", "b", "c/d", "c"]);
    }

    #[tokio::test]
    async fn directory_before_children() {
        let dir = small_tree();
        assert_eq!(walk(dir.path(), true, None).await, ["a", "b", "c", "c/d"]);
    }

    #[tokio::test]
    async fn entries_carry_absolute_paths() {
        let dir = small_tree();
        let mut walker = Walker::new(dir.path().to_path_buf(), false, None);
        let Step::List(path) = walker.step() else {
            panic!("root must be listed first");
        };
        assert_eq!(path, dir.path());
        walker.listed(list(path).await);
        let Step::Entry(entry) = walker.step() else {
            panic!("expected an entry");
        };
        assert_eq!(entry.name, "a");
        assert_eq!(entry.path, dir.path().join("a"));
    }

    #[tokio::test]
    async fn resume_below_marker_registers_ancestor_only() {
        let dir = small_tree();
        assert_eq!(walk(dir.path(), false, Some("c/d")).await, ["c"]);
    }

    #[tokio::test]
    async fn resume_at_directory_in_directory_first_walks_its_children() {
        let dir = small_tree();
        assert_eq!(walk(dir.path(), true, Some("c")).await, ["c/d"]);
        assert!(walk(dir.path(), true, Some("c/d")).await.is_empty());
    }

    #[tokio::test]
    async fn resume_at_every_position_continues_exactly_after_it() {
        let dir = deep_tree();
        for directory_first in [false, true] {
            let full = walk(dir.path(), directory_first, None).await;
            assert_eq!(full.len(), 8);
            for (i, marker) in full.iter().enumerate() {
                let resumed = walk(dir.path(), directory_first, Some(marker)).await;
                assert_eq!(
                    resumed,
                    full[i + 1..],
                    "directory_first={directory_first} marker={marker}"
                );
            }
        }
    }

    #[tokio::test]
    async fn deep_tree_orders() {
        let dir = deep_tree();
        assert_eq!(
            walk(dir.path(), false, None).await,
            ["a", "b", "c/d/e", "c/d/f", "c/d", "c/g", "c", "h"]
        );
        assert_eq!(
            walk(dir.path(), true, None).await,
            ["a", "b", "c", "c/d", "c/d/e", "c/d/f", "c/g", "h"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn directory_symlinks_are_offered_but_not_descended() {
        let dir = small_tree();
        std::os::unix::fs::symlink(dir.path().join("c"), dir.path().join("l")).unwrap();
        assert_eq!(
            walk(dir.path(), false, None).await,
            ["a", "b", "c/d", "c", "l"]
        );
    }

    #[tokio::test]
    async fn file_root_yields_nothing() {
        let dir = small_tree();
        assert!(walk(&dir.path().join("a"), false, None).await.is_empty());
    }

    #[tokio::test]
    async fn missing_root_is_reported_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let mut walker = Walker::new(dir.path().join("missing"), false, None);
        let Step::List(path) = walker.step() else {
            panic!("root must be listed first");
        };
        walker.listed(list(path).await);
        assert!(matches!(walker.step(), Step::Unreadable { name, .. } if name.is_empty()));
        assert!(matches!(walker.step(), Step::Finished));
    }

    #[test]
    fn name_list_sorts_and_dedups() {
        let mut names = NameList::new(
            PathBuf::from("/data"),
            vec!["b".into(), "".into(), "a/x".into(), "b".into()],
        );
        let Step::Entry(first) = names.step() else {
            panic!("expected an entry");
        };
        assert_eq!(first.name, "a/x");
        assert_eq!(first.path, PathBuf::from("/data/a/x"));
        assert!(matches!(names.step(), Step::Entry(e) if e.name == "b"));
        assert!(matches!(names.step(), Step::Finished));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn undecodable_names_are_reported_and_skipped() {
        use std::os::unix::ffi::OsStrExt;

        let dir = small_tree();
        let raw = [b'c', 0xff];
        fs::create_dir(dir.path().join("c").join(std::ffi::OsStr::from_bytes(&raw))).unwrap();

        let mut walker = Walker::new(dir.path().to_path_buf(), false, None);
        let mut names = Vec::new();
        let mut reported = Vec::new();
        loop {
            match walker.step() {
                Step::Entry(entry) => names.push(entry.name),
                Step::List(path) => walker.listed(list(path).await),
                Step::NoUtf8Name { dirname, raw } => reported.push((dirname, raw)),
                Step::Finished => break,
                other => panic!("unexpected step {other:?}"),
            }
        }
        assert_eq!(names, ["a", "b", "c/d", "c"]);
        assert_eq!(reported, [("c".to_string(), raw.to_vec())]);
    }
}
