//! File-system store for uploaded gallery images.
//!
//! # Responsibility
//! - Validate upload names and persist bytes under collision-resistant names.
//! - Provide staged (two-phase) removal so a row delete and its file delete
//!   either both happen or neither does.
//!
//! # Invariants
//! - Stored names are `<uuid>_<sanitized original>` and never equal the
//!   user-supplied name.
//! - Stored names are plain file names; no separators, no `..`.
//! - A staged file is either purged or moved back; dropping a
//!   `StagedRemoval` without a decision restores it.

use log::{error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Lowercase extensions accepted for gallery uploads.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

const STAGING_DIR_NAME: &str = ".staged";
const FALLBACK_STEM: &str = "upload";

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid filename regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

pub type UploadResult<T> = Result<T, UploadError>;

#[derive(Debug)]
pub enum UploadError {
    /// Upload carried no bytes.
    EmptyFile,
    /// Extension missing or outside `ALLOWED_EXTENSIONS`.
    UnsupportedExtension(String),
    /// Requested stored name is not a plain file name.
    InvalidName(String),
    Io(io::Error),
}

impl Display for UploadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFile => write!(f, "the uploaded file is empty"),
            Self::UnsupportedExtension(name) => write!(
                f,
                "`{name}` is not an allowed image type (allowed: {})",
                ALLOWED_EXTENSIONS.join(", ")
            ),
            Self::InvalidName(name) => write!(f, "invalid stored file name `{name}`"),
            Self::Io(err) => write!(f, "upload storage failure: {err}"),
        }
    }
}

impl Error for UploadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for UploadError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Directory-backed image store.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    staging: PathBuf,
}

impl UploadStore {
    /// Opens (creating when missing) the upload directory and its staging area.
    pub fn open(root: impl Into<PathBuf>) -> UploadResult<Self> {
        let root = root.into();
        let staging = root.join(STAGING_DIR_NAME);
        fs::create_dir_all(&staging)?;
        Ok(Self { root, staging })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a stored name to its on-disk path.
    pub fn path_of(&self, stored_name: &str) -> UploadResult<PathBuf> {
        if !is_plain_file_name(stored_name) {
            return Err(UploadError::InvalidName(stored_name.to_string()));
        }
        Ok(self.root.join(stored_name))
    }

    pub fn exists(&self, stored_name: &str) -> bool {
        self.path_of(stored_name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Checks an upload before anything touches the disk.
    pub fn validate(original_name: &str, bytes: &[u8]) -> UploadResult<()> {
        if !has_allowed_extension(original_name) {
            return Err(UploadError::UnsupportedExtension(original_name.to_string()));
        }
        if bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        Ok(())
    }

    /// Validates and writes an upload, returning the generated stored name.
    ///
    /// The file is fully written and synced before this returns, so a record
    /// inserted afterwards never points at a partial file.
    pub fn persist(&self, original_name: &str, bytes: &[u8]) -> UploadResult<String> {
        Self::validate(original_name, bytes)?;

        let stored_name = stored_name_for(original_name);
        let path = self.root.join(&stored_name);
        let write_result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            });

        if let Err(err) = write_result {
            let _ = fs::remove_file(&path);
            return Err(err.into());
        }

        Ok(stored_name)
    }

    /// Removes one stored file. A file that is already gone counts as removed.
    pub fn remove(&self, stored_name: &str) -> UploadResult<()> {
        let path = self.path_of(stored_name)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Moves the named files into the staging area.
    ///
    /// On error every file staged so far is moved back before returning.
    pub fn stage_removal<S: AsRef<str>>(&self, stored_names: &[S]) -> UploadResult<StagedRemoval<'_>> {
        let mut staged = StagedRemoval {
            store: self,
            entries: Vec::with_capacity(stored_names.len()),
            settled: false,
        };

        for name in stored_names {
            let name = name.as_ref();
            let live = self.path_of(name)?;
            let parked = self.staging.join(name);
            match fs::rename(&live, &parked) {
                Ok(()) => staged.entries.push((live, parked)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    warn!("event=upload_stage module=upload status=skip reason=missing_file");
                }
                Err(err) => {
                    staged.restore()?;
                    return Err(err.into());
                }
            }
        }

        Ok(staged)
    }
}

/// Files moved out of the live directory, awaiting `purge` or `restore`.
#[derive(Debug)]
pub struct StagedRemoval<'store> {
    store: &'store UploadStore,
    entries: Vec<(PathBuf, PathBuf)>,
    settled: bool,
}

impl StagedRemoval<'_> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deletes the staged files for good. Failures are logged, not returned:
    /// the owning rows are already gone, so the files are unreachable either way.
    pub fn purge(mut self) {
        self.settled = true;
        for (_, parked) in self.entries.drain(..) {
            if let Err(err) = fs::remove_file(&parked) {
                error!(
                    "event=upload_purge module=upload status=error staging_dir={} error={}",
                    self.store.staging.display(),
                    err
                );
            }
        }
    }

    /// Moves every staged file back to its live location.
    pub fn restore(mut self) -> UploadResult<()> {
        self.settled = true;
        restore_entries(&mut self.entries)
    }
}

impl Drop for StagedRemoval<'_> {
    fn drop(&mut self) {
        if !self.settled {
            if let Err(err) = restore_entries(&mut self.entries) {
                error!("event=upload_restore module=upload status=error error={err}");
            }
        }
    }
}

fn restore_entries(entries: &mut Vec<(PathBuf, PathBuf)>) -> UploadResult<()> {
    let mut first_error = None;
    for (live, parked) in entries.drain(..) {
        if let Err(err) = fs::rename(&parked, &live) {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Returns whether `name` ends in one of `ALLOWED_EXTENSIONS` (case-insensitive).
pub fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Reduces a user-supplied file name to `[A-Za-z0-9._-]`.
///
/// Path components are dropped, whitespace runs become `_`, leading dots and
/// underscores are stripped, and an empty result becomes `upload`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let spaced = WHITESPACE_RUN.replace_all(base.trim(), "_");
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(&spaced, "");
    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

fn stored_name_for(original_name: &str) -> String {
    format!(
        "{}_{}",
        Uuid::new_v4().simple(),
        sanitize_filename(original_name)
    )
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::{has_allowed_extension, sanitize_filename, UploadError, UploadStore};

    #[test]
    fn extension_check_is_case_insensitive_and_strict() {
        assert!(has_allowed_extension("photo.PNG"));
        assert!(has_allowed_extension("a.b.jpeg"));
        assert!(!has_allowed_extension("photo.txt"));
        assert!(!has_allowed_extension("png"));
        assert!(!has_allowed_extension("photo.png.exe"));
    }

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\pics\\our trip!.png"), "our_trip.png");
        assert_eq!(sanitize_filename("..hidden.gif"), "hidden.gif");
        assert_eq!(sanitize_filename("照片"), "upload");
    }

    #[test]
    fn persist_writes_under_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path()).unwrap();

        let stored = store.persist("photo.png", b"png-bytes").unwrap();
        assert_ne!(stored, "photo.png");
        assert!(stored.ends_with("_photo.png"));
        assert_eq!(std::fs::read(store.path_of(&stored).unwrap()).unwrap(), b"png-bytes");
    }

    #[test]
    fn persist_rejects_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.persist("notes.txt", b"x"),
            Err(UploadError::UnsupportedExtension(_))
        ));
        assert!(matches!(
            store.persist("empty.png", b""),
            Err(UploadError::EmptyFile)
        ));
        let live_files = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| entry.as_ref().unwrap().path().is_file())
            .count();
        assert_eq!(live_files, 0);
    }

    #[test]
    fn staged_removal_restores_on_drop_and_purges_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path()).unwrap();
        let first = store.persist("a.png", b"a").unwrap();
        let second = store.persist("b.gif", b"b").unwrap();

        {
            let staged = store.stage_removal(&[first.clone(), second.clone()]).unwrap();
            assert_eq!(staged.len(), 2);
            assert!(!store.exists(&first));
        }
        assert!(store.exists(&first));
        assert!(store.exists(&second));

        store.stage_removal(&[first.clone()]).unwrap().purge();
        assert!(!store.exists(&first));
        assert!(store.exists(&second));
    }

    #[test]
    fn path_of_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path()).unwrap();
        assert!(store.path_of("../secret").is_err());
        assert!(store.path_of(".staged").is_err());
        assert!(store.path_of("ok_name.png").is_ok());
    }
}
