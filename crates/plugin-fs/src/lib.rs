#![deny(clippy::all)]

//! Filesystem primitives for the export pipeline: symlink-aware recursive copy,
//! and the glob-filtered "publishable subset" copy the Production Packager uses
//! to turn a source package directory into a `dist-dynamic/` (or `embedded/<slug>`)
//! directory without dragging `node_modules` or dev-only files along.

use std::{
    fs::{DirBuilder, FileType, Metadata},
    io,
    path::{Path, PathBuf},
};

use camino::Utf8Path;
use fs_err as fs;
use walkdir::WalkDir;
use wax::{Glob, Pattern};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("error walking directory during recursive copy: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid glob pattern {pattern}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: wax::BuildError<'static>,
    },
}

/// Conventional root files carried over regardless of the `files` allowlist.
pub const ALWAYS_INCLUDED: &[&str] = &["package.json", "README.md", "README", "LICENSE", "CHANGELOG.md"];

pub fn recursive_copy(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<(), Error> {
    let src = src.as_ref();
    let dst = dst.as_ref();
    let src_metadata = fs::symlink_metadata(src)?;

    if src_metadata.is_dir() {
        let walker = WalkDir::new(src).follow_links(false);
        for entry in walker {
            match entry {
                Err(e) => {
                    if e.io_error().is_some() {
                        continue;
                    } else {
                        return Err(e.into());
                    }
                }
                Ok(entry) => {
                    let path = entry.path();
                    let file_type = entry.file_type();

                    if file_type.is_symlink() && fs::metadata(path).is_err() {
                        // broken symlink, skip
                        continue;
                    }

                    let suffix = path.strip_prefix(src).expect("walked under src");
                    let target = dst.join(suffix);
                    if file_type.is_dir() {
                        let src_metadata = entry.metadata()?;
                        make_dir_copy(&target, &src_metadata)?;
                    } else {
                        copy_file_with_type(path, file_type, &target)?;
                    }
                }
            }
        }
        Ok(())
    } else {
        copy_file_with_type(src, src_metadata.file_type(), dst)
    }
}

/// Copies the publishable subset of `src` into `dst`: entries matching any glob in
/// `files` (when non-empty), plus [`ALWAYS_INCLUDED`] files that exist, never `node_modules`.
/// An empty `files` list means "copy everything except node_modules" (no allowlist was declared).
pub fn copy_publishable_subset(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    files: &[String],
) -> Result<(), Error> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    let globs = files
        .iter()
        .map(|pattern| {
            Glob::new(pattern)
                .map(|g| g.into_owned())
                .map_err(|source| Error::Glob {
                    pattern: pattern.clone(),
                    source: source.into_owned(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.io_error().is_some() => continue,
            Err(e) => return Err(e.into()),
        };
        let path = entry.path();
        let suffix = path.strip_prefix(src).expect("walked under src");
        if suffix.as_os_str().is_empty() {
            continue;
        }
        if is_under_node_modules(suffix) {
            continue;
        }

        let included = globs.is_empty()
            || matches_any(&globs, suffix)
            || is_always_included(suffix);

        if !included {
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            // directories are created lazily as files land inside them; matching a
            // directory itself just means "everything under it passes", handled by
            // matches_any on the file's own suffix below for files, and here only to
            // avoid erroring on empty matched directories.
            continue;
        }

        let target = dst.join(suffix);
        copy_file_with_type(path, file_type, &target)?;
    }

    for name in ALWAYS_INCLUDED {
        let from = src.join(name);
        let to = dst.join(name);
        if from.exists() && !to.exists() {
            copy_file(&from, &to)?;
        }
    }

    Ok(())
}

fn is_under_node_modules(suffix: &Path) -> bool {
    suffix.components().any(|c| c.as_os_str() == "node_modules")
}

fn is_always_included(suffix: &Path) -> bool {
    suffix
        .to_str()
        .map(|s| ALWAYS_INCLUDED.contains(&s))
        .unwrap_or(false)
}

fn matches_any(globs: &[Glob<'static>], suffix: &Path) -> bool {
    let Some(suffix_str) = suffix.to_str() else {
        return false;
    };
    globs.iter().any(|g| g.is_match(suffix_str))
}

fn make_dir_copy(dir: &Path, #[allow(unused_variables)] src_metadata: &Metadata) -> Result<(), Error> {
    let mut builder = DirBuilder::new();
    #[cfg(not(windows))]
    {
        use std::os::unix::{fs::DirBuilderExt, prelude::MetadataExt};
        builder.mode(src_metadata.mode());
    }
    builder.recursive(true);
    builder.create(dir)?;
    Ok(())
}

pub fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<(), Error> {
    let from = from.as_ref();
    let metadata = fs::symlink_metadata(from)?;
    copy_file_with_type(from, metadata.file_type(), to)
}

fn copy_file_with_type(from: &Path, from_type: FileType, to: impl AsRef<Path>) -> Result<(), Error> {
    let to = to.as_ref();
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if from_type.is_symlink() {
        let target = fs::read_link(from)?;
        if fs::symlink_metadata(to).is_ok() {
            fs::remove_file(to)?;
        }
        symlink(&target, to)?;
        Ok(())
    } else {
        fs::copy(from, to)?;
        Ok(())
    }
}

#[cfg(unix)]
fn symlink(original: &PathBuf, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &PathBuf, link: &Path) -> io::Result<()> {
    if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    }
}

/// `camino`-typed convenience wrapper, matching the rest of the export pipeline's
/// preference for UTF-8 paths over raw `std::path::Path`.
pub fn copy_publishable_subset_utf8(
    src: &Utf8Path,
    dst: &Utf8Path,
    files: &[String],
) -> Result<(), Error> {
    copy_publishable_subset(src.as_std_path(), dst.as_std_path(), files)
}
