//! Capability-based file helpers for writing report artefacts.
//!
//! Every helper resolves an ambient directory once and performs the actual
//! I/O through a `cap-std` [`fs_utf8::Dir`], so paths are handled as UTF-8
//! throughout.
#![forbid(unsafe_code)]

use std::io;
use std::path::Component;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Open the parent directory of `path` and return it with the file name.
///
/// # Errors
///
/// Fails when `path` has no file name or the parent cannot be opened.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?
        .to_owned();
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Create every missing directory above `path`.
///
/// # Errors
///
/// Propagates failures to open the nearest root or to create directories.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }
    let (root, relative) = split_root(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    root.create_dir_all(&relative)
}

/// Write `contents` to `path` through a temporary sibling and a rename.
///
/// Readers never observe a half-written report.
///
/// # Errors
///
/// Propagates write and rename failures; the temporary file is removed on
/// a failed rename.
pub fn write_utf8_file(path: &Utf8Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, name) = open_dir_and_file(path)?;
    let staging = format!(".{name}.partial");
    dir.write(&staging, contents)?;
    dir.rename(&staging, &dir, &name).inspect_err(|_| {
        let _ignored = dir.remove_file(&staging);
    })
}

/// Split `parent` into an ambient root directory and a path relative to it.
fn split_root(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();
    let root = match std_parent.components().next() {
        Some(Component::Prefix(prefix)) => {
            let drive = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(format!("{drive}{}", std::path::MAIN_SEPARATOR))
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => Utf8PathBuf::from("."),
    };
    let relative = if root.as_str() == "." {
        parent.to_path_buf()
    } else {
        parent
            .strip_prefix(&root)
            .map_err(|_| io::Error::other(format!("{parent} is not below {root}")))?
            .to_path_buf()
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&root, ambient_authority())?;
    Ok((dir, relative))
}
