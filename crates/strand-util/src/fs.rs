use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Read a file to string, replacing invalid UTF-8 sequences with the
/// replacement character. Foreign sources are not guaranteed to be UTF-8.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Atomically replace the file at `path` with `bytes`.
///
/// Writes to a temp file in the same directory, fsyncs, then renames into
/// place. The target either keeps its old contents or gets the new contents
/// in full; a crash or write failure never leaves a partial artifact. The
/// parent directory is created if it does not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created or the write or
/// rename fails. The temp file is removed on failure.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
    }

    // Same directory as the target so the rename stays on one filesystem.
    let stem = path.file_name().and_then(|n| n.to_str()).unwrap_or("out");
    let temp_path = parent.join(format!(".{stem}.{}.tmp", std::process::id()));

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        // Windows rename fails when the target exists; fall back to
        // copy + remove there, clean up the temp file everywhere else.
        if cfg!(windows) && temp_path.exists() {
            fs::copy(&temp_path, path)?;
            let _ = fs::remove_file(&temp_path);
            return Ok(());
        }
        let _ = fs::remove_file(&temp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn read_lossy_replaces_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[b'o', b'k', 0xC0, 0xAF]).unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert!(content.starts_with("ok"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn atomic_write_creates_and_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("bundle.js");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.js");

        atomic_write(&path, b"content").unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["out.js".to_string()]);
    }
}
