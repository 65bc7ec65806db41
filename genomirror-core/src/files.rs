//! Filesystem plumbing: checksums, decompression, symlinks and tree copies.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{GenomirrorError, RemoteError, Result};

/// Lowercase hex MD5 of a file's contents.
pub fn md5_hex(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(format!("{:x}", md5::compute(&bytes)))
}

/// Check a downloaded file against the checksum its manifest advertised.
pub fn verify_md5(path: &Path, filename: &str, expected: &str) -> Result<()> {
    let actual = md5_hex(path).map_err(|e| GenomirrorError::io(path, e))?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(RemoteError::ChecksumMismatch {
            filename: filename.to_string(),
            expected: expected.to_string(),
            actual,
        }
        .into())
    }
}

/// Decompress a `.gz` file next to itself and delete the compressed copy.
///
/// Returns the path of the usable file: the decompressed one, or `path`
/// untouched when it is not gzipped.
pub fn gunzip_in_place(path: &Path) -> Result<PathBuf> {
    if path.extension().is_none_or(|ext| ext != "gz") {
        return Ok(path.to_path_buf());
    }
    let out_path = path.with_extension("");

    let input = File::open(path).map_err(|e| GenomirrorError::io(path, e))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(input));
    let output = File::create(&out_path).map_err(|e| GenomirrorError::io(&out_path, e))?;
    let mut writer = BufWriter::new(output);
    if let Err(e) = io::copy(&mut decoder, &mut writer) {
        let _ = fs::remove_file(&out_path);
        return Err(GenomirrorError::io(path, e));
    }
    writer
        .into_inner()
        .map_err(|e| GenomirrorError::io(&out_path, e.into_error()))?;

    fs::remove_file(path).map_err(|e| GenomirrorError::io(path, e))?;
    debug!(file = %out_path.display(), "decompressed");
    Ok(out_path)
}

/// Sorted, space-separated extensions (with the dot) of the non-empty
/// regular files directly inside `dir`. `None` when there are none.
pub fn file_types(dir: &Path) -> Result<Option<String>> {
    let mut exts = BTreeSet::new();
    for entry in fs::read_dir(dir).map_err(|e| GenomirrorError::io(dir, e))? {
        let entry = entry.map_err(|e| GenomirrorError::io(dir, e))?;
        let meta = entry
            .metadata()
            .map_err(|e| GenomirrorError::io(entry.path(), e))?;
        if !meta.is_file() || meta.len() == 0 {
            continue;
        }
        if let Some(ext) = entry.path().extension() {
            exts.insert(format!(".{}", ext.to_string_lossy()));
        }
    }
    if exts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(exts.into_iter().collect::<Vec<_>>().join(" ")))
    }
}

/// Whether `path` itself (not its target) is a symlink.
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Whether anything, even a dangling symlink, occupies `path`.
pub fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(unix)]
pub fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Point `link` at `target`, replacing whatever link is there.
///
/// The new link is created under a temporary name and renamed over the old
/// one, so readers never observe a missing path. A real directory sitting
/// at `link` is removed first.
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if path_occupied(link) && !is_symlink(link) {
        warn!(path = %link.display(), "replacing a real directory with a symlink");
        fs::remove_dir_all(link).map_err(|e| GenomirrorError::io(link, e))?;
    }

    let file_name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = link.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()));
    if path_occupied(&tmp) {
        fs::remove_file(&tmp).map_err(|e| GenomirrorError::io(&tmp, e))?;
    }
    symlink_dir(target, &tmp).map_err(|e| GenomirrorError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, link) {
        let _ = fs::remove_file(&tmp);
        return Err(GenomirrorError::io(link, e));
    }
    Ok(())
}

/// Remove a symlink without touching its target.
pub fn remove_symlink(link: &Path) -> Result<()> {
    fs::remove_file(link)
        .or_else(|_| fs::remove_dir(link))
        .map_err(|e| GenomirrorError::io(link, e))
}

/// Recursively copy `src` into a new directory `dst`, following symlinks
/// inside the tree so the copy owns real files.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    if path_occupied(dst) {
        return Err(GenomirrorError::io(
            dst,
            io::Error::new(io::ErrorKind::AlreadyExists, "copy destination exists"),
        ));
    }
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            GenomirrorError::io(path, e.into())
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let out = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&out).map_err(|e| GenomirrorError::io(&out, e))?;
        } else {
            fs::copy(entry.path(), &out).map_err(|e| GenomirrorError::io(&out, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove a genome or version path from disk: symlinks are unlinked, trees
/// are deleted. Returns `false` if nothing was there.
pub fn remove_path(path: &Path) -> Result<bool> {
    if is_symlink(path) {
        remove_symlink(path)?;
        Ok(true)
    } else if path.is_dir() {
        fs::remove_dir_all(path).map_err(|e| GenomirrorError::io(path, e))?;
        Ok(true)
    } else if path.exists() {
        fs::remove_file(path).map_err(|e| GenomirrorError::io(path, e))?;
        Ok(true)
    } else {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    #[test]
    fn md5_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello world").unwrap();
        assert_eq!(md5_hex(&path).unwrap(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
        verify_md5(&path, "a.txt", "5EB63BBBE01EEED093CB22BB8F5ACDC3").unwrap();

        let err = verify_md5(&path, "a.txt", "00").unwrap_err();
        assert!(matches!(
            err,
            GenomirrorError::Remote(RemoteError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn gunzip_replaces_compressed_file() {
        let dir = tempfile::tempdir().unwrap();
        let gz = dir.path().join("genome.fna.gz");
        let mut enc = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        enc.write_all(b">NC_1.1\nACGT\n").unwrap();
        enc.finish().unwrap();

        let out = gunzip_in_place(&gz).unwrap();
        assert_eq!(out, dir.path().join("genome.fna"));
        assert_eq!(fs::read_to_string(&out).unwrap(), ">NC_1.1\nACGT\n");
        assert!(!gz.exists());

        let plain = dir.path().join("md5checksums.txt");
        fs::write(&plain, "x").unwrap();
        assert_eq!(gunzip_in_place(&plain).unwrap(), plain);
    }

    #[test]
    fn file_types_skip_empty_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.gbff"), "x").unwrap();
        fs::write(dir.path().join("b.fna"), "x").unwrap();
        fs::write(dir.path().join("c.fna"), "x").unwrap();
        fs::write(dir.path().join("empty.faa"), "").unwrap();
        fs::write(dir.path().join("README"), "x").unwrap();
        fs::create_dir(dir.path().join("sub.d")).unwrap();

        assert_eq!(
            file_types(dir.path()).unwrap().as_deref(),
            Some(".fna .gbff")
        );

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(file_types(empty.path()).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn replace_symlink_swaps_target() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();
        let link = dir.path().join("current");

        replace_symlink(&a, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), a);
        replace_symlink(&b, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), b);

        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        replace_symlink(&a, &real).unwrap();
        assert!(is_symlink(&real));
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_materializes_symlinked_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.gbff"), "gbff").unwrap();
        fs::write(src.join("nested/b.txt"), "b").unwrap();
        let via_link = dir.path().join("link");
        symlink_dir(&src, &via_link).unwrap();

        let dst = dir.path().join("dst");
        assert_eq!(copy_tree(&via_link, &dst).unwrap(), 2);
        assert!(!is_symlink(&dst));
        assert_eq!(fs::read_to_string(dst.join("nested/b.txt")).unwrap(), "b");

        assert!(copy_tree(&src, &dst).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn remove_path_leaves_link_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("f"), "x").unwrap();
        let link = dir.path().join("link");
        symlink_dir(&target, &link).unwrap();

        assert!(remove_path(&link).unwrap());
        assert!(target.join("f").exists());
        assert!(remove_path(&target).unwrap());
        assert!(!remove_path(&target).unwrap());
    }
}
