//! Extension package archives
//!
//! Packages ship as zip files (`.zip` or `.xext`) or tarballs. Every entry
//! path is sanitized so that nothing is written outside the destination.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use zip::ZipArchive;

use xext_core::types::MANIFEST_FILE;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveKind {
    /// Detect the format from the file header, falling back to the extension
    pub fn detect(path: &Path) -> Option<Self> {
        let mut header = [0u8; 262];
        let read = File::open(path)
            .and_then(|mut file| file.read(&mut header))
            .unwrap_or(0);
        let header = &header[..read];

        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            return Some(Self::Zip);
        }
        if header.starts_with(&[0x1f, 0x8b]) {
            return Some(Self::TarGz);
        }
        if header.len() >= 262 && &header[257..262] == b"ustar" {
            return Some(Self::Tar);
        }

        let name = path.file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".zip") || name.ends_with(".xext") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Whether a file looks like an extension package
pub fn is_package_file(path: &Path) -> bool {
    path.is_file() && ArchiveKind::detect(path).is_some()
}

fn sanitize_entry_path(path: &Path) -> Result<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                bail!("archive entry escapes destination: {}", path.display());
            }
            Component::CurDir => {}
            Component::Normal(part) => cleaned.push(part),
        }
    }
    if cleaned.as_os_str().is_empty() {
        bail!("archive entry has empty path");
    }
    Ok(cleaned)
}

/// Extract `archive` into `dest`, creating `dest` when missing
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
    match ArchiveKind::detect(archive) {
        Some(ArchiveKind::Zip) => extract_zip(archive, dest),
        Some(ArchiveKind::Tar) => extract_tar(archive, dest, false),
        Some(ArchiveKind::TarGz) => extract_tar(archive, dest, true),
        None => bail!("unsupported archive: {}", archive.display()),
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file =
        File::open(archive_path).with_context(|| format!("open {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file).context("read zip archive")?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("read zip entry")?;
        let raw = entry.name().replace('\\', "/");
        let rel = sanitize_entry_path(Path::new(&raw))?;
        let out = dest.join(&rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file =
            File::create(&out).with_context(|| format!("create {}", out.display()))?;
        io::copy(&mut entry, &mut out_file)
            .with_context(|| format!("extract {}", out.display()))?;
    }
    Ok(())
}

fn extract_tar(archive_path: &Path, dest: &Path, gzipped: bool) -> Result<()> {
    let file =
        File::open(archive_path).with_context(|| format!("open {}", archive_path.display()))?;
    let reader: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut archive = Archive::new(reader);
    for entry in archive.entries().context("read tar entries")? {
        let mut entry = entry.context("read tar entry")?;
        let raw = entry.path().context("read tar path")?.to_path_buf();
        let rel = sanitize_entry_path(&raw)?;
        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            bail!("archive entry is a link: {}", raw.display());
        }
        let unpacked = entry
            .unpack_in(dest)
            .with_context(|| format!("extract {}", rel.display()))?;
        if !unpacked {
            bail!("archive entry escapes destination: {}", raw.display());
        }
    }
    Ok(())
}

/// Directory holding the manifest inside an extracted package
///
/// Packages built by npm-style tools wrap their files in a single top-level
/// directory; that directory is used when the root has no manifest.
pub fn package_root(extract_dir: &Path) -> PathBuf {
    if extract_dir.join(MANIFEST_FILE).is_file() {
        return extract_dir.to_path_buf();
    }
    let dirs: Vec<PathBuf> = fs::read_dir(extract_dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
                .map(|entry| entry.path())
                .collect()
        })
        .unwrap_or_default();
    match dirs.as_slice() {
        [single] if single.join(MANIFEST_FILE).is_file() => single.clone(),
        _ => extract_dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_sanitize_rejects_escapes() {
        assert!(sanitize_entry_path(Path::new("../evil")).is_err());
        assert!(sanitize_entry_path(Path::new("/etc/passwd")).is_err());
        assert!(sanitize_entry_path(Path::new("./")).is_err());
        assert_eq!(
            sanitize_entry_path(Path::new("./a/b.txt")).unwrap(),
            PathBuf::from("a/b.txt")
        );
    }

    #[test]
    fn test_extract_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pkg.xext");
        write_zip(&archive, &[("package.json", "{}"), ("lib/index.js", "1")]);

        assert_eq!(ArchiveKind::detect(&archive), Some(ArchiveKind::Zip));
        let dest = temp.path().join("out");
        extract(&archive, &dest).unwrap();
        assert!(dest.join("package.json").is_file());
        assert!(dest.join("lib/index.js").is_file());
    }

    #[test]
    fn test_extract_zip_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bad.zip");
        write_zip(&archive, &[("../escape.txt", "x")]);
        assert!(extract(&archive, &temp.path().join("out")).is_err());
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn test_extract_tar_gz() {
        let temp = TempDir::new().unwrap();
        let archive_path = temp.path().join("pkg.tgz");
        {
            let file = File::create(&archive_path).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let content = b"{\"name\":\"t\"}";
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "package/package.json", &content[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        assert_eq!(ArchiveKind::detect(&archive_path), Some(ArchiveKind::TarGz));
        let dest = temp.path().join("out");
        extract(&archive_path, &dest).unwrap();
        assert_eq!(package_root(&dest), dest.join("package"));
    }

    #[test]
    fn test_extract_tar_rejects_links() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        let archive_path = temp.path().join("bad.tar");
        {
            let file = File::create(&archive_path).unwrap();
            let mut builder = tar::Builder::new(file);
            let mut link = tar::Header::new_gnu();
            link.set_entry_type(tar::EntryType::Symlink);
            link.set_size(0);
            link.set_mode(0o777);
            builder.append_link(&mut link, "link", &outside).unwrap();

            let content = b"owned";
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "link/escaped.txt", &content[..])
                .unwrap();
            builder.finish().unwrap();
        }

        let dest = temp.path().join("out");
        let err = extract(&archive_path, &dest).unwrap_err();
        assert!(err.to_string().contains("link"));
        assert!(!outside.join("escaped.txt").exists());
        assert!(fs::symlink_metadata(dest.join("link")).is_err());
    }

    #[test]
    fn test_unknown_file_is_not_package() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();
        assert!(!is_package_file(&path));
        assert!(extract(&path, &temp.path().join("out")).is_err());
    }
}
