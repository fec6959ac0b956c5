//! Voice file downloads and cache lookup.

use super::catalog::{Catalog, file_url};
use crate::error::{BenchError, Result};
use crate::model_integrity;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fetches a URL into a local file.
pub trait Downloader {
    /// Download `url` to `dest`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the write fails. `dest` must be
    /// left untouched on failure.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking HTTP downloader with a terminal progress bar.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    show_progress: bool,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self {
            show_progress: true,
        }
    }

    /// Disable the progress bar (for tests and non-interactive use).
    pub fn quiet() -> Self {
        Self {
            show_progress: false,
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_owned());

        let resp = ureq::get(url)
            .call()
            .map_err(|e| BenchError::Download(format!("failed to download {url}: {e}")))?;

        let total_bytes = resp
            .header("content-length")
            .and_then(|v| v.parse::<u64>().ok());

        let pb = if self.show_progress {
            ProgressBar::new(total_bytes.unwrap_or(0))
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template(
            "  {msg} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} ETA {eta}",
        ) {
            pb.set_style(style);
        }
        pb.set_message(name);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write to `<dest>.part`, then rename into place.
        let tmp = part_path(dest);
        let result = std::fs::File::create(&tmp)
            .map_err(BenchError::from)
            .and_then(|file| copy_with_progress(resp.into_reader(), file, &pb, url));
        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        pb.finish();

        std::fs::rename(&tmp, dest)?;
        debug!("downloaded {url} to {}", dest.display());
        Ok(())
    }
}

/// Stream `reader` into `file`, advancing `pb` per chunk.
fn copy_with_progress(
    mut reader: impl Read,
    mut file: std::fs::File,
    pb: &ProgressBar,
    url: &str,
) -> Result<()> {
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| BenchError::Download(format!("download read error for {url}: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        pb.inc(n as u64);
    }
    file.flush()?;
    Ok(())
}

/// `<dest>.part`, keeping the original extension visible.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Make sure every file of voice `name` is present and intact in one of `data_dirs`.
///
/// Missing or corrupt files are downloaded from `base_url` into
/// `download_dir`, flattened to their base names. Returns the canonical
/// catalog key, so an alias resolves to the files of its voice.
///
/// # Errors
///
/// Returns [`BenchError::VoiceNotFound`] for names not in `catalog`,
/// [`BenchError::Integrity`] for voices listing no files, and download
/// errors otherwise.
pub fn ensure_voice_exists<D: Downloader + ?Sized>(
    name: &str,
    data_dirs: &[PathBuf],
    download_dir: &Path,
    catalog: &Catalog,
    base_url: &str,
    downloader: &D,
) -> Result<String> {
    let voice = catalog
        .get(name)
        .ok_or_else(|| BenchError::VoiceNotFound(name.to_owned()))?;

    if voice.files.is_empty() {
        return Err(BenchError::Integrity(format!(
            "unable to find or download voice: {name}"
        )));
    }
    if voice.is_alias {
        info!("voice {name} is an alias of {}", voice.key);
    }

    let mut to_download = BTreeSet::new();
    for (file_path, file_info) in &voice.files {
        let file_name = base_name(file_path);
        let present = data_dirs.iter().any(|dir| {
            let result = model_integrity::verify(
                &dir.join(file_name),
                file_info.size_bytes,
                file_info.md5_digest.as_deref(),
            );
            debug!("{}: {result}", dir.join(file_name).display());
            result.is_usable()
        });
        if !present {
            to_download.insert(file_path.as_str());
        }
    }

    if to_download.is_empty() {
        info!("voice {} already cached", voice.key);
        return Ok(voice.key.clone());
    }

    std::fs::create_dir_all(download_dir)?;
    for file_path in to_download {
        let url = file_url(base_url, file_path);
        let dest = download_dir.join(base_name(file_path));
        println!("Downloading {url} to {}", dest.display());
        downloader.download(&url, &dest)?;
    }

    Ok(voice.key.clone())
}

/// Locate `<name>.onnx` and `<name>.onnx.json` in the first data dir that has both.
///
/// # Errors
///
/// Returns [`BenchError::Integrity`] if no data dir holds both files.
pub fn find_voice(name: &str, data_dirs: &[PathBuf]) -> Result<(PathBuf, PathBuf)> {
    for dir in data_dirs {
        let onnx_path = dir.join(format!("{name}.onnx"));
        let config_path = dir.join(format!("{name}.onnx.json"));
        if onnx_path.is_file() && config_path.is_file() {
            return Ok((onnx_path, config_path));
        }
    }
    Err(BenchError::Integrity(format!("missing files for voice {name}")))
}

fn base_name(file_path: &str) -> &str {
    file_path.rsplit('/').next().unwrap_or(file_path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::voices::catalog::{FileInfo, VoiceInfo};
    use std::cell::RefCell;

    /// Serves canned bodies and records every requested URL.
    struct FakeDownloader {
        body: Vec<u8>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeDownloader {
        fn new(body: &[u8]) -> Self {
            Self {
                body: body.to_vec(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Downloader for FakeDownloader {
        fn download(&self, url: &str, dest: &Path) -> Result<()> {
            self.calls.borrow_mut().push(url.to_owned());
            std::fs::write(dest, &self.body)?;
            Ok(())
        }
    }

    fn voice(key: &str, files: &[(&str, &[u8])]) -> VoiceInfo {
        VoiceInfo {
            key: key.to_owned(),
            name: String::new(),
            language: Default::default(),
            quality: String::new(),
            num_speakers: 1,
            speaker_id_map: Default::default(),
            files: files
                .iter()
                .map(|(path, body)| {
                    (
                        (*path).to_owned(),
                        FileInfo {
                            size_bytes: Some(body.len() as u64),
                            md5_digest: Some(format!("{:x}", md5::compute(body))),
                        },
                    )
                })
                .collect(),
            aliases: Vec::new(),
            is_alias: false,
        }
    }

    #[test]
    fn unknown_voice_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeDownloader::new(b"");
        let err = ensure_voice_exists(
            "nope",
            &[dir.path().to_path_buf()],
            dir.path(),
            &Catalog::new(),
            "http://h",
            &fake,
        )
        .unwrap_err();
        assert!(matches!(err, BenchError::VoiceNotFound(n) if n == "nope"));
        assert!(fake.calls.borrow().is_empty());
    }

    #[test]
    fn voice_without_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();
        catalog.insert("v".into(), voice("v", &[]));
        let fake = FakeDownloader::new(b"");
        let result = ensure_voice_exists("v", &[], dir.path(), &catalog, "http://h", &fake);
        assert!(matches!(result, Err(BenchError::Integrity(_))));
    }

    #[test]
    fn missing_files_are_downloaded_flat() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();
        catalog.insert("v".into(), voice("v", &[("en/v/v.onnx", b"body")]));
        let fake = FakeDownloader::new(b"body");

        let key = ensure_voice_exists(
            "v",
            &[dir.path().to_path_buf()],
            dir.path(),
            &catalog,
            "http://h/base",
            &fake,
        )
        .unwrap();

        assert_eq!(key, "v");
        assert_eq!(*fake.calls.borrow(), vec!["http://h/base/en/v/v.onnx".to_owned()]);
        assert_eq!(std::fs::read(dir.path().join("v.onnx")).unwrap(), b"body");
    }

    #[test]
    fn intact_files_are_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("v.onnx"), b"body").unwrap();
        let mut catalog = Catalog::new();
        catalog.insert("v".into(), voice("v", &[("en/v/v.onnx", b"body")]));
        let fake = FakeDownloader::new(b"body");

        ensure_voice_exists(
            "v",
            &[dir.path().to_path_buf()],
            dir.path(),
            &catalog,
            "http://h",
            &fake,
        )
        .unwrap();
        assert!(fake.calls.borrow().is_empty());
    }

    #[test]
    fn corrupt_files_are_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("v.onnx"), b"bodx").unwrap();
        let mut catalog = Catalog::new();
        catalog.insert("v".into(), voice("v", &[("en/v/v.onnx", b"body")]));
        let fake = FakeDownloader::new(b"body");

        ensure_voice_exists(
            "v",
            &[dir.path().to_path_buf()],
            dir.path(),
            &catalog,
            "http://h",
            &fake,
        )
        .unwrap();
        assert_eq!(fake.calls.borrow().len(), 1);
        assert_eq!(std::fs::read(dir.path().join("v.onnx")).unwrap(), b"body");
    }

    #[test]
    fn alias_returns_canonical_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut real = voice("en_US-real-low", &[("en/r.onnx", b"x")]);
        real.aliases.push("old-name".into());
        let mut catalog = Catalog::new();
        catalog.insert(real.key.clone(), real);
        let catalog = crate::voices::catalog::with_aliases(catalog);
        let fake = FakeDownloader::new(b"x");

        let key = ensure_voice_exists(
            "old-name",
            &[dir.path().to_path_buf()],
            dir.path(),
            &catalog,
            "http://h",
            &fake,
        )
        .unwrap();
        assert_eq!(key, "en_US-real-low");
    }

    #[test]
    fn files_without_checksums_count_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("v.onnx"), b"anything").unwrap();
        let mut v = voice("v", &[]);
        v.files.insert("en/v.onnx".into(), FileInfo::default());
        v.files.insert("en/v.onnx.json".into(), FileInfo::default());
        let mut catalog = Catalog::new();
        catalog.insert("v".into(), v);
        let fake = FakeDownloader::new(b"{}");

        ensure_voice_exists(
            "v",
            &[dir.path().to_path_buf()],
            dir.path(),
            &catalog,
            "http://h",
            &fake,
        )
        .unwrap();
        assert_eq!(*fake.calls.borrow(), vec!["http://h/en/v.onnx.json".to_owned()]);
    }

    #[test]
    fn find_voice_requires_model_and_config() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("v.onnx"), b"m").unwrap();
        std::fs::write(second.path().join("v.onnx"), b"m").unwrap();
        std::fs::write(second.path().join("v.onnx.json"), b"{}").unwrap();
        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];

        let (model, config) = find_voice("v", &dirs).unwrap();
        assert_eq!(model, second.path().join("v.onnx"));
        assert_eq!(config, second.path().join("v.onnx.json"));

        assert!(find_voice("v", &dirs[..1]).is_err());
    }

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/c/v.onnx")),
            PathBuf::from("/c/v.onnx.part")
        );
    }

    #[test]
    fn failed_copy_reports_read_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("connection reset"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let file = std::fs::File::create(dir.path().join("v.onnx.part")).unwrap();
        let err = copy_with_progress(Broken, file, &ProgressBar::hidden(), "http://h/v").unwrap_err();
        assert!(matches!(err, BenchError::Download(m) if m.contains("connection reset")));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_failure_is_an_io_error() {
        // /dev/full accepts opens but fails every write with ENOSPC.
        let file = std::fs::OpenOptions::new().write(true).open("/dev/full").unwrap();
        let err = copy_with_progress(&b"voice"[..], file, &ProgressBar::hidden(), "http://h/v")
            .unwrap_err();
        assert!(matches!(err, BenchError::Io(_)));
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("en/en_US/x/high/x.onnx.json"), "x.onnx.json");
        assert_eq!(base_name("voices.json"), "voices.json");
    }
}
