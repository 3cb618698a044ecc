//! Package downloads and digest verification

use async_trait::async_trait;
use futures_util::StreamExt;
use md5::{Digest, Md5};
use reqwest::header::CONTENT_LENGTH;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use xext_core::types::NetworkConfig;
use xext_core::{Error, Result};

/// Chunk size for hashing (1MB)
const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Progress callback receiving a fraction from 0 to 1
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Fetches a package archive to a local file
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path, on_progress: ProgressFn<'_>) -> Result<()>;
}

/// [`Downloader`] streaming over HTTP
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&network.user_agent)
            .connect_timeout(Duration::from_secs(network.http_timeout_secs))
            .timeout(Duration::from_secs(network.download_timeout_secs))
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path, on_progress: ProgressFn<'_>) -> Result<()> {
        info!("Downloading {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::download(url, e))?;

        if !response.status().is_success() {
            return Err(Error::download(
                url,
                format!("server responded with {}", response.status()),
            ));
        }

        let total_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;

        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::download(url, e))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if total_size > 0 {
                on_progress(downloaded as f64 / total_size as f64);
            }
        }
        file.flush().await?;
        on_progress(1.0);

        debug!("Downloaded {} bytes to {:?}", downloaded, dest);
        Ok(())
    }
}

/// Hex MD5 digest of a file
pub fn file_md5(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check a downloaded file against a declared digest
pub fn verify_md5(name: &str, path: &Path, expected: &str) -> Result<()> {
    let actual = file_md5(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(Error::digest_mismatch(name, expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_md5_verification() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("pkg.zip");
        std::fs::write(&file, "hello").unwrap();

        assert_eq!(file_md5(&file).unwrap(), "5d41402abc4b2a76b9719d911017c592");
        assert!(verify_md5("pkg", &file, "5D41402ABC4B2A76B9719D911017C592").is_ok());
        let err = verify_md5("pkg", &file, "00000000000000000000000000000000").unwrap_err();
        assert_eq!(err.code(), "EXT_DIGEST_MISMATCH");
    }

    #[tokio::test]
    async fn test_http_download_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pkg.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("cache/pkg.zip");
        let downloader = HttpDownloader::new(&NetworkConfig::default()).unwrap();
        let last = AtomicU64::new(0);
        let on_progress = |p: f64| last.store((p * 100.0) as u64, Ordering::SeqCst);

        downloader
            .download(&format!("{}/pkg.zip", server.uri()), &dest, &on_progress)
            .await
            .unwrap();

        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 4096);
        assert_eq!(last.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_http_download_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let downloader = HttpDownloader::new(&NetworkConfig::default()).unwrap();
        let err = downloader
            .download(&format!("{}/missing.zip", server.uri()), &temp.path().join("x"), &|_| {})
            .await
            .unwrap_err();
        assert_eq!(err.code(), "EXT_DOWNLOAD_ERROR");
    }
}
