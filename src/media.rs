// src/media.rs
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};

/// Stable on-disk key for an item's media file, derived from the item id.
/// A fixed hash keeps keys identical across runs and keeps URL characters
/// out of filenames.
pub fn media_key(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("{:016x}.jpg", u64::from_be_bytes(prefix))
}

/// Download `url` into `dest`. The body is staged under a `.part` name and
/// renamed only once fully received, so `dest` never holds a partial file.
pub async fn fetch_image(
    client: &Client,
    url: &str,
    dest: &Path,
    timeout: Duration,
) -> Result<()> {
    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    let resp = resp
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;
    let body = resp
        .bytes()
        .await
        .with_context(|| format!("reading body of {url}"))?;

    if let Some(dir) = dest.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating media dir {}", dir.display()))?;
    }
    let staged = dest.with_extension("part");
    tokio::fs::write(&staged, &body)
        .await
        .with_context(|| format!("writing {}", staged.display()))?;
    tokio::fs::rename(&staged, dest)
        .await
        .with_context(|| format!("renaming into {}", dest.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_key_is_stable_and_filename_safe() {
        let id = "https://idolmaster-official.jp/news/12345?ref=top";
        let key = media_key(id);
        assert_eq!(key, media_key(id));
        assert_eq!(key.len(), "0123456789abcdef.jpg".len());
        assert!(key.ends_with(".jpg"));
        assert!(key
            .trim_end_matches(".jpg")
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, media_key("https://idolmaster-official.jp/news/12346"));
    }

    #[tokio::test]
    async fn download_lands_under_final_name_only() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/thumb.jpg")
            .with_status(200)
            .with_body("jpeg-bytes")
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join(media_key("news/1"));
        let client = Client::new();
        fetch_image(
            &client,
            &format!("{}/thumb.jpg", server.url()),
            &dest,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg-bytes");
        assert!(!dest.with_extension("part").exists());
    }

    #[tokio::test]
    async fn non_2xx_is_an_error_and_leaves_no_file() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/gone.jpg")
            .with_status(404)
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join(media_key("news/404"));
        let client = Client::new();
        let err = fetch_image(
            &client,
            &format!("{}/gone.jpg", server.url()),
            &dest,
            Duration::from_secs(5),
        )
        .await;

        assert!(err.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
