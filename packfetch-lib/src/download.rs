//! Download response bodies to files.
//!
//! The target file name is taken from, in this order:
//!
//! 1. the name passed by the caller
//! 2. a `Content-Disposition: attachment; filename="..."` header
//! 3. the last segment of the final URL, after redirects
//!
//! The body is streamed into a uniquely named `.part` file next to the
//! target, which is renamed once everything is written and synced. A failed
//! download leaves neither the target nor the partial file behind.

use http::HeaderMap;
use http::header::CONTENT_DISPOSITION;
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::Response;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempPath;
use tokio::fs::{DirBuilder, File};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::parse_url;
use crate::ratelimit::HostKey;
use crate::{Client, ErrorKind, Result};

/// Permissions of created download directories
#[cfg(unix)]
const DIRECTORY_MODE: u32 = 0o755;
/// Permissions of downloaded files
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

static CONTENT_DISPOSITION_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)attachment;\s*filename\s*=\s*(?:"([^"]*)"|([^;\s"]+))"#)
        .expect("valid content disposition pattern")
});

impl Client {
    /// Download `url` into `destination_dir` and return the path written.
    ///
    /// `file_name` overrides the name derived from the response; `None` or
    /// an empty string lets the response decide. The directory is created
    /// with all missing parents.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::DownloadStatus`] if the server does not answer with a
    ///   success status
    /// - [`ErrorKind::UnknownFileName`] if no file name can be determined
    /// - [`ErrorKind::CreateDirectory`], [`ErrorKind::CreateFile`],
    ///   [`ErrorKind::WriteFile`], [`ErrorKind::CloseFile`] or
    ///   [`ErrorKind::PersistFile`] if writing to disk fails
    /// - any error of [`Client::send`]
    pub async fn download_file(
        &self,
        url: &str,
        destination_dir: impl AsRef<Path>,
        file_name: Option<&str>,
    ) -> Result<PathBuf> {
        let url = parse_url(url)?;
        let host = HostKey::try_from(&url)?;
        let request = self.get_request(url, HeaderMap::new())?;

        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ErrorKind::DownloadStatus(status, response.url().clone()));
        }

        let name = resolve_file_name(file_name, response.headers(), response.url())
            .ok_or_else(|| ErrorKind::UnknownFileName(response.url().clone()))?;
        log::debug!("Downloading {} as {name}", response.url());

        let destination_dir = destination_dir.as_ref();
        create_dir_all(destination_dir).await?;
        let dir = std::path::absolute(destination_dir)
            .map_err(|e| ErrorKind::CreateDirectory(destination_dir.to_path_buf(), e))?;
        let path = dir.join(&name);

        write_body(response, &dir, &path, &host, &self.cancel).await?;
        Ok(path)
    }
}

/// Pick the file name for a download, or `None` if there is none.
///
/// Names taken from the response are reduced to their last path component,
/// so a server cannot direct the file outside of the destination directory.
pub(crate) fn resolve_file_name(
    explicit: Option<&str>,
    headers: &HeaderMap,
    url: &Url,
) -> Option<String> {
    if let Some(name) = explicit.filter(|name| !name.is_empty()) {
        return Some(name.to_string());
    }

    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(file_name_from_disposition)
        .or_else(|| file_name_from_url(url))
}

fn file_name_from_disposition(value: &str) -> Option<String> {
    let captures = CONTENT_DISPOSITION_FILENAME.captures(value)?;
    let name = captures.get(1).or_else(|| captures.get(2))?;
    sanitize(name.as_str())
}

fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    sanitize(&percent_decode_str(segment).decode_utf8_lossy())
}

fn sanitize(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

async fn create_dir_all(dir: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIRECTORY_MODE);

    builder
        .create(dir)
        .await
        .map_err(|e| ErrorKind::CreateDirectory(dir.to_path_buf(), e))
}

/// Create a uniquely named sibling of `path` to stream the body into.
///
/// The name is `<file name>.<random>.part`, so concurrent downloads of the
/// same file do not write into each other. The file is removed when the
/// returned `TempPath` is dropped without being persisted.
fn create_partial_file(dir: &Path, path: &Path) -> Result<(std::fs::File, TempPath)> {
    let mut prefix = OsString::from(path.file_name().unwrap_or_default());
    prefix.push(".");

    let (file, partial) = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| ErrorKind::CreateFile(path.to_path_buf(), e))?
        .into_parts();

    // Temporary files are created owner-only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(FILE_MODE))
            .map_err(|e| ErrorKind::CreateFile(partial.to_path_buf(), e))?;
    }

    Ok((file, partial))
}

async fn write_body(
    response: Response,
    dir: &Path,
    path: &Path,
    host: &HostKey,
    cancel: &CancellationToken,
) -> Result<()> {
    let (file, partial) = create_partial_file(dir, path)?;
    log::trace!("Streaming {} into {}", response.url(), partial.display());

    stream_to_file(response, File::from_std(file), &partial, host, cancel).await?;
    partial
        .persist(path)
        .map_err(|e| ErrorKind::PersistFile(path.to_path_buf(), e.error))
}

async fn stream_to_file(
    mut response: Response,
    mut file: File,
    path: &Path,
    host: &HostKey,
    cancel: &CancellationToken,
) -> Result<()> {
    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(ErrorKind::Cancelled(host.clone())),
            chunk = response.chunk() => chunk.map_err(ErrorKind::ReadResponseBody)?,
        };
        let Some(chunk) = chunk else { break };
        file.write_all(&chunk)
            .await
            .map_err(|e| ErrorKind::WriteFile(path.to_path_buf(), e))?;
    }

    file.flush()
        .await
        .map_err(|e| ErrorKind::CloseFile(path.to_path_buf(), e))?;
    file.sync_all()
        .await
        .map_err(|e| ErrorKind::CloseFile(path.to_path_buf(), e))
}
