//! Unpacks a downloaded artifact archive.

use async_zip::base::read::stream::{Ready, ZipFileReader};
use futures::io::{AsyncBufRead, AsyncWriteExt as _};
use tokio_util::compat::TokioAsyncWriteCompatExt as _;

use std::path::{Path, PathBuf};

use crate::error::RelayResult;

fn sanitize_file_path(path: &str) -> PathBuf {
    // Replaces backwards slashes
    path.replace('\\', "/")
        // Sanitizes each component
        .split('/')
        .map(sanitize_filename::sanitize)
        .collect()
}

/// Extracts a zip archive read from `reader` into `path`, creating the
/// directory fresh and sanitizing every entry path.
///
/// # Errors
///
/// Returns an error if the archive is malformed or a file cannot be written.
pub async fn extract_archive<R, P>(reader: R, path: P) -> RelayResult<()>
where
    R: AsyncBufRead + Unpin,
    P: AsRef<Path> + Send + Sync,
{
    drop(tokio::fs::remove_dir_all(&path).await);
    tokio::fs::create_dir_all(&path).await?;

    let mut ready: ZipFileReader<Ready<R>> = ZipFileReader::new(reader);

    loop {
        let Some(mut reading) = ready.next_with_entry().await? else {
            break;
        };

        let entry_path = {
            let entry = reading.reader().entry();
            entry.filename().as_str().ok().map(str::to_owned)
        };
        let Some(name) = entry_path else {
            ready = reading.skip().await?;
            continue;
        };
        let p = path.as_ref().join(sanitize_file_path(&name));

        if name.ends_with('/') {
            // Is a directory
            if !p.exists() {
                tokio::fs::create_dir_all(&p).await?;
            }
        } else {
            // Creates parent directories. They may not exist if iteration is out of order or the archive does not contain directory entries
            if let Some(parent) = p.parent()
                && !parent.is_dir()
            {
                tokio::fs::create_dir_all(parent).await?;
            }

            let mut writer = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&p)
                .await?
                .compat_write();
            futures::io::copy(reading.reader_mut(), &mut writer).await?;
            writer.flush().await?;
        }

        ready = reading.done().await?;
    }

    Ok(())
}
