//! Atomic file creation and replacement primitives.
//!
//! Both helpers stage the full contents in a hidden temp file next to the
//! target, so a reader can never observe a partially written record. The
//! final step is a single link/rename syscall: it either lands or it
//! doesn't, which is what keeps concurrent writers from tearing a record.

use std::io;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Stage `contents` in a temp file beside `path`.
///
/// The temp name carries a random suffix so two writers never collide on it,
/// and it keeps a `.tmp` extension so directory scans can skip it.
async fn stage(path: &Path, contents: &str) -> io::Result<std::path::PathBuf> {
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4().simple()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .await?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;

    Ok(temp_path)
}

/// Create `path` with `contents`, failing with `ErrorKind::AlreadyExists`
/// if the path is already occupied.
///
/// Uses hard-link promotion rather than a bare `create_new` write: the link
/// call is the uniqueness check and the publish step in one, so two racing
/// creators cannot both succeed and neither can expose a half-written file.
pub(crate) async fn write_new(path: &Path, contents: &str) -> io::Result<()> {
    let temp_path = stage(path, contents).await?;
    let linked = fs::hard_link(&temp_path, path).await;
    let _ = fs::remove_file(&temp_path).await;
    linked
}

/// Replace (or create) `path` with `contents` via rename.
pub(crate) async fn write_replace(path: &Path, contents: &str) -> io::Result<()> {
    let temp_path = stage(path, contents).await?;
    match fs::rename(&temp_path, path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            Err(e)
        }
    }
}
