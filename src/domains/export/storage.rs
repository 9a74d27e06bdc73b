use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// One token per export call, suffixed onto every temp file it writes.
pub fn temp_token() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Write `data` to `path`, creating the parent directory when needed.
pub async fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, data).await
}

/// Move a finished temp file into place.
/// An existing final file is left untouched and the temp file is discarded.
pub async fn commit(temp: &Path, final_path: &Path) -> io::Result<()> {
    if exists(final_path).await {
        log::debug!("{} already exists, discarding {}", final_path.display(), temp.display());
        remove_quietly(temp).await;
        return Ok(());
    }
    fs::rename(temp, final_path).await
}

/// Write through a temp file so readers never see a partial file.
pub async fn write_atomic(final_path: &Path, token: &str, data: &[u8]) -> io::Result<()> {
    let temp = PathBuf::from(format!("{}.{}", final_path.display(), token));
    if let Err(e) = write_file(&temp, data).await {
        remove_quietly(&temp).await;
        return Err(e);
    }
    let result = commit(&temp, final_path).await;
    if result.is_err() {
        remove_quietly(&temp).await;
    }
    result
}

pub async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Temp files of one export call, removed when the call ends.
/// Files already renamed into place are gone by then, so only strays remain.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    pub async fn cleanup(self) {
        for path in &self.paths {
            if exists(path).await {
                remove_quietly(path).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_token_is_uppercase_uuid() {
        let token = temp_token();
        assert_eq!(token.len(), 36);
        assert_eq!(token, token.to_uppercase());
        assert_ne!(token, temp_token());
    }

    #[tokio::test]
    async fn test_commit_does_not_replace_existing_file() {
        let dir = tempdir().unwrap();
        let final_path = dir.path().join("a.jpg");
        let temp = dir.path().join("a.jpg.TMP");
        write_file(&final_path, b"first").await.unwrap();
        write_file(&temp, b"second").await.unwrap();

        commit(&temp, &final_path).await.unwrap();
        assert_eq!(fs::read(&final_path).await.unwrap(), b"first");
        assert!(!exists(&temp).await);
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let final_path = dir.path().join("nested").join("b.gif");
        write_atomic(&final_path, "TOKEN", b"GIF89a").await.unwrap();
        assert!(exists(&final_path).await);
        assert!(!exists(&dir.path().join("nested").join("b.gif.TOKEN")).await);
    }

    #[tokio::test]
    async fn test_temp_files_cleanup() {
        let dir = tempdir().unwrap();
        let mut temps = TempFiles::new();
        let stray = temps.track(dir.path().join("c.jpg.X"));
        let _missing = temps.track(dir.path().join("d.jpg.X"));
        write_file(&stray, b"x").await.unwrap();
        temps.cleanup().await;
        assert!(!exists(&stray).await);
    }
}
