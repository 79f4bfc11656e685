//! Per-target temp directory layout and lifecycle.
//!
//! Every target gets `<root>/facefusion/<target stem>/` holding numbered frames
//! (`00000001.png`, ...) and `temp.<ext>` intermediates. The directory is
//! created before extraction and removed by the cleanup stage unless
//! `keep_temp` is set.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::config::TempConfig;
use crate::frame::FrameFormat;

const BASE_DIR: &str = "facefusion";
const FRAME_DIGITS: usize = 8;

/// A numbered frame file inside a target's temp directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFrame {
    /// 1-based frame number taken from the file name.
    pub number: u64,
    pub path: PathBuf,
    pub format: FrameFormat,
}

/// Resolves and manages temp paths for a target.
#[derive(Debug, Clone)]
pub struct TempLayout {
    root: PathBuf,
    frame_format: FrameFormat,
    keep_temp: bool,
}

impl TempLayout {
    pub fn new(config: &TempConfig) -> Self {
        Self {
            root: config.root.clone(),
            frame_format: config.frame_format,
            keep_temp: config.keep_temp,
        }
    }

    pub fn frame_format(&self) -> FrameFormat {
        self.frame_format
    }

    pub fn base_dir(&self) -> PathBuf {
        self.root.join(BASE_DIR)
    }

    /// Directory holding all temp files of `target`.
    pub fn directory_path(&self, target: &Path) -> PathBuf {
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "target".to_string());
        self.base_dir().join(stem)
    }

    /// `temp.<extension>` inside the target's directory.
    pub fn temp_file_path(&self, target: &Path, extension: &str) -> PathBuf {
        self.directory_path(target)
            .join(format!("temp.{}", extension.trim_start_matches('.')))
    }

    /// Numbered frame pattern understood by ffmpeg's image2 muxer.
    pub fn frame_pattern(&self, target: &Path) -> PathBuf {
        self.directory_path(target).join(format!(
            "%0{}d.{}",
            FRAME_DIGITS,
            self.frame_format.extension()
        ))
    }

    /// Path of frame `number` (1-based, as written by ffmpeg).
    pub fn frame_path(&self, target: &Path, number: u64) -> PathBuf {
        self.directory_path(target).join(format!(
            "{:0width$}.{}",
            number,
            self.frame_format.extension(),
            width = FRAME_DIGITS
        ))
    }

    /// Frame files currently in the target's directory, in frame order.
    pub async fn resolve_frame_paths(&self, target: &Path) -> std::io::Result<Vec<TempFrame>> {
        frames_in(&self.directory_path(target), self.frame_format).await
    }

    /// Creates the target's directory. Idempotent.
    pub async fn create(&self, target: &Path) -> std::io::Result<PathBuf> {
        let dir = self.directory_path(target);
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Created temp directory");
        Ok(dir)
    }

    /// Removes the target's directory, and the base directory once empty.
    ///
    /// Honours `keep_temp`; a directory that is already gone is not an error.
    pub async fn clear(&self, target: &Path) -> std::io::Result<()> {
        if self.keep_temp {
            debug!(target = %target.display(), "Keeping temp directory");
            return Ok(());
        }
        let dir = self.directory_path(target);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(dir = %dir.display(), "Removed temp directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        // Fails while other targets still have directories; that is fine.
        let _ = fs::remove_dir(self.base_dir()).await;
        Ok(())
    }

    /// Moves `temp.<extension>` to `output`, copying when a rename cannot cross devices.
    pub async fn move_temp_file(
        &self,
        target: &Path,
        extension: &str,
        output: &Path,
    ) -> std::io::Result<()> {
        let temp = self.temp_file_path(target, extension);
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        match fs::rename(&temp, output).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(e),
            Err(e) => {
                warn!(error = %e, "Rename failed, falling back to copy");
                fs::copy(&temp, output).await?;
                fs::remove_file(&temp).await
            }
        }
    }
}

/// Frame files in `dir` with the given format's extension, sorted by frame number.
pub async fn frames_in(dir: &Path, format: FrameFormat) -> std::io::Result<Vec<TempFrame>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut frames = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches_format = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(format.extension()));
        if !matches_format {
            continue;
        }
        let number = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok());
        if let Some(number) = number {
            frames.push(TempFrame {
                number,
                path,
                format,
            });
        }
    }
    frames.sort_by_key(|frame| frame.number);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(root: &Path, keep_temp: bool) -> TempLayout {
        TempLayout::new(&TempConfig {
            root: root.to_path_buf(),
            frame_format: FrameFormat::Png,
            keep_temp,
        })
    }

    #[test]
    fn test_paths() {
        let layout = layout(Path::new("/tmp"), false);
        let target = Path::new("/videos/holiday.mp4");
        assert_eq!(
            layout.directory_path(target),
            PathBuf::from("/tmp/facefusion/holiday")
        );
        assert_eq!(
            layout.temp_file_path(target, "mp4"),
            PathBuf::from("/tmp/facefusion/holiday/temp.mp4")
        );
        assert_eq!(
            layout.frame_pattern(target),
            PathBuf::from("/tmp/facefusion/holiday/%08d.png")
        );
        assert_eq!(
            layout.frame_path(target, 12),
            PathBuf::from("/tmp/facefusion/holiday/00000012.png")
        );
    }

    #[tokio::test]
    async fn test_resolve_frame_paths_sorted_and_filtered() {
        let root = TempDir::new().unwrap();
        let layout = layout(root.path(), false);
        let target = Path::new("/videos/clip.mp4");
        let dir = layout.create(target).await.unwrap();

        for name in ["00000010.png", "00000002.png", "00000001.png", "temp.mp4", "notes.png"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let frames = layout.resolve_frame_paths(target).await.unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["00000001.png", "00000002.png", "00000010.png"]);
        let numbers: Vec<u64> = frames.iter().map(|f| f.number).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert!(frames.iter().all(|f| f.format == FrameFormat::Png));
        assert_eq!(frames[2].path, layout.frame_path(target, 10));
    }

    #[tokio::test]
    async fn test_resolve_missing_directory_is_empty() {
        let root = TempDir::new().unwrap();
        let frames = layout(root.path(), false)
            .resolve_frame_paths(Path::new("/videos/none.mp4"))
            .await
            .unwrap();
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_create_twice_and_clear_twice() {
        let root = TempDir::new().unwrap();
        let layout = layout(root.path(), false);
        let target = Path::new("/videos/clip.mp4");

        layout.create(target).await.unwrap();
        layout.create(target).await.unwrap();
        assert!(layout.directory_path(target).is_dir());

        layout.clear(target).await.unwrap();
        layout.clear(target).await.unwrap();
        assert!(!layout.directory_path(target).exists());
        assert!(!layout.base_dir().exists());
    }

    #[tokio::test]
    async fn test_clear_keeps_when_configured() {
        let root = TempDir::new().unwrap();
        let layout = layout(root.path(), true);
        let target = Path::new("/videos/clip.mp4");
        layout.create(target).await.unwrap();
        layout.clear(target).await.unwrap();
        assert!(layout.directory_path(target).is_dir());
    }

    #[tokio::test]
    async fn test_move_temp_file() {
        let root = TempDir::new().unwrap();
        let layout = layout(root.path(), false);
        let target = Path::new("/videos/clip.mp4");
        layout.create(target).await.unwrap();
        std::fs::write(layout.temp_file_path(target, "mp4"), b"video").unwrap();

        let output = root.path().join("out/result.mp4");
        layout.move_temp_file(target, "mp4", &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"video");
        assert!(!layout.temp_file_path(target, "mp4").exists());
    }
}
