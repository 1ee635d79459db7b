use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::GrayImage;
use tracing::info;

use crate::error::{Result, VeinError};
use crate::overlay::gray_to_rgb;
use crate::types::{PipelineOutput, RgbFrame};

/// Paths written by one save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSnapshot {
    pub overlay: PathBuf,
    pub mask: PathBuf,
}

/// Writes overlay/mask pairs into one directory under timestamped names.
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves `vein_overlay_<stamp>.png` and `vein_mask_<stamp>.png`. A
    /// `-N` suffix is added when either name already exists, so repeated
    /// saves within one second never overwrite each other.
    pub fn save(&self, overlay: &RgbFrame, mask: &GrayImage) -> Result<SavedSnapshot> {
        fs::create_dir_all(&self.dir).map_err(|e| VeinError::ExportFailure {
            path: self.dir.clone(),
            reason: e.to_string(),
        })?;

        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let snapshot = self.free_names(&stamp);

        overlay
            .save(&snapshot.overlay)
            .map_err(|e| export_failure(&snapshot.overlay, e))?;
        mask.save(&snapshot.mask)
            .map_err(|e| export_failure(&snapshot.mask, e))?;

        info!(
            overlay = %snapshot.overlay.display(),
            mask = %snapshot.mask.display(),
            "saved snapshot"
        );
        Ok(snapshot)
    }

    fn free_names(&self, stamp: &str) -> SavedSnapshot {
        let mut n = 0u32;
        loop {
            let suffix = if n == 0 { String::new() } else { format!("-{}", n) };
            let candidate = SavedSnapshot {
                overlay: self.dir.join(format!("vein_overlay_{}{}.png", stamp, suffix)),
                mask: self.dir.join(format!("vein_mask_{}{}.png", stamp, suffix)),
            };
            if !candidate.overlay.exists() && !candidate.mask.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

fn export_failure(path: &Path, e: impl ToString) -> VeinError {
    VeinError::ExportFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Dumps every stage of one pass as numbered PNGs, followed by the mask
/// and overlay. Returns the written paths in order.
pub fn write_stages(dir: &Path, output: &PipelineOutput) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| export_failure(dir, e))?;

    let mut written = Vec::with_capacity(output.stages.len() + 1);
    let mut index = 1;
    for stage in &output.stages {
        let path = dir.join(format!("{:02}_{}.png", index, stage.name));
        // Masks and gray grids are saved as RGB so every file opens alike.
        gray_to_rgb(&stage.image)
            .save(&path)
            .map_err(|e| export_failure(&path, e))?;
        written.push(path);
        index += 1;
    }

    let path = dir.join(format!("{:02}_overlay.png", index));
    output
        .overlay
        .save(&path)
        .map_err(|e| export_failure(&path, e))?;
    written.push(path);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn sample() -> (RgbFrame, GrayImage) {
        let overlay = RgbFrame::from_fn(5, 4, |x, y| Rgb([x as u8 * 40, y as u8 * 50, 9]));
        let mut mask = GrayImage::new(5, 4);
        mask.put_pixel(1, 2, Luma([255]));
        (overlay, mask)
    }

    #[test]
    fn save_writes_two_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());
        let (overlay, mask) = sample();

        let saved = writer.save(&overlay, &mask).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
        assert_eq!(image::open(&saved.overlay).unwrap().to_rgb8(), overlay);
        assert_eq!(image::open(&saved.mask).unwrap().to_luma8(), mask);
    }

    #[test]
    fn repeated_saves_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());
        let (overlay, mask) = sample();

        let a = writer.save(&overlay, &mask).unwrap();
        let b = writer.save(&overlay, &mask).unwrap();
        assert_ne!(a.overlay, b.overlay);
        assert_ne!(a.mask, b.mask);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn unwritable_target_is_export_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let writer = SnapshotWriter::new(blocker.join("nested"));
        let (overlay, mask) = sample();

        let err = writer.save(&overlay, &mask).unwrap_err();
        assert!(matches!(err, VeinError::ExportFailure { .. }));
    }

    #[test]
    fn stage_dump_is_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = crate::presets::Preset::Live.pipeline();
        let frame = RgbFrame::from_pixel(80, 60, Rgb([120, 110, 100]));
        let output = pipeline.process(&frame, &crate::types::PipelineParameters::default());

        let written = write_stages(dir.path(), &output).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.first().map(String::as_str), Some("01_gray.png"));
        assert_eq!(names.last().map(String::as_str), Some("08_overlay.png"));
        assert_eq!(names.len(), output.stages.len() + 1);
    }
}
