use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::model::vae::{Vae, IMAGE_SIDE};

/// Grid geometry for preview images: 8×8 tiles of 28×28 pixels.
pub const GRID_SIDE: usize = 8;
pub const GRID_TILES: usize = GRID_SIDE * GRID_SIDE;

// Only the most recent snapshots are retained.
const KEEP_CHECKPOINTS: usize = 2;

/// Artifact directory for one training run.
///
/// The directory is named deterministically from the run id
/// (`results_{id:04}`), so concurrently running trials with distinct ids
/// never collide. It holds the per-epoch preview grids and a
/// `checkpoints/` subdirectory of model snapshots.
#[derive(Debug)]
pub struct RunDir {
    root: PathBuf,
}

impl RunDir {
    /// Creates `results_{run_id:04}/` and its `checkpoints/` subdirectory
    /// under `base`.
    pub fn create_in(base: &Path, run_id: i64) -> Result<RunDir, String> {
        let root = base.join(format!("results_{:04}", run_id));
        fs::create_dir_all(root.join("checkpoints"))
            .map_err(|e| format!("cannot create run directory {}: {}", root.display(), e))?;
        Ok(RunDir { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Saves a model snapshot tagged with the epoch number, then prunes all
    /// but the most recent snapshots.
    pub fn save_checkpoint(&self, model: &Vae, epoch: usize) -> Result<(), String> {
        let path = self
            .root
            .join("checkpoints")
            .join(format!("checkpoint-{:04}.json", epoch));
        model
            .save_json(&path)
            .map_err(|e| format!("cannot save checkpoint {}: {}", path.display(), e))?;
        self.prune_checkpoints()
    }

    fn prune_checkpoints(&self) -> Result<(), String> {
        let dir = self.root.join("checkpoints");
        let mut snapshots: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| format!("cannot list {}: {}", dir.display(), e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
            .collect();
        // Zero-padded epoch tags sort lexicographically in epoch order.
        snapshots.sort();
        while snapshots.len() > KEEP_CHECKPOINTS {
            let oldest = snapshots.remove(0);
            fs::remove_file(&oldest)
                .map_err(|e| format!("cannot remove {}: {}", oldest.display(), e))?;
        }
        Ok(())
    }

    /// Writes an 8×8 grid of 28×28 grayscale tiles to `name` inside the run
    /// directory. Missing tiles (fewer than 64 images) stay black.
    pub fn save_grid(&self, images: &[Vec<f64>], name: &str) -> Result<(), String> {
        let side = (GRID_SIDE * IMAGE_SIDE) as u32;
        let mut canvas = GrayImage::new(side, side);
        for (tile, img) in images.iter().take(GRID_TILES).enumerate() {
            let ty = tile / GRID_SIDE;
            let tx = tile % GRID_SIDE;
            for py in 0..IMAGE_SIDE {
                for px in 0..IMAGE_SIDE {
                    let v = (img[py * IMAGE_SIDE + px].clamp(0.0, 1.0) * 255.0).round() as u8;
                    canvas.put_pixel(
                        (tx * IMAGE_SIDE + px) as u32,
                        (ty * IMAGE_SIDE + py) as u32,
                        image::Luma([v]),
                    );
                }
            }
        }
        let path = self.root.join(name);
        canvas
            .save(&path)
            .map_err(|e| format!("cannot write {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::vae::IMAGE_PIXELS;

    fn temp_base(tag: &str) -> PathBuf {
        let base = std::env::temp_dir().join(format!("mnist-vae-{}-{}", tag, std::process::id()));
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn checkpoints_are_pruned_to_the_most_recent_two() {
        let base = temp_base("prune");
        let run = RunDir::create_in(&base, 7).unwrap();
        let model = Vae::new(2, 1, 1, 1, 1);
        for epoch in 0..5 {
            run.save_checkpoint(&model, epoch).unwrap();
        }
        let mut names: Vec<String> = fs::read_dir(run.path().join("checkpoints"))
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["checkpoint-0003.json", "checkpoint-0004.json"]);
        fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn grid_files_are_written_even_when_short_of_64_tiles() {
        let base = temp_base("grid");
        let run = RunDir::create_in(&base, 8).unwrap();
        let images: Vec<Vec<f64>> = (0..3).map(|_| vec![0.5; IMAGE_PIXELS]).collect();
        run.save_grid(&images, "base.png").unwrap();
        assert!(run.path().join("base.png").exists());
        fs::remove_dir_all(&base).ok();
    }
}
