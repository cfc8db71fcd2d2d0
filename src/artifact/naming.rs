use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::foundation::error::{FramelabError, FramelabResult};

/// A written (or, for pass-through video, referenced) result file.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub source_id: String,
    pub operation: String,
}

/// Derives artifact paths inside one output directory.
///
/// Image artifacts use a fixed slot per operation (`out_<op>.<ext>`), so a repeated
/// operation overwrites the previous result. Video artifacts are named
/// `<op>_<millis>-<seq>.<ext>`: `seq` is a per-namer counter, so two calls on the same namer
/// never return the same path, and the millisecond prefix keeps names from a previous run
/// apart. A candidate that already exists on disk is skipped.
#[derive(Debug)]
pub struct ArtifactNamer {
    out_dir: PathBuf,
    image_ext: String,
    video_ext: String,
    seq: AtomicU64,
}

impl ArtifactNamer {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        image_ext: impl Into<String>,
        video_ext: impl Into<String>,
    ) -> FramelabResult<Self> {
        let image_ext = normalize_ext(image_ext.into())?;
        let video_ext = normalize_ext(video_ext.into())?;
        Ok(Self {
            out_dir: out_dir.into(),
            image_ext,
            video_ext,
            seq: AtomicU64::new(0),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn image_path(&self, operation: &str) -> PathBuf {
        self.out_dir
            .join(format!("out_{operation}.{}", self.image_ext))
    }

    pub fn video_path(&self, operation: &str) -> PathBuf {
        let millis = chrono::Utc::now().timestamp_millis();
        loop {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            let candidate = self
                .out_dir
                .join(format!("{operation}_{millis}-{seq}.{}", self.video_ext));
            if !candidate.exists() {
                return candidate;
            }
        }
    }
}

fn normalize_ext(ext: String) -> FramelabResult<String> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() {
        return Err(FramelabError::validation("artifact extension must be non-empty"));
    }
    Ok(ext)
}
