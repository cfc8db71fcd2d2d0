use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    catalog::source::{SourceCatalog, SourceEntry},
    foundation::{
        core::MediaKind,
        error::{FramelabError, FramelabResult},
    },
    transform::registry::{ResizeTarget, TransformParams},
};

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    pub kind: MediaKind,
    pub path: PathBuf,
}

/// Everything a [`Studio`](crate::Studio) needs, usually read from a JSON file.
///
/// Relative paths are resolved against the directory of the file they were loaded from.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudioConfig {
    pub sources: BTreeMap<String, SourceSpec>,
    pub default_source: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_image_ext")]
    pub image_ext: String,
    #[serde(default = "default_video_ext")]
    pub video_ext: String,
    #[serde(default)]
    pub resize: ResizeTarget,
    #[serde(default)]
    pub noise_seed: Option<u64>,
    #[serde(default)]
    pub workers: Option<usize>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("static/out")
}

fn default_database() -> PathBuf {
    PathBuf::from("history.db")
}

fn default_image_ext() -> String {
    "png".to_string()
}

fn default_video_ext() -> String {
    "mp4".to_string()
}

impl StudioConfig {
    /// A config with the given catalog and every other field at its default.
    pub fn new(sources: BTreeMap<String, SourceSpec>, default_source: impl Into<String>) -> Self {
        Self {
            sources,
            default_source: default_source.into(),
            output_dir: default_output_dir(),
            database: default_database(),
            image_ext: default_image_ext(),
            video_ext: default_video_ext(),
            resize: ResizeTarget::default(),
            noise_seed: None,
            workers: None,
        }
    }

    pub fn load(path: &Path) -> FramelabResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json_str(&text, base)
    }

    pub fn from_json_str(json: &str, base_dir: &Path) -> FramelabResult<Self> {
        let mut cfg: Self = serde_json::from_str(json)
            .map_err(|e| FramelabError::validation(format!("invalid config JSON: {e}")))?;
        cfg.resolve_paths(base_dir);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };
        for spec in self.sources.values_mut() {
            resolve(&mut spec.path);
        }
        resolve(&mut self.output_dir);
        resolve(&mut self.database);
    }

    pub fn validate(&self) -> FramelabResult<()> {
        if self.sources.is_empty() {
            return Err(FramelabError::validation("config must declare at least one source"));
        }
        if !self.sources.contains_key(&self.default_source) {
            return Err(FramelabError::validation(format!(
                "default_source '{}' is not in the catalog",
                self.default_source
            )));
        }
        if self.resize.width == 0 || self.resize.height == 0 {
            return Err(FramelabError::validation("resize width/height must be non-zero"));
        }
        if self.workers == Some(0) {
            return Err(FramelabError::validation("workers must be >= 1 when set"));
        }
        for (name, ext) in [("image_ext", &self.image_ext), ("video_ext", &self.video_ext)] {
            if ext.trim().trim_start_matches('.').is_empty() {
                return Err(FramelabError::validation(format!("{name} must be non-empty")));
            }
        }
        Ok(())
    }

    pub fn catalog(&self) -> FramelabResult<SourceCatalog> {
        SourceCatalog::new(
            self.sources
                .iter()
                .map(|(id, spec)| SourceEntry::new(id.clone(), spec.kind, spec.path.clone())),
        )
    }

    pub fn transform_params(&self) -> TransformParams {
        TransformParams {
            resize: self.resize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "sources": {
            "drone": { "kind": "image", "path": "static/images/drone.jpg" },
            "sample": { "kind": "video", "path": "/abs/sample.mp4" }
        },
        "default_source": "drone",
        "resize": { "width": 300, "height": 300 },
        "noise_seed": 42
    }"#;

    #[test]
    fn defaults_and_relative_paths() {
        let cfg = StudioConfig::from_json_str(SAMPLE, Path::new("/srv/app")).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("/srv/app/static/out"));
        assert_eq!(cfg.database, PathBuf::from("/srv/app/history.db"));
        assert_eq!(cfg.image_ext, "png");
        assert_eq!(cfg.video_ext, "mp4");
        assert_eq!(
            cfg.sources["drone"].path,
            PathBuf::from("/srv/app/static/images/drone.jpg")
        );
        assert_eq!(cfg.sources["sample"].path, PathBuf::from("/abs/sample.mp4"));
        assert_eq!(cfg.transform_params().resize.width, 300);
        assert_eq!(cfg.noise_seed, Some(42));
        assert_eq!(cfg.catalog().unwrap().len(), 2);
    }

    #[test]
    fn resize_defaults_to_200_square() {
        let json = r#"{"sources":{"a":{"kind":"image","path":"a.png"}},"default_source":"a"}"#;
        let cfg = StudioConfig::from_json_str(json, Path::new(".")).unwrap();
        assert_eq!(
            cfg.resize,
            ResizeTarget {
                width: 200,
                height: 200
            }
        );
    }

    #[test]
    fn validation_rejects_bad_configs() {
        let base = Path::new(".");
        let unknown_default =
            r#"{"sources":{"a":{"kind":"image","path":"a.png"}},"default_source":"b"}"#;
        assert!(StudioConfig::from_json_str(unknown_default, base).is_err());

        let empty = r#"{"sources":{},"default_source":"a"}"#;
        assert!(StudioConfig::from_json_str(empty, base).is_err());

        let zero_resize = r#"{"sources":{"a":{"kind":"image","path":"a.png"}},"default_source":"a","resize":{"width":0,"height":10}}"#;
        assert!(StudioConfig::from_json_str(zero_resize, base).is_err());

        let zero_workers =
            r#"{"sources":{"a":{"kind":"image","path":"a.png"}},"default_source":"a","workers":0}"#;
        assert!(StudioConfig::from_json_str(zero_workers, base).is_err());

        let bad_kind = r#"{"sources":{"a":{"kind":"audio","path":"a.wav"}},"default_source":"a"}"#;
        assert!(StudioConfig::from_json_str(bad_kind, base).is_err());

        let unknown_field = r#"{"sources":{"a":{"kind":"image","path":"a.png"}},"default_source":"a","colour":1}"#;
        assert!(StudioConfig::from_json_str(unknown_field, base).is_err());
    }
}
