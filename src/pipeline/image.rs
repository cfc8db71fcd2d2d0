use std::{
    io::{BufWriter, Write as _},
    path::Path,
    sync::{Arc, Mutex},
};

use image::{DynamicImage, ImageFormat};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    artifact::naming::{Artifact, ArtifactNamer},
    catalog::{selection::Session, source::SourceEntry},
    foundation::{
        core::MediaKind,
        error::{FramelabError, FramelabResult},
    },
    history::log::OperationLog,
    transform::registry::{self, TransformCtx, TransformParams},
};

/// Decode -> transform -> encode -> log, for still images.
pub struct ImagePipeline {
    namer: Arc<ArtifactNamer>,
    log: Arc<dyn OperationLog>,
    params: TransformParams,
    rng: Mutex<StdRng>,
}

impl ImagePipeline {
    /// `noise_seed` pins the `noise` operation's randomness; `None` seeds from the OS.
    pub fn new(
        namer: Arc<ArtifactNamer>,
        log: Arc<dyn OperationLog>,
        params: TransformParams,
        noise_seed: Option<u64>,
    ) -> Self {
        let rng = match noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            namer,
            log,
            params,
            rng: Mutex::new(rng),
        }
    }

    /// Run `operation` on the session's active source.
    pub fn process(&self, session: &Session, operation: &str) -> FramelabResult<Artifact> {
        let source = session.selected_as(MediaKind::Image)?;
        self.process_source(&source, operation)
    }

    /// Run `operation` on an already-resolved source snapshot.
    ///
    /// The artifact replaces any previous result for the same operation. A failure to log
    /// is reported as a warning and does not fail the call.
    #[tracing::instrument(skip(self, source), fields(source = %source.id))]
    pub fn process_source(
        &self,
        source: &SourceEntry,
        operation: &str,
    ) -> FramelabResult<Artifact> {
        if source.kind != MediaKind::Image {
            return Err(FramelabError::wrong_kind(
                &source.id,
                MediaKind::Image,
                source.kind,
            ));
        }

        let frame = load_image(source.path())?;
        let transform = registry::lookup(MediaKind::Image, operation)?;

        let out = {
            let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
            let mut ctx = TransformCtx {
                params: &self.params,
                rng: &mut *rng,
            };
            transform.apply(&frame, &mut ctx)
        };

        let path = self.namer.image_path(transform.name);
        write_image_atomically(&out, &path)?;
        tracing::info!(
            operation = transform.name,
            path = %path.display(),
            width = out.width(),
            height = out.height(),
            "image artifact written"
        );

        if let Err(err) = self.log.append(&source.id, transform.name) {
            tracing::warn!(
                error = %err,
                operation = transform.name,
                "operation log append failed; artifact kept"
            );
        }

        Ok(Artifact {
            path,
            source_id: source.id.clone(),
            operation: transform.name.to_string(),
        })
    }
}

fn load_image(path: &Path) -> FramelabResult<DynamicImage> {
    image::open(path).map_err(|e| {
        FramelabError::source_read(format!("failed to read image '{}': {e}", path.display()))
    })
}

// Encode next to the destination and rename over it, so a failed encode never leaves a
// half-written file in the artifact slot.
fn write_image_atomically(img: &DynamicImage, path: &Path) -> FramelabResult<()> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        FramelabError::encode(format!(
            "unsupported artifact format for '{}': {e}",
            path.display()
        ))
    })?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| {
        FramelabError::encode(format!(
            "failed to create output directory '{}': {e}",
            dir.display()
        ))
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| FramelabError::encode(format!("failed to create temp file: {e}")))?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        img.write_to(&mut w, format).map_err(|e| {
            FramelabError::encode(format!("failed to encode '{}': {e}", path.display()))
        })?;
        w.flush()
            .map_err(|e| FramelabError::encode(format!("failed to flush artifact: {e}")))?;
    }
    tmp.persist(path).map_err(|e| {
        FramelabError::encode(format!(
            "failed to move artifact into '{}': {}",
            path.display(),
            e.error
        ))
    })?;
    Ok(())
}
