use std::sync::Arc;

use image::DynamicImage;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    artifact::naming::{Artifact, ArtifactNamer},
    catalog::{selection::Session, source::SourceEntry},
    encode::ffmpeg::{FfmpegEncoder, default_mp4_config},
    foundation::{
        core::MediaKind,
        error::{FramelabError, FramelabResult},
    },
    media::{decode::FrameReader, probe::probe_video},
    transform::registry::{self, TransformCtx, TransformParams, Transformation},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    pub frames_read: u64,
    pub frames_written: u64,
}

/// Per-frame transcoder: every source frame is transformed and written, in order, to a
/// fresh artifact with the source's geometry and frame rate.
///
/// Known limitation: a failure mid-stream leaves the frames written so far in the
/// artifact file. The file is not removed and the call is not retried.
pub struct VideoPipeline {
    namer: Arc<ArtifactNamer>,
    params: TransformParams,
}

impl VideoPipeline {
    pub fn new(namer: Arc<ArtifactNamer>, params: TransformParams) -> Self {
        Self { namer, params }
    }

    pub fn process(&self, session: &Session, operation: &str) -> FramelabResult<Artifact> {
        self.process_with_stats(session, operation)
            .map(|(artifact, _)| artifact)
    }

    pub fn process_with_stats(
        &self,
        session: &Session,
        operation: &str,
    ) -> FramelabResult<(Artifact, TranscodeStats)> {
        let source = session.selected_as(MediaKind::Video)?;
        self.process_source(&source, operation)
    }

    /// Transcode an already-resolved source snapshot.
    ///
    /// `original` writes nothing: the artifact is the source file itself.
    #[tracing::instrument(skip(self, source), fields(source = %source.id))]
    pub fn process_source(
        &self,
        source: &SourceEntry,
        operation: &str,
    ) -> FramelabResult<(Artifact, TranscodeStats)> {
        if source.kind != MediaKind::Video {
            return Err(FramelabError::wrong_kind(
                &source.id,
                MediaKind::Video,
                source.kind,
            ));
        }
        let transform = registry::lookup(MediaKind::Video, operation)?;

        if transform.is_passthrough() {
            if !source.path.is_file() {
                return Err(FramelabError::source_read(format!(
                    "video source '{}' does not exist",
                    source.path.display()
                )));
            }
            return Ok((
                Artifact {
                    path: source.path.clone(),
                    source_id: source.id.clone(),
                    operation: transform.name.to_string(),
                },
                TranscodeStats::default(),
            ));
        }

        let info = probe_video(source.path())?;
        let reader = FrameReader::open(&info)?;

        let out_path = self.namer.video_path(transform.name);
        let encoder = FfmpegEncoder::new(default_mp4_config(
            &out_path,
            info.width,
            info.height,
            info.fps,
        ))?;
        tracing::info!(
            operation = transform.name,
            path = %out_path.display(),
            width = info.width,
            height = info.height,
            fps = %info.fps.ffmpeg_rate(),
            "video transcode started"
        );

        let stats = self.transcode(transform, reader, encoder)?;
        tracing::info!(
            operation = transform.name,
            path = %out_path.display(),
            frames = stats.frames_written,
            "video artifact written"
        );

        Ok((
            Artifact {
                path: out_path,
                source_id: source.id.clone(),
                operation: transform.name.to_string(),
            },
            stats,
        ))
    }

    // Reader and encoder are released on every exit path: `finish` on success, `Drop` on
    // an early `?` return.
    fn transcode(
        &self,
        transform: &Transformation,
        mut reader: FrameReader,
        mut encoder: FfmpegEncoder,
    ) -> FramelabResult<TranscodeStats> {
        // The registered video operations draw no randomness.
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = TransformCtx {
            params: &self.params,
            rng: &mut rng,
        };

        while let Some(frame) = reader.next_frame()? {
            let out = transform.apply(&DynamicImage::ImageRgb8(frame), &mut ctx);
            // Single-channel results are replicated across RGB for the container.
            encoder.encode_frame(&out.to_rgb8())?;
        }

        let frames_read = reader.finish()?;
        let frames_written = encoder.finish()?;
        Ok(TranscodeStats {
            frames_read,
            frames_written,
        })
    }
}
