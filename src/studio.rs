use std::sync::Arc;

use crate::{
    artifact::naming::{Artifact, ArtifactNamer},
    catalog::{selection::Session, source::SourceCatalog},
    config::StudioConfig,
    foundation::{core::MediaKind, error::FramelabResult},
    history::log::{LogEntry, OperationLog, SqliteLog},
    jobs::{JobHandle, JobQueue},
    pipeline::{
        image::ImagePipeline,
        video::{TranscodeStats, VideoPipeline},
    },
};

/// Wires the catalog, artifact naming, operation log and both pipelines together, and
/// owns the worker pool long-running calls are queued on.
pub struct Studio {
    catalog: Arc<SourceCatalog>,
    default_source: String,
    namer: Arc<ArtifactNamer>,
    log: Arc<dyn OperationLog>,
    image: Arc<ImagePipeline>,
    video: Arc<VideoPipeline>,
    jobs: JobQueue,
}

impl Studio {
    /// Build from `cfg`, opening the SQLite history at `cfg.database`.
    pub fn open(cfg: &StudioConfig) -> FramelabResult<Self> {
        let log = Arc::new(SqliteLog::open(&cfg.database)?);
        Self::with_log(cfg, log)
    }

    /// Build from `cfg` with a caller-provided history store.
    pub fn with_log(cfg: &StudioConfig, log: Arc<dyn OperationLog>) -> FramelabResult<Self> {
        cfg.validate()?;
        let catalog = Arc::new(cfg.catalog()?);
        let namer = Arc::new(ArtifactNamer::new(
            &cfg.output_dir,
            &cfg.image_ext,
            &cfg.video_ext,
        )?);
        let params = cfg.transform_params();
        let image = Arc::new(ImagePipeline::new(
            Arc::clone(&namer),
            Arc::clone(&log),
            params,
            cfg.noise_seed,
        ));
        let video = Arc::new(VideoPipeline::new(Arc::clone(&namer), params));
        let jobs = JobQueue::new(cfg.workers)?;

        tracing::info!(
            sources = catalog.len(),
            out_dir = %namer.out_dir().display(),
            workers = jobs.threads(),
            "studio ready"
        );

        Ok(Self {
            catalog,
            default_source: cfg.default_source.clone(),
            namer,
            log,
            image,
            video,
            jobs,
        })
    }

    /// A fresh session positioned on the configured default source.
    pub fn session(&self) -> FramelabResult<Session> {
        Session::new(Arc::clone(&self.catalog), &self.default_source)
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn namer(&self) -> &ArtifactNamer {
        &self.namer
    }

    /// Run the image pipeline on the caller's thread.
    pub fn run_image(&self, session: &Session, operation: &str) -> FramelabResult<Artifact> {
        self.image.process(session, operation)
    }

    /// Run the video pipeline on the caller's thread.
    pub fn run_video(
        &self,
        session: &Session,
        operation: &str,
    ) -> FramelabResult<(Artifact, TranscodeStats)> {
        self.video.process_with_stats(session, operation)
    }

    /// Queue an image call. The selection is captured now; later `select` calls on the
    /// session do not affect the queued job.
    pub fn submit_image(
        &self,
        session: &Session,
        operation: &str,
    ) -> FramelabResult<JobHandle<Artifact>> {
        let source = session.selected_as(MediaKind::Image)?;
        let pipeline = Arc::clone(&self.image);
        let operation = operation.to_string();
        Ok(self
            .jobs
            .submit(move || pipeline.process_source(&source, &operation)))
    }

    /// Queue a video transcode, capturing the selection now.
    pub fn submit_video(
        &self,
        session: &Session,
        operation: &str,
    ) -> FramelabResult<JobHandle<(Artifact, TranscodeStats)>> {
        let source = session.selected_as(MediaKind::Video)?;
        let pipeline = Arc::clone(&self.video);
        let operation = operation.to_string();
        Ok(self
            .jobs
            .submit(move || pipeline.process_source(&source, &operation)))
    }

    /// Most recent history entries, newest first.
    pub fn history(&self, limit: usize) -> FramelabResult<Vec<LogEntry>> {
        self.log.recent(limit)
    }
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("sources", &self.catalog.len())
            .field("default_source", &self.default_source)
            .field("out_dir", &self.namer.out_dir())
            .finish()
    }
}
