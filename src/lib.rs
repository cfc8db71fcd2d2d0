#![forbid(unsafe_code)]
//! Named pixel transformations over a fixed catalog of image and video sources.
//!
//! Image calls write one deterministic artifact per operation and record the call in an
//! operation log. Video calls transcode every frame through `ffmpeg` into a uniquely
//! named file.

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod encode;
pub mod foundation;
pub mod history;
pub mod jobs;
pub mod media;
pub mod pipeline;
pub mod studio;
pub mod transform;

pub use artifact::naming::{Artifact, ArtifactNamer};
pub use catalog::{
    selection::Session,
    source::{SourceCatalog, SourceEntry},
};
pub use config::{SourceSpec, StudioConfig};
pub use encode::ffmpeg::{EncodeConfig, FfmpegEncoder, default_mp4_config, is_ffmpeg_on_path};
pub use foundation::{
    core::{Fps, MediaKind},
    error::{ErrorKind, FramelabError, FramelabResult},
};
pub use history::log::{LogEntry, OperationLog, SqliteLog};
pub use jobs::{JobHandle, JobQueue};
pub use media::{
    decode::FrameReader,
    probe::{VideoSourceInfo, is_ffprobe_on_path, probe_video},
};
pub use pipeline::{
    image::ImagePipeline,
    video::{TranscodeStats, VideoPipeline},
};
pub use studio::Studio;
pub use transform::registry::{
    Op, ResizeTarget, TransformCtx, TransformParams, Transformation, lookup as lookup_operation,
    names as operation_names,
};
