use image::DynamicImage;
use rand::RngCore;

use crate::{
    foundation::{
        core::MediaKind,
        error::{FramelabError, FramelabResult},
    },
    transform::ops,
};

/// Fixed target for the `resize` operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResizeTarget {
    pub width: u32,
    pub height: u32,
}

impl Default for ResizeTarget {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
        }
    }
}

/// Configuration the transforms read; everything else about them is fixed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransformParams {
    pub resize: ResizeTarget,
}

/// Per-call inputs to [`Transformation::apply`].
pub struct TransformCtx<'a> {
    pub params: &'a TransformParams,
    /// Randomness for `noise`. Seed it to make the output reproducible.
    pub rng: &'a mut dyn RngCore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Grayscale,
    Blur,
    Threshold,
    Edge,
    Resize,
    Rotate,
    Brightness,
    Noise,
    Sharpen,
    Original,
}

/// A named single-frame transformation bound to one media kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transformation {
    pub name: &'static str,
    pub kind: MediaKind,
    pub op: Op,
}

const fn entry(name: &'static str, kind: MediaKind, op: Op) -> Transformation {
    Transformation { name, kind, op }
}

static REGISTRY: &[Transformation] = &[
    entry("grayscale", MediaKind::Image, Op::Grayscale),
    entry("blur", MediaKind::Image, Op::Blur),
    entry("threshold", MediaKind::Image, Op::Threshold),
    entry("edge", MediaKind::Image, Op::Edge),
    entry("resize", MediaKind::Image, Op::Resize),
    entry("rotate", MediaKind::Image, Op::Rotate),
    entry("brightness", MediaKind::Image, Op::Brightness),
    entry("noise", MediaKind::Image, Op::Noise),
    entry("sharpen", MediaKind::Image, Op::Sharpen),
    entry("grayscale", MediaKind::Video, Op::Grayscale),
    entry("edge", MediaKind::Video, Op::Edge),
    entry("original", MediaKind::Video, Op::Original),
];

/// Resolve `name` among the transformations registered for `kind`.
///
/// Names are matched after trimming and ASCII-lowercasing.
pub fn lookup(kind: MediaKind, name: &str) -> FramelabResult<&'static Transformation> {
    let key = name.trim().to_ascii_lowercase();
    REGISTRY
        .iter()
        .find(|t| t.kind == kind && t.name == key)
        .ok_or_else(|| FramelabError::unknown_operation(kind, name.trim()))
}

/// Registered operation names for `kind`, in registration order.
pub fn names(kind: MediaKind) -> impl Iterator<Item = &'static str> {
    REGISTRY
        .iter()
        .filter(move |t| t.kind == kind)
        .map(|t| t.name)
}

impl Transformation {
    /// True when the source itself is the result and nothing should be written.
    pub fn is_passthrough(&self) -> bool {
        self.op == Op::Original
    }

    pub fn apply(&self, frame: &DynamicImage, ctx: &mut TransformCtx<'_>) -> DynamicImage {
        match self.op {
            Op::Grayscale => ops::grayscale(frame),
            Op::Blur => ops::gaussian_blur(frame, ops::BLUR_KERNEL_SIZE, 0.0),
            Op::Threshold => ops::threshold(frame, ops::THRESHOLD_LEVEL),
            Op::Edge => ops::canny_edges(frame, ops::CANNY_LOW, ops::CANNY_HIGH),
            Op::Resize => {
                let target = ctx.params.resize;
                ops::resize_exact(frame, target.width, target.height)
            }
            Op::Rotate => ops::rotate_about_center_deg(frame, ops::ROTATE_DEGREES),
            Op::Brightness => {
                ops::adjust_brightness(frame, ops::BRIGHTNESS_GAIN, ops::BRIGHTNESS_BIAS)
            }
            Op::Noise => ops::add_gaussian_noise(frame, ops::NOISE_STDDEV, &mut *ctx.rng),
            Op::Sharpen => ops::sharpen(frame),
            Op::Original => frame.clone(),
        }
    }
}
