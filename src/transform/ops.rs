//! Single-frame pixel operations.
//!
//! Every function borrows its input and returns a new frame. Color inputs are normalized to
//! packed RGB8 and single-channel inputs stay `Luma8`; alpha is not carried through.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, imageops::FilterType};
use imageproc::{
    filter::filter3x3,
    geometric_transformations::{Interpolation, rotate_about_center},
};
use rand::{Rng, RngCore};

pub const BLUR_KERNEL_SIZE: u32 = 15;
pub const THRESHOLD_LEVEL: u8 = 127;
pub const CANNY_LOW: f32 = 100.0;
pub const CANNY_HIGH: f32 = 200.0;
pub const ROTATE_DEGREES: f32 = 45.0;
pub const BRIGHTNESS_GAIN: f32 = 1.2;
pub const BRIGHTNESS_BIAS: f32 = 40.0;
pub const NOISE_STDDEV: f64 = 25.0;
pub const SHARPEN_KERNEL: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// Working representation: either one luminance plane or interleaved RGB.
#[derive(Clone, Debug)]
enum Planes {
    Luma(GrayImage),
    Rgb(RgbImage),
}

impl Planes {
    fn from_frame(frame: &DynamicImage) -> Self {
        match frame {
            DynamicImage::ImageLuma8(g) => Self::Luma(g.clone()),
            other => Self::Rgb(other.to_rgb8()),
        }
    }

    fn into_frame(self) -> DynamicImage {
        match self {
            Self::Luma(g) => DynamicImage::ImageLuma8(g),
            Self::Rgb(c) => DynamicImage::ImageRgb8(c),
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Luma(g) => g.dimensions(),
            Self::Rgb(c) => c.dimensions(),
        }
    }

    fn channels(&self) -> usize {
        match self {
            Self::Luma(_) => 1,
            Self::Rgb(_) => 3,
        }
    }

    fn samples(&self) -> &[u8] {
        match self {
            Self::Luma(g) => &**g,
            Self::Rgb(c) => &**c,
        }
    }

    fn samples_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Luma(g) => &mut **g,
            Self::Rgb(c) => &mut **c,
        }
    }

    /// Run `f(src, dst, width, height, channels)` into a same-shaped output buffer.
    fn convolve_into(&self, f: impl FnOnce(&[u8], &mut [u8], u32, u32, usize)) -> Self {
        let (w, h) = self.dimensions();
        let channels = self.channels();
        let mut out = self.clone();
        f(self.samples(), out.samples_mut(), w, h, channels);
        out
    }
}

/// Convert to a single luminance channel.
pub fn grayscale(frame: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(frame.to_luma8())
}

/// Gaussian smoothing with a `kernel_size` x `kernel_size` kernel.
///
/// A `sigma` of `0.0` derives the deviation from the kernel size
/// (`0.3 * ((k - 1) / 2 - 1) + 0.8`).
pub fn gaussian_blur(frame: &DynamicImage, kernel_size: u32, sigma: f32) -> DynamicImage {
    let radius = kernel_size / 2;
    if radius == 0 {
        return Planes::from_frame(frame).into_frame();
    }
    let sigma = if sigma > 0.0 && sigma.is_finite() {
        sigma
    } else {
        auto_sigma(kernel_size)
    };
    let kernel = gaussian_kernel_q16(radius, sigma);

    let src = Planes::from_frame(frame);
    let tmp = src.convolve_into(|s, d, w, h, c| horizontal_pass(s, d, w, h, c, &kernel));
    tmp.convolve_into(|s, d, w, h, c| vertical_pass(s, d, w, h, c, &kernel))
        .into_frame()
}

/// Binarize the luminance: samples above `level` become 255, everything else 0.
pub fn threshold(frame: &DynamicImage, level: u8) -> DynamicImage {
    let mut gray = frame.to_luma8();
    for v in gray.iter_mut() {
        *v = if *v > level { 255 } else { 0 };
    }
    DynamicImage::ImageLuma8(gray)
}

/// Canny edges over the luminance. Output is 0/255.
pub fn canny_edges(frame: &DynamicImage, low: f32, high: f32) -> DynamicImage {
    let gray = frame.to_luma8();
    DynamicImage::ImageLuma8(imageproc::edges::canny(&gray, low, high))
}

/// Scale to exactly `width` x `height` (aspect ratio is not preserved).
pub fn resize_exact(frame: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    match Planes::from_frame(frame) {
        Planes::Luma(g) => DynamicImage::ImageLuma8(image::imageops::resize(
            &g,
            width,
            height,
            FilterType::Triangle,
        )),
        Planes::Rgb(c) => DynamicImage::ImageRgb8(image::imageops::resize(
            &c,
            width,
            height,
            FilterType::Triangle,
        )),
    }
}

/// Rotate counter-clockwise about the center on a same-sized canvas; corners are clipped
/// and uncovered area is black.
pub fn rotate_about_center_deg(frame: &DynamicImage, degrees: f32) -> DynamicImage {
    // imageproc measures clockwise in image coordinates.
    let theta = -degrees.to_radians();
    match Planes::from_frame(frame) {
        Planes::Luma(g) => DynamicImage::ImageLuma8(rotate_about_center(
            &g,
            theta,
            Interpolation::Bilinear,
            Luma([0]),
        )),
        Planes::Rgb(c) => DynamicImage::ImageRgb8(rotate_about_center(
            &c,
            theta,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
        )),
    }
}

/// `v * gain + bias`, rounded and saturated to `0..=255`.
pub fn adjust_brightness(frame: &DynamicImage, gain: f32, bias: f32) -> DynamicImage {
    let mut planes = Planes::from_frame(frame);
    for v in planes.samples_mut() {
        *v = saturate(f32::from(*v) * gain + bias);
    }
    planes.into_frame()
}

/// Add independent zero-mean Gaussian noise to every sample, saturating at the range ends.
pub fn add_gaussian_noise(
    frame: &DynamicImage,
    stddev: f64,
    rng: &mut dyn RngCore,
) -> DynamicImage {
    let mut planes = Planes::from_frame(frame);
    for v in planes.samples_mut() {
        let n = standard_normal(rng) * stddev;
        *v = saturate((f64::from(*v) + n) as f32);
    }
    planes.into_frame()
}

/// 3x3 convolution with [`SHARPEN_KERNEL`]; borders replicate the edge samples.
pub fn sharpen(frame: &DynamicImage) -> DynamicImage {
    match Planes::from_frame(frame) {
        Planes::Luma(g) => {
            DynamicImage::ImageLuma8(filter3x3::<_, i32, u8>(&g, &SHARPEN_KERNEL))
        }
        Planes::Rgb(c) => DynamicImage::ImageRgb8(filter3x3::<_, i32, u8>(&c, &SHARPEN_KERNEL)),
    }
}

fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// Box-Muller; `1 - u` keeps the log argument in (0, 1].
fn standard_normal(rng: &mut dyn RngCore) -> f64 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn auto_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = f64::from(i);
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Fold rounding drift into the center tap so the kernel sums to exactly 1.0.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    weights
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, ch: usize, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 3];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * ch;
                for c in 0..ch {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * ch;
            for c in 0..ch {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, ch: usize, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 3];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * ch;
                for c in 0..ch {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * ch;
            for c in 0..ch {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn gradient_rgb(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, 128])
        }))
    }

    fn square_on_black(size: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
            let inside = x >= size / 4 && x < 3 * size / 4 && y >= size / 4 && y < 3 * size / 4;
            if inside {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }))
    }

    #[test]
    fn auto_sigma_for_15_tap_kernel() {
        assert!((auto_sigma(15) - 2.6).abs() < 1e-6);
    }

    #[test]
    fn kernel_sums_to_one_in_q16() {
        let k = gaussian_kernel_q16(7, auto_sigma(15));
        assert_eq!(k.len(), 15);
        assert_eq!(k.iter().map(|&w| u64::from(w)).sum::<u64>(), 65536);
    }

    #[test]
    fn grayscale_is_single_channel() {
        let out = grayscale(&gradient_rgb(8, 6));
        assert_eq!(out.color(), image::ColorType::L8);
        assert_eq!((out.width(), out.height()), (8, 6));
    }

    #[test]
    fn blur_constant_image_is_identity() {
        let src = DynamicImage::ImageRgb8(RgbImage::from_pixel(9, 7, Rgb([10, 20, 30])));
        let out = gaussian_blur(&src, BLUR_KERNEL_SIZE, 0.0);
        assert_eq!(out.to_rgb8(), src.to_rgb8());
    }

    #[test]
    fn blur_spreads_energy_from_single_pixel() {
        let mut img = GrayImage::new(15, 15);
        img.put_pixel(7, 7, Luma([255]));
        let out = gaussian_blur(&DynamicImage::ImageLuma8(img), BLUR_KERNEL_SIZE, 0.0).to_luma8();
        let center = out.get_pixel(7, 7)[0];
        assert!(center > 0 && center < 255);
        assert!(out.get_pixel(8, 7)[0] > 0);
        assert!(out.get_pixel(8, 7)[0] <= center);
    }

    #[test]
    fn threshold_is_strictly_above_127() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[126u8, 127, 128][x as usize]]));
        let out = threshold(&DynamicImage::ImageLuma8(img), THRESHOLD_LEVEL).to_luma8();
        assert_eq!(out.as_raw(), &vec![0, 0, 255]);
    }

    #[test]
    fn canny_outputs_binary_edges() {
        let out = canny_edges(&square_on_black(32), CANNY_LOW, CANNY_HIGH);
        assert_eq!(out.color(), image::ColorType::L8);
        let luma = out.to_luma8();
        assert!(luma.iter().all(|&v| v == 0 || v == 255));
        assert!(luma.iter().any(|&v| v == 255));
    }

    #[test]
    fn resize_hits_exact_target() {
        let out = resize_exact(&gradient_rgb(37, 11), 200, 300);
        assert_eq!((out.width(), out.height()), (200, 300));
    }

    #[test]
    fn rotate_keeps_canvas_and_clips_corners() {
        let src = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([200, 200, 200])));
        let out = rotate_about_center_deg(&src, ROTATE_DEGREES).to_rgb8();
        assert_eq!(out.dimensions(), (20, 10));
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(10, 5), &Rgb([200, 200, 200]));
    }

    #[test]
    fn brightness_saturates_instead_of_wrapping() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[0u8, 100, 250][x as usize]]));
        let out = adjust_brightness(
            &DynamicImage::ImageLuma8(img),
            BRIGHTNESS_GAIN,
            BRIGHTNESS_BIAS,
        )
        .to_luma8();
        assert_eq!(out.as_raw(), &vec![40, 160, 255]);
    }

    #[test]
    fn noise_is_seed_deterministic_and_in_range() {
        let src = gradient_rgb(16, 16);
        let a = add_gaussian_noise(&src, NOISE_STDDEV, &mut StdRng::seed_from_u64(7));
        let b = add_gaussian_noise(&src, NOISE_STDDEV, &mut StdRng::seed_from_u64(7));
        let c = add_gaussian_noise(&src, NOISE_STDDEV, &mut StdRng::seed_from_u64(8));
        assert_eq!(a.to_rgb8(), b.to_rgb8());
        assert_ne!(a.to_rgb8(), c.to_rgb8());
        assert_ne!(a.to_rgb8(), src.to_rgb8());
    }

    #[test]
    fn noise_on_extremes_clamps() {
        let white = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([255])));
        let out =
            add_gaussian_noise(&white, NOISE_STDDEV, &mut StdRng::seed_from_u64(1)).to_luma8();
        // Wraparound would produce tiny values next to 255.
        assert!(out.iter().all(|&v| v > 100));
    }

    #[test]
    fn sharpen_preserves_flat_regions_and_clamps_edges() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 5, Rgb([90, 90, 90])));
        assert_eq!(sharpen(&flat).to_rgb8(), flat.to_rgb8());

        let mut dot = GrayImage::from_pixel(3, 3, Luma([0]));
        dot.put_pixel(1, 1, Luma([100]));
        let out = sharpen(&DynamicImage::ImageLuma8(dot)).to_luma8();
        assert_eq!(out.get_pixel(1, 1)[0], 255);
        assert_eq!(out.get_pixel(0, 1)[0], 0);
    }
}
