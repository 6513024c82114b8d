//! ArcFace recognizer and five-point face alignment.

use super::scrfd::FaceBox;
use super::{load_plan, OnnxPlan};
use crate::core::provider::{Embedding, Landmarks};
use crate::error::{DetectionError, ModelInitError};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::path::Path;
use tract_onnx::prelude::*;

/// Recognizer input is a square crop of this size
pub const INPUT_SIZE: u32 = 112;

const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 127.5;

/// Canonical landmark positions in a 112x112 aligned face
pub const ARCFACE_TEMPLATE: Landmarks = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// Rotation + uniform scale + translation:
/// `x' = a*x - b*y + tx`, `y' = b*x + a*y + ty`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl SimilarityTransform {
    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    /// `None` when the transform collapses everything to a point
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.a + self.b * self.b;
        if det < f32::EPSILON {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Self {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

/// Least-squares similarity transform mapping `src` points onto `dst`
pub fn estimate_similarity(src: &Landmarks, dst: &Landmarks) -> Option<SimilarityTransform> {
    let n = src.len() as f32;
    let mean = |points: &Landmarks| {
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    };
    let (msx, msy) = mean(src);
    let (mdx, mdy) = mean(dst);

    let mut spread = 0.0;
    let mut dot = 0.0;
    let mut cross = 0.0;
    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let (sx, sy) = (sx - msx, sy - msy);
        let (dx, dy) = (dx - mdx, dy - mdy);
        spread += sx * sx + sy * sy;
        dot += sx * dx + sy * dy;
        cross += sx * dy - sy * dx;
    }
    if spread < f32::EPSILON {
        return None;
    }

    let a = dot / spread;
    let b = cross / spread;
    Some(SimilarityTransform {
        a,
        b,
        tx: mdx - (a * msx - b * msy),
        ty: mdy - (b * msx + a * msy),
    })
}

/// Render the `size`x`size` output of `transform` (source → output) with
/// bilinear sampling; pixels falling outside the source are black
pub fn warp(image: &RgbImage, transform: &SimilarityTransform, size: u32) -> Option<RgbImage> {
    let inverse = transform.inverse()?;
    let (width, height) = image.dimensions();

    Some(RgbImage::from_fn(size, size, |u, v| {
        let (x, y) = inverse.apply((u as f32, v as f32));
        sample_bilinear(image, x, y, width, height)
    }))
}

fn sample_bilinear(image: &RgbImage, x: f32, y: f32, width: u32, height: u32) -> Rgb<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let fetch = |px: f32, py: f32| -> [f32; 3] {
        if px < 0.0 || py < 0.0 || px >= width as f32 || py >= height as f32 {
            return [0.0; 3];
        }
        let p = image.get_pixel(px as u32, py as u32);
        [p[0] as f32, p[1] as f32, p[2] as f32]
    };

    let tl = fetch(x0, y0);
    let tr = fetch(x0 + 1.0, y0);
    let bl = fetch(x0, y0 + 1.0);
    let br = fetch(x0 + 1.0, y0 + 1.0);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = tl[c] * (1.0 - fx) + tr[c] * fx;
        let bottom = bl[c] * (1.0 - fx) + br[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Produce the 112x112 recognizer crop for a detected face.
///
/// Uses landmark alignment when keypoints are available, otherwise a
/// plain resize of the bounding box.
pub fn align_face(image: &RgbImage, face: &FaceBox) -> RgbImage {
    let aligned = face
        .landmarks
        .and_then(|landmarks| estimate_similarity(&landmarks, &ARCFACE_TEMPLATE))
        .and_then(|transform| warp(image, &transform, INPUT_SIZE));
    if let Some(aligned) = aligned {
        return aligned;
    }

    let (width, height) = image.dimensions();
    let x = (face.bbox.x1.max(0.0) as u32).min(width.saturating_sub(1));
    let y = (face.bbox.y1.max(0.0) as u32).min(height.saturating_sub(1));
    let w = (face.bbox.width() as u32).clamp(1, width - x);
    let h = (face.bbox.height() as u32).clamp(1, height - y);

    let crop = imageops::crop_imm(image, x, y, w, h).to_image();
    imageops::resize(&crop, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
}

/// Loaded ArcFace model
pub struct ArcFaceRecognizer {
    plan: OnnxPlan,
}

impl ArcFaceRecognizer {
    pub fn load(path: &Path) -> Result<Self, ModelInitError> {
        let size = INPUT_SIZE as usize;
        let plan = load_plan(path, [1, 3, size, size])?;
        tracing::debug!(path = %path.display(), "loaded ArcFace recognizer");
        Ok(Self { plan })
    }

    /// Embed one detected face; the result has unit length
    pub fn embed(&self, image: &RgbImage, face: &FaceBox) -> Result<Embedding, DetectionError> {
        let aligned = align_face(image, face);
        let size = INPUT_SIZE as usize;

        let input: Tensor = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            (aligned.get_pixel(x as u32, y as u32)[c] as f32 - INPUT_MEAN) / INPUT_STD
        })
        .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let values = outputs
            .first()
            .ok_or_else(|| DetectionError::InvalidOutput("recognizer returned no outputs".to_string()))?
            .as_slice::<f32>()
            .map_err(|e| DetectionError::InvalidOutput(e.to_string()))?
            .to_vec();

        if values.is_empty() {
            return Err(DetectionError::InvalidOutput("empty embedding".to_string()));
        }
        Ok(Embedding::normalized(values))
    }
}
