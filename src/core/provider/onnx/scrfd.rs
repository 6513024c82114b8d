//! SCRFD face detector.
//!
//! SCRFD predicts, per feature-map cell and anchor, a face score, distances
//! from the anchor center to the four box edges, and optionally five
//! keypoints. Exported models have one output group per stride:
//!
//! | Outputs | Strides        | Anchors | Keypoints |
//! |---------|----------------|---------|-----------|
//! | 6       | 8, 16, 32      | 2       | no        |
//! | 9       | 8, 16, 32      | 2       | yes       |
//! | 10      | 8 .. 128       | 1       | no        |
//! | 15      | 8 .. 128       | 1       | yes       |

use super::{load_plan, OnnxPlan};
use crate::core::provider::{BoundingBox, Landmarks};
use crate::error::{DetectionError, ModelInitError};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::Path;
use tract_onnx::prelude::*;

const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 128.0;
const NMS_THRESHOLD: f32 = 0.4;

/// A detector hit before embedding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub bbox: BoundingBox,
    pub landmarks: Option<Landmarks>,
}

/// How the detector's outputs are grouped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrfdLayout {
    pub strides: Vec<u32>,
    pub anchors_per_cell: usize,
    pub has_landmarks: bool,
}

impl ScrfdLayout {
    pub fn from_output_count(count: usize) -> Option<Self> {
        let (strides, anchors_per_cell, has_landmarks) = match count {
            6 => (vec![8, 16, 32], 2, false),
            9 => (vec![8, 16, 32], 2, true),
            10 => (vec![8, 16, 32, 64, 128], 1, false),
            15 => (vec![8, 16, 32, 64, 128], 1, true),
            _ => return None,
        };
        Some(Self {
            strides,
            anchors_per_cell,
            has_landmarks,
        })
    }

    fn group_count(&self) -> usize {
        if self.has_landmarks {
            3
        } else {
            2
        }
    }
}

/// Aspect-preserving resize into the top-left corner of the detector input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub width: u32,
    pub height: u32,
    /// Resized size divided by source size
    pub scale: f32,
}

impl Letterbox {
    pub fn fit(source: (u32, u32), target: (u32, u32)) -> Self {
        let (src_w, src_h) = (source.0.max(1) as f32, source.1.max(1) as f32);
        let (dst_w, dst_h) = (target.0 as f32, target.1 as f32);

        let image_ratio = src_h / src_w;
        let model_ratio = dst_h / dst_w;
        let (width, height) = if image_ratio > model_ratio {
            ((dst_h / image_ratio) as u32, target.1)
        } else {
            (target.0, (dst_w * image_ratio) as u32)
        };
        let (width, height) = (width.max(1), height.max(1));

        Self {
            width,
            height,
            scale: height as f32 / src_h,
        }
    }
}

/// Turn raw detector outputs into face boxes in source coordinates.
///
/// `outputs` are ordered scores, then box distances, then keypoints, each
/// group ordered by stride. `scale` is the letterbox scale.
pub fn decode_outputs(
    outputs: &[&[f32]],
    layout: &ScrfdLayout,
    input_size: (u32, u32),
    threshold: f32,
    scale: f32,
) -> Vec<FaceBox> {
    let levels = layout.strides.len();
    let anchors = layout.anchors_per_cell;
    let mut faces = Vec::new();

    for (level, &stride) in layout.strides.iter().enumerate() {
        let scores = outputs[level];
        let distances = outputs[level + levels];
        let keypoints = layout.has_landmarks.then(|| outputs[level + 2 * levels]);

        let cols = (input_size.0 / stride) as usize;
        let rows = (input_size.1 / stride) as usize;
        let step = stride as f32;

        for cell in 0..rows * cols {
            let cx = (cell % cols) as f32 * step;
            let cy = (cell / cols) as f32 * step;

            for anchor in 0..anchors {
                let i = cell * anchors + anchor;
                let Some(&score) = scores.get(i) else {
                    continue;
                };
                if score < threshold {
                    continue;
                }
                let Some(d) = distances.get(i * 4..i * 4 + 4) else {
                    continue;
                };

                let bbox = BoundingBox {
                    x1: (cx - d[0] * step) / scale,
                    y1: (cy - d[1] * step) / scale,
                    x2: (cx + d[2] * step) / scale,
                    y2: (cy + d[3] * step) / scale,
                    confidence: score,
                };

                let landmarks = keypoints
                    .and_then(|k| k.get(i * 10..i * 10 + 10))
                    .map(|k| {
                        let mut points: Landmarks = [(0.0, 0.0); 5];
                        for (p, point) in points.iter_mut().enumerate() {
                            *point = (
                                (cx + k[2 * p] * step) / scale,
                                (cy + k[2 * p + 1] * step) / scale,
                            );
                        }
                        points
                    });

                faces.push(FaceBox { bbox, landmarks });
            }
        }
    }

    faces
}

/// Greedy NMS: keep the most confident box, drop others overlapping it
pub fn non_max_suppression(mut faces: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    faces.sort_by(|a, b| b.bbox.confidence.total_cmp(&a.bbox.confidence));

    let mut kept: Vec<FaceBox> = Vec::with_capacity(faces.len());
    for face in faces {
        if kept
            .iter()
            .all(|k| k.bbox.iou(&face.bbox) <= iou_threshold)
        {
            kept.push(face);
        }
    }
    kept
}

/// Loaded SCRFD model
pub struct ScrfdDetector {
    plan: OnnxPlan,
    layout: ScrfdLayout,
    input_size: (u32, u32),
    threshold: f32,
}

impl ScrfdDetector {
    pub fn load(path: &Path, input_size: (u32, u32), threshold: f32) -> Result<Self, ModelInitError> {
        let plan = load_plan(path, [1, 3, input_size.1 as usize, input_size.0 as usize])?;

        let output_count = plan.model().outputs.len();
        let layout = ScrfdLayout::from_output_count(output_count).ok_or_else(|| {
            ModelInitError::Load {
                path: path.to_path_buf(),
                reason: format!("unsupported SCRFD layout with {} outputs", output_count),
            }
        })?;

        tracing::debug!(
            path = %path.display(),
            outputs = output_count,
            strides = ?layout.strides,
            "loaded SCRFD detector"
        );

        Ok(Self {
            plan,
            layout,
            input_size,
            threshold,
        })
    }

    /// Detect faces, returning boxes and landmarks in source coordinates
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>, DetectionError> {
        let letterbox = Letterbox::fit(image.dimensions(), self.input_size);
        let input = self.preprocess(image, &letterbox);

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let expected = self.layout.strides.len() * self.layout.group_count();
        if outputs.len() != expected {
            return Err(DetectionError::InvalidOutput(format!(
                "expected {} detector outputs, got {}",
                expected,
                outputs.len()
            )));
        }

        let slices = outputs
            .iter()
            .map(|t| t.as_slice::<f32>())
            .collect::<TractResult<Vec<&[f32]>>>()
            .map_err(|e| DetectionError::InvalidOutput(e.to_string()))?;

        let candidates = decode_outputs(
            &slices,
            &self.layout,
            self.input_size,
            self.threshold,
            letterbox.scale,
        );
        Ok(non_max_suppression(candidates, NMS_THRESHOLD))
    }

    fn preprocess(&self, image: &RgbImage, letterbox: &Letterbox) -> Tensor {
        let resized = imageops::resize(image, letterbox.width, letterbox.height, FilterType::Triangle);
        let (width, height) = (self.input_size.0 as usize, self.input_size.1 as usize);

        // Padding is black before normalization, like the reference preprocessing
        let mut input =
            tract_ndarray::Array4::<f32>::from_elem((1, 3, height, width), -INPUT_MEAN / INPUT_STD);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            if x >= width || y >= height {
                continue;
            }
            for c in 0..3 {
                input[[0, c, y, x]] = (pixel[c] as f32 - INPUT_MEAN) / INPUT_STD;
            }
        }
        input.into()
    }
}
