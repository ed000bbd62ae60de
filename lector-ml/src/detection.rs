use std::collections::BTreeMap;

use anyhow::{Result, bail};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use ndarray::{ArrayD, ArrayView2, ArrayViewD, Axis, Ix2};
use tracing::{debug, instrument};

use crate::{
    arch::DetectionArch,
    document::Geometry,
    hub::{ModelConfig, ModelFiles},
    predictor::PredictorOptions,
    preprocess::{self, Letterbox, Normalization},
    session::OnnxSession,
};

const UNCLIP_RATIO: f32 = 1.5;
const MIN_BOX_SIZE: u32 = 2;

/// A text region relative to the page, with its mean probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub score: f32,
}

impl DetectedBox {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

pub struct DetectionPredictor {
    arch: DetectionArch,
    session: OnnxSession,
    input_size: (u32, u32),
    normalization: Normalization,
    bin_thresh: f32,
    box_thresh: f32,
    batch_size: usize,
    preserve_aspect_ratio: bool,
    symmetric_pad: bool,
}

impl DetectionPredictor {
    pub fn load(arch: DetectionArch, files: &ModelFiles, options: &PredictorOptions) -> Result<Self> {
        let spec = arch.spec();
        let config = ModelConfig::load(files.config.as_deref())?;
        let session = OnnxSession::load(&files.model, options.threads)?;

        let normalization = Normalization {
            mean: config.mean.unwrap_or(spec.normalization.mean),
            std: config.std.unwrap_or(spec.normalization.std),
        };

        Ok(Self {
            arch,
            session,
            input_size: config.input_size().unwrap_or(spec.input_size),
            normalization,
            bin_thresh: options.bin_thresh.unwrap_or(spec.bin_thresh),
            box_thresh: options.box_thresh.unwrap_or(spec.box_thresh),
            batch_size: options.det_batch_size.max(1),
            preserve_aspect_ratio: options.preserve_aspect_ratio,
            symmetric_pad: options.symmetric_pad,
        })
    }

    /// Finds word boxes on every page, sorted top to bottom then left to right.
    #[instrument(level = "info", skip_all, fields(arch = %self.arch, pages = pages.len()))]
    pub fn predict(&mut self, pages: &[DynamicImage]) -> Result<Vec<Vec<DetectedBox>>> {
        let mut results = Vec::with_capacity(pages.len());

        for batch in pages.chunks(self.batch_size) {
            let (inputs, letterboxes): (Vec<_>, Vec<_>) = batch
                .iter()
                .map(|page| {
                    preprocess::resize(
                        page,
                        self.input_size,
                        self.preserve_aspect_ratio,
                        self.symmetric_pad,
                    )
                })
                .unzip();

            let tensor = preprocess::to_tensor(&inputs, self.input_size, &self.normalization);
            let output = self.session.run(tensor)?;
            let maps = probability_maps(&output)?;
            if maps.len_of(Axis(0)) != batch.len() {
                bail!(
                    "detection returned {} maps for {} pages",
                    maps.len_of(Axis(0)),
                    batch.len()
                );
            }

            for (n, letterbox) in letterboxes.iter().enumerate() {
                let logits = maps.index_axis(Axis(0), n).into_dimensionality::<Ix2>()?;
                let prob = logits.mapv(sigmoid);
                let boxes =
                    boxes_from_probability_map(prob.view(), letterbox, self.bin_thresh, self.box_thresh);
                debug!(boxes = boxes.len(), "page detected");
                results.push(boxes);
            }
        }

        Ok(results)
    }
}

/// Reduces a `(N, 1, H, W)` or `(N, H, W, 1)` output to `(N, H, W)`.
fn probability_maps(output: &ArrayD<f32>) -> Result<ArrayViewD<'_, f32>> {
    match output.shape() {
        [_, 1, _, _] => Ok(output.index_axis(Axis(1), 0)),
        [_, _, _, 1] => Ok(output.index_axis(Axis(3), 0)),
        [_, _, _] => Ok(output.view()),
        shape => bail!("unexpected detection output shape {shape:?}"),
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, Copy)]
struct Region {
    xmin: u32,
    ymin: u32,
    xmax: u32,
    ymax: u32,
}

/// Turns a probability map into page-relative boxes.
///
/// Pixels above `bin_thresh` are grouped into 8-connected components; each
/// component's bounding box is scored by the mean probability it covers,
/// expanded by `area * 1.5 / perimeter` and mapped back through `letterbox`.
pub fn boxes_from_probability_map(
    prob: ArrayView2<f32>,
    letterbox: &Letterbox,
    bin_thresh: f32,
    box_thresh: f32,
) -> Vec<DetectedBox> {
    let (height, width) = prob.dim();
    if height == 0 || width == 0 {
        return Vec::new();
    }

    let bitmap = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        if prob[[y as usize, x as usize]] > bin_thresh {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let labels = connected_components(&bitmap, Connectivity::Eight, Luma([0u8]));

    let mut regions: BTreeMap<u32, Region> = BTreeMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        regions
            .entry(label)
            .and_modify(|r| {
                r.xmin = r.xmin.min(x);
                r.ymin = r.ymin.min(y);
                r.xmax = r.xmax.max(x);
                r.ymax = r.ymax.max(y);
            })
            .or_insert(Region {
                xmin: x,
                ymin: y,
                xmax: x,
                ymax: y,
            });
    }

    let (map_w, map_h) = (width as f32, height as f32);
    let mut boxes: Vec<DetectedBox> = regions
        .into_values()
        .filter_map(|r| {
            let w = r.xmax - r.xmin + 1;
            let h = r.ymax - r.ymin + 1;
            if w.min(h) < MIN_BOX_SIZE {
                return None;
            }

            let window = prob.slice(ndarray::s![
                r.ymin as usize..=r.ymax as usize,
                r.xmin as usize..=r.xmax as usize
            ]);
            let score = window.mean().unwrap_or(0.0);
            if score < box_thresh {
                return None;
            }

            let (w, h) = (w as f32, h as f32);
            let distance = w * h * UNCLIP_RATIO / (2.0 * (w + h));
            let (xmin, ymin) = letterbox.to_page(
                (r.xmin as f32 - distance) / map_w,
                (r.ymin as f32 - distance) / map_h,
            );
            let (xmax, ymax) = letterbox.to_page(
                (r.xmin as f32 + w + distance) / map_w,
                (r.ymin as f32 + h + distance) / map_h,
            );
            if xmax <= xmin || ymax <= ymin {
                return None;
            }

            Some(DetectedBox {
                xmin,
                ymin,
                xmax,
                ymax,
                score,
            })
        })
        .collect();

    boxes.sort_by(|a, b| a.ymin.total_cmp(&b.ymin).then(a.xmin.total_cmp(&b.xmin)));
    boxes
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn fill(map: &mut Array2<f32>, (x0, y0, x1, y1): (usize, usize, usize, usize), value: f32) {
        map.slice_mut(ndarray::s![y0..y1, x0..x1]).fill(value);
    }

    #[test]
    fn empty_map_has_no_boxes() {
        let map = Array2::<f32>::zeros((50, 100));
        let boxes = boxes_from_probability_map(map.view(), &Letterbox::identity(100, 50), 0.3, 0.1);
        assert!(boxes.is_empty());
    }

    #[test]
    fn separate_regions_become_sorted_boxes() {
        let mut map = Array2::<f32>::zeros((100, 100));
        fill(&mut map, (60, 10, 90, 20), 0.9);
        fill(&mut map, (10, 10, 40, 20), 0.8);
        fill(&mut map, (10, 60, 40, 70), 0.7);

        let boxes = boxes_from_probability_map(map.view(), &Letterbox::identity(100, 100), 0.3, 0.1);

        assert_eq!(boxes.len(), 3);
        assert!(boxes[0].xmin < boxes[1].xmin);
        assert!(boxes[1].ymax < boxes[2].ymin);
        assert!((boxes[1].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn boxes_are_unclipped() {
        let mut map = Array2::<f32>::zeros((100, 100));
        fill(&mut map, (20, 40, 80, 50), 1.0);

        let boxes = boxes_from_probability_map(map.view(), &Letterbox::identity(100, 100), 0.3, 0.1);
        let b = boxes[0];

        // 60x10 region: distance = 600 * 1.5 / 140
        let d = 600.0 * 1.5 / 140.0 / 100.0;
        assert!((b.xmin - (0.2 - d)).abs() < 1e-4);
        assert!((b.ymax - (0.5 + d)).abs() < 1e-4);
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        let mut map = Array2::<f32>::zeros((20, 20));
        for i in 2..12 {
            fill(&mut map, (i, i, i + 2, i + 2), 1.0);
        }

        let boxes = boxes_from_probability_map(map.view(), &Letterbox::identity(20, 20), 0.3, 0.1);
        assert_eq!(boxes.len(), 1);
    }

    #[test]
    fn thin_and_faint_regions_are_dropped() {
        let mut map = Array2::<f32>::zeros((100, 100));
        // one pixel tall
        fill(&mut map, (10, 10, 60, 11), 0.9);
        // sparse: only a diagonal line inside a large box
        for i in 30..80 {
            map[[i, i]] = 0.5;
        }

        let boxes = boxes_from_probability_map(map.view(), &Letterbox::identity(100, 100), 0.3, 0.1);
        assert!(boxes.is_empty(), "{boxes:?}");
    }

    #[test]
    fn coordinates_account_for_padding() {
        let letterbox = Letterbox {
            target_width: 100,
            target_height: 100,
            content_width: 100,
            content_height: 50,
            offset_x: 0,
            offset_y: 25,
        };
        let mut map = Array2::<f32>::zeros((100, 100));
        fill(&mut map, (0, 25, 100, 75), 1.0);

        let boxes = boxes_from_probability_map(map.view(), &letterbox, 0.3, 0.1);

        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert_eq!((b.xmin, b.ymin, b.xmax, b.ymax), (0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn output_layouts_are_accepted() -> Result<()> {
        let nchw = ArrayD::<f32>::zeros(vec![2, 1, 8, 16]);
        assert_eq!(probability_maps(&nchw)?.shape(), &[2, 8, 16]);

        let nhwc = ArrayD::<f32>::zeros(vec![2, 8, 16, 1]);
        assert_eq!(probability_maps(&nhwc)?.shape(), &[2, 8, 16]);

        let bad = ArrayD::<f32>::zeros(vec![2, 3, 8, 16]);
        assert!(probability_maps(&bad).is_err());
        Ok(())
    }
}
