//! # Size Provider
//!
//! The layout engine never renders anything. Whenever it needs the pixel size
//! of leaf content (a step image, a part image, a text label) it asks a
//! [`SizeProvider`]. Answers must be a pure function of the request, which
//! lets [`Memoized`] cache them by key.
//!
//! `None` means "no size available"; the engine skips placing the item rather
//! than guessing.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{ColorCode, ItemId, Rotation, Size};

/// One measurement request.
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    /// The content image of a step: the model as assembled up to that step.
    StepImage {
        step: ItemId,
        model: String,
        scale: f64,
        rotation: Vec<Rotation>,
        /// The image changed since it was last measured; cached answers
        /// for the same key are stale.
        fresh: bool,
    },
    /// A single part, or a whole sub-assembly, rendered alone.
    PartImage {
        filename: String,
        color: ColorCode,
        scale: f64,
        rotation: Vec<Rotation>,
    },
    Label { font: String, text: String },
}

impl Measure {
    pub fn label(font: &str, text: &str) -> Self {
        Measure::Label {
            font: font.to_string(),
            text: text.to_string(),
        }
    }

    /// Stable cache key. Identical requests produce identical keys.
    pub fn key(&self) -> String {
        match self {
            Measure::StepImage {
                step,
                model,
                scale,
                rotation,
                ..
            } => format!("csi|{model}|{step}|{scale}|{}", rotation_key(rotation)),
            Measure::PartImage {
                filename,
                color,
                scale,
                rotation,
            } => format!("part|{filename}|{color}|{scale}|{}", rotation_key(rotation)),
            Measure::Label { font, text } => format!("label|{font}|{text}"),
        }
    }

    /// True when the answer must come from the provider, not a cache.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Measure::StepImage { fresh: true, .. })
    }
}

fn rotation_key(rotation: &[Rotation]) -> String {
    rotation
        .iter()
        .map(|r| format!("{:?}{}", r.axis, r.angle))
        .collect::<Vec<_>>()
        .join(",")
}

/// Answers measurement requests for the layout engine.
pub trait SizeProvider {
    fn measure(&self, request: &Measure) -> Option<Size>;
}

impl<F> SizeProvider for F
where
    F: Fn(&Measure) -> Option<Size>,
{
    fn measure(&self, request: &Measure) -> Option<Size> {
        self(request)
    }
}

/// Caches another provider's answers by request key.
pub struct Memoized<P> {
    inner: P,
    cache: RefCell<HashMap<String, Option<Size>>>,
}

impl<P: SizeProvider> Memoized<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Forget every cached answer, e.g. after the model's parts changed.
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<P: SizeProvider> SizeProvider for Memoized<P> {
    fn measure(&self, request: &Measure) -> Option<Size> {
        let key = request.key();
        if !request.is_fresh() {
            if let Some(hit) = self.cache.borrow().get(&key) {
                return *hit;
            }
        }
        let size = self.inner.measure(request);
        self.cache.borrow_mut().insert(key, size);
        size
    }
}

/// Approximate text metrics for [`StaticSizes`], in multiples of the font size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelMetrics {
    pub char_width: f64,
    pub line_height: f64,
    /// Font size used when the font string carries none.
    pub fallback_px: f64,
}

impl Default for LabelMetrics {
    fn default() -> Self {
        Self {
            char_width: 0.6,
            line_height: 1.2,
            fallback_px: 16.0,
        }
    }
}

/// A table-backed provider, loadable from JSON.
///
/// Step images are keyed by step id, part images by filename (optionally
/// `"filename:color"` for a color-specific entry). Sizes are multiplied by the
/// request's scale. Labels are estimated from the font size found in the font
/// string (`"bold 18pt Helvetica"` is 24px).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticSizes {
    pub step_images: HashMap<String, Size>,
    pub default_step_image: Option<Size>,
    pub part_images: HashMap<String, Size>,
    pub default_part_image: Option<Size>,
    pub labels: LabelMetrics,
}

impl StaticSizes {
    fn font_px(&self, font: &str) -> f64 {
        font.split_whitespace()
            .find_map(|tok| {
                if let Some(pt) = tok.strip_suffix("pt") {
                    pt.parse::<f64>().ok().map(|v| v * 96.0 / 72.0)
                } else {
                    tok.strip_suffix("px").and_then(|px| px.parse::<f64>().ok())
                }
            })
            .unwrap_or(self.labels.fallback_px)
    }
}

fn scaled(size: Size, scale: f64) -> Size {
    Size::new(size.width * scale, size.height * scale)
}

impl SizeProvider for StaticSizes {
    fn measure(&self, request: &Measure) -> Option<Size> {
        match request {
            Measure::StepImage { step, scale, .. } => self
                .step_images
                .get(&step.to_string())
                .copied()
                .or(self.default_step_image)
                .map(|s| scaled(s, *scale)),
            Measure::PartImage {
                filename,
                color,
                scale,
                ..
            } => self
                .part_images
                .get(&format!("{filename}:{color}"))
                .or_else(|| self.part_images.get(filename))
                .copied()
                .or(self.default_part_image)
                .map(|s| scaled(s, *scale)),
            Measure::Label { font, text } => {
                let px = self.font_px(font);
                let chars = text.chars().count() as f64;
                Some(Size::new(
                    (chars * px * self.labels.char_width).ceil(),
                    (px * self.labels.line_height).ceil(),
                ))
            }
        }
    }
}
