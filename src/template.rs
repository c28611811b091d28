//! # Template
//!
//! The nested set of knobs that drives layout: page size, margins, fonts,
//! borders and per-kind parameters. Every margin is stored as a fraction of
//! the page's longest side and converted with [`Template::margin`].
//!
//! Templates deserialize from camelCase JSON and every field has a default,
//! so a document may carry only the handful of values it overrides:
//!
//! ```json
//! { "page": { "width": 800, "numberLabel": { "position": "even-left" } } }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Template {
    pub page: PageTemplate,
    pub step: StepTemplate,
    pub submodel_image: SubmodelImageTemplate,
    pub pli: PliTemplate,
    pub pli_item: PliItemTemplate,
    pub callout: CalloutTemplate,
    pub rotate_icon: RotateIconTemplate,
}

impl Template {
    /// Convert a margin fraction into pixels.
    pub fn margin(&self, fraction: f64) -> f64 {
        fraction * self.page.width.max(self.page.height)
    }

    /// Drawable page area once the border is removed.
    pub fn page_interior(&self) -> (f64, f64) {
        let border = self.page.border.width;
        (
            self.page.width - border * 2.0,
            self.page.height - border * 2.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageTemplate {
    pub width: f64,
    pub height: f64,
    pub inner_margin: f64,
    pub number_label: PageNumberTemplate,
    pub divider: StrokeTemplate,
    pub fill: Fill,
    pub border: Border,
}

impl Default for PageTemplate {
    fn default() -> Self {
        Self {
            width: 900.0,
            height: 700.0,
            inner_margin: 0.025,
            number_label: PageNumberTemplate::default(),
            divider: StrokeTemplate::default(),
            fill: Fill {
                color: Some("white".to_string()),
            },
            border: Border {
                width: 0.0,
                color: "black".to_string(),
                corner_radius: 0.0,
            },
        }
    }
}

/// Where page numbers sit. The `even-*` variants alternate sides, placing the
/// number on the named side for even pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumberPosition {
    Left,
    #[default]
    Right,
    EvenLeft,
    EvenRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageNumberTemplate {
    pub font: String,
    pub color: String,
    pub position: NumberPosition,
}

impl Default for PageNumberTemplate {
    fn default() -> Self {
        Self {
            font: "bold 18pt Helvetica".to_string(),
            color: "black".to_string(),
            position: NumberPosition::Right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontTemplate {
    pub font: String,
    pub color: String,
}

impl FontTemplate {
    fn new(font: &str) -> Self {
        Self {
            font: font.to_string(),
            color: "black".to_string(),
        }
    }
}

impl Default for FontTemplate {
    fn default() -> Self {
        Self::new("bold 18pt Helvetica")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fill {
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Border {
    pub width: f64,
    pub color: String,
    pub corner_radius: f64,
}

impl Default for Border {
    fn default() -> Self {
        Self {
            width: 2.0,
            color: "black".to_string(),
            corner_radius: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stroke {
    pub width: f64,
    pub color: String,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            width: 2.0,
            color: "black".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrokeTemplate {
    pub border: Stroke,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisRotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CsiTemplate {
    pub scale: f64,
    pub rotation: AxisRotation,
}

impl Default for CsiTemplate {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: AxisRotation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepTemplate {
    pub inner_margin: f64,
    pub csi: CsiTemplate,
    pub number_label: FontTemplate,
}

impl Default for StepTemplate {
    fn default() -> Self {
        Self {
            inner_margin: 0.02,
            csi: CsiTemplate::default(),
            number_label: FontTemplate::new("bold 22pt Helvetica"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmodelImageTemplate {
    pub inner_margin: f64,
    /// Largest image height as a fraction of the enclosing step's height.
    pub max_height: f64,
    pub csi: CsiTemplate,
    pub fill: Fill,
    pub border: Border,
    pub quantity_label: FontTemplate,
}

impl Default for SubmodelImageTemplate {
    fn default() -> Self {
        Self {
            inner_margin: 0.017,
            max_height: 0.3,
            csi: CsiTemplate::default(),
            fill: Fill::default(),
            border: Border::default(),
            quantity_label: FontTemplate::new("bold 18pt Helvetica"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PliTemplate {
    pub inner_margin: f64,
    /// List sub-assemblies in parts lists instead of showing them inline.
    pub include_submodels: bool,
    pub fill: Fill,
    pub border: Border,
}

impl Default for PliTemplate {
    fn default() -> Self {
        Self {
            inner_margin: 0.017,
            include_submodels: false,
            fill: Fill::default(),
            border: Border::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PliItemTemplate {
    pub scale: f64,
    pub rotation: AxisRotation,
    pub quantity_label: FontTemplate,
}

impl Default for PliItemTemplate {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: AxisRotation::default(),
            quantity_label: FontTemplate::new("bold 10pt Helvetica"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalloutStepTemplate {
    pub inner_margin: f64,
    pub number_label: FontTemplate,
}

impl Default for CalloutStepTemplate {
    fn default() -> Self {
        Self {
            inner_margin: 0.012,
            number_label: FontTemplate::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalloutTemplate {
    pub inner_margin: f64,
    pub fill: Fill,
    pub border: Border,
    pub arrow: StrokeTemplate,
    pub step: CalloutStepTemplate,
}

impl Default for CalloutTemplate {
    fn default() -> Self {
        Self {
            inner_margin: 0.012,
            fill: Fill::default(),
            border: Border::default(),
            arrow: StrokeTemplate::default(),
            step: CalloutStepTemplate::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RotateIconTemplate {
    pub size: f64,
    pub fill: Fill,
    pub border: Border,
    pub arrow: StrokeTemplate,
}

impl Default for RotateIconTemplate {
    fn default() -> Self {
        Self {
            size: 40.0,
            fill: Fill::default(),
            border: Border::default(),
            arrow: StrokeTemplate {
                border: Stroke {
                    width: 3.0,
                    color: "black".to_string(),
                },
            },
        }
    }
}
