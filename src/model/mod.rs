//! # Document Model
//!
//! The normalized entity graph behind an instruction book. Every entity lives
//! in a per-kind collection inside [`crate::store::Document`] and is addressed
//! by an [`ItemRef`] (a `{type, id}` pair) rather than by pointer. Parents
//! hold child ids in typed slots (a list such as `steps`, or a single field
//! such as `csi`), and every child carries a `parent` back-reference.
//!
//! The shared capabilities ("has a box", "has a parent", "owns points", "has
//! child slots") are expressed through the [`Item`] trait, which the store uses
//! to implement generic add / delete / reparent / reposition.

pub mod geom;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use geom::{Edge, Offset, Rect, Size};

/// Identifier of a live item, unique within its kind's collection.
pub type ItemId = u32;

/// Identifier of a part inside the external 3D model.
pub type PartId = u32;

/// Color code of a part, as defined by the external model's color table.
pub type ColorCode = i32;

/// Every kind of entity the document can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Annotation,
    Book,
    Callout,
    CalloutArrow,
    Csi,
    Divider,
    NumberLabel,
    Page,
    Pli,
    PliItem,
    Point,
    QuantityLabel,
    RotateIcon,
    Step,
    SubmodelImage,
}

impl ItemKind {
    pub const ALL: [ItemKind; 15] = [
        ItemKind::Annotation,
        ItemKind::Book,
        ItemKind::Callout,
        ItemKind::CalloutArrow,
        ItemKind::Csi,
        ItemKind::Divider,
        ItemKind::NumberLabel,
        ItemKind::Page,
        ItemKind::Pli,
        ItemKind::PliItem,
        ItemKind::Point,
        ItemKind::QuantityLabel,
        ItemKind::RotateIcon,
        ItemKind::Step,
        ItemKind::SubmodelImage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Annotation => "annotation",
            ItemKind::Book => "book",
            ItemKind::Callout => "callout",
            ItemKind::CalloutArrow => "calloutArrow",
            ItemKind::Csi => "csi",
            ItemKind::Divider => "divider",
            ItemKind::NumberLabel => "numberLabel",
            ItemKind::Page => "page",
            ItemKind::Pli => "pli",
            ItemKind::PliItem => "pliItem",
            ItemKind::Point => "point",
            ItemKind::QuantityLabel => "quantityLabel",
            ItemKind::RotateIcon => "rotateIcon",
            ItemKind::Step => "step",
            ItemKind::SubmodelImage => "submodelImage",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lightweight `{type, id}` reference to an item.
///
/// A reference may go stale when its target is deleted; resolving it then
/// yields `None`, never an unrelated item, because ids are not reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub id: ItemId,
}

impl ItemRef {
    pub fn new(kind: ItemKind, id: ItemId) -> Self {
        Self { kind, id }
    }

    pub fn page(id: ItemId) -> Self {
        Self::new(ItemKind::Page, id)
    }

    pub fn step(id: ItemId) -> Self {
        Self::new(ItemKind::Step, id)
    }

    pub fn callout(id: ItemId) -> Self {
        Self::new(ItemKind::Callout, id)
    }

    pub fn csi(id: ItemId) -> Self {
        Self::new(ItemKind::Csi, id)
    }

    pub fn pli(id: ItemId) -> Self {
        Self::new(ItemKind::Pli, id)
    }

    pub fn pli_item(id: ItemId) -> Self {
        Self::new(ItemKind::PliItem, id)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Mutable access to the parent field that holds children of one kind.
pub enum ChildSlot<'a> {
    List(&'a mut Vec<ItemId>),
    Single(&'a mut Option<ItemId>),
}

/// Capabilities shared by every entity kind.
pub trait Item {
    fn kind(&self) -> ItemKind;
    fn id(&self) -> ItemId;
    fn set_id(&mut self, id: ItemId);
    fn parent(&self) -> Option<ItemRef>;
    fn set_parent(&mut self, parent: Option<ItemRef>);

    /// Every child reference this item owns, in slot order.
    fn children(&self) -> Vec<ItemRef>;

    /// The field holding children of `kind`, if this item can own them.
    fn child_slot(&mut self, kind: ItemKind) -> Option<ChildSlot<'_>>;

    fn item_ref(&self) -> ItemRef {
        ItemRef::new(self.kind(), self.id())
    }

    fn bounds(&self) -> Option<Rect> {
        None
    }

    fn bounds_mut(&mut self) -> Option<&mut Option<Rect>> {
        None
    }

    /// Offset applied to children's coordinates (the item's border width).
    fn inner_offset(&self) -> Offset {
        Offset::ZERO
    }

    /// Position of this item in its parent's coordinate space.
    fn origin(&self) -> Offset {
        self.bounds().map(|b| b.origin()).unwrap_or_default()
    }

    /// Name of a required child collection that is currently non-empty.
    ///
    /// Items with populated required children refuse a non-cascading delete.
    fn required_children(&self) -> Option<&'static str> {
        None
    }

    /// Move the item by a delta. Items without a box are left untouched.
    fn translate(&mut self, dx: f64, dy: f64) {
        if let Some(Some(b)) = self.bounds_mut() {
            b.translate(dx, dy);
        }
    }
}

macro_rules! impl_item {
    (
        $ty:ident: $kind:ident,
        lists { $($lk:ident => $lf:ident),* $(,)? },
        singles { $($sk:ident => $sf:ident),* $(,)? }
        $(, bounds $bf:ident)?
        $(; $($extra:tt)*)?
    ) => {
        impl Item for $ty {
            fn kind(&self) -> ItemKind {
                ItemKind::$kind
            }

            fn id(&self) -> ItemId {
                self.id
            }

            fn set_id(&mut self, id: ItemId) {
                self.id = id;
            }

            fn parent(&self) -> Option<ItemRef> {
                self.parent
            }

            fn set_parent(&mut self, parent: Option<ItemRef>) {
                self.parent = parent;
            }

            #[allow(unused_mut)]
            fn children(&self) -> Vec<ItemRef> {
                let mut out = Vec::new();
                $( out.extend(self.$lf.iter().map(|&id| ItemRef::new(ItemKind::$lk, id))); )*
                $( if let Some(id) = self.$sf { out.push(ItemRef::new(ItemKind::$sk, id)); } )*
                out
            }

            fn child_slot(&mut self, kind: ItemKind) -> Option<ChildSlot<'_>> {
                match kind {
                    $( ItemKind::$lk => Some(ChildSlot::List(&mut self.$lf)), )*
                    $( ItemKind::$sk => Some(ChildSlot::Single(&mut self.$sf)), )*
                    _ => None,
                }
            }

            $(
                fn bounds(&self) -> Option<Rect> {
                    self.$bf
                }

                fn bounds_mut(&mut self) -> Option<&mut Option<Rect>> {
                    Some(&mut self.$bf)
                }
            )?

            $( $($extra)* )?
        }
    };
}

// ── Enumerations ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Up,
    Down,
    Left,
    #[default]
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Align {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VAlign {
    #[default]
    Top,
    Bottom,
}

/// What a page is for. Only `Page` pages hold numbered content steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageKind {
    #[default]
    Page,
    Title,
    Template,
    Inventory,
}

impl PageKind {
    pub fn is_basic(self) -> bool {
        self == PageKind::Page
    }
}

/// Number of grid rows or columns: a count, or `"auto"` to derive it from
/// the other dimension and the number of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "GridCountRepr", into = "GridCountRepr")]
pub enum GridCount {
    Auto,
    Count(u32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GridCountRepr {
    Count(u32),
    Word(String),
}

impl TryFrom<GridCountRepr> for GridCount {
    type Error = String;

    fn try_from(repr: GridCountRepr) -> Result<Self, Self::Error> {
        match repr {
            GridCountRepr::Count(n) => Ok(GridCount::Count(n)),
            GridCountRepr::Word(w) if w == "auto" => Ok(GridCount::Auto),
            GridCountRepr::Word(w) => Err(format!("expected a number or \"auto\", got {w:?}")),
        }
    }
}

impl From<GridCount> for GridCountRepr {
    fn from(count: GridCount) -> Self {
        match count {
            GridCount::Auto => GridCountRepr::Word("auto".to_string()),
            GridCount::Count(n) => GridCountRepr::Count(n),
        }
    }
}

/// Explicit grid request for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub rows: GridCount,
    pub cols: GridCount,
    /// Fill order. When absent, follows the page's aspect ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Orientation>,
}

/// How a page arranges its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageLayout {
    Flow(Orientation),
    Grid(GridLayout),
}

impl Default for PageLayout {
    fn default() -> Self {
        PageLayout::Flow(Orientation::Horizontal)
    }
}

/// Marks a page as the continuation of a step stretched from an earlier page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StretchedStep {
    pub step_id: ItemId,
    /// Horizontal offset of the stretched step as seen from this page.
    pub left_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One rotation applied to a rendered image; rotations apply in list order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub axis: Axis,
    pub angle: f64,
}

/// A part placed by a step, as described by the external model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: PartId,
    pub filename: String,
    pub color: ColorCode,
    /// The part is itself a sub-assembly.
    #[serde(default)]
    pub submodel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplacedPart {
    pub part_id: PartId,
    pub direction: Direction,
}

/// Which model (or submodel) a step builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepModel {
    pub filename: String,
    #[serde(default)]
    pub parent_step: Option<ItemId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationType {
    #[default]
    Label,
    Arrow,
    Image,
}

/// Annotations the layout engine creates and maintains itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationRole {
    TitleModelName,
    TitlePageCount,
    /// Connector from a finished sub-assembly to where it is used.
    SubmodelArrow,
}

// ── Entities ────────────────────────────────────────────────────

/// A named, ordered group of pages for multi-volume output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    pub number: u32,
    #[serde(default)]
    pub pages: Vec<ItemId>,
}

impl_item!(Book: Book, lists { Page => pages }, singles {});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub subtype: PageKind,
    #[serde(default)]
    pub number: Option<i32>,
    #[serde(default)]
    pub number_label: Option<ItemId>,
    #[serde(default)]
    pub steps: Vec<ItemId>,
    #[serde(default)]
    pub pli_items: Vec<ItemId>,
    #[serde(default)]
    pub annotations: Vec<ItemId>,
    #[serde(default)]
    pub dividers: Vec<ItemId>,
    #[serde(default)]
    pub needs_layout: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub layout: PageLayout,
    /// The grid actually used by the last layout pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_layout: Option<PageLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stretched_step: Option<StretchedStep>,
    #[serde(default)]
    pub inner_offset: Offset,
}

impl_item!(Page: Page,
    lists { Step => steps, PliItem => pli_items, Annotation => annotations, Divider => dividers },
    singles { NumberLabel => number_label };
    fn inner_offset(&self) -> Offset {
        self.inner_offset
    }

    fn required_children(&self) -> Option<&'static str> {
        (!self.steps.is_empty()).then_some("steps")
    }
);

impl Page {
    pub fn new(subtype: PageKind) -> Self {
        Self {
            subtype,
            needs_layout: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub number_label: Option<ItemId>,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub csi: Option<ItemId>,
    #[serde(default)]
    pub pli: Option<ItemId>,
    #[serde(default)]
    pub callouts: Vec<ItemId>,
    /// Nested sub-steps. A step with sub-steps shows no content image itself.
    #[serde(default)]
    pub steps: Vec<ItemId>,
    #[serde(default)]
    pub submodel_images: Vec<ItemId>,
    #[serde(default)]
    pub annotations: Vec<ItemId>,
    #[serde(default)]
    pub dividers: Vec<ItemId>,
    #[serde(default)]
    pub rotate_icon: Option<ItemId>,
    #[serde(default = "default_sub_step_layout")]
    pub sub_step_layout: Orientation,
    #[serde(default)]
    pub displaced_parts: Vec<DisplacedPart>,
    /// Trailing pages this step spills across.
    #[serde(default)]
    pub stretched_pages: Vec<ItemId>,
    #[serde(default)]
    pub model: StepModel,
    #[serde(default)]
    pub bounds: Option<Rect>,
}

fn default_sub_step_layout() -> Orientation {
    Orientation::Vertical
}

impl Default for Step {
    fn default() -> Self {
        Self {
            id: 0,
            parent: None,
            number: None,
            number_label: None,
            parts: Vec::new(),
            csi: None,
            pli: None,
            callouts: Vec::new(),
            steps: Vec::new(),
            submodel_images: Vec::new(),
            annotations: Vec::new(),
            dividers: Vec::new(),
            rotate_icon: None,
            sub_step_layout: default_sub_step_layout(),
            displaced_parts: Vec::new(),
            stretched_pages: Vec::new(),
            model: StepModel::default(),
            bounds: None,
        }
    }
}

impl_item!(Step: Step,
    lists {
        Callout => callouts,
        Step => steps,
        SubmodelImage => submodel_images,
        Annotation => annotations,
        Divider => dividers,
    },
    singles { NumberLabel => number_label, Csi => csi, Pli => pli, RotateIcon => rotate_icon },
    bounds bounds;
    fn required_children(&self) -> Option<&'static str> {
        (!self.parts.is_empty()).then_some("parts")
    }
);

impl Step {
    /// True when any part placed here is a sub-assembly.
    pub fn has_submodel(&self) -> bool {
        self.parts.iter().any(|p| p.submodel)
    }
}

/// The rendered image of the model at one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Csi {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub rotation: Option<Vec<Rotation>>,
    /// Scale chosen by the user; overrides auto-scaling.
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub auto_scale: Option<f64>,
    /// Forces the size provider to be consulted again.
    #[serde(default)]
    pub is_dirty: bool,
    #[serde(default)]
    pub annotations: Vec<ItemId>,
    #[serde(default)]
    pub bounds: Option<Rect>,
}

impl_item!(Csi: Csi, lists { Annotation => annotations }, singles {}, bounds bounds);

impl Csi {
    pub fn rotation(&self) -> &[Rotation] {
        self.rotation.as_deref().unwrap_or(&[])
    }
}

/// The parts-list box of a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pli {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub pli_items: Vec<ItemId>,
    #[serde(default)]
    pub bounds: Option<Rect>,
    #[serde(default)]
    pub inner_offset: Offset,
    /// Offset from the box origin to the drawn border, after a bounding-box adjustment.
    #[serde(default)]
    pub border_offset: Offset,
}

impl_item!(Pli: Pli, lists { PliItem => pli_items }, singles {}, bounds bounds;
    fn inner_offset(&self) -> Offset {
        self.inner_offset
    }

    fn required_children(&self) -> Option<&'static str> {
        (!self.pli_items.is_empty()).then_some("pliItems")
    }
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PliItem {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    pub filename: String,
    pub color: ColorCode,
    pub quantity: u32,
    #[serde(default)]
    pub quantity_label: Option<ItemId>,
    #[serde(default)]
    pub submodel: bool,
    #[serde(default)]
    pub bounds: Option<Rect>,
}

impl_item!(PliItem: PliItem, lists {}, singles { QuantityLabel => quantity_label }, bounds bounds);

/// A sub-assembly shown inline in the step that uses it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmodelImage {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    pub model_filename: String,
    #[serde(default)]
    pub color: ColorCode,
    pub quantity: u32,
    #[serde(default)]
    pub csi: Option<ItemId>,
    #[serde(default)]
    pub quantity_label: Option<ItemId>,
    #[serde(default)]
    pub bounds: Option<Rect>,
    #[serde(default)]
    pub inner_offset: Offset,
}

impl_item!(SubmodelImage: SubmodelImage,
    lists {},
    singles { Csi => csi, QuantityLabel => quantity_label },
    bounds bounds;
    fn inner_offset(&self) -> Offset {
        self.inner_offset
    }
);

/// A boxed sub-sequence of steps shown beside its parent step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Callout {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub steps: Vec<ItemId>,
    #[serde(default)]
    pub callout_arrows: Vec<ItemId>,
    #[serde(default)]
    pub position: Edge,
    #[serde(default)]
    pub layout: Orientation,
    #[serde(default)]
    pub bounds: Option<Rect>,
    #[serde(default)]
    pub inner_offset: Offset,
    #[serde(default)]
    pub border_offset: Offset,
}

impl_item!(Callout: Callout,
    lists { Step => steps, CalloutArrow => callout_arrows },
    singles {},
    bounds bounds;
    fn inner_offset(&self) -> Offset {
        self.inner_offset
    }
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalloutArrow {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub points: Vec<ItemId>,
    #[serde(default)]
    pub direction: Direction,
}

impl_item!(CalloutArrow: CalloutArrow, lists { Point => points }, singles {});

/// A vertex of an arrow or annotation.
///
/// Coordinates are in the space of `relative_to` when set, otherwise in the
/// space of the point's owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub relative_to: Option<ItemRef>,
}

impl_item!(Point: Point, lists {}, singles {};
    fn origin(&self) -> Offset {
        Offset::new(self.x, self.y)
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }
);

/// A straight separator line between grid cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Divider {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    pub p1: Offset,
    pub p2: Offset,
}

impl_item!(Divider: Divider, lists {}, singles {};
    fn translate(&mut self, dx: f64, dy: f64) {
        self.p1.translate(dx, dy);
        self.p2.translate(dx, dy);
    }
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberLabel {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub valign: VAlign,
    #[serde(default)]
    pub bounds: Option<Rect>,
}

impl_item!(NumberLabel: NumberLabel, lists {}, singles {}, bounds bounds);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityLabel {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub valign: VAlign,
    #[serde(default)]
    pub bounds: Option<Rect>,
}

impl_item!(QuantityLabel: QuantityLabel, lists {}, singles {}, bounds bounds);

/// Free-form label, arrow or image placed by the author (or by layout).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub annotation_type: AnnotationType,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub font: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub valign: VAlign,
    #[serde(default)]
    pub points: Vec<ItemId>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AnnotationRole>,
    #[serde(default)]
    pub bounds: Option<Rect>,
}

impl_item!(Annotation: Annotation, lists { Point => points }, singles {}, bounds bounds);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateIcon {
    pub id: ItemId,
    #[serde(default)]
    pub parent: Option<ItemRef>,
    #[serde(default)]
    pub bounds: Option<Rect>,
}

impl_item!(RotateIcon: RotateIcon, lists {}, singles {}, bounds bounds);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ref_serializes_as_type_and_id() {
        let json = serde_json::to_string(&ItemRef::new(ItemKind::PliItem, 7)).unwrap();
        assert_eq!(json, r#"{"type":"pliItem","id":7}"#);
    }

    #[test]
    fn grid_count_accepts_auto_and_numbers() {
        let layout: GridLayout =
            serde_json::from_str(r#"{"rows": "auto", "cols": 3, "direction": "vertical"}"#).unwrap();
        assert_eq!(layout.rows, GridCount::Auto);
        assert_eq!(layout.cols, GridCount::Count(3));
        assert_eq!(layout.direction, Some(Orientation::Vertical));
        assert!(serde_json::from_str::<GridCount>(r#""many""#).is_err());
    }

    #[test]
    fn page_layout_is_either_orientation_or_grid() {
        let flow: PageLayout = serde_json::from_str(r#""vertical""#).unwrap();
        assert_eq!(flow, PageLayout::Flow(Orientation::Vertical));
        let grid: PageLayout = serde_json::from_str(r#"{"rows": 2, "cols": "auto"}"#).unwrap();
        assert!(matches!(grid, PageLayout::Grid(_)));
    }

    #[test]
    fn step_children_follow_slot_order() {
        let step = Step {
            id: 1,
            callouts: vec![4],
            csi: Some(2),
            number_label: Some(9),
            ..Default::default()
        };
        assert_eq!(
            step.children(),
            vec![
                ItemRef::callout(4),
                ItemRef::new(ItemKind::NumberLabel, 9),
                ItemRef::csi(2),
            ]
        );
    }

    #[test]
    fn divider_translates_both_endpoints() {
        let mut d = Divider {
            p1: Offset::new(0.0, 0.0),
            p2: Offset::new(0.0, 10.0),
            ..Default::default()
        };
        d.translate(5.0, 1.0);
        assert_eq!(d.p1, Offset::new(5.0, 1.0));
        assert_eq!(d.p2, Offset::new(5.0, 11.0));
    }

    #[test]
    fn step_with_parts_reports_required_children() {
        let mut step = Step::default();
        assert!(step.required_children().is_none());
        step.parts.push(Part {
            id: 0,
            filename: "3001.dat".into(),
            color: 4,
            submodel: false,
        });
        assert_eq!(step.required_children(), Some("parts"));
    }
}
