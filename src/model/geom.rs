//! Plain geometry values shared by the document model and the layout engine.
//!
//! Every visible item stores its box as `Option<Rect>`: either the whole box
//! is known (layout has run) or none of it is. Coordinates are relative to
//! the item's parent unless stated otherwise.

use serde::{Deserialize, Serialize};

/// A 2D position or displacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

impl Offset {
    pub const ZERO: Offset = Offset { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }
}

/// Pixel dimensions as reported by a size provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One side of a box. Also used for callout placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Edge {
    Top,
    Right,
    Bottom,
    #[default]
    Left,
}

impl Edge {
    pub fn is_side(self) -> bool {
        matches!(self, Edge::Left | Edge::Right)
    }
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn origin(&self) -> Offset {
        Offset::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Shrink the box by `inset` on every side.
    pub fn inset(&self, inset: f64) -> Rect {
        Rect::new(
            self.x + inset,
            self.y + inset,
            self.width - inset - inset,
            self.height - inset - inset,
        )
    }

    /// Grow the box by `pad` on every side.
    pub fn expand(&self, pad: f64) -> Rect {
        self.inset(-pad)
    }

    /// Move one edge of the box by `dt`.
    ///
    /// Moving `Top` or `Left` by a positive amount shrinks the box from that
    /// side; `Right` and `Bottom` shrink when `dt` is negative.
    pub fn move_edge(&mut self, edge: Edge, dt: f64) {
        match edge {
            Edge::Top => {
                self.y += dt;
                self.height -= dt;
            }
            Edge::Right => self.width += dt,
            Edge::Bottom => self.height += dt,
            Edge::Left => {
                self.x += dt;
                self.width -= dt;
            }
        }
    }

    /// True when the two boxes share interior area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Smallest box containing every given box. `None` for an empty input.
pub fn bbox<I>(boxes: I) -> Option<Rect>
where
    I: IntoIterator<Item = Rect>,
{
    let mut iter = boxes.into_iter();
    let first = iter.next()?;
    let (mut min_x, mut min_y) = (first.x, first.y);
    let (mut max_x, mut max_y) = (first.right(), first.bottom());
    for r in iter {
        min_x = min_x.min(r.x);
        min_y = min_y.min(r.y);
        max_x = max_x.max(r.right());
        max_y = max_y.max(r.bottom());
    }
    Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// Smallest box containing every given point.
pub fn bbox_points<I>(points: I) -> Option<Rect>
where
    I: IntoIterator<Item = Offset>,
{
    bbox(points.into_iter().map(|p| Rect::new(p.x, p.y, 0.0, 0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_top_edge_shrinks_from_above() {
        let mut r = Rect::new(0.0, 0.0, 100.0, 100.0);
        r.move_edge(Edge::Top, 30.0);
        assert_eq!(r, Rect::new(0.0, 30.0, 100.0, 70.0));
    }

    #[test]
    fn move_right_edge_with_negative_delta_shrinks() {
        let mut r = Rect::new(10.0, 0.0, 100.0, 100.0);
        r.move_edge(Edge::Right, -25.0);
        assert_eq!(r, Rect::new(10.0, 0.0, 75.0, 100.0));
    }

    #[test]
    fn bbox_of_disjoint_boxes() {
        let b = bbox([Rect::new(10.0, 10.0, 5.0, 5.0), Rect::new(-5.0, 20.0, 10.0, 10.0)]).unwrap();
        assert_eq!(b, Rect::new(-5.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn bbox_of_nothing_is_none() {
        assert!(bbox(Vec::new()).is_none());
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&Rect::new(9.0, 9.0, 5.0, 5.0)));
    }
}
