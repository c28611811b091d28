//! # Callouts
//!
//! A callout is a bordered box of its own small steps, pinned to one edge of
//! its parent step. Its steps flow in rows (horizontal callouts) or columns
//! (vertical callouts) and wrap when the next step would overflow:
//! - side callouts wrap rows at 75% of the available width
//! - top/bottom callouts wrap rows at the full width
//! - vertical callouts wrap columns at the full height on a side, half
//!   otherwise
//!
//! After placement, steps in the same column (or row) are aligned to the
//! furthest one so the grid edges line up.

use log::trace;

use crate::error::StoreError;
use crate::model::{
    Callout, CalloutArrow, Csi, Direction, Edge, Item, ItemId, ItemKind, ItemRef, Offset,
    Orientation, Rect, Size, Step,
};
use crate::provider::Measure;
use crate::store::Document;
use crate::template::Template;

use super::{ensure_points, place_point, LayoutEngine, ARROW_HEAD};

/// Side length of an empty callout step, before the step margin is taken off.
const EMPTY_STEP: f64 = 50.0;
/// Minimum spare height before the arrow base tracks the last step.
const ARROW_BASE_SLACK: f64 = 10.0;

impl LayoutEngine<'_> {
    /// Lay out a callout against its edge of `area`. Returns its box and
    /// position, or `None` for a stale callout.
    pub(crate) fn callout(
        &self,
        doc: &mut Document,
        t: &Template,
        callout_id: ItemId,
        area: Rect,
    ) -> Result<Option<(Rect, Edge)>, StoreError> {
        let Some(c) = doc.get::<Callout>(callout_id).cloned() else {
            return Ok(None);
        };
        let border = t.callout.border.width;
        let margin = t.margin(t.callout.inner_margin);
        let measured: Vec<(ItemId, Size)> = c
            .steps
            .iter()
            .map(|&s| (s, self.measure_callout_step(doc, t, s)))
            .collect();
        let side = c.position.is_side();

        let mut lines: Vec<Vec<ItemId>> = vec![Vec::new()];
        let mut inner = Size::default();
        match c.layout {
            Orientation::Horizontal => {
                let limit = if side { area.width * 0.75 } else { area.width };
                let tallest = measured.iter().map(|(_, s)| s.height).fold(0.0, f64::max);
                let mut cell = Rect::new(margin, margin, 0.0, tallest);
                inner.height = margin + tallest + margin;
                for (idx, &(step, size)) in measured.iter().enumerate() {
                    if idx > 0 && border + cell.x + size.width + margin + border > limit {
                        cell.x = margin;
                        cell.y += tallest + margin;
                        inner.height += tallest + margin;
                        lines.push(Vec::new());
                    }
                    cell.width = size.width;
                    self.step_with(doc, t, step, cell, Some(0.0))?;
                    if let Some(line) = lines.last_mut() {
                        line.push(step);
                    }
                    cell.x += cell.width + margin;
                    inner.width = inner.width.max(cell.x);
                }
            }
            Orientation::Vertical => {
                let limit = if side { area.height } else { area.height * 0.5 };
                let widest = measured.iter().map(|(_, s)| s.width).fold(0.0, f64::max);
                let mut cell = Rect::new(margin, margin, widest, 0.0);
                inner.width = margin + widest + margin;
                for (idx, &(step, size)) in measured.iter().enumerate() {
                    if idx > 0 && border + cell.y + size.height + margin + border > limit {
                        cell.y = margin;
                        cell.x += widest + margin;
                        inner.width += widest + margin;
                        lines.push(Vec::new());
                    }
                    cell.height = size.height;
                    self.step_with(doc, t, step, cell, Some(0.0))?;
                    if let Some(line) = lines.last_mut() {
                        line.push(step);
                    }
                    cell.y += cell.height + margin;
                    inner.height = inner.height.max(cell.y);
                }
            }
        }
        align_lines(doc, &lines, c.layout);

        let width = border + inner.width + border;
        let height = border + inner.height + border;
        let (x, y) = match c.position {
            Edge::Left => (area.x, area.y + (area.height - height) / 2.0),
            Edge::Right => (area.right() - width, area.y + (area.height - height) / 2.0),
            Edge::Top => (area.x + (area.width - width) / 2.0, area.y),
            Edge::Bottom => (area.x + (area.width - width) / 2.0, area.bottom() - height),
        };
        let b = Rect::new(x, y, width, height);
        if let Some(c) = doc.get_mut::<Callout>(callout_id) {
            c.bounds = Some(b);
            c.inner_offset = Offset::new(border, border);
            c.border_offset = Offset::ZERO;
        }
        trace!("callout#{callout_id} at {b:?}, {} lines", lines.len());
        Ok(Some((b, c.position)))
    }

    /// The size a callout step wants: number label and content image side
    /// by side, plus the rotate icon.
    fn measure_callout_step(&self, doc: &Document, t: &Template, step_id: ItemId) -> Size {
        let Some(step) = doc.get::<Step>(step_id) else {
            return Size::default();
        };
        let margin = t.margin(t.step.inner_margin);
        let gap = |current: f64| if current > 0.0 { margin } else { 0.0 };
        let mut size = Size::default();

        if step.number_label.is_some() {
            let text = step.number.map(|n| n.to_string()).unwrap_or_default();
            let l = self.label(&t.callout.step.number_label.font, &text);
            size.width += l.width;
            size.height += l.height;
        }
        if let Some(csi) = step.csi.and_then(|c| doc.get::<Csi>(c)) {
            let request = Measure::StepImage {
                step: step_id,
                model: step.model.filename.clone(),
                scale: csi.scale.unwrap_or(t.step.csi.scale),
                rotation: csi.rotation().to_vec(),
                fresh: csi.is_dirty,
            };
            if let Some(s) = self.measure(request) {
                size.width += s.width + gap(size.width);
                size.height += s.height + gap(size.height);
            }
        }
        if step.rotate_icon.is_some() {
            let icon = t.rotate_icon.size;
            size.width += icon + gap(size.width);
            size.height += icon;
        }
        if step.children().len() == 1 {
            size.width += margin;
            size.height += margin;
        }
        if size.width < 1.0 && size.height < 1.0 {
            let side = EMPTY_STEP - margin;
            size = Size::new(side, side);
        }
        size
    }
}

/// Line up steps that share a column (horizontal flow) or row (vertical
/// flow) on the furthest one.
fn align_lines(doc: &mut Document, lines: &[Vec<ItemId>], flow: Orientation) {
    let longest = lines.iter().map(Vec::len).max().unwrap_or(0);
    for j in 0..longest {
        let members: Vec<ItemId> = lines.iter().filter_map(|l| l.get(j).copied()).collect();
        let target = members
            .iter()
            .filter_map(|&s| doc.get::<Step>(s).and_then(|s| s.bounds))
            .map(|b| match flow {
                Orientation::Horizontal => b.x,
                Orientation::Vertical => b.y,
            })
            .fold(f64::NEG_INFINITY, f64::max);
        for s in members {
            if let Some(b) = doc.get_mut::<Step>(s).and_then(|s| s.bounds.as_mut()) {
                match flow {
                    Orientation::Horizontal => b.x = target,
                    Orientation::Vertical => b.y = target,
                }
            }
        }
    }
}

/// Point the callout's arrow from the callout at its parent step's content
/// image. Needs no measurements, so it also runs after a manual move.
///
/// Exactly one two-point arrow survives; extra arrows and middle points
/// are removed and a missing arrow is created.
pub fn arrange_arrow(doc: &mut Document, callout_id: ItemId) -> Result<(), StoreError> {
    let Some(c) = doc.get::<Callout>(callout_id).cloned() else {
        return Ok(());
    };
    let Some(cb) = c.bounds else {
        return Ok(());
    };
    let step_margin = doc.template.margin(doc.template.callout.step.inner_margin);

    let arrow = match c.callout_arrows.split_first() {
        Some((&first, rest)) => {
            for &extra in rest {
                doc.delete_cascade(ItemRef::new(ItemKind::CalloutArrow, extra))?;
            }
            first
        }
        None => doc.add_callout_arrow(callout_id)?,
    };
    let points = ensure_points(doc, ItemRef::new(ItemKind::CalloutArrow, arrow), 2)?;
    if let Some(a) = doc.get_mut::<CalloutArrow>(arrow) {
        a.direction = match c.position {
            Edge::Left => Direction::Right,
            Edge::Top => Direction::Down,
            Edge::Right => Direction::Left,
            Edge::Bottom => Direction::Up,
        };
    }

    let last = if c.steps.len() > 1 {
        c.steps
            .last()
            .and_then(|&s| doc.get::<Step>(s))
            .and_then(|s| s.bounds)
            .filter(|l| cb.height - step_margin - l.height - step_margin >= ARROW_BASE_SLACK)
    } else {
        None
    };
    let bo = c.border_offset;
    let base = match c.position {
        Edge::Left | Edge::Right => Offset::new(
            if c.position == Edge::Left { bo.x + cb.width } else { 0.0 },
            last.map_or(bo.y + cb.height / 2.0, |l| l.y + l.height / 2.0),
        ),
        Edge::Top | Edge::Bottom => Offset::new(
            last.map_or(bo.x + cb.width / 2.0, |l| l.x + l.width / 2.0),
            if c.position == Edge::Top { bo.y + cb.height } else { 0.0 },
        ),
    };
    place_point(doc, points[0], base, Some(ItemRef::callout(callout_id)));

    let target = c
        .parent
        .filter(|p| p.kind == ItemKind::Step)
        .and_then(|p| doc.get::<Step>(p.id))
        .and_then(|s| s.csi)
        .and_then(|csi| doc.get::<Csi>(csi))
        .and_then(|csi| csi.bounds.map(|b| (csi.id, b)));
    let Some((csi, content)) = target else {
        return Ok(());
    };
    let tip = match c.position {
        Edge::Left => Offset::new(-ARROW_HEAD, content.height / 2.0),
        Edge::Right => Offset::new(content.width + ARROW_HEAD, content.height / 2.0),
        Edge::Top => Offset::new(content.width / 2.0, -ARROW_HEAD),
        Edge::Bottom => Offset::new(content.width / 2.0, content.height + ARROW_HEAD),
    };
    if let Some(&last_point) = points.last() {
        place_point(doc, last_point, tip, Some(ItemRef::csi(csi)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageKind, Point, Size};
    use crate::provider::StaticSizes;

    fn sizes() -> StaticSizes {
        StaticSizes {
            default_step_image: Some(Size::new(100.0, 80.0)),
            ..Default::default()
        }
    }

    fn step_with_callout(position: Edge) -> (Document, ItemId, ItemId) {
        let mut doc = Document::default();
        let page = doc.add_page(PageKind::Page, Some(1), None, None).unwrap();
        let step = doc.add_step(ItemRef::page(page), Some(1), None).unwrap();
        let callout = doc.add_callout(step, Some(position)).unwrap();
        (doc, step, callout)
    }

    #[test]
    fn left_callout_hugs_left_edge_and_centres_vertically() {
        let (mut doc, _, callout) = step_with_callout(Edge::Left);
        let sizes = sizes();
        let engine = LayoutEngine::new(&sizes);
        let t = doc.template.clone();
        let area = Rect::new(10.0, 20.0, 600.0, 400.0);
        let (b, edge) = engine.callout(&mut doc, &t, callout, area).unwrap().unwrap();
        assert_eq!(edge, Edge::Left);
        assert_eq!(b.x, 10.0);
        assert!((b.y - (20.0 + (400.0 - b.height) / 2.0)).abs() < 0.001);
    }

    #[test]
    fn bottom_callout_sits_on_bottom_edge() {
        let (mut doc, _, callout) = step_with_callout(Edge::Bottom);
        let sizes = sizes();
        let engine = LayoutEngine::new(&sizes);
        let t = doc.template.clone();
        let area = Rect::new(0.0, 0.0, 600.0, 400.0);
        let (b, _) = engine.callout(&mut doc, &t, callout, area).unwrap().unwrap();
        assert!((b.bottom() - 400.0).abs() < 0.001);
        assert!((b.x - (600.0 - b.width) / 2.0).abs() < 0.001);
    }

    #[test]
    fn horizontal_callout_wraps_rows() {
        let (mut doc, _, callout) = step_with_callout(Edge::Left);
        doc.add_callout_step(callout, None).unwrap();
        doc.add_callout_step(callout, None).unwrap();
        let sizes = sizes();
        let engine = LayoutEngine::new(&sizes);
        let t = doc.template.clone();
        // room for two steps per row on a side edge
        let area = Rect::new(0.0, 0.0, 500.0, 600.0);
        engine.callout(&mut doc, &t, callout, area).unwrap();
        let steps = doc.get::<Callout>(callout).unwrap().steps.clone();
        let b: Vec<Rect> = steps
            .iter()
            .map(|&s| doc.get::<Step>(s).unwrap().bounds.unwrap())
            .collect();
        assert_eq!(b[0].y, b[1].y);
        assert!(b[2].y > b[0].y);
        assert_eq!(b[2].x, b[0].x);
    }

    #[test]
    fn empty_step_gets_minimum_size() {
        let mut doc = Document::default();
        let page = doc.add_page(PageKind::Page, None, None, None).unwrap();
        let step = doc.add_step(ItemRef::page(page), None, None).unwrap();
        let callout = doc.add_callout(step, None).unwrap();
        let inner = doc.get::<Callout>(callout).unwrap().steps[0];
        let csi = doc.get::<Step>(inner).unwrap().csi.unwrap();
        doc.delete(ItemRef::csi(csi)).unwrap();
        let none = |_: &Measure| -> Option<Size> { None };
        let engine = LayoutEngine::new(&none);
        let t = doc.template.clone();
        let margin = t.margin(t.step.inner_margin);
        let size = engine.measure_callout_step(&doc, &t, inner);
        assert!((size.width - (50.0 - margin)).abs() < 0.001);
        assert_eq!(size.width, size.height);
    }

    #[test]
    fn arrow_runs_from_callout_to_content_image() {
        let (mut doc, step, callout) = step_with_callout(Edge::Left);
        let extra = doc.add_callout_arrow(callout).unwrap();
        let csi = doc.get::<Step>(step).unwrap().csi.unwrap();
        doc.get_mut::<Csi>(csi).unwrap().bounds = Some(Rect::new(200.0, 100.0, 100.0, 80.0));
        doc.get_mut::<Callout>(callout).unwrap().bounds = Some(Rect::new(0.0, 100.0, 120.0, 90.0));

        arrange_arrow(&mut doc, callout).unwrap();

        let c = doc.get::<Callout>(callout).unwrap();
        assert_eq!(c.callout_arrows.len(), 1);
        assert!(!doc.contains(ItemRef::new(ItemKind::CalloutArrow, extra)));
        let arrow = doc.get::<CalloutArrow>(c.callout_arrows[0]).unwrap();
        assert_eq!(arrow.direction, Direction::Right);
        let base = doc.get::<Point>(arrow.points[0]).unwrap();
        assert_eq!((base.x, base.y), (120.0, 45.0));
        assert_eq!(base.relative_to, Some(ItemRef::callout(callout)));
        let tip = doc.get::<Point>(arrow.points[1]).unwrap();
        assert_eq!((tip.x, tip.y), (-30.0, 40.0));
        assert_eq!(tip.relative_to, Some(ItemRef::csi(csi)));
    }
}
