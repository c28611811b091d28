//! Refit container boxes after their children were moved by hand.
//!
//! Parts lists, callouts and single-child steps report the union of their
//! children's boxes plus border and margin. The refit only changes the
//! container's reported box (and its border offset); it never reruns layout.

use log::warn;

use crate::model::geom::bbox;
use crate::model::{
    Callout, Item, ItemId, ItemKind, ItemRef, Offset, Pli, PliItem, QuantityLabel, Rect, Step,
};
use crate::store::Document;

use super::callout;

/// Called after an item under `parent` was repositioned.
pub fn adjust_after_move(doc: &mut Document, parent: ItemRef) {
    match parent.kind {
        ItemKind::Pli => fit_pli(doc, parent.id),
        ItemKind::PliItem => {
            if let Some(pli) = doc.parent_of(parent).filter(|p| p.kind == ItemKind::Pli) {
                fit_pli(doc, pli.id);
            }
        }
        ItemKind::Callout => fit_callout(doc, parent.id),
        ItemKind::Step => {
            let callout = doc
                .parent_of(parent)
                .filter(|p| p.kind == ItemKind::Callout);
            if let Some(callout) = callout {
                fit_step(doc, parent.id);
                fit_callout(doc, callout.id);
            }
        }
        _ => {}
    }
}

/// Grow or shrink `bounds` around `content` (in the same space), keeping
/// the container's origin and recording where the border now starts.
fn fit(bounds: &mut Rect, border_offset: &mut Offset, content: Rect, border: f64, margin: f64) {
    border_offset.x = content.x - bounds.x - margin;
    border_offset.y = content.y - bounds.y - margin;
    bounds.width = border + margin + content.width + margin + border;
    bounds.height = border + margin + content.height + margin + border;
}

pub fn fit_pli(doc: &mut Document, pli_id: ItemId) {
    let Some(pli) = doc.get::<Pli>(pli_id) else {
        return;
    };
    let Some(mut b) = pli.bounds else {
        return;
    };
    let mut boxes = Vec::new();
    for &id in &pli.pli_items {
        let Some(item) = doc.get::<PliItem>(id) else {
            continue;
        };
        let Some(mut ib) = item.bounds else {
            continue;
        };
        ib.translate(b.x, b.y);
        boxes.push(ib);
        if let Some(mut lb) = item
            .quantity_label
            .and_then(|l| doc.get::<QuantityLabel>(l))
            .and_then(|l| l.bounds)
        {
            lb.translate(ib.x, ib.y);
            boxes.push(lb);
        }
    }
    let Some(content) = bbox(boxes) else {
        return;
    };
    let border = doc.template.pli.border.width;
    let margin = doc.template.margin(doc.template.pli.inner_margin);
    let mut offset = pli.border_offset;
    fit(&mut b, &mut offset, content, border, margin);
    if let Some(p) = doc.get_mut::<Pli>(pli_id) {
        p.bounds = Some(b);
        p.border_offset = offset;
    }
}

/// Refit a callout around its steps, then re-aim its arrow.
pub fn fit_callout(doc: &mut Document, callout_id: ItemId) {
    let Some(c) = doc.get::<Callout>(callout_id) else {
        return;
    };
    let Some(mut b) = c.bounds else {
        return;
    };
    let boxes = c.steps.iter().filter_map(|&s| {
        doc.get::<Step>(s).and_then(|s| s.bounds).map(|mut sb| {
            sb.translate(b.x, b.y);
            sb
        })
    });
    let Some(content) = bbox(boxes.collect::<Vec<_>>()) else {
        return;
    };
    let border = doc.template.callout.border.width;
    let margin = doc.template.margin(doc.template.callout.inner_margin);
    let mut offset = c.border_offset;
    fit(&mut b, &mut offset, content, border, margin);
    if let Some(c) = doc.get_mut::<Callout>(callout_id) {
        c.bounds = Some(b);
        c.border_offset = offset;
    }
    if let Err(e) = callout::arrange_arrow(doc, callout_id) {
        warn!("callout#{callout_id} arrow not updated: {e}");
    }
}

/// Shrink-wrap a step that holds exactly one positioned child, padding it
/// by half the step margin on every side. The child keeps its page
/// position.
pub fn fit_step(doc: &mut Document, step_id: ItemId) {
    let Some(step) = doc.get::<Step>(step_id) else {
        return;
    };
    let Some(own) = step.bounds else {
        return;
    };
    let positioned: Vec<(ItemRef, Rect)> = step
        .children()
        .into_iter()
        .filter_map(|c| doc.item(c).and_then(|i| i.bounds()).map(|b| (c, b)))
        .collect();
    let [(child, cb)] = positioned.as_slice() else {
        return;
    };
    let fraction = match step.parent {
        Some(p) if p.kind == ItemKind::Callout => doc.template.callout.step.inner_margin,
        _ => doc.template.step.inner_margin,
    };
    let pad = doc.template.margin(fraction) / 2.0;
    let fitted = Rect::new(
        own.x + cb.x - pad,
        own.y + cb.y - pad,
        cb.width + pad * 2.0,
        cb.height + pad * 2.0,
    );
    let (child, cb) = (*child, *cb);
    if let Some(s) = doc.get_mut::<Step>(step_id) {
        s.bounds = Some(fitted);
    }
    if let Some(Some(b)) = doc.item_mut(child).and_then(|i| i.bounds_mut()) {
        *b = Rect::new(pad, pad, cb.width, cb.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageKind, Size};

    #[test]
    fn moving_an_item_refits_its_pli() {
        let mut doc = Document::default();
        let pli = doc.add(Pli::default(), None, None, None).unwrap();
        let item = doc.add_pli_item(ItemRef::pli(pli), "3001.dat", 4, 1, false).unwrap();
        doc.get_mut::<Pli>(pli).unwrap().bounds = Some(Rect::new(100.0, 100.0, 80.0, 60.0));
        doc.get_mut::<PliItem>(item).unwrap().bounds = Some(Rect::new(10.0, 10.0, 40.0, 30.0));
        let label = doc.get::<PliItem>(item).unwrap().quantity_label.unwrap();
        doc.get_mut::<QuantityLabel>(label).unwrap().bounds = Some(Rect::new(-5.0, 30.0, 10.0, 10.0));

        doc.reposition(&[ItemRef::pli_item(item)], 20.0, 0.0);

        let margin = doc.template.margin(doc.template.pli.inner_margin);
        let p = doc.get::<Pli>(pli).unwrap();
        let b = p.bounds.unwrap();
        // item now spans x 130..170, its label 125..135 and y 110..150
        assert_eq!((b.x, b.y), (100.0, 100.0));
        assert!((b.width - (2.0 + margin + 45.0 + margin + 2.0)).abs() < 0.001);
        assert!((b.height - (2.0 + margin + 40.0 + margin + 2.0)).abs() < 0.001);
        assert!((p.border_offset.x - (25.0 - margin)).abs() < 0.001);
    }

    #[test]
    fn single_child_step_wraps_its_child() {
        let mut doc = Document::default();
        let page = doc.add_page(PageKind::Page, None, None, None).unwrap();
        let step = doc.add_step(ItemRef::page(page), None, None).unwrap();
        let callout = doc.add_callout(step, None).unwrap();
        let inner = doc.get::<Callout>(callout).unwrap().steps[0];
        let csi = doc.get::<Step>(inner).unwrap().csi.unwrap();
        doc.get_mut::<Step>(inner).unwrap().bounds = Some(Rect::new(10.0, 10.0, 200.0, 200.0));
        doc.get_mut::<crate::model::Csi>(csi).unwrap().bounds =
            Some(Rect::new(50.0, 60.0, 40.0, 30.0));

        fit_step(&mut doc, inner);

        let pad = doc.template.margin(doc.template.callout.step.inner_margin) / 2.0;
        let s = doc.get::<Step>(inner).unwrap().bounds.unwrap();
        assert!((s.x - (60.0 - pad)).abs() < 0.001);
        assert!((s.width - (40.0 + pad * 2.0)).abs() < 0.001);
        let c = doc.get::<crate::model::Csi>(csi).unwrap().bounds.unwrap();
        assert_eq!(Size::new(c.width, c.height), Size::new(40.0, 30.0));
        assert!((s.x + c.x - 60.0).abs() < 0.001);
    }

    #[test]
    fn moving_a_callout_arrow_moves_its_points() {
        let mut doc = Document::default();
        let page = doc.add_page(PageKind::Page, None, None, None).unwrap();
        let step = doc.add_step(ItemRef::page(page), None, None).unwrap();
        let callout = doc.add_callout(step, None).unwrap();
        let inner = doc.get::<Callout>(callout).unwrap().steps[0];
        doc.get_mut::<Callout>(callout).unwrap().bounds = Some(Rect::new(0.0, 0.0, 120.0, 100.0));
        doc.get_mut::<Step>(inner).unwrap().bounds = Some(Rect::new(10.0, 10.0, 100.0, 80.0));
        callout::arrange_arrow(&mut doc, callout).unwrap();

        let arrow = ItemRef::new(ItemKind::CalloutArrow, doc.get::<Callout>(callout).unwrap().callout_arrows[0]);
        let points = doc.children_of_kind(arrow, ItemKind::Point);
        let before: Vec<(f64, f64)> = points
            .iter()
            .map(|&p| doc.get::<crate::model::Point>(p).map(|p| (p.x, p.y)).unwrap())
            .collect();
        let callout_box = doc.get::<Callout>(callout).unwrap().bounds;

        doc.reposition(&[arrow], 25.0, 15.0);

        for (&p, (x, y)) in points.iter().zip(before) {
            let moved = doc.get::<crate::model::Point>(p).unwrap();
            assert!((moved.x - (x + 25.0)).abs() < 0.001);
            assert!((moved.y - (y + 15.0)).abs() < 0.001);
        }
        assert_eq!(doc.get::<Callout>(callout).unwrap().bounds, callout_box);
    }
}
