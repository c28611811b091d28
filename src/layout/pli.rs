//! Parts-list layout: items packed left to right, each with its quantity
//! label hanging below its bottom-left corner.

use log::trace;

use crate::model::{ItemId, Offset, Pli, PliItem, QuantityLabel, Rect};
use crate::provider::Measure;
use crate::store::Document;
use crate::template::Template;

use super::LayoutEngine;

/// How far a quantity label is pulled left of, and up into, its item.
pub(crate) const QUANTITY_OFFSET: f64 = 5.0;

impl LayoutEngine<'_> {
    /// Size the parts list and its items. The box is placed at the origin;
    /// the caller positions it.
    pub(crate) fn pli(&self, doc: &mut Document, t: &Template, pli_id: ItemId) -> Rect {
        let Some(pli) = doc.get::<Pli>(pli_id) else {
            return Rect::ZERO;
        };
        let mut shown = Vec::new();
        for &id in &pli.pli_items {
            match doc.get::<PliItem>(id) {
                Some(item) if item.submodel && !t.pli.include_submodels => {}
                Some(_) => shown.push(id),
                None => {}
            }
        }
        let hidden: Vec<ItemId> = pli
            .pli_items
            .iter()
            .copied()
            .filter(|id| !shown.contains(id))
            .collect();
        for id in hidden {
            if let Some(item) = doc.get_mut::<PliItem>(id) {
                item.bounds = None;
            }
        }

        let border = t.pli.border.width;
        if let Some(p) = doc.get_mut::<Pli>(pli_id) {
            p.inner_offset = Offset::new(border, border);
            p.border_offset = Offset::ZERO;
        }
        if shown.is_empty() {
            if let Some(p) = doc.get_mut::<Pli>(pli_id) {
                p.bounds = Some(Rect::ZERO);
            }
            return Rect::ZERO;
        }

        let margin = t.margin(t.pli.inner_margin);
        let mut left = margin + QUANTITY_OFFSET;
        let mut tallest: f64 = 0.0;
        for id in shown {
            let Some(mut b) = self.pli_item(doc, t, id) else {
                continue;
            };
            b.x = left;
            b.y = margin;
            let label = doc.get::<PliItem>(id).and_then(|i| i.quantity_label);
            let label_height = label
                .and_then(|l| doc.get::<QuantityLabel>(l))
                .and_then(|l| l.bounds)
                .map_or(0.0, |l| l.height);
            if let Some(item) = doc.get_mut::<PliItem>(id) {
                item.bounds = Some(b);
            }
            left += b.width + margin;
            tallest = tallest.max(b.height - QUANTITY_OFFSET + label_height);
        }

        let b = Rect::new(
            0.0,
            0.0,
            border + left + border,
            border + margin + tallest + margin + border,
        );
        if let Some(p) = doc.get_mut::<Pli>(pli_id) {
            p.bounds = Some(b);
        }
        trace!("pli#{pli_id} is {}x{}", b.width, b.height);
        b
    }

    /// Size one parts-list item and its quantity label. The item is placed
    /// at the origin; `None` when the part image has no size.
    pub(crate) fn pli_item(&self, doc: &mut Document, t: &Template, item_id: ItemId) -> Option<Rect> {
        let item = doc.get::<PliItem>(item_id)?;
        let request = Measure::PartImage {
            filename: item.filename.clone(),
            color: item.color,
            scale: t.pli_item.scale,
            rotation: Vec::new(),
        };
        let label = item.quantity_label;
        let text = format!("x{}", item.quantity);

        let Some(size) = self.measure(request) else {
            if let Some(i) = doc.get_mut::<PliItem>(item_id) {
                i.bounds = None;
            }
            return None;
        };
        let b = Rect::new(0.0, 0.0, size.width, size.height);
        if let Some(i) = doc.get_mut::<PliItem>(item_id) {
            i.bounds = Some(b);
        }
        if let Some(label) = label {
            let l = self.label(&t.pli_item.quantity_label.font, &text);
            if let Some(q) = doc.get_mut::<QuantityLabel>(label) {
                q.bounds = Some(Rect::new(-QUANTITY_OFFSET, size.height, l.width, l.height));
            }
        }
        Some(b)
    }
}

#[cfg(test)]
mod tests {
    use crate::layout::LayoutEngine;
    use crate::model::{ItemRef, Pli, PliItem, QuantityLabel, Rect, Size};
    use crate::provider::{Measure, SizeProvider, StaticSizes};
    use crate::store::Document;

    fn sizes() -> StaticSizes {
        let mut s = StaticSizes::default();
        s.part_images.insert("3001.dat".into(), Size::new(40.0, 30.0));
        s.part_images.insert("3003.dat".into(), Size::new(20.0, 20.0));
        s
    }

    #[test]
    fn empty_pli_is_zero() {
        let mut doc = Document::default();
        let pli = doc.add(Pli::default(), None, None, None).unwrap();
        let sizes = sizes();
        let engine = LayoutEngine::new(&sizes);
        let t = doc.template.clone();
        assert_eq!(engine.pli(&mut doc, &t, pli), Rect::ZERO);
        assert_eq!(doc.get::<Pli>(pli).unwrap().bounds, Some(Rect::ZERO));
    }

    #[test]
    fn items_pack_left_to_right() {
        let mut doc = Document::default();
        let pli = doc.add(Pli::default(), None, None, None).unwrap();
        let a = doc.add_pli_item(ItemRef::pli(pli), "3001.dat", 4, 2, false).unwrap();
        let b = doc.add_pli_item(ItemRef::pli(pli), "3003.dat", 1, 1, false).unwrap();
        let sizes = sizes();
        let engine = LayoutEngine::new(&sizes);
        let t = doc.template.clone();
        let margin = t.margin(t.pli.inner_margin);

        let bounds = engine.pli(&mut doc, &t, pli);
        let first = doc.get::<PliItem>(a).unwrap().bounds.unwrap();
        let second = doc.get::<PliItem>(b).unwrap().bounds.unwrap();
        assert!((first.x - (margin + 5.0)).abs() < 0.001);
        assert!((second.x - (first.x + 40.0 + margin)).abs() < 0.001);
        assert!((first.y - margin).abs() < 0.001);

        let label = doc.get::<PliItem>(a).unwrap().quantity_label.unwrap();
        let label_box = doc.get::<QuantityLabel>(label).unwrap().bounds.unwrap();
        assert_eq!((label_box.x, label_box.y), (-5.0, 30.0));

        let label_h = sizes
            .measure(&Measure::label("bold 10pt Helvetica", "x2"))
            .unwrap()
            .height;
        let expected_h = 2.0 + margin + (30.0 - 5.0 + label_h) + margin + 2.0;
        assert!((bounds.height - expected_h).abs() < 0.001);
        let expected_w = 2.0 + (margin + 5.0 + 40.0 + margin + 20.0 + margin) + 2.0;
        assert!((bounds.width - expected_w).abs() < 0.001);
    }

    #[test]
    fn submodel_items_hidden_unless_included() {
        let mut doc = Document::default();
        let pli = doc.add(Pli::default(), None, None, None).unwrap();
        let sub = doc.add_pli_item(ItemRef::pli(pli), "sub.ldr", 0, 1, true).unwrap();
        let sizes = sizes();
        let engine = LayoutEngine::new(&sizes);
        let t = doc.template.clone();
        assert_eq!(engine.pli(&mut doc, &t, pli), Rect::ZERO);
        assert_eq!(doc.get::<PliItem>(sub).unwrap().bounds, None);

        let mut t = t;
        t.pli.include_submodels = true;
        let mut sizes = sizes;
        sizes.part_images.insert("sub.ldr".into(), Size::new(50.0, 50.0));
        let engine = LayoutEngine::new(&sizes);
        assert!(engine.pli(&mut doc, &t, pli).width > 50.0);
    }
}
