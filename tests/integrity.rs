//! Property tests for the entity store's link integrity.
//!
//! Random sequences of edits (and the occasional layout pass) must leave
//! every parent/child link two-way, every child listed exactly once and
//! every child reference resolvable.

use proptest::prelude::*;

use stepbook::model::*;
use stepbook::provider::StaticSizes;
use stepbook::{Document, LayoutEngine};

#[derive(Debug, Clone)]
enum Op {
    AddPage,
    AddStep(usize),
    AddPart(usize, u32, bool),
    RemovePart(usize, u32),
    AddCallout(usize),
    AddCalloutStep(usize),
    AddSubStep(usize),
    ToggleRotateIcon(usize, bool),
    DeleteStep(usize, bool),
    DeletePage(usize, bool),
    MoveStep(usize, usize),
    Layout,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::AddPage),
        any::<usize>().prop_map(Op::AddStep),
        (any::<usize>(), 1u32..6, any::<bool>()).prop_map(|(s, p, sub)| Op::AddPart(s, p, sub)),
        (any::<usize>(), 1u32..6).prop_map(|(s, p)| Op::RemovePart(s, p)),
        any::<usize>().prop_map(Op::AddCallout),
        any::<usize>().prop_map(Op::AddCalloutStep),
        any::<usize>().prop_map(Op::AddSubStep),
        (any::<usize>(), any::<bool>()).prop_map(|(s, on)| Op::ToggleRotateIcon(s, on)),
        (any::<usize>(), any::<bool>()).prop_map(|(s, c)| Op::DeleteStep(s, c)),
        (any::<usize>(), any::<bool>()).prop_map(|(p, c)| Op::DeletePage(p, c)),
        (any::<usize>(), any::<usize>()).prop_map(|(s, p)| Op::MoveStep(s, p)),
        Just(Op::Layout),
    ]
}

fn pick(ids: &[ItemId], i: usize) -> Option<ItemId> {
    (!ids.is_empty()).then(|| ids[i % ids.len()])
}

/// Apply one edit. Refused edits are fine; they must simply leave the
/// document consistent.
fn apply(doc: &mut Document, sizes: &StaticSizes, op: Op) {
    let steps = doc.steps.ids();
    let pages = doc.pages.ids();
    let callouts = doc.callouts.ids();
    match op {
        Op::AddPage => {
            let _ = doc.add_page(PageKind::Page, None, None, None);
        }
        Op::AddStep(p) => {
            if let Some(page) = pick(&pages, p) {
                let _ = doc.add_step(ItemRef::page(page), None, None);
            }
        }
        Op::AddPart(s, id, submodel) => {
            if let Some(step) = pick(&steps, s) {
                let part = Part {
                    id,
                    filename: format!("{id}.dat"),
                    color: 4,
                    submodel,
                };
                let _ = doc.add_part(step, part);
            }
        }
        Op::RemovePart(s, id) => {
            if let Some(step) = pick(&steps, s) {
                doc.remove_part(step, id);
            }
        }
        Op::AddCallout(s) => {
            if let Some(step) = pick(&steps, s) {
                let _ = doc.add_callout(step, None);
            }
        }
        Op::AddCalloutStep(c) => {
            if let Some(callout) = pick(&callouts, c) {
                let _ = doc.add_callout_step(callout, None);
            }
        }
        Op::AddSubStep(s) => {
            if let Some(step) = pick(&steps, s) {
                let _ = doc.add_sub_step(step);
            }
        }
        Op::ToggleRotateIcon(s, on) => {
            if let Some(step) = pick(&steps, s) {
                let _ = doc.toggle_rotate_icon(step, on);
            }
        }
        Op::DeleteStep(s, cascade) => {
            if let Some(step) = pick(&steps, s) {
                let _ = doc.delete_step(step, cascade);
            }
        }
        Op::DeletePage(p, cascade) => {
            if let Some(page) = pick(&pages, p) {
                let _ = doc.delete_page(page, cascade);
            }
        }
        Op::MoveStep(s, p) => {
            if let (Some(step), Some(page)) = (pick(&steps, s), pick(&pages, p)) {
                let _ = doc.move_step_to_page(step, page, None);
            }
        }
        Op::Layout => {
            let _ = LayoutEngine::new(sizes).layout_pending(doc);
        }
    }
}

fn assert_linked(doc: &Document) {
    for r in doc.all_refs() {
        let item = doc.item(r).unwrap();
        if let Some(parent) = item.parent() {
            let p = doc
                .item(parent)
                .unwrap_or_else(|| panic!("{r:?} has a dangling parent {parent:?}"));
            let listed = p.children().iter().filter(|c| **c == r).count();
            assert_eq!(listed, 1, "{parent:?} lists its child {r:?} {listed} times");
        }
        let children = item.children();
        for (i, child) in children.iter().enumerate() {
            assert!(
                !children[..i].contains(child),
                "{r:?} lists {child:?} more than once"
            );
        }
        for child in children {
            let c = doc
                .item(child)
                .unwrap_or_else(|| panic!("{r:?} lists a dangling child {child:?}"));
            assert_eq!(c.parent(), Some(r), "{child:?} points at another parent");
        }
    }
}

proptest! {
    #[test]
    fn edits_keep_links_two_way(ops in prop::collection::vec(op(), 1..40)) {
        let sizes = StaticSizes {
            default_step_image: Some(Size::new(100.0, 80.0)),
            default_part_image: Some(Size::new(40.0, 30.0)),
            ..Default::default()
        };
        let mut doc = Document::default();
        for op in ops {
            apply(&mut doc, &sizes, op);
            assert_linked(&doc);
        }
    }

    #[test]
    fn ids_are_never_reused(adds in 1usize..10, deletes in 0usize..10) {
        let mut doc = Document::default();
        let page = doc.add_page(PageKind::Page, None, None, None).unwrap();
        let mut seen = Vec::new();
        for _ in 0..adds {
            seen.push(doc.add_step(ItemRef::page(page), None, None).unwrap());
        }
        for &step in seen.iter().take(deletes) {
            doc.delete_step(step, true).unwrap();
        }
        let fresh = doc.add_step(ItemRef::page(page), None, None).unwrap();
        prop_assert!(!seen.contains(&fresh));
    }
}
