//! Lookup and navigation over the entity graph.
//!
//! Nothing here fails: a stale or unknown reference resolves to `None` and
//! callers treat that as "skip this item".

use crate::model::{Item, ItemId, ItemKind, ItemRef, Offset, Page, PageKind, PliItem, Point, Step};
use crate::store::Document;

impl Document {
    pub fn resolve(&self, r: ItemRef) -> Option<&dyn Item> {
        self.item(r)
    }

    /// The live parent of an item.
    pub fn parent_of(&self, r: ItemRef) -> Option<ItemRef> {
        let parent = self.item(r)?.parent()?;
        self.contains(parent).then_some(parent)
    }

    /// Climb parent links until a page is reached.
    pub fn page_for(&self, r: ItemRef) -> Option<ItemId> {
        let mut cur = r;
        loop {
            if cur.kind == ItemKind::Page {
                return self.contains(cur).then_some(cur.id);
            }
            cur = self.parent_of(cur)?;
        }
    }

    /// True when `candidate` is `ancestor` or sits somewhere below it.
    pub fn is_descendent(&self, candidate: ItemRef, ancestor: ItemRef) -> bool {
        let mut cur = Some(candidate);
        while let Some(r) = cur {
            if r == ancestor {
                return true;
            }
            cur = self.parent_of(r);
        }
        false
    }

    pub fn children(&self, r: ItemRef) -> Vec<ItemRef> {
        self.item(r).map(|i| i.children()).unwrap_or_default()
    }

    pub fn children_of_kind(&self, r: ItemRef, kind: ItemKind) -> Vec<ItemId> {
        self.children(r)
            .into_iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.id)
            .collect()
    }

    // ── Pages ───────────────────────────────────────────────────

    /// Pages in document order.
    pub fn page_list(&self) -> Vec<ItemId> {
        self.pages.ids()
    }

    pub fn pages_of_kind(&self, kind: PageKind) -> Vec<ItemId> {
        self.pages
            .iter()
            .filter(|p| p.subtype == kind)
            .map(|p| p.id)
            .collect()
    }

    pub fn basic_pages(&self) -> Vec<ItemId> {
        self.pages_of_kind(PageKind::Page)
    }

    pub fn inventory_pages(&self) -> Vec<ItemId> {
        self.pages_of_kind(PageKind::Inventory)
    }

    pub fn title_page(&self) -> Option<ItemId> {
        self.pages_of_kind(PageKind::Title).first().copied()
    }

    pub fn template_page(&self) -> Option<ItemId> {
        self.pages_of_kind(PageKind::Template).first().copied()
    }

    pub fn first_basic_page(&self) -> Option<ItemId> {
        self.basic_pages().first().copied()
    }

    pub fn last_basic_page(&self) -> Option<ItemId> {
        self.basic_pages().last().copied()
    }

    /// Number of pages, not counting the template page.
    pub fn page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.subtype != PageKind::Template)
            .count()
    }

    /// The page after the one holding `r`. Title, template and inventory
    /// pages are skipped unless `include_non_content` is set.
    pub fn next_page(&self, r: ItemRef, include_non_content: bool) -> Option<ItemId> {
        let page = self.page_for(r)?;
        let idx = self.pages.position(page)?;
        self.pages
            .iter()
            .skip(idx + 1)
            .find(|p| include_non_content || p.subtype.is_basic())
            .map(|p| p.id)
    }

    pub fn prev_page(&self, r: ItemRef, include_non_content: bool) -> Option<ItemId> {
        let page = self.page_for(r)?;
        let idx = self.pages.position(page)?;
        self.pages
            .iter()
            .take(idx)
            .rev()
            .find(|p| include_non_content || p.subtype.is_basic())
            .map(|p| p.id)
    }

    pub fn next_basic_page(&self, r: ItemRef) -> Option<ItemId> {
        self.next_page(r, false)
    }

    pub fn prev_basic_page(&self, r: ItemRef) -> Option<ItemId> {
        self.prev_page(r, false)
    }

    // ── Steps ───────────────────────────────────────────────────

    /// The step after `step` in its parent's step list.
    ///
    /// With `cross_page`, a page-level step at the end of its page continues
    /// with the first step of the next page of the same kind that has steps.
    pub fn next_step(&self, step: ItemId, cross_page: bool) -> Option<ItemId> {
        self.adjacent_step(step, cross_page, true)
    }

    pub fn prev_step(&self, step: ItemId, cross_page: bool) -> Option<ItemId> {
        self.adjacent_step(step, cross_page, false)
    }

    fn adjacent_step(&self, step: ItemId, cross_page: bool, forward: bool) -> Option<ItemId> {
        let parent = self.parent_of(ItemRef::step(step))?;
        let siblings = self.children_of_kind(parent, ItemKind::Step);
        let idx = siblings.iter().position(|&s| s == step)?;
        let neighbour = if forward {
            siblings.get(idx + 1)
        } else {
            idx.checked_sub(1).and_then(|i| siblings.get(i))
        };
        if let Some(&id) = neighbour {
            return Some(id);
        }
        if !cross_page || parent.kind != ItemKind::Page {
            return None;
        }
        let kind = self.get::<Page>(parent.id)?.subtype;
        let pages: Vec<&Page> = self.pages.iter().collect();
        let at = pages.iter().position(|p| p.id == parent.id)?;
        let candidates: Box<dyn Iterator<Item = &&Page>> = if forward {
            Box::new(pages.iter().skip(at + 1))
        } else {
            Box::new(pages.iter().take(at).rev())
        };
        let found = candidates
            .filter(|p| p.subtype == kind)
            .find_map(|p| if forward { p.steps.first() } else { p.steps.last() })
            .copied();
        found
    }

    /// True when any part the step places is a sub-assembly.
    pub fn step_has_submodel(&self, step: ItemId) -> bool {
        self.get::<Step>(step).is_some_and(|s| s.has_submodel())
    }

    /// A parts-list item under `parent` showing the given part.
    pub fn matching_pli_item(&self, parent: ItemRef, filename: &str, color: i32) -> Option<ItemId> {
        self.children_of_kind(parent, ItemKind::PliItem)
            .into_iter()
            .find(|&id| {
                self.get::<PliItem>(id)
                    .is_some_and(|i| i.filename == filename && i.color == color)
            })
    }

    // ── Coordinates ─────────────────────────────────────────────

    /// Page-space position of an item's top-left corner.
    ///
    /// Each ancestor contributes its own position plus its inner offset
    /// (border width).
    pub fn item_to_page(&self, r: ItemRef) -> Option<Offset> {
        let item = self.item(r)?;
        let mut pos = item.origin();
        let mut cur = item.parent();
        while let Some(p) = cur {
            let Some(parent) = self.item(p) else {
                break;
            };
            let origin = parent.origin();
            let inner = parent.inner_offset();
            pos.translate(origin.x + inner.x, origin.y + inner.y);
            cur = parent.parent();
        }
        Some(pos)
    }

    /// Page-space position of a point, honouring its `relative_to` frame.
    pub fn point_to_page(&self, point: ItemId) -> Option<Offset> {
        let p = self.get::<Point>(point)?;
        let frame = p.relative_to.or(p.parent)?;
        let mut pos = self.item_to_page(frame)?;
        pos.translate(p.x, p.y);
        Some(pos)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Csi, Page, PageKind, Rect, Step};
    use crate::store::Document;
    use crate::model::{ItemRef, Offset};

    fn pages(doc: &mut Document, kinds: &[PageKind]) -> Vec<u32> {
        kinds
            .iter()
            .map(|&k| doc.add(Page::new(k), None, None, None).unwrap())
            .collect()
    }

    #[test]
    fn next_page_skips_non_content_pages() {
        let mut doc = Document::default();
        let ids = pages(
            &mut doc,
            &[PageKind::Title, PageKind::Page, PageKind::Inventory, PageKind::Page],
        );
        assert_eq!(doc.next_page(ItemRef::page(ids[1]), false), Some(ids[3]));
        assert_eq!(doc.next_page(ItemRef::page(ids[1]), true), Some(ids[2]));
        assert_eq!(doc.prev_basic_page(ItemRef::page(ids[1])), None);
        assert_eq!(doc.prev_page(ItemRef::page(ids[1]), true), Some(ids[0]));
    }

    #[test]
    fn page_for_climbs_to_page() {
        let mut doc = Document::default();
        let page = pages(&mut doc, &[PageKind::Page])[0];
        let step = doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        let csi = doc.add_child(Csi::default(), ItemRef::step(step)).unwrap();
        assert_eq!(doc.page_for(ItemRef::csi(csi)), Some(page));
        assert!(doc.is_descendent(ItemRef::csi(csi), ItemRef::page(page)));
        assert!(!doc.is_descendent(ItemRef::page(page), ItemRef::csi(csi)));
        assert_eq!(doc.page_for(ItemRef::csi(999)), None);
    }

    #[test]
    fn step_navigation_stays_on_page_unless_asked() {
        let mut doc = Document::default();
        let ids = pages(&mut doc, &[PageKind::Page, PageKind::Page]);
        let a = doc.add_child(Step::default(), ItemRef::page(ids[0])).unwrap();
        let b = doc.add_child(Step::default(), ItemRef::page(ids[0])).unwrap();
        let c = doc.add_child(Step::default(), ItemRef::page(ids[1])).unwrap();
        assert_eq!(doc.next_step(a, false), Some(b));
        assert_eq!(doc.next_step(b, false), None);
        assert_eq!(doc.next_step(b, true), Some(c));
        assert_eq!(doc.prev_step(c, true), Some(b));
        assert_eq!(doc.prev_step(a, true), None);
    }

    #[test]
    fn item_to_page_sums_ancestor_offsets() {
        let mut doc = Document::default();
        let page = pages(&mut doc, &[PageKind::Page])[0];
        doc.get_mut::<Page>(page).unwrap().inner_offset = Offset::new(5.0, 5.0);
        let step = doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        doc.get_mut::<Step>(step).unwrap().bounds = Some(Rect::new(100.0, 50.0, 200.0, 200.0));
        let csi = doc.add_child(Csi::default(), ItemRef::step(step)).unwrap();
        doc.get_mut::<Csi>(csi).unwrap().bounds = Some(Rect::new(10.0, 20.0, 30.0, 30.0));
        assert_eq!(doc.item_to_page(ItemRef::csi(csi)), Some(Offset::new(115.0, 75.0)));
    }
}
