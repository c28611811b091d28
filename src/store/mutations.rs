//! Type-specific edits.
//!
//! Each mutation creates or removes the sub-items its kind requires (a step
//! gets a content image, a parts-list item gets a quantity label, ...) and
//! marks the affected pages as needing layout. Layout itself never runs here.

use log::{debug, info};

use crate::error::StoreError;
use crate::model::{
    Align, Annotation, AnnotationRole, AnnotationType, Book, Callout, CalloutArrow, ColorCode,
    Csi, Divider, Edge, ItemId, ItemKind, ItemRef, NumberLabel, Offset, Orientation, Page,
    PageKind, PageLayout, Part, PartId, Pli, PliItem, Point, QuantityLabel, Rect, RotateIcon,
    Rotation, Step, StretchedStep, SubmodelImage, VAlign,
};
use crate::store::Document;

pub(crate) const TITLE_FONT: &str = "20pt Helvetica";
pub(crate) const TITLE_INFO_FONT: &str = "16pt Helvetica";
const LABEL_FONT: &str = "20pt Helvetica";

/// One line of an inventory: a part, its color and how many the model uses.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEntry {
    pub filename: String,
    pub color: ColorCode,
    pub quantity: u32,
}

/// Rewrite a sequence of numbers so they run contiguously from `start`.
/// Unnumbered entries are left alone.
fn renumber_contiguous(numbers: &mut [Option<i64>], start: i64) {
    let mut prev: Option<i64> = None;
    for n in numbers.iter_mut().flatten() {
        match prev {
            None => *n = start,
            Some(p) if p + 1 != *n => *n = p + 1,
            _ => {}
        }
        prev = Some(*n);
    }
}

impl Document {
    /// Flag the page holding `r` for layout.
    pub fn mark_dirty(&mut self, r: ItemRef) {
        if let Some(page) = self.page_for(r).and_then(|id| self.get_mut::<Page>(id)) {
            page.needs_layout = true;
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for page in self.pages.iter_mut() {
            page.needs_layout = true;
        }
    }

    fn default_orientation(&self) -> Orientation {
        if self.template.page.width > self.template.page.height {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    // ── Pages ───────────────────────────────────────────────────

    /// Create a page. A numbered page also gets its page number label.
    pub fn add_page(
        &mut self,
        subtype: PageKind,
        number: Option<i32>,
        book: Option<ItemId>,
        index: Option<usize>,
    ) -> Result<ItemId, StoreError> {
        let mut page = Page::new(subtype);
        page.number = number;
        page.layout = PageLayout::Flow(self.default_orientation());
        let parent = book.map(|id| ItemRef::new(ItemKind::Book, id));
        let id = self.add(page, parent, index, None)?;
        if number.is_some() {
            let label = NumberLabel {
                align: Align::Right,
                valign: VAlign::Bottom,
                ..Default::default()
            };
            self.add_child(label, ItemRef::page(id))?;
        }
        Ok(id)
    }

    /// Delete a page. Without `cascade` a page that still has steps is refused.
    pub fn delete_page(&mut self, page: ItemId, cascade: bool) -> Result<(), StoreError> {
        let Some(p) = self.get::<Page>(page) else {
            debug!("delete of page#{page} ignored: no such page");
            return Ok(());
        };
        if !p.steps.is_empty() && !cascade {
            return Err(StoreError::ReferentialIntegrity {
                item: ItemRef::page(page),
                children: "steps",
            });
        }
        for step in p.steps.clone() {
            self.delete_step_inner(step, true)?;
        }
        self.delete_cascade(ItemRef::page(page))?;
        self.renumber_pages();
        self.renumber_steps();
        Ok(())
    }

    pub fn set_page_layout(&mut self, page: ItemId, layout: PageLayout) {
        if let Some(p) = self.get_mut::<Page>(page) {
            p.layout = layout;
            p.needs_layout = true;
        }
    }

    pub fn set_page_locked(&mut self, page: ItemId, locked: bool) {
        if let Some(p) = self.get_mut::<Page>(page) {
            p.locked = locked;
        }
    }

    /// Number pages contiguously: per book starting at 1, otherwise across
    /// the whole document starting at 0.
    pub fn renumber_pages(&mut self) {
        if self.books.is_empty() {
            let ids = self.page_list();
            self.renumber_pages_in(&ids, 0);
        } else {
            let books: Vec<Vec<ItemId>> = self.books.iter().map(|b| b.pages.clone()).collect();
            for pages in books {
                self.renumber_pages_in(&pages, 1);
            }
        }
    }

    fn renumber_pages_in(&mut self, ids: &[ItemId], start: i64) {
        let mut numbers: Vec<Option<i64>> = ids
            .iter()
            .map(|&id| self.get::<Page>(id).and_then(|p| p.number).map(i64::from))
            .collect();
        renumber_contiguous(&mut numbers, start);
        for (&id, n) in ids.iter().zip(numbers) {
            if let (Some(p), Some(n)) = (self.get_mut::<Page>(id), n) {
                p.number = i32::try_from(n).ok();
            }
        }
    }

    /// Number every page-level step on content pages, in page order from 1.
    pub fn renumber_steps(&mut self) {
        let ids: Vec<ItemId> = self
            .pages
            .iter()
            .filter(|p| p.subtype.is_basic())
            .flat_map(|p| p.steps.iter().copied())
            .collect();
        self.renumber_steps_in(&ids);
    }

    fn renumber_steps_in(&mut self, ids: &[ItemId]) {
        let mut numbers: Vec<Option<i64>> = ids
            .iter()
            .map(|&id| self.get::<Step>(id).and_then(|s| s.number).map(i64::from))
            .collect();
        renumber_contiguous(&mut numbers, 1);
        for (&id, n) in ids.iter().zip(numbers) {
            if let (Some(s), Some(n)) = (self.get_mut::<Step>(id), n) {
                s.number = u32::try_from(n).ok();
            }
        }
    }

    /// Renumber the list a step belongs to: its parent step or callout, or
    /// every page-level step.
    fn renumber_siblings(&mut self, parent: Option<ItemRef>) {
        match parent {
            Some(p) if matches!(p.kind, ItemKind::Step | ItemKind::Callout) => {
                let ids = self.children_of_kind(p, ItemKind::Step);
                self.renumber_steps_in(&ids);
            }
            _ => self.renumber_steps(),
        }
    }

    // ── Steps ───────────────────────────────────────────────────

    /// Create a step under a page, step or callout, with its content image.
    /// Page-level steps also get a parts list; numbered steps a number label.
    pub fn add_step(
        &mut self,
        dest: ItemRef,
        number: Option<u32>,
        parent_index: Option<usize>,
    ) -> Result<ItemId, StoreError> {
        let step = Step {
            number,
            ..Default::default()
        };
        let id = self.add(step, Some(dest), None, parent_index)?;
        let me = ItemRef::step(id);
        self.add_child(Csi::default(), me)?;
        if dest.kind == ItemKind::Page {
            self.add_child(Pli::default(), me)?;
        }
        if number.is_some() {
            self.add_child(NumberLabel::default(), me)?;
        }
        self.mark_dirty(dest);
        Ok(id)
    }

    /// Delete a step. Without `cascade` a step that still places parts is
    /// refused; with it, its parts are removed first.
    pub fn delete_step(&mut self, step: ItemId, cascade: bool) -> Result<(), StoreError> {
        let page = self.page_for(ItemRef::step(step));
        let parent = self.parent_of(ItemRef::step(step));
        self.delete_step_inner(step, cascade)?;
        self.renumber_siblings(parent);

        if let Some(callout) = parent.filter(|p| p.kind == ItemKind::Callout) {
            let remaining = self.children_of_kind(callout, ItemKind::Step);
            if let [only] = remaining.as_slice() {
                let label = self.get::<Step>(*only).and_then(|s| s.number_label);
                if let Some(label) = label {
                    self.delete(ItemRef::new(ItemKind::NumberLabel, label))?;
                }
            }
        }
        if let Some(page) = page.and_then(|id| self.get_mut::<Page>(id)) {
            page.needs_layout = true;
        }
        Ok(())
    }

    fn delete_step_inner(&mut self, step: ItemId, cascade: bool) -> Result<(), StoreError> {
        let Some(s) = self.get::<Step>(step) else {
            debug!("delete of step#{step} ignored: no such step");
            return Ok(());
        };
        if !s.parts.is_empty() {
            if !cascade {
                return Err(StoreError::ReferentialIntegrity {
                    item: ItemRef::step(step),
                    children: "parts",
                });
            }
            let parts: Vec<PartId> = s.parts.iter().map(|p| p.id).collect();
            for part in parts {
                self.remove_part(step, part);
            }
        }
        self.delete_cascade(ItemRef::step(step))
    }

    /// Add a part to a step, keeping parts sorted by id and the step's parts
    /// list in sync.
    pub fn add_part(&mut self, step: ItemId, part: Part) -> Result<(), StoreError> {
        let s = self
            .get_mut::<Step>(step)
            .ok_or(StoreError::DanglingReference(ItemRef::step(step)))?;
        if s.parts.iter().any(|p| p.id == part.id) {
            return Ok(());
        }
        let at = s.parts.partition_point(|p| p.id < part.id);
        s.parts.insert(at, part.clone());
        if let Some(pli) = s.pli {
            let pli = ItemRef::pli(pli);
            match self.matching_pli_item(pli, &part.filename, part.color) {
                Some(item) => {
                    if let Some(item) = self.get_mut::<PliItem>(item) {
                        item.quantity += 1;
                    }
                }
                None => {
                    self.add_pli_item(pli, &part.filename, part.color, 1, part.submodel)?;
                }
            }
        }
        self.mark_csi_dirty(step);
        self.mark_dirty(ItemRef::step(step));
        Ok(())
    }

    /// Remove a part from a step and from its parts list.
    pub fn remove_part(&mut self, step: ItemId, part: PartId) -> Option<Part> {
        let s = self.get_mut::<Step>(step)?;
        let pos = s.parts.iter().position(|p| p.id == part)?;
        let removed = s.parts.remove(pos);
        if let Some(pli) = s.pli {
            if let Some(item) = self.matching_pli_item(ItemRef::pli(pli), &removed.filename, removed.color) {
                let quantity = self.get::<PliItem>(item).map_or(0, |i| i.quantity);
                if quantity <= 1 {
                    if let Err(e) = self.delete(ItemRef::pli_item(item)) {
                        debug!("parts-list item#{item} kept after removing part {part}: {e}");
                    }
                } else if let Some(i) = self.get_mut::<PliItem>(item) {
                    i.quantity -= 1;
                }
            }
        }
        self.mark_csi_dirty(step);
        self.mark_dirty(ItemRef::step(step));
        Some(removed)
    }

    /// Flag a step's content image for re-rendering after its parts changed.
    fn mark_csi_dirty(&mut self, step: ItemId) {
        let csi = self.get::<Step>(step).and_then(|s| s.csi);
        if let Some(c) = csi.and_then(|id| self.get_mut::<Csi>(id)) {
            c.is_dirty = true;
        }
    }

    /// Move all of `src`'s parts into `dest`, then delete `src`.
    pub fn merge_with_step(&mut self, src: ItemId, dest: ItemId) -> Result<(), StoreError> {
        if !self.contains(ItemRef::step(dest)) {
            return Err(StoreError::DanglingReference(ItemRef::step(dest)));
        }
        let src_page = self.page_for(ItemRef::step(src));
        let parts: Vec<PartId> = self
            .get::<Step>(src)
            .map(|s| s.parts.iter().map(|p| p.id).collect())
            .unwrap_or_default();
        for id in parts {
            if let Some(part) = self.remove_part(src, id) {
                self.add_part(dest, part)?;
            }
        }
        self.delete_step(src, false)?;
        if let Some(page) = src_page.and_then(|id| self.get_mut::<Page>(id)) {
            page.needs_layout = true;
        }
        self.mark_dirty(ItemRef::step(dest));
        Ok(())
    }

    /// Move a step to another page at `index`.
    pub fn move_step_to_page(
        &mut self,
        step: ItemId,
        page: ItemId,
        index: Option<usize>,
    ) -> Result<(), StoreError> {
        let r = ItemRef::step(step);
        let old = self.page_for(r);
        self.reparent(r, ItemRef::page(page), index)?;
        for id in [old, Some(page)].into_iter().flatten() {
            if let Some(p) = self.get_mut::<Page>(id) {
                p.needs_layout = true;
            }
        }
        Ok(())
    }

    /// Move a step to the front of the next content page, if any.
    pub fn move_step_to_next_page(&mut self, step: ItemId) -> Result<bool, StoreError> {
        let Some(dest) = self.next_basic_page(ItemRef::step(step)) else {
            return Ok(false);
        };
        self.move_step_to_page(step, dest, Some(0))?;
        Ok(true)
    }

    /// Move a step to the end of the previous content page, if any.
    pub fn move_step_to_previous_page(&mut self, step: ItemId) -> Result<bool, StoreError> {
        let Some(dest) = self.prev_basic_page(ItemRef::step(step)) else {
            return Ok(false);
        };
        let index = self.get::<Page>(dest).map(|p| p.steps.len());
        self.move_step_to_page(step, dest, index)?;
        Ok(true)
    }

    /// Let a step spill over onto a trailing page.
    pub fn stretch_step_to_page(&mut self, step: ItemId, page: ItemId) -> Result<(), StoreError> {
        let s = self
            .get_mut::<Step>(step)
            .ok_or(StoreError::DanglingReference(ItemRef::step(step)))?;
        if !s.stretched_pages.contains(&page) {
            s.stretched_pages.push(page);
        }
        let p = self
            .get_mut::<Page>(page)
            .ok_or(StoreError::DanglingReference(ItemRef::page(page)))?;
        p.stretched_step = Some(StretchedStep {
            step_id: step,
            left_offset: 0.0,
        });
        p.needs_layout = true;
        self.mark_dirty(ItemRef::step(step));
        Ok(())
    }

    /// Delegate a step's content image to a new numbered sub-step.
    ///
    /// Returns `None` when the step has no content image to hand over.
    pub fn add_sub_step(&mut self, step: ItemId) -> Result<Option<ItemId>, StoreError> {
        let Some(s) = self.get::<Step>(step) else {
            return Err(StoreError::DanglingReference(ItemRef::step(step)));
        };
        let Some(csi) = s.csi else {
            return Ok(None);
        };
        let parts = s.parts.clone();
        let model = s.model.clone();

        let sub = self.add_step(ItemRef::step(step), Some(1), None)?;
        if let Some(fresh) = self.get::<Step>(sub).and_then(|n| n.csi) {
            self.delete(ItemRef::csi(fresh))?;
        }
        self.reparent(ItemRef::csi(csi), ItemRef::step(sub), None)?;
        if let Some(n) = self.get_mut::<Step>(sub) {
            n.parts = parts;
            n.model = model;
        }
        Ok(Some(sub))
    }

    pub fn set_sub_step_layout(&mut self, step: ItemId, layout: Orientation) {
        if let Some(s) = self.get_mut::<Step>(step) {
            s.sub_step_layout = layout;
        }
        self.mark_dirty(ItemRef::step(step));
    }

    pub fn toggle_rotate_icon(&mut self, step: ItemId, on: bool) -> Result<(), StoreError> {
        let current = self
            .get::<Step>(step)
            .ok_or(StoreError::DanglingReference(ItemRef::step(step)))?
            .rotate_icon;
        match (on, current) {
            (true, None) => {
                self.add_child(RotateIcon::default(), ItemRef::step(step))?;
            }
            (false, Some(icon)) => self.delete(ItemRef::new(ItemKind::RotateIcon, icon))?,
            _ => {}
        }
        self.mark_dirty(ItemRef::step(step));
        Ok(())
    }

    // ── Content images ──────────────────────────────────────────

    /// Set a content image's rotation and show or hide the step's rotate icon.
    pub fn rotate_csi(
        &mut self,
        csi: ItemId,
        rotation: Option<Vec<Rotation>>,
        rotate_icon: bool,
    ) -> Result<(), StoreError> {
        let c = self
            .get_mut::<Csi>(csi)
            .ok_or(StoreError::DanglingReference(ItemRef::csi(csi)))?;
        c.rotation = rotation;
        c.is_dirty = true;
        if let Some(step) = c.parent.filter(|p| p.kind == ItemKind::Step) {
            self.toggle_rotate_icon(step.id, rotate_icon)?;
        }
        self.mark_dirty(ItemRef::csi(csi));
        Ok(())
    }

    pub fn scale_csi(&mut self, csi: ItemId, scale: Option<f64>) {
        if let Some(c) = self.get_mut::<Csi>(csi) {
            c.scale = scale;
            c.is_dirty = true;
        }
        self.mark_dirty(ItemRef::csi(csi));
    }

    /// Copy a rotation onto the content images of the next `count` steps.
    pub fn copy_rotation(&mut self, step: ItemId, count: usize, rotation: &[Rotation]) {
        let mut cur = step;
        for _ in 0..count {
            let Some(next) = self.next_step(cur, true) else {
                break;
            };
            cur = next;
            let csi = self.get::<Step>(cur).and_then(|s| s.csi);
            if let Some(c) = csi.and_then(|id| self.get_mut::<Csi>(id)) {
                c.rotation = Some(rotation.to_vec());
                c.is_dirty = true;
            }
            self.mark_dirty(ItemRef::step(cur));
        }
    }

    // ── Parts lists ─────────────────────────────────────────────

    pub fn add_pli_item(
        &mut self,
        parent: ItemRef,
        filename: &str,
        color: ColorCode,
        quantity: u32,
        submodel: bool,
    ) -> Result<ItemId, StoreError> {
        let item = PliItem {
            filename: filename.to_string(),
            color,
            quantity,
            submodel,
            ..Default::default()
        };
        let id = self.add_child(item, parent)?;
        self.add_child(QuantityLabel::default(), ItemRef::pli_item(id))?;
        self.mark_dirty(parent);
        Ok(id)
    }

    pub fn set_pli_item_quantity(&mut self, item: ItemId, quantity: u32) {
        if let Some(i) = self.get_mut::<PliItem>(item) {
            i.quantity = quantity;
        }
        self.mark_dirty(ItemRef::pli_item(item));
    }

    /// Show or hide every parts list.
    pub fn set_plis_visible(&mut self, visible: bool) {
        self.plis_visible = visible;
        self.mark_all_dirty();
    }

    // ── Callouts ────────────────────────────────────────────────

    /// Attach a callout to a step, with one empty step and one arrow.
    ///
    /// Without an explicit position, the first edge not already used by
    /// another callout of the step is taken, in the order left, bottom,
    /// right, top.
    pub fn add_callout(&mut self, step: ItemId, position: Option<Edge>) -> Result<ItemId, StoreError> {
        let s = self
            .get::<Step>(step)
            .ok_or(StoreError::DanglingReference(ItemRef::step(step)))?;
        let model = s.model.clone();
        let position = position.unwrap_or_else(|| {
            let taken: Vec<Edge> = s
                .callouts
                .iter()
                .filter_map(|&id| self.get::<Callout>(id).map(|c| c.position))
                .collect();
            [Edge::Left, Edge::Bottom, Edge::Right, Edge::Top]
                .into_iter()
                .find(|e| !taken.contains(e))
                .unwrap_or(Edge::Left)
        });
        let callout = Callout {
            position,
            layout: self.default_orientation(),
            ..Default::default()
        };
        let id = self.add_child(callout, ItemRef::step(step))?;
        let first = self.add_step(ItemRef::callout(id), None, None)?;
        if let Some(s) = self.get_mut::<Step>(first) {
            s.model = model;
        }
        self.add_callout_arrow(id)?;
        Ok(id)
    }

    /// Add a step to a callout. Once a callout holds more than one step,
    /// every step is numbered 1..n and carries a number label.
    pub fn add_callout_step(&mut self, callout: ItemId, index: Option<usize>) -> Result<ItemId, StoreError> {
        let c = self
            .get::<Callout>(callout)
            .ok_or(StoreError::DanglingReference(ItemRef::callout(callout)))?;
        let existing = c.steps.clone();
        let parent_model = c
            .parent
            .and_then(|p| self.get::<Step>(p.id))
            .map(|s| s.model.clone())
            .unwrap_or_default();
        let model = existing
            .first()
            .and_then(|&id| self.get::<Step>(id))
            .map(|s| s.model.clone())
            .unwrap_or(parent_model);

        let number = (!existing.is_empty()).then_some(1);
        let id = self.add_step(ItemRef::callout(callout), number, index)?;
        if let Some(s) = self.get_mut::<Step>(id) {
            s.model = model;
        }
        if existing.is_empty() {
            return Ok(id);
        }

        let steps = self.children_of_kind(ItemRef::callout(callout), ItemKind::Step);
        for (i, &sid) in steps.iter().enumerate() {
            let needs_label = match self.get_mut::<Step>(sid) {
                Some(s) => {
                    s.number = Some(i as u32 + 1);
                    s.number_label.is_none()
                }
                None => false,
            };
            if needs_label {
                self.add_child(NumberLabel::default(), ItemRef::step(sid))?;
            }
        }
        Ok(id)
    }

    pub fn add_callout_arrow(&mut self, callout: ItemId) -> Result<ItemId, StoreError> {
        let id = self.add_child(CalloutArrow::default(), ItemRef::callout(callout))?;
        let arrow = ItemRef::new(ItemKind::CalloutArrow, id);
        self.add_child(Point::default(), arrow)?;
        self.add_child(Point::default(), arrow)?;
        Ok(id)
    }

    pub fn set_callout_layout(
        &mut self,
        callout: ItemId,
        layout: Option<Orientation>,
        position: Option<Edge>,
    ) {
        if let Some(c) = self.get_mut::<Callout>(callout) {
            c.layout = layout.unwrap_or(c.layout);
            c.position = position.unwrap_or(c.position);
        }
        self.mark_dirty(ItemRef::callout(callout));
    }

    // ── Submodel images ─────────────────────────────────────────

    /// Show a finished sub-assembly inline in a step.
    pub fn add_submodel_image(
        &mut self,
        step: ItemId,
        model_filename: &str,
        color: ColorCode,
        quantity: u32,
    ) -> Result<ItemId, StoreError> {
        let image = SubmodelImage {
            model_filename: model_filename.to_string(),
            color,
            quantity,
            ..Default::default()
        };
        let id = self.add_child(image, ItemRef::step(step))?;
        let me = ItemRef::new(ItemKind::SubmodelImage, id);
        self.add_child(Csi::default(), me)?;
        if quantity > 1 {
            let label = QuantityLabel {
                align: Align::Right,
                valign: VAlign::Bottom,
                ..Default::default()
            };
            self.add_child(label, me)?;
        }
        self.mark_dirty(ItemRef::step(step));
        Ok(id)
    }

    // ── Annotations & dividers ──────────────────────────────────

    pub fn add_annotation_label(
        &mut self,
        parent: ItemRef,
        text: &str,
        font: Option<&str>,
        at: Offset,
        role: Option<AnnotationRole>,
    ) -> Result<ItemId, StoreError> {
        let label = Annotation {
            annotation_type: AnnotationType::Label,
            text: if text.is_empty() { "Label".into() } else { text.into() },
            font: font.unwrap_or(LABEL_FONT).to_string(),
            color: "black".to_string(),
            role,
            bounds: Some(Rect::new(at.x, at.y, 0.0, 0.0)),
            ..Default::default()
        };
        let id = self.add_child(label, parent)?;
        self.mark_dirty(parent);
        Ok(id)
    }

    /// Add a free arrow: two points, the second 100px to the right.
    pub fn add_annotation_arrow(&mut self, parent: ItemRef, at: Offset) -> Result<ItemId, StoreError> {
        let arrow = Annotation {
            annotation_type: AnnotationType::Arrow,
            color: "black".to_string(),
            ..Default::default()
        };
        let id = self.add_child(arrow, parent)?;
        let me = ItemRef::new(ItemKind::Annotation, id);
        for dx in [0.0, 100.0] {
            let point = Point {
                x: at.x + dx,
                y: at.y,
                ..Default::default()
            };
            self.add_child(point, me)?;
        }
        self.mark_dirty(parent);
        Ok(id)
    }

    pub fn add_divider(&mut self, parent: ItemRef, p1: Offset, p2: Offset) -> Result<ItemId, StoreError> {
        let divider = Divider {
            p1,
            p2,
            ..Default::default()
        };
        self.add_child(divider, parent)
    }

    // ── Books, title, template and inventory pages ──────────────

    /// Group existing pages into a book, in the order given.
    pub fn add_book(&mut self, number: u32, pages: &[ItemId]) -> Result<ItemId, StoreError> {
        let book = self.add(
            Book {
                number,
                ..Default::default()
            },
            None,
            None,
            None,
        )?;
        for &page in pages {
            if self.contains(ItemRef::page(page)) {
                self.reparent(ItemRef::page(page), ItemRef::new(ItemKind::Book, book), None)?;
            }
        }
        Ok(book)
    }

    /// Insert a title page showing the finished model, its name and a
    /// summary line. It goes right after the template page, if there is one.
    pub fn add_title_page(&mut self, title: &str, info: &str) -> Result<ItemId, StoreError> {
        let index = match self.pages.iter().next() {
            Some(first) if first.subtype == PageKind::Template => 1,
            _ => 0,
        };
        let page = self.add_page(PageKind::Title, Some(1), None, Some(index))?;
        self.renumber_pages();
        let step = self.add_step(ItemRef::page(page), None, None)?;
        if let Some(s) = self.get_mut::<Step>(step) {
            s.model.filename = title.to_string();
        }
        self.add_annotation_label(
            ItemRef::page(page),
            title,
            Some(TITLE_FONT),
            Offset::ZERO,
            Some(AnnotationRole::TitleModelName),
        )?;
        self.add_annotation_label(
            ItemRef::page(page),
            info,
            Some(TITLE_INFO_FONT),
            Offset::ZERO,
            Some(AnnotationRole::TitlePageCount),
        )?;
        Ok(page)
    }

    /// Insert the template page: a sample page with one numbered step.
    pub fn add_template_page(&mut self) -> Result<ItemId, StoreError> {
        let page = self.add_page(PageKind::Template, Some(0), None, Some(0))?;
        self.add_step(ItemRef::page(page), Some(1), None)?;
        Ok(page)
    }

    /// Append an inventory page listing the given parts.
    pub fn add_inventory_page(&mut self, entries: &[InventoryEntry]) -> Result<ItemId, StoreError> {
        let number = self
            .pages
            .iter()
            .last()
            .and_then(|p| p.number)
            .map_or(0, |n| n + 1);
        let page = self.add_page(PageKind::Inventory, Some(number), None, None)?;
        for e in entries {
            self.add_pli_item(ItemRef::page(page), &e.filename, e.color, e.quantity, false)?;
        }
        info!("added inventory page#{page} with {} items", entries.len());
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(id: PartId, filename: &str, color: ColorCode) -> Part {
        Part {
            id,
            filename: filename.to_string(),
            color,
            submodel: false,
        }
    }

    fn page_with_step() -> (Document, ItemId, ItemId) {
        let mut doc = Document::default();
        let page = doc.add_page(PageKind::Page, Some(1), None, None).unwrap();
        let step = doc.add_step(ItemRef::page(page), Some(1), None).unwrap();
        (doc, page, step)
    }

    #[test]
    fn renumber_fills_gaps_and_skips_unnumbered() {
        let mut n = vec![Some(4), None, Some(9), Some(10), Some(2)];
        renumber_contiguous(&mut n, 1);
        assert_eq!(n, vec![Some(1), None, Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn new_page_step_has_csi_pli_and_label() {
        let (doc, _, step) = page_with_step();
        let s = doc.get::<Step>(step).unwrap();
        assert!(s.csi.is_some());
        assert!(s.pli.is_some());
        assert!(s.number_label.is_some());
    }

    #[test]
    fn sub_steps_get_no_parts_list() {
        let (mut doc, _, step) = page_with_step();
        let sub = doc.add_step(ItemRef::step(step), Some(1), None).unwrap();
        assert!(doc.get::<Step>(sub).unwrap().pli.is_none());
    }

    #[test]
    fn parts_feed_the_parts_list() {
        let (mut doc, _, step) = page_with_step();
        doc.add_part(step, part(2, "3001.dat", 4)).unwrap();
        doc.add_part(step, part(1, "3001.dat", 4)).unwrap();
        doc.add_part(step, part(3, "3003.dat", 1)).unwrap();
        let s = doc.get::<Step>(step).unwrap();
        assert_eq!(s.parts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        let pli = doc.get::<Pli>(s.pli.unwrap()).unwrap();
        assert_eq!(pli.pli_items.len(), 2);
        let first = doc.get::<PliItem>(pli.pli_items[0]).unwrap();
        assert_eq!(first.quantity, 2);
        assert!(first.quantity_label.is_some());

        doc.remove_part(step, 1);
        doc.remove_part(step, 3);
        let pli = doc.get::<Pli>(s_pli(&doc, step)).unwrap();
        assert_eq!(pli.pli_items.len(), 1);
        assert_eq!(doc.get::<PliItem>(pli.pli_items[0]).unwrap().quantity, 1);
    }

    fn s_pli(doc: &Document, step: ItemId) -> ItemId {
        doc.get::<Step>(step).unwrap().pli.unwrap()
    }

    #[test]
    fn cascading_step_delete_removes_everything_it_owns() {
        let (mut doc, page, step) = page_with_step();
        doc.add_part(step, part(1, "3001.dat", 4)).unwrap();
        doc.add_callout(step, None).unwrap();
        assert!(matches!(
            doc.delete_step(step, false),
            Err(StoreError::ReferentialIntegrity { .. })
        ));
        doc.delete_step(step, true).unwrap();
        assert!(doc.get::<Page>(page).unwrap().steps.is_empty());
        assert!(doc.steps.is_empty());
        assert!(doc.csis.is_empty());
        assert!(doc.plis.is_empty());
        assert!(doc.pli_items.is_empty());
        assert!(doc.quantity_labels.is_empty());
        assert!(doc.callouts.is_empty());
        assert!(doc.callout_arrows.is_empty());
        assert!(doc.points.is_empty());
        assert_eq!(doc.number_labels.len(), 1); // the page's own label
    }

    #[test]
    fn deleting_steps_renumbers_the_rest() {
        let (mut doc, page, first) = page_with_step();
        let second = doc.add_step(ItemRef::page(page), Some(2), None).unwrap();
        let third = doc.add_step(ItemRef::page(page), Some(3), None).unwrap();
        doc.delete_step(second, false).unwrap();
        assert_eq!(doc.get::<Step>(first).unwrap().number, Some(1));
        assert_eq!(doc.get::<Step>(third).unwrap().number, Some(2));
    }

    #[test]
    fn callouts_take_free_edges_in_order() {
        let (mut doc, _, step) = page_with_step();
        let edges: Vec<Edge> = (0..5)
            .map(|_| {
                let id = doc.add_callout(step, None).unwrap();
                doc.get::<Callout>(id).unwrap().position
            })
            .collect();
        assert_eq!(
            edges,
            vec![Edge::Left, Edge::Bottom, Edge::Right, Edge::Top, Edge::Left]
        );
    }

    #[test]
    fn second_callout_step_numbers_both() {
        let (mut doc, _, step) = page_with_step();
        let callout = doc.add_callout(step, None).unwrap();
        let first = doc.get::<Callout>(callout).unwrap().steps[0];
        assert!(doc.get::<Step>(first).unwrap().number_label.is_none());
        let second = doc.add_callout_step(callout, None).unwrap();
        assert_eq!(doc.get::<Step>(first).unwrap().number, Some(1));
        assert_eq!(doc.get::<Step>(second).unwrap().number, Some(2));
        assert!(doc.get::<Step>(first).unwrap().number_label.is_some());

        doc.delete_step(second, false).unwrap();
        assert!(doc.get::<Step>(first).unwrap().number_label.is_none());
    }

    #[test]
    fn sub_step_takes_over_content_image() {
        let (mut doc, _, step) = page_with_step();
        let csi = doc.get::<Step>(step).unwrap().csi.unwrap();
        let sub = doc.add_sub_step(step).unwrap().unwrap();
        assert!(doc.get::<Step>(step).unwrap().csi.is_none());
        assert_eq!(doc.get::<Step>(sub).unwrap().csi, Some(csi));
        assert_eq!(doc.get::<Csi>(csi).unwrap().parent, Some(ItemRef::step(sub)));
        assert_eq!(doc.csis.len(), 1);
        assert_eq!(doc.add_sub_step(step).unwrap(), None);
    }

    #[test]
    fn moving_steps_between_pages() {
        let (mut doc, p1, step) = page_with_step();
        let p2 = doc.add_page(PageKind::Page, Some(2), None, None).unwrap();
        doc.get_mut::<Page>(p2).unwrap().needs_layout = false;
        assert!(doc.move_step_to_next_page(step).unwrap());
        assert_eq!(doc.get::<Page>(p2).unwrap().steps, vec![step]);
        assert!(doc.get::<Page>(p2).unwrap().needs_layout);
        assert!(!doc.move_step_to_next_page(step).unwrap());
        assert!(doc.move_step_to_previous_page(step).unwrap());
        assert_eq!(doc.get::<Page>(p1).unwrap().steps, vec![step]);
    }

    #[test]
    fn strict_page_delete_refuses_steps() {
        let (mut doc, page, _) = page_with_step();
        assert!(doc.delete_page(page, false).is_err());
        doc.delete_page(page, true).unwrap();
        assert!(doc.pages.is_empty());
        assert!(doc.number_labels.is_empty());
    }

    #[test]
    fn books_own_their_pages() {
        let mut doc = Document::default();
        let a = doc.add_page(PageKind::Page, Some(7), None, None).unwrap();
        let b = doc.add_page(PageKind::Page, Some(9), None, None).unwrap();
        let book = doc.add_book(1, &[a, b]).unwrap();
        assert_eq!(doc.get::<Book>(book).unwrap().pages, vec![a, b]);
        doc.renumber_pages();
        assert_eq!(doc.get::<Page>(a).unwrap().number, Some(1));
        assert_eq!(doc.get::<Page>(b).unwrap().number, Some(2));
    }

    #[test]
    fn title_page_follows_template_page() {
        let mut doc = Document::default();
        let template = doc.add_template_page().unwrap();
        doc.add_page(PageKind::Page, Some(1), None, None).unwrap();
        let title = doc.add_title_page("Tractor", "42 parts, 3 pages").unwrap();
        assert_eq!(doc.page_list()[..2], [template, title]);
        let page = doc.get::<Page>(title).unwrap();
        assert_eq!(page.steps.len(), 1);
        assert_eq!(page.annotations.len(), 2);
    }
}
