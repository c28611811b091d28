//! # Layout Engine
//!
//! Assigns a box to every item on a page. Layout is recursive: a page cuts
//! its interior into a grid of step cells, each step stacks its submodel
//! images, parts list and number label, places its callouts against the
//! edges of what remains, and centres its content image in the rest.
//!
//! Pass order matters. Later passes read geometry written by earlier ones:
//! callouts are placed before the content image because they take space it
//! must not occupy, and callout arrows come after it because their tips
//! point at its final box.
//!
//! The engine never renders. Every leaf size comes from a [`SizeProvider`];
//! a missing answer leaves that item without a box and layout carries on.
//!
//! Given the same document, template and provider answers, running layout
//! twice yields identical geometry. Child items the engine creates itself
//! (dividers, arrows, connector points) are updated in place on a re-run,
//! so their ids stay stable.

pub mod bounds;
pub mod callout;
pub mod grid;
pub mod inventory;
pub mod pli;

use log::{debug, info, trace, warn};

use crate::error::StoreError;
use crate::model::{
    Align, Annotation, AnnotationRole, Book, Csi, Direction, Divider, Edge, ItemId, ItemKind,
    ItemRef, NumberLabel, Offset, Page, PageKind, PageLayout, Pli, Point, QuantityLabel, Rect,
    RotateIcon, Size, Step, StretchedStep, SubmodelImage, VAlign,
};
use crate::provider::{Measure, SizeProvider};
use crate::store::mutations::{TITLE_FONT, TITLE_INFO_FONT};
use crate::store::Document;
use crate::template::{NumberPosition, Template};

/// Length of a connector arrow's head.
pub(crate) const ARROW_HEAD: f64 = 30.0;
/// Extra gap between a submodel connector's tip and the content image.
const SUBMODEL_TIP_INSET: f64 = 10.0;
/// Padding around the content image of a title page step.
const TITLE_PADDING: f64 = 20.0;
/// Gap between the template page's sample step and its divider.
const TEMPLATE_DIVIDER_GAP: f64 = 30.0;

/// The layout engine. Holds the size provider for the duration of a pass;
/// the document and its template are passed to each call.
pub struct LayoutEngine<'a> {
    sizes: &'a dyn SizeProvider,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(sizes: &'a dyn SizeProvider) -> Self {
        Self { sizes }
    }

    fn measure(&self, request: Measure) -> Option<Size> {
        let size = self.sizes.measure(&request);
        if size.is_none() {
            debug!("no size available for {}", request.key());
        }
        size
    }

    /// Size of a text label. Unmeasurable labels collapse to zero.
    fn label(&self, font: &str, text: &str) -> Size {
        self.measure(Measure::label(font, text)).unwrap_or_default()
    }

    // ── Entry points ────────────────────────────────────────────

    /// Lay out one page. `mode` overrides, and then replaces, the page's
    /// stored layout mode.
    pub fn layout_page(
        &self,
        doc: &mut Document,
        page: ItemId,
        mode: Option<PageLayout>,
    ) -> Result<(), StoreError> {
        let t = doc.template.clone();
        self.page_with(doc, &t, page, mode)?;
        Ok(())
    }

    /// Lay out a single step inside `cell`, inset by `page_margin` (the
    /// template's page margin when `None`).
    pub fn layout_step(
        &self,
        doc: &mut Document,
        step: ItemId,
        cell: Rect,
        page_margin: Option<f64>,
    ) -> Result<(), StoreError> {
        let t = doc.template.clone();
        self.step_with(doc, &t, step, cell, page_margin)
    }

    /// Lay out every unlocked page flagged as needing layout. Dirty
    /// inventory pages trigger a full inventory reflow. Returns the number
    /// of pages laid out.
    pub fn layout_pending(&self, doc: &mut Document) -> Result<usize, StoreError> {
        let t = doc.template.clone();
        let dirty: Vec<(ItemId, PageKind)> = doc
            .pages
            .iter()
            .filter(|p| p.needs_layout && !p.locked)
            .map(|p| (p.id, p.subtype))
            .collect();
        let mut count = 0;
        let mut reflow = false;
        for (page, kind) in dirty {
            if kind == PageKind::Inventory {
                reflow = true;
                continue;
            }
            self.page_with(doc, &t, page, None)?;
            count += 1;
        }
        if reflow {
            count += self.all_inventory_with(doc, &t)?.len();
        }
        info!("laid out {count} pending pages");
        Ok(count)
    }

    /// Lay out every unlocked page of a book.
    pub fn layout_book(&self, doc: &mut Document, book: ItemId) -> Result<(), StoreError> {
        let t = doc.template.clone();
        let Some(pages) = doc.get::<Book>(book).map(|b| b.pages.clone()) else {
            debug!("layout of book#{book} skipped: no such book");
            return Ok(());
        };
        for page in pages {
            if doc.get::<Page>(page).is_some_and(|p| p.locked) {
                trace!("page#{page} is locked");
                continue;
            }
            self.page_with(doc, &t, page, None)?;
        }
        info!("laid out book#{book}");
        Ok(())
    }

    /// Reflow all inventory items across as many inventory pages as they
    /// need. Returns the inventory pages in order.
    pub fn layout_all_inventory_pages(&self, doc: &mut Document) -> Result<Vec<ItemId>, StoreError> {
        let t = doc.template.clone();
        self.all_inventory_with(doc, &t)
    }

    /// Lay out an inventory page on its own. Items that do not fit are
    /// returned, left on the page without a box.
    pub fn layout_inventory_page(
        &self,
        doc: &mut Document,
        page: ItemId,
    ) -> Result<Vec<ItemId>, StoreError> {
        let t = doc.template.clone();
        self.page_with(doc, &t, page, None)
    }

    /// Try to pull each step after the first back onto the previous content
    /// page. A move is undone when any step on the receiving page ends up
    /// too small; otherwise the emptied page is deleted. Returns how many
    /// steps moved.
    pub fn merge_steps(&self, doc: &mut Document, steps: &[ItemId]) -> Result<usize, StoreError> {
        let t = doc.template.clone();
        let mut merged = 0;
        for &step in steps.iter().skip(1) {
            let Some(origin) = doc.page_for(ItemRef::step(step)) else {
                continue;
            };
            let Some(target) = doc.prev_basic_page(ItemRef::page(origin)) else {
                continue;
            };
            doc.move_step_to_page(step, target, None)?;
            self.page_with(doc, &t, target, None)?;

            let crowded = doc
                .get::<Page>(target)
                .is_some_and(|p| p.steps.iter().any(|&s| step_too_small(doc, s)));
            if crowded {
                trace!("step#{step} does not fit on page#{target}");
                doc.move_step_to_page(step, origin, Some(0))?;
                self.page_with(doc, &t, target, None)?;
                self.page_with(doc, &t, origin, None)?;
                continue;
            }
            if doc.get::<Page>(origin).is_some_and(|p| p.steps.is_empty()) {
                doc.delete_page(origin, false)?;
            }
            merged += 1;
        }
        info!("merged {merged} of {} steps", steps.len().saturating_sub(1));
        Ok(merged)
    }

    // ── Pages ───────────────────────────────────────────────────

    /// Returns the inventory items that did not fit, if this is an
    /// inventory page.
    fn page_with(
        &self,
        doc: &mut Document,
        t: &Template,
        page_id: ItemId,
        mode: Option<PageLayout>,
    ) -> Result<Vec<ItemId>, StoreError> {
        let Some(page) = doc.get::<Page>(page_id).cloned() else {
            debug!("layout of page#{page_id} skipped: no such page");
            return Ok(Vec::new());
        };
        let border = t.page.border.width;
        if let Some(p) = doc.get_mut::<Page>(page_id) {
            p.inner_offset = Offset::new(border, border);
        }
        if page.subtype == PageKind::Title {
            self.title_page(doc, t, &page)?;
            return Ok(Vec::new());
        }

        let (width, height) = t.page_interior();
        let margin = t.margin(t.page.inner_margin);
        let mut area = Rect::new(0.0, 0.0, width, height);
        if let Some(label) = page.number_label {
            let size = self.page_number(doc, t, &page, label);
            area.height -= size.height + margin / 2.0;
        }

        let mut unplaced = Vec::new();
        if page.subtype == PageKind::Inventory {
            unplaced = self.inventory(doc, t, page_id, area)?;
        } else {
            let mode = mode.unwrap_or(page.layout);
            let grid = grid::plan(page.steps.len(), mode, area);
            let cells = grid.cells(page.steps.len(), area);
            for (&step, cell) in page.steps.iter().zip(cells) {
                self.step_with(doc, t, step, cell, None)?;
            }
            let lines = if page.subtype == PageKind::Template {
                template_divider(doc, &page, area, margin)
            } else {
                grid.divider_lines(area, margin)
            };
            sync_dividers(doc, ItemRef::page(page_id), &lines)?;
            if let Some(p) = doc.get_mut::<Page>(page_id) {
                p.layout = mode;
                p.actual_layout = Some(grid.actual());
            }
            trace!(
                "page#{page_id}: {} steps in {}x{} grid",
                page.steps.len(),
                grid.rows,
                grid.cols
            );
        }

        if let Some(p) = doc.get_mut::<Page>(page_id) {
            p.needs_layout = false;
        }
        debug!("laid out page#{page_id}");
        Ok(unplaced)
    }

    /// Place the page number and return its measured size.
    fn page_number(&self, doc: &mut Document, t: &Template, page: &Page, label: ItemId) -> Size {
        let (width, height) = t.page_interior();
        let margin = t.margin(t.page.inner_margin);
        let text = page.number.map(|n| n.to_string()).unwrap_or_default();
        let size = self.label(&t.page.number_label.font, &text);
        let even = page.number.is_some_and(|n| n % 2 == 0);
        let align = match t.page.number_label.position {
            NumberPosition::Left => Align::Left,
            NumberPosition::Right => Align::Right,
            NumberPosition::EvenLeft if even => Align::Left,
            NumberPosition::EvenLeft => Align::Right,
            NumberPosition::EvenRight if even => Align::Right,
            NumberPosition::EvenRight => Align::Left,
        };
        let x = match align {
            Align::Left => margin,
            Align::Right => width - margin,
        };
        if let Some(l) = doc.get_mut::<NumberLabel>(label) {
            l.align = align;
            l.valign = VAlign::Bottom;
            l.bounds = Some(Rect::new(x, height - margin, size.width, size.height));
        }
        size
    }

    fn title_page(&self, doc: &mut Document, t: &Template, page: &Page) -> Result<(), StoreError> {
        let (width, height) = t.page_interior();
        let Some(&step_id) = page.steps.first() else {
            debug!("title page#{} has no step", page.id);
            return Ok(());
        };
        self.step_with(doc, t, step_id, Rect::new(0.0, 0.0, width, height), None)?;

        let Some(step) = doc.get::<Step>(step_id).cloned() else {
            return Ok(());
        };
        let Some((csi, content)) = step
            .csi
            .and_then(|c| doc.get::<Csi>(c))
            .and_then(|c| c.bounds.map(|b| (c.id, b)))
        else {
            debug!("title page#{} has no content image to frame", page.id);
            return Ok(());
        };
        let framed = Size::new(
            content.width + TITLE_PADDING * 2.0,
            content.height + TITLE_PADDING * 2.0,
        );
        let step_box = Rect::new(
            (width - framed.width) / 2.0,
            (height - framed.height) / 2.0,
            framed.width,
            framed.height,
        );
        if let Some(s) = doc.get_mut::<Step>(step_id) {
            s.bounds = Some(step_box);
        }
        if let Some(c) = doc.get_mut::<Csi>(csi) {
            c.bounds = Some(Rect::new(TITLE_PADDING, TITLE_PADDING, content.width, content.height));
        }

        let info = format!("{} steps, {} pages", doc.steps.len(), doc.page_count());
        let name = self.title_label(
            doc,
            page.id,
            AnnotationRole::TitleModelName,
            &step.model.filename,
            TITLE_FONT,
        )?;
        let count = self.title_label(
            doc,
            page.id,
            AnnotationRole::TitlePageCount,
            &info,
            TITLE_INFO_FONT,
        )?;
        if let Some(a) = doc.get_mut::<Annotation>(name.0) {
            a.bounds = Some(Rect::new(
                (width - name.1.width) / 2.0,
                (step_box.y - name.1.height) / 2.0,
                name.1.width,
                name.1.height,
            ));
        }
        if let Some(a) = doc.get_mut::<Annotation>(count.0) {
            a.bounds = Some(Rect::new(
                (width - count.1.width) / 2.0,
                step_box.bottom() + (step_box.y - count.1.height) / 2.0,
                count.1.width,
                count.1.height,
            ));
        }
        if let Some(p) = doc.get_mut::<Page>(page.id) {
            p.needs_layout = false;
        }
        Ok(())
    }

    /// Find (or create) the title page label with `role`, and measure it.
    fn title_label(
        &self,
        doc: &mut Document,
        page: ItemId,
        role: AnnotationRole,
        text: &str,
        font: &str,
    ) -> Result<(ItemId, Size), StoreError> {
        let existing = doc.get::<Page>(page).and_then(|p| {
            p.annotations
                .iter()
                .copied()
                .find(|&a| doc.get::<Annotation>(a).is_some_and(|a| a.role == Some(role)))
        });
        let id = match existing {
            Some(id) => id,
            None => doc.add_annotation_label(
                ItemRef::page(page),
                text,
                Some(font),
                Offset::ZERO,
                Some(role),
            )?,
        };
        let size = doc
            .get::<Annotation>(id)
            .map(|a| self.label(&a.font, &a.text))
            .unwrap_or_default();
        Ok((id, size))
    }

    fn all_inventory_with(&self, doc: &mut Document, t: &Template) -> Result<Vec<ItemId>, StoreError> {
        let pages = doc.inventory_pages();
        let Some(&first) = pages.first() else {
            return Ok(Vec::new());
        };
        for &page in &pages[1..] {
            let items = doc
                .get::<Page>(page)
                .map(|p| p.pli_items.clone())
                .unwrap_or_default();
            for item in items {
                doc.reparent(ItemRef::pli_item(item), ItemRef::page(first), None)?;
            }
            doc.delete_page(page, false)?;
        }

        let mut laid_out = vec![first];
        let mut current = first;
        let mut unplaced = self.page_with(doc, t, first, None)?;
        while !unplaced.is_empty() {
            let Some(prev) = doc.get::<Page>(current) else {
                break;
            };
            let number = prev.number.map(|n| n + 1);
            let book = prev
                .parent
                .filter(|p| p.kind == ItemKind::Book)
                .map(|p| p.id);
            let index = doc.pages.position(current).map(|i| i + 1);
            let next = doc.add_page(PageKind::Inventory, number, book, index)?;
            for &item in &unplaced {
                doc.reparent(ItemRef::pli_item(item), ItemRef::page(next), None)?;
            }
            info!("moved {} inventory items onto new page#{next}", unplaced.len());

            let before = unplaced.len();
            unplaced = self.page_with(doc, t, next, None)?;
            laid_out.push(next);
            current = next;
            if unplaced.len() == before {
                warn!("{before} inventory items do not fit on an empty page");
                break;
            }
        }
        Ok(laid_out)
    }

    // ── Steps ───────────────────────────────────────────────────

    fn step_with(
        &self,
        doc: &mut Document,
        t: &Template,
        step_id: ItemId,
        cell: Rect,
        page_margin: Option<f64>,
    ) -> Result<(), StoreError> {
        let Some(step) = doc.get::<Step>(step_id).cloned() else {
            debug!("layout of step#{step_id} skipped: no such step");
            return Ok(());
        };

        let mut cell = cell;
        if !step.stretched_pages.is_empty() {
            cell.width *= (step.stretched_pages.len() + 1) as f64;
            for (idx, &page) in step.stretched_pages.iter().enumerate() {
                if let Some(p) = doc.get_mut::<Page>(page) {
                    p.stretched_step = Some(StretchedStep {
                        step_id,
                        left_offset: -((idx + 1) as f64) * t.page.width,
                    });
                }
            }
        }

        let in_callout = step.parent.is_some_and(|p| p.kind == ItemKind::Callout);
        let (fraction, label_font) = if in_callout {
            (t.callout.step.inner_margin, &t.callout.step.number_label.font)
        } else {
            (t.step.inner_margin, &t.step.number_label.font)
        };
        let margin = t.margin(fraction);
        let inset = page_margin.unwrap_or_else(|| t.margin(t.page.inner_margin));
        let own = Rect::new(
            cell.x + inset,
            cell.y + inset,
            cell.width - inset * 2.0,
            cell.height - inset * 2.0,
        );
        if let Some(s) = doc.get_mut::<Step>(step_id) {
            s.bounds = Some(own);
        }
        let mut area = Rect::new(0.0, 0.0, own.width, own.height);

        for &image in &step.submodel_images {
            if let Some(b) = self.submodel_image(doc, t, image, area) {
                area.move_edge(Edge::Top, b.height + margin);
            }
        }

        if let Some(pli) = step.pli {
            if doc.plis_visible {
                let mut b = self.pli(doc, t, pli);
                b.y = area.y;
                if let Some(p) = doc.get_mut::<Pli>(pli) {
                    p.bounds = Some(b);
                }
                area.move_edge(Edge::Top, b.height + margin);
            } else if let Some(p) = doc.get_mut::<Pli>(pli) {
                p.bounds = None;
            }
        }

        if let Some(label) = step.number_label {
            let text = step.number.map(|n| n.to_string()).unwrap_or_default();
            let size = self.label(label_font, &text);
            if let Some(l) = doc.get_mut::<NumberLabel>(label) {
                l.bounds = Some(Rect::new(0.0, area.y, size.width, size.height));
            }
            area.move_edge(Edge::Top, size.height + margin);
        }

        for &callout in &step.callouts {
            let Some((b, position)) = self.callout(doc, t, callout, area)? else {
                continue;
            };
            match position {
                Edge::Left => area.move_edge(Edge::Left, b.width + margin),
                Edge::Right => area.move_edge(Edge::Right, -(b.width + margin)),
                Edge::Top => area.move_edge(Edge::Top, b.height + margin),
                Edge::Bottom => area.move_edge(Edge::Bottom, -(b.height + margin)),
            }
        }

        match step.csi {
            None if !step.steps.is_empty() => self.sub_steps(doc, t, &step, area)?,
            Some(csi) => self.csi(doc, t, &step, csi, area),
            None => {}
        }

        for &c in &step.callouts {
            callout::arrange_arrow(doc, c)?;
        }
        if let Some(icon) = step.rotate_icon {
            rotate_icon(doc, t, step_id, icon, margin);
        }
        if step.has_submodel() {
            submodel_arrow(doc, t, step_id)?;
        }
        trace!("step#{step_id} at {own:?}");
        Ok(())
    }

    fn csi(&self, doc: &mut Document, t: &Template, step: &Step, csi: ItemId, area: Rect) {
        let Some(c) = doc.get::<Csi>(csi) else {
            return;
        };
        let request = Measure::StepImage {
            step: step.id,
            model: step.model.filename.clone(),
            scale: c.scale.unwrap_or(t.step.csi.scale),
            rotation: c.rotation().to_vec(),
            fresh: c.is_dirty,
        };
        let size = self.measure(request);
        if let Some(c) = doc.get_mut::<Csi>(csi) {
            c.is_dirty = false;
            c.bounds = size.map(|s| {
                Rect::new(
                    area.x + (area.width - s.width) / 2.0,
                    area.y + (area.height - s.height) / 2.0,
                    s.width,
                    s.height,
                )
            });
        }
    }

    fn sub_steps(&self, doc: &mut Document, t: &Template, step: &Step, area: Rect) -> Result<(), StoreError> {
        let margin = t.margin(t.step.inner_margin);
        let count = step.steps.len();
        let grid = grid::plan(count, PageLayout::Flow(step.sub_step_layout), area);
        // sub-step grids never stretch their last row
        for (i, &sub) in step.steps.iter().enumerate() {
            self.step_with(doc, t, sub, grid.cell(i, area), None)?;
        }
        sync_dividers(doc, ItemRef::step(step.id), &grid.divider_lines(area, margin))
    }

    /// Place a submodel image at the top-left of `area` and return its box.
    fn submodel_image(&self, doc: &mut Document, t: &Template, image_id: ItemId, area: Rect) -> Option<Rect> {
        let image = doc.get::<SubmodelImage>(image_id)?.clone();
        let csi_id = image.csi?;
        let csi = doc.get::<Csi>(csi_id)?;
        let request = |scale: f64| Measure::PartImage {
            filename: image.model_filename.clone(),
            color: image.color,
            scale,
            rotation: csi.rotation().to_vec(),
        };

        let (size, auto_scale) = match csi.scale {
            Some(scale) => (self.measure(request(scale)), None),
            None => {
                let mut scale = t.submodel_image.csi.scale;
                let limit = area.height * t.submodel_image.max_height;
                match self.measure(request(scale)) {
                    Some(s) if s.height > limit && s.height > 0.0 => {
                        scale *= limit / s.height;
                        (self.measure(request(scale)), Some(scale))
                    }
                    other => (other, None),
                }
            }
        };

        let Some(size) = size else {
            if let Some(i) = doc.get_mut::<SubmodelImage>(image_id) {
                i.bounds = None;
            }
            if let Some(c) = doc.get_mut::<Csi>(csi_id) {
                c.bounds = None;
            }
            return None;
        };

        let border = t.submodel_image.border.width;
        let margin = t.margin(t.submodel_image.inner_margin);
        if let Some(c) = doc.get_mut::<Csi>(csi_id) {
            c.auto_scale = auto_scale;
            c.is_dirty = false;
            c.bounds = Some(Rect::new(margin, margin, size.width, size.height));
        }
        let mut b = Rect::new(
            area.x,
            area.y,
            border + margin + size.width + margin + border,
            border + margin + size.height + margin + border,
        );
        if let Some(label) = image.quantity_label {
            let text = format!("x{}", image.quantity);
            let l = self.label(&t.submodel_image.quantity_label.font, &text);
            b.width += l.width + margin;
            if let Some(q) = doc.get_mut::<QuantityLabel>(label) {
                q.align = Align::Right;
                q.valign = VAlign::Bottom;
                q.bounds = Some(Rect::new(
                    b.width - border * 2.0 - margin,
                    b.height - border * 2.0 - margin,
                    l.width,
                    l.height,
                ));
            }
        }
        if let Some(i) = doc.get_mut::<SubmodelImage>(image_id) {
            i.inner_offset = Offset::new(border, border);
            i.bounds = Some(b);
        }
        Some(b)
    }
}

// ── Geometry-only passes ────────────────────────────────────────

/// Anchor the rotate icon above-left of the content image.
fn rotate_icon(doc: &mut Document, t: &Template, step_id: ItemId, icon: ItemId, margin: f64) {
    let Some(step) = doc.get::<Step>(step_id) else {
        return;
    };
    let label = step
        .number_label
        .and_then(|l| doc.get::<NumberLabel>(l))
        .and_then(|l| l.bounds);
    let Some((csi, mut content)) = step
        .csi
        .and_then(|c| doc.get::<Csi>(c))
        .and_then(|c| c.bounds.map(|b| (c.id, b)))
    else {
        if let Some(i) = doc.get_mut::<RotateIcon>(icon) {
            i.bounds = None;
        }
        return;
    };

    let width = t.rotate_icon.size;
    let height = width * 0.94;
    let mut x = content.x - width - margin;
    let mut y = content.y - height;
    if x < 0.0 {
        content.x -= x;
        x = 0.0;
    }
    if y < 0.0 {
        content.y -= y;
        y = 0.0;
    }
    if let Some(l) = label {
        let under_label = y >= l.y && y <= l.bottom() + margin;
        let beside_label = x >= l.x && x <= l.right() + margin;
        if under_label && beside_label {
            y = l.bottom() + margin;
        }
    }
    if let Some(c) = doc.get_mut::<Csi>(csi) {
        c.bounds = Some(content);
    }
    if let Some(i) = doc.get_mut::<RotateIcon>(icon) {
        i.bounds = Some(Rect::new(x, y, width, height));
    }
}

/// Point from where a sub-assembly was built to the step that uses it.
///
/// With the previous step on the same page, the connector leaves that
/// step's right edge and bends into the content image; otherwise it starts
/// at the page's left edge.
fn submodel_arrow(doc: &mut Document, t: &Template, step_id: ItemId) -> Result<(), StoreError> {
    let Some(step) = doc.get::<Step>(step_id).cloned() else {
        return Ok(());
    };
    let existing = step.annotations.iter().copied().find(|&a| {
        doc.get::<Annotation>(a)
            .is_some_and(|a| a.role == Some(AnnotationRole::SubmodelArrow))
    });
    if t.pli.include_submodels {
        if let Some(a) = existing {
            doc.delete_cascade(ItemRef::new(ItemKind::Annotation, a))?;
        }
        return Ok(());
    }
    let (Some(csi), Some(own)) = (step.csi, step.bounds) else {
        return Ok(());
    };
    let Some(content) = doc.get::<Csi>(csi).and_then(|c| c.bounds) else {
        return Ok(());
    };

    let arrow = match existing {
        Some(a) => a,
        None => doc.add_annotation_arrow(ItemRef::step(step_id), Offset::ZERO)?,
    };
    if let Some(a) = doc.get_mut::<Annotation>(arrow) {
        a.role = Some(AnnotationRole::SubmodelArrow);
        a.direction = Direction::Right;
    }
    let owner = ItemRef::new(ItemKind::Annotation, arrow);
    let prev = doc
        .prev_step(step_id, true)
        .filter(|&p| doc.get::<Step>(p).and_then(|s| s.parent) == step.parent);

    let points = match prev {
        Some(prev) => {
            let points = ensure_points(doc, owner, 4)?;
            let frame = Some(ItemRef::step(prev));
            place_point(doc, points[0], Offset::new(own.width, 0.0), frame);
            place_point(doc, points[1], Offset::new(own.width, own.height), frame);
            place_point(
                doc,
                points[2],
                Offset::new(own.width, content.y + content.height / 2.0),
                frame,
            );
            points
        }
        None => {
            let points = ensure_points(doc, owner, 2)?;
            let page = doc.page_for(ItemRef::step(step_id));
            let y = doc
                .item_to_page(ItemRef::csi(csi))
                .map_or(0.0, |o| o.y + content.height / 2.0);
            place_point(doc, points[0], Offset::new(0.0, y), page.map(ItemRef::page));
            points
        }
    };
    if let Some(&tip) = points.last() {
        place_point(
            doc,
            tip,
            Offset::new(-ARROW_HEAD - SUBMODEL_TIP_INSET, content.height / 2.0),
            Some(ItemRef::csi(csi)),
        );
    }
    Ok(())
}

/// The single vertical divider of the template page, right of the sample
/// step's content image.
fn template_divider(doc: &Document, page: &Page, area: Rect, margin: f64) -> Vec<(Offset, Offset)> {
    let content = page
        .steps
        .first()
        .and_then(|&s| doc.get::<Step>(s))
        .and_then(|s| s.csi)
        .and_then(|c| doc.get::<Csi>(c))
        .and_then(|c| c.bounds);
    match content {
        Some(c) => {
            let x = margin + c.x + c.width + TEMPLATE_DIVIDER_GAP;
            vec![(Offset::new(x, margin), Offset::new(x, area.height - margin))]
        }
        None => Vec::new(),
    }
}

/// A step is too small when its parts list, submodel images or content
/// image would not fit with a little room to spare.
pub fn step_too_small(doc: &Document, step: ItemId) -> bool {
    let Some(s) = doc.get::<Step>(step) else {
        return false;
    };
    let Some(own) = s.bounds else {
        return false;
    };
    let content = s
        .csi
        .and_then(|c| doc.get::<Csi>(c))
        .and_then(|c| c.bounds)
        .unwrap_or(Rect::ZERO);
    let pli = s
        .pli
        .filter(|_| doc.plis_visible)
        .and_then(|p| doc.get::<Pli>(p))
        .and_then(|p| p.bounds);
    let submodels: Vec<Rect> = s
        .submodel_images
        .iter()
        .filter_map(|&i| doc.get::<SubmodelImage>(i).and_then(|i| i.bounds))
        .collect();

    if own.width < content.width * 1.1 {
        return true;
    }
    if pli.is_some_and(|p| own.width < p.width * 1.05) {
        return true;
    }
    if submodels.iter().any(|b| own.width < b.width * 1.05) {
        return true;
    }
    let stacked = submodels.iter().map(|b| b.height).sum::<f64>()
        + pli.map_or(0.0, |p| p.height)
        + content.height;
    own.height < stacked * 1.2
}

// ── Engine-owned children ───────────────────────────────────────

/// Make `parent`'s dividers match `lines`, reusing existing ones in order.
fn sync_dividers(doc: &mut Document, parent: ItemRef, lines: &[(Offset, Offset)]) -> Result<(), StoreError> {
    let existing = doc.children_of_kind(parent, ItemKind::Divider);
    for (i, &(p1, p2)) in lines.iter().enumerate() {
        if let Some(d) = existing.get(i).and_then(|&id| doc.get_mut::<Divider>(id)) {
            d.p1 = p1;
            d.p2 = p2;
        } else {
            doc.add_divider(parent, p1, p2)?;
        }
    }
    for &id in existing.iter().skip(lines.len()) {
        doc.delete(ItemRef::new(ItemKind::Divider, id))?;
    }
    Ok(())
}

/// Give a point-owning item exactly `n` points (`n >= 2`). Surplus points
/// are removed from the middle; new ones are inserted before the last.
pub(crate) fn ensure_points(doc: &mut Document, owner: ItemRef, n: usize) -> Result<Vec<ItemId>, StoreError> {
    let points = doc.children_of_kind(owner, ItemKind::Point);
    if points.len() > n {
        for &id in &points[n - 1..points.len() - 1] {
            doc.delete(ItemRef::new(ItemKind::Point, id))?;
        }
    }
    let mut points = doc.children_of_kind(owner, ItemKind::Point);
    while points.len() < n {
        let at = points.len().saturating_sub(1);
        doc.add(Point::default(), Some(owner), None, Some(at))?;
        points = doc.children_of_kind(owner, ItemKind::Point);
    }
    Ok(points)
}

pub(crate) fn place_point(doc: &mut Document, point: ItemId, at: Offset, relative_to: Option<ItemRef>) {
    if let Some(p) = doc.get_mut::<Point>(point) {
        p.x = at.x;
        p.y = at.y;
        p.relative_to = relative_to;
    }
}
