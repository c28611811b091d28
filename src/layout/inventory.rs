//! # Inventory Pages
//!
//! Column-balanced packing of every part the model uses. Items are sorted
//! by color, then width, then quantity, and poured top to bottom into
//! columns. When a new column would run off the page the remaining items
//! are handed back to the caller for the next page.
//!
//! Leftover space is spread out afterwards: two columns put the second one
//! at the page's centre line, three or more fan out evenly, and items in a
//! column are spaced to fill its height.

use log::{debug, trace};

use crate::error::StoreError;
use crate::model::{ColorCode, ItemId, Page, PliItem, Rect};
use crate::store::Document;
use crate::template::Template;

use super::LayoutEngine;

/// Extra space added to the page margin before scaling it up.
const MARGIN_PAD: f64 = 5.0;
const MARGIN_SCALE: f64 = 1.2;

struct Entry {
    id: ItemId,
    color: ColorCode,
    quantity: u32,
    bounds: Rect,
}

impl LayoutEngine<'_> {
    /// Pack the page's items into `area`. Returns the items that did not
    /// fit; they stay on the page without a box.
    pub(crate) fn inventory(
        &self,
        doc: &mut Document,
        t: &Template,
        page_id: ItemId,
        area: Rect,
    ) -> Result<Vec<ItemId>, StoreError> {
        let Some(ids) = doc.get::<Page>(page_id).map(|p| p.pli_items.clone()) else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        let mut unmeasured = Vec::new();
        for id in ids {
            let Some(bounds) = self.pli_item(doc, t, id) else {
                unmeasured.push(id);
                continue;
            };
            if let Some(item) = doc.get::<PliItem>(id) {
                entries.push(Entry {
                    id,
                    color: item.color,
                    quantity: item.quantity,
                    bounds,
                });
            }
        }
        if !unmeasured.is_empty() {
            debug!("{} inventory items on page#{page_id} have no size", unmeasured.len());
        }
        entries.sort_by(|a, b| {
            a.color
                .cmp(&b.color)
                .then(a.bounds.width.total_cmp(&b.bounds.width))
                .then(a.quantity.cmp(&b.quantity))
        });
        if let Some(p) = doc.get_mut::<Page>(page_id) {
            p.pli_items = entries
                .iter()
                .map(|e| e.id)
                .chain(unmeasured.iter().copied())
                .collect();
        }

        let margin = (t.margin(t.page.inner_margin) + MARGIN_PAD) * MARGIN_SCALE;
        let width = area.width - margin * 2.0;
        let height = area.height - margin;
        let placed = pack(&mut entries, margin, width, height);

        for (i, e) in entries.iter().enumerate() {
            if let Some(item) = doc.get_mut::<PliItem>(e.id) {
                item.bounds = (i < placed).then_some(e.bounds);
            }
        }
        let leftover: Vec<ItemId> = entries[placed..].iter().map(|e| e.id).collect();
        trace!(
            "inventory page#{page_id}: placed {placed}, {} left over",
            leftover.len()
        );
        Ok(leftover)
    }
}

/// Place entries in columns and spread the leftover space. Returns how many
/// entries were placed; the rest are untouched.
fn pack(entries: &mut [Entry], margin: f64, width: f64, height: f64) -> usize {
    let mut columns: Vec<Vec<usize>> = vec![Vec::new()];
    let (mut x, mut y, mut column_width) = (margin, margin, 0.0_f64);
    let mut placed = entries.len();
    for (i, e) in entries.iter_mut().enumerate() {
        if y + e.bounds.height > height {
            x += column_width + margin;
            y = margin;
            column_width = 0.0;
            columns.push(Vec::new());
        }
        if x + e.bounds.width > width {
            placed = i;
            break;
        }
        e.bounds.x = x;
        e.bounds.y = y;
        y += e.bounds.height + margin;
        column_width = column_width.max(e.bounds.width);
        if let Some(col) = columns.last_mut() {
            col.push(i);
        }
    }
    columns.retain(|c| !c.is_empty());

    match columns.len() {
        2 => {
            let second = &columns[1];
            if entries[second[0]].bounds.x < width / 2.0 {
                for &i in second {
                    entries[i].bounds.x = width / 2.0;
                }
            }
        }
        n if n > 2 => {
            let last = &columns[n - 1];
            let widest = last
                .iter()
                .map(|&i| entries[i].bounds.width)
                .fold(0.0, f64::max);
            let remaining = width - entries[last[0]].bounds.x - widest;
            let step = (remaining / (n - 1) as f64).max(0.0);
            for (c, col) in columns.iter().enumerate() {
                for &i in col {
                    entries[i].bounds.x += step * c as f64;
                }
            }
        }
        _ => {}
    }

    for col in columns.iter().filter(|c| c.len() > 1) {
        let Some(&last) = col.last() else {
            continue;
        };
        let remaining = height - entries[last].bounds.bottom();
        let step = (remaining / (col.len() - 1) as f64).max(0.0);
        for (k, &i) in col.iter().enumerate() {
            entries[i].bounds.y += step * k as f64;
        }
    }
    placed
}
