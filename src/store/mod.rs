//! # Entity Store
//!
//! A [`Document`] owns one [`Collection`] per entity kind plus the template.
//! Items reference each other through [`ItemRef`]s, so the store is an arena
//! with typed indices: there are no pointers to keep alive and no cycles.
//!
//! ```text
//! Document
//!   ├── pages:  Collection<Page>   ── steps: [3, 5] ──┐
//!   ├── steps:  Collection<Step>   <──────────────────┘  parent: page#1
//!   ├── csis:   Collection<Csi>
//!   └── ...
//! ```
//!
//! The generic operations here (`add`, `delete`, `reparent`, `reposition`)
//! keep every parent's child slot and every child's `parent` field in step.
//! Ids are allocated monotonically per kind and never handed out twice, so a
//! stale reference resolves to `None` rather than to an unrelated item.

pub mod lookup;
pub mod mutations;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{
    Annotation, Book, Callout, CalloutArrow, ChildSlot, Csi, Divider, Item, ItemId, ItemKind,
    ItemRef, NumberLabel, Page, Pli, PliItem, Point, QuantityLabel, RotateIcon, Step,
    SubmodelImage,
};
use crate::template::Template;

/// An ordered collection of one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_id: ItemId,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T: Item> Collection<T> {
    pub fn get(&self, id: ItemId) -> Option<&T> {
        self.items.iter().find(|i| i.id() == id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut T> {
        self.items.iter_mut().find(|i| i.id() == id)
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|i| i.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reserve the next id. Never below any id already present, so a
    /// hand-edited document with a stale counter still gets fresh ids.
    fn allocate(&mut self) -> ItemId {
        let floor = self.items.iter().map(|i| i.id() + 1).max().unwrap_or(0);
        let id = self.next_id.max(floor);
        self.next_id = id + 1;
        id
    }

    fn insert(&mut self, item: T, index: Option<usize>) {
        let at = index.unwrap_or(self.items.len()).min(self.items.len());
        self.items.insert(at, item);
    }

    fn remove(&mut self, id: ItemId) -> Option<T> {
        let pos = self.position(id)?;
        Some(self.items.remove(pos))
    }

    /// Move an existing item to a new position in the collection order.
    fn move_to(&mut self, id: ItemId, index: usize) {
        if let Some(item) = self.remove(id) {
            self.insert(item, Some(index));
        }
    }
}

/// Typed access from an entity kind to its collection in the document.
pub trait Entity: Item + Sized {
    const KIND: ItemKind;

    fn collection(doc: &Document) -> &Collection<Self>;
    fn collection_mut(doc: &mut Document) -> &mut Collection<Self>;
}

/// The whole authored document: every entity plus the template that lays it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub template: Template,
    /// When false, parts lists are hidden and take no space.
    pub plis_visible: bool,
    pub annotations: Collection<Annotation>,
    pub books: Collection<Book>,
    pub callouts: Collection<Callout>,
    pub callout_arrows: Collection<CalloutArrow>,
    pub csis: Collection<Csi>,
    pub dividers: Collection<Divider>,
    pub number_labels: Collection<NumberLabel>,
    pub pages: Collection<Page>,
    pub plis: Collection<Pli>,
    pub pli_items: Collection<PliItem>,
    pub points: Collection<Point>,
    pub quantity_labels: Collection<QuantityLabel>,
    pub rotate_icons: Collection<RotateIcon>,
    pub steps: Collection<Step>,
    pub submodel_images: Collection<SubmodelImage>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Template::default())
    }
}

macro_rules! entities {
    ($($ty:ident => $field:ident),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: ItemKind = ItemKind::$ty;

                fn collection(doc: &Document) -> &Collection<Self> {
                    &doc.$field
                }

                fn collection_mut(doc: &mut Document) -> &mut Collection<Self> {
                    &mut doc.$field
                }
            }
        )*

        impl Document {
            pub fn new(template: Template) -> Self {
                Self {
                    template,
                    plis_visible: true,
                    $( $field: Collection::default(), )*
                }
            }

            /// Dereference any item. `None` for stale or unknown references.
            pub fn item(&self, r: ItemRef) -> Option<&dyn Item> {
                match r.kind {
                    $( ItemKind::$ty => self.$field.get(r.id).map(|i| i as &dyn Item), )*
                }
            }

            pub fn item_mut(&mut self, r: ItemRef) -> Option<&mut dyn Item> {
                match r.kind {
                    $( ItemKind::$ty => self.$field.get_mut(r.id).map(|i| i as &mut dyn Item), )*
                }
            }

            fn remove_from_collection(&mut self, r: ItemRef) -> bool {
                match r.kind {
                    $( ItemKind::$ty => self.$field.remove(r.id).is_some(), )*
                }
            }

            /// Every live item, grouped by kind.
            pub fn all_refs(&self) -> Vec<ItemRef> {
                let mut out = Vec::new();
                $( out.extend(self.$field.iter().map(|i| i.item_ref())); )*
                out
            }
        }
    };
}

entities! {
    Annotation => annotations,
    Book => books,
    Callout => callouts,
    CalloutArrow => callout_arrows,
    Csi => csis,
    Divider => dividers,
    NumberLabel => number_labels,
    Page => pages,
    Pli => plis,
    PliItem => pli_items,
    Point => points,
    QuantityLabel => quantity_labels,
    RotateIcon => rotate_icons,
    Step => steps,
    SubmodelImage => submodel_images,
}

impl Document {
    pub fn get<T: Entity>(&self, id: ItemId) -> Option<&T> {
        T::collection(self).get(id)
    }

    pub fn get_mut<T: Entity>(&mut self, id: ItemId) -> Option<&mut T> {
        T::collection_mut(self).get_mut(id)
    }

    pub fn contains(&self, r: ItemRef) -> bool {
        self.item(r).is_some()
    }

    /// Register a new item, optionally linking it under `parent`.
    ///
    /// `index` positions the item in its kind's collection and
    /// `parent_index` positions it in the parent's child list; both append
    /// when `None`. Nothing is modified if the parent is stale or cannot own
    /// the item.
    pub fn add<T: Entity>(
        &mut self,
        mut item: T,
        parent: Option<ItemRef>,
        index: Option<usize>,
        parent_index: Option<usize>,
    ) -> Result<ItemId, StoreError> {
        if let Some(p) = parent {
            self.check_slot(p, T::KIND, None)?;
        }
        let id = T::collection_mut(self).allocate();
        item.set_id(id);
        item.set_parent(parent);
        T::collection_mut(self).insert(item, index);
        if let Some(p) = parent {
            self.link(p, ItemRef::new(T::KIND, id), parent_index)?;
        }
        trace!("added {}#{} under {:?}", T::KIND, id, parent);
        Ok(id)
    }

    /// Shorthand for appending a child to a parent.
    pub fn add_child<T: Entity>(&mut self, item: T, parent: ItemRef) -> Result<ItemId, StoreError> {
        self.add(item, Some(parent), None, None)
    }

    /// Delete an item and its owned children.
    ///
    /// Fails with [`StoreError::ReferentialIntegrity`] when the item has
    /// populated required children (a step's parts, a page's steps, a parts
    /// list's items). Deleting a stale reference does nothing.
    pub fn delete(&mut self, r: ItemRef) -> Result<(), StoreError> {
        self.delete_inner(r, false)
    }

    /// Delete an item, clearing required children first.
    pub fn delete_cascade(&mut self, r: ItemRef) -> Result<(), StoreError> {
        self.delete_inner(r, true)
    }

    /// Delete every child of `kind` owned by `r`, cascading into each.
    pub fn delete_child_list(&mut self, r: ItemRef, kind: ItemKind) -> Result<(), StoreError> {
        let children: Vec<ItemRef> = self
            .children(r)
            .into_iter()
            .filter(|c| c.kind == kind)
            .collect();
        for child in children {
            self.delete_inner(child, true)?;
        }
        Ok(())
    }

    fn delete_inner(&mut self, r: ItemRef, cascade: bool) -> Result<(), StoreError> {
        let Some(item) = self.item(r) else {
            debug!("delete of {r} ignored: no such item");
            return Ok(());
        };
        if let Some(children) = item.required_children() {
            if !cascade {
                return Err(StoreError::ReferentialIntegrity { item: r, children });
            }
        }
        let children = item.children();
        let parent = item.parent();

        if r.kind == ItemKind::Step {
            if let Some(step) = self.get_mut::<Step>(r.id) {
                step.parts.clear();
            }
        }
        for child in children {
            self.delete_inner(child, true)?;
        }
        self.unlink_cross_refs(r);
        if let Some(p) = parent {
            self.unlink(p, r);
        }
        self.remove_from_collection(r);
        trace!("deleted {r}");
        Ok(())
    }

    /// Move an item under a new parent. Geometry is left untouched.
    pub fn reparent(
        &mut self,
        r: ItemRef,
        new_parent: ItemRef,
        parent_index: Option<usize>,
    ) -> Result<(), StoreError> {
        let old_parent = self
            .item(r)
            .ok_or(StoreError::DanglingReference(r))?
            .parent();
        if self.is_descendent(new_parent, r) {
            return Err(StoreError::NoChildSlot {
                parent: new_parent,
                child: r.kind,
            });
        }
        self.check_slot(new_parent, r.kind, Some(r.id))?;
        if let Some(old) = old_parent {
            self.unlink(old, r);
        }
        self.link(new_parent, r, parent_index)?;
        if let Some(item) = self.item_mut(r) {
            item.set_parent(Some(new_parent));
        }
        Ok(())
    }

    /// Translate items by a delta.
    ///
    /// Items that own points (arrows, arrow annotations) move their points;
    /// dividers move their endpoints; everything else moves its box. When a
    /// box moves, a parent that derives its box from its children is re-fitted.
    pub fn reposition(&mut self, items: &[ItemRef], dx: f64, dy: f64) {
        for &r in items {
            let Some(item) = self.item(r) else {
                debug!("reposition of {r} ignored: no such item");
                continue;
            };
            let points: Vec<ItemRef> = item
                .children()
                .into_iter()
                .filter(|c| c.kind == ItemKind::Point)
                .collect();
            let parent = item.parent();
            if points.is_empty() {
                if let Some(item) = self.item_mut(r) {
                    item.translate(dx, dy);
                }
                if let Some(parent) = parent {
                    crate::layout::bounds::adjust_after_move(self, parent);
                }
            } else {
                // point owners move their points only; their parent keeps its box
                for p in points {
                    if let Some(point) = self.item_mut(p) {
                        point.translate(dx, dy);
                    }
                }
            }
        }
    }

    /// Move an item to a new position in its collection's order.
    pub fn move_in_collection(&mut self, r: ItemRef, index: usize) {
        match r.kind {
            ItemKind::Page => self.pages.move_to(r.id, index),
            ItemKind::Step => self.steps.move_to(r.id, index),
            _ => debug!("collection order of {} is not significant", r.kind),
        }
    }

    fn check_slot(
        &mut self,
        parent: ItemRef,
        kind: ItemKind,
        moving: Option<ItemId>,
    ) -> Result<(), StoreError> {
        let p = self
            .item_mut(parent)
            .ok_or(StoreError::DanglingReference(parent))?;
        match p.child_slot(kind) {
            None => Err(StoreError::NoChildSlot {
                parent,
                child: kind,
            }),
            Some(ChildSlot::Single(slot)) => match *slot {
                Some(existing) if Some(existing) != moving => Err(StoreError::SlotOccupied {
                    parent,
                    existing: ItemRef::new(kind, existing),
                }),
                _ => Ok(()),
            },
            Some(ChildSlot::List(_)) => Ok(()),
        }
    }

    fn link(
        &mut self,
        parent: ItemRef,
        child: ItemRef,
        index: Option<usize>,
    ) -> Result<(), StoreError> {
        let p = self
            .item_mut(parent)
            .ok_or(StoreError::DanglingReference(parent))?;
        match p.child_slot(child.kind) {
            None => Err(StoreError::NoChildSlot {
                parent,
                child: child.kind,
            }),
            Some(ChildSlot::List(list)) => {
                if !list.contains(&child.id) {
                    let at = index.unwrap_or(list.len()).min(list.len());
                    list.insert(at, child.id);
                }
                Ok(())
            }
            Some(ChildSlot::Single(slot)) => {
                *slot = Some(child.id);
                Ok(())
            }
        }
    }

    fn unlink(&mut self, parent: ItemRef, child: ItemRef) {
        let Some(p) = self.item_mut(parent) else {
            return;
        };
        match p.child_slot(child.kind) {
            Some(ChildSlot::List(list)) => list.retain(|&id| id != child.id),
            Some(ChildSlot::Single(slot)) => {
                if *slot == Some(child.id) {
                    *slot = None;
                }
            }
            None => {}
        }
    }

    /// Drop references that are not parent/child links: stretched-step
    /// bookkeeping between a step and the pages it spans.
    fn unlink_cross_refs(&mut self, r: ItemRef) {
        match r.kind {
            ItemKind::Step => {
                for page in self.pages.iter_mut() {
                    if page.stretched_step.is_some_and(|s| s.step_id == r.id) {
                        page.stretched_step = None;
                    }
                }
            }
            ItemKind::Page => {
                for step in self.steps.iter_mut() {
                    step.stretched_pages.retain(|&p| p != r.id);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Part, PageKind};

    fn doc_with_page() -> (Document, ItemId) {
        let mut doc = Document::default();
        let page = doc.add(Page::new(PageKind::Page), None, None, None).unwrap();
        (doc, page)
    }

    #[test]
    fn add_links_child_to_parent() {
        let (mut doc, page) = doc_with_page();
        let a = doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        let b = doc.add(Step::default(), Some(ItemRef::page(page)), None, Some(0)).unwrap();
        assert_eq!(doc.get::<Page>(page).unwrap().steps, vec![b, a]);
        assert_eq!(doc.get::<Step>(a).unwrap().parent, Some(ItemRef::page(page)));
    }

    #[test]
    fn add_under_stale_parent_changes_nothing() {
        let mut doc = Document::default();
        let err = doc.add_child(Step::default(), ItemRef::page(42)).unwrap_err();
        assert!(matches!(err, StoreError::DanglingReference(_)));
        assert!(doc.steps.is_empty());
    }

    #[test]
    fn add_to_wrong_slot_fails() {
        let (mut doc, page) = doc_with_page();
        let err = doc.add_child(Csi::default(), ItemRef::page(page)).unwrap_err();
        assert!(matches!(err, StoreError::NoChildSlot { .. }));
    }

    #[test]
    fn single_slot_refuses_second_child() {
        let (mut doc, page) = doc_with_page();
        let step = doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        doc.add_child(Csi::default(), ItemRef::step(step)).unwrap();
        let err = doc.add_child(Csi::default(), ItemRef::step(step)).unwrap_err();
        assert!(matches!(err, StoreError::SlotOccupied { .. }));
        assert_eq!(doc.csis.len(), 1);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let (mut doc, page) = doc_with_page();
        let a = doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        doc.delete(ItemRef::step(a)).unwrap();
        let b = doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        assert_ne!(a, b);
        assert!(doc.get::<Step>(a).is_none());
    }

    #[test]
    fn strict_delete_refuses_populated_required_children() {
        let (mut doc, page) = doc_with_page();
        let step = doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        doc.get_mut::<Step>(step).unwrap().parts.push(Part {
            id: 0,
            filename: "3001.dat".into(),
            color: 1,
            submodel: false,
        });
        let err = doc.delete(ItemRef::step(step)).unwrap_err();
        assert!(matches!(err, StoreError::ReferentialIntegrity { children: "parts", .. }));
        assert!(doc.get::<Step>(step).is_some());

        doc.delete_cascade(ItemRef::step(step)).unwrap();
        assert!(doc.get::<Step>(step).is_none());
        assert!(doc.get::<Page>(page).unwrap().steps.is_empty());
    }

    #[test]
    fn delete_child_list_empties_required_children() {
        let (mut doc, page) = doc_with_page();
        doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        assert!(doc.delete(ItemRef::page(page)).is_err());
        doc.delete_child_list(ItemRef::page(page), ItemKind::Step).unwrap();
        doc.delete(ItemRef::page(page)).unwrap();
        assert!(doc.pages.is_empty());
        assert!(doc.steps.is_empty());
    }

    #[test]
    fn reparent_moves_between_lists() {
        let (mut doc, p1) = doc_with_page();
        let p2 = doc.add(Page::new(PageKind::Page), None, None, None).unwrap();
        let step = doc.add_child(Step::default(), ItemRef::page(p1)).unwrap();
        doc.reparent(ItemRef::step(step), ItemRef::page(p2), None).unwrap();
        assert!(doc.get::<Page>(p1).unwrap().steps.is_empty());
        assert_eq!(doc.get::<Page>(p2).unwrap().steps, vec![step]);
        assert_eq!(doc.get::<Step>(step).unwrap().parent, Some(ItemRef::page(p2)));
    }

    #[test]
    fn reparent_into_own_descendant_fails() {
        let (mut doc, page) = doc_with_page();
        let outer = doc.add_child(Step::default(), ItemRef::page(page)).unwrap();
        let inner = doc.add_child(Step::default(), ItemRef::step(outer)).unwrap();
        assert!(doc
            .reparent(ItemRef::step(outer), ItemRef::step(inner), None)
            .is_err());
        assert_eq!(doc.get::<Step>(outer).unwrap().parent, Some(ItemRef::page(page)));
    }

    #[test]
    fn deleting_a_page_clears_stretch_links() {
        let (mut doc, p1) = doc_with_page();
        let p2 = doc.add(Page::new(PageKind::Page), None, None, None).unwrap();
        let step = doc.add_child(Step::default(), ItemRef::page(p1)).unwrap();
        doc.get_mut::<Step>(step).unwrap().stretched_pages.push(p2);
        doc.delete(ItemRef::page(p2)).unwrap();
        assert!(doc.get::<Step>(step).unwrap().stretched_pages.is_empty());
    }
}
