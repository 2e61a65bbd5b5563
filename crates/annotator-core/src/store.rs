//! Annotation store: ordered element list plus the current selection
//!
//! Every mutation clamps the element's box into its page, so elements are
//! always inside the page they belong to.

use crate::coords::{MediaBox, PagePoint, PageRect};
use crate::element::{ElementId, ElementKind, ElementPatch, PlacedElement};
use crate::error::AnnotatorError;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct AnnotationStore {
    pages: Vec<MediaBox>,
    elements: Vec<PlacedElement>,
    selected: Option<ElementId>,
    next_id: ElementId,
}

impl AnnotationStore {
    /// Create an empty store for a document with the given page boxes
    /// (index 0 is page 1)
    pub fn new(pages: Vec<MediaBox>) -> Self {
        Self {
            pages,
            elements: Vec::new(),
            selected: None,
            next_id: 1,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn media_box(&self, page: u32) -> Result<&MediaBox, AnnotatorError> {
        page.checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .ok_or(AnnotatorError::PageNotFound(page))
    }

    /// Add a new element, returning its id. Ids are never reused, even
    /// after an undo removes the element again.
    pub fn add(
        &mut self,
        page: u32,
        rect: PageRect,
        kind: ElementKind,
    ) -> Result<ElementId, AnnotatorError> {
        let bounds = self.media_box(page)?.bounds();
        let id = self.next_id;
        self.next_id += 1;

        self.elements.push(PlacedElement {
            id,
            page,
            rect: rect.clamped_to(&bounds),
            kind,
        });
        Ok(id)
    }

    pub fn update(&mut self, id: ElementId, patch: &ElementPatch) -> Result<(), AnnotatorError> {
        let pos = self
            .position(id)
            .ok_or(AnnotatorError::ElementNotFound(id))?;
        let bounds = self.media_box(self.elements[pos].page)?.bounds();

        let element = &mut self.elements[pos];
        patch.apply_to(element);
        element.rect = element.rect.clamped_to(&bounds);
        Ok(())
    }

    /// Remove an element; clears the selection if it pointed at it
    pub fn remove(&mut self, id: ElementId) -> Option<PlacedElement> {
        let pos = self.position(id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.elements.remove(pos))
    }

    pub fn get(&self, id: ElementId) -> Option<&PlacedElement> {
        self.elements.iter().find(|el| el.id == id)
    }

    /// Elements on one page in paint order (last is topmost)
    pub fn list(&self, page: u32) -> Vec<&PlacedElement> {
        self.elements.iter().filter(|el| el.page == page).collect()
    }

    pub fn elements(&self) -> &[PlacedElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Select an element, or clear the selection with `None`.
    /// Returns false when the id is unknown; the selection is then cleared.
    pub fn select(&mut self, id: Option<ElementId>) -> bool {
        match id {
            Some(id) if self.position(id).is_some() => {
                self.selected = Some(id);
                true
            }
            Some(_) => {
                self.selected = None;
                false
            }
            None => {
                self.selected = None;
                true
            }
        }
    }

    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    pub fn selected_element(&self) -> Option<&PlacedElement> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Replace the whole list (used by undo) and clear the selection
    pub fn replace_all(&mut self, elements: Vec<PlacedElement>) {
        if let Some(max_id) = elements.iter().map(|el| el.id).max() {
            self.next_id = self.next_id.max(max_id + 1);
        }
        self.elements = elements;
        self.selected = None;
    }

    /// Check an element list coming from outside before it replaces the
    /// store's contents: every page must exist, every box must be a
    /// non-empty finite rectangle inside its page, and ids must be unique.
    pub fn validate_import(&self, elements: &[PlacedElement]) -> Result<(), AnnotatorError> {
        let mut seen = HashSet::with_capacity(elements.len());
        for el in elements {
            if !seen.insert(el.id) {
                return Err(AnnotatorError::InvalidElements(format!(
                    "duplicate element id {}",
                    el.id
                )));
            }
            let bounds = self.media_box(el.page)?.bounds();
            let r = &el.rect;
            let finite = [r.x, r.y, r.width, r.height].iter().all(|v| v.is_finite());
            if !finite || r.width <= 0.0 || r.height <= 0.0 {
                return Err(AnnotatorError::InvalidElements(format!(
                    "element {} has an empty or non-finite box",
                    el.id
                )));
            }
            if !r.fits_within(&bounds) {
                return Err(AnnotatorError::InvalidElements(format!(
                    "element {} lies outside page {}",
                    el.id, el.page
                )));
            }
        }
        Ok(())
    }

    /// Topmost element on `page` whose box contains `point`
    pub fn hit_test(&self, page: u32, point: PagePoint) -> Option<ElementId> {
        self.elements
            .iter()
            .rev()
            .find(|el| el.page == page && el.rect.contains(point))
            .map(|el| el.id)
    }

    fn position(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|el| el.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AnnotationStore {
        AnnotationStore::new(vec![MediaBox::new(612.0, 792.0), MediaBox::new(595.0, 842.0)])
    }

    fn highlight() -> ElementKind {
        ElementKind::Highlight {
            color: "#FFEB3B".to_string(),
        }
    }

    #[test]
    fn test_add_returns_unique_ids_across_pages() {
        let mut s = store();
        let a = s.add(1, PageRect::new(0.0, 0.0, 50.0, 20.0), highlight()).unwrap();
        let b = s.add(2, PageRect::new(0.0, 0.0, 50.0, 20.0), highlight()).unwrap();
        assert_ne!(a, b);
        assert_eq!(s.list(1).len(), 1);
        assert_eq!(s.list(2).len(), 1);
    }

    #[test]
    fn test_add_rejects_missing_page() {
        let mut s = store();
        let err = s.add(3, PageRect::new(0.0, 0.0, 50.0, 20.0), highlight());
        assert!(matches!(err, Err(AnnotatorError::PageNotFound(3))));
        assert!(matches!(
            s.add(0, PageRect::new(0.0, 0.0, 50.0, 20.0), highlight()),
            Err(AnnotatorError::PageNotFound(0))
        ));
    }

    #[test]
    fn test_add_clamps_into_page() {
        let mut s = store();
        let id = s.add(1, PageRect::new(600.0, 790.0, 50.0, 20.0), highlight()).unwrap();
        assert_eq!(s.get(id).unwrap().rect, PageRect::new(562.0, 772.0, 50.0, 20.0));
    }

    #[test]
    fn test_update_clamps_into_page() {
        let mut s = store();
        let id = s.add(1, PageRect::new(10.0, 10.0, 50.0, 20.0), highlight()).unwrap();
        s.update(id, &ElementPatch::rect(PageRect::new(-30.0, -5.0, 50.0, 20.0)))
            .unwrap();
        assert_eq!(s.get(id).unwrap().rect, PageRect::new(0.0, 0.0, 50.0, 20.0));
    }

    #[test]
    fn test_update_unknown_id() {
        let mut s = store();
        assert!(matches!(
            s.update(99, &ElementPatch::default()),
            Err(AnnotatorError::ElementNotFound(99))
        ));
    }

    #[test]
    fn test_remove_clears_selection() {
        let mut s = store();
        let id = s.add(1, PageRect::new(0.0, 0.0, 50.0, 20.0), highlight()).unwrap();
        assert!(s.select(Some(id)));
        assert!(s.remove(id).is_some());
        assert_eq!(s.selected(), None);
        assert!(s.is_empty());
    }

    #[test]
    fn test_select_unknown_clears() {
        let mut s = store();
        let id = s.add(1, PageRect::new(0.0, 0.0, 50.0, 20.0), highlight()).unwrap();
        s.select(Some(id));
        assert!(!s.select(Some(42)));
        assert_eq!(s.selected(), None);
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut s = store();
        let _below = s.add(1, PageRect::new(0.0, 0.0, 100.0, 100.0), highlight()).unwrap();
        let above = s.add(1, PageRect::new(50.0, 50.0, 100.0, 100.0), highlight()).unwrap();
        assert_eq!(s.hit_test(1, PagePoint::new(75.0, 75.0)), Some(above));
        assert_eq!(s.hit_test(2, PagePoint::new(75.0, 75.0)), None);
        assert_eq!(s.hit_test(1, PagePoint::new(300.0, 300.0)), None);
    }

    fn placed(id: ElementId, page: u32, rect: PageRect) -> PlacedElement {
        PlacedElement {
            id,
            page,
            rect,
            kind: highlight(),
        }
    }

    #[test]
    fn test_validate_import_accepts_well_formed_list() {
        let s = store();
        let elements = vec![
            placed(4, 1, PageRect::new(10.0, 10.0, 50.0, 20.0)),
            placed(9, 2, PageRect::new(545.0, 822.0, 50.0, 20.0)),
        ];
        assert!(s.validate_import(&elements).is_ok());
        assert!(s.validate_import(&[]).is_ok());
    }

    #[test]
    fn test_validate_import_rejects_duplicate_ids() {
        let s = store();
        let elements = vec![
            placed(3, 1, PageRect::new(10.0, 10.0, 50.0, 20.0)),
            placed(3, 2, PageRect::new(10.0, 10.0, 50.0, 20.0)),
        ];
        assert!(matches!(
            s.validate_import(&elements),
            Err(AnnotatorError::InvalidElements(ref m)) if m.contains("duplicate")
        ));
    }

    #[test]
    fn test_validate_import_rejects_missing_page_and_bad_boxes() {
        let s = store();
        assert!(matches!(
            s.validate_import(&[placed(1, 3, PageRect::new(0.0, 0.0, 50.0, 20.0))]),
            Err(AnnotatorError::PageNotFound(3))
        ));
        // fits page 2 (595 wide) but not page 1 (612 x 792)
        assert!(matches!(
            s.validate_import(&[placed(1, 1, PageRect::new(560.0, 800.0, 30.0, 20.0))]),
            Err(AnnotatorError::InvalidElements(_))
        ));
        assert!(matches!(
            s.validate_import(&[placed(1, 1, PageRect::new(0.0, 0.0, 0.0, 20.0))]),
            Err(AnnotatorError::InvalidElements(_))
        ));
        assert!(matches!(
            s.validate_import(&[placed(1, 1, PageRect::new(f64::NAN, 0.0, 10.0, 20.0))]),
            Err(AnnotatorError::InvalidElements(_))
        ));
    }

    #[test]
    fn test_replace_all_keeps_ids_unique() {
        let mut s = store();
        let a = s.add(1, PageRect::new(0.0, 0.0, 50.0, 20.0), highlight()).unwrap();
        let snapshot = s.elements().to_vec();
        let b = s.add(1, PageRect::new(0.0, 0.0, 50.0, 20.0), highlight()).unwrap();
        s.select(Some(b));
        s.replace_all(snapshot);
        assert_eq!(s.selected(), None);
        let c = s.add(1, PageRect::new(0.0, 0.0, 50.0, 20.0), highlight()).unwrap();
        assert!(c != a && c != b);
    }
}
