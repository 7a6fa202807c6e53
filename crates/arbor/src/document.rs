//! Mutable, history-bearing container of parts.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use arbor_mesh::TriangleMesh;
use arbor_step::StepWriter;
use serde::{Deserialize, Serialize};

use crate::{export, CadError, Part};

/// Default bound on the undo and redo stacks.
pub const DEFAULT_HISTORY_DEPTH: usize = 128;

/// One recorded reverse operation.
///
/// Each entry owns only what it needs to undo a single mutation; applying
/// an edit yields its own inverse, which is what lands on the opposite
/// stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Edit {
    /// Insert `part` back at `index` (reverse of a removal).
    AddPart { index: usize, part: Part },
    /// Remove the part at `index` (reverse of an addition).
    RemovePart { index: usize },
    /// Put `part` back at `index` (reverse of a replacement).
    ReplacePart { index: usize, part: Part },
}

impl Edit {
    fn apply(self, parts: &mut Vec<Part>) -> Edit {
        match self {
            Edit::AddPart { index, part } => {
                parts.insert(index, part);
                Edit::RemovePart { index }
            }
            Edit::RemovePart { index } => {
                let part = parts.remove(index);
                Edit::AddPart { index, part }
            }
            Edit::ReplacePart { index, part } => {
                let old = std::mem::replace(&mut parts[index], part);
                Edit::ReplacePart { index, part: old }
            }
        }
    }
}

/// An ordered collection of parts with bounded undo/redo history and
/// named-format export.
///
/// Part order is insertion order and survives undo/redo round trips.
/// Documents are not re-entrant; concurrent access needs external mutual
/// exclusion, and mutation invalidates outstanding part iterators.
#[derive(Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document name.
    pub name: String,
    parts: Vec<Part>,
    history: VecDeque<Edit>,
    redo: VecDeque<Edit>,
    cap: usize,
    #[serde(skip)]
    step_backend: Option<Arc<dyn StepWriter + Send + Sync>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("parts", &self.parts)
            .field("history", &self.history)
            .field("redo", &self.redo)
            .field("cap", &self.cap)
            .field("step_backend", &self.step_backend.as_ref().map(|_| "<installed>"))
            .finish()
    }
}

impl Document {
    /// Create an empty document with the default history depth.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_history_depth(name, DEFAULT_HISTORY_DEPTH)
    }

    /// Create an empty document with an explicit history depth.
    pub fn with_history_depth(name: impl Into<String>, depth: usize) -> Self {
        Self {
            name: name.into(),
            parts: Vec::new(),
            history: VecDeque::new(),
            redo: VecDeque::new(),
            cap: depth,
            step_backend: None,
        }
    }

    /// Install the external STEP writer used by `export("STEP")`.
    pub fn set_step_backend(&mut self, writer: Arc<dyn StepWriter + Send + Sync>) {
        self.step_backend = Some(writer);
    }

    /// The parts, in insertion order.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// The part at `index`, if any.
    pub fn get_part(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    /// Number of parts.
    pub fn num_parts(&self) -> usize {
        self.parts.len()
    }

    /// Current undo depth.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Current redo depth.
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    fn push_history(&mut self, edit: Edit) {
        push_bounded(&mut self.history, edit, self.cap);
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append a part. Clears the redo stack.
    pub fn add_part(&mut self, part: Part) {
        self.parts.push(part);
        self.push_history(Edit::RemovePart {
            index: self.parts.len() - 1,
        });
        self.redo.clear();
    }

    /// Remove and return the part at `index`. Clears the redo stack.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds (mirrors `Vec::remove`).
    pub fn remove_part(&mut self, index: usize) -> Part {
        let part = self.parts.remove(index);
        self.push_history(Edit::AddPart {
            index,
            part: part.clone(),
        });
        self.redo.clear();
        part
    }

    /// Replace the part at `index`, returning the old one. Clears the
    /// redo stack.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn replace_part(&mut self, index: usize, part: Part) -> Part {
        let old = std::mem::replace(&mut self.parts[index], part);
        self.push_history(Edit::ReplacePart {
            index,
            part: old.clone(),
        });
        self.redo.clear();
        old
    }

    /// Undo the most recent mutation. Returns `false` (a no-op, not an
    /// error) when the history is empty.
    pub fn undo(&mut self) -> bool {
        match self.history.pop_back() {
            Some(edit) => {
                let inverse = edit.apply(&mut self.parts);
                push_bounded(&mut self.redo, inverse, self.cap);
                true
            }
            None => false,
        }
    }

    /// Redo the most recently undone mutation. Returns `false` when the
    /// redo stack is empty.
    pub fn redo(&mut self) -> bool {
        match self.redo.pop_back() {
            Some(edit) => {
                let inverse = edit.apply(&mut self.parts);
                push_bounded(&mut self.history, inverse, self.cap);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Concatenate all parts' meshes into a single mesh, offsetting
    /// vertex indices by the running vertex count.
    pub fn get_mesh_data(&self) -> TriangleMesh {
        let mut combined = TriangleMesh::new();
        for part in &self.parts {
            combined.merge(part.mesh());
        }
        combined
    }

    /// Export the document in a named format.
    ///
    /// `"STL"` emits binary STL of the combined mesh, `"STEP"` hands each
    /// part's compound to the installed BRep writer, `"JSON"` delegates to
    /// the serde glue. Everything else is [`CadError::UnsupportedFormat`].
    pub fn export(&self, format: &str) -> Result<Vec<u8>, CadError> {
        match format {
            "STL" => export::stl::to_stl_bytes(&self.get_mesh_data()),
            "STEP" => {
                let parts: Vec<(&str, &TriangleMesh)> = self
                    .parts
                    .iter()
                    .map(|p| (p.name.as_str(), p.mesh()))
                    .collect();
                let writer = self
                    .step_backend
                    .as_deref()
                    .map(|w| w as &dyn StepWriter);
                Ok(arbor_step::export_step(&parts, writer)?)
            }
            "JSON" => Ok(serde_json::to_vec_pretty(self)?),
            _ => Err(CadError::UnsupportedFormat(format.to_string())),
        }
    }
}

fn push_bounded(stack: &mut VecDeque<Edit>, edit: Edit, cap: usize) {
    if cap == 0 {
        return;
    }
    if stack.len() == cap {
        stack.pop_front();
    }
    stack.push_back(edit);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str) -> Part {
        Part::cube(name, 1.0, 1.0, 1.0).unwrap()
    }

    fn names(doc: &Document) -> Vec<&str> {
        doc.parts().iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_add_and_get() {
        let mut doc = Document::new("d");
        doc.add_part(part("p0"));
        doc.add_part(part("p1"));
        assert_eq!(doc.num_parts(), 2);
        assert_eq!(doc.get_part(1).unwrap().name, "p1");
        assert!(doc.get_part(2).is_none());
    }

    #[test]
    fn test_undo_redo_single_add() {
        let mut doc = Document::new("d");
        doc.add_part(part("p0"));
        assert!(doc.undo());
        assert_eq!(doc.num_parts(), 0);
        assert!(doc.redo());
        assert_eq!(names(&doc), ["p0"]);
    }

    #[test]
    fn test_undo_on_empty_history_is_noop() {
        let mut doc = Document::new("d");
        assert!(!doc.undo());
        assert!(!doc.redo());
    }

    #[test]
    fn test_remove_middle_then_undo_redo() {
        let mut doc = Document::new("d");
        doc.add_part(part("p0"));
        doc.add_part(part("p1"));
        doc.add_part(part("p2"));
        doc.remove_part(1);
        assert_eq!(names(&doc), ["p0", "p2"]);

        // Walk back: removal, then the last addition
        assert!(doc.undo());
        assert_eq!(names(&doc), ["p0", "p1", "p2"]);
        assert!(doc.undo());
        assert_eq!(names(&doc), ["p0", "p1"]);

        // Walk forward again to the post-removal state
        assert!(doc.redo());
        assert_eq!(names(&doc), ["p0", "p1", "p2"]);
        assert!(doc.redo());
        assert_eq!(names(&doc), ["p0", "p2"]);
    }

    #[test]
    fn test_forward_mutation_clears_redo() {
        let mut doc = Document::new("d");
        doc.add_part(part("p0"));
        doc.add_part(part("p1"));
        doc.undo();
        assert_eq!(doc.redo_len(), 1);
        doc.add_part(part("p2"));
        assert_eq!(doc.redo_len(), 0);
        assert!(!doc.redo());
    }

    #[test]
    fn test_replace_round_trip() {
        let mut doc = Document::new("d");
        doc.add_part(part("old"));
        let returned = doc.replace_part(0, part("new"));
        assert_eq!(returned.name, "old");
        assert_eq!(names(&doc), ["new"]);
        doc.undo();
        assert_eq!(names(&doc), ["old"]);
        doc.redo();
        assert_eq!(names(&doc), ["new"]);
    }

    #[test]
    fn test_full_round_trip_restores_both_ends() {
        let mut doc = Document::new("d");
        doc.add_part(part("p0"));
        doc.add_part(part("p1"));
        doc.add_part(part("p2"));
        doc.replace_part(1, part("p1b"));
        doc.remove_part(0);
        let final_names: Vec<String> =
            doc.parts().iter().map(|p| p.name.clone()).collect();

        let mut undone = 0;
        while doc.undo() {
            undone += 1;
        }
        assert_eq!(undone, 5);
        assert_eq!(doc.num_parts(), 0);

        while doc.redo() {}
        let restored: Vec<String> = doc.parts().iter().map(|p| p.name.clone()).collect();
        assert_eq!(restored, final_names);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut doc = Document::with_history_depth("d", 4);
        for i in 0..10 {
            doc.add_part(part(&format!("p{i}")));
        }
        assert_eq!(doc.history_len(), 4);
        // Only the four newest mutations can be undone
        let mut undone = 0;
        while doc.undo() {
            undone += 1;
        }
        assert_eq!(undone, 4);
        assert_eq!(doc.num_parts(), 6);
    }

    #[test]
    fn test_part_order_is_insertion_order() {
        let mut doc = Document::new("d");
        for i in 0..5 {
            doc.add_part(part(&format!("p{i}")));
        }
        assert_eq!(names(&doc), ["p0", "p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn test_get_mesh_data_offsets_indices() {
        let mut doc = Document::new("d");
        doc.add_part(part("a"));
        doc.add_part(part("b"));
        let combined = doc.get_mesh_data();
        assert_eq!(combined.num_vertices(), 16);
        assert_eq!(combined.num_triangles(), 24);
        // Second part's faces index into the second vertex block
        assert!(combined.faces[12].iter().all(|&i| i >= 8));
    }

    #[test]
    fn test_export_unknown_format() {
        let doc = Document::new("d");
        for format in ["OBJ", "DXF", "GLB", ""] {
            assert!(matches!(
                doc.export(format),
                Err(CadError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn test_export_step_without_backend() {
        let mut doc = Document::new("d");
        doc.add_part(part("p0"));
        assert!(matches!(
            doc.export("STEP"),
            Err(CadError::Step(arbor_step::StepError::BackendUnavailable))
        ));
    }

    #[test]
    fn test_export_step_with_mock_backend() {
        struct EchoWriter;
        impl StepWriter for EchoWriter {
            fn write(
                &self,
                compounds: &[arbor_step::Compound],
                schema: &str,
            ) -> Result<Vec<u8>, String> {
                Ok(format!("{schema}:{}", compounds.len()).into_bytes())
            }
        }

        let mut doc = Document::new("d");
        doc.add_part(part("p0"));
        doc.add_part(part("p1"));
        doc.set_step_backend(Arc::new(EchoWriter));
        let bytes = doc.export("STEP").unwrap();
        assert_eq!(bytes, b"AP214:2");
    }

    #[test]
    fn test_export_json_round_trip() {
        let mut doc = Document::new("d");
        doc.add_part(part("p0"));
        let bytes = doc.export("JSON").unwrap();
        let parsed: Document = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.name, "d");
        assert_eq!(parsed.num_parts(), 1);
        assert_eq!(parsed.parts()[0], doc.parts()[0]);
    }
}
