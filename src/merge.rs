//! # Merge Engine
//!
//! Concatenates PDF documents held in memory. The bridge only depends on the
//! [`MergeEngine`] call contract; [`LopdfEngine`] is the implementation that
//! ships in the wasm module.
//!
//! ## Strategy
//!
//! The first document is the base. Every later document is renumbered above
//! the base's highest object id, its objects are absorbed, and its pages are
//! appended to the base's root `Pages` node in page-tree order. Appended pages
//! are re-parented onto that root, so attributes they used to inherit from
//! their own page tree are copied onto each page first.

use crate::schema::{MergeConfig, MergeError};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::io::Write;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guards against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// A4 in points, used for divider pages when the preceding page has no box.
const FALLBACK_MEDIA_BOX: [i64; 4] = [0, 0, 595, 842];

/// The call contract the bridge relies on.
///
/// Implementations must be stateless per call and must not touch the
/// filesystem.
pub trait MergeEngine {
    /// Merges `sources` in order and writes the result into `sink`.
    ///
    /// When `divider_page` is set a blank page separates consecutive
    /// documents.
    fn merge_raw(
        &self,
        sources: &[Vec<u8>],
        sink: &mut dyn Write,
        divider_page: bool,
        config: &MergeConfig,
    ) -> Result<(), MergeError>;
}

/// Merge engine backed by `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEngine;

impl MergeEngine for LopdfEngine {
    fn merge_raw(
        &self,
        sources: &[Vec<u8>],
        mut sink: &mut dyn Write,
        divider_page: bool,
        config: &MergeConfig,
    ) -> Result<(), MergeError> {
        let total = sources.len();
        let mut documents = sources.iter().enumerate().map(|(idx, bytes)| {
            Document::load_mem(bytes).map_err(|source| MergeError::Load {
                index: idx + 1,
                source,
            })
        });

        let Some(base) = documents.next() else {
            return Err(MergeError::NoSources);
        };
        let mut merged = base?;
        let pages_id = root_pages_id(&merged)?;

        let base_pages = merged.get_pages();
        crate::log!("[1/{}] base document: {} pages", total, base_pages.len());
        let mut last_media_box = base_pages
            .values()
            .next_back()
            .and_then(|&page_id| inherited_attribute(&merged, page_id, b"MediaBox"));

        for (idx, doc) in documents.enumerate() {
            let mut doc = doc?;

            if divider_page {
                let divider = add_divider_page(&mut merged, pages_id, last_media_box.take());
                append_pages_to_tree(&mut merged, pages_id, &[divider])?;
            }

            if doc.version > merged.version {
                merged.version = doc.version.clone();
            }

            // Avoid object id collisions by renumbering the incoming document
            doc.renumber_objects_with(merged.max_id + 1);

            let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
            let pushed_down: Vec<_> = page_ids
                .iter()
                .map(|&page_id| (page_id, inherited_attributes(&doc, page_id)))
                .collect();

            last_media_box = page_ids
                .last()
                .and_then(|&page_id| inherited_attribute(&doc, page_id, b"MediaBox"));

            merged.max_id = merged.max_id.max(doc.max_id);
            merged.objects.extend(doc.objects);

            for (page_id, attributes) in pushed_down {
                let page = merged
                    .get_object_mut(page_id)
                    .and_then(Object::as_dict_mut)
                    .map_err(|e| MergeError::Structure(format!("page {page_id:?}: {e}")))?;
                for (key, value) in attributes {
                    page.set(key, value);
                }
                page.set("Parent", Object::Reference(pages_id));
            }

            append_pages_to_tree(&mut merged, pages_id, &page_ids)?;
            crate::log!("[{}/{}] appended {} pages", idx + 2, total, page_ids.len());
        }

        if config.prune_unused_objects {
            merged.prune_objects();
        }
        merged.renumber_objects();
        if config.compress {
            merged.compress();
        }
        crate::log!("merged document: {} pages", merged.get_pages().len());

        merged
            .save_to(&mut sink)
            .map_err(|e| MergeError::Save(e.to_string()))?;
        Ok(())
    }
}

/// Resolves the catalog's root `Pages` node.
fn root_pages_id(doc: &Document) -> Result<ObjectId, MergeError> {
    doc.catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| MergeError::Structure(format!("catalog has no Pages root: {e}")))
}

/// Looks up `key` on a page, walking up the `Parent` chain.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Every inheritable attribute in effect for a page.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let mut attributes = Vec::new();
    for key in INHERITABLE_ATTRIBUTES {
        if let Some(value) = inherited_attribute(doc, page_id, key) {
            attributes.push((key, value));
        }
    }
    attributes
}

/// Adds a blank page object sized like `media_box`. The caller links it into
/// the page tree.
fn add_divider_page(doc: &mut Document, pages_id: ObjectId, media_box: Option<Object>) -> ObjectId {
    let media_box = match media_box {
        Some(media_box) => media_box,
        None => Object::Array(FALLBACK_MEDIA_BOX.map(Object::Integer).to_vec()),
    };

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set("MediaBox", media_box);
    page.set("Resources", Object::Dictionary(Dictionary::new()));
    doc.add_object(Object::Dictionary(page))
}

/// Appends page references to the root `Pages` node and patches `Count`.
///
/// `Kids` and `Count` may be indirect objects; both are resolved and written
/// back inline on the root node.
fn append_pages_to_tree(
    merged: &mut Document,
    pages_id: ObjectId,
    page_ids: &[ObjectId],
) -> Result<(), MergeError> {
    let pages = merged
        .get_dictionary(pages_id)
        .map_err(|e| MergeError::Structure(format!("Pages root is not a dictionary: {e}")))?;

    let mut kids = pages
        .get(b"Kids")
        .and_then(|kids| merged.dereference(kids))
        .and_then(|(_, kids)| kids.as_array())
        .map_err(|e| MergeError::Structure(format!("Pages root has no Kids array: {e}")))?
        .clone();
    let count = pages
        .get(b"Count")
        .and_then(|count| merged.dereference(count))
        .and_then(|(_, count)| count.as_i64())
        .map_err(|e| MergeError::Structure(format!("Pages root has no Count: {e}")))?;

    kids.extend(page_ids.iter().map(|&id| Object::Reference(id)));

    let pages = merged
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| MergeError::Structure(format!("Pages root is not a dictionary: {e}")))?;
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", Object::Integer(count + page_ids.len() as i64));

    Ok(())
}
