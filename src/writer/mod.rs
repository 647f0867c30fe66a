//! Incremental update writing.
//!
//! An [`IncrementalWriter`] wraps a parsed document and stages new or
//! superseded objects in an arena keyed by `(number, generation)`. On
//! [`IncrementalWriter::write`] the original bytes are reproduced verbatim
//! and only the staged objects, a subsectioned xref, and a `/Prev` trailer
//! are appended, preserving every byte the previous revision signed over.

mod serializer;
mod xref;

pub use serializer::Serializer;

use crate::error::{ParserError, PdfResult, WriterError};
use crate::object::{Object, PdfArray, PdfDictionary};
use crate::parser::PdfReader;
use crate::sign::placeholder::MAX_FILE_SIZE;
use crate::sign::SignatureObject;
use crate::types::ObjectId;
use std::collections::BTreeMap;

/// An object staged for the next update.
#[derive(Debug)]
enum StagedObject {
    Plain(Object),
    Signature(SignatureObject),
}

/// Writes incremental updates on top of an existing document.
#[derive(Debug)]
pub struct IncrementalWriter {
    reader: PdfReader,
    objects: BTreeMap<ObjectId, StagedObject>,
    root_id: ObjectId,
    root: PdfDictionary,
    root_updated: bool,
    next_number: u32,
}

impl IncrementalWriter {
    /// Creates a writer over a parsed document.
    pub fn new(reader: PdfReader) -> PdfResult<Self> {
        let root_id = reader.trailer().root;
        let root = match reader.resolve(root_id)? {
            Object::Dictionary(dict) => dict,
            _ => return Err(ParserError::InvalidTrailer.into()),
        };
        let next_number = reader.trailer().size;
        Ok(Self {
            reader,
            objects: BTreeMap::new(),
            root_id,
            root,
            root_updated: false,
            next_number,
        })
    }

    /// Returns the underlying reader (the previous revision).
    pub fn reader(&self) -> &PdfReader {
        &self.reader
    }

    /// Returns the working copy of the document catalog.
    pub fn root(&self) -> &PdfDictionary {
        &self.root
    }

    /// Returns the catalog for mutation and schedules it for rewriting.
    pub fn root_mut(&mut self) -> &mut PdfDictionary {
        self.root_updated = true;
        &mut self.root
    }

    /// Schedules the catalog for rewriting.
    pub fn update_root(&mut self) {
        self.root_updated = true;
    }

    /// Allocates a fresh object id above the previous revision's /Size.
    pub fn allocate_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next_number);
        self.next_number += 1;
        id
    }

    /// Stages a new object and returns its id.
    pub fn add_object(&mut self, object: Object) -> ObjectId {
        let id = self.allocate_id();
        self.objects.insert(id, StagedObject::Plain(object));
        id
    }

    /// Stages a signature dictionary and returns its id.
    pub fn add_signature_object(&mut self, signature: SignatureObject) -> ObjectId {
        let id = self.allocate_id();
        self.objects.insert(id, StagedObject::Signature(signature));
        id
    }

    /// Returns a staged signature dictionary.
    pub fn signature_object(&self, id: ObjectId) -> Option<&SignatureObject> {
        match self.objects.get(&id) {
            Some(StagedObject::Signature(sig)) => Some(sig),
            _ => None,
        }
    }

    /// Returns a staged signature dictionary for mutation.
    pub fn signature_object_mut(&mut self, id: ObjectId) -> Option<&mut SignatureObject> {
        match self.objects.get_mut(&id) {
            Some(StagedObject::Signature(sig)) => Some(sig),
            _ => None,
        }
    }

    /// Copies an existing object into the update so its new state is
    /// written out. A no-op if the object is already staged.
    pub fn mark_update(&mut self, id: ObjectId) -> PdfResult<()> {
        if id == self.root_id {
            self.root_updated = true;
            return Ok(());
        }
        if !self.objects.contains_key(&id) {
            let object = self.reader.resolve(id)?;
            self.objects.insert(id, StagedObject::Plain(object));
        }
        Ok(())
    }

    /// Returns a staged plain object for mutation. Callers stage objects
    /// with [`IncrementalWriter::mark_update`] first.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        match self.objects.get_mut(&id) {
            Some(StagedObject::Plain(object)) => Some(object),
            _ => None,
        }
    }

    /// Resolves an object by id, preferring the staged state over the
    /// previous revision.
    pub fn resolve_id(&self, id: ObjectId) -> PdfResult<Object> {
        if id == self.root_id {
            return Ok(Object::Dictionary(self.root.clone()));
        }
        match self.objects.get(&id) {
            Some(StagedObject::Plain(object)) => Ok(object.clone()),
            Some(StagedObject::Signature(_)) => Err(WriterError::Structure(
                "signature dictionaries cannot be resolved as plain objects".to_string(),
            )
            .into()),
            None => self.reader.resolve(id),
        }
    }

    /// Follows a reference (if any) through the staged state.
    pub fn resolve(&self, object: &Object) -> PdfResult<Object> {
        match object {
            Object::Reference(id) => self.resolve_id(*id),
            direct => Ok(direct.clone()),
        }
    }

    /// Returns the reference to the page with the given index.
    ///
    /// The page tree is expected to be flat, which holds for the single
    /// level of /Kids the catalog points at.
    pub fn page(&self, index: usize) -> PdfResult<ObjectId> {
        let pages = self
            .root
            .get("Pages")
            .ok_or_else(|| WriterError::Structure("catalog has no /Pages".to_string()))?;
        let pages = self.resolve(pages)?;
        let kids = pages
            .as_dictionary()
            .and_then(|d| d.get("Kids"))
            .ok_or_else(|| WriterError::Structure("page tree has no /Kids".to_string()))?;
        let kids = self.resolve(kids)?;
        let kid = kids
            .as_array()
            .and_then(|a| a.get(index))
            .and_then(Object::as_reference)
            .ok_or_else(|| WriterError::Structure(format!("no page with index {}", index)))?;
        Ok(kid)
    }

    /// Appends an annotation reference to a page's /Annots array, staging
    /// every container whose bytes change.
    pub fn register_annotation(&mut self, page: ObjectId, annotation: ObjectId) -> PdfResult<()> {
        self.mark_update(page)?;
        let annots_entry = self
            .object_mut(page)
            .and_then(|o| o.as_dictionary())
            .and_then(|d| d.get("Annots"))
            .cloned();

        match annots_entry {
            Some(Object::Reference(annots_id)) => {
                self.mark_update(annots_id)?;
                match self.object_mut(annots_id) {
                    Some(Object::Array(array)) => {
                        array.push(Object::Reference(annotation));
                        Ok(())
                    }
                    _ => Err(WriterError::Structure(
                        "page /Annots is not an array".to_string(),
                    )
                    .into()),
                }
            }
            Some(Object::Array(mut array)) => {
                array.push(Object::Reference(annotation));
                self.set_page_annots(page, array)
            }
            None => {
                let mut array = PdfArray::new();
                array.push(Object::Reference(annotation));
                self.set_page_annots(page, array)
            }
            Some(_) => {
                Err(WriterError::Structure("page /Annots is not an array".to_string()).into())
            }
        }
    }

    fn set_page_annots(&mut self, page: ObjectId, annots: PdfArray) -> PdfResult<()> {
        match self.object_mut(page) {
            Some(Object::Dictionary(dict)) => {
                dict.set("Annots", Object::Array(annots));
                Ok(())
            }
            _ => Err(WriterError::Structure("page is not a dictionary".to_string()).into()),
        }
    }

    /// Serializes the incremental update and returns the complete file.
    pub fn write(&mut self) -> PdfResult<Vec<u8>> {
        let mut out = Serializer::from_bytes(self.reader.raw_data().to_vec());
        if !self.reader.raw_data().ends_with(b"\n") {
            out.write_newline();
        }

        if self.root_updated {
            self.objects.insert(
                self.root_id,
                StagedObject::Plain(Object::Dictionary(self.root.clone())),
            );
        }

        let mut offsets = Vec::with_capacity(self.objects.len());
        for (&id, staged) in self.objects.iter_mut() {
            offsets.push((id, out.position() as u64));
            out.write_str(&id.definition_string());
            out.write_newline();
            match staged {
                StagedObject::Plain(Object::Stream(stream)) => {
                    out.write_str(&stream.dictionary.to_pdf_string());
                    out.write_str("\nstream\n");
                    out.write_bytes(stream.data());
                    out.write_str("\nendstream");
                }
                StagedObject::Plain(object) => {
                    out.write_str(&object.to_pdf_string());
                }
                StagedObject::Signature(signature) => {
                    signature.write(&mut out);
                }
            }
            out.write_str("\nendobj\n");
        }

        let xref_offset = out.position();
        out.write_str(&xref::build_xref_section(&offsets));

        let size = offsets
            .iter()
            .map(|(id, _)| id.number + 1)
            .max()
            .unwrap_or(0)
            .max(self.reader.trailer().size);
        let mut trailer = PdfDictionary::new();
        trailer.set("Size", Object::Integer(size as i64));
        trailer.set("Root", Object::Reference(self.root_id));
        if let Some(info) = self.reader.trailer().info {
            trailer.set("Info", Object::Reference(info));
        }
        trailer.set(
            "Prev",
            Object::Integer(self.reader.last_xref_offset() as i64),
        );

        out.write_str("trailer\n");
        out.write_str(&trailer.to_pdf_string());
        out.write_str(&format!("\nstartxref\n{}\n%%EOF\n", xref_offset));

        let buffer = out.into_bytes();
        if buffer.len() as u64 > MAX_FILE_SIZE {
            return Err(WriterError::FileTooLarge(buffer.len() as u64, MAX_FILE_SIZE).into());
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::minimal_pdf;

    fn writer() -> IncrementalWriter {
        let reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
        IncrementalWriter::new(reader).unwrap()
    }

    #[test]
    fn test_allocate_above_previous_size() {
        let mut w = writer();
        assert_eq!(w.allocate_id(), ObjectId::new(5));
        assert_eq!(w.allocate_id(), ObjectId::new(6));
    }

    #[test]
    fn test_update_parses_back() {
        let mut w = writer();
        let mut dict = PdfDictionary::new();
        dict.set("Answer", Object::Integer(42));
        let id = w.add_object(Object::Dictionary(dict));

        let bytes = w.write().unwrap();
        let reread = PdfReader::from_bytes(bytes).unwrap();
        let obj = reread.resolve(id).unwrap();
        assert_eq!(
            obj.as_dictionary().unwrap().get_integer("Answer"),
            Some(42)
        );
        // the original objects survive untouched
        assert!(reread.catalog().is_ok());
    }

    #[test]
    fn test_original_bytes_are_preserved() {
        let original = minimal_pdf();
        let reader = PdfReader::from_bytes(original.clone()).unwrap();
        let mut w = IncrementalWriter::new(reader).unwrap();
        w.add_object(Object::Integer(7));
        let bytes = w.write().unwrap();
        assert_eq!(&bytes[..original.len()], original.as_slice());
        assert!(bytes.len() > original.len());
    }

    #[test]
    fn test_root_update_rewrites_catalog() {
        let mut w = writer();
        w.root_mut().set("Marker", Object::Integer(1));
        let bytes = w.write().unwrap();
        let reread = PdfReader::from_bytes(bytes).unwrap();
        let catalog = reread.catalog().unwrap();
        assert_eq!(catalog.get_integer("Marker"), Some(1));
        assert_eq!(catalog.get_name("Type"), Some("Catalog"));
    }

    #[test]
    fn test_trailer_carries_prev() {
        let mut w = writer();
        let prev = w.reader().last_xref_offset();
        w.add_object(Object::Integer(1));
        let bytes = w.write().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains(&format!("/Prev {}", prev)));
    }

    #[test]
    fn test_register_annotation_creates_array() {
        let mut w = writer();
        let page = w.page(0).unwrap();
        let annot = w.add_object(Object::Dictionary(PdfDictionary::new()));
        w.register_annotation(page, annot).unwrap();

        let bytes = w.write().unwrap();
        let reread = PdfReader::from_bytes(bytes).unwrap();
        let page_obj = reread.resolve(page).unwrap();
        let annots = page_obj
            .as_dictionary()
            .unwrap()
            .get("Annots")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(annots.get(0), Some(&Object::Reference(annot)));
    }
}
