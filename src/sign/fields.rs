//! AcroForm signature field management.

use crate::error::{PdfResult, SignError, WriterError};
use crate::object::{Object, PdfArray, PdfDictionary, PdfName, PdfString};
use crate::parser::PdfReader;
use crate::types::{ObjectId, Rect};
use crate::writer::IncrementalWriter;
use bitflags::bitflags;

bitflags! {
    /// Annotation flags (ISO 32000 table 165).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AnnotationFlags: u32 {
        const INVISIBLE = 1 << 0;
        const HIDDEN = 1 << 1;
        /// Render the annotation when printing.
        const PRINT = 1 << 2;
        /// Forbid interactive deletion and geometry changes.
        const LOCKED = 1 << 7;
    }
}

/// Filter for signature field enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    /// All signature fields.
    Any,
    /// Only fields with a /V entry.
    Filled,
    /// Only fields without a /V entry.
    Empty,
}

impl FieldStatus {
    fn matches(self, filled: bool) -> bool {
        match self {
            FieldStatus::Any => true,
            FieldStatus::Filled => filled,
            FieldStatus::Empty => !filled,
        }
    }
}

/// One discovered signature field.
#[derive(Debug, Clone)]
pub struct SigFieldInfo {
    /// The field name (/T).
    pub name: String,
    /// Whether the field already holds a signature (/V).
    pub filled: bool,
    /// Reference to the field dictionary.
    pub reference: ObjectId,
}

/// Description of a signature field to pre-place in a document.
#[derive(Debug, Clone)]
pub struct SigFieldSpec {
    /// The field name.
    pub field_name: String,
    /// Index of the page carrying the widget.
    pub on_page: usize,
    /// Bounding box; `None` or a degenerate box makes the field
    /// invisible.
    pub rect: Option<Rect>,
}

impl SigFieldSpec {
    /// Creates an invisible field spec on the first page.
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            on_page: 0,
            rect: None,
        }
    }

    /// Places the field on the given page.
    pub fn on_page(mut self, index: usize) -> Self {
        self.on_page = index;
        self
    }

    /// Makes the field visible with the given bounding box.
    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }
}

/// Enumerates the signature fields of a document.
///
/// Recurses into /Kids of signature fields; entries without a /T name are
/// skipped. The result is filtered by `status`.
pub fn enumerate_sig_fields(
    reader: &PdfReader,
    status: FieldStatus,
) -> PdfResult<Vec<SigFieldInfo>> {
    let root = reader.catalog()?;
    let Some(form) = root.get("AcroForm") else {
        return Ok(Vec::new());
    };
    let form = reader.resolve_ref(form)?;
    let Some(form) = form.as_dictionary() else {
        return Ok(Vec::new());
    };
    let Some(fields) = form.get("Fields") else {
        return Ok(Vec::new());
    };
    let fields = reader.resolve_ref(fields)?;
    let Some(fields) = fields.as_array() else {
        return Ok(Vec::new());
    };

    let mut found = Vec::new();
    let resolve = |object: &Object| reader.resolve_ref(object);
    walk_fields(&resolve, fields, None, &mut found)?;
    Ok(found
        .into_iter()
        .filter(|field| status.matches(field.filled))
        .collect())
}

/// Walks a /Fields (or /Kids) array collecting signature fields.
///
/// When `with_name` is set, running into a non-signature field of that
/// name is a conflict.
fn walk_fields<F>(
    resolve: &F,
    list: &PdfArray,
    with_name: Option<&str>,
    out: &mut Vec<SigFieldInfo>,
) -> PdfResult<()>
where
    F: Fn(&Object) -> PdfResult<Object>,
{
    for entry in list.iter() {
        let Some(reference) = entry.as_reference() else {
            log::warn!("ignoring non-reference entry in field list");
            continue;
        };
        let field = resolve(entry)?;
        let Some(field) = field.as_dictionary() else {
            continue;
        };
        let Some(name) = field.get("T").and_then(Object::as_string) else {
            continue;
        };
        let name = name.to_string_lossy();

        if field.get_name("FT") != Some("Sig") {
            if with_name == Some(name.as_str()) {
                return Err(SignError::FieldConflict(format!(
                    "field with name {} exists but is not a signature field",
                    name
                ))
                .into());
            }
            continue;
        }

        let filled = field.get("V").is_some_and(|v| !v.is_null());
        out.push(SigFieldInfo {
            name,
            filled,
            reference,
        });

        if let Some(kids) = field.get("Kids") {
            if let Object::Array(kids) = resolve(kids)? {
                walk_fields(resolve, &kids, with_name, out)?;
            }
        }
    }
    Ok(())
}

/// Where the AcroForm dictionary was found.
enum FormLocation {
    Indirect(ObjectId),
    DirectInRoot,
}

/// Where the /Fields array lives.
enum FieldsLocation {
    IndirectArray(ObjectId),
    InForm,
}

/// Locates or creates the signature field `field_name`, returning whether
/// a new field was created and the field's reference.
///
/// An existing empty signature field of that name is reused; a filled one
/// or a non-signature field of the same name is a conflict. With
/// `existing_fields_only` no fields (or forms) are ever created. Every
/// indirect container whose bytes change is staged for the update.
pub(crate) fn prepare_sig_field(
    writer: &mut IncrementalWriter,
    field_name: &str,
    existing_fields_only: bool,
    lock_sig_flags: bool,
    rect: Option<Rect>,
    on_page: usize,
) -> PdfResult<(bool, ObjectId)> {
    let sig_flags = if lock_sig_flags { 3 } else { 1 };
    let form_entry = writer.root().get("AcroForm").cloned();

    let located = match &form_entry {
        Some(Object::Reference(id)) => match writer.resolve_id(*id)? {
            Object::Dictionary(dict) => Some((dict, FormLocation::Indirect(*id))),
            _ => {
                return Err(WriterError::Structure(
                    "/AcroForm is not a dictionary".to_string(),
                )
                .into())
            }
        },
        Some(Object::Dictionary(dict)) => Some((dict.clone(), FormLocation::DirectInRoot)),
        Some(_) => {
            return Err(
                WriterError::Structure("/AcroForm is not a dictionary".to_string()).into(),
            )
        }
        None => None,
    };

    let Some((form, form_location)) = located else {
        // the document has no form at all
        if existing_fields_only {
            return Err(SignError::NoEmptyField(
                "this file does not contain a form".to_string(),
            )
            .into());
        }
        let page = writer.page(on_page)?;
        let field_id = create_signature_field(writer, field_name, page, rect, None)?;
        let mut fields = PdfArray::new();
        fields.push(Object::Reference(field_id));
        let mut form = PdfDictionary::new();
        form.set("Fields", Object::Array(fields));
        form.set("SigFlags", Object::Integer(sig_flags));
        let form_id = writer.add_object(Object::Dictionary(form));
        writer
            .root_mut()
            .set("AcroForm", Object::Reference(form_id));
        return Ok((true, field_id));
    };

    let (fields_array, fields_location) = match form.get("Fields") {
        Some(Object::Reference(fields_id)) => match writer.resolve_id(*fields_id)? {
            Object::Array(array) => (array, FieldsLocation::IndirectArray(*fields_id)),
            _ => {
                return Err(
                    WriterError::Structure("/Fields is not an array".to_string()).into(),
                )
            }
        },
        Some(Object::Array(array)) => (array.clone(), FieldsLocation::InForm),
        None => (PdfArray::new(), FieldsLocation::InForm),
        Some(_) => {
            return Err(WriterError::Structure("/Fields is not an array".to_string()).into())
        }
    };

    let mut found = Vec::new();
    {
        let resolve = |object: &Object| writer.resolve(object);
        walk_fields(&resolve, &fields_array, Some(field_name), &mut found)?;
    }

    if let Some(existing) = found.into_iter().find(|f| f.name == field_name) {
        if existing.filled {
            return Err(SignError::FieldConflict(format!(
                "signature field with name {} appears to be filled already",
                field_name
            ))
            .into());
        }
        return Ok((false, existing.reference));
    }
    if existing_fields_only {
        return Err(SignError::NoEmptyField(format!(
            "no empty signature field with name {} found",
            field_name
        ))
        .into());
    }

    // stage the form: an indirect form is rewritten in place, a direct one
    // is promoted to its own object so the update can land cleanly
    let form_id = match form_location {
        FormLocation::Indirect(id) => {
            writer.mark_update(id)?;
            id
        }
        FormLocation::DirectInRoot => {
            let id = writer.add_object(Object::Dictionary(form));
            writer.root_mut().set("AcroForm", Object::Reference(id));
            id
        }
    };

    let page = writer.page(on_page)?;
    let field_id = create_signature_field(writer, field_name, page, rect, None)?;

    match fields_location {
        FieldsLocation::IndirectArray(fields_id) => {
            writer.mark_update(fields_id)?;
            match writer.object_mut(fields_id) {
                Some(Object::Array(array)) => array.push(Object::Reference(field_id)),
                _ => {
                    return Err(
                        WriterError::Structure("staged /Fields is not an array".to_string())
                            .into(),
                    )
                }
            }
        }
        FieldsLocation::InForm => {
            let mut updated = fields_array;
            updated.push(Object::Reference(field_id));
            match writer.object_mut(form_id) {
                Some(Object::Dictionary(dict)) => dict.set("Fields", Object::Array(updated)),
                _ => {
                    return Err(WriterError::Structure(
                        "staged /AcroForm is not a dictionary".to_string(),
                    )
                    .into())
                }
            }
        }
    }

    if let Some(Object::Dictionary(dict)) = writer.object_mut(form_id) {
        dict.set_default("SigFlags", Object::Integer(sig_flags));
    }

    Ok((true, field_id))
}

/// Creates a signature field widget. Visible fields are registered as
/// annotations of their page.
pub(crate) fn create_signature_field(
    writer: &mut IncrementalWriter,
    field_name: &str,
    page: ObjectId,
    rect: Option<Rect>,
    sig_ref: Option<ObjectId>,
) -> PdfResult<ObjectId> {
    let mut flags = AnnotationFlags::PRINT;
    if sig_ref.is_some() {
        flags |= AnnotationFlags::LOCKED;
    }

    let mut field = PdfDictionary::new();
    field.set("FT", Object::Name(PdfName::new_unchecked("Sig")));
    field.set("T", Object::String(PdfString::literal(field_name)));
    field.set("Type", Object::Name(PdfName::new_unchecked("Annot")));
    field.set("Subtype", Object::Name(PdfName::new_unchecked("Widget")));
    field.set("F", Object::Integer(flags.bits() as i64));
    field.set("P", Object::Reference(page));
    let corners: Vec<f64> = match rect {
        Some(r) => vec![r.x1, r.y1, r.x2, r.y2],
        None => vec![0.0; 4],
    };
    field.set("Rect", corners.into_iter().collect::<PdfArray>());
    if let Some(value) = sig_ref {
        field.set("V", Object::Reference(value));
    }

    let field_id = writer.add_object(Object::Dictionary(field));
    if rect.is_some_and(|r| !r.is_degenerate()) {
        writer.register_annotation(page, field_id)?;
    }
    Ok(field_id)
}

/// Binds a field to a signature dictionary: sets /V and locks the widget.
pub(crate) fn fill_field_value(
    writer: &mut IncrementalWriter,
    field_ref: ObjectId,
    sig_ref: ObjectId,
) -> PdfResult<()> {
    writer.mark_update(field_ref)?;
    match writer.object_mut(field_ref) {
        Some(Object::Dictionary(field)) => {
            field.set("V", Object::Reference(sig_ref));
            let flags = AnnotationFlags::from_bits_retain(
                field.get_integer("F").unwrap_or(0) as u32,
            ) | AnnotationFlags::PRINT
                | AnnotationFlags::LOCKED;
            field.set("F", Object::Integer(flags.bits() as i64));
            Ok(())
        }
        _ => Err(WriterError::Structure("signature field is not a dictionary".to_string()).into()),
    }
}

/// Reads a field's /Rect. Missing or malformed boxes count as degenerate.
pub(crate) fn field_rect(writer: &IncrementalWriter, field_ref: ObjectId) -> PdfResult<Rect> {
    let field = writer.resolve_id(field_ref)?;
    let Some(field) = field.as_dictionary() else {
        return Ok(Rect::default());
    };
    let Some(Object::Array(corners)) = field.get("Rect") else {
        return Ok(Rect::default());
    };
    let mut values = [0.0f64; 4];
    for (slot, value) in values.iter_mut().zip(corners.iter()) {
        *slot = value.as_real().unwrap_or(0.0);
    }
    if corners.len() < 4 {
        return Ok(Rect::default());
    }
    Ok(Rect::new(values[0], values[1], values[2], values[3]))
}

/// Installs the appearance dictionary of a visible field, clearing any
/// stale appearance-state selector.
pub(crate) fn set_field_appearance(
    writer: &mut IncrementalWriter,
    field_ref: ObjectId,
    appearance: ObjectId,
) -> PdfResult<()> {
    match writer.object_mut(field_ref) {
        Some(Object::Dictionary(field)) => {
            let mut ap = PdfDictionary::new();
            ap.set("N", Object::Reference(appearance));
            field.set("AP", Object::Dictionary(ap));
            field.remove("AS");
            Ok(())
        }
        _ => Err(WriterError::Structure("signature field is not a dictionary".to_string()).into()),
    }
}

/// Pre-places empty signature fields and returns the updated document.
///
/// Fails with a conflict if any of the requested names already exists.
pub fn append_signature_fields(
    writer: &mut IncrementalWriter,
    specs: &[SigFieldSpec],
) -> PdfResult<Vec<u8>> {
    for spec in specs {
        let (created, _) =
            prepare_sig_field(writer, &spec.field_name, false, false, spec.rect, spec.on_page)?;
        if !created {
            return Err(SignError::FieldConflict(format!(
                "signature field with name {} already exists",
                spec.field_name
            ))
            .into());
        }
    }
    writer.write()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::parser::test_support::minimal_pdf;

    fn writer() -> IncrementalWriter {
        let reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
        IncrementalWriter::new(reader).unwrap()
    }

    #[test]
    fn test_create_field_in_document_without_form() {
        let mut w = writer();
        let (created, field_ref) =
            prepare_sig_field(&mut w, "Sig1", false, true, None, 0).unwrap();
        assert!(created);

        let bytes = w.write().unwrap();
        let reader = PdfReader::from_bytes(bytes).unwrap();
        let fields = enumerate_sig_fields(&reader, FieldStatus::Any).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "Sig1");
        assert!(!fields[0].filled);
        assert_eq!(fields[0].reference, field_ref);

        // locking requested, so SigFlags = 3
        let root = reader.catalog().unwrap();
        let form = reader.resolve_ref(root.get("AcroForm").unwrap()).unwrap();
        assert_eq!(
            form.as_dictionary().unwrap().get_integer("SigFlags"),
            Some(3)
        );
    }

    #[test]
    fn test_reuse_existing_empty_field() {
        let mut w = writer();
        prepare_sig_field(&mut w, "Sig1", false, true, None, 0).unwrap();
        let bytes = w.write().unwrap();

        let reader = PdfReader::from_bytes(bytes).unwrap();
        let mut w2 = IncrementalWriter::new(reader).unwrap();
        let (created, _) = prepare_sig_field(&mut w2, "Sig1", false, true, None, 0).unwrap();
        assert!(!created);
    }

    #[test]
    fn test_existing_fields_only_requires_a_field() {
        let mut w = writer();
        let result = prepare_sig_field(&mut w, "Nope", true, true, None, 0);
        assert!(matches!(
            result,
            Err(PdfError::Sign(SignError::NoEmptyField(_)))
        ));
    }

    #[test]
    fn test_filled_field_conflicts() {
        let mut w = writer();
        let (_, field_ref) = prepare_sig_field(&mut w, "Sig1", false, true, None, 0).unwrap();
        // fill it with a dummy value
        fill_field_value(&mut w, field_ref, ObjectId::new(999)).unwrap();
        let bytes = w.write().unwrap();

        let reader = PdfReader::from_bytes(bytes).unwrap();
        let mut w2 = IncrementalWriter::new(reader).unwrap();
        let result = prepare_sig_field(&mut w2, "Sig1", false, true, None, 0);
        assert!(matches!(
            result,
            Err(PdfError::Sign(SignError::FieldConflict(_)))
        ));
    }

    #[test]
    fn test_fill_field_value_locks_widget() {
        let mut w = writer();
        let (_, field_ref) = prepare_sig_field(&mut w, "Sig1", false, true, None, 0).unwrap();
        fill_field_value(&mut w, field_ref, ObjectId::new(100)).unwrap();
        let field = w.resolve_id(field_ref).unwrap();
        let flags = field.as_dictionary().unwrap().get_integer("F").unwrap();
        let flags = AnnotationFlags::from_bits_retain(flags as u32);
        assert!(flags.contains(AnnotationFlags::PRINT));
        assert!(flags.contains(AnnotationFlags::LOCKED));
    }

    #[test]
    fn test_visible_field_registers_annotation() {
        let mut w = writer();
        let rect = Rect::new(100.0, 700.0, 300.0, 760.0);
        let (_, field_ref) =
            prepare_sig_field(&mut w, "Sig1", false, true, Some(rect), 0).unwrap();
        assert_eq!(field_rect(&w, field_ref).unwrap(), rect);

        let page = w.page(0).unwrap();
        let page_obj = w.resolve_id(page).unwrap();
        let annots = page_obj
            .as_dictionary()
            .unwrap()
            .get("Annots")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(annots.get(0), Some(&Object::Reference(field_ref)));
    }

    #[test]
    fn test_append_signature_fields_rejects_duplicates() {
        let mut w = writer();
        let specs = [SigFieldSpec::new("SigA"), SigFieldSpec::new("SigA")];
        let result = append_signature_fields(&mut w, &specs);
        assert!(matches!(
            result,
            Err(PdfError::Sign(SignError::FieldConflict(_)))
        ));
    }

    #[test]
    fn test_append_signature_fields_roundtrip() {
        let mut w = writer();
        let specs = [
            SigFieldSpec::new("SigA"),
            SigFieldSpec::new("SigB").rect(Rect::new(10.0, 10.0, 200.0, 60.0)),
        ];
        let bytes = append_signature_fields(&mut w, &specs).unwrap();
        let reader = PdfReader::from_bytes(bytes).unwrap();
        let fields = enumerate_sig_fields(&reader, FieldStatus::Empty).unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["SigA", "SigB"]);
        // without locking, SigFlags defaults to 1
        let root = reader.catalog().unwrap();
        let form = reader.resolve_ref(root.get("AcroForm").unwrap()).unwrap();
        assert_eq!(
            form.as_dictionary().unwrap().get_integer("SigFlags"),
            Some(1)
        );
    }
}
