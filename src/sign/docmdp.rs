//! DocMDP certification signatures.
//!
//! A certification signature carries a `/Reference` array with a SigRef
//! dictionary whose TransformParams pin the permitted modifications, and
//! the document catalog points back at the signature through
//! `/Perms/DocMDP` (ISO 32000 tables 252-254).

use super::DigestAlgorithm;
use crate::error::{PdfResult, WriterError};
use crate::object::{Object, PdfDictionary, PdfName};
use crate::types::ObjectId;
use crate::writer::IncrementalWriter;

/// Modification permission levels for DocMDP (ISO 32000 table 254).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocMdpPerm {
    /// No changes at all are permitted.
    NoChanges = 1,
    /// Form filling and signing are permitted.
    FillForms = 2,
    /// Form filling, signing and annotation are permitted.
    Annotate = 3,
}

/// Installs the certification entries for the staged signature object.
pub(crate) fn certification_setup(
    writer: &mut IncrementalWriter,
    sig_obj_ref: ObjectId,
    md_algorithm: DigestAlgorithm,
    permission_level: DocMdpPerm,
) -> PdfResult<()> {
    let mut transform_params = PdfDictionary::new();
    transform_params.set("Type", Object::Name(PdfName::new_unchecked("TransformParams")));
    transform_params.set("V", Object::Name(PdfName::new_unchecked("1.2")));
    transform_params.set("P", Object::Integer(permission_level as i64));
    let tp_ref = writer.add_object(Object::Dictionary(transform_params));

    // not to be confused with the indirect reference *to* the signature
    // object: this dictionary sits inside its /Reference entry
    let mut sigref = PdfDictionary::new();
    sigref.set("Type", Object::Name(PdfName::new_unchecked("SigRef")));
    sigref.set(
        "TransformMethod",
        Object::Name(PdfName::new_unchecked("DocMDP")),
    );
    sigref.set(
        "DigestMethod",
        Object::Name(PdfName::new_unchecked(md_algorithm.name().to_uppercase())),
    );
    sigref.set("TransformParams", Object::Reference(tp_ref));
    let sigref_ref = writer.add_object(Object::Dictionary(sigref));

    writer
        .signature_object_mut(sig_obj_ref)
        .ok_or_else(|| {
            WriterError::Structure("certification target is not a staged signature".to_string())
        })?
        .set_certification_reference(sigref_ref);

    // register the /Perms/DocMDP entry in the catalog
    match writer.root().get("Perms").cloned() {
        Some(Object::Reference(perms_id)) => {
            writer.mark_update(perms_id)?;
            match writer.object_mut(perms_id) {
                Some(Object::Dictionary(perms)) => {
                    perms.set("DocMDP", Object::Reference(sig_obj_ref));
                }
                _ => {
                    return Err(WriterError::Structure(
                        "/Perms is not a dictionary".to_string(),
                    )
                    .into())
                }
            }
        }
        Some(Object::Dictionary(mut perms)) => {
            perms.set("DocMDP", Object::Reference(sig_obj_ref));
            writer.root_mut().set("Perms", Object::Dictionary(perms));
        }
        Some(_) => {
            return Err(WriterError::Structure("/Perms is not a dictionary".to_string()).into())
        }
        None => {
            let mut perms = PdfDictionary::new();
            perms.set("DocMDP", Object::Reference(sig_obj_ref));
            writer.root_mut().set("Perms", Object::Dictionary(perms));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::fixed_timestamp;
    use super::super::SignatureObject;
    use super::*;
    use crate::parser::test_support::minimal_pdf;
    use crate::parser::PdfReader;

    #[test]
    fn test_certification_entries() {
        let reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
        let mut writer = IncrementalWriter::new(reader).unwrap();
        let sig = SignatureObject::new(fixed_timestamp(), None, None, None, Some(64));
        let sig_ref = writer.add_signature_object(sig);

        certification_setup(
            &mut writer,
            sig_ref,
            DigestAlgorithm::Sha256,
            DocMdpPerm::NoChanges,
        )
        .unwrap();

        let bytes = writer.write().unwrap();
        let reader = PdfReader::from_bytes(bytes).unwrap();

        // catalog gained /Perms/DocMDP pointing at the signature
        let root = reader.catalog().unwrap();
        let perms = root.get("Perms").unwrap().as_dictionary().unwrap().clone();
        assert_eq!(
            perms.get("DocMDP"),
            Some(&Object::Reference(sig_ref))
        );

        // the signature dictionary carries the /Reference array
        let sig_obj = reader.resolve(sig_ref).unwrap();
        let sig_dict = sig_obj.as_dictionary().unwrap();
        let reference = sig_dict.get("Reference").unwrap().as_array().unwrap().clone();
        assert_eq!(reference.len(), 1);
        let sigref = reader.resolve_ref(reference.get(0).unwrap()).unwrap();
        let sigref = sigref.as_dictionary().unwrap();
        assert_eq!(sigref.get_name("TransformMethod"), Some("DocMDP"));
        assert_eq!(sigref.get_name("DigestMethod"), Some("SHA256"));

        let params = reader
            .resolve_ref(sigref.get("TransformParams").unwrap())
            .unwrap();
        let params = params.as_dictionary().unwrap();
        assert_eq!(params.get_name("V"), Some("1.2"));
        assert_eq!(params.get_integer("P"), Some(1));
    }

    #[test]
    fn test_permission_values() {
        assert_eq!(DocMdpPerm::NoChanges as i64, 1);
        assert_eq!(DocMdpPerm::FillForms as i64, 2);
        assert_eq!(DocMdpPerm::Annotate as i64, 3);
    }
}
