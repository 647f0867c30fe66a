//! The PDF signature dictionary.

use super::pdf_date;
use super::placeholder::{ByteRangePlaceholder, ContentsPlaceholder};
use crate::object::PdfString;
use crate::types::ObjectId;
use crate::writer::Serializer;
use chrono::{DateTime, FixedOffset};

/// A `/Type /Sig` dictionary with placeholder `/ByteRange` and `/Contents`
/// entries.
///
/// The dictionary is serialized with a custom writer so the placeholders
/// can record their byte offsets inside the finished update; everything
/// else is plain dictionary data.
#[derive(Debug)]
pub struct SignatureObject {
    timestamp: DateTime<FixedOffset>,
    name: Option<String>,
    location: Option<String>,
    reason: Option<String>,
    certification_reference: Option<ObjectId>,
    pub(crate) contents: ContentsPlaceholder,
    pub(crate) byte_range: ByteRangePlaceholder,
}

impl SignatureObject {
    /// Creates a signature dictionary.
    ///
    /// `bytes_reserved` is the number of hex characters reserved for the
    /// signature blob; the caller normally sizes it with a dry run.
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        name: Option<String>,
        location: Option<String>,
        reason: Option<String>,
        bytes_reserved: Option<usize>,
    ) -> Self {
        Self {
            timestamp,
            name,
            location,
            reason,
            certification_reference: None,
            contents: ContentsPlaceholder::new(bytes_reserved),
            byte_range: ByteRangePlaceholder::new(),
        }
    }

    /// Attaches the `/Reference` entry of a certification signature
    /// (a one-element array pointing at a SigRef dictionary).
    pub(crate) fn set_certification_reference(&mut self, sig_ref: ObjectId) {
        self.certification_reference = Some(sig_ref);
    }

    /// Returns the reserved `/Contents` payload size in hex characters.
    pub fn bytes_reserved(&self) -> usize {
        self.contents.bytes_reserved()
    }

    /// Serializes the dictionary, letting both placeholders record their
    /// offsets inside `out`.
    pub(crate) fn write(&mut self, out: &mut Serializer) {
        out.write_str("<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /adbe.pkcs7.detached /M ");
        out.write_str(&PdfString::literal(pdf_date(&self.timestamp)).to_pdf_string());
        if let Some(name) = &self.name {
            out.write_str(" /Name ");
            out.write_str(&PdfString::literal(name.clone()).to_pdf_string());
        }
        if let Some(location) = &self.location {
            out.write_str(" /Location ");
            out.write_str(&PdfString::literal(location.clone()).to_pdf_string());
        }
        if let Some(reason) = &self.reason {
            out.write_str(" /Reason ");
            out.write_str(&PdfString::literal(reason.clone()).to_pdf_string());
        }
        if let Some(sig_ref) = self.certification_reference {
            out.write_str(" /Reference [");
            out.write_str(&sig_ref.reference_string());
            out.write_str("]");
        }
        out.write_str(" /ByteRange ");
        self.byte_range.write(out);
        out.write_str(" /Contents ");
        self.contents.write(out);
        out.write_str(" >>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_timestamp() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 45)
            .unwrap()
    }

    #[test]
    fn test_serialized_dictionary_shape() {
        let mut sig = SignatureObject::new(
            fixed_timestamp(),
            Some("Jane Doe".to_string()),
            None,
            Some("Approval".to_string()),
            Some(64),
        );
        let mut ser = Serializer::new();
        sig.write(&mut ser);
        let text = String::from_utf8(ser.into_bytes()).unwrap();

        assert!(text.starts_with("<< /Type /Sig /Filter /Adobe.PPKLite"));
        assert!(text.contains("/SubFilter /adbe.pkcs7.detached"));
        assert!(text.contains("/M (D:20240301123045Z)"));
        assert!(text.contains("/Name (Jane Doe)"));
        assert!(text.contains("/Reason (Approval)"));
        assert!(!text.contains("/Location"));
        assert!(text.contains("/ByteRange [ 00000000 00000000 00000000 00000000 ]"));
        assert!(text.contains(&format!("/Contents <{}>", "0".repeat(64))));
    }

    #[test]
    fn test_placeholder_offsets_recorded() {
        let mut sig = SignatureObject::new(fixed_timestamp(), None, None, None, Some(32));
        let mut ser = Serializer::new();
        ser.write_str("leading bytes ");
        sig.write(&mut ser);
        let buffer = ser.into_bytes();

        let (start, end) = sig.contents.span().unwrap();
        assert_eq!(buffer[start], b'<');
        assert_eq!(buffer[end - 1], b'>');
        assert_eq!(end - start, 34);
    }

    #[test]
    fn test_certification_reference_entry() {
        let mut sig = SignatureObject::new(fixed_timestamp(), None, None, None, Some(16));
        sig.set_certification_reference(ObjectId::new(42));
        let mut ser = Serializer::new();
        sig.write(&mut ser);
        let text = String::from_utf8(ser.into_bytes()).unwrap();
        assert!(text.contains("/Reference [42 0 R]"));
    }
}
