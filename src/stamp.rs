//! Default appearance stamp for visible signature fields.

use crate::content::{ContentBuilder, TextBuilder};
use crate::error::{PdfResult, SignError};
use crate::object::{Object, PdfArray, PdfDictionary, PdfName, PdfStream};
use crate::types::ObjectId;
use crate::writer::IncrementalWriter;

/// A two-line text stamp naming the signer and the signing time.
#[derive(Debug, Clone)]
pub struct SignatureStamp {
    signer: String,
    timestamp_text: String,
}

impl SignatureStamp {
    /// Creates a stamp for the given signer name and formatted timestamp.
    pub fn new(signer: impl Into<String>, timestamp_text: impl Into<String>) -> Self {
        Self {
            signer: signer.into(),
            timestamp_text: timestamp_text.into(),
        }
    }

    /// Renders the stamp as a Form XObject sized to the field box and
    /// returns the reference to the appearance stream.
    pub(crate) fn render(
        &self,
        writer: &mut IncrementalWriter,
        width: f64,
        height: f64,
    ) -> PdfResult<ObjectId> {
        if width <= 0.0 || height <= 0.0 {
            return Err(SignError::Appearance(format!(
                "cannot render a stamp into a {}x{} box",
                width, height
            ))
            .into());
        }

        let mut font = PdfDictionary::new();
        font.set("Type", Object::Name(PdfName::new_unchecked("Font")));
        font.set("Subtype", Object::Name(PdfName::new_unchecked("Type1")));
        font.set("BaseFont", Object::Name(PdfName::new_unchecked("Helvetica")));
        font.set(
            "Encoding",
            Object::Name(PdfName::new_unchecked("WinAnsiEncoding")),
        );
        let font_ref = writer.add_object(Object::Dictionary(font));

        // two lines of text, sized to fit the box height
        let font_size = (height / 3.0).min(10.0).max(2.0);
        let leading = font_size * 1.2;
        let top = height - font_size - 2.0;

        let text = TextBuilder::new()
            .font("F1", font_size)
            .leading(leading)
            .move_to(2.0, top)
            .show(format!("Digitally signed by {}.", self.signer))
            .next_line_show(format!("Timestamp: {}.", self.timestamp_text));
        let content = ContentBuilder::new()
            .save_state()
            .text_block(text)
            .restore_state()
            .build_bytes();

        let mut font_resources = PdfDictionary::new();
        font_resources.set("F1", Object::Reference(font_ref));
        let mut resources = PdfDictionary::new();
        resources.set("Font", Object::Dictionary(font_resources));

        let mut dict = PdfDictionary::new();
        dict.set("Type", Object::Name(PdfName::new_unchecked("XObject")));
        dict.set("Subtype", Object::Name(PdfName::new_unchecked("Form")));
        dict.set("FormType", Object::Integer(1));
        dict.set(
            "BBox",
            vec![0.0, 0.0, width, height]
                .into_iter()
                .collect::<PdfArray>(),
        );
        dict.set("Resources", Object::Dictionary(resources));

        let stream = PdfStream::new(dict, content);
        Ok(writer.add_object(Object::Stream(stream)))
    }
}
