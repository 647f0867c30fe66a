//! Reading of existing PDF documents.
//!
//! This reader covers what the signing path needs: the object graph behind
//! the document catalog, classic cross-reference tables (including `/Prev`
//! chains of earlier incremental updates), and byte-exact access to the
//! serialized stream. Stream data is carried through as raw bytes and is
//! never decompressed. Encrypted documents are rejected.

mod lexer;
mod objects;
mod trailer;
mod xref;

pub use trailer::Trailer;
pub use xref::{XrefEntry, XrefTable};

use crate::error::{ParserError, PdfResult};
use crate::object::{Object, PdfDictionary, PdfStream};
use crate::types::ObjectId;
use lexer::skip_ws;
use objects::{parse_indirect_header, parse_object};
use std::fs;
use std::path::Path;
use xref::{find_startxref, parse_xref_section};

/// Maximum depth of reference chains followed by [`PdfReader::resolve_ref`].
const MAX_REFERENCE_DEPTH: usize = 32;

/// A read-only view of a parsed PDF document.
#[derive(Debug)]
pub struct PdfReader {
    data: Vec<u8>,
    version: String,
    xref: XrefTable,
    trailer: Trailer,
    last_xref_offset: u64,
}

impl PdfReader {
    /// Opens a PDF file for reading.
    pub fn from_file(path: impl AsRef<Path>) -> PdfResult<Self> {
        let data = fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Opens a PDF from bytes.
    pub fn from_bytes(data: Vec<u8>) -> PdfResult<Self> {
        let version = Self::parse_header(&data)?;
        let last_xref_offset = find_startxref(&data)?;

        let mut xref = XrefTable::new();
        let mut newest_trailer: Option<Trailer> = None;
        let mut next_offset = Some(last_xref_offset);
        let mut visited = Vec::new();

        while let Some(offset) = next_offset {
            if visited.contains(&offset) {
                log::warn!("cyclic /Prev chain at xref offset {}", offset);
                break;
            }
            visited.push(offset);

            let (entries, trailer_dict) = parse_xref_section(&data, offset)?;
            for (number, entry) in entries {
                xref.insert_if_absent(number, entry);
            }
            let trailer = Trailer::from_dictionary(&trailer_dict)?;
            next_offset = trailer.prev;
            if newest_trailer.is_none() {
                newest_trailer = Some(trailer);
            }
        }

        let trailer = newest_trailer.ok_or(ParserError::InvalidTrailer)?;
        if trailer.encrypted {
            return Err(ParserError::EncryptedPdf.into());
        }

        Ok(Self {
            data,
            version,
            xref,
            trailer,
            last_xref_offset,
        })
    }

    fn parse_header(data: &[u8]) -> Result<String, ParserError> {
        if !data.starts_with(b"%PDF-") {
            return Err(ParserError::InvalidHeader);
        }
        let rest = &data[5..];
        let end = rest
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .ok_or(ParserError::InvalidHeader)?;
        let version = std::str::from_utf8(&rest[..end])
            .map_err(|_| ParserError::InvalidHeader)?
            .trim()
            .to_string();
        if version.is_empty() {
            return Err(ParserError::InvalidHeader);
        }
        Ok(version)
    }

    /// Returns the PDF version string from the header (e.g. "1.7").
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the raw serialized bytes of the document.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the decoded trailer of the newest xref section.
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// Returns the byte offset of the newest xref section, which an
    /// incremental update records as its /Prev.
    pub fn last_xref_offset(&self) -> u64 {
        self.last_xref_offset
    }

    /// Returns the document catalog dictionary.
    pub fn catalog(&self) -> PdfResult<PdfDictionary> {
        match self.resolve(self.trailer.root)? {
            Object::Dictionary(dict) => Ok(dict),
            _ => Err(ParserError::InvalidTrailer.into()),
        }
    }

    /// Parses the object with the given id from its recorded offset.
    pub fn resolve(&self, id: ObjectId) -> PdfResult<Object> {
        let entry = self
            .xref
            .get(id.number)
            .ok_or(ParserError::ObjectNotFound(id.number, id.generation))?;
        let offset = entry
            .offset()
            .ok_or(ParserError::ObjectNotFound(id.number, id.generation))?;
        self.parse_object_at(offset, Some(id))
    }

    /// Follows reference chains until a direct object is reached.
    pub fn resolve_ref(&self, object: &Object) -> PdfResult<Object> {
        let mut current = object.clone();
        for _ in 0..MAX_REFERENCE_DEPTH {
            match current {
                Object::Reference(id) => current = self.resolve(id)?,
                direct => return Ok(direct),
            }
        }
        Err(ParserError::ParseFailed(0, "reference chain too deep".to_string()).into())
    }

    /// Parses an indirect object definition at a byte offset.
    fn parse_object_at(&self, offset: u64, expect: Option<ObjectId>) -> PdfResult<Object> {
        let input = self
            .data
            .get(offset as usize..)
            .ok_or(ParserError::UnexpectedEof)?;

        let (body, id) = parse_indirect_header(input)
            .map_err(|_| ParserError::ParseFailed(offset, "invalid object header".to_string()))?;
        if let Some(expected) = expect {
            if id != expected {
                log::warn!(
                    "object at offset {} declares id {:?}, expected {:?}",
                    offset,
                    id,
                    expected
                );
            }
        }

        let (rest, object) = parse_object(body)
            .map_err(|_| ParserError::ParseFailed(offset, "invalid object body".to_string()))?;

        // a dictionary followed by the stream keyword is a stream object
        let (rest, _) = skip_ws(rest).map_err(|_| ParserError::UnexpectedEof)?;
        if rest.starts_with(b"stream") {
            let dict = match object {
                Object::Dictionary(dict) => dict,
                _ => {
                    return Err(
                        ParserError::ParseFailed(offset, "stream without dictionary".to_string())
                            .into(),
                    )
                }
            };
            let stream = self.parse_stream_body(&dict, &rest[b"stream".len()..], offset)?;
            return Ok(Object::Stream(stream));
        }

        Ok(object)
    }

    /// Slices out raw stream data following a `stream` keyword.
    fn parse_stream_body(
        &self,
        dict: &PdfDictionary,
        after_keyword: &[u8],
        offset: u64,
    ) -> PdfResult<PdfStream> {
        // EOL after the keyword: CRLF or LF
        let data_start = if after_keyword.starts_with(b"\r\n") {
            2
        } else if after_keyword.starts_with(b"\n") {
            1
        } else {
            0
        };
        let body = &after_keyword[data_start..];

        let length = match dict.get("Length") {
            Some(Object::Integer(n)) if *n >= 0 => Some(*n as usize),
            Some(Object::Reference(id)) => self.resolve(*id)?.as_integer().map(|n| n as usize),
            _ => None,
        };

        let data = match length {
            Some(len) if len <= body.len() => body[..len].to_vec(),
            _ => {
                // recover by scanning for the endstream keyword
                log::warn!("stream at offset {} has an unusable Length entry", offset);
                let end = body
                    .windows(b"endstream".len())
                    .position(|w| w == b"endstream")
                    .ok_or(ParserError::ParseFailed(
                        offset,
                        "unterminated stream".to_string(),
                    ))?;
                let trimmed = xref::trim_trailing_ws(&body[..end]);
                trimmed.to_vec()
            }
        };

        Ok(PdfStream::from_raw(dict.clone(), data))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    /// A tiny but complete one-page document.
    pub(crate) fn minimal_pdf() -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n");
        let mut offsets = Vec::new();
        let bodies: [&[u8]; 4] = [
            b"<< /Type /Catalog /Pages 2 0 R >>",
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
            b"<< /Length 8 >>\nstream\nq 1 0 0 Q\nendstream",
        ];
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        let xref_offset = out.len();
        out.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
        for off in &offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\n");
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::minimal_pdf;
    use super::*;

    #[test]
    fn test_read_minimal_pdf() {
        let reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
        assert_eq!(reader.version(), "1.7");
        assert_eq!(reader.trailer().size, 5);

        let catalog = reader.catalog().unwrap();
        assert_eq!(catalog.get_name("Type"), Some("Catalog"));

        let pages = reader
            .resolve_ref(catalog.get("Pages").unwrap())
            .unwrap();
        let pages = pages.as_dictionary().unwrap().clone();
        assert_eq!(pages.get_integer("Count"), Some(1));
    }

    #[test]
    fn test_resolve_stream() {
        let reader = PdfReader::from_bytes(minimal_pdf()).unwrap();
        let content = reader.resolve(ObjectId::new(4)).unwrap();
        match content {
            Object::Stream(stream) => assert_eq!(stream.data(), b"q 1 0 0 "),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_header() {
        let result = PdfReader::from_bytes(b"not a pdf".to_vec());
        assert!(result.is_err());
    }

    #[test]
    fn test_encrypted_rejected() {
        let data = minimal_pdf();
        let needle = b"<< /Size 5 /Root 1 0 R >>".as_slice();
        let replacement = b"<< /Size 5 /Root 1 0 R /Encrypt 9 0 R >>".as_slice();
        let pos = data
            .windows(needle.len())
            .position(|w| w == needle)
            .expect("trailer dictionary not found");
        let mut patched = Vec::with_capacity(data.len() - needle.len() + replacement.len());
        patched.extend_from_slice(&data[..pos]);
        patched.extend_from_slice(replacement);
        patched.extend_from_slice(&data[pos + needle.len()..]);
        let data = patched;
        assert!(matches!(
            PdfReader::from_bytes(data),
            Err(crate::error::PdfError::Parser(ParserError::EncryptedPdf))
        ));
    }
}
