//! Trailer dictionary interpretation.

use crate::error::ParserError;
use crate::object::{Object, PdfDictionary};
use crate::types::ObjectId;

/// Decoded trailer information.
#[derive(Debug, Clone)]
pub struct Trailer {
    /// Total number of entries in the file's cross-reference table
    /// (one more than the highest object number).
    pub size: u32,
    /// Reference to the document catalog.
    pub root: ObjectId,
    /// Reference to the document information dictionary.
    pub info: Option<ObjectId>,
    /// Byte offset of the previous xref section, if any.
    pub prev: Option<u64>,
    /// Whether the document carries an /Encrypt entry.
    pub encrypted: bool,
}

impl Trailer {
    /// Interprets a parsed trailer dictionary.
    pub fn from_dictionary(dict: &PdfDictionary) -> Result<Self, ParserError> {
        let size = dict
            .get_integer("Size")
            .filter(|&s| s > 0 && s <= u32::MAX as i64)
            .ok_or(ParserError::InvalidTrailer)? as u32;

        let root = match dict.get("Root") {
            Some(Object::Reference(id)) => *id,
            _ => return Err(ParserError::InvalidTrailer),
        };

        let info = match dict.get("Info") {
            Some(Object::Reference(id)) => Some(*id),
            _ => None,
        };

        let prev = dict
            .get_integer("Prev")
            .filter(|&p| p >= 0)
            .map(|p| p as u64);

        Ok(Self {
            size,
            root,
            info,
            prev,
            encrypted: dict.contains_key("Encrypt"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trailer_dict() -> PdfDictionary {
        let mut dict = PdfDictionary::new();
        dict.set("Size", Object::Integer(7));
        dict.set("Root", Object::Reference(ObjectId::new(1)));
        dict
    }

    #[test]
    fn test_from_dictionary() {
        let trailer = Trailer::from_dictionary(&trailer_dict()).unwrap();
        assert_eq!(trailer.size, 7);
        assert_eq!(trailer.root, ObjectId::new(1));
        assert!(trailer.info.is_none());
        assert!(trailer.prev.is_none());
        assert!(!trailer.encrypted);
    }

    #[test]
    fn test_prev_and_encrypt() {
        let mut dict = trailer_dict();
        dict.set("Prev", Object::Integer(1234));
        dict.set("Encrypt", Object::Reference(ObjectId::new(9)));
        let trailer = Trailer::from_dictionary(&dict).unwrap();
        assert_eq!(trailer.prev, Some(1234));
        assert!(trailer.encrypted);
    }

    #[test]
    fn test_missing_root_is_invalid() {
        let mut dict = PdfDictionary::new();
        dict.set("Size", Object::Integer(3));
        assert!(Trailer::from_dictionary(&dict).is_err());
    }
}
