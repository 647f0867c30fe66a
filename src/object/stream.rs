//! PDF Stream object.

use super::{Object, PdfDictionary};

/// A PDF stream: a dictionary followed by raw binary data.
///
/// Streams read from an existing document are carried through untouched;
/// the signing path never inflates or re-encodes them. Newly created
/// streams (appearance forms) are written uncompressed.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    /// The stream dictionary. The Length entry is maintained here.
    pub dictionary: PdfDictionary,
    data: Vec<u8>,
}

impl PdfStream {
    /// Creates a stream from a dictionary and data, setting the Length
    /// entry to match.
    pub fn new(mut dictionary: PdfDictionary, data: Vec<u8>) -> Self {
        dictionary.set("Length", Object::Integer(data.len() as i64));
        Self { dictionary, data }
    }

    /// Creates a stream from already-consistent parts, without touching
    /// the Length entry. Used when carrying parsed streams through.
    pub fn from_raw(dictionary: PdfDictionary, data: Vec<u8>) -> Self {
        Self { dictionary, data }
    }

    /// Returns the raw stream data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
