//! PDF Name object.

use crate::error::ObjectError;

/// A PDF name object (e.g., /Type, /Sig, /ByteRange).
///
/// Names in PDF start with a forward slash and can contain any characters
/// except whitespace and delimiters. Special characters are encoded using
/// the #xx hexadecimal notation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfName(String);

impl PdfName {
    /// Creates a new PDF name from a string.
    ///
    /// The input should not include the leading slash.
    pub fn new(name: impl Into<String>) -> Result<Self, ObjectError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ObjectError::InvalidName("Name cannot be empty".to_string()));
        }
        if name.contains('\0') {
            return Err(ObjectError::InvalidName(
                "Name cannot contain null bytes".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Creates a PDF name without validation (use for known-good names).
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the raw name without the leading slash.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Serializes the name to PDF format with proper escaping.
    ///
    /// Characters that need escaping (codes < 33, > 126, #, and delimiters)
    /// are encoded as #xx where xx is the hex code.
    pub fn to_pdf_string(&self) -> String {
        let mut result = String::with_capacity(self.0.len() + 10);
        result.push('/');

        for byte in self.0.bytes() {
            if Self::needs_escape(byte) {
                result.push('#');
                result.push_str(&format!("{:02X}", byte));
            } else {
                result.push(byte as char);
            }
        }

        result
    }

    /// Checks if a byte needs to be escaped in a PDF name.
    fn needs_escape(byte: u8) -> bool {
        !(33..=126).contains(&byte)
            || byte == b'#'
            || byte == b'/'
            || byte == b'%'
            || byte == b'('
            || byte == b')'
            || byte == b'<'
            || byte == b'>'
            || byte == b'['
            || byte == b']'
            || byte == b'{'
            || byte == b'}'
    }
}

impl PartialEq<str> for PdfName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PdfName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_name() {
        let name = PdfName::new("Type").unwrap();
        assert_eq!(name.to_pdf_string(), "/Type");
    }

    #[test]
    fn test_name_with_space() {
        let name = PdfName::new("Hello World").unwrap();
        assert_eq!(name.to_pdf_string(), "/Hello#20World");
    }

    #[test]
    fn test_name_with_hash() {
        let name = PdfName::new("Name#1").unwrap();
        assert_eq!(name.to_pdf_string(), "/Name#231");
    }

    #[test]
    fn test_empty_name_error() {
        assert!(PdfName::new("").is_err());
    }

    #[test]
    fn test_str_comparison() {
        let name = PdfName::new_unchecked("Sig");
        assert_eq!(name, "Sig");
    }
}
