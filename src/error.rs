//! Error types for the pdfsig library.

use thiserror::Error;

/// The main error type for PDF signing operations.
#[derive(Debug, Error)]
pub enum PdfError {
    /// Error during object serialization.
    #[error("Object error: {0}")]
    Object(#[from] ObjectError),

    /// Error during PDF parsing.
    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    /// Error while writing an incremental update.
    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    /// Error on the signing path.
    #[error("Signing error: {0}")]
    Sign(#[from] SignError),

    /// Structural error while verifying a signature.
    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),

    /// Error while obtaining an RFC 3161 timestamp.
    #[error("Timestamp error: {0}")]
    Timestamp(#[from] TimestampError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF object handling.
#[derive(Debug, Error)]
pub enum ObjectError {
    /// Invalid PDF name (contains invalid characters).
    #[error("Invalid PDF name: {0}")]
    InvalidName(String),

    /// Invalid object reference.
    #[error("Invalid object reference: ({0}, {1})")]
    InvalidReference(u32, u16),

    /// Stream without a usable Length entry.
    #[error("Stream missing required Length key")]
    StreamMissingLength,
}

/// Errors related to PDF parsing.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Failed to find PDF header.
    #[error("Invalid PDF: missing or invalid header")]
    InvalidHeader,

    /// Failed to find trailer.
    #[error("Invalid PDF: missing or invalid trailer")]
    InvalidTrailer,

    /// Failed to parse xref table.
    #[error("Invalid PDF: failed to parse xref table")]
    InvalidXref,

    /// Object not found.
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Failed to parse object.
    #[error("Failed to parse object at offset {0}: {1}")]
    ParseFailed(u64, String),

    /// Unexpected end of file.
    #[error("Unexpected end of file")]
    UnexpectedEof,

    /// Encrypted PDFs are not supported on the signing path.
    #[error("Encrypted PDF documents are not supported")]
    EncryptedPdf,

    /// Unsupported PDF feature.
    #[error("Unsupported PDF feature: {0}")]
    UnsupportedFeature(String),
}

/// Errors related to writing incremental updates.
#[derive(Debug, Error)]
pub enum WriterError {
    /// Failed to write PDF structure.
    #[error("Failed to write PDF structure: {0}")]
    Structure(String),

    /// A placeholder was used out of order or more than once.
    #[error("Placeholder error: {0}")]
    Placeholder(String),

    /// Input too large for fixed-width offset fields.
    #[error("File size {0} exceeds the supported maximum of {1} bytes")]
    FileTooLarge(u64, u64),
}

/// Errors on the signing path. All of these are fatal to the signing call;
/// no partial output is produced.
#[derive(Debug, Error)]
pub enum SignError {
    /// The encoded signature did not fit the reserved placeholder. Retry
    /// with a larger reservation.
    #[error("Signature of {encoded} bytes exceeds the {reserved} bytes reserved for it")]
    ReservationExceeded { encoded: usize, reserved: usize },

    /// A field with the requested name exists but cannot be signed.
    #[error("Field conflict: {0}")]
    FieldConflict(String),

    /// No empty signature field was found to populate.
    #[error("No empty signature field found: {0}")]
    NoEmptyField(String),

    /// More than one empty signature field matched; a field name is needed.
    #[error("Several empty signature fields found, specify a field name; candidates: {}", .0.join(", "))]
    AmbiguousField(Vec<String>),

    /// The signer's mechanism is not in the supported set.
    #[error("Unsupported signature mechanism: {0}")]
    UnsupportedMechanism(String),

    /// Failed to load key material.
    #[error("Failed to load private key: {0}")]
    KeyLoad(String),

    /// Failed to load certificate material.
    #[error("Failed to load certificate: {0}")]
    CertificateLoad(String),

    /// A visible field's appearance could not be rendered.
    #[error("Failed to render signature appearance: {0}")]
    Appearance(String),

    /// The raw signature primitive failed.
    #[error("Signing operation failed: {0}")]
    Crypto(String),

    /// Timestamping failed; the whole signing call is aborted.
    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    /// DER encoding of the CMS structure failed.
    #[error("CMS encoding error: {0}")]
    Asn1(#[from] der::Error),
}

/// Structural errors while verifying a signature. A cryptographic mismatch
/// is reported through the returned status, never through these.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The signature dictionary or its CMS payload is not well formed.
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// The embedded mechanism is not in the supported set.
    #[error("Unsupported signature mechanism: {0}")]
    UnsupportedMechanism(String),

    /// Verification could not be carried out at all.
    #[error("Verification could not execute: {0}")]
    CryptoFailure(String),

    /// DER decoding of the CMS payload failed.
    #[error("CMS decoding error: {0}")]
    Asn1(#[from] der::Error),
}

/// Errors while obtaining an RFC 3161 timestamp.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// The TSA answered with a status other than granted.
    #[error("Timestamp server refused the request: statusString \"{status_string}\", failInfo \"{fail_info}\"")]
    Rejected {
        status: u32,
        status_string: String,
        fail_info: String,
    },

    /// The TSA reply was not a valid timestamp response.
    #[error("Malformed timestamp server response: {0}")]
    MalformedResponse(String),

    /// The token echoed a nonce different from the one sent.
    #[error("Timestamp server sent back a bad nonce value")]
    NonceMismatch,

    /// The configured URL is not HTTPS although HTTPS is enforced.
    #[error("Timestamp URL is not HTTPS: {0}")]
    InsecureUrl(String),

    /// The HTTP exchange failed.
    #[error("Timestamp request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// DER handling of the request or response failed.
    #[error("Timestamp encoding error: {0}")]
    Asn1(#[from] der::Error),
}

/// A specialized Result type for PDF signing operations.
pub type PdfResult<T> = Result<T, PdfError>;
