//! # pdfsig
//!
//! Incremental PDF signing: embed a detached CMS (PKCS#7) signature into
//! an existing PDF by appending an incremental update, then patch the
//! serialized bytes so the signature covers the whole file except the
//! hex-encoded blob itself.
//!
//! ## Features
//!
//! - **Incremental updates**: the previous revision is preserved byte for
//!   byte, so earlier signatures stay verifiable
//! - **AcroForm wiring**: signature fields are discovered or created and
//!   bound to the new signature dictionary
//! - **DocMDP certification**: optional `/Perms/DocMDP` entry with a
//!   modification-permission level
//! - **RFC 3161 timestamps**: a timestamper countersigns the signature
//!   through an unsigned CMS attribute
//! - **Verification**: recompute the `/ByteRange` digest and check the
//!   signature against the embedded certificate
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdfsig::prelude::*;
//!
//! let signer = SimpleSigner::load("key.pem", "cert.pem", &["chain.pem"], None)?;
//! let reader = PdfReader::from_file("input.pdf")?;
//! let mut writer = IncrementalWriter::new(reader)?;
//!
//! let meta = PdfSignatureMetadata::new()
//!     .field_name("Signature1")
//!     .md_algorithm(DigestAlgorithm::Sha256)
//!     .reason("Approval");
//! let signed = sign_pdf(&mut writer, &meta, &signer, false, None)?;
//! std::fs::write("signed.pdf", &signed)?;
//!
//! // and check the result
//! let reader = PdfReader::from_bytes(signed)?;
//! let field = enumerate_sig_fields(&reader, FieldStatus::Filled)?.remove(0);
//! let sig_dict = reader.resolve(field.reference)?
//!     .as_dictionary().unwrap().get("V").unwrap().clone();
//! let status = validate_signature(&reader, &sig_dict)?;
//! println!("{}", status.summary());
//! ```

pub mod content;
pub mod error;
pub mod object;
pub mod parser;
pub mod sign;
pub mod stamp;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use content::{ContentBuilder, Operator, TextBuilder};
pub use error::{
    ObjectError, ParserError, PdfError, PdfResult, SignError, TimestampError, VerifyError,
    WriterError,
};
pub use object::{Object, PdfArray, PdfDictionary, PdfName, PdfStream, PdfString};
pub use parser::PdfReader;
pub use sign::{
    append_signature_fields, enumerate_sig_fields, pdf_date, sign_pdf, sign_pdf_at,
    validate_signature, DigestAlgorithm, DocMdpPerm, FieldStatus, HttpTimestamper,
    PdfSignatureMetadata, SigFieldInfo, SigFieldSpec, SignatureMechanism, SignatureStatus,
    SignatureSummary, Signer, SimpleSigner, Timestamper,
};
pub use stamp::SignatureStamp;
pub use types::{ObjectId, Rect};
pub use writer::IncrementalWriter;

/// Prelude module for convenient imports.
///
/// Use `use pdfsig::prelude::*;` to import all commonly used types.
pub mod prelude {
    pub use crate::content::{ContentBuilder, Operator, TextBuilder};
    pub use crate::error::{PdfError, PdfResult, SignError, TimestampError, VerifyError};
    pub use crate::object::{Object, PdfArray, PdfDictionary, PdfName, PdfString};
    pub use crate::parser::PdfReader;
    pub use crate::sign::{
        append_signature_fields, enumerate_sig_fields, sign_pdf, validate_signature,
        DigestAlgorithm, DocMdpPerm, FieldStatus, HttpTimestamper, PdfSignatureMetadata,
        SigFieldSpec, SignatureMechanism, SignatureStatus, SignatureSummary, Signer,
        SimpleSigner, Timestamper,
    };
    pub use crate::types::{ObjectId, Rect};
    pub use crate::writer::IncrementalWriter;
}
