//! PDF signing.
//!
//! The signing pipeline appends an incremental update carrying a signature
//! dictionary with fixed-width placeholders, serializes the document,
//! patches the real `/ByteRange` in place, digests the two covered
//! regions, produces a detached CMS signature (optionally timestamped),
//! and writes its hex encoding over the `/Contents` reservation.

pub mod cms;
pub mod dictionary;
pub mod docmdp;
pub mod fields;
pub mod placeholder;
pub mod signer;
pub mod timestamp;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_support;

pub use dictionary::SignatureObject;
pub use docmdp::DocMdpPerm;
pub use fields::{
    append_signature_fields, enumerate_sig_fields, FieldStatus, SigFieldInfo, SigFieldSpec,
};
pub use placeholder::{ByteRangePlaceholder, ContentsPlaceholder, DEFAULT_BYTES_RESERVED};
pub use signer::{subject_display_name, Signer, SimpleSigner};
pub use timestamp::{HttpTimestamper, Timestamper};
pub use verify::{validate_signature, SignatureStatus, SignatureSummary};

use crate::error::{PdfResult, SignError, WriterError};
use self::cms::CmsSigner;
use crate::stamp::SignatureStamp;
use crate::writer::IncrementalWriter;
use chrono::{DateTime, FixedOffset, Local};
use const_oid::ObjectIdentifier;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Object identifiers used across the CMS and timestamping code.
pub(crate) mod oids {
    use const_oid::ObjectIdentifier;

    pub const DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
    pub const SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
    pub const CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
    pub const MESSAGE_DIGEST: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
    pub const SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
    pub const SIGNATURE_TIME_STAMP_TOKEN: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");
    pub const EMAIL_ADDRESS: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

    pub const SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
    pub const SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
    pub const SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
    pub const SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

    pub const RSA_ENCRYPTION: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
    pub const SHA1_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
    pub const SHA256_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
    pub const SHA384_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
    pub const SHA512_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
}

/// Message digest algorithms supported for signing and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the algorithm's object identifier.
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha1 => oids::SHA1,
            DigestAlgorithm::Sha256 => oids::SHA256,
            DigestAlgorithm::Sha384 => oids::SHA384,
            DigestAlgorithm::Sha512 => oids::SHA512,
        }
    }

    /// Resolves an object identifier to a supported algorithm.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ]
        .into_iter()
        .find(|algorithm| algorithm.oid() == *oid)
    }

    /// Returns the lowercase algorithm name.
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// Returns the digest output size in bytes.
    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Hashes a single buffer.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        self.digest_ranges(data, &[(0, data.len())])
    }

    /// Hashes a sequence of `(offset, length)` regions of `data` as one
    /// contiguous message.
    pub fn digest_ranges(self, data: &[u8], ranges: &[(usize, usize)]) -> Vec<u8> {
        fn hash<D: Digest>(data: &[u8], ranges: &[(usize, usize)]) -> Vec<u8> {
            let mut hasher = D::new();
            for &(offset, length) in ranges {
                hasher.update(&data[offset..offset + length]);
            }
            hasher.finalize().to_vec()
        }
        match self {
            DigestAlgorithm::Sha1 => hash::<Sha1>(data, ranges),
            DigestAlgorithm::Sha256 => hash::<Sha256>(data, ranges),
            DigestAlgorithm::Sha384 => hash::<Sha384>(data, ranges),
            DigestAlgorithm::Sha512 => hash::<Sha512>(data, ranges),
        }
    }
}

/// Signature mechanisms supported in SignerInfo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMechanism {
    /// Plain RSASSA-PKCS1-v1_5 (rsaEncryption); the digest algorithm is
    /// carried separately.
    RsassaPkcs1v15,
    Sha1Rsa,
    Sha256Rsa,
    Sha384Rsa,
    Sha512Rsa,
}

impl SignatureMechanism {
    /// Returns the mechanism's object identifier.
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            SignatureMechanism::RsassaPkcs1v15 => oids::RSA_ENCRYPTION,
            SignatureMechanism::Sha1Rsa => oids::SHA1_WITH_RSA,
            SignatureMechanism::Sha256Rsa => oids::SHA256_WITH_RSA,
            SignatureMechanism::Sha384Rsa => oids::SHA384_WITH_RSA,
            SignatureMechanism::Sha512Rsa => oids::SHA512_WITH_RSA,
        }
    }

    /// Resolves an object identifier to a supported mechanism.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            SignatureMechanism::RsassaPkcs1v15,
            SignatureMechanism::Sha1Rsa,
            SignatureMechanism::Sha256Rsa,
            SignatureMechanism::Sha384Rsa,
            SignatureMechanism::Sha512Rsa,
        ]
        .into_iter()
        .find(|mechanism| mechanism.oid() == *oid)
    }

    /// Returns the digest algorithm the mechanism pins, if any.
    pub fn digest(self) -> Option<DigestAlgorithm> {
        match self {
            SignatureMechanism::RsassaPkcs1v15 => None,
            SignatureMechanism::Sha1Rsa => Some(DigestAlgorithm::Sha1),
            SignatureMechanism::Sha256Rsa => Some(DigestAlgorithm::Sha256),
            SignatureMechanism::Sha384Rsa => Some(DigestAlgorithm::Sha384),
            SignatureMechanism::Sha512Rsa => Some(DigestAlgorithm::Sha512),
        }
    }

    /// Returns the mechanism's conventional name.
    pub fn name(self) -> &'static str {
        match self {
            SignatureMechanism::RsassaPkcs1v15 => "rsassa_pkcs1v15",
            SignatureMechanism::Sha1Rsa => "sha1_rsa",
            SignatureMechanism::Sha256Rsa => "sha256_rsa",
            SignatureMechanism::Sha384Rsa => "sha384_rsa",
            SignatureMechanism::Sha512Rsa => "sha512_rsa",
        }
    }
}

/// Metadata describing one signing operation.
#[derive(Debug, Clone)]
pub struct PdfSignatureMetadata {
    /// Which AcroForm signature field to populate. When `None`, a unique
    /// empty field must already exist.
    pub field_name: Option<String>,
    /// Digest algorithm for the document and the signed attributes.
    pub md_algorithm: DigestAlgorithm,
    /// Copied into the signature dictionary as /Location.
    pub location: Option<String>,
    /// Copied into the signature dictionary as /Reason.
    pub reason: Option<String>,
    /// Copied into the signature dictionary as /Name; also the display
    /// name on visible stamps. Defaults to the certificate subject.
    pub name: Option<String>,
    /// Install a DocMDP certification entry.
    pub certify: bool,
    /// Permission level for certification; ignored unless certifying.
    pub docmdp_permissions: DocMdpPerm,
}

impl Default for PdfSignatureMetadata {
    fn default() -> Self {
        Self {
            field_name: None,
            md_algorithm: DigestAlgorithm::Sha512,
            location: None,
            reason: None,
            name: None,
            certify: false,
            docmdp_permissions: DocMdpPerm::FillForms,
        }
    }
}

impl PdfSignatureMetadata {
    /// Creates metadata with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target field name.
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    /// Sets the digest algorithm.
    pub fn md_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.md_algorithm = algorithm;
        self
    }

    /// Sets the signing location.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the signing reason.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the signer display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Turns the signature into a certification signature.
    pub fn certify(mut self, permissions: DocMdpPerm) -> Self {
        self.certify = true;
        self.docmdp_permissions = permissions;
        self
    }
}

/// Formats a date-time as a PDF date string.
///
/// The result is `D:YYYYMMDDHHMMSS` followed by `Z` for a zero offset or
/// `±HH'MM'`. The apostrophe after the minutes is not required by the PDF
/// specification, but some widely deployed verifiers reject dates without
/// it.
pub fn pdf_date(dt: &DateTime<FixedOffset>) -> String {
    let base = dt.format("%Y%m%d%H%M%S");
    let offset_seconds = dt.offset().local_minus_utc();
    if offset_seconds == 0 {
        return format!("D:{}Z", base);
    }
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let total = offset_seconds.unsigned_abs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    format!("D:{}{}{:02}'{:02}'", base, sign, hours, minutes)
}

/// Signs a document through an incremental update and returns the
/// complete signed file.
///
/// The reservation for the signature blob is sized with a dry run unless
/// `bytes_reserved` is given. Any failure leaves the update unwritten; on
/// a [`SignError::ReservationExceeded`] the caller may retry with a larger
/// explicit reservation.
pub fn sign_pdf(
    writer: &mut IncrementalWriter,
    signature_meta: &PdfSignatureMetadata,
    signer: &dyn Signer,
    existing_fields_only: bool,
    bytes_reserved: Option<usize>,
) -> PdfResult<Vec<u8>> {
    let timestamp = Local::now().fixed_offset();
    sign_pdf_at(
        writer,
        signature_meta,
        signer,
        existing_fields_only,
        bytes_reserved,
        timestamp,
    )
}

/// Signs with an explicit timestamp. [`sign_pdf`] passes the current local
/// time; a fixed timestamp makes the operation deterministic for tests.
pub fn sign_pdf_at(
    writer: &mut IncrementalWriter,
    signature_meta: &PdfSignatureMetadata,
    signer: &dyn Signer,
    existing_fields_only: bool,
    bytes_reserved: Option<usize>,
    timestamp: DateTime<FixedOffset>,
) -> PdfResult<Vec<u8>> {
    let md_algorithm = signature_meta.md_algorithm;

    let bytes_reserved = match bytes_reserved {
        Some(reserved) => reserved,
        None => {
            // any digest of the right size will do for sizing
            let test_digest = vec![0u8; md_algorithm.output_len()];
            let test_signature = CmsSigner::new(signer, md_algorithm, timestamp)
                .sign(&test_digest, true)?;
            test_signature.len() * 2
        }
    };

    let sig_obj = SignatureObject::new(
        timestamp,
        signature_meta.name.clone(),
        signature_meta.location.clone(),
        signature_meta.reason.clone(),
        Some(bytes_reserved),
    );
    let sig_ref = writer.add_signature_object(sig_obj);

    let display_name = signature_meta
        .name
        .clone()
        .or_else(|| subject_display_name(signer.signing_cert()))
        .unwrap_or_else(|| "Unknown".to_string());

    let (field_created, field_ref) = match &signature_meta.field_name {
        None => {
            if !existing_fields_only {
                return Err(SignError::NoEmptyField(
                    "a field name is required unless signing existing fields only".to_string(),
                )
                .into());
            }
            let empty = enumerate_sig_fields(writer.reader(), FieldStatus::Empty)?;
            match empty.as_slice() {
                [] => {
                    return Err(SignError::NoEmptyField(
                        "there are no empty signature fields".to_string(),
                    )
                    .into())
                }
                [only] => (false, only.reference),
                many => {
                    return Err(SignError::AmbiguousField(
                        many.iter().map(|f| f.name.clone()).collect(),
                    )
                    .into())
                }
            }
        }
        Some(field_name) => {
            fields::prepare_sig_field(writer, field_name, existing_fields_only, true, None, 0)?
        }
    };

    if !field_created {
        writer.mark_update(field_ref)?;
    }
    fields::fill_field_value(writer, field_ref, sig_ref)?;

    let rect = fields::field_rect(writer, field_ref)?;
    if !rect.is_degenerate() {
        let stamp = SignatureStamp::new(
            &display_name,
            &timestamp.format("%Y-%m-%d %H:%M:%S %z").to_string(),
        );
        let appearance = stamp.render(writer, rect.width(), rect.height())?;
        fields::set_field_appearance(writer, field_ref, appearance)?;
    }

    if signature_meta.certify {
        docmdp::certification_setup(
            writer,
            sig_ref,
            md_algorithm,
            signature_meta.docmdp_permissions,
        )?;
    }

    let mut buffer = writer.write()?;
    let eof = buffer.len();
    let missing_sig =
        || WriterError::Structure("staged signature object disappeared".to_string());

    let (sig_start, sig_end) = writer
        .signature_object(sig_ref)
        .ok_or_else(missing_sig)?
        .contents
        .span()?;
    writer
        .signature_object_mut(sig_ref)
        .ok_or_else(missing_sig)?
        .byte_range
        .fill(&mut buffer, sig_start as u64, sig_end as u64, eof as u64)?;

    let document_digest =
        md_algorithm.digest_ranges(&buffer, &[(0, sig_start), (sig_end, eof - sig_end)]);
    let signature_der =
        CmsSigner::new(signer, md_algorithm, timestamp).sign(&document_digest, false)?;
    let hex_signature = hex::encode(&signature_der);
    if hex_signature.len() > bytes_reserved {
        return Err(SignError::ReservationExceeded {
            encoded: hex_signature.len(),
            reserved: bytes_reserved,
        }
        .into());
    }

    writer
        .signature_object(sig_ref)
        .ok_or_else(missing_sig)?
        .contents
        .fill(&mut buffer, hex_signature.as_bytes())?;

    Ok(buffer)
}
