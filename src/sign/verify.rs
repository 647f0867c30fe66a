//! Signature verification.
//!
//! Verification recomputes the `/ByteRange` digest, compares it against
//! the `message-digest` signed attribute, and checks the raw signature
//! over the re-encoded signed attributes. Cryptographic mismatches are
//! reported in the returned status; only structural corruption raises an
//! error.

use super::{oids, DigestAlgorithm, SignatureMechanism};
use crate::error::{PdfResult, VerifyError};
use crate::object::Object;
use crate::parser::PdfReader;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::OctetString;
use der::{Decode, Encode, SliceReader};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use x509_cert::Certificate;

/// Outcome of verifying one signature.
#[derive(Debug, Clone)]
pub struct SignatureStatus {
    /// The document digest matches the signed `message-digest` attribute.
    pub intact: bool,
    /// The raw signature verifies over the signed attributes.
    pub valid: bool,
    /// The `/ByteRange` covers the whole file except the signature blob.
    pub complete_document: bool,
    /// The certificate matching the SignerInfo's issuer and serial.
    pub signing_cert: Certificate,
    /// The other embedded certificates.
    pub ca_chain: Vec<Certificate>,
    /// The mechanism declared in SignerInfo.
    pub pkcs7_signature_mechanism: SignatureMechanism,
    /// The digest algorithm declared in SignerInfo.
    pub md_algorithm: DigestAlgorithm,
}

/// Compressed verdict over a [`SignatureStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureSummary {
    /// The signature does not verify.
    Forged,
    /// Signature valid, digest matches, nothing appended.
    IntactUntouched,
    /// Signature valid and digest matches, but bytes were appended after
    /// the signed revision.
    IntactExtended,
    /// Signature valid but the covered bytes changed.
    Invalid,
}

impl std::fmt::Display for SignatureSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SignatureSummary::Forged => "FORGED",
            SignatureSummary::IntactUntouched => "INTACT_UNTOUCHED",
            SignatureSummary::IntactExtended => "INTACT_EXTENDED",
            SignatureSummary::Invalid => "INVALID",
        };
        f.write_str(text)
    }
}

impl SignatureStatus {
    /// Maps the status flags to a single verdict. An invalid signature is
    /// forged no matter what the digest comparison said.
    pub fn summary(&self) -> SignatureSummary {
        if !self.valid {
            SignatureSummary::Forged
        } else if self.intact {
            if self.complete_document {
                SignatureSummary::IntactUntouched
            } else {
                SignatureSummary::IntactExtended
            }
        } else {
            SignatureSummary::Invalid
        }
    }
}

fn malformed(message: impl Into<String>) -> VerifyError {
    VerifyError::MalformedSignature(message.into())
}

/// Verifies the signature held by a signature dictionary against the
/// serialized document in `reader`.
pub fn validate_signature(reader: &PdfReader, sig_object: &Object) -> PdfResult<SignatureStatus> {
    let sig_object = reader.resolve_ref(sig_object)?;
    let sig_dict = sig_object
        .as_dictionary()
        .ok_or_else(|| malformed("signature object is not a dictionary"))?;

    let contents = sig_dict
        .get("Contents")
        .and_then(Object::as_string)
        .ok_or_else(|| malformed("signature dictionary has no /Contents"))?
        .as_bytes()
        .to_vec();
    let byte_range = sig_dict
        .get("ByteRange")
        .and_then(Object::as_array)
        .ok_or_else(|| malformed("signature dictionary has no /ByteRange"))?;
    if byte_range.len() != 4 {
        return Err(malformed("/ByteRange must hold four integers").into());
    }
    let mut ranges = [0usize; 4];
    for (slot, value) in ranges.iter_mut().zip(byte_range.iter()) {
        *slot = value
            .as_integer()
            .filter(|&n| n >= 0)
            .ok_or_else(|| malformed("/ByteRange entries must be non-negative integers"))?
            as usize;
    }
    let [offset1, length1, offset2, length2] = ranges;

    // the reserved region is zero-padded past the DER payload, so decode
    // from a reader that tolerates trailing bytes
    let mut der_reader =
        SliceReader::new(&contents).map_err(|_| malformed("empty /Contents"))?;
    let content_info =
        ContentInfo::decode(&mut der_reader).map_err(|e| malformed(e.to_string()))?;
    if content_info.content_type != oids::SIGNED_DATA {
        return Err(malformed("signature is not a SignedData message").into());
    }
    let signed_data = SignedData::from_der(
        &content_info
            .content
            .to_der()
            .map_err(VerifyError::Asn1)?,
    )
    .map_err(|e| malformed(e.to_string()))?;

    let mut signer_infos = signed_data.signer_infos.0.iter();
    let signer_info: &SignerInfo = signer_infos
        .next()
        .ok_or_else(|| malformed("signer_infos is empty"))?;
    if signer_infos.next().is_some() {
        return Err(malformed("signer_infos should contain exactly one entry").into());
    }

    let mechanism = SignatureMechanism::from_oid(&signer_info.signature_algorithm.oid)
        .ok_or_else(|| {
            VerifyError::UnsupportedMechanism(signer_info.signature_algorithm.oid.to_string())
        })?;
    let md_algorithm = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid).ok_or_else(|| {
        VerifyError::UnsupportedMechanism(signer_info.digest_alg.oid.to_string())
    })?;

    let mut certificates = Vec::new();
    if let Some(set) = &signed_data.certificates {
        for choice in set.0.iter() {
            if let CertificateChoices::Certificate(cert) = choice {
                certificates.push(cert.clone());
            }
        }
    }
    if certificates.is_empty() {
        return Err(malformed("no certificates embedded in the signature").into());
    }
    let signer_index = match &signer_info.sid {
        SignerIdentifier::IssuerAndSerialNumber(ias) => certificates.iter().position(|cert| {
            cert.tbs_certificate.issuer == ias.issuer
                && cert.tbs_certificate.serial_number == ias.serial_number
        }),
        SignerIdentifier::SubjectKeyIdentifier(_) => None,
    };
    let signer_index = signer_index.unwrap_or_else(|| {
        log::warn!("no embedded certificate matches the signer identifier, assuming the first");
        0
    });
    let signing_cert = certificates.remove(signer_index);
    let ca_chain = certificates;

    // digest the two covered regions
    let stream = reader.raw_data();
    for &(offset, length) in &[(offset1, length1), (offset2, length2)] {
        if offset + length > stream.len() {
            return Err(malformed("/ByteRange extends past the end of the file").into());
        }
    }
    let raw_digest =
        md_algorithm.digest_ranges(stream, &[(offset1, length1), (offset2, length2)]);

    // the hex blob plus its angle brackets is the only uncovered part of
    // a freshly signed file
    let embedded_sig_content = contents.len() * 2 + 2;
    let complete_document = stream.len() == length1 + length2 + embedded_sig_content;

    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or_else(|| malformed("signature carries no signed attributes"))?;
    let embedded_digest = signed_attrs
        .iter()
        .find(|attr| attr.oid == oids::MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .ok_or_else(|| malformed("unable to locate message digest"))?;
    let embedded_digest =
        OctetString::from_der(&embedded_digest.to_der().map_err(VerifyError::Asn1)?)
            .map_err(|e| malformed(e.to_string()))?;
    let intact = raw_digest == embedded_digest.as_bytes();

    // the signed bytes are the attributes re-encoded as a universal SET
    let attr_bytes = signed_attrs.to_der().map_err(VerifyError::Asn1)?;
    let verify_md = mechanism.digest().unwrap_or(md_algorithm);
    let attr_digest = verify_md.digest(&attr_bytes);

    let spki_der = signing_cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(VerifyError::Asn1)?;
    let public_key = RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| VerifyError::CryptoFailure(e.to_string()))?;
    let valid = public_key
        .verify(
            super::signer::pkcs1v15_padding(verify_md),
            &attr_digest,
            signer_info.signature.as_bytes(),
        )
        .is_ok();

    Ok(SignatureStatus {
        intact,
        valid,
        complete_document,
        signing_cert,
        ca_chain,
        pkcs7_signature_mechanism: mechanism,
        md_algorithm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(valid: bool, intact: bool, complete: bool) -> SignatureStatus {
        SignatureStatus {
            intact,
            valid,
            complete_document: complete,
            signing_cert: super::super::test_support::test_certificate(),
            ca_chain: Vec::new(),
            pkcs7_signature_mechanism: SignatureMechanism::RsassaPkcs1v15,
            md_algorithm: DigestAlgorithm::Sha256,
        }
    }

    #[test]
    fn test_summary_mapping() {
        assert_eq!(status(true, true, true).summary(), SignatureSummary::IntactUntouched);
        assert_eq!(status(true, true, false).summary(), SignatureSummary::IntactExtended);
        assert_eq!(status(true, false, true).summary(), SignatureSummary::Invalid);
        // an invalid signature is forged even when the digest matches
        assert_eq!(status(false, true, true).summary(), SignatureSummary::Forged);
        assert_eq!(status(false, false, false).summary(), SignatureSummary::Forged);
    }

    #[test]
    fn test_summary_display() {
        assert_eq!(SignatureSummary::IntactUntouched.to_string(), "INTACT_UNTOUCHED");
        assert_eq!(SignatureSummary::Forged.to_string(), "FORGED");
    }
}
