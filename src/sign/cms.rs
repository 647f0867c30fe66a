//! Detached CMS (PKCS#7) SignedData assembly.
//!
//! The bytes that get signed are the DER encoding of the signed-attribute
//! set in its universal SET form; inside the SignerInfo the same set is
//! carried behind an IMPLICIT `[0]` tag. Serializing the attribute set on
//! its own yields exactly the universal form, so signing and verification
//! both encode from the structured value and never patch tags by hand.

use super::signer::Signer;
use super::{oids, DigestAlgorithm};
use crate::error::SignError;
use chrono::{DateTime, FixedOffset, Utc};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    EncapsulatedContentInfo, SignedAttributes, SignedData, SignerInfo, SignerInfos,
    SignerIdentifier,
};
use der::asn1::{OctetString, SetOfVec, UtcTime};
use der::{Any, Decode, Encode};
use spki::AlgorithmIdentifierOwned;
use std::time::Duration;
use x509_cert::attr::Attribute;
use x509_cert::time::Time;

/// Re-encodes any DER-encodable value as an `Any`.
pub(crate) fn any_from<T: Encode>(value: &T) -> der::Result<Any> {
    Any::from_der(&value.to_der()?)
}

/// Builds a single-valued CMS attribute.
fn simple_cms_attribute(
    oid: der::asn1::ObjectIdentifier,
    value: Any,
) -> der::Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// Assembles detached CMS signatures for one signing operation.
pub(crate) struct CmsSigner<'a> {
    signer: &'a dyn Signer,
    md_algorithm: DigestAlgorithm,
    timestamp: DateTime<FixedOffset>,
}

impl<'a> CmsSigner<'a> {
    pub fn new(
        signer: &'a dyn Signer,
        md_algorithm: DigestAlgorithm,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            signer,
            md_algorithm,
            timestamp,
        }
    }

    fn digest_algorithm_identifier(&self) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: self.md_algorithm.oid(),
            parameters: None,
        }
    }

    /// Builds the signed-attribute set: content-type, message-digest and
    /// signing-time.
    fn signed_attributes(&self, data_digest: &[u8]) -> Result<SignedAttributes, SignError> {
        let content_type = simple_cms_attribute(oids::CONTENT_TYPE, any_from(&oids::DATA)?)?;
        let message_digest = simple_cms_attribute(
            oids::MESSAGE_DIGEST,
            any_from(&OctetString::new(data_digest.to_vec())?)?,
        )?;

        let seconds = u64::try_from(self.timestamp.with_timezone(&Utc).timestamp())
            .map_err(|_| SignError::Crypto("signing time predates the epoch".to_string()))?;
        let datetime = der::DateTime::from_unix_duration(Duration::from_secs(seconds))
            .map_err(SignError::Asn1)?;
        let utc_time = UtcTime::from_date_time(datetime).map_err(SignError::Asn1)?;
        let signing_time =
            simple_cms_attribute(oids::SIGNING_TIME, any_from(&Time::UtcTime(utc_time))?)?;

        Ok(SetOfVec::try_from(vec![
            content_type,
            message_digest,
            signing_time,
        ])?)
    }

    /// Builds the SignerInfo, requesting a timestamp countersignature
    /// when the signer carries a timestamper.
    fn signer_info(
        &self,
        signed_attrs: SignedAttributes,
        signature: Vec<u8>,
    ) -> Result<SignerInfo, SignError> {
        let signing_cert = self.signer.signing_cert();
        let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: signing_cert.tbs_certificate.issuer.clone(),
            serial_number: signing_cert.tbs_certificate.serial_number.clone(),
        });

        let unsigned_attrs = match self.signer.timestamper() {
            Some(timestamper) => {
                // the timestamp covers the signature bytes themselves
                let signature_digest = self.md_algorithm.digest(&signature);
                let token = timestamper
                    .timestamp(&signature_digest, self.md_algorithm)
                    .map_err(SignError::Timestamp)?;
                Some(SetOfVec::try_from(vec![token])?)
            }
            None => None,
        };

        Ok(SignerInfo {
            version: CmsVersion::V1,
            sid,
            digest_alg: self.digest_algorithm_identifier(),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: self.signer.mechanism().oid(),
                parameters: Some(Any::null()),
            },
            signature: OctetString::new(signature)?,
            unsigned_attrs,
        })
    }

    /// Produces the DER-encoded `ContentInfo` holding the detached
    /// `SignedData` for `data_digest`.
    ///
    /// A dry run exercises the identical path with a stand-in raw
    /// signature so the result has the size of the real message.
    pub fn sign(&self, data_digest: &[u8], dry_run: bool) -> Result<Vec<u8>, SignError> {
        let signed_attrs = self.signed_attributes(data_digest)?;
        let attr_bytes = signed_attrs.to_der()?;
        let signature = self
            .signer
            .sign_raw(&attr_bytes, self.md_algorithm, dry_run)?;

        let signer_info = self.signer_info(signed_attrs, signature)?;

        let mut certificates = vec![CertificateChoices::Certificate(
            self.signer.signing_cert().clone(),
        )];
        for cert in self.signer.ca_chain() {
            certificates.push(CertificateChoices::Certificate(cert.clone()));
        }

        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::try_from(vec![self.digest_algorithm_identifier()])?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: oids::DATA,
                econtent: None,
            },
            certificates: Some(SetOfVec::try_from(certificates)?.into()),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
        };

        let message = ContentInfo {
            content_type: oids::SIGNED_DATA,
            content: any_from(&signed_data)?,
        };
        Ok(message.to_der()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{fixed_timestamp, test_public_key, test_signer};
    use super::*;
    use der::Tag;

    #[test]
    fn test_dry_run_sizes_match_real_signatures() {
        let signer = test_signer();
        let cms = CmsSigner::new(&signer, DigestAlgorithm::Sha256, fixed_timestamp());
        let digest = vec![0u8; 32];
        let dry = cms.sign(&digest, true).unwrap();
        let real = cms.sign(&digest, false).unwrap();
        assert_eq!(dry.len(), real.len());
    }

    #[test]
    fn test_message_parses_back_as_signed_data() {
        let signer = test_signer();
        let cms = CmsSigner::new(&signer, DigestAlgorithm::Sha256, fixed_timestamp());
        let message = cms.sign(&vec![1u8; 32], false).unwrap();

        let content_info = ContentInfo::from_der(&message).unwrap();
        assert_eq!(content_info.content_type, oids::SIGNED_DATA);
        let signed_data = SignedData::from_der(&content_info.content.to_der().unwrap()).unwrap();
        assert_eq!(signed_data.version, CmsVersion::V1);
        assert!(signed_data.encap_content_info.econtent.is_none());
        assert_eq!(signed_data.signer_infos.0.len(), 1);
        assert!(signed_data.certificates.is_some());
    }

    #[test]
    fn test_signed_attributes_encode_as_universal_set() {
        let signer = test_signer();
        let cms = CmsSigner::new(&signer, DigestAlgorithm::Sha256, fixed_timestamp());
        let attrs = cms.signed_attributes(&vec![9u8; 32]).unwrap();
        let encoded = attrs.to_der().unwrap();
        assert_eq!(encoded[0], u8::from(Tag::Set));
    }

    #[test]
    fn test_signed_attributes_carry_the_document_digest() {
        let signer = test_signer();
        let cms = CmsSigner::new(&signer, DigestAlgorithm::Sha256, fixed_timestamp());
        let digest = vec![5u8; 32];
        let attrs = cms.signed_attributes(&digest).unwrap();

        let found = attrs
            .iter()
            .find(|attr| attr.oid == oids::MESSAGE_DIGEST)
            .expect("message-digest attribute present");
        let value = found.values.iter().next().unwrap();
        let octets = OctetString::from_der(&value.to_der().unwrap()).unwrap();
        assert_eq!(octets.as_bytes(), digest.as_slice());
    }

    #[test]
    fn test_signature_verifies_against_attribute_bytes() {
        use rsa::traits::PublicKeyParts as _;

        let signer = test_signer();
        let cms = CmsSigner::new(&signer, DigestAlgorithm::Sha256, fixed_timestamp());
        let message = cms.sign(&vec![3u8; 32], false).unwrap();

        let content_info = ContentInfo::from_der(&message).unwrap();
        let signed_data = SignedData::from_der(&content_info.content.to_der().unwrap()).unwrap();
        let signer_info = signed_data.signer_infos.0.iter().next().unwrap();

        let attrs = signer_info.signed_attrs.as_ref().unwrap();
        let attr_bytes = attrs.to_der().unwrap();
        let digest = DigestAlgorithm::Sha256.digest(&attr_bytes);

        let public_key = test_public_key();
        assert_eq!(
            signer_info.signature.as_bytes().len(),
            public_key.size()
        );
        public_key
            .verify(
                super::super::signer::pkcs1v15_padding(DigestAlgorithm::Sha256),
                &digest,
                signer_info.signature.as_bytes(),
            )
            .expect("signature verifies");
    }
}
