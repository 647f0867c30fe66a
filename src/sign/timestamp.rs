//! RFC 3161 timestamping.
//!
//! The ASN.1 request/response structures are defined here with `der`
//! derives, the same way the `cms` crate defines the RFC 5652 types. The
//! HTTP exchange is synchronous and bounded by a single timeout; the
//! returned token is wrapped as a CMS attribute ready to be attached as
//! an unsigned attribute of a SignerInfo.

use super::{oids, DigestAlgorithm};
use crate::error::TimestampError;
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::asn1::{BitString, GeneralizedTime, Int, OctetString, SetOfVec};
use der::{Any, Decode, Encode, Sequence};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use spki::AlgorithmIdentifierOwned;
use std::time::Duration;
use x509_cert::attr::Attribute;

const MEDIA_TYPE_QUERY: &str = "application/timestamp-query";
const MEDIA_TYPE_REPLY: &str = "application/timestamp-reply";

/// PKIStatus value for a granted request.
const PKI_STATUS_GRANTED: u32 = 0;

/// `MessageImprint ::= SEQUENCE { hashAlgorithm AlgorithmIdentifier,
/// hashedMessage OCTET STRING }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub hashed_message: OctetString,
}

/// `TimeStampReq` per RFC 3161 §2.4.1 (extensions omitted; none are sent).
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampReq {
    pub version: u8,
    pub message_imprint: MessageImprint,
    #[asn1(optional = "true")]
    pub req_policy: Option<der::asn1::ObjectIdentifier>,
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    #[asn1(default = "Default::default")]
    pub cert_req: bool,
}

/// `PKIStatusInfo ::= SEQUENCE { status PKIStatus, statusString
/// PKIFreeText OPTIONAL, failInfo PKIFailureInfo OPTIONAL }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiStatusInfo {
    pub status: u32,
    #[asn1(optional = "true")]
    pub status_string: Option<Vec<String>>,
    #[asn1(optional = "true")]
    pub fail_info: Option<BitString>,
}

/// `TimeStampResp ::= SEQUENCE { status PKIStatusInfo, timeStampToken
/// TimeStampToken OPTIONAL }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampResp {
    pub status: PkiStatusInfo,
    #[asn1(optional = "true")]
    pub time_stamp_token: Option<ContentInfo>,
}

/// `Accuracy ::= SEQUENCE { seconds INTEGER OPTIONAL, millis [0] INTEGER
/// OPTIONAL, micros [1] INTEGER OPTIONAL }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Accuracy {
    #[asn1(optional = "true")]
    pub seconds: Option<u32>,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub millis: Option<u16>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub micros: Option<u16>,
}

/// `TSTInfo` per RFC 3161 §2.4.2, as found inside the token's
/// encapsulated content (extensions omitted).
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TstInfo {
    pub version: u8,
    pub policy: der::asn1::ObjectIdentifier,
    pub message_imprint: MessageImprint,
    pub serial_number: Int,
    pub gen_time: GeneralizedTime,
    #[asn1(optional = "true")]
    pub accuracy: Option<Accuracy>,
    #[asn1(default = "Default::default")]
    pub ordering: bool,
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub tsa: Option<Any>,
}

/// A source of RFC 3161 timestamp tokens.
pub trait Timestamper {
    /// Obtains a token over `message_digest` and returns it wrapped as a
    /// `signature-time-stamp-token` CMS attribute.
    fn timestamp(
        &self,
        message_digest: &[u8],
        digest_algorithm: DigestAlgorithm,
    ) -> Result<Attribute, TimestampError>;
}

/// Authentication applied to timestamp requests.
#[derive(Debug, Clone)]
enum TsaAuth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// An HTTP client for a timestamping authority.
#[derive(Debug, Clone)]
pub struct HttpTimestamper {
    url: String,
    https: bool,
    timeout: Duration,
    auth: Option<TsaAuth>,
}

impl HttpTimestamper {
    /// Creates a client for the given URL with a 5 second timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            https: false,
            timeout: Duration::from_secs(5),
            auth: None,
        }
    }

    /// Creates a client with HTTP Basic authentication. HTTPS is enforced
    /// so the credentials never travel in the clear.
    pub fn with_basic_auth(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut client = Self::new(url);
        client.https = true;
        client.auth = Some(TsaAuth::Basic {
            username: username.into(),
            password: password.into(),
        });
        client
    }

    /// Creates a client with bearer-token authentication. HTTPS is
    /// enforced.
    pub fn with_bearer_auth(url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut client = Self::new(url);
        client.https = true;
        client.auth = Some(TsaAuth::Bearer {
            token: token.into(),
        });
        client
    }

    /// Requires (or stops requiring) an HTTPS URL.
    pub fn require_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    /// Overrides the whole-exchange timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds a request with a fresh random nonce.
    pub(crate) fn build_request(
        &self,
        message_digest: &[u8],
        digest_algorithm: DigestAlgorithm,
    ) -> Result<(Int, TimeStampReq), TimestampError> {
        let mut raw = [0u8; 8];
        OsRng.fill_bytes(&mut raw);
        let nonce = Int::from_der(&u64::from_be_bytes(raw).to_der()?)?;

        let request = TimeStampReq {
            version: 1,
            message_imprint: MessageImprint {
                hash_algorithm: AlgorithmIdentifierOwned {
                    oid: digest_algorithm.oid(),
                    parameters: None,
                },
                hashed_message: OctetString::new(message_digest.to_vec())?,
            },
            req_policy: None,
            nonce: Some(nonce.clone()),
            // ask the server to send its certificates along
            cert_req: true,
        };
        Ok((nonce, request))
    }

    /// Validates a raw reply body against the nonce that was sent and
    /// wraps the token as a CMS attribute.
    pub(crate) fn process_reply(
        &self,
        nonce: &Int,
        body: &[u8],
    ) -> Result<Attribute, TimestampError> {
        let response = TimeStampResp::from_der(body)
            .map_err(|e| TimestampError::MalformedResponse(e.to_string()))?;

        if response.status.status != PKI_STATUS_GRANTED {
            return Err(TimestampError::Rejected {
                status: response.status.status,
                status_string: response
                    .status
                    .status_string
                    .map(|lines| lines.join("; "))
                    .unwrap_or_default(),
                fail_info: response
                    .status
                    .fail_info
                    .map(|bits| hex::encode(bits.raw_bytes()))
                    .unwrap_or_default(),
            });
        }

        let token = response.time_stamp_token.ok_or_else(|| {
            TimestampError::MalformedResponse("granted response carries no token".to_string())
        })?;
        if token.content_type != oids::SIGNED_DATA {
            return Err(TimestampError::MalformedResponse(
                "token is not a SignedData message".to_string(),
            ));
        }

        let signed_data = SignedData::from_der(&token.content.to_der()?)
            .map_err(|e| TimestampError::MalformedResponse(e.to_string()))?;
        let econtent = signed_data.encap_content_info.econtent.ok_or_else(|| {
            TimestampError::MalformedResponse("token has no encapsulated content".to_string())
        })?;
        let octets = OctetString::from_der(&econtent.to_der()?)
            .map_err(|e| TimestampError::MalformedResponse(e.to_string()))?;
        let tst_info = TstInfo::from_der(octets.as_bytes())
            .map_err(|e| TimestampError::MalformedResponse(e.to_string()))?;

        match &tst_info.nonce {
            Some(received) if received == nonce => {}
            _ => return Err(TimestampError::NonceMismatch),
        }

        let value = Any::from_der(&token.to_der()?)?;
        Ok(Attribute {
            oid: oids::SIGNATURE_TIME_STAMP_TOKEN,
            values: SetOfVec::try_from(vec![value])?,
        })
    }
}

impl Timestamper for HttpTimestamper {
    fn timestamp(
        &self,
        message_digest: &[u8],
        digest_algorithm: DigestAlgorithm,
    ) -> Result<Attribute, TimestampError> {
        if self.https && !self.url.starts_with("https://") {
            return Err(TimestampError::InsecureUrl(self.url.clone()));
        }

        let (nonce, request) = self.build_request(message_digest, digest_algorithm)?;
        let body = request.to_der()?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let mut http_request = client
            .post(&self.url)
            .header(CONTENT_TYPE, MEDIA_TYPE_QUERY)
            .body(body);
        match &self.auth {
            Some(TsaAuth::Basic { username, password }) => {
                use base64::Engine as _;
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                http_request =
                    http_request.header(AUTHORIZATION, format!("Basic {}", credentials));
            }
            Some(TsaAuth::Bearer { token }) => {
                http_request = http_request.header(AUTHORIZATION, format!("Bearer {}", token));
            }
            None => {}
        }

        let response = http_request.send()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with(MEDIA_TYPE_REPLY) {
            return Err(TimestampError::MalformedResponse(format!(
                "unexpected content type {:?}",
                content_type
            )));
        }

        let bytes = response.bytes()?;
        self.process_reply(&nonce, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms::content_info::CmsVersion;
    use cms::signed_data::{EncapsulatedContentInfo, SignerInfos};
    use std::time::Duration as StdDuration;

    fn int_from(value: u64) -> Int {
        Int::from_der(&value.to_der().unwrap()).unwrap()
    }

    /// Builds a syntactically valid granted response echoing `nonce`.
    fn granted_response(nonce: Int) -> Vec<u8> {
        let tst_info = TstInfo {
            version: 1,
            policy: oids::DATA,
            message_imprint: MessageImprint {
                hash_algorithm: AlgorithmIdentifierOwned {
                    oid: DigestAlgorithm::Sha256.oid(),
                    parameters: None,
                },
                hashed_message: OctetString::new(vec![0u8; 32]).unwrap(),
            },
            serial_number: int_from(7),
            gen_time: GeneralizedTime::from_unix_duration(StdDuration::from_secs(1_700_000_000))
                .unwrap(),
            accuracy: None,
            ordering: false,
            nonce: Some(nonce),
            tsa: None,
        };
        let econtent_bytes = OctetString::new(tst_info.to_der().unwrap()).unwrap();
        let signed_data = SignedData {
            version: CmsVersion::V3,
            digest_algorithms: SetOfVec::new(),
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: oids::DATA,
                econtent: Some(Any::from_der(&econtent_bytes.to_der().unwrap()).unwrap()),
            },
            certificates: None,
            crls: None,
            signer_infos: SignerInfos(SetOfVec::new()),
        };
        let token = ContentInfo {
            content_type: oids::SIGNED_DATA,
            content: Any::from_der(&signed_data.to_der().unwrap()).unwrap(),
        };
        let response = TimeStampResp {
            status: PkiStatusInfo {
                status: PKI_STATUS_GRANTED,
                status_string: None,
                fail_info: None,
            },
            time_stamp_token: Some(token),
        };
        response.to_der().unwrap()
    }

    #[test]
    fn test_request_shape() {
        let client = HttpTimestamper::new("http://tsa.example");
        let (nonce, request) = client
            .build_request(&[0u8; 32], DigestAlgorithm::Sha256)
            .unwrap();
        assert_eq!(request.version, 1);
        assert!(request.cert_req);
        assert_eq!(request.nonce.as_ref(), Some(&nonce));
        assert_eq!(
            request.message_imprint.hash_algorithm.oid,
            DigestAlgorithm::Sha256.oid()
        );
        // round trip through DER
        let encoded = request.to_der().unwrap();
        let decoded = TimeStampReq::from_der(&encoded).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_matching_nonce_is_accepted() {
        let client = HttpTimestamper::new("http://tsa.example");
        let nonce = int_from(0x1122_3344_5566_7788);
        let body = granted_response(nonce.clone());
        let attribute = client.process_reply(&nonce, &body).unwrap();
        assert_eq!(attribute.oid, oids::SIGNATURE_TIME_STAMP_TOKEN);
        assert_eq!(attribute.values.len(), 1);
    }

    #[test]
    fn test_mismatched_nonce_is_rejected() {
        let client = HttpTimestamper::new("http://tsa.example");
        let body = granted_response(int_from(1));
        let result = client.process_reply(&int_from(2), &body);
        assert!(matches!(result, Err(TimestampError::NonceMismatch)));
    }

    #[test]
    fn test_rejection_carries_status_details() {
        let response = TimeStampResp {
            status: PkiStatusInfo {
                status: 2,
                status_string: Some(vec!["unsupported algorithm".to_string()]),
                fail_info: None,
            },
            time_stamp_token: None,
        };
        let body = response.to_der().unwrap();
        let client = HttpTimestamper::new("http://tsa.example");
        match client.process_reply(&int_from(1), &body) {
            Err(TimestampError::Rejected {
                status,
                status_string,
                ..
            }) => {
                assert_eq!(status, 2);
                assert_eq!(status_string, "unsupported algorithm");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_reply_is_malformed() {
        let client = HttpTimestamper::new("http://tsa.example");
        let result = client.process_reply(&int_from(1), b"not asn1");
        assert!(matches!(result, Err(TimestampError::MalformedResponse(_))));
    }

    #[test]
    fn test_https_enforcement() {
        let client = HttpTimestamper::with_basic_auth("http://insecure.example", "user", "pass");
        let result = client.timestamp(&[0u8; 32], DigestAlgorithm::Sha256);
        assert!(matches!(result, Err(TimestampError::InsecureUrl(_))));
    }
}
