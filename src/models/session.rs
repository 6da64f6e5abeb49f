use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the relying party wants a single data group or verification handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttributeRequest {
    Required,
    Allowed,
    Prohibited,
}

impl AttributeRequest {
    /// The wire spelling used inside `UseOperations`.
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeRequest::Required => "REQUIRED",
            AttributeRequest::Allowed => "ALLOWED",
            AttributeRequest::Prohibited => "PROHIBITED",
        }
    }
}

impl Default for AttributeRequest {
    fn default() -> Self {
        AttributeRequest::Prohibited
    }
}

/// The per-attribute operations block of a useID request. Element names are
/// mandated by the eID-Server schema and must match case-sensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OperationsRequest {
    pub document_type: AttributeRequest,
    pub issuing_state: AttributeRequest,
    pub date_of_expiry: AttributeRequest,
    pub given_names: AttributeRequest,
    pub family_names: AttributeRequest,
    pub artistic_name: AttributeRequest,
    pub academic_title: AttributeRequest,
    pub date_of_birth: AttributeRequest,
    pub place_of_birth: AttributeRequest,
    pub nationality: AttributeRequest,
    pub birth_name: AttributeRequest,
    pub place_of_residence: AttributeRequest,
    #[serde(rename = "CommunityID")]
    pub community_id: AttributeRequest,
    pub residence_permit_i: AttributeRequest,
    #[serde(rename = "RestrictedID")]
    pub restricted_id: AttributeRequest,
    pub age_verification: AttributeRequest,
    pub place_verification: AttributeRequest,
}

impl OperationsRequest {
    /// All operations in schema order, paired with their wire element names.
    pub fn entries(&self) -> [(&'static str, AttributeRequest); 17] {
        [
            ("DocumentType", self.document_type),
            ("IssuingState", self.issuing_state),
            ("DateOfExpiry", self.date_of_expiry),
            ("GivenNames", self.given_names),
            ("FamilyNames", self.family_names),
            ("ArtisticName", self.artistic_name),
            ("AcademicTitle", self.academic_title),
            ("DateOfBirth", self.date_of_birth),
            ("PlaceOfBirth", self.place_of_birth),
            ("Nationality", self.nationality),
            ("BirthName", self.birth_name),
            ("PlaceOfResidence", self.place_of_residence),
            ("CommunityID", self.community_id),
            ("ResidencePermitI", self.residence_permit_i),
            ("RestrictedID", self.restricted_id),
            ("AgeVerification", self.age_verification),
            ("PlaceVerification", self.place_verification),
        ]
    }

    /// True if at least one operation is actually requested.
    pub fn any_requested(&self) -> bool {
        self.entries()
            .iter()
            .any(|(_, v)| *v != AttributeRequest::Prohibited)
    }
}

/// Minimum-age verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeVerificationRequest {
    pub age: u32,
}

/// Community (place of residence) verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceVerificationRequest {
    pub community_id: String,
}

/// Transaction attestation request (format URI + context string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAttestationRequest {
    pub format: String,
    pub context: String,
}

/// Free-form transaction info displayed by the eID client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub info: String,
}

/// Whether a given eID type is acceptable for this authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EidTypeSelection {
    Allowed,
    Denied,
}

impl EidTypeSelection {
    pub fn as_str(self) -> &'static str {
        match self {
            EidTypeSelection::Allowed => "ALLOWED",
            EidTypeSelection::Denied => "DENIED",
        }
    }
}

/// Requested eID-type flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EidTypeRequest {
    #[serde(rename = "CardCertified", skip_serializing_if = "Option::is_none")]
    pub card_certified: Option<EidTypeSelection>,
    #[serde(rename = "SECertified", skip_serializing_if = "Option::is_none")]
    pub se_certified: Option<EidTypeSelection>,
    #[serde(rename = "SEEndorsed", skip_serializing_if = "Option::is_none")]
    pub se_endorsed: Option<EidTypeSelection>,
    #[serde(rename = "HWKeyStore", skip_serializing_if = "Option::is_none")]
    pub hw_key_store: Option<EidTypeSelection>,
}

impl EidTypeRequest {
    /// The requested types in schema order, paired with their element names.
    pub fn entries(&self) -> [(&'static str, Option<EidTypeSelection>); 4] {
        [
            ("CardCertified", self.card_certified),
            ("SECertified", self.se_certified),
            ("SEEndorsed", self.se_endorsed),
            ("HWKeyStore", self.hw_key_store),
        ]
    }
}

/// The relying party's full authentication configuration, fixed for the
/// lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationConfig {
    pub operations: OperationsRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_verification: Option<AgeVerificationRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_verification: Option<PlaceVerificationRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_attestation: Option<TransactionAttestationRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_info: Option<TransactionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_of_assurance: Option<String>,
    #[serde(default)]
    pub eid_type_request: EidTypeRequest,
}

/// One authentication attempt, persisted as a single JSON file keyed by the
/// session token.
///
/// `server_session_id`, `psk_id` and `psk_key` are empty until the useID call
/// succeeds; their presence is what distinguishes a configuration-only
/// session from an active one.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub server_session_id: String,
    #[serde(default)]
    pub psk_id: String,
    /// The PSK issued by the eID-Server. Only ever emitted inside the TC
    /// Token; never logged, never returned to the relying party.
    #[serde(default)]
    pub psk_key: String,
    #[serde(
        rename = "eCardServerAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ecard_server_address: Option<String>,
    pub config: AuthenticationConfig,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_result_major: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_result_minor: Option<String>,
}

impl Session {
    /// Creates a configuration-only session.
    pub fn new(config: AuthenticationConfig) -> Self {
        Self {
            server_session_id: String::new(),
            psk_id: String::new(),
            psk_key: String::new(),
            ecard_server_address: None,
            config,
            created_at: Utc::now(),
            client_result_major: None,
            client_result_minor: None,
        }
    }

    /// True once the useID response has been attached.
    pub fn is_active(&self) -> bool {
        !self.server_session_id.is_empty() && !self.psk_id.is_empty() && !self.psk_key.is_empty()
    }
}

// Hand-written so the PSK key can never leak through debug logging.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server_session_id", &self.server_session_id)
            .field("psk_id", &self.psk_id)
            .field("psk_key", &"<redacted>")
            .field("ecard_server_address", &self.ecard_server_address)
            .field("created_at", &self.created_at)
            .field("client_result_major", &self.client_result_major)
            .field("client_result_minor", &self.client_result_minor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthenticationConfig {
        AuthenticationConfig {
            operations: OperationsRequest {
                date_of_birth: AttributeRequest::Required,
                given_names: AttributeRequest::Allowed,
                ..OperationsRequest::default()
            },
            age_verification: Some(AgeVerificationRequest { age: 18 }),
            place_verification: None,
            transaction_attestation: None,
            transaction_info: None,
            level_of_assurance: None,
            eid_type_request: EidTypeRequest::default(),
        }
    }

    #[test]
    fn config_json_uses_protocol_field_names() {
        let json = serde_json::to_string(&config()).unwrap();
        assert!(json.contains("\"DateOfBirth\":\"REQUIRED\""));
        assert!(json.contains("\"GivenNames\":\"ALLOWED\""));
        assert!(json.contains("\"CommunityID\":\"PROHIBITED\""));
        assert!(json.contains("\"RestrictedID\":\"PROHIBITED\""));
        assert!(json.contains("\"ageVerification\":{\"age\":18}"));
    }

    #[test]
    fn config_roundtrips() {
        let c = config();
        let json = serde_json::to_string(&c).unwrap();
        let back: AuthenticationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn session_starts_inactive_and_activates_with_psk() {
        let mut s = Session::new(config());
        assert!(!s.is_active());

        s.server_session_id = "srv-1".to_string();
        s.psk_id = "psk-1".to_string();
        s.psk_key = "deadbeef".to_string();
        assert!(s.is_active());
    }

    #[test]
    fn debug_never_prints_psk_key() {
        let mut s = Session::new(config());
        s.psk_key = "super-secret-psk".to_string();
        let rendered = format!("{:?}", s);
        assert!(!rendered.contains("super-secret-psk"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn any_requested_is_false_for_all_prohibited() {
        assert!(!OperationsRequest::default().any_requested());
        assert!(config().operations.any_requested());
    }
}
