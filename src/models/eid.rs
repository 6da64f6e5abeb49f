//! Typed views of the eID-Server's SOAP vocabulary (BSI TR-03130).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The ResultMajor URI the eID-Server reports on success.
pub const RESULT_MAJOR_OK: &str = "http://www.bsi.bund.de/ecard/api/1.1/resultmajor#ok";

/// The eCard-API result triple carried by every SOAP response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProtocolResult {
    pub result_major: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_minor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_message: Option<String>,
}

impl ProtocolResult {
    pub fn ok() -> Self {
        Self {
            result_major: RESULT_MAJOR_OK.to_string(),
            result_minor: None,
            result_message: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result_major.ends_with("#ok")
    }
}

/// Session and PSK material issued by a successful useID call.
#[derive(Clone)]
pub struct UseIdSession {
    pub session_id: String,
    pub psk_id: String,
    pub psk_key: String,
    pub ecard_server_address: Option<String>,
}

// PSK key redacted; this type crosses tracing-instrumented code paths.
impl std::fmt::Debug for UseIdSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UseIdSession")
            .field("session_id", &self.session_id)
            .field("psk_id", &self.psk_id)
            .field("psk_key", &"<redacted>")
            .field("ecard_server_address", &self.ecard_server_address)
            .finish()
    }
}

/// The parsed outcome of a useID call.
///
/// `session` is present whenever the server supplied complete session/PSK
/// material; callers must check `result` before trusting it.
#[derive(Debug, Clone)]
pub struct UseIdOutcome {
    pub result: ProtocolResult,
    pub session: Option<UseIdSession>,
}

/// A date as delivered on the chip: always a display string, optionally an
/// ISO date when the chip carries a full value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChipDate {
    pub date_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_value: Option<String>,
}

/// A structured address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StructuredPlace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

impl StructuredPlace {
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.country.is_none()
            && self.zip_code.is_none()
    }
}

/// A place of birth or residence: structured, free text, or explicitly
/// absent from the chip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeneralPlace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_place: Option<StructuredPlace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freetext_place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_place_info: Option<String>,
}

impl GeneralPlace {
    pub fn is_empty(&self) -> bool {
        self.structured_place.is_none()
            && self.freetext_place.is_none()
            && self.no_place_info.is_none()
    }
}

/// The card holder's restricted (pseudonymous) identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedId {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "ID2", default, skip_serializing_if = "Option::is_none")]
    pub id2: Option<String>,
}

/// Personal data groups read from the chip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersonalData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuing_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_expiry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_names: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_names: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artistic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<ChipDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_of_birth: Option<GeneralPlace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_of_residence: Option<GeneralPlace>,
    #[serde(rename = "CommunityID", default, skip_serializing_if = "Option::is_none")]
    pub community_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residence_permit_i: Option<String>,
    #[serde(rename = "RestrictedID", default, skip_serializing_if = "Option::is_none")]
    pub restricted_id: Option<RestrictedId>,
}

impl PersonalData {
    pub fn is_empty(&self) -> bool {
        *self == PersonalData::default()
    }
}

/// Fulfilment flag for age or place verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VerificationResult {
    pub fulfils_request: bool,
}

/// Transaction attestation echoed back by the eID-Server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionAttestationResponse {
    pub transaction_attestation_format: String,
    pub transaction_attestation_data: String,
}

/// The parsed body of a getResultResponse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResultResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_data: Option<PersonalData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfils_age_verification: Option<VerificationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfils_place_verification: Option<VerificationResult>,
    /// Per-attribute ALLOWED / PROHIBITED / NOTONCHIP status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations_allowed_by_user: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_attestation_response: Option<TransactionAttestationResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_of_assurance_result: Option<String>,
    /// eID types reported as USED.
    #[serde(
        rename = "EIDTypeResponse",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub eid_type_response: Option<BTreeMap<String, String>>,
    pub result: ProtocolResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_sentinel_matches_itself() {
        assert!(ProtocolResult::ok().is_ok());
    }

    #[test]
    fn error_majors_are_not_ok() {
        let r = ProtocolResult {
            result_major: "http://www.bsi.bund.de/ecard/api/1.1/resultmajor#error".to_string(),
            result_minor: None,
            result_message: None,
        };
        assert!(!r.is_ok());
    }

    #[test]
    fn get_result_response_serializes_protocol_names() {
        let resp = GetResultResponse {
            fulfils_age_verification: Some(VerificationResult {
                fulfils_request: true,
            }),
            result: ProtocolResult::ok(),
            ..GetResultResponse::default()
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"FulfilsAgeVerification\":{\"FulfilsRequest\":true}"));
        assert!(json.contains("\"ResultMajor\""));
    }

    #[test]
    fn use_id_session_debug_redacts_psk() {
        let s = UseIdSession {
            session_id: "s".to_string(),
            psk_id: "p".to_string(),
            psk_key: "topsecret".to_string(),
            ecard_server_address: None,
        };
        assert!(!format!("{:?}", s).contains("topsecret"));
    }
}
