//! Defensive parsing of eID-Server SOAP responses.
//!
//! The parser walks the element path with a stack and matches on local names
//! only, so any namespace prefix the server chooses is accepted. Structural
//! problems surface as transport errors; a server-reported error result is
//! left for the orchestrator to interpret.

use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::BTreeMap;

use crate::{
    error::{AppError, Result},
    models::eid::{
        ChipDate, GeneralPlace, GetResultResponse, PersonalData, ProtocolResult, RestrictedId,
        TransactionAttestationResponse, UseIdOutcome, UseIdSession, VerificationResult,
        RESULT_MAJOR_OK,
    },
};

/// Parses a useIDResponse envelope.
///
/// Requires the `useIDResponse` body element. Session/PSK material is
/// returned only when complete; the caller decides what its absence means in
/// combination with the result code.
pub fn parse_use_id_response(xml: &str) -> Result<UseIdOutcome> {
    let mut walker = ElementWalker::new(xml);

    let mut session_id = None;
    let mut psk_id = None;
    let mut psk_key = None;
    let mut ecard_server_address = None;
    let mut result_major = None;
    let mut result_minor = None;
    let mut result_message = None;

    walker.walk("useIDResponse", |path, text| match path {
        ["Session", "ID"] => session_id = Some(text.to_string()),
        ["PSK", "ID"] => psk_id = Some(text.to_string()),
        ["PSK", "Key"] => psk_key = Some(text.to_string()),
        ["eCardServerAddress"] => ecard_server_address = Some(text.to_string()),
        ["Result", "ResultMajor"] => result_major = Some(text.to_string()),
        ["Result", "ResultMinor"] => result_minor = Some(text.to_string()),
        ["Result", "ResultMessage"] => result_message = Some(text.to_string()),
        _ => {}
    })?;

    let session = match (session_id, psk_id, psk_key) {
        (Some(session_id), Some(psk_id), Some(psk_key)) => Some(UseIdSession {
            session_id,
            psk_id,
            psk_key,
            ecard_server_address,
        }),
        _ => None,
    };

    Ok(UseIdOutcome {
        result: ProtocolResult {
            // Some eID-Servers omit the Result block on success. Defaulting
            // to the ok sentinel is a reviewed, intentional leniency kept
            // for compatibility; a present-but-different value is never
            // overridden.
            result_major: result_major.unwrap_or_else(|| RESULT_MAJOR_OK.to_string()),
            result_minor,
            result_message,
        },
        session,
    })
}

/// Parses a getResultResponse envelope.
///
/// Requires the `getResultResponse` body element; everything inside it is
/// optional on the wire and mapped onto the typed response.
pub fn parse_get_result_response(xml: &str) -> Result<GetResultResponse> {
    let mut walker = ElementWalker::new(xml);

    let mut personal = PersonalData::default();
    let mut date_of_birth: Option<ChipDate> = None;
    let mut place_of_birth = GeneralPlace::default();
    let mut place_of_residence = GeneralPlace::default();
    let mut restricted_id: Option<RestrictedId> = None;
    let mut fulfils_age: Option<bool> = None;
    let mut fulfils_place: Option<bool> = None;
    let mut operations_allowed: BTreeMap<String, String> = BTreeMap::new();
    let mut attestation_format = None;
    let mut attestation_data = None;
    let mut level_of_assurance = None;
    let mut eid_types: BTreeMap<String, String> = BTreeMap::new();
    let mut result_major = None;
    let mut result_minor = None;
    let mut result_message = None;

    walker.walk("getResultResponse", |path, text| match path {
        ["PersonalData", "DocumentType"] => personal.document_type = Some(text.to_string()),
        ["PersonalData", "IssuingState"] => personal.issuing_state = Some(text.to_string()),
        ["PersonalData", "DateOfExpiry"] => personal.date_of_expiry = Some(text.to_string()),
        ["PersonalData", "GivenNames"] => personal.given_names = Some(text.to_string()),
        ["PersonalData", "FamilyNames"] => personal.family_names = Some(text.to_string()),
        ["PersonalData", "ArtisticName"] => personal.artistic_name = Some(text.to_string()),
        ["PersonalData", "AcademicTitle"] => personal.academic_title = Some(text.to_string()),
        ["PersonalData", "Nationality"] => personal.nationality = Some(text.to_string()),
        ["PersonalData", "BirthName"] => personal.birth_name = Some(text.to_string()),
        ["PersonalData", "CommunityID"] => personal.community_id = Some(text.to_string()),
        ["PersonalData", "ResidencePermitI"] => {
            personal.residence_permit_i = Some(text.to_string())
        }
        ["PersonalData", "DateOfBirth", "DateString"] => {
            date_of_birth
                .get_or_insert_with(ChipDate::default)
                .date_string = text.to_string();
        }
        ["PersonalData", "DateOfBirth", "DateValue"] => {
            date_of_birth.get_or_insert_with(ChipDate::default).date_value =
                Some(text.to_string());
        }
        ["PersonalData", "PlaceOfBirth", rest @ ..] => {
            apply_place(&mut place_of_birth, rest, text);
        }
        ["PersonalData", "PlaceOfResidence", rest @ ..] => {
            apply_place(&mut place_of_residence, rest, text);
        }
        ["PersonalData", "RestrictedID", "ID"] => {
            restricted_id.get_or_insert_with(RestrictedId::default).id = text.to_string();
        }
        ["PersonalData", "RestrictedID", "ID2"] => {
            restricted_id.get_or_insert_with(RestrictedId::default).id2 =
                Some(text.to_string());
        }
        ["FulfilsAgeVerification", "FulfilsRequest"] => fulfils_age = Some(text == "true"),
        ["FulfilsPlaceVerification", "FulfilsRequest"] => fulfils_place = Some(text == "true"),
        ["OperationsAllowedByUser", name] => {
            operations_allowed.insert(name.to_string(), text.to_string());
        }
        ["TransactionAttestationResponse", "TransactionAttestationFormat"] => {
            attestation_format = Some(text.to_string())
        }
        ["TransactionAttestationResponse", "TransactionAttestationData"] => {
            attestation_data = Some(text.to_string())
        }
        ["LevelOfAssuranceResult"] => level_of_assurance = Some(text.to_string()),
        ["EIDTypeResponse", name] => {
            eid_types.insert(name.to_string(), text.to_string());
        }
        ["Result", "ResultMajor"] => result_major = Some(text.to_string()),
        ["Result", "ResultMinor"] => result_minor = Some(text.to_string()),
        ["Result", "ResultMessage"] => result_message = Some(text.to_string()),
        _ => {}
    })?;

    personal.date_of_birth = date_of_birth;
    if !place_of_birth.is_empty() {
        personal.place_of_birth = Some(place_of_birth);
    }
    if !place_of_residence.is_empty() {
        personal.place_of_residence = Some(place_of_residence);
    }
    personal.restricted_id = restricted_id;

    Ok(GetResultResponse {
        personal_data: (!personal.is_empty()).then_some(personal),
        fulfils_age_verification: fulfils_age.map(|fulfils_request| VerificationResult {
            fulfils_request,
        }),
        fulfils_place_verification: fulfils_place.map(|fulfils_request| VerificationResult {
            fulfils_request,
        }),
        operations_allowed_by_user: (!operations_allowed.is_empty()).then_some(operations_allowed),
        transaction_attestation_response: match (attestation_format, attestation_data) {
            (Some(format), Some(data)) => Some(TransactionAttestationResponse {
                transaction_attestation_format: format,
                transaction_attestation_data: data,
            }),
            _ => None,
        },
        level_of_assurance_result: level_of_assurance,
        eid_type_response: (!eid_types.is_empty()).then_some(eid_types),
        result: ProtocolResult {
            result_major: result_major.unwrap_or_else(|| RESULT_MAJOR_OK.to_string()),
            result_minor,
            result_message,
        },
    })
}

fn apply_place(place: &mut GeneralPlace, rest: &[&str], text: &str) {
    match rest {
        ["FreetextPlace"] => place.freetext_place = Some(text.to_string()),
        ["NoPlaceInfo"] => place.no_place_info = Some(text.to_string()),
        ["StructuredPlace", field] => {
            let structured = place.structured_place.get_or_insert_with(Default::default);
            match *field {
                "Street" => structured.street = Some(text.to_string()),
                "City" => structured.city = Some(text.to_string()),
                "State" => structured.state = Some(text.to_string()),
                "Country" => structured.country = Some(text.to_string()),
                "ZipCode" => structured.zip_code = Some(text.to_string()),
                _ => {}
            }
        }
        _ => {}
    }
}

/// Streams an envelope, tracking the element path below a required body
/// element and handing every text node to the visitor together with its
/// path relative to that element.
struct ElementWalker<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> ElementWalker<'a> {
    fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        Self { reader }
    }

    fn walk<F>(&mut self, body_element: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(&[&str], &str),
    {
        let mut path: Vec<String> = Vec::new();
        let mut saw_body_element = false;

        loop {
            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    if name == body_element {
                        saw_body_element = true;
                    }
                    path.push(name);
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().unwrap_or_default();
                    if let Some(pos) = path.iter().position(|n| n == body_element) {
                        let relative: Vec<&str> =
                            path[pos + 1..].iter().map(String::as_str).collect();
                        if !relative.is_empty() {
                            visit(&relative, text.as_ref());
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    path.pop();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(AppError::UpstreamTransport(format!(
                        "XML parse error: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        if !saw_body_element {
            return Err(AppError::UpstreamTransport(format!(
                "Response is missing the {} element",
                body_element
            )));
        }
        Ok(())
    }
}
