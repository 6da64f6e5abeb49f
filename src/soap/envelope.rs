//! Typed SOAP envelope builders for the two eID-Server operations.
//!
//! Element names are schema-mandated and case-sensitive; each message gets
//! its own builder so a misspelled element is a compile-time string in one
//! place rather than a runtime surprise against a live server.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::{
    error::{AppError, Result},
    models::session::{AttributeRequest, AuthenticationConfig},
};

/// SOAP 1.1 envelope namespace.
const SOAPENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// BSI eID vocabulary namespace (TR-03130).
const EID_NS: &str = "http://bsi.bund.de/eID/";

/// Builds a `useIDRequest` envelope from the relying party's configuration.
///
/// Operations marked PROHIBITED are omitted from the wire entirely; the
/// eID-Server expects absence, not an explicit PROHIBITED value.
pub fn build_use_id_request(config: &AuthenticationConfig) -> Result<String> {
    build_envelope("useID", |w| {
        w.write_event(Event::Start(BytesStart::new("eid:useIDRequest")))?;

        w.write_event(Event::Start(BytesStart::new("eid:UseOperations")))?;
        for (name, value) in config.operations.entries() {
            if value != AttributeRequest::Prohibited {
                text_element(w, &format!("eid:{}", name), value.as_str())?;
            }
        }
        w.write_event(Event::End(BytesEnd::new("eid:UseOperations")))?;

        if let Some(age) = &config.age_verification {
            w.write_event(Event::Start(BytesStart::new("eid:AgeVerificationRequest")))?;
            text_element(w, "eid:Age", &age.age.to_string())?;
            w.write_event(Event::End(BytesEnd::new("eid:AgeVerificationRequest")))?;
        }

        if let Some(place) = &config.place_verification {
            w.write_event(Event::Start(BytesStart::new(
                "eid:PlaceVerificationRequest",
            )))?;
            text_element(w, "eid:CommunityID", &place.community_id)?;
            w.write_event(Event::End(BytesEnd::new("eid:PlaceVerificationRequest")))?;
        }

        if let Some(info) = &config.transaction_info {
            text_element(w, "eid:TransactionInfo", &info.info)?;
        }

        if let Some(attestation) = &config.transaction_attestation {
            w.write_event(Event::Start(BytesStart::new(
                "eid:TransactionAttestationRequest",
            )))?;
            text_element(
                w,
                "eid:TransactionAttestationFormat",
                &attestation.format,
            )?;
            text_element(w, "eid:TransactionContext", &attestation.context)?;
            w.write_event(Event::End(BytesEnd::new(
                "eid:TransactionAttestationRequest",
            )))?;
        }

        if let Some(loa) = &config.level_of_assurance {
            text_element(w, "eid:LevelOfAssuranceRequest", loa)?;
        }

        let eid_types = config.eid_type_request.entries();
        if eid_types.iter().any(|(_, v)| v.is_some()) {
            w.write_event(Event::Start(BytesStart::new("eid:EIDTypeRequest")))?;
            for (name, selection) in eid_types {
                if let Some(selection) = selection {
                    text_element(w, &format!("eid:{}", name), selection.as_str())?;
                }
            }
            w.write_event(Event::End(BytesEnd::new("eid:EIDTypeRequest")))?;
        }

        w.write_event(Event::End(BytesEnd::new("eid:useIDRequest")))?;
        Ok(())
    })
}

/// Builds a `getResultRequest` envelope for a server-side session.
pub fn build_get_result_request(session_id: &str, request_counter: u32) -> Result<String> {
    build_envelope("getResult", |w| {
        w.write_event(Event::Start(BytesStart::new("eid:getResultRequest")))?;

        w.write_event(Event::Start(BytesStart::new("eid:Session")))?;
        text_element(w, "eid:ID", session_id)?;
        w.write_event(Event::End(BytesEnd::new("eid:Session")))?;

        text_element(w, "eid:RequestCounter", &request_counter.to_string())?;

        w.write_event(Event::End(BytesEnd::new("eid:getResultRequest")))?;
        Ok(())
    })
}

/// Writes the shared declaration/envelope/header scaffolding around a body.
fn build_envelope<F>(operation: &'static str, body: F) -> Result<String>
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> quick_xml::Result<()>,
{
    let mut writer = Writer::new(Vec::new());

    let build = |w: &mut Writer<Vec<u8>>| -> quick_xml::Result<()> {
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut envelope = BytesStart::new("soapenv:Envelope");
        envelope.push_attribute(("xmlns:soapenv", SOAPENV_NS));
        envelope.push_attribute(("xmlns:eid", EID_NS));
        w.write_event(Event::Start(envelope))?;

        w.write_event(Event::Empty(BytesStart::new("soapenv:Header")))?;

        w.write_event(Event::Start(BytesStart::new("soapenv:Body")))?;
        body(w)?;
        w.write_event(Event::End(BytesEnd::new("soapenv:Body")))?;

        w.write_event(Event::End(BytesEnd::new("soapenv:Envelope")))?;
        Ok(())
    };

    build(&mut writer)
        .map_err(|e| AppError::Internal(format!("Failed to build {} envelope: {}", operation, e)))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| AppError::Internal(format!("Failed to build {} envelope: {}", operation, e)))
}

fn text_element(w: &mut Writer<Vec<u8>>, name: &str, value: &str) -> quick_xml::Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
