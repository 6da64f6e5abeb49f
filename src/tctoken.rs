//! TC Token emission (TR-03124).
//!
//! The TC Token is the bootstrap document the eID client fetches to locate
//! the eID-Server and join the session over a PSK-secured channel. It is
//! served without an XML declaration and carries no signature; TLS on the
//! serving connection is the only protection for the PSK.

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::session::Session,
};

/// PAOS binding identifier, fixed by the protocol.
const BINDING: &str = "urn:liberty:paos:2006-08";

/// RFC 4279 TLS-PSK, the only path security this deployment supports.
const PATH_SECURITY_PROTOCOL: &str = "urn:ietf:rfc:4279";

/// Renders the TC Token for an active session.
///
/// The `SessionIdentifier` is the PSK id, not the eID-Server session id;
/// that aliasing is protocol-mandated. Output is deterministic given the
/// session state, so a re-fetch serves byte-identical XML.
pub fn render_tc_token(session: &Session, config: &Config, token: &str) -> Result<String> {
    if !session.is_active() {
        return Err(AppError::Internal(
            "TC Token requested for a session without PSK material".to_string(),
        ));
    }

    let server_address = session
        .ecard_server_address
        .as_deref()
        .unwrap_or(&config.eid_server_address);
    let refresh_address = format!("{}/refresh?token={}", config.public_base_url, token);
    let error_address = format!("{}/error?token={}", config.public_base_url, token);

    let mut writer = Writer::new(Vec::new());

    let build = |w: &mut Writer<Vec<u8>>| -> quick_xml::Result<()> {
        w.write_event(Event::Start(BytesStart::new("TCTokenType")))?;
        text_element(w, "ServerAddress", server_address)?;
        text_element(w, "SessionIdentifier", &session.psk_id)?;
        text_element(w, "RefreshAddress", &refresh_address)?;
        text_element(w, "CommunicationErrorAddress", &error_address)?;
        text_element(w, "Binding", BINDING)?;
        text_element(w, "PathSecurity-Protocol", PATH_SECURITY_PROTOCOL)?;
        w.write_event(Event::Start(BytesStart::new("PathSecurity-Parameters")))?;
        text_element(w, "PSK", &session.psk_key)?;
        w.write_event(Event::End(BytesEnd::new("PathSecurity-Parameters")))?;
        w.write_event(Event::End(BytesEnd::new("TCTokenType")))?;
        Ok(())
    };

    build(&mut writer)
        .map_err(|e| AppError::Internal(format!("Failed to render TC Token: {}", e)))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| AppError::Internal(format!("Failed to render TC Token: {}", e)))
}

fn text_element(w: &mut Writer<Vec<u8>>, name: &str, value: &str) -> quick_xml::Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
