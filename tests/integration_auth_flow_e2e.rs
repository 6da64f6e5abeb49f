//! End-to-end flow tests: the real router and session store talking to a
//! stub eID-Server over loopback HTTP.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use once_cell::sync::Lazy;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use eid_broker::{
    app,
    config::{Config, TlsMode},
    state::AppState,
};

static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
});

const USE_ID_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:eid="http://bsi.bund.de/eID/">
  <soapenv:Body>
    <eid:useIDResponse>
      <eid:Session><eid:ID>SRV-SESSION-1</eid:ID></eid:Session>
      <eid:PSK>
        <eid:ID>PSK-ID-1</eid:ID>
        <eid:Key>0123456789ABCDEF</eid:Key>
      </eid:PSK>
      <eid:Result>
        <eid:ResultMajor>http://www.bsi.bund.de/ecard/api/1.1/resultmajor#ok</eid:ResultMajor>
      </eid:Result>
    </eid:useIDResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;

const USE_ID_ERROR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:eid="http://bsi.bund.de/eID/">
  <soapenv:Body>
    <eid:useIDResponse>
      <eid:Result>
        <eid:ResultMajor>http://www.bsi.bund.de/ecard/api/1.1/resultmajor#error</eid:ResultMajor>
        <eid:ResultMinor>http://www.bsi.bund.de/eid/server/2.0/resultminor/useID/tooManyOpenSessions</eid:ResultMinor>
      </eid:Result>
    </eid:useIDResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;

const GET_RESULT_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:eid="http://bsi.bund.de/eID/">
  <soapenv:Body>
    <eid:getResultResponse>
      <eid:PersonalData>
        <eid:GivenNames>ERIKA</eid:GivenNames>
        <eid:FamilyNames>MUSTERMANN</eid:FamilyNames>
        <eid:DateOfBirth><eid:DateString>19640812</eid:DateString></eid:DateOfBirth>
      </eid:PersonalData>
      <eid:FulfilsAgeVerification>
        <eid:FulfilsRequest>true</eid:FulfilsRequest>
      </eid:FulfilsAgeVerification>
      <eid:Result>
        <eid:ResultMajor>http://www.bsi.bund.de/ecard/api/1.1/resultmajor#ok</eid:ResultMajor>
      </eid:Result>
    </eid:getResultResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;

/// A minimal eID-Server double answering both SOAP operations with canned
/// envelopes and counting the calls it sees.
#[derive(Clone)]
struct StubEidServer {
    use_id_body: &'static str,
    get_result_body: &'static str,
    use_id_calls: Arc<AtomicUsize>,
    get_result_calls: Arc<AtomicUsize>,
}

async fn stub_soap_endpoint(State(stub): State<StubEidServer>, body: String) -> impl IntoResponse {
    let reply = if body.contains("useIDRequest") {
        stub.use_id_calls.fetch_add(1, Ordering::SeqCst);
        stub.use_id_body
    } else {
        assert!(body.contains("getResultRequest"), "unexpected SOAP body: {body}");
        stub.get_result_calls.fetch_add(1, Ordering::SeqCst);
        stub.get_result_body
    };
    ([(header::CONTENT_TYPE, "text/xml;charset=UTF-8")], reply)
}

async fn spawn_stub(use_id_body: &'static str, get_result_body: &'static str) -> (String, StubEidServer) {
    let stub = StubEidServer {
        use_id_body,
        get_result_body,
        use_id_calls: Arc::new(AtomicUsize::new(0)),
        get_result_calls: Arc::new(AtomicUsize::new(0)),
    };

    let router = axum::Router::new()
        .route("/eIDService", post(stub_soap_endpoint))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}/eIDService", addr), stub)
}

/// Boots the real application against the given eID-Server URL and returns
/// its public base URL.
async fn spawn_app(eid_server_url: String) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let config = Config {
        eid_server_url,
        eid_server_address: "https://eid.example/eIDService".to_string(),
        public_base_url: base_url.clone(),
        tls_mode: TlsMode::Normal,
        client_cert: None,
        client_key: None,
        ca_bundle: None,
        accept_invalid_certs: true,
        session_dir: std::env::temp_dir().join(format!("eid-broker-e2e-{}", Uuid::new_v4())),
        port: addr.port(),
    };

    let state = AppState::new(&config).await.unwrap();
    let router = app::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    base_url
}

fn start_payload() -> Value {
    json!({
        "operations": {
            "DateOfBirth": "REQUIRED",
            "FamilyNames": "ALLOWED",
            "GivenNames": "PROHIBITED",
            "AgeVerification": "REQUIRED"
        },
        "ageVerification": { "age": 18 }
    })
}

#[tokio::test]
async fn full_flow_start_tctoken_refresh_result() {
    let (eid_url, stub) = spawn_stub(USE_ID_OK, GET_RESULT_OK).await;
    let base = spawn_app(eid_url).await;

    // Step 1: relying party starts an authentication.
    let start = CLIENT
        .post(format!("{}/auth/start", base))
        .json(&start_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(start.status().as_u16(), 200, "start failed");
    let start_body: Value = start.json().await.unwrap();
    let token = start_body["token"].as_str().unwrap().to_string();
    let tc_token_url = start_body["tcTokenUrl"].as_str().unwrap().to_string();
    assert!(tc_token_url.contains(&format!("/tctoken?token={}", token)));

    // Step 2: the eID client fetches the TC Token, triggering useID.
    let tctoken = CLIENT.get(&tc_token_url).send().await.unwrap();
    assert_eq!(tctoken.status().as_u16(), 200);
    assert_eq!(
        tctoken.headers()[header::CONTENT_TYPE],
        "text/xml; charset=UTF-8"
    );
    let first_xml = tctoken.text().await.unwrap();
    assert!(!first_xml.contains("<?xml"));
    assert!(first_xml.contains("<SessionIdentifier>PSK-ID-1</SessionIdentifier>"));
    assert!(first_xml.contains("<PathSecurity-Parameters><PSK>0123456789ABCDEF</PSK></PathSecurity-Parameters>"));
    assert_eq!(stub.use_id_calls.load(Ordering::SeqCst), 1);

    // Step 3: a client retry re-emits identical XML without a second useID.
    let retry = CLIENT.get(&tc_token_url).send().await.unwrap();
    assert_eq!(retry.status().as_u16(), 200);
    assert_eq!(retry.text().await.unwrap(), first_xml);
    assert_eq!(stub.use_id_calls.load(Ordering::SeqCst), 1);

    // Step 4: the browser comes back through the refresh callback.
    let refresh = CLIENT
        .get(format!("{}/refresh", base))
        .query(&[
            ("token", token.as_str()),
            (
                "ResultMajor",
                "http://www.bsi.bund.de/ecard/api/1.1/resultmajor#ok",
            ),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(refresh.status().as_u16(), 302);
    let location = refresh.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.ends_with(&format!("/results?token={}", token)));

    // Step 5: the relying party fetches the result.
    let result = CLIENT
        .get(format!("{}/result", base))
        .query(&[("token", token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(result.status().as_u16(), 200);
    let body: Value = result.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["ageVerification"]["FulfilsRequest"], true);
    assert_eq!(body["personalData"]["GivenNames"], "ERIKA");
    assert_eq!(body["personalData"]["DateOfBirth"]["DateString"], "19640812");
    assert_eq!(body["config"]["operations"]["DateOfBirth"], "REQUIRED");
    assert_eq!(stub.get_result_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn use_id_error_keeps_session_retryable() {
    let (eid_url, stub) = spawn_stub(USE_ID_ERROR, GET_RESULT_OK).await;
    let base = spawn_app(eid_url).await;

    let start: Value = CLIENT
        .post(format!("{}/auth/start", base))
        .json(&start_payload())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = start["token"].as_str().unwrap().to_string();

    let tctoken = CLIENT
        .get(format!("{}/tctoken", base))
        .query(&[("token", token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(tctoken.status().as_u16(), 400);
    let body = tctoken.text().await.unwrap();
    assert!(body.contains("resultmajor#error"), "body should cite the reported code: {body}");

    // The session survived the failed promotion; a second fetch tries
    // useID again rather than answering 404.
    let retry = CLIENT
        .get(format!("{}/tctoken", base))
        .query(&[("token", token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(retry.status().as_u16(), 400);
    assert_eq!(stub.use_id_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn client_reported_error_short_circuits_get_result() {
    let (eid_url, stub) = spawn_stub(USE_ID_OK, GET_RESULT_OK).await;
    let base = spawn_app(eid_url).await;

    let start: Value = CLIENT
        .post(format!("{}/auth/start", base))
        .json(&start_payload())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = start["token"].as_str().unwrap().to_string();

    CLIENT
        .get(format!("{}/tctoken", base))
        .query(&[("token", token.as_str())])
        .send()
        .await
        .unwrap();

    let refresh = CLIENT
        .get(format!("{}/refresh", base))
        .query(&[
            ("token", token.as_str()),
            (
                "ResultMajor",
                "http://www.bsi.bund.de/ecard/api/1.1/resultmajor#error",
            ),
            (
                "ResultMinor",
                "http://www.bsi.bund.de/ecard/api/1.1/resultminor/sal#cancellationByUser",
            ),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(refresh.status().as_u16(), 302);

    let result = CLIENT
        .get(format!("{}/result", base))
        .query(&[("token", token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(result.status().as_u16(), 200);
    let body: Value = result.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(
        body["result"]["ResultMajor"].as_str().unwrap().ends_with("#error")
    );
    assert!(
        body["result"]["ResultMessage"].as_str().unwrap().contains("eID-Client reported an error")
    );
    // getResult was never attempted.
    assert_eq!(stub.get_result_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_and_malformed_tokens_are_rejected() {
    let (eid_url, _stub) = spawn_stub(USE_ID_OK, GET_RESULT_OK).await;
    let base = spawn_app(eid_url).await;

    let unknown = Uuid::new_v4().to_string();
    for path in ["tctoken", "refresh", "result"] {
        let response = CLIENT
            .get(format!("{}/{}", base, path))
            .query(&[("token", unknown.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404, "{path} should 404");
    }

    let traversal = CLIENT
        .get(format!("{}/tctoken", base))
        .query(&[("token", "../../../../etc/passwd")])
        .send()
        .await
        .unwrap();
    assert_eq!(traversal.status().as_u16(), 400);
}

#[tokio::test]
async fn start_without_operations_is_invalid_configuration() {
    let (eid_url, _stub) = spawn_stub(USE_ID_OK, GET_RESULT_OK).await;
    let base = spawn_app(eid_url).await;

    let response = CLIENT
        .post(format!("{}/auth/start", base))
        .json(&json!({ "ageVerification": { "age": 18 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid configuration"));
}
