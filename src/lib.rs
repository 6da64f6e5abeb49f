//! eid-broker: authentication session orchestrator for the BSI
//! TR-03130/TR-03124 eID handshake (useID → TC Token → callback →
//! getResult).

pub mod app;
pub mod config;
pub mod error;
pub mod state;
pub mod tctoken;

pub mod models {
    pub mod eid;
    pub mod session;
}

pub mod repositories {
    pub mod session;
}

pub mod soap {
    pub mod client;
    pub mod envelope;
    pub mod response;
}

pub mod services {
    pub mod flow;
}

pub mod handlers {
    pub mod auth;
    pub mod eid_client;
}

pub mod validation {
    pub mod token;
}
