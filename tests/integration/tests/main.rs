//! End-to-end integration tests.
//!
//! The SSO and SOAP tests drive the full application router in process;
//! the SP client tests run the TLS server on a local port.

mod soap_services;
mod sp_client;
mod sso_flows;
