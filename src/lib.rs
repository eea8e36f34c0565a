// Stillsync - library root
//
// Token-managed sync clients for a distillery's external integrations:
// a CRM contact client and an accounting ledger client, each built from a
// credential store, token lifecycle manager, request executor and
// resource mapper.

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod providers;
