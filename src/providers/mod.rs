// Provider integration clients
//
// Both clients share one shape: credential store + token lifecycle +
// request executor + resource mapper, composed into domain operations.

pub mod hubspot;
pub mod xero;

pub use hubspot::CrmClient;
pub use xero::{AccountingClient, Connection};
