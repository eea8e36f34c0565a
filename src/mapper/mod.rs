// Resource mappers - translation between internal record shapes and the
// provider wire formats
//
// Layout:
// - contact: internal Contact <-> CRM flat property bag
// - account: internal Account <-> accounting PascalCase payload
//
// All functions are pure and tolerant of absent optional fields.

pub mod account;
pub mod contact;

pub use account::{Account, AccountType};
pub use contact::Contact;

/// Delimiter used for list-valued CRM properties. The target system has no
/// native list property type, so lists travel as delimiter-joined strings.
/// There is no escaping: an item that itself contains the delimiter will
/// split apart on the way back. Known lossy edge case, preserved as-is.
pub const LIST_DELIMITER: char = ';';
