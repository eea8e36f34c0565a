// Contact mapping - internal contact shape <-> CRM flat property bag
//
// Mapping table:
//   internal field      external property    rule
//   email               email                string
//   first_name          firstname            optional string
//   last_name           lastname             optional string
//   phone               phone                optional string
//   company             company              optional string
//   preferred_spirits   preferred_spirits    `;`-joined list, no escaping
//   newsletter_opt_in   newsletter_opt_in    "true" / "false" string
//   loyalty_points      loyalty_points       stringified integer, parse
//                                            fallback 0 on missing/garbage

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::LIST_DELIMITER;

/// Properties requested on every CRM read/search call
pub const PROPERTY_NAMES: [&str; 8] = [
    "email",
    "firstname",
    "lastname",
    "phone",
    "company",
    "preferred_spirits",
    "newsletter_opt_in",
    "loyalty_points",
];

/// Internal contact record (the application-side shape)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    /// Preferred spirit categories (gin, rum, single malt, ...)
    #[serde(default)]
    pub preferred_spirits: Vec<String>,
    #[serde(default)]
    pub newsletter_opt_in: bool,
    #[serde(default)]
    pub loyalty_points: u32,
}

/// Flatten a contact into the CRM property bag
pub fn to_properties(contact: &Contact) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("email".to_string(), Value::String(contact.email.clone()));

    for (name, value) in [
        ("firstname", &contact.first_name),
        ("lastname", &contact.last_name),
        ("phone", &contact.phone),
        ("company", &contact.company),
    ] {
        if let Some(value) = value {
            props.insert(name.to_string(), Value::String(value.clone()));
        }
    }

    props.insert(
        "preferred_spirits".to_string(),
        Value::String(join_list(&contact.preferred_spirits)),
    );
    props.insert(
        "newsletter_opt_in".to_string(),
        Value::String(contact.newsletter_opt_in.to_string()),
    );
    props.insert(
        "loyalty_points".to_string(),
        Value::String(contact.loyalty_points.to_string()),
    );
    props
}

/// Rebuild a contact from a CRM property bag.
///
/// Total function: absent optional fields map to `None`/empty, and numeric
/// properties that are missing or unparseable fall back to 0. The fallback
/// is silently lossy; that matches the external system's contract of
/// string-typed properties and is deliberate.
pub fn from_properties(props: &Value) -> Contact {
    Contact {
        email: string_prop(props, "email").unwrap_or_default(),
        first_name: string_prop(props, "firstname"),
        last_name: string_prop(props, "lastname"),
        phone: string_prop(props, "phone"),
        company: string_prop(props, "company"),
        preferred_spirits: string_prop(props, "preferred_spirits")
            .map(|s| split_list(&s))
            .unwrap_or_default(),
        newsletter_opt_in: bool_prop(props, "newsletter_opt_in"),
        loyalty_points: u32_prop(props, "loyalty_points"),
    }
}

fn string_prop(props: &Value, name: &str) -> Option<String> {
    props.get(name).and_then(Value::as_str).map(str::to_string)
}

fn bool_prop(props: &Value, name: &str) -> bool {
    match props.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn u32_prop(props: &Value, name: &str) -> u32 {
    props
        .get(name)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn join_list(items: &[String]) -> String {
    items.join(&LIST_DELIMITER.to_string())
}

fn split_list(joined: &str) -> Vec<String> {
    joined
        .split(LIST_DELIMITER)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
