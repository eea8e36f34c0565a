// Account mapping - internal account shape <-> accounting PascalCase payload
//
// Mapping table:
//   internal field     external property         rule
//   account_id         AccountID                 optional string (server-assigned)
//   code               Code                      string
//   name               Name                      string
//   account_type       Type                      uppercase keyword, unknown kept verbatim
//   description        Description               optional string
//   tax_rate           TaxRate                   stringified decimal, parse fallback 0
//   enable_payments    EnablePaymentsToAccount   native boolean
//
// Collection responses arrive wrapped: {"Accounts": [ ... ]}.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ledger account classification as used by the accounting provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccountType {
    Revenue,
    Expense,
    Asset,
    Liability,
    Bank,
    /// Provider vocabulary we do not model; kept verbatim so the value
    /// survives a round trip
    Other(String),
}

impl AccountType {
    pub fn as_str(&self) -> &str {
        match self {
            AccountType::Revenue => "REVENUE",
            AccountType::Expense => "EXPENSE",
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Bank => "BANK",
            AccountType::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "REVENUE" => AccountType::Revenue,
            "EXPENSE" => AccountType::Expense,
            "ASSET" => AccountType::Asset,
            "LIABILITY" => AccountType::Liability,
            "BANK" => AccountType::Bank,
            other => AccountType::Other(other.to_string()),
        }
    }
}

/// Internal ledger account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Externally assigned identifier; absent before the first create
    #[serde(default)]
    pub account_id: Option<String>,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub description: Option<String>,
    /// Percentage; travels as a string in the external payload
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub enable_payments: bool,
}

/// Serialize an account into the provider payload shape
pub fn to_external(account: &Account) -> Value {
    let mut payload = Map::new();
    if let Some(id) = &account.account_id {
        payload.insert("AccountID".to_string(), Value::String(id.clone()));
    }
    payload.insert("Code".to_string(), Value::String(account.code.clone()));
    payload.insert("Name".to_string(), Value::String(account.name.clone()));
    payload.insert(
        "Type".to_string(),
        Value::String(account.account_type.as_str().to_string()),
    );
    if let Some(description) = &account.description {
        payload.insert(
            "Description".to_string(),
            Value::String(description.clone()),
        );
    }
    payload.insert(
        "TaxRate".to_string(),
        Value::String(account.tax_rate.to_string()),
    );
    payload.insert(
        "EnablePaymentsToAccount".to_string(),
        Value::Bool(account.enable_payments),
    );
    Value::Object(payload)
}

/// Rebuild an account from a provider payload. Absent optional fields map
/// to `None`; a missing or unparseable `TaxRate` falls back to 0
/// (deliberately lossy, matching the external string-typed convention).
pub fn from_external(payload: &Value) -> Account {
    Account {
        account_id: string_field(payload, "AccountID"),
        code: string_field(payload, "Code").unwrap_or_default(),
        name: string_field(payload, "Name").unwrap_or_default(),
        account_type: AccountType::parse(
            string_field(payload, "Type").unwrap_or_default().as_str(),
        ),
        description: string_field(payload, "Description"),
        tax_rate: payload
            .get("TaxRate")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0),
        enable_payments: payload
            .get("EnablePaymentsToAccount")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

/// Unwrap a `{"Accounts": [...]}` collection response
pub fn from_collection(response: &Value) -> Vec<Account> {
    response
        .get("Accounts")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(from_external).collect())
        .unwrap_or_default()
}

fn string_field(payload: &Value, name: &str) -> Option<String> {
    payload.get(name).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_account() -> Account {
        Account {
            account_id: Some("acc-200".to_string()),
            code: "200".to_string(),
            name: "Cask Sales".to_string(),
            account_type: AccountType::Revenue,
            description: Some("Direct cask programme revenue".to_string()),
            tax_rate: 20.0,
            enable_payments: true,
        }
    }

    #[test]
    fn test_to_external_shape() {
        let payload = to_external(&sample_account());

        assert_eq!(payload["AccountID"], "acc-200");
        assert_eq!(payload["Code"], "200");
        assert_eq!(payload["Type"], "REVENUE");
        assert_eq!(payload["TaxRate"], "20");
        assert_eq!(payload["EnablePaymentsToAccount"], json!(true));
    }

    #[test]
    fn test_from_external_tolerates_absent_fields() {
        let account = from_external(&json!({"Code": "310", "Name": "Botanicals"}));

        assert!(account.account_id.is_none());
        assert_eq!(account.code, "310");
        assert_eq!(account.account_type, AccountType::Other(String::new()));
        assert_eq!(account.tax_rate, 0.0);
        assert!(!account.enable_payments);
    }

    #[test]
    fn test_tax_rate_fallback_on_garbage() {
        let account = from_external(&json!({
            "Code": "310",
            "Name": "Botanicals",
            "TaxRate": "fifteen"
        }));
        assert_eq!(account.tax_rate, 0.0);
    }

    #[test]
    fn test_unknown_type_survives_round_trip() {
        let account = Account {
            account_type: AccountType::Other("DIRECTCOSTS".to_string()),
            ..sample_account()
        };
        let back = from_external(&to_external(&account));
        assert_eq!(back.account_type, AccountType::Other("DIRECTCOSTS".to_string()));
    }

    #[test]
    fn test_from_collection() {
        let response = json!({
            "Accounts": [
                {"AccountID": "a1", "Code": "200", "Name": "Cask Sales", "Type": "REVENUE"},
                {"AccountID": "a2", "Code": "400", "Name": "Grain", "Type": "EXPENSE"}
            ]
        });
        let accounts = from_collection(&response);
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].account_type, AccountType::Expense);
    }

    #[test]
    fn test_from_collection_missing_wrapper() {
        assert!(from_collection(&json!({})).is_empty());
    }

    #[test]
    fn test_round_trip() {
        let account = sample_account();
        assert_eq!(from_external(&to_external(&account)), account);
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            code in "[0-9]{1,4}",
            name in "[A-Za-z ]{1,20}",
            description in proptest::option::of("[A-Za-z ]{1,30}"),
            // Finite decimals that survive Display -> parse exactly
            rate_hundredths in 0u32..10_000,
            payments in any::<bool>(),
        ) {
            let account = Account {
                account_id: None,
                code,
                name,
                account_type: AccountType::Asset,
                description,
                tax_rate: f64::from(rate_hundredths) / 100.0,
                enable_payments: payments,
            };
            prop_assert_eq!(from_external(&to_external(&account)), account);
        }
    }
}
