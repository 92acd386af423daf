//! Postal address stored as a JSON blob on supplier rows.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "box", skip_serializing_if = "Option::is_none")]
    pub box_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parse whatever the column held: an object, a JSON-encoded string of an
    /// object, or nothing. Anything unparseable or empty is treated as absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        let parsed = match value {
            Value::Object(_) => serde_json::from_value::<Address>(value.clone()).ok(),
            Value::String(text) => serde_json::from_str::<Address>(text).ok(),
            _ => None,
        };
        parsed.filter(|a| !a.is_empty())
    }

    /// One display line: "Street 12 bus 3, 9000 Gent, BE".
    pub fn one_line(&self) -> String {
        let mut street = [&self.street, &self.number]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(b) = self.box_number.as_deref() {
            street = format!("{street} bus {b}");
        }
        let place = [&self.postal_code, &self.municipality]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect::<Vec<_>>()
            .join(" ");
        [Some(street), Some(place), self.country.clone()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `deserialize_with` adapter for address columns.
pub fn lenient<'de, D>(d: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(Address::from_value))
}
