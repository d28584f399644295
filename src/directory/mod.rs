//! Typed access to the local directory node through `dscl` and `plutil`.

pub mod dscl;
pub mod plutil;

use std::collections::BTreeMap;
use std::io::Cursor;

use plist::Value;
use tracing::warn;

use crate::error::{Error, Result};

pub use dscl::Dscl;
pub use plutil::Plutil;

/// One directory record as `dscl -plist` prints it: attribute name to its values.
pub type AttributeMap = BTreeMap<String, Vec<String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordType {
    Users,
    Groups,
}

impl RecordType {
    pub fn path(self) -> &'static str {
        match self {
            RecordType::Users => "/Users",
            RecordType::Groups => "/Groups",
        }
    }

    pub fn record_path(self, name: &str) -> String {
        format!("{}/{name}", self.path())
    }
}

/// Look an attribute up by its bare name (`RealName`) or its fully qualified one
/// (`dsAttrTypeStandard:RealName`, `dsAttrTypeNative:ShadowHashData`).
pub fn attribute<'a>(record: &'a AttributeMap, name: &str) -> Option<&'a [String]> {
    record
        .get(name)
        .or_else(|| record.get(&format!("dsAttrTypeStandard:{name}")))
        .or_else(|| record.get(&format!("dsAttrTypeNative:{name}")))
        .map(Vec::as_slice)
}

/// First value of an attribute, if it has one.
pub fn first_value<'a>(record: &'a AttributeMap, name: &str) -> Option<&'a str> {
    attribute(record, name)?.first().map(String::as_str)
}

/// Parse `dscl -plist` output into records.
///
/// `readall` prints an array of dicts, except that a lone record comes back as a bare
/// dict and no records as an empty dict.
pub fn parse_records(output: &[u8]) -> Result<Vec<AttributeMap>> {
    if output.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    match Value::from_reader(Cursor::new(output))? {
        Value::Dictionary(dict) if dict.is_empty() => Ok(Vec::new()),
        value @ Value::Dictionary(_) => Ok(vec![to_attribute_map(&value)]),
        Value::Array(items) => Ok(items
            .iter()
            .filter(|item| item.as_dictionary().is_some())
            .map(to_attribute_map)
            .collect()),
        _ => Err(Error::Validation(
            "dscl output is neither a record nor a list of records".to_string(),
        )),
    }
}

fn to_attribute_map(value: &Value) -> AttributeMap {
    let mut map = AttributeMap::new();
    let Some(dict) = value.as_dictionary() else {
        return map;
    };

    for (key, value) in dict {
        let values = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_string)
                .map(str::to_string)
                .collect(),
            Value::String(s) => vec![s.clone()],
            _ => {
                warn!(attribute = %key, "skipping non-string directory attribute");
                continue;
            }
        };
        map.insert(key.clone(), values);
    }
    map
}
