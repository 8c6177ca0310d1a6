use crate::context::ContractError;
use serde_json::Value;
use soroban_sandbox::utils::symbol;
use stellar_xdr::curr::{ScMap, ScMapEntry, ScString, ScVal, ScVec, StringM};

pub struct StorageHelper;

impl StorageHelper {
    /// Convert JSON into an `ScVal`.
    ///
    /// Integers become `I64` (or `U64` above `i64::MAX`), strings that are
    /// valid symbols become `Symbol`, other strings `String`. Objects become
    /// maps with symbol keys, sorted as the host requires.
    pub fn json_to_scval(json: &Value) -> Result<ScVal, ContractError> {
        Ok(match json {
            Value::Null => ScVal::Void,
            Value::Bool(b) => ScVal::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ScVal::I64(i)
                } else if let Some(u) = n.as_u64() {
                    ScVal::U64(u)
                } else {
                    return Err(ContractError::trap(format!(
                        "floating point value {n} has no ScVal form"
                    )));
                }
            }
            Value::String(s) => match symbol(s) {
                Ok(sym) if is_symbol(s) => ScVal::Symbol(sym),
                _ => ScVal::String(ScString(StringM::try_from(s.as_str())?)),
            },
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(Self::json_to_scval)
                    .collect::<Result<Vec<_>, _>>()?;
                ScVal::Vec(Some(ScVec(items.try_into()?)))
            }
            Value::Object(fields) => {
                let mut entries = fields
                    .iter()
                    .map(|(key, value)| {
                        Ok(ScMapEntry {
                            key: ScVal::Symbol(symbol(key)?),
                            val: Self::json_to_scval(value)?,
                        })
                    })
                    .collect::<Result<Vec<_>, ContractError>>()?;
                entries.sort_by(|a, b| a.key.cmp(&b.key));
                ScVal::Map(Some(ScMap(entries.try_into()?)))
            }
        })
    }

    /// Inverse of [`Self::json_to_scval`] for the value kinds it produces.
    /// Anything else is rendered as its debug string.
    pub fn scval_to_json(value: &ScVal) -> Value {
        match value {
            ScVal::Void => Value::Null,
            ScVal::Bool(b) => Value::Bool(*b),
            ScVal::I32(i) => Value::from(*i),
            ScVal::U32(u) => Value::from(*u),
            ScVal::I64(i) => Value::from(*i),
            ScVal::U64(u) => Value::from(*u),
            ScVal::Symbol(s) => Value::String(s.0.to_utf8_string_lossy()),
            ScVal::String(s) => Value::String(s.0.to_utf8_string_lossy()),
            ScVal::Vec(Some(items)) => {
                Value::Array(items.0.iter().map(Self::scval_to_json).collect())
            }
            ScVal::Map(Some(map)) => Value::Object(
                map.0
                    .iter()
                    .map(|entry| {
                        let key = match Self::scval_to_json(&entry.key) {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        (key, Self::scval_to_json(&entry.val))
                    })
                    .collect(),
            ),
            other => Value::String(format!("{other:?}")),
        }
    }
}

fn is_symbol(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 32
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
