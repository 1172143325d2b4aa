//! Small serde adapters for the loosely typed payloads explorers return.

use alloy::primitives::Address;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// Accepts `123` as well as `"123"`.
pub fn u64_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| D::Error::custom(format!("invalid integer '{}': {}", s, e))),
    }
}

/// Serializes an address in its EIP-55 checksummed form.
pub fn checksummed<S>(address: &Address, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&address.to_checksum(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Deserialize)]
    struct Block {
        #[serde(deserialize_with = "u64_from_number_or_string")]
        number: u64,
    }

    #[derive(Serialize)]
    struct Holder {
        #[serde(serialize_with = "checksummed")]
        address: Address,
    }

    #[test]
    fn test_number_or_string() {
        let a: Block = serde_json::from_str(r#"{"number": "17"}"#).unwrap();
        let b: Block = serde_json::from_str(r#"{"number": 17}"#).unwrap();
        assert_eq!(a.number, 17);
        assert_eq!(b.number, 17);
        assert!(serde_json::from_str::<Block>(r#"{"number": "0x11"}"#).is_err());
    }

    #[test]
    fn test_checksummed_output() {
        let address: Address = "0x982f264ce97365864181df65df4931c593a515ad".parse().unwrap();
        let json = serde_json::to_string(&Holder { address }).unwrap();
        assert_eq!(json, r#"{"address":"0x982F264ce97365864181df65dF4931C593A515ad"}"#);
    }
}
