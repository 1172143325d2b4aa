//! ABI definitions the decoder is built from. The three files ship inside
//! the binary and can be replaced by a directory at runtime.

use alloy::json_abi::JsonAbi;
use alloy::primitives::B256;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::types::EventType;

const IERC20_FILE: &str = "IERC20.json";
const ZAP_ROUTER_FILE: &str = "BeefyZapRouter.json";
const VAULT_FILE: &str = "BeefyVaultV7.json";

const BUNDLED_IERC20: &str = include_str!("../../abi/IERC20.json");
const BUNDLED_ZAP_ROUTER: &str = include_str!("../../abi/BeefyZapRouter.json");
const BUNDLED_VAULT: &str = include_str!("../../abi/BeefyVaultV7.json");

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("failed to read ABI file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse ABI {file}: {source}")]
    Parse {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("ABI {file} has no event {event}")]
    MissingEvent {
        file: &'static str,
        event: &'static str,
    },

    #[error("ABI selector for {event_type} is {from_abi}, decoder expects {expected}")]
    SelectorMismatch {
        event_type: EventType,
        from_abi: B256,
        expected: B256,
    },
}

#[derive(Debug, Clone)]
pub struct AbiSet {
    pub ierc20: JsonAbi,
    pub zap_router: JsonAbi,
    pub vault: JsonAbi,
}

fn parse(file: &'static str, content: &str) -> Result<JsonAbi, AbiError> {
    serde_json::from_str(content).map_err(|source| AbiError::Parse { file, source })
}

fn read(dir: &Path, file: &'static str) -> Result<JsonAbi, AbiError> {
    let path = dir.join(file);
    let content = std::fs::read_to_string(&path).map_err(|source| AbiError::Io {
        path: path.clone(),
        source,
    })?;
    parse(file, &content)
}

impl AbiSet {
    pub fn bundled() -> Result<Self, AbiError> {
        Ok(Self {
            ierc20: parse(IERC20_FILE, BUNDLED_IERC20)?,
            zap_router: parse(ZAP_ROUTER_FILE, BUNDLED_ZAP_ROUTER)?,
            vault: parse(VAULT_FILE, BUNDLED_VAULT)?,
        })
    }

    pub fn from_dir(dir: &Path) -> Result<Self, AbiError> {
        Ok(Self {
            ierc20: read(dir, IERC20_FILE)?,
            zap_router: read(dir, ZAP_ROUTER_FILE)?,
            vault: read(dir, VAULT_FILE)?,
        })
    }

    /// `from_dir` when a directory is given, the bundled copies otherwise.
    pub fn load(dir: Option<&Path>) -> Result<Self, AbiError> {
        match dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::bundled(),
        }
    }

    fn source(&self, event_type: EventType) -> (&'static str, &JsonAbi) {
        match event_type {
            EventType::Ierc20Transfer => (IERC20_FILE, &self.ierc20),
            EventType::BeefyZapRouterFulfilledOrder => (ZAP_ROUTER_FILE, &self.zap_router),
            EventType::BeefyVaultUpgradeStrat => (VAULT_FILE, &self.vault),
        }
    }

    /// Topic0 of `event_type` as declared in its ABI.
    pub fn topic0(&self, event_type: EventType) -> Result<B256, AbiError> {
        let (file, abi) = self.source(event_type);
        let event = event_type.event_name();
        abi.event(event)
            .and_then(|overloads| overloads.first())
            .map(|e| e.selector())
            .ok_or(AbiError::MissingEvent { file, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    #[test]
    fn test_bundled_selectors() {
        let abis = AbiSet::bundled().unwrap();
        assert_eq!(
            abis.topic0(EventType::Ierc20Transfer).unwrap(),
            b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
        );
        assert_eq!(
            abis.topic0(EventType::BeefyZapRouterFulfilledOrder).unwrap(),
            b256!("1ba5b6ed656994657175705961138c96bd8ec133c35817fa85903f450129e0b1")
        );
        assert_eq!(
            abis.topic0(EventType::BeefyVaultUpgradeStrat).unwrap(),
            b256!("7f37d440e85aba7fbf641c4bda5ca4ef669a80bffaacde2aa8d9feb1b048c82c")
        );
    }

    #[test]
    fn test_missing_dir() {
        let err = AbiSet::from_dir(Path::new("/nonexistent/abi")).unwrap_err();
        assert!(matches!(err, AbiError::Io { .. }));
    }
}
