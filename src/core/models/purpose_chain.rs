use crate::core::errors::{ProtectorError, Result};

/// Ordered list of purpose strings a protector is bound to.
///
/// Immutable once built. Two chains are equal only if every element is
/// equal, and the binary encoding is length-prefixed so `["ab", "c"]`
/// and `["a", "bc"]` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PurposeChain(Vec<String>);

impl PurposeChain {
    /// Build a chain, rejecting empty chains and empty elements.
    pub fn new<I, S>(purposes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let purposes: Vec<String> = purposes.into_iter().map(Into::into).collect();
        if purposes.is_empty() || purposes.iter().any(|p| p.is_empty()) {
            return Err(ProtectorError::EmptyInput { what: "purpose" });
        }
        Ok(Self(purposes))
    }

    /// A new chain with `purpose` appended.
    pub fn extend(&self, purpose: &str) -> Result<Self> {
        if purpose.is_empty() {
            return Err(ProtectorError::EmptyInput { what: "purpose" });
        }
        let mut purposes = self.0.clone();
        purposes.push(purpose.to_string());
        Ok(Self(purposes))
    }

    pub fn purposes(&self) -> &[String] {
        &self.0
    }

    /// Canonical bytes fed to key derivation:
    /// `count: u32 BE`, then per element `len: u32 BE || utf8 bytes`.
    pub fn encode(&self) -> Vec<u8> {
        let body: usize = self.0.iter().map(|p| 4 + p.len()).sum();
        let mut out = Vec::with_capacity(4 + body);
        out.extend_from_slice(&(self.0.len() as u32).to_be_bytes());
        for purpose in &self.0 {
            out.extend_from_slice(&(purpose.len() as u32).to_be_bytes());
            out.extend_from_slice(purpose.as_bytes());
        }
        out
    }
}

impl std::fmt::Display for PurposeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(" / "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_unambiguous() {
        let a = PurposeChain::new(["ab", "c"]).unwrap();
        let b = PurposeChain::new(["a", "bc"]).unwrap();
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn encoding_layout() {
        let chain = PurposeChain::new(["ns"]).unwrap();
        assert_eq!(chain.encode(), vec![0, 0, 0, 1, 0, 0, 0, 2, b'n', b's']);
    }

    #[test]
    fn empty_chain_and_elements_are_rejected() {
        assert!(PurposeChain::new(Vec::<String>::new()).is_err());
        assert!(PurposeChain::new(["billing", ""]).is_err());
    }

    #[test]
    fn extend_appends_without_mutating() {
        let base = PurposeChain::new(["app"]).unwrap();
        let child = base.extend("billing").unwrap();
        assert_eq!(base.purposes(), ["app"]);
        assert_eq!(child.purposes(), ["app", "billing"]);
        assert!(base.extend("").is_err());
    }

    #[test]
    fn display_joins_purposes() {
        let chain = PurposeChain::new(["app", "billing"]).unwrap();
        assert_eq!(chain.to_string(), "app / billing");
    }
}
