use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy identifier: 32 hex chars drawn from the factory's seeded RNG.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(pub String);

impl StrategyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(format!("{:032x}", rng.gen::<u128>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order identifier returned by an execution sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_ids_are_seeded() {
        let a = StrategyId::random(&mut StdRng::seed_from_u64(7));
        let b = StrategyId::random(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn successive_ids_differ() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = StrategyId::random(&mut rng);
        let b = StrategyId::random(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn short_form() {
        assert_eq!(StrategyId::new("abcdef0123").short(), "abcdef01");
        assert_eq!(StrategyId::new("abc").short(), "abc");
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = StrategyId::new("deadbeef");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"deadbeef\"");
        assert_eq!(OrderId::from(12).to_string(), "12");
    }
}
