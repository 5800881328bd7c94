//! Validated configuration primitives

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Concurrency cap for one task group, with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct Concurrency(usize);

impl Concurrency {
    /// Minimum cap
    pub const MIN: usize = 1;
    /// Maximum cap
    pub const MAX: usize = 1024;
    /// A cap of one: every task in the group runs alone
    pub const SERIAL: Self = Self(1);

    /// Create a new cap with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Concurrency {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Concurrency {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// Get the cap value
    pub fn get(self) -> usize {
        self.0
    }

    /// A cap matching the current system's parallelism
    pub fn optimal() -> Self {
        Self(num_cpus::get().clamp(Self::MIN, Self::MAX))
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::optimal()
    }
}

impl TryFrom<usize> for Concurrency {
    type Error = String;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        Self::new(count)
    }
}

impl From<Concurrency> for usize {
    fn from(value: Concurrency) -> Self {
        value.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_bounds() {
        assert!(Concurrency::new(0).is_err());
        assert!(Concurrency::new(1).is_ok());
        assert!(Concurrency::new(Concurrency::MAX + 1).is_err());
        assert_eq!(Concurrency::SERIAL.get(), 1);
        assert!(Concurrency::optimal().get() >= 1);
    }
}
