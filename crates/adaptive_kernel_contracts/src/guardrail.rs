#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::ContractViolation;

/// Policy identifier of the form `AMG-###`.
///
/// Stored as its number so ordering by value equals ordering by the rendered
/// fixed-width text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GuardrailId(u16);

impl GuardrailId {
    pub const PREFIX: &'static str = "AMG-";
    pub const MAX_NUMBER: u16 = 999;

    pub const fn new(number: u16) -> Option<Self> {
        if number > Self::MAX_NUMBER {
            return None;
        }
        Some(Self(number))
    }

    pub fn number(self) -> u16 {
        self.0
    }

    pub fn parse(value: &str) -> Result<Self, ContractViolation> {
        let digits = value
            .strip_prefix(Self::PREFIX)
            .ok_or(ContractViolation::InvalidValue {
                field: "guardrail_id",
                reason: "must start with AMG-",
            })?;
        if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ContractViolation::InvalidValue {
                field: "guardrail_id",
                reason: "must match AMG-### (three ASCII digits)",
            });
        }
        let number = digits
            .parse::<u16>()
            .map_err(|_| ContractViolation::InvalidValue {
                field: "guardrail_id",
                reason: "must match AMG-### (three ASCII digits)",
            })?;
        Ok(Self(number))
    }
}

/// Compile-time guardrail constant. An out-of-range number fails the build.
pub const fn amg(number: u16) -> GuardrailId {
    match GuardrailId::new(number) {
        Some(id) => id,
        None => panic!("guardrail number must be <= 999"),
    }
}

impl fmt::Display for GuardrailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", Self::PREFIX, self.0)
    }
}

impl FromStr for GuardrailId {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for GuardrailId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
