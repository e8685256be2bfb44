use serde::{Deserialize, Serialize};

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
pub const DEFAULT_PRIORITY: u8 = 5;

/// Per-task priority, 1 (lowest) to 10 (highest), default 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobPriority(u8);

impl JobPriority {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(MIN_PRIORITY, MAX_PRIORITY))
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        Self(DEFAULT_PRIORITY)
    }
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for JobPriority {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(JobPriority::new(0).as_u8(), MIN_PRIORITY);
        assert_eq!(JobPriority::new(200).as_u8(), MAX_PRIORITY);
    }

    #[test]
    fn default_is_five() {
        assert_eq!(JobPriority::default().as_u8(), 5);
    }
}
