//! Plain data shared between the request side and the mail jobs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub email: String,
}

impl Student {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// `"Name <email>"`, the recipient form the transport expects.
    pub fn mailbox(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// A membership plan: `duration` in months, `monthly_price_cents` in BRL cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub title: String,
    pub duration: u32,
    pub monthly_price_cents: u64,
}

impl Plan {
    pub fn new(title: impl Into<String>, duration: u32, monthly_price_cents: u64) -> Self {
        Self {
            title: title.into(),
            duration,
            monthly_price_cents,
        }
    }

    pub fn total_price_cents(&self) -> u64 {
        self.monthly_price_cents.saturating_mul(u64::from(self.duration))
    }
}
