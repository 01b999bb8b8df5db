use core::str::FromStr;

use serde::{Deserialize, Serialize};

use raseed_core::DomainError;

/// Named topics carried by the event transport, one per concern.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    ReceiptProcessing,
    QueryProcessing,
    WalletPassCreation,
    StockManagement,
    NotificationEvents,
    ThirdPartyIntegration,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::ReceiptProcessing,
        Topic::QueryProcessing,
        Topic::WalletPassCreation,
        Topic::StockManagement,
        Topic::NotificationEvents,
        Topic::ThirdPartyIntegration,
    ];

    /// Wire name of the topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::ReceiptProcessing => "receipt-processing",
            Topic::QueryProcessing => "query-processing",
            Topic::WalletPassCreation => "wallet-pass-creation",
            Topic::StockManagement => "stock-management",
            Topic::NotificationEvents => "notification-events",
            Topic::ThirdPartyIntegration => "third-party-integration",
        }
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::unrecognized("topic", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
    }

    #[test]
    fn unknown_topic_is_rejected() {
        assert!(matches!(
            "receipts".parse::<Topic>(),
            Err(DomainError::Unrecognized { kind: "topic", .. })
        ));
    }
}
