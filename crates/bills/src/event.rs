use serde::{Deserialize, Serialize};

use raseed_core::OwnerId;
use raseed_events::{Event, Topic};

use crate::bill::ServiceTag;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationAction {
    FetchBills,
    CreatePass,
}

impl IntegrationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationAction::FetchBills => "fetch_bills",
            IntegrationAction::CreatePass => "create_pass",
        }
    }
}

/// Published on `third-party-integration`.
///
/// `service_data` is an opaque JSON document encoded as a string; only
/// `create_pass` reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdPartyRequested {
    pub user_id: OwnerId,
    pub service: ServiceTag,
    pub action: IntegrationAction,
    #[serde(default)]
    pub service_data: String,
    #[serde(default)]
    pub requested_at: Option<String>,
}

impl Event for ThirdPartyRequested {
    const TOPIC: Topic = Topic::ThirdPartyIntegration;

    fn event_type(&self) -> &'static str {
        match self.action {
            IntegrationAction::FetchBills => "third_party.fetch_bills",
            IntegrationAction::CreatePass => "third_party.create_pass",
        }
    }
}
