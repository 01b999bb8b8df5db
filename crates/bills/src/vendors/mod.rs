//! Vendor feeds and their normalization into [`ThirdPartyBill`].
//!
//! Each vendor speaks its own JSON dialect. A feed yields one result per order so a
//! single malformed order never hides the rest of the batch.

pub mod blinkit;
pub mod zomato;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use raseed_core::{DomainResult, OwnerId};

use crate::bill::{ServiceTag, ThirdPartyBill};

/// A source of bills for one service.
pub trait BillSource: Send + Sync {
    fn service(&self) -> ServiceTag;

    /// Fetch and normalize the owner's bills, one result per vendor order.
    fn fetch(&self, owner: &OwnerId, now: DateTime<Utc>) -> Vec<DomainResult<ThirdPartyBill>>;
}

/// Fixture-backed source standing in for the live vendor APIs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FixtureBillSource {
    service: ServiceTag,
}

impl FixtureBillSource {
    pub fn new(service: ServiceTag) -> Self {
        Self { service }
    }

    fn raw_orders(&self) -> Vec<JsonValue> {
        match self.service {
            ServiceTag::Zomato => zomato::fixture_orders(),
            ServiceTag::Blinkit => blinkit::fixture_orders(),
        }
    }
}

impl BillSource for FixtureBillSource {
    fn service(&self) -> ServiceTag {
        self.service
    }

    fn fetch(&self, owner: &OwnerId, now: DateTime<Utc>) -> Vec<DomainResult<ThirdPartyBill>> {
        self.raw_orders()
            .into_iter()
            .map(|raw| match self.service {
                ServiceTag::Zomato => zomato::normalize(owner, raw, now),
                ServiceTag::Blinkit => blinkit::normalize(owner, raw, now),
            })
            .collect()
    }
}
