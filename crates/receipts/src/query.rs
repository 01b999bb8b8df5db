use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use raseed_core::{Entity, OwnerId, QueryId};
use raseed_wallet::PassKind;

/// A free-text question (`queries` collection).
///
/// Everything but `response` (and its `updated_at` stamp) is fixed at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: QueryId,
    pub user_id: OwnerId,
    pub query: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub response: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Query {
    pub fn submitted(
        id: QueryId,
        user_id: OwnerId,
        query: impl Into<String>,
        language: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            query: query.into(),
            language: language.into(),
            response: String::new(),
            created_at: now,
            updated_at: None,
        }
    }

    pub fn is_answered(&self) -> bool {
        !self.response.is_empty()
    }
}

impl Entity for Query {
    type Id = QueryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// What the model decided the user was asking for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CookingSuggestion,
    SpendingAnalysis,
    ShoppingList,
    FinancialInsight,
    GeneralHelp,
}

impl Intent {
    /// Wallet pass kind and title derived from an answer with this intent.
    ///
    /// `general_help` and `spending_analysis` never produce a pass.
    pub fn wallet_pass(&self) -> Option<(PassKind, &'static str)> {
        match self {
            Intent::CookingSuggestion => Some((PassKind::Cooking, "Cooking Suggestions")),
            Intent::ShoppingList => Some((PassKind::Shopping, "Shopping List")),
            Intent::FinancialInsight => Some((PassKind::Insight, "Financial Insight")),
            Intent::SpendingAnalysis | Intent::GeneralHelp => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CookingSuggestion => "cooking_suggestion",
            Intent::SpendingAnalysis => "spending_analysis",
            Intent::ShoppingList => "shopping_list",
            Intent::FinancialInsight => "financial_insight",
            Intent::GeneralHelp => "general_help",
        }
    }
}

impl core::fmt::Display for Intent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema the query prompt asks the model to fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub response: String,
    pub intent: Intent,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub data: JsonValue,
}
