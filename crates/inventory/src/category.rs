/// Categories whose items get a `stock_item` wallet pass.
///
/// Category tags are free-form (they come from the extraction model or the user),
/// so classification normalizes case and accepts the common synonyms.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PerishableCategory {
    Dairy,
    Produce,
    Meat,
    Seafood,
    Bakery,
    Frozen,
    Beverages,
}

impl PerishableCategory {
    pub fn classify(category: &str) -> Option<Self> {
        let normalized = category.trim().to_ascii_lowercase();
        let cat = match normalized.as_str() {
            "dairy" | "dairy_products" => PerishableCategory::Dairy,
            "produce" | "fruits" | "vegetables" => PerishableCategory::Produce,
            "meat" | "meat_products" => PerishableCategory::Meat,
            "seafood" | "fish" => PerishableCategory::Seafood,
            "bakery" => PerishableCategory::Bakery,
            "frozen" => PerishableCategory::Frozen,
            "beverages" => PerishableCategory::Beverages,
            _ => return None,
        };
        Some(cat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonyms_map_to_canonical_categories() {
        assert_eq!(PerishableCategory::classify("fruits"), Some(PerishableCategory::Produce));
        assert_eq!(PerishableCategory::classify("Dairy_Products"), Some(PerishableCategory::Dairy));
        assert_eq!(PerishableCategory::classify(" fish "), Some(PerishableCategory::Seafood));
    }

    #[test]
    fn non_perishables_are_rejected() {
        for cat in ["grains", "electronics", "", "service"] {
            assert_eq!(PerishableCategory::classify(cat), None, "{cat}");
        }
    }
}
