use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// Product category.
///
/// Serialized by its display label, which is also what reports print.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Yapı Kimyasalları")]
    ConstructionChemicals,
    #[serde(rename = "Isı Yalıtım")]
    ThermalInsulation,
    #[serde(rename = "Yapıştırıcı")]
    Adhesive,
    #[serde(rename = "Dekoratif Sıva")]
    DecorativePlaster,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::ConstructionChemicals,
        Category::ThermalInsulation,
        Category::Adhesive,
        Category::DecorativePlaster,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::ConstructionChemicals => "Yapı Kimyasalları",
            Category::ThermalInsulation => "Isı Yalıtım",
            Category::Adhesive => "Yapıştırıcı",
            Category::DecorativePlaster => "Dekoratif Sıva",
        }
    }

    /// Stable ASCII key, used for storage columns and query strings.
    pub fn key(self) -> &'static str {
        match self {
            Category::ConstructionChemicals => "construction_chemicals",
            Category::ThermalInsulation => "thermal_insulation",
            Category::Adhesive => "adhesive",
            Category::DecorativePlaster => "decorative_plaster",
        }
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    /// Accepts either the display label or the ASCII key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s || c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::validation("category", format!("unknown category '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_and_keys() {
        assert_eq!("Isı Yalıtım".parse::<Category>().unwrap(), Category::ThermalInsulation);
        assert_eq!("ADHESIVE".parse::<Category>().unwrap(), Category::Adhesive);
    }

    #[test]
    fn unknown_category_is_a_field_error() {
        let err = "Boya".parse::<Category>().unwrap_err();
        assert_eq!(err.field(), Some("category"));
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(Category::DecorativePlaster.to_string(), "Dekoratif Sıva");
    }
}
