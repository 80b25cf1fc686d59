//! Equipment normalization and categorization
//!
//! Access records carry a fine-grained "Access Type" (the specific tool).
//! The catalog maps legacy names onto their current name and groups tools
//! into broader equipment categories. Both levels are analyzed with the same
//! aggregation code through [`EquipmentField`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::records::EnhancedRecord;

/// Category assigned to access types not covered by the catalog
pub const OTHER_CATEGORY: &str = "Other";

/// One equipment category and the access types that belong to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub members: Vec<String>,
}

impl CategoryRule {
    fn new(category: &str, members: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Equipment naming rules, loadable from the `[equipment]` config section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentCatalog {
    /// Access types left out of equipment analysis (facility entry swipes)
    #[serde(default = "default_excluded_access_types")]
    pub excluded_access_types: Vec<String>,

    /// Categories left out of equipment analysis
    #[serde(default = "default_excluded_categories")]
    pub excluded_categories: Vec<String>,

    /// Legacy access type → current access type
    #[serde(default = "default_normalization")]
    pub normalization: BTreeMap<String, String>,

    /// Category rules, matched in order
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,
}

impl Default for EquipmentCatalog {
    fn default() -> Self {
        Self {
            excluded_access_types: default_excluded_access_types(),
            excluded_categories: default_excluded_categories(),
            normalization: default_normalization(),
            categories: default_categories(),
        }
    }
}

fn default_normalization() -> BTreeMap<String, String> {
    [
        ("Jacobs DiWire Room 220C", "Jacobs DiWire"),
        ("Jacobs Vinyl Cutter and Inkjet", "Jacobs Vinyl Cutter"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "Advanced 3D Printing",
            &["Jacobs Connex", "Jacobs Dimension", "Jacobs Form 3", "Jacobs Fortus"],
        ),
        CategoryRule::new(
            "Advanced Prototyping",
            &["Jacobs FabLight Laser", "Jacobs OMAX Waterjet", "Jacobs Shopbot"],
        ),
        CategoryRule::new("Basic 3D Printing", &["Jacobs Type A"]),
        CategoryRule::new(
            "Basic Prototyping",
            &["Jacobs DiWire", "Jacobs Inkjet", "Jacobs Vinyl Cutter"],
        ),
        CategoryRule::new("Laser Cutting", &["Jacobs Laser Access"]),
        CategoryRule::new("Metal Shop", &["Jacobs Metal Shop"]),
        CategoryRule::new("Wood Shop", &["Jacobs Wood Shop"]),
        CategoryRule::new("Entry", &["Jacobs MakerPass Access"]),
    ]
}

fn default_excluded_access_types() -> Vec<String> {
    vec!["Jacobs MakerPass Access".to_string()]
}

fn default_excluded_categories() -> Vec<String> {
    vec!["Entry".to_string()]
}

impl EquipmentCatalog {
    /// Current name for an access type (unchanged when not a legacy name)
    pub fn normalize<'a>(&'a self, access_type: &'a str) -> &'a str {
        self.normalization
            .get(access_type)
            .map(String::as_str)
            .unwrap_or(access_type)
    }

    /// Category for an access type
    ///
    /// Exact member match first; otherwise the first member (in rule order)
    /// contained case-insensitively in the access type; otherwise "Other".
    pub fn categorize(&self, access_type: &str) -> &str {
        let exact = self
            .categories
            .iter()
            .find(|rule| rule.members.iter().any(|m| m == access_type));
        if let Some(rule) = exact {
            return &rule.category;
        }

        let lowered = access_type.to_lowercase();
        self.categories
            .iter()
            .find(|rule| {
                rule.members
                    .iter()
                    .any(|m| lowered.contains(&m.to_lowercase()))
            })
            .map(|rule| rule.category.as_str())
            .unwrap_or(OTHER_CATEGORY)
    }

    /// True when a record should be left out of equipment analysis
    pub fn is_excluded(&self, access_type: &str, category: &str) -> bool {
        self.excluded_access_types.iter().any(|a| a == access_type)
            || self.excluded_categories.iter().any(|c| c == category)
    }
}

/// Grouping dimension for equipment analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipmentField {
    /// Individual tool ("Access Type" column)
    AccessType,
    /// Broader category ("Equipment_Category" column)
    Category,
}

impl EquipmentField {
    pub const ALL: [EquipmentField; 2] = [EquipmentField::AccessType, EquipmentField::Category];

    /// Column name in the enhanced dataset
    pub fn column(&self) -> &'static str {
        match self {
            EquipmentField::AccessType => "Access Type",
            EquipmentField::Category => "Equipment_Category",
        }
    }

    /// Prefix used in output file names
    pub fn file_suffix(&self) -> &'static str {
        match self {
            EquipmentField::AccessType => "access_type",
            EquipmentField::Category => "equipment_category",
        }
    }

    /// Human-readable name for chart titles and reports
    pub fn display_name(&self) -> &'static str {
        match self {
            EquipmentField::AccessType => "Equipment Type",
            EquipmentField::Category => "Equipment Category",
        }
    }

    /// Value of this field in a record
    pub fn value<'a>(&self, record: &'a EnhancedRecord) -> &'a str {
        match self {
            EquipmentField::AccessType => &record.access_type,
            EquipmentField::Category => &record.equipment_category,
        }
    }
}

impl std::fmt::Display for EquipmentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}
