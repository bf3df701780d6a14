use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::amount;

/// Maximum category tree depth: root -> child -> grandchild.
pub const MAX_TREE_DEPTH: u32 = 3;

pub const DEFAULT_COLOR: &str = "#CCCCCC";
pub const DEFAULT_ICON: &str = "tag";

lazy_static! {
    static ref ICON_RE: Regex = Regex::new(r"^[a-z][a-z0-9-]*$").unwrap();
}

/// Category type enum — also the type of every transaction filed under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    Income,
    Expense,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Income => "income",
            CategoryType::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(CategoryType::Income),
            "expense" => Some(CategoryType::Expense),
            _ => None,
        }
    }
}

/// Validate hex color format (#RRGGBB)
pub fn validate_color_hex(color: &str) -> Result<(), ValidationError> {
    if color.len() != 7 {
        return Err(ValidationError::new("invalid_length"));
    }
    if !color.starts_with('#') {
        return Err(ValidationError::new("missing_hash"));
    }
    if !color[1..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::new("invalid_hex_chars"));
    }
    Ok(())
}

/// Validate an icon token: lowercase, digits and hyphens, max 30 chars.
pub fn validate_icon(icon: &str) -> Result<(), ValidationError> {
    if icon.is_empty() || icon.len() > 30 || !ICON_RE.is_match(icon) {
        return Err(ValidationError::new("invalid_icon"));
    }
    Ok(())
}

/// Database entity for categories
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category_type: String,
    pub parent_id: Option<Uuid>,
    pub color: String,
    pub icon: String,
    pub monthly_budget: Decimal,
    pub is_default: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn get_type(&self) -> CategoryType {
        CategoryType::parse(&self.category_type).unwrap_or(CategoryType::Expense)
    }
}

/// Request body for creating a category
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryDto {
    /// Category name (1-50 characters)
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    /// Category type — immutable once created
    pub category_type: CategoryType,

    /// Optional parent category (same user, same type, depth <= 3)
    pub parent_id: Option<Uuid>,

    /// Display color in hex format (defaults to #CCCCCC)
    pub color: Option<String>,

    /// Icon token (defaults to "tag")
    pub icon: Option<String>,

    /// Make this the default category for its type
    #[serde(default)]
    pub is_default: bool,

    /// Monthly budget (defaults to 0)
    pub monthly_budget: Option<Decimal>,
}

impl CreateCategoryDto {
    /// Validate color, icon and budget beyond what the derive covers.
    pub fn validate_fields(&self) -> Result<(), ValidationError> {
        if let Some(color) = &self.color {
            validate_color_hex(color)?;
        }
        if let Some(icon) = &self.icon {
            validate_icon(icon)?;
        }
        if let Some(budget) = &self.monthly_budget {
            amount::validate_budget(budget)?;
        }
        Ok(())
    }
}

/// Request body for updating a category (PATCH - all fields optional).
///
/// `category_type` and `parent_id` are accepted in the payload only so their
/// presence can be rejected: both are immutable after creation.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryDto {
    /// Category name
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: Option<String>,

    /// Display color in hex format
    pub color: Option<String>,

    /// Icon token
    pub icon: Option<String>,

    /// Make this the default category for its type
    pub is_default: Option<bool>,

    /// Monthly budget
    pub monthly_budget: Option<Decimal>,

    /// Immutable — any value here fails the patch
    pub category_type: Option<String>,

    /// Immutable — any value here fails the patch
    pub parent_id: Option<Uuid>,
}

impl UpdateCategoryDto {
    pub fn validate_fields(&self) -> Result<(), ValidationError> {
        if let Some(color) = &self.color {
            validate_color_hex(color)?;
        }
        if let Some(icon) = &self.icon {
            validate_icon(icon)?;
        }
        if let Some(budget) = &self.monthly_budget {
            amount::validate_budget(budget)?;
        }
        Ok(())
    }
}

/// A category with its (non-deleted) descendants attached.
#[derive(Debug, Serialize)]
pub struct CategoryTreeNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryTreeNode>,
}

/// Assemble parent->children trees from a flat set of live categories.
///
/// Children whose parent is missing from the set (deleted or never fetched)
/// are promoted to roots rather than dropped.
pub fn build_hierarchy(categories: Vec<Category>) -> Vec<CategoryTreeNode> {
    use std::collections::{HashMap, HashSet};

    let ids: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();

    let mut children_of: HashMap<Uuid, Vec<Category>> = HashMap::new();
    let mut roots: Vec<Category> = Vec::new();

    for category in categories {
        match category.parent_id {
            Some(parent_id) if ids.contains(&parent_id) => {
                children_of.entry(parent_id).or_default().push(category);
            }
            _ => roots.push(category),
        }
    }

    fn attach(
        category: Category,
        children_of: &mut std::collections::HashMap<Uuid, Vec<Category>>,
    ) -> CategoryTreeNode {
        let mut children: Vec<CategoryTreeNode> = children_of
            .remove(&category.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| attach(child, children_of))
            .collect();
        children.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        CategoryTreeNode { category, children }
    }

    let mut nodes: Vec<CategoryTreeNode> = roots
        .into_iter()
        .map(|root| attach(root, &mut children_of))
        .collect();
    nodes.sort_by(|a, b| a.category.name.cmp(&b.category.name));
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, parent_id: Option<Uuid>) -> Category {
        Category {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            category_type: "expense".to_string(),
            parent_id,
            color: DEFAULT_COLOR.to_string(),
            icon: DEFAULT_ICON.to_string(),
            monthly_budget: Decimal::ZERO,
            is_default: false,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn hierarchy_nests_children_under_parents() {
        let root = category("Food", None);
        let child = category("Snacks", Some(root.id));
        let grandchild = category("Chips", Some(child.id));

        let tree = build_hierarchy(vec![grandchild, child.clone(), root.clone()]);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].category.id, root.id);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].category.id, child.id);
        assert_eq!(tree[0].children[0].children.len(), 1);
    }

    #[test]
    fn orphaned_children_are_promoted_to_roots() {
        let missing_parent = Uuid::new_v4();
        let orphan = category("Orphan", Some(missing_parent));
        let root = category("Root", None);

        let tree = build_hierarchy(vec![orphan.clone(), root]);

        assert_eq!(tree.len(), 2);
        assert!(tree.iter().any(|n| n.category.id == orphan.id));
    }

    #[test]
    fn roots_and_children_sorted_by_name() {
        let b = category("Beta", None);
        let a = category("Alpha", None);
        let tree = build_hierarchy(vec![b, a]);
        assert_eq!(tree[0].category.name, "Alpha");
        assert_eq!(tree[1].category.name, "Beta");
    }

    #[test]
    fn icon_tokens_are_restricted() {
        assert!(validate_icon("tag").is_ok());
        assert!(validate_icon("piggy-bank2").is_ok());
        assert!(validate_icon("Tag").is_err());
        assert!(validate_icon("").is_err());
        assert!(validate_icon("has space").is_err());
    }

    #[test]
    fn color_must_be_rrggbb() {
        assert!(validate_color_hex("#CCCCCC").is_ok());
        assert!(validate_color_hex("CCCCCC").is_err());
        assert!(validate_color_hex("#CCZZCC").is_err());
        assert!(validate_color_hex("#CCC").is_err());
    }
}
