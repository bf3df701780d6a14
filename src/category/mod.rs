pub mod models;
pub mod service;

pub use models::{Category, CategoryTreeNode, CategoryType, CreateCategoryDto, UpdateCategoryDto};
pub use service::CategoryService;
