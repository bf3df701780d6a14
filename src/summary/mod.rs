pub mod models;
pub mod projection;
pub mod service;

pub use models::{
    CategoryBreakdownEntry, ListResult, Page, Pagination, Sort, SortDir, SortField, Summary,
    TransactionFilters,
};
pub use projection::SummaryProjection;
pub use service::SummaryService;
