#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use fintrack_core::category::models::{CategoryType, CreateCategoryDto};
use fintrack_core::category::service::CategoryService;
use fintrack_core::config::DatabaseSettings;
use fintrack_core::transaction::models::CreateTransactionDto;

static TRACING: OnceCell<()> = OnceCell::new();

pub struct TestApp {
    pub pool: PgPool,
}

impl TestApp {
    /// Connect to the test database and bring the schema up to date.
    ///
    /// Returns `None` when `DATABASE_URL` is unset so the suite can run (as
    /// a no-op) in environments without Postgres.
    pub async fn try_new() -> Option<Self> {
        TRACING.get_or_init(|| {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
                )
                .with_test_writer()
                .try_init()
                .ok();
        });

        let settings = DatabaseSettings::from_env()?;
        let pool = settings
            .connect()
            .await
            .expect("Failed to connect to database for tests");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        Some(TestApp { pool })
    }

    /// Insert a fresh user; each test isolates its data under its own user.
    pub async fn create_user(&self) -> Uuid {
        sqlx::query_scalar("INSERT INTO users DEFAULT VALUES RETURNING id")
            .fetch_one(&self.pool)
            .await
            .expect("Failed to create test user")
    }

    /// Create a category with defaults suitable for tests.
    pub async fn create_category(
        &self,
        user_id: Uuid,
        name: &str,
        category_type: CategoryType,
    ) -> fintrack_core::category::models::Category {
        CategoryService::create(&self.pool, user_id, &category_dto(name, category_type, None))
            .await
            .expect("Failed to create test category")
    }
}

pub fn category_dto(
    name: &str,
    category_type: CategoryType,
    parent_id: Option<Uuid>,
) -> CreateCategoryDto {
    CreateCategoryDto {
        name: name.to_string(),
        category_type,
        parent_id,
        color: None,
        icon: None,
        is_default: false,
        monthly_budget: None,
    }
}

pub fn transaction_dto(
    category_id: Uuid,
    amount: &str,
    transaction_date: DateTime<Utc>,
) -> CreateTransactionDto {
    CreateTransactionDto {
        category_id,
        amount: dec(amount),
        transaction_type: None,
        description: "test transaction".to_string(),
        notes: None,
        transaction_date,
        tags: Vec::new(),
    }
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("invalid decimal literal")
}

pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}
