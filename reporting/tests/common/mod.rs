//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for reporting integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;

use engine::{CellValue, Database, ModelDef, Schema, ValueType};
use reporting::{ReportDefinition, ReportPage, ReportRegistry, ReportResult, ReportingSettings};

/// Test harness holding a populated database and a registry over it.
pub struct TestHarness {
    pub db: Database,
    pub registry: ReportRegistry,
    pub settings: ReportingSettings,
}

impl TestHarness {
    /// Create a harness with the sales data and no reports.
    pub fn with_sales_data() -> Self {
        let db = SalesFixture::database();
        let registry = ReportRegistry::new(db.schema());
        TestHarness {
            db,
            registry,
            settings: ReportingSettings::default(),
        }
    }

    /// Create a harness over the sales schema with no rows stored.
    pub fn empty() -> Self {
        let db = Database::new(SalesFixture::schema());
        let registry = ReportRegistry::new(db.schema());
        TestHarness {
            db,
            registry,
            settings: ReportingSettings::default(),
        }
    }

    /// Register a report, panicking if it is rejected.
    pub fn register(&mut self, slug: &str, group: &str, definition: ReportDefinition) {
        self.registry
            .register(slug, group, definition)
            .unwrap_or_else(|e| panic!("register {} failed: {}", slug, e));
    }

    pub fn view(&self, slug: &str, query_string: &str) -> ReportResult<ReportPage> {
        reporting::view_report(&self.registry, &self.db, slug, query_string, &self.settings)
    }
}

// ============================================================================
// SAMPLE DATA
// ============================================================================

pub struct SalesFixture;

impl SalesFixture {
    pub fn schema() -> Schema {
        Schema::new(vec![
            ModelDef::new("region", "region")
                .typed("name", "name", ValueType::Text)
                .display_field("name"),
            ModelDef::new("product", "product")
                .typed("name", "name", ValueType::Text)
                .typed("category", "category", ValueType::Text)
                .display_field("name"),
            ModelDef::new("sale", "sale")
                .foreign_key("region", "region", "region")
                .foreign_key("product", "product", "product")
                .typed("quantity", "quantity", ValueType::Integer)
                .typed("amount", "amount", ValueType::Integer)
                .typed("sold_on", "sold on", ValueType::Date)
                .typed("channel", "channel", ValueType::Text),
        ])
        .expect("sales schema")
    }

    pub fn regions() -> Vec<(i64, &'static str)> {
        vec![(1, "North"), (2, "South"), (3, "West")]
    }

    pub fn products() -> Vec<(i64, &'static str, &'static str)> {
        vec![(1, "Bolt", "hardware"), (2, "Nut", "hardware"), (3, "Glue", "supplies")]
    }

    /// (pk, region, product, quantity, amount, sold_on, channel)
    pub fn sales() -> Vec<(i64, i64, i64, i64, i64, &'static str, &'static str)> {
        vec![
            (1, 1, 1, 2, 10, "2024-01-10", "online"),
            (2, 1, 2, 5, 4, "2024-02-11", "store"),
            (3, 2, 1, 1, 7, "2024-03-12", "store"),
            (4, 2, 3, 3, 9, "2025-01-05", "online"),
            (5, 1, 1, 4, 12, "2025-02-06", "store"),
        ]
    }

    pub fn database() -> Database {
        let mut db = Database::new(Self::schema());
        for (pk, name) in Self::regions() {
            db.insert("region", pk, [("name", CellValue::from(name))]).expect("region");
        }
        for (pk, name, category) in Self::products() {
            db.insert(
                "product",
                pk,
                [("name", CellValue::from(name)), ("category", CellValue::from(category))],
            )
            .expect("product");
        }
        for (pk, region, product, quantity, amount, sold_on, channel) in Self::sales() {
            let sold_on = NaiveDate::parse_from_str(sold_on, "%Y-%m-%d").expect("date");
            db.insert(
                "sale",
                pk,
                [
                    ("region", CellValue::Integer(region)),
                    ("product", CellValue::Integer(product)),
                    ("quantity", CellValue::Integer(quantity)),
                    ("amount", CellValue::Integer(amount)),
                    ("sold_on", CellValue::Date(sold_on)),
                    ("channel", CellValue::from(channel)),
                ],
            )
            .expect("sale");
        }
        db
    }
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Display text of every cell in a row of cells.
pub fn texts(cells: &[engine::ViewCell]) -> Vec<String> {
    cells.iter().map(|c| c.text.clone()).collect()
}

/// Assert that a row of cells renders to the expected texts.
pub fn assert_texts(cells: &[engine::ViewCell], expected: &[&str]) {
    let actual = texts(cells);
    assert_eq!(actual, expected, "row texts differ");
}
