//! Built-in catalog for the e-commerce warehouse.
//!
//! Four independent dimensions, `dim_campaign` on top of customer/product/
//! seller, `fact_sales` on top of every base dimension, and three facts
//! derived from sales.

use crate::pipelines::catalog::{CatalogFile, PipelineEntry};

/// Table loads and their dependencies, in declaration order.
pub const WAREHOUSE_TABLES: &[(&str, &[&str])] = &[
    ("dim_date", &[]),
    ("dim_customer", &[]),
    ("dim_product", &[]),
    ("dim_seller", &[]),
    ("dim_campaign", &["dim_customer", "dim_product", "dim_seller"]),
    (
        "fact_sales",
        &["dim_date", "dim_customer", "dim_product", "dim_seller"],
    ),
    ("fact_inventory", &["fact_sales"]),
    ("fact_cart", &["fact_sales"]),
    ("fact_marketing", &["fact_sales"]),
];

/// Each table is loaded by its own module: `python -m pipelines.<table>`.
pub fn default_catalog() -> CatalogFile {
    CatalogFile {
        pipelines: WAREHOUSE_TABLES
            .iter()
            .map(|(name, deps)| {
                PipelineEntry::new(name, &format!("python -m pipelines.{}", name), deps)
            })
            .collect(),
    }
}
