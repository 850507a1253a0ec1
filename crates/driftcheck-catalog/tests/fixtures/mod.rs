//! Test fixtures for catalog adapter integration tests
//!
//! A small order-management schema as a SQL Server style catalog would
//! report it: `dbo` schema, doubled default parentheses, `-1` for MAX
//! lengths.

#![allow(dead_code)]

use driftcheck_catalog::{MockAdapter, MockTable};
use driftcheck_core::{ColumnDescriptor, ForeignKeyMapping, TableIdentity};

pub fn customers() -> TableIdentity {
    TableIdentity::new("dbo", "customers")
}

pub fn orders() -> TableIdentity {
    TableIdentity::new("dbo", "orders")
}

pub fn order_lines() -> TableIdentity {
    TableIdentity::new("dbo", "order_lines")
}

/// Customers: identity key, bounded name, MAX notes column
pub fn customers_table() -> MockTable {
    let t = customers();
    MockTable::new(t.clone())
        .column(ColumnDescriptor::new(&t, "id", "int").with_precision(10).with_nullable(false))
        .column(ColumnDescriptor::new(&t, "name", "varchar").with_length(50).with_nullable(false))
        .column(ColumnDescriptor::new(&t, "notes", "nvarchar").with_length(-1))
        .column(ColumnDescriptor::new(&t, "active", "bit").with_nullable(false).with_default("((1))"))
        .primary_key(["id"])
}

/// Orders: one foreign key to customers, decimal amount
pub fn orders_table() -> MockTable {
    let t = orders();
    MockTable::new(t.clone())
        .column(ColumnDescriptor::new(&t, "id", "int").with_precision(10).with_nullable(false))
        .column(ColumnDescriptor::new(&t, "customer_id", "int").with_precision(10).with_nullable(false))
        .column(ColumnDescriptor::new(&t, "amount", "decimal").with_precision(18))
        .column(ColumnDescriptor::new(&t, "created_at", "datetime").with_default("(getdate())"))
        .primary_key(["id"])
        .foreign_key(ForeignKeyMapping::new("FK_orders_customers", "customer_id", "customers", "id"))
}

/// Order lines: composite primary key, first member also a foreign key
pub fn order_lines_table() -> MockTable {
    let t = order_lines();
    MockTable::new(t.clone())
        .column(ColumnDescriptor::new(&t, "order_id", "int").with_nullable(false))
        .column(ColumnDescriptor::new(&t, "line_no", "int").with_nullable(false))
        .column(ColumnDescriptor::new(&t, "qty", "int").with_default("((0))"))
        .primary_key(["order_id", "line_no"])
        .foreign_key(ForeignKeyMapping::new("FK_lines_orders", "order_id", "orders", "id"))
}

/// A catalog with all three tables
pub fn shop_catalog() -> MockAdapter {
    MockAdapter::new()
        .with_table(orders_table())
        .with_table(customers_table())
        .with_table(order_lines_table())
}
