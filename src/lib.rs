//! Load tabular files into a relational store and query them with SQL.
//!
//! Files (CSV, Excel, JSON and optionally dBase) are read into a
//! [`data::datatable::DataTable`], flattened by [`data::normalizer`] so no
//! cell holds a nested value, and persisted by [`store::StoreManager`]
//! into an in-memory SQLite database or an external SQLite, MySQL or
//! SQL Server database.

pub mod commands;
pub mod config;
pub mod data;
pub mod display;
pub mod session;
pub mod store;
pub mod utils;
