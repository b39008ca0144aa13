//! Database layer (SQLite).

pub mod cache;
pub mod model;
pub mod paginator;
pub mod query;
pub mod row;
pub mod value;

pub use cache::ResultCache;
pub use model::{DbModel, Model};
pub use paginator::{Page, Paginator};
pub use query::{
    Columns, Condition, Distinct, Join, JoinConstraint, JoinKind, Order, OrderBy, SelectOptions,
    Source, Statement, TableDef,
};
pub use row::Row;
pub use value::{BindType, Value};
