//! Prism Query Executor
//!
//! Runs one logical query against one declared source and returns rows.
//! Source kinds are dispatched exhaustively; the actual drivers sit behind
//! the connector traits in [`connector`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connector;
pub mod error;
pub mod executor;
pub mod http;
pub mod sql;

pub use connector::{
    ApiConnector, ApiRequest, DatasetCatalog, FsDatasetCatalog, MemoryDatasetCatalog,
    RelationalConnector,
};
pub use error::{QueryError, QueryResult};
pub use executor::{QueryExecutor, QueryInput};
pub use http::HttpApiConnector;
pub use sql::{append_filters, build_relational_query, substitute_params};
