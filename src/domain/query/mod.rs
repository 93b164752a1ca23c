//! Natural-language query domain - SQL agent trait and query results

mod agent;
mod result;

pub use agent::{InvoiceQueryAgent, QueryAnswer, QueryError};
pub use result::QueryResult;

#[cfg(test)]
pub use agent::MockInvoiceQueryAgent;
