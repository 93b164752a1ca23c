//! NL-to-SQL adapters

mod sql_agent;

pub use sql_agent::{
    ensure_read_only, extract_sql, LlmSqlAgent, NO_DATA_ANSWER, SUMMARY_ROW_LIMIT,
};
