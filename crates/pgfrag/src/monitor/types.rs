use crate::query::CompiledQuery;
use crate::row::Row;
use std::time::Duration;

/// The kind of statement, detected from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Transaction control, DDL, anything else.
    Other,
}

impl QueryKind {
    /// Detect the statement kind from SQL text.
    ///
    /// `WITH` queries are classified by the first DML keyword found after the
    /// CTE definitions at parenthesis depth zero.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = sql.trim_start();
        if let Some(kind) = Self::from_keyword(trimmed) {
            return kind;
        }
        if !starts_with_keyword(trimmed, "WITH") {
            return QueryKind::Other;
        }

        let mut depth = 0_i32;
        for (i, ch) in trimmed.char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ if depth == 0 && (i == 0 || !is_word_byte(trimmed.as_bytes()[i - 1])) => {
                    if let Some(kind) = Self::from_keyword(&trimmed[i..]) {
                        return kind;
                    }
                }
                _ => {}
            }
        }
        QueryKind::Other
    }

    fn from_keyword(sql: &str) -> Option<Self> {
        [
            ("SELECT", QueryKind::Select),
            ("INSERT", QueryKind::Insert),
            ("UPDATE", QueryKind::Update),
            ("DELETE", QueryKind::Delete),
        ]
        .into_iter()
        .find(|(keyword, _)| starts_with_keyword(sql, keyword))
        .map(|(_, kind)| kind)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    let Some(head) = sql.get(..keyword.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(keyword)
        && sql
            .as_bytes()
            .get(keyword.len())
            .is_none_or(|b| !is_word_byte(*b))
}

/// A step of the transaction controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnEvent {
    /// `START TRANSACTION` issued for this attempt.
    Begin { attempt: u32 },
    /// `COMMIT` succeeded.
    Commit { attempt: u32 },
    /// The attempt failed and `ROLLBACK` was issued.
    Rollback { attempt: u32 },
    /// A retryable error: sleeping `delay` before attempt `attempt + 1`.
    Retry { attempt: u32, delay: Duration },
}

/// Receives execution and transaction events.
///
/// All methods default to doing nothing; implement the ones you need.
/// Listeners are called inline on the executing task, so keep them cheap.
pub trait Listener: Send + Sync {
    /// A compiled query is about to be sent.
    fn on_query(&self, query: &CompiledQuery, txn_id: Option<u64>) {
        let _ = (query, txn_id);
    }

    /// A query returned `rows` after `elapsed`.
    fn on_result(&self, query: &CompiledQuery, rows: &[Row], txn_id: Option<u64>, elapsed: Duration) {
        let _ = (query, rows, txn_id, elapsed);
    }

    /// A query failed.
    fn on_error(&self, query: &CompiledQuery, error: &crate::DbError, txn_id: Option<u64>) {
        let _ = (query, error, txn_id);
    }

    /// The transaction controller moved to a new state.
    fn on_transaction(&self, event: &TxnEvent, txn_id: u64) {
        let _ = (event, txn_id);
    }
}
