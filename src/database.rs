//! Database initialization and table definitions
//!
//! The link store and the analytics store live in one embedded redb file.
//! redb serializes write transactions, which is what makes the
//! check-then-insert in [`crate::repository`] an atomic insert-if-absent.

use redb::{Database, TableDefinition};

/// Main table for storing links
///
/// Key: short code
/// Value: JSON-serialized [`crate::model::Link`]
///
/// Example:
/// - Key: "ab12cd34"
/// - Value: '{"short_code":"ab12cd34","original_url":"https://example.com/a",...}'
pub const TABLE_LINKS: TableDefinition<&str, &str> = TableDefinition::new("links_v1");

/// Append-only table of access events
///
/// Key: surrogate id, assigned as last id + 1 inside the write transaction
/// Value: JSON-serialized [`crate::model::AnalyticsEvent`]
pub const TABLE_ANALYTICS: TableDefinition<u64, &str> = TableDefinition::new("analytics_v1");

/// Secondary index for reading the most recent events of a short code
///
/// Key: composite key in format "{short_code}:{timestamp_micros:020}:{id:020}"
/// Value: surrogate id in [`TABLE_ANALYTICS`]
///
/// Zero padding makes lexicographic order equal to (timestamp, id) order, so a
/// reverse range scan yields newest first with ties broken by id.
pub const TABLE_ANALYTICS_INDEX: TableDefinition<&str, u64> =
    TableDefinition::new("analytics_index_v1");

/// Per-code click counters, updated in the same transaction as the event insert
pub const TABLE_CLICK_COUNTS: TableDefinition<&str, u64> = TableDefinition::new("click_counts_v1");

/// Initializes the embedded database and creates required tables
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Example
///
/// ```no_run
/// # use shortlink::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_LINKS)?;
        write_txn.open_table(TABLE_ANALYTICS)?;
        write_txn.open_table(TABLE_ANALYTICS_INDEX)?;
        write_txn.open_table(TABLE_CLICK_COUNTS)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Builds the [`TABLE_ANALYTICS_INDEX`] key for one event
pub fn analytics_index_key(short_code: &str, timestamp_micros: i64, id: u64) -> String {
    // Pre-epoch timestamps are clamped so the padded field stays sortable
    let micros = timestamp_micros.max(0);
    format!("{}:{:020}:{:020}", short_code, micros, id)
}

/// Inclusive-exclusive bounds covering every index key of `short_code`
///
/// The character '{' sorts after every digit, so "{code}:{" is an upper bound
/// for all "{code}:<digits>" keys.
pub fn analytics_index_bounds(short_code: &str) -> (String, String) {
    (format!("{}:", short_code), format!("{}:{{", short_code))
}
