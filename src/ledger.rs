use tokio_postgres::Row;

pub const LEDGER_TABLE: &str = "ledger";
pub const LEDGER_COLUMNS: [&str; 3] = ["id", "description", "amount"];

/// One row of the ledger table. Rows are only ever inserted and bulk-deleted,
/// never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: i64,
    pub description: String,
    pub amount: i64,
}

impl TryFrom<&Row> for LedgerEntry {
    type Error = tokio_postgres::Error;

    // columns must be selected as id, description, amount
    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: row.try_get(0)?,
            description: row.try_get(1)?,
            amount: row.try_get(2)?,
        })
    }
}
