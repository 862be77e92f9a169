use std::str::FromStr;

use anyhow::{anyhow, Result};
use onside_common::OnsideError;
use sqlx::postgres::PgRow;
use sqlx::Row;

/// Decode a TEXT column into one of the persisted enums.
pub(crate) fn text_enum<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: FromStr<Err = OnsideError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|e| anyhow!("column {column}: {e}"))
}
