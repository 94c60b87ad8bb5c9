//! Record <-> row conversion and key extraction.
//!
//! Records are plain serde types. A record maps to a row through its JSON
//! object form; how the record type was produced (by hand, by a derive, by a
//! generator) is invisible here.

use manta_cql::{Row, Value};
use manta_metadata::TableSpecification;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TableError;

/// Serializes a record into its row form. The record must serialize to a
/// JSON object whose keys are column names.
pub fn to_row<T: Serialize>(table: &str, record: &T) -> Result<Row, TableError> {
    let value =
        serde_json::to_value(record).map_err(|e| TableError::mapping(table, e.to_string()))?;
    match value {
        Value::Object(map) => Ok(Row {
            values: map.into_iter().collect(),
        }),
        other => Err(TableError::mapping(
            table,
            format!("record serialized to {:?}, expected an object", other),
        )),
    }
}

/// Deserializes a row into a record.
pub fn from_row<T: DeserializeOwned>(table: &str, row: &Row) -> Result<T, TableError> {
    let map: serde_json::Map<String, Value> =
        row.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    serde_json::from_value(Value::Object(map))
        .map_err(|e| TableError::mapping(table, e.to_string()))
}

/// Extracts a record's primary key as an ordered value list: partition
/// columns first in declared order, then clustering columns in declared
/// order. This ordered list is the argument shape for every point lookup.
///
/// A key column that is absent or null on the record is an error: a record
/// without a complete identity cannot be addressed.
pub fn extract_primary_key<T: Serialize>(
    spec: &TableSpecification,
    record: &T,
) -> Result<Vec<Value>, TableError> {
    let row = to_row(&spec.name, record)?;
    key_values_from_row(spec, &row)
}

/// Extracts the primary key values of `spec` from an already-decoded row.
pub fn key_values_from_row(
    spec: &TableSpecification,
    row: &Row,
) -> Result<Vec<Value>, TableError> {
    spec.primary_key_columns()
        .into_iter()
        .map(|column| match row.get(&column) {
            Some(Value::Null) | None => Err(TableError::mapping(
                &spec.name,
                format!("missing value for key column {:?}", column),
            )),
            Some(value) => Ok(value.clone()),
        })
        .collect()
}
