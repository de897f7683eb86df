//! Table writers: structured JSON plus a flat CSV or Parquet file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::builder::{Float64Builder, StringBuilder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};

use super::{AggregateError, RadiomicsTable, StructuredTable};
use crate::store::write_json_atomic;

const ROW_GROUP_SIZE: usize = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }
}

pub fn write_structured(path: &Path, table: &StructuredTable<'_>) -> Result<(), AggregateError> {
    write_json_atomic(path, table)?;
    Ok(())
}

/// Write `<dir>/<table name>.<csv|parquet>` and return its path.
pub fn write_flat(dir: &Path, table: &RadiomicsTable, format: ExportFormat) -> Result<PathBuf, AggregateError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.{}", table.name, format.extension()));
    match format {
        ExportFormat::Csv => write_csv(&path, table)?,
        ExportFormat::Parquet => write_parquet(&path, table)?,
    }
    Ok(path)
}

fn write_csv(path: &Path, table: &RadiomicsTable) -> Result<(), AggregateError> {
    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push("scan_id");
    header.extend(table.columns.iter().map(String::as_str));
    writer.write_record(&header)?;
    for row in &table.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.scan_id.clone());
        record.extend(
            row.values
                .iter()
                .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn table_schema(table: &RadiomicsTable) -> SchemaRef {
    let mut fields = Vec::with_capacity(table.columns.len() + 1);
    fields.push(Field::new("scan_id", DataType::Utf8, false));
    fields.extend(
        table
            .columns
            .iter()
            .map(|name| Field::new(name, DataType::Float64, true)),
    );
    Arc::new(Schema::new(fields))
}

fn build_batch(table: &RadiomicsTable, schema: &SchemaRef) -> Result<RecordBatch, AggregateError> {
    let mut scan_id = StringBuilder::new();
    let mut columns: Vec<Float64Builder> = table.columns.iter().map(|_| Float64Builder::new()).collect();
    for row in &table.rows {
        scan_id.append_value(&row.scan_id);
        for (builder, value) in columns.iter_mut().zip(&row.values) {
            builder.append_option(*value);
        }
    }
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len() + 1);
    arrays.push(Arc::new(scan_id.finish()));
    arrays.extend(
        columns
            .iter_mut()
            .map(|builder| Arc::new(builder.finish()) as ArrayRef),
    );
    RecordBatch::try_new(Arc::clone(schema), arrays)
        .map_err(|err| AggregateError::Parquet(format!("record batch error: {err}")))
}

fn write_parquet(path: &Path, table: &RadiomicsTable) -> Result<(), AggregateError> {
    let schema = table_schema(table);
    let props = WriterProperties::builder()
        .set_max_row_group_size(ROW_GROUP_SIZE)
        .build();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
        .map_err(|err| AggregateError::Parquet(format!("parquet writer error: {err}")))?;
    let batch = build_batch(table, &schema)?;
    writer
        .write(&batch)
        .map_err(|err| AggregateError::Parquet(format!("parquet write error: {err}")))?;
    writer
        .close()
        .map_err(|err| AggregateError::Parquet(format!("parquet finish error: {err}")))?;
    Ok(())
}
