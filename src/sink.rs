//! Output side of the extractor. Records leave the process as Singer
//! messages (`SCHEMA`, `RECORD`, `STATE`), one JSON object per line.

use serde_json::{json, Value};
use std::io::{BufWriter, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write to sink: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize sink message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Accepts one record per call. The sink decides how records are persisted.
pub trait RecordSink: Send {
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &Value,
        key_properties: &[&str],
        bookmark_properties: &[&str],
    ) -> Result<(), SinkError>;

    fn write_record(&mut self, stream: &str, record: &Value) -> Result<(), SinkError>;

    /// Persists crawl progress. Everything written before the checkpoint
    /// must be durable once this returns.
    fn write_checkpoint(&mut self, state: &Value) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

pub fn schema_message(stream: &str, schema: &Value, key_properties: &[&str], bookmark_properties: &[&str]) -> Value {
    json!({
        "type": "SCHEMA",
        "stream": stream,
        "schema": schema,
        "key_properties": key_properties,
        "bookmark_properties": bookmark_properties,
    })
}

pub fn record_message(stream: &str, record: &Value) -> Value {
    json!({
        "type": "RECORD",
        "stream": stream,
        "record": record,
    })
}

pub fn state_message(state: &Value) -> Value {
    json!({
        "type": "STATE",
        "value": state,
    })
}

/// Singer JSON lines over any writer, stdout in production.
pub struct SingerSink<W: Write + Send> {
    out: BufWriter<W>,
}

impl SingerSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> SingerSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }

    fn write_line(&mut self, message: &Value) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.out.into_inner().map_err(|e| SinkError::Io(e.into_error()))
    }
}

impl<W: Write + Send> RecordSink for SingerSink<W> {
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &Value,
        key_properties: &[&str],
        bookmark_properties: &[&str],
    ) -> Result<(), SinkError> {
        self.write_line(&schema_message(stream, schema, key_properties, bookmark_properties))
    }

    fn write_record(&mut self, stream: &str, record: &Value) -> Result<(), SinkError> {
        self.write_line(&record_message(stream, record))
    }

    fn write_checkpoint(&mut self, state: &Value) -> Result<(), SinkError> {
        self.write_line(&state_message(state))?;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}
