//! Success envelopes. Every body carries `"ok": true` next to its payload.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Row<T> {
  pub ok:  bool,
  pub row: T,
}

#[derive(Debug, Serialize)]
pub struct Rows<T> {
  pub ok:   bool,
  pub rows: Vec<T>,
}

/// A report whose fields sit beside `ok`.
#[derive(Debug, Serialize)]
pub struct Done<T> {
  pub ok:   bool,
  #[serde(flatten)]
  pub body: T,
}

pub fn row<T: Serialize>(row: T) -> Json<Row<T>> { Json(Row { ok: true, row }) }

pub fn rows<T: Serialize>(rows: Vec<T>) -> Json<Rows<T>> { Json(Rows { ok: true, rows }) }

pub fn done<T: Serialize>(body: T) -> Json<Done<T>> { Json(Done { ok: true, body }) }
