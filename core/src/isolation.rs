// stockguard/src/isolation.rs

//! Transaction isolation levels and read modes accepted by every store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL standard isolation levels, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
  /// Dirty reads allowed. The reference workload's level.
  #[default]
  ReadUncommitted,
  ReadCommitted,
  /// Snapshot reads; concurrent updates to a row abort the later writer.
  RepeatableRead,
  Serializable,
}

impl IsolationLevel {
  /// The form accepted by `SET TRANSACTION ISOLATION LEVEL`.
  pub fn as_sql(&self) -> &'static str {
    match self {
      IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
      IsolationLevel::ReadCommitted => "READ COMMITTED",
      IsolationLevel::RepeatableRead => "REPEATABLE READ",
      IsolationLevel::Serializable => "SERIALIZABLE",
    }
  }

  pub fn allows_dirty_reads(&self) -> bool {
    matches!(self, IsolationLevel::ReadUncommitted)
  }

  /// Whether reads come from a snapshot fixed at transaction start.
  pub fn uses_snapshot(&self) -> bool {
    matches!(self, IsolationLevel::RepeatableRead | IsolationLevel::Serializable)
  }
}

impl fmt::Display for IsolationLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_sql())
  }
}

impl FromStr for IsolationLevel {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
      "read_uncommitted" => Ok(IsolationLevel::ReadUncommitted),
      "read_committed" => Ok(IsolationLevel::ReadCommitted),
      "repeatable_read" => Ok(IsolationLevel::RepeatableRead),
      "serializable" => Ok(IsolationLevel::Serializable),
      _ => Err(format!("unknown isolation level '{}'", s)),
    }
  }
}

/// How the coordinator reads the product row before checking stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
  /// Plain read; the check-then-decrement is only as safe as the isolation level.
  #[default]
  Plain,
  /// Lock the row on read (`SELECT ... FOR UPDATE`).
  ForUpdate,
}

impl FromStr for ReadMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
      "plain" => Ok(ReadMode::Plain),
      "for_update" => Ok(ReadMode::ForUpdate),
      _ => Err(format!("unknown read mode '{}'", s)),
    }
  }
}
