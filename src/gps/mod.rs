// src/gps/mod.rs
//! GPS sentence handling and fix records

pub mod ashtech;
pub mod data;
pub mod tokenizer;

pub use ashtech::{ParseOutcome, SatLayout, SentenceInterpreter, SentenceKind};
pub use data::{GpsFix, GpsStatus};
