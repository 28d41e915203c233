// src/publish/mod.rs
//! Emission sinks for the periodic fix publisher

pub mod terminal;

use crate::{
    error::Result,
    gps::data::{GpsFix, NavSatFix},
};
use serde::Serialize;
use std::io::Write;

pub use terminal::TerminalSink;

/// Receives a snapshot of the current fix on every publish tick
pub trait FixSink: Send {
    fn publish(&mut self, fix: &GpsFix) -> Result<()>;

    /// Called once when the publish loop stops
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl FixSink for Box<dyn FixSink> {
    fn publish(&mut self, fix: &GpsFix) -> Result<()> {
        (**self).publish(fix)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

#[derive(Serialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
enum Message<'a> {
    ExtendedFix(&'a GpsFix),
    Fix(&'a NavSatFix),
}

/// Writes each fix as a JSON line tagged with its topic
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    navsat: bool,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            navsat: false,
        }
    }

    /// Also emit the reduced `fix` message after every extended fix
    pub fn with_navsat(mut self, navsat: bool) -> Self {
        self.navsat = navsat;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_message(&mut self, message: &Message<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> FixSink for JsonLinesSink<W> {
    fn publish(&mut self, fix: &GpsFix) -> Result<()> {
        self.write_message(&Message::ExtendedFix(fix))?;
        if self.navsat {
            let navsat = NavSatFix::from(fix);
            self.write_message(&Message::Fix(&navsat))?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
