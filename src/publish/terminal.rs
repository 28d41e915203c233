// src/publish/terminal.rs
//! Terminal status view redrawn on every publish tick

use super::FixSink;
use crate::{error::Result, gps::data::GpsFix};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::io::{self, Write};

/// Rows of the satellite table shown before eliding the rest
const MAX_SATELLITE_ROWS: usize = 12;

pub struct TerminalSink<W: Write + Send = io::Stdout> {
    out: W,
    started: bool,
}

impl TerminalSink<io::Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for TerminalSink<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render the fix without touching cursor or screen state
    pub fn render(&mut self, fix: &GpsFix) -> Result<()> {
        let out = &mut self.out;

        let stamp = match fix.stamp {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
            None => "No data received".to_string(),
        };

        queue!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\nDG14 Bridge - Ashtech receiver status\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor,
            Print(format!("Last Update: {}  (receiver UTC {:.2})\n\n", stamp, fix.time)),
        )?;

        queue!(
            out,
            SetForegroundColor(Color::Yellow),
            Print("POSITION:\n"),
            ResetColor,
            Print(format!("  Latitude:  {}\n", GpsFix::format_coordinate(fix.latitude, 'N', 'S'))),
            Print(format!("  Longitude: {}\n", GpsFix::format_coordinate(fix.longitude, 'E', 'W'))),
            Print(format!(
                "  Fix:       {:>12} ({})\n\n",
                fix.status.status.description(),
                fix.status.status.code()
            )),
        )?;

        queue!(
            out,
            SetForegroundColor(Color::Cyan),
            Print("MOVEMENT:\n"),
            ResetColor,
            Print(format!("  Speed:     {:>12.3} m/s\n", fix.speed)),
            Print(format!("  Track:     {:>12.1} °\n", fix.track)),
            Print(format!("  Climb:     {:>12.2} m/s\n\n", fix.climb)),
        )?;

        let [sd_lat, sd_lon, sd_alt] = fix.position_std_dev();
        queue!(
            out,
            SetForegroundColor(Color::Magenta),
            Print("QUALITY:\n"),
            ResetColor,
            Print(format!(
                "  DOP:       P {:.1}  H {:.1}  V {:.1}  T {:.1}  G {:.1}\n",
                fix.pdop, fix.hdop, fix.vdop, fix.tdop, fix.gdop
            )),
            Print(format!(
                "  Std dev:   lat {:.2} m  lon {:.2} m  alt {:.2} m ({:?})\n\n",
                sd_lat, sd_lon, sd_alt, fix.position_covariance_type
            )),
        )?;

        queue!(
            out,
            SetForegroundColor(Color::Blue),
            Print(format!("SATELLITES ({}):\n", fix.status.satellites_visible)),
            ResetColor,
            Print("   PRN  Elev   Azim   SNR\n"),
        )?;
        for sat in fix.status.satellites().take(MAX_SATELLITE_ROWS) {
            queue!(
                out,
                Print(format!(
                    "  {:>4} {:>5} {:>6} {:>5}\n",
                    sat.prn, sat.elevation, sat.azimuth, sat.snr
                ))
            )?;
        }
        let hidden = (fix.status.satellites_visible as usize).saturating_sub(MAX_SATELLITE_ROWS);
        if hidden > 0 {
            queue!(out, Print(format!("  ... {} more\n", hidden)))?;
        }

        queue!(
            out,
            SetForegroundColor(Color::Green),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\nPress Ctrl+C to exit\n"),
            ResetColor,
        )?;

        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> FixSink for TerminalSink<W> {
    fn publish(&mut self, fix: &GpsFix) -> Result<()> {
        if !self.started {
            execute!(self.out, Hide, DisableLineWrap)?;
            self.started = true;
        }
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        self.render(fix)
    }

    fn finish(&mut self) -> Result<()> {
        if self.started {
            execute!(self.out, Show, EnableLineWrap)?;
            self.started = false;
        }
        Ok(())
    }
}
