//! CLI definitions for Wayfinder.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use wayfinder_protocols::{Corner, Rect, Side, Size};

/// Wayfinder CLI.
#[derive(Parser)]
#[command(name = "wayfinder")]
#[command(about = "Headless runner for in-page product tours")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (defaults to ~/.wayfinder/config.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Drive the engine against a page fixture and print the event log
    Run {
        /// Page fixture (JSON)
        #[arg(long)]
        page: PathBuf,

        /// Flow definitions (JSON array)
        #[arg(long)]
        flows: PathBuf,

        /// Launcher configurations (JSON array, canonical or legacy shape)
        #[arg(long)]
        launchers: Option<PathBuf>,

        /// Launcher to activate after start, in order
        #[arg(long = "activate")]
        activate: Vec<String>,

        /// Button block to press, in order
        #[arg(long = "press")]
        press: Vec<String>,

        /// Embed key; falls back to the configured one
        #[arg(long, env = "WAYFINDER_EMBED_KEY")]
        embed_key: Option<String>,

        /// Time given to the engine after each step of the run
        #[arg(long, default_value_t = 200)]
        settle_ms: u64,
    },

    /// Compute one overlay placement and print it
    Place {
        /// Target rectangle as x,y,width,height
        #[arg(long, value_parser = parse_rect)]
        target: Option<Rect>,

        /// Overlay size as width,height
        #[arg(long, value_parser = parse_size, default_value = "320,120")]
        size: Size,

        /// Preferred side (above, below, left-of, right-of)
        #[arg(long, value_parser = parse_side, default_value = "below")]
        side: Side,

        /// Pin to a viewport corner instead of a target
        #[arg(long, value_parser = parse_corner, conflicts_with = "target")]
        corner: Option<Corner>,

        /// Corner offsets as x,y
        #[arg(long, value_parser = parse_size, default_value = "20,20")]
        offset: Size,

        /// Viewport as width,height
        #[arg(long, value_parser = parse_size, default_value = "1280,720")]
        viewport: Size,
    },

    /// Validate a configuration file
    CheckConfig {
        /// File to check; the global --config when omitted
        path: Option<PathBuf>,
    },
}

fn parse_numbers<const N: usize>(input: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {} comma separated numbers, got '{}'", N, input));
    }
    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("'{}' is not a number", part))?;
    }
    Ok(out)
}

pub(crate) fn parse_rect(input: &str) -> Result<Rect, String> {
    let [x, y, width, height] = parse_numbers::<4>(input)?;
    Ok(Rect::new(x, y, width, height))
}

pub(crate) fn parse_size(input: &str) -> Result<Size, String> {
    let [width, height] = parse_numbers::<2>(input)?;
    Ok(Size::new(width, height))
}

fn parse_kebab<T: serde::de::DeserializeOwned>(input: &str) -> Result<T, String> {
    serde_json::from_value(Value::String(input.trim().to_lowercase())).map_err(|e| e.to_string())
}

pub(crate) fn parse_side(input: &str) -> Result<Side, String> {
    parse_kebab(input)
}

pub(crate) fn parse_corner(input: &str) -> Result<Corner, String> {
    parse_kebab(input)
}
