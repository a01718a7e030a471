use std::fmt;

use anyhow::{anyhow, bail, Context, Result};

use crate::config::PanelGeometry;
use crate::fonts::{Face, FontSet};
use crate::transcript::ChatRecord;

/// Channel value below which a nick color is considered unreadable against
/// the black panel.
pub const BRIGHTNESS_FLOOR: u8 = 20;

/// Narrowest wrap candidate, in characters per line.
pub const MIN_WRAP_COLS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn parse_hex(raw: &str) -> Result<Self> {
        let hex = raw
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("color '{raw}' is missing the leading '#'"))?;
        if hex.len() != 6 || !hex.is_ascii() {
            bail!("color '{raw}' is not a #RRGGBB value");
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| anyhow!("color '{raw}' has a non-hex channel"))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Lift colors that would vanish against the black panel: when every
/// channel is at or below the floor, force red to exactly the floor.
pub fn adjust_color(color: Rgb) -> Rgb {
    if color.r > BRIGHTNESS_FLOOR || color.g > BRIGHTNESS_FLOOR || color.b > BRIGHTNESS_FLOOR {
        return color;
    }
    Rgb {
        r: BRIGHTNESS_FLOOR,
        ..color
    }
}

/// Deterministic nick color for records that carry none.
pub fn generate_color(nick: &str) -> Rgb {
    let (mut r, mut g, mut b) = (0_u32, 0, 0);
    for ch in nick.chars() {
        let v = ch as u32;
        r = v % 255;
        g = v * 100 % 255;
        b = v * 200 % 255;
    }
    adjust_color(Rgb {
        r: r as u8,
        g: g as u8,
        b: b as u8,
    })
}

pub fn resolve_color(supplied: Option<&str>, nick: &str) -> Result<Rgb> {
    match supplied {
        Some(hex) => Ok(adjust_color(Rgb::parse_hex(hex)?)),
        None => Ok(generate_color(nick)),
    }
}

/// Reflow a message body to fit the pixel budget, preferring the widest
/// column count that still fits (fewer lines over narrower fill). Words
/// longer than a line are split at the column boundary.
pub fn wrap_body<F>(raw: &str, budget_px: u32, measure: F) -> Result<String>
where
    F: Fn(&str) -> u32,
{
    let words: Vec<&str> = raw.split_whitespace().collect();
    let single = words.join(" ");
    if measure(&single) <= budget_px {
        return Ok(single);
    }

    let mut best: Option<String> = None;
    let mut cols = MIN_WRAP_COLS;
    loop {
        let wrapped = wrap_at(&words, cols);
        let widest = wrapped.lines().map(&measure).max().unwrap_or(0);
        if widest > budget_px {
            return best
                .ok_or_else(|| anyhow!("message does not fit a {budget_px}px panel: {raw:?}"));
        }
        if !wrapped.contains('\n') {
            return Ok(wrapped);
        }
        best = Some(wrapped);
        cols += 1;
    }
}

fn wrap_at(words: &[&str], cols: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0_usize;

    for word in words {
        let mut rest = *word;
        while rest.chars().count() > cols {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let split = rest
                .char_indices()
                .nth(cols)
                .map(|(at, _)| at)
                .unwrap_or(rest.len());
            lines.push(rest[..split].to_owned());
            rest = &rest[split..];
        }
        if rest.is_empty() {
            continue;
        }

        let rest_len = rest.chars().count();
        if !current.is_empty() && current_len + 1 + rest_len > cols {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(rest);
        current_len += rest_len;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// A display-ready chat message. Immutable after construction; its
/// vertical position on screen is scheduler simulation state, not a field
/// here.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub time_ms: u64,
    pub nick: String,
    pub color: Rgb,
    pub raw_body: String,
    /// Word-wrapped body, newline-joined.
    pub body: String,
    pub nick_width: u32,
    pub nick_height: u32,
    pub body_width: u32,
    pub body_height: u32,
    /// Name-line height plus body height.
    pub footprint: u32,
    pub time_to_next_ms: u64,
}

impl ChatMessage {
    pub fn build(record: ChatRecord, fonts: &FontSet, panel: &PanelGeometry) -> Result<Self> {
        let color = resolve_color(record.color.as_deref(), &record.nick)?;
        let body = wrap_body(&record.body, panel.wrap_budget(), |line| {
            fonts.line_width(line, Face::Regular)
        })
        .with_context(|| {
            format!(
                "message from {} at {}ms cannot be laid out",
                record.nick, record.offset_ms
            )
        })?;

        let (nick_width, nick_height) = fonts.block_size(&record.nick, Face::Bold);
        let (body_width, body_height) = fonts.block_size(&body, Face::Regular);

        Ok(Self {
            time_ms: record.offset_ms,
            nick: record.nick,
            color,
            raw_body: record.body,
            body,
            nick_width,
            nick_height,
            body_width,
            body_height,
            footprint: panel.name_line + body_height,
            time_to_next_ms: 0,
        })
    }
}

/// Build every message in arrival order, then fill in inter-message gaps.
pub fn build_messages(
    records: Vec<ChatRecord>,
    fonts: &FontSet,
    panel: &PanelGeometry,
) -> Result<Vec<ChatMessage>> {
    let mut messages = records
        .into_iter()
        .map(|record| ChatMessage::build(record, fonts, panel))
        .collect::<Result<Vec<_>>>()?;
    compute_time_gaps(&mut messages);
    Ok(messages)
}

/// Single left-to-right pass: each gap is the next arrival minus its own;
/// the last message's gap is zero.
pub fn compute_time_gaps(messages: &mut [ChatMessage]) {
    for index in 1..messages.len() {
        let next_time = messages[index].time_ms;
        let previous = &mut messages[index - 1];
        previous.time_to_next_ms = next_time.saturating_sub(previous.time_ms);
    }
    if let Some(last) = messages.last_mut() {
        last.time_to_next_ms = 0;
    }
}
