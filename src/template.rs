//! Output path templates.
//!
//! Syntax follows format strings: `{token}` or `{token:fmt}`, with `{{` and
//! `}}` for literal braces. Recognized tokens:
//!
//! - `tile_index[0]`, `tile_index[1]`: spatial tile index
//! - `time_period[0]`, `time_period[1]`: window start and end; an optional
//!   strftime suffix such as `:%Y%m%d` (default `%Y-%m-%d`)
//! - `name`: output product name
//!
//! Example:
//! `SR_{tile_index[0]}_{tile_index[1]}_{time_period[0]:%Y%m%d}.nc`
//! with tile (12, -5) and a window starting 2015-01-01 renders as
//! `SR_12_-5_20150101.nc`.

use crate::windows::TimeWindow;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveTime};
use std::fmt::Write;
use thiserror::Error;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("malformed template at byte {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown substitution token {{{0}}}")]
    UnknownToken(String),

    #[error("invalid date format {format:?} for {{{token}}}")]
    InvalidFormat { token: String, format: String },

    #[error("token {{{0}}} has no value in this context")]
    MissingContext(String),

    #[error("units {first} and {second} both render to {path}")]
    Collision {
        path: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    TileIndex(usize),
    TimePeriod(usize),
    Name,
}

impl Token {
    fn parse(field: &str) -> Option<Token> {
        match field {
            "tile_index[0]" => Some(Token::TileIndex(0)),
            "tile_index[1]" => Some(Token::TileIndex(1)),
            "time_period[0]" => Some(Token::TimePeriod(0)),
            "time_period[1]" => Some(Token::TimePeriod(1)),
            "name" => Some(Token::Name),
            _ => None,
        }
    }

    fn label(self) -> String {
        match self {
            Token::TileIndex(i) => format!("tile_index[{}]", i),
            Token::TimePeriod(i) => format!("time_period[{}]", i),
            Token::Name => "name".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { token: Token, format: Option<String> },
}

/// A parsed path template. Equality compares the source text.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PartialEq for PathTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Values available when rendering; absent values fail with `MissingContext`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext<'a> {
    pub tile_index: Option<(i32, i32)>,
    pub window: Option<&'a TimeWindow>,
    pub name: Option<&'a str>,
}

impl PathTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        literal.push('{');
                        continue;
                    }
                    let mut field = String::new();
                    let mut closed = false;
                    for (_, fc) in chars.by_ref() {
                        match fc {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => {
                                return Err(TemplateError::Syntax {
                                    position: pos,
                                    message: "nested '{' inside a field".to_string(),
                                });
                            }
                            other => field.push(other),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::Syntax {
                            position: pos,
                            message: "unterminated '{'".to_string(),
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_field(&field, pos)?);
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(TemplateError::Syntax {
                            position: pos,
                            message: "single '}' must be escaped as '}}'".to_string(),
                        });
                    }
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn uses(&self, token: Token) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Field { token: t, .. } if *t == token))
    }

    /// Whether every (tile, window start) pair renders differently.
    pub fn distinguishes_units(&self) -> bool {
        self.uses(Token::TileIndex(0))
            && self.uses(Token::TileIndex(1))
            && self.uses(Token::TimePeriod(0))
    }

    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Field { token, format } => {
                    let missing = || TemplateError::MissingContext(token.label());
                    match token {
                        Token::TileIndex(i) => {
                            let (x, y) = ctx.tile_index.ok_or_else(missing)?;
                            let v = if *i == 0 { x } else { y };
                            out.push_str(&v.to_string());
                        }
                        Token::TimePeriod(i) => {
                            let window = ctx.window.ok_or_else(missing)?;
                            let date = if *i == 0 { window.start } else { window.end };
                            let fmt = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                            format_date(&mut out, date, fmt).map_err(|_| {
                                TemplateError::InvalidFormat {
                                    token: token.label(),
                                    format: fmt.to_string(),
                                }
                            })?;
                        }
                        Token::Name => out.push_str(ctx.name.ok_or_else(missing)?),
                    }
                }
            }
        }
        Ok(out)
    }
}

fn parse_field(field: &str, position: usize) -> Result<Segment, TemplateError> {
    let (name, format) = match field.split_once(':') {
        Some((n, f)) => (n.trim(), Some(f)),
        None => (field.trim(), None),
    };
    let token = Token::parse(name).ok_or_else(|| TemplateError::UnknownToken(name.to_string()))?;

    let format = format.filter(|f| !f.is_empty()).map(str::to_string);
    if let Some(fmt) = &format {
        if !matches!(token, Token::TimePeriod(_)) {
            return Err(TemplateError::Syntax {
                position,
                message: format!("{{{}}} does not accept a format suffix", token.label()),
            });
        }
        if !date_format_is_valid(fmt) {
            return Err(TemplateError::InvalidFormat {
                token: token.label(),
                format: fmt.clone(),
            });
        }
    }
    Ok(Segment::Field { token, format })
}

fn date_format_is_valid(fmt: &str) -> bool {
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return false;
    }
    // Offsets and zone names have no value for a naive date.
    let probe = NaiveDate::from_ymd_opt(2000, 1, 1).map(|d| d.and_time(NaiveTime::MIN));
    match probe {
        Some(dt) => write!(String::new(), "{}", dt.format(fmt)).is_ok(),
        None => false,
    }
}

fn format_date(out: &mut String, date: NaiveDate, fmt: &str) -> std::fmt::Result {
    write!(out, "{}", date.and_time(NaiveTime::MIN).format(fmt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn window(start: (i32, u32, u32), end: (i32, u32, u32)) -> TimeWindow {
        TimeWindow {
            start: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            partial: false,
        }
    }

    #[test]
    fn renders_tile_and_period() {
        let t = PathTemplate::parse(
            "SR_N_MEAN/SR_N_MEAN_3577_{tile_index[0]}_{tile_index[1]}_{time_period[0]:%Y%m%d}.nc",
        )
        .unwrap();
        let w = window((2015, 1, 1), (2015, 4, 1));
        let ctx = RenderContext {
            tile_index: Some((12, -5)),
            window: Some(&w),
            name: None,
        };
        assert_eq!(
            t.render(&ctx).unwrap(),
            "SR_N_MEAN/SR_N_MEAN_3577_12_-5_20150101.nc"
        );
        assert!(t.distinguishes_units());
    }

    #[test]
    fn default_format_and_name() {
        let t = PathTemplate::parse("{name}/{time_period[0]}_{time_period[1]}").unwrap();
        let w = window((2015, 1, 1), (2015, 4, 1));
        let ctx = RenderContext {
            tile_index: None,
            window: Some(&w),
            name: Some("mean"),
        };
        assert_eq!(t.render(&ctx).unwrap(), "mean/2015-01-01_2015-04-01");
        assert!(!t.distinguishes_units());
    }

    #[test]
    fn escaped_braces() {
        let t = PathTemplate::parse("a{{b}}_{tile_index[0]}").unwrap();
        let ctx = RenderContext {
            tile_index: Some((1, 2)),
            ..Default::default()
        };
        assert_eq!(t.render(&ctx).unwrap(), "a{b}_1");
    }

    #[test]
    fn unknown_token_rejected() {
        assert_eq!(
            PathTemplate::parse("x_{tile_index[2]}.nc").unwrap_err(),
            TemplateError::UnknownToken("tile_index[2]".to_string())
        );
        assert!(matches!(
            PathTemplate::parse("{epsg}.nc"),
            Err(TemplateError::UnknownToken(_))
        ));
    }

    #[test]
    fn malformed_braces_rejected() {
        assert!(matches!(
            PathTemplate::parse("x_{tile_index[0]"),
            Err(TemplateError::Syntax { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("x_}"),
            Err(TemplateError::Syntax { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("{tile_index[0]:04}"),
            Err(TemplateError::Syntax { .. })
        ));
    }

    #[test]
    fn zone_format_rejected() {
        assert!(matches!(
            PathTemplate::parse("{time_period[0]:%z}"),
            Err(TemplateError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn missing_context_reported() {
        let t = PathTemplate::parse("{tile_index[0]}_{time_period[0]}").unwrap();
        let ctx = RenderContext {
            tile_index: Some((0, 0)),
            ..Default::default()
        };
        assert_eq!(
            t.render(&ctx).unwrap_err(),
            TemplateError::MissingContext("time_period[0]".to_string())
        );
    }
}
