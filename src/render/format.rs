//! stat(1)-style templates: `"%9s %n\n"`, `"%a %u %n"` and friends.
//!
//! A template is compiled once into literal text and [`Directive`]s, so an
//! unknown or unimplemented sequence fails before any line is printed.

#![allow(missing_docs)]

use std::borrow::Cow;

use chrono::{DateTime, Local};

use crate::core::errors::{BduError, Result};
use crate::core::units::user_blocks;
use crate::decode::lstat::{FileStat, FileType};

/// Letters stat(1) knows that this renderer deliberately does not produce.
const UNIMPLEMENTED: &[char] = &['A', 'B', 'C', 'G', 'm', 'N', 'U', 'w', 'W'];

/// One supported `%` letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    /// `%a` permission bits in octal.
    Permissions,
    /// `%f` raw mode in hex.
    RawMode,
    /// `%F` file type label.
    FileType,
    /// `%b` allocated 512-byte blocks.
    Blocks,
    /// `%h` hard links.
    Links,
    /// `%i` inode number.
    Inode,
    /// `%I` catalog file index.
    FileIndex,
    /// `%n` path.
    Name,
    /// `%o` preferred I/O size.
    IoBlock,
    /// `%s` size in bytes.
    Size,
    /// `%S` size in report block-size units.
    SizeInBlocks,
    /// `%d` device number.
    Device,
    /// `%D` device number in hex.
    DeviceHex,
    /// `%g` group id.
    Gid,
    /// `%u` user id.
    Uid,
    /// `%t` major device type in hex.
    Major,
    /// `%T` minor device type in hex.
    Minor,
    /// `%x` last access, ISO-8601.
    AccessTime,
    /// `%X` last access, epoch seconds.
    AccessEpoch,
    /// `%y` last modification, ISO-8601.
    ModifyTime,
    /// `%Y` last modification, epoch seconds.
    ModifyEpoch,
    /// `%z` last status change, ISO-8601.
    ChangeTime,
    /// `%Z` last status change, epoch seconds.
    ChangeEpoch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Mode,
    Blocks,
    Nlink,
    Inode,
    FileIndex,
    Name,
    BlkSize,
    Size,
    Device,
    Gid,
    Uid,
    Rdev,
    Atime,
    Mtime,
    Ctime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    Permissions,
    Hex,
    TypeLabel,
    UserBlocks,
    MajorHex,
    MinorHex,
    IsoTime,
}

enum Value<'a> {
    Number(u64),
    Text(Cow<'a, str>),
}

impl Sequence {
    /// Map a template letter to its sequence.
    pub fn from_letter(letter: char) -> Result<Self> {
        let sequence = match letter {
            'a' => Self::Permissions,
            'f' => Self::RawMode,
            'F' => Self::FileType,
            'b' => Self::Blocks,
            'h' => Self::Links,
            'i' => Self::Inode,
            'I' => Self::FileIndex,
            'n' => Self::Name,
            'o' => Self::IoBlock,
            's' => Self::Size,
            'S' => Self::SizeInBlocks,
            'd' => Self::Device,
            'D' => Self::DeviceHex,
            'g' => Self::Gid,
            'u' => Self::Uid,
            't' => Self::Major,
            'T' => Self::Minor,
            'x' => Self::AccessTime,
            'X' => Self::AccessEpoch,
            'y' => Self::ModifyTime,
            'Y' => Self::ModifyEpoch,
            'z' => Self::ChangeTime,
            'Z' => Self::ChangeEpoch,
            other if UNIMPLEMENTED.contains(&other) => {
                return Err(BduError::FormatUnimplemented { letter: other });
            }
            other => {
                return Err(BduError::FormatUnrecognized {
                    sequence: format!("%{other}"),
                });
            }
        };
        Ok(sequence)
    }

    const fn field(self) -> Field {
        match self {
            Self::Permissions | Self::RawMode | Self::FileType => Field::Mode,
            Self::Blocks => Field::Blocks,
            Self::Links => Field::Nlink,
            Self::Inode => Field::Inode,
            Self::FileIndex => Field::FileIndex,
            Self::Name => Field::Name,
            Self::IoBlock => Field::BlkSize,
            Self::Size | Self::SizeInBlocks => Field::Size,
            Self::Device | Self::DeviceHex => Field::Device,
            Self::Gid => Field::Gid,
            Self::Uid => Field::Uid,
            Self::Major | Self::Minor => Field::Rdev,
            Self::AccessTime | Self::AccessEpoch => Field::Atime,
            Self::ModifyTime | Self::ModifyEpoch => Field::Mtime,
            Self::ChangeTime | Self::ChangeEpoch => Field::Ctime,
        }
    }

    const fn transform(self) -> Option<Transform> {
        match self {
            Self::Permissions => Some(Transform::Permissions),
            Self::RawMode | Self::DeviceHex => Some(Transform::Hex),
            Self::FileType => Some(Transform::TypeLabel),
            Self::SizeInBlocks => Some(Transform::UserBlocks),
            Self::Major => Some(Transform::MajorHex),
            Self::Minor => Some(Transform::MinorHex),
            Self::AccessTime | Self::ModifyTime | Self::ChangeTime => Some(Transform::IsoTime),
            _ => None,
        }
    }
}

impl Field {
    fn value<'a>(self, stat: &FileStat, name: &'a str) -> Value<'a> {
        let number = match self {
            Self::Name => return Value::Text(Cow::Borrowed(name)),
            Self::Mode => stat.mode,
            Self::Blocks => stat.blocks,
            Self::Nlink => stat.nlink,
            Self::Inode => stat.inode,
            Self::FileIndex => stat.file_index.unwrap_or(0),
            Self::BlkSize => stat.blksize,
            Self::Size => stat.size,
            Self::Device => stat.device,
            Self::Gid => stat.gid,
            Self::Uid => stat.uid,
            Self::Rdev => stat.rdev,
            Self::Atime => stat.atime,
            Self::Mtime => stat.mtime,
            Self::Ctime => stat.ctime,
        };
        Value::Number(number)
    }
}

/// Minimum width and side to pad on, from a printf-style `%-12` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Width {
    pub width: usize,
    pub left: bool,
}

impl Width {
    fn pad(self, text: &str) -> String {
        if self.left {
            format!("{text:<width$}", width = self.width)
        } else {
            format!("{text:>width$}", width = self.width)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    pub sequence: Sequence,
    pub width: Option<Width>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Directive(Directive),
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct FormatSpec {
    segments: Vec<Segment>,
    block_size: u64,
    utc: bool,
}

impl FormatSpec {
    /// Compile `template`; `block_size` is the unit `%S` reports in.
    pub fn compile(template: &str, block_size: u64) -> Result<Self> {
        let text = unescape(template);
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '%' {
                literal.push(ch);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }

            let mut spec = String::from("%");
            let left = chars.next_if_eq(&'-').is_some();
            if left {
                spec.push('-');
            }
            let mut digits = String::new();
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                digits.push(d);
            }
            spec.push_str(&digits);

            let Some(letter) = chars.next() else {
                return Err(BduError::FormatUnrecognized { sequence: spec });
            };
            if !letter.is_ascii_alphabetic() {
                spec.push(letter);
                return Err(BduError::FormatUnrecognized { sequence: spec });
            }
            let sequence = Sequence::from_letter(letter)?;
            let width = if digits.is_empty() {
                None
            } else {
                let width = digits.parse::<usize>().map_err(|_| {
                    BduError::FormatUnrecognized {
                        sequence: format!("{spec}{letter}"),
                    }
                })?;
                Some(Width { width, left })
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Directive(Directive { sequence, width }));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            segments,
            block_size: block_size.max(1),
            utc: false,
        })
    }

    /// Render times in UTC instead of the local zone.
    #[must_use]
    pub const fn with_utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the rendered text already ends in a newline.
    #[must_use]
    pub fn ends_with_newline(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Literal(text)) if text.ends_with('\n'))
    }

    /// Render the template for one entry.
    #[must_use]
    pub fn render(&self, name: &str, stat: &FileStat) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Directive(directive) => {
                    let text = self.apply(directive.sequence, name, stat);
                    match directive.width {
                        Some(width) => out.push_str(&width.pad(&text)),
                        None => out.push_str(&text),
                    }
                }
            }
        }
        out
    }

    fn apply<'a>(&self, sequence: Sequence, name: &'a str, stat: &FileStat) -> Cow<'a, str> {
        let value = sequence.field().value(stat, name);
        match (sequence.transform(), value) {
            (_, Value::Text(text)) => text,
            (None, Value::Number(n)) => Cow::Owned(n.to_string()),
            (Some(transform), Value::Number(n)) => Cow::Owned(match transform {
                Transform::Permissions => format!("{:o}", n & 0o7777),
                Transform::Hex => format!("{n:x}"),
                Transform::TypeLabel => FileType::from_mode(n).label().to_string(),
                Transform::UserBlocks => user_blocks(n, self.block_size).to_string(),
                Transform::MajorHex => format!("{:x}", n >> 8),
                Transform::MinorHex => format!("{:x}", n & 0xff),
                Transform::IsoTime => iso_time(n, self.utc),
            }),
        }
    }
}

/// Replace the escapes a shell leaves literal: `\n`, `\t`, `\\`.
fn unescape(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// ISO-8601 with offset; falls back to epoch seconds outside chrono's range.
fn iso_time(epoch_secs: u64, utc: bool) -> String {
    const PATTERN: &str = "%Y-%m-%dT%H:%M:%S%:z";
    let Some(ts) = i64::try_from(epoch_secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
    else {
        return epoch_secs.to_string();
    };
    if utc {
        ts.format(PATTERN).to_string()
    } else {
        ts.with_timezone(&Local).format(PATTERN).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileStat {
        FileStat {
            device: 2049,
            inode: 131_073,
            mode: 0o100_644,
            nlink: 1,
            uid: 1000,
            gid: 100,
            rdev: 0x0803,
            size: 4096,
            blksize: 4096,
            blocks: 8,
            atime: 0,
            mtime: 1_700_000_000,
            ctime: 86_400,
            link_file_index: 0,
            file_index: Some(17),
        }
    }

    fn render(template: &str) -> String {
        FormatSpec::compile(template, 1024)
            .expect("compile")
            .with_utc(true)
            .render("/tmp/x", &sample())
    }

    #[test]
    fn width_example() {
        assert_eq!(render("%9s %n"), "     4096 /tmp/x");
    }

    #[test]
    fn left_justify() {
        assert_eq!(render("[%-6s]"), "[4096  ]");
        assert_eq!(render("[%2s]"), "[4096]");
    }

    #[test]
    fn mode_sequences() {
        assert_eq!(render("%a"), "644");
        assert_eq!(render("%f"), "81a4");
        assert_eq!(render("%F"), "regular file");
    }

    #[test]
    fn numeric_sequences() {
        assert_eq!(render("%b %h %i %I %o"), "8 1 131073 17 4096");
        assert_eq!(render("%d %D"), "2049 801");
        assert_eq!(render("%u:%g"), "1000:100");
        assert_eq!(render("%t,%T"), "8,3");
    }

    #[test]
    fn size_in_blocks_rounds_up() {
        assert_eq!(render("%S"), "4");
        let spec = FormatSpec::compile("%S", 1000).unwrap();
        assert_eq!(spec.render("x", &sample()), "5");
    }

    #[test]
    fn time_sequences() {
        assert_eq!(render("%X %Y %Z"), "0 1700000000 86400");
        assert_eq!(render("%x"), "1970-01-01T00:00:00+00:00");
        assert_eq!(render("%y"), "2023-11-14T22:13:20+00:00");
        assert_eq!(render("%z"), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn escapes_and_percent() {
        assert_eq!(render("%s\\t%n\\n"), "4096\t/tmp/x\n");
        assert_eq!(render("100%% %s"), "100% 4096");
        assert!(
            FormatSpec::compile("%n\\n", 1024)
                .unwrap()
                .ends_with_newline()
        );
        assert!(!FormatSpec::compile("%n", 1024).unwrap().ends_with_newline());
    }

    #[test]
    fn missing_file_index_renders_zero() {
        let stat = FileStat {
            file_index: None,
            ..sample()
        };
        let spec = FormatSpec::compile("%I", 1024).unwrap();
        assert_eq!(spec.render("x", &stat), "0");
    }

    #[test]
    fn unimplemented_sequence_fails_at_compile_time() {
        for letter in ['A', 'B', 'C', 'G', 'm', 'N', 'U', 'w', 'W'] {
            let err = FormatSpec::compile(&format!("%s %{letter}"), 1024).unwrap_err();
            match err {
                BduError::FormatUnimplemented { letter: got } => assert_eq!(got, letter),
                other => panic!("unexpected error for %{letter}: {other}"),
            }
        }
    }

    #[test]
    fn unrecognized_sequences_fail() {
        for template in ["%q", "%", "%5", "%-", "%5.2s", "%!"] {
            let err = FormatSpec::compile(template, 1024).unwrap_err();
            assert_eq!(err.code(), "BDU-1202", "{template}: {err}");
        }
    }

    #[test]
    fn compiles_to_segments() {
        let spec = FormatSpec::compile("%-4s|%n", 1024).unwrap();
        assert_eq!(
            spec.segments(),
            &[
                Segment::Directive(Directive {
                    sequence: Sequence::Size,
                    width: Some(Width {
                        width: 4,
                        left: true
                    }),
                }),
                Segment::Literal("|".to_string()),
                Segment::Directive(Directive {
                    sequence: Sequence::Name,
                    width: None,
                }),
            ]
        );
    }
}
