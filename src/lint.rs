//! Linter for schema text: layout style plus checks on the frames it describes.
//!
//! ## Rules
//!
//! - **Indentation**: one tab per depth level, no spaces. Depth increases after `{`, decreases after `}`.
//! - **No trailing whitespace**.
//! - **Invalid schema**: the text does not parse, or a frame fails validation.
//! - **Overlapping fields**: two fields or checksum slots share bytes. Masked fields over the
//!   same slot may share bytes as long as their bit windows are disjoint.
//! - **Uncovered bytes**: frame bytes no field or checksum slot touches.
//! - **Checksum covers itself**: a checksum's verified range includes its own slot.
//! - **Ragged array**: an array length that is not a multiple of its step.
//!
//! Run via the `lint_schema` binary: `lint_schema sensor.frames` or `lint_schema < sensor.frames`.
//! Exit code 1 if any error-level findings.

use crate::parser::parse_frames;
use crate::schema::{Endianness, FrameDescriptor, Schema, SchemaError, VerifyCheck};

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintRule {
    IndentationTabsOnly,
    IndentationDepth,
    NoTrailingWhitespace,
    InvalidSchema,
    OverlappingFields,
    UncoveredBytes,
    ChecksumCoversItself,
    RaggedArray,
}

impl LintRule {
    pub fn id(self) -> &'static str {
        match self {
            LintRule::IndentationTabsOnly => "indentation-tabs-only",
            LintRule::IndentationDepth => "indentation-depth",
            LintRule::NoTrailingWhitespace => "no-trailing-whitespace",
            LintRule::InvalidSchema => "invalid-schema",
            LintRule::OverlappingFields => "overlapping-fields",
            LintRule::UncoveredBytes => "uncovered-bytes",
            LintRule::ChecksumCoversItself => "checksum-covers-itself",
            LintRule::RaggedArray => "ragged-array",
        }
    }
}

/// A single lint message with location.
#[derive(Debug, Clone)]
pub struct LintMessage {
    pub line: usize,
    pub column: usize,
    pub rule: LintRule,
    pub severity: Severity,
    pub message: String,
}

/// Run all lint rules on schema source. Returns messages in line order.
pub fn lint(source: &str) -> Vec<LintMessage> {
    let mut out = lint_layout(source);
    let parsed = parse_frames(source).and_then(|frames| {
        Schema::resolve(frames.clone())?;
        Ok(frames)
    });
    match parsed {
        Ok(frames) => {
            for frame in &frames {
                lint_frame(source, frame, &mut out);
            }
        }
        Err(e) => {
            let (frame, field) = error_location(&e);
            out.push(LintMessage {
                line: locate(source, frame, field),
                column: 1,
                rule: LintRule::InvalidSchema,
                severity: Severity::Error,
                message: e.to_string(),
            });
        }
    }
    out.sort_by_key(|m| m.line);
    out
}

fn lint_layout(source: &str) -> Vec<LintMessage> {
    let mut out = Vec::new();
    let mut depth: i32 = 0;
    let mut in_block_comment = false;

    for (i, line) in source.lines().enumerate() {
        let line_no = i + 1;

        if line != line.trim_end() {
            out.push(LintMessage {
                line: line_no,
                column: line.trim_end().len() + 1,
                rule: LintRule::NoTrailingWhitespace,
                severity: Severity::Warning,
                message: "trailing whitespace not allowed".to_string(),
            });
        }

        let trimmed = line.trim_start();
        let leading = &line[..line.len() - trimmed.len()];
        if leading.contains(' ') {
            out.push(LintMessage {
                line: line_no,
                column: 1,
                rule: LintRule::IndentationTabsOnly,
                severity: Severity::Error,
                message: "indentation must use tabs only (no spaces)".to_string(),
            });
        }

        let code = strip_comments(trimmed, &mut in_block_comment);
        if !code.trim().is_empty() {
            // A line opening with `}` sits at the depth it closes back to.
            let expected = (if code.starts_with('}') { depth - 1 } else { depth }).max(0) as usize;
            let tabs = leading.chars().filter(|&c| c == '\t').count();
            if tabs != expected && !leading.contains(' ') {
                out.push(LintMessage {
                    line: line_no,
                    column: 1,
                    rule: LintRule::IndentationDepth,
                    severity: Severity::Error,
                    message: format!("expected {} tab(s) (found {})", expected, tabs),
                });
            }
        }
        depth += brace_delta(&code);
    }
    out
}

fn lint_frame(source: &str, frame: &FrameDescriptor, out: &mut Vec<LintMessage>) {
    let slots = slots(frame);
    let at = |field: &str| locate(source, Some(frame.name()), Some(field));

    for (i, a) in slots.iter().enumerate() {
        for b in &slots[i + 1..] {
            if a.overlaps(b) {
                out.push(LintMessage {
                    line: at(b.name),
                    column: 1,
                    rule: LintRule::OverlappingFields,
                    severity: Severity::Warning,
                    message: format!(
                        "frame `{}`: `{}` overlaps `{}`",
                        frame.name(), b.name, a.name
                    ),
                });
            }
        }
    }

    let gaps = uncovered(&slots, frame.total_length());
    if !gaps.is_empty() {
        let ranges: Vec<String> = gaps.iter().map(|(s, e)| format!("{}..{}", s, e)).collect();
        out.push(LintMessage {
            line: locate(source, Some(frame.name()), None),
            column: 1,
            rule: LintRule::UncoveredBytes,
            severity: Severity::Warning,
            message: format!("frame `{}`: bytes {} are not covered", frame.name(), ranges.join(", ")),
        });
    }

    for v in frame.verifications() {
        if let VerifyCheck::Checksum { offset, length, verify_start, verify_length, .. } = v.check {
            if verify_start < offset + length && offset < verify_start + verify_length {
                out.push(LintMessage {
                    line: at(&v.name),
                    column: 1,
                    rule: LintRule::ChecksumCoversItself,
                    severity: Severity::Error,
                    message: format!(
                        "frame `{}`: checksum `{}` is computed over its own slot",
                        frame.name(), v.name
                    ),
                });
            }
        }
    }

    for f in frame.fields().iter().filter(|f| f.array && f.step > 0) {
        if f.length % f.step != 0 {
            out.push(LintMessage {
                line: at(&f.name),
                column: 1,
                rule: LintRule::RaggedArray,
                severity: Severity::Warning,
                message: format!(
                    "frame `{}`: array `{}` length {} is not a multiple of step {}; trailing {} byte(s) unused",
                    frame.name(),
                    f.name,
                    f.length,
                    f.step,
                    f.length % f.step
                ),
            });
        }
    }
}

/// Byte extent of a field or checksum slot, plus its bit window when masked.
struct Slot<'a> {
    name: &'a str,
    start: usize,
    end: usize,
    shape: (usize, usize, Endianness),
    window: Option<(u32, u32)>,
}

impl Slot<'_> {
    fn overlaps(&self, other: &Slot) -> bool {
        if self.start >= other.end || other.start >= self.end {
            return false;
        }
        match (self.window, other.window) {
            (Some((a_lo, a_hi)), Some((b_lo, b_hi))) if self.shape == other.shape => {
                a_lo < b_hi && b_lo < a_hi
            }
            _ => true,
        }
    }
}

fn slots(frame: &FrameDescriptor) -> Vec<Slot<'_>> {
    let fields = frame.fields().iter().map(|f| Slot {
        name: &f.name,
        start: f.offset,
        end: f.end(),
        shape: (f.offset, f.element_length(), f.endianness),
        window: f.mask_width().map(|w| (f.shift_right, f.shift_right + w)),
    });
    let checksums = frame.verifications().iter().filter_map(|v| match v.check {
        VerifyCheck::Checksum { offset, length, endianness, .. } => Some(Slot {
            name: &v.name,
            start: offset,
            end: offset + length,
            shape: (offset, length, endianness),
            window: None,
        }),
        VerifyCheck::Custom => None,
    });
    fields.chain(checksums).collect()
}

/// Byte ranges of `0..total` outside every slot.
fn uncovered(slots: &[Slot], total: usize) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = slots.iter().map(|s| (s.start, s.end)).collect();
    spans.sort_unstable();
    let mut gaps = Vec::new();
    let mut cursor = 0;
    for (start, end) in spans {
        if start > cursor {
            gaps.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < total {
        gaps.push((cursor, total));
    }
    gaps
}

fn error_location(e: &SchemaError) -> (Option<&str>, Option<&str>) {
    match e {
        SchemaError::Parse(_) => (None, None),
        SchemaError::ZeroFrameLength(frame) | SchemaError::DuplicateFrame(frame) => {
            (Some(frame.as_str()), None)
        }
        SchemaError::DuplicateField { frame, field }
        | SchemaError::UnsupportedKind { frame, field, .. }
        | SchemaError::UnknownAlgorithm { frame, field, .. }
        | SchemaError::Field { frame, field, .. } => (Some(frame.as_str()), Some(field.as_str())),
    }
}

/// Line of `field` inside `frame Name`, else the frame header, else line 1.
fn locate(source: &str, frame: Option<&str>, field: Option<&str>) -> usize {
    let Some(frame) = frame else {
        return 1;
    };
    let mut frame_line = None;
    for (i, line) in source.lines().enumerate() {
        let t = line.trim_start();
        if let Some(rest) = t.strip_prefix("frame").filter(|r| r.starts_with(char::is_whitespace)) {
            if frame_line.is_some() {
                break;
            }
            if leading_ident(rest.trim_start()) == frame {
                frame_line = Some(i + 1);
            }
            continue;
        }
        if let (Some(_), Some(field)) = (frame_line, field) {
            if leading_ident(t) == field && t[field.len()..].trim_start().starts_with(':') {
                return i + 1;
            }
        }
    }
    frame_line.unwrap_or(1)
}

fn leading_ident(s: &str) -> &str {
    let end = s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(s.len());
    &s[..end]
}

/// Code portion of a line, tracking `/* */` comments that span lines.
fn strip_comments(line: &str, in_block: &mut bool) -> String {
    let mut code = String::new();
    let mut rest = line;
    loop {
        if *in_block {
            match rest.find("*/") {
                Some(i) => {
                    *in_block = false;
                    rest = &rest[i + 2..];
                }
                None => return code,
            }
        }
        let line_comment = rest.find("//");
        let block = rest.find("/*");
        match (line_comment, block) {
            (Some(l), Some(b)) if b < l => {
                code.push_str(&rest[..b]);
                *in_block = true;
                rest = &rest[b + 2..];
            }
            (None, Some(b)) => {
                code.push_str(&rest[..b]);
                *in_block = true;
                rest = &rest[b + 2..];
            }
            (Some(l), _) => {
                code.push_str(&rest[..l]);
                return code;
            }
            (None, None) => {
                code.push_str(rest);
                return code;
            }
        }
    }
}

fn brace_delta(code: &str) -> i32 {
    code.chars()
        .map(|c| match c {
            '{' => 1,
            '}' => -1,
            _ => 0,
        })
        .sum()
}

/// Re-indent with one tab per depth and strip trailing whitespace. Comments and
/// blank lines are kept.
pub fn lint_fix(source: &str) -> String {
    let mut depth: i32 = 0;
    let mut in_block_comment = false;
    let mut out_lines: Vec<String> = Vec::new();
    for line in source.lines() {
        let was_in_block = in_block_comment;
        let content = line.trim();
        let code = strip_comments(content, &mut in_block_comment);
        if content.is_empty() {
            out_lines.push(String::new());
        } else if was_in_block {
            // Inside a multi-line comment: keep the author's layout, only trim the end.
            out_lines.push(line.trim_end().to_string());
        } else {
            let level = (if code.starts_with('}') { depth - 1 } else { depth }).max(0) as usize;
            out_lines.push(format!("{}{}", "\t".repeat(level), content));
        }
        depth += brace_delta(&code);
    }
    out_lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(src: &str) -> Vec<LintRule> {
        lint(src).into_iter().map(|m| m.rule).collect()
    }

    #[test]
    fn lint_tabs_only() {
        let src = "frame F(1) {\n  x: i8 at 0 len 1;\n}\n";
        assert!(rules(src).contains(&LintRule::IndentationTabsOnly));
    }

    #[test]
    fn lint_clean_tabs_passes() {
        let src = "frame F(2) {\n\tx: i8 at 0 len 1;\n\ty: i8 at 1 len 1; // tail\n}\n";
        let msgs = lint(src);
        assert!(msgs.is_empty(), "clean source should have no findings: {:?}", msgs);
    }

    #[test]
    fn disjoint_bit_windows_do_not_overlap() {
        let src = "frame F(1) {\n\ta: bool at 0 len 1 mask 0x1;\n\tb: i8 at 0 len 1 shr 1 mask 0x7;\n}\n";
        assert!(!rules(src).contains(&LintRule::OverlappingFields));
        let src = "frame F(1) {\n\ta: i8 at 0 len 1 mask 0x3;\n\tb: i8 at 0 len 1 shr 1 mask 0x7;\n}\n";
        let msgs = lint(src);
        let overlap = msgs.iter().find(|m| m.rule == LintRule::OverlappingFields).unwrap();
        assert_eq!(overlap.line, 3);
    }

    #[test]
    fn gaps_and_self_covering_checksum() {
        let src = "frame F(4) {\n\ta: i8 at 0 len 1;\n\tc: i8 at 3 len 1 verify sum8 over 0 len 4;\n}\n";
        let msgs = lint(src);
        let gap = msgs.iter().find(|m| m.rule == LintRule::UncoveredBytes).unwrap();
        assert!(gap.message.contains("1..3"));
        assert_eq!(gap.line, 1);
        let own = msgs.iter().find(|m| m.rule == LintRule::ChecksumCoversItself).unwrap();
        assert_eq!((own.line, own.severity), (3, Severity::Error));
    }

    #[test]
    fn ragged_array_warns() {
        let src = "frame F(5) {\n\ta: [i16] at 0 len 5 step 2;\n}\n";
        assert!(rules(src).contains(&LintRule::RaggedArray));
    }

    #[test]
    fn invalid_schema_points_at_field() {
        let src = "frame F(2) {\n\tok: i8 at 0 len 1;\n\tbad: i16 at 1 len 2;\n}\n";
        let msgs = lint(src);
        let invalid = msgs.iter().find(|m| m.rule == LintRule::InvalidSchema).unwrap();
        assert_eq!(invalid.line, 3);
    }

    #[test]
    fn fix_reindents_and_keeps_comments() {
        let src = "frame F(1) {   \n    // only field\n  x: i8 at 0 len 1;\n  }\n";
        let fixed = lint_fix(src);
        assert_eq!(fixed, "frame F(1) {\n\t// only field\n\tx: i8 at 0 len 1;\n}\n");
        assert!(lint(&fixed).is_empty());
    }
}
