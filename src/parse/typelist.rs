//! The line format shared by rule, decorator and replacement files.
//!
//! Each line holds a pattern followed by a name. `%` starts a comment that
//! runs to the end of the line; blank and comment-only lines are skipped.
//! Names may contain spaces (refined type names do), so everything after
//! the pattern is the name, with runs of whitespace collapsed.

use std::{
    fmt::Write as FmtWrite,
    fs, io,
    path::{Path, PathBuf},
};

use nom::{
    bytes::complete::take_till1,
    character::complete::multispace1,
    combinator::{all_consuming, rest},
    sequence::separated_pair,
    IResult,
};
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum RuleFileError {
    #[error("File '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{source_name}:{line}: expected '<pattern> <name>', found '{content}'")]
    Malformed {
        source_name: String,
        line: usize,
        content: String,
    },
    #[error("{source_name}:{line}: type name '{label}' is already defined")]
    DuplicateLabel {
        source_name: String,
        line: usize,
        label: String,
    },
}

/// One `pattern name` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeListEntry {
    pub pattern: String,
    pub name: String,
    /// 1-based line number in the source text.
    pub line: usize,
}

fn entry_line(input: &str) -> IResult<&str, (&str, &str)> {
    all_consuming(separated_pair(
        take_till1(|c: char| c.is_whitespace()),
        multispace1,
        rest,
    ))(input)
}

/// Parse type list text. `source_name` only appears in error messages.
pub fn parse_typelist(text: &str, source_name: &str) -> Result<Vec<TypeListEntry>, RuleFileError> {
    let mut entries = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.split('%').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Ok((_, (pattern, name))) = entry_line(line) else {
            return Err(RuleFileError::Malformed {
                source_name: source_name.to_string(),
                line: index + 1,
                content: raw.to_string(),
            });
        };
        entries.push(TypeListEntry {
            pattern: pattern.to_string(),
            name: name.split_whitespace().collect::<Vec<_>>().join(" "),
            line: index + 1,
        });
    }
    Ok(entries)
}

/// Read a type list file. A missing file is an error, not an empty list.
pub fn read_typelist(path: impl AsRef<Path>) -> Result<Vec<TypeListEntry>, RuleFileError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            RuleFileError::NotFound(path.to_path_buf())
        } else {
            RuleFileError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let entries = parse_typelist(&text, &path.display().to_string())?;
    debug!("Read {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Format `(pattern, name, comment)` rows in the type list format, with
/// patterns padded to a common width.
pub fn format_typelist<'a>(rows: impl IntoIterator<Item = (&'a str, &'a str, Option<String>)>) -> String {
    let rows: Vec<_> = rows.into_iter().collect();
    let width = rows.iter().map(|(pattern, _, _)| pattern.len()).max().unwrap_or(0);
    let mut text = String::new();
    for (pattern, name, comment) in rows {
        let _ = match comment {
            Some(comment) => writeln!(text, "{pattern:<width$}  {name}  % {comment}"),
            None => writeln!(text, "{pattern:<width$}  {name}"),
        };
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comments_and_blank_lines() {
        let text = "% base types\n\n[#1]    hydrogen\n[#6]  carbon % trailing comment\n   % indented comment\n";
        let entries = parse_typelist(text, "basetypes").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].pattern, "[#1]");
        assert_eq!(entries[0].name, "hydrogen");
        assert_eq!(entries[0].line, 3);
        assert_eq!(entries[1].name, "carbon");
    }

    #[test]
    fn test_names_with_spaces() {
        let entries = parse_typelist("[*;X4:1]   generic   sp3\n", "rules").unwrap();
        assert_eq!(entries[0].name, "generic sp3");
    }

    #[test]
    fn test_malformed_line() {
        let error = parse_typelist("[#6] carbon\n[#8]\n", "rules").unwrap_err();
        match error {
            RuleFileError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let error = read_typelist("/nonexistent/smarty/basetypes.smarts").unwrap_err();
        assert!(matches!(error, RuleFileError::NotFound(_)));
    }

    #[test]
    fn test_format_round_trip() {
        let text = format_typelist([
            ("[*:1]", "generic", None),
            ("[*;X4:1]", "generic X4", Some("child of generic".to_string())),
        ]);
        let entries = parse_typelist(&text, "formatted").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].pattern, "[*;X4:1]");
        assert_eq!(entries[1].name, "generic X4");
    }
}
