//! Doc-comment parsing.
//!
//! Pulls the summary line and per-parameter descriptions out of a function's
//! documentation. Parameters are read from an `# Arguments` (or `# Parameters`,
//! `Args:`) section:
//!
//! ```text
//! Get the current weather in a given location.
//!
//! # Arguments
//!
//! * `location` - The city and state, e.g. San Francisco, CA
//! * `unit` - The temperature unit to use
//! ```

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:#+\s*)?(?i:arguments|args|parameters|params)\s*:?\s*$")
        .expect("fail to create a regex for the arguments section")
});

static PARAM_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[*-]\s+)?`?([A-Za-z_][A-Za-z0-9_]*)`?\s*(?:\([^)]*\))?\s*(?:-|:)\s*(.*)$")
        .expect("fail to create a regex for a parameter line")
});

/// Parsed documentation of a function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocs {
    /// First paragraph, joined into one line.
    pub short_description: Option<String>,
    /// Remaining prose before the first section.
    pub long_description: Option<String>,
    /// Parameter name to description, in documented order.
    pub params: IndexMap<String, String>,
}

impl ParsedDocs {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') || (trimmed.ends_with(':') && !trimmed.contains(' ') && trimmed.len() > 1)
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

pub fn parse(doc: &str) -> ParsedDocs {
    let lines: Vec<&str> = doc.lines().map(str::trim_end).collect();
    let mut parsed = ParsedDocs::default();

    let mut idx = 0;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }

    // Summary: first paragraph.
    let mut summary = Vec::new();
    while idx < lines.len() && !lines[idx].trim().is_empty() && !is_heading(lines[idx]) {
        summary.push(lines[idx].trim());
        idx += 1;
    }
    if !summary.is_empty() {
        parsed.short_description = Some(summary.join(" "));
    }

    let mut long = Vec::new();
    let mut in_params = false;
    let mut param_indent = None;
    let mut current: Option<String> = None;

    for line in &lines[idx..] {
        let trimmed = line.trim();
        if SECTION_HEADER.is_match(trimmed) {
            in_params = true;
            param_indent = None;
            current = None;
            continue;
        }
        if is_heading(line) {
            in_params = false;
            current = None;
            continue;
        }
        if !in_params {
            if parsed.params.is_empty() && !trimmed.starts_with("```") {
                long.push(trimmed);
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        let indent = indent_of(line);
        let starts_param = param_indent.is_none_or(|base| indent <= base);
        match PARAM_LINE.captures(trimmed) {
            Some(caps) if starts_param => {
                param_indent.get_or_insert(indent);
                let name = caps[1].to_owned();
                parsed.params.insert(name.clone(), caps[2].trim().to_owned());
                current = Some(name);
            }
            _ => {
                if let Some(entry) = current.as_ref().and_then(|n| parsed.params.get_mut(n)) {
                    if !entry.is_empty() {
                        entry.push(' ');
                    }
                    entry.push_str(trimmed);
                }
            }
        }
    }

    parsed.params.retain(|_, description| !description.is_empty());

    let long = long.join("\n");
    let long = long.trim();
    if !long.is_empty() {
        parsed.long_description = Some(long.to_owned());
    }
    parsed
}
