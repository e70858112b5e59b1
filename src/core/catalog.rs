//! Patch catalog parsing: engine listing text → structured records
//!
//! The external patch engine prints one line-oriented block per patch. This
//! module splits that output into blocks, parses each block into a
//! `PatchRecord` through an explicit per-line state machine, and filters the
//! resulting catalog by target package. Parsing never fails: missing fields
//! stay unset and malformed option sub-blocks are skipped.

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// One configurable parameter declared by a patch.
///
/// Owned exclusively by its `PatchRecord`; `key` is unique within a record
/// (first occurrence wins on conflict).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionSchema {
    pub key: String,
    /// Free-form type label as reported by the engine (e.g. "Boolean").
    pub type_hint: Option<String>,
    /// Raw textual default; typed interpretation is the engine's concern.
    pub default: Option<String>,
    pub required: Option<bool>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Enumerated allowed values; empty means free-form.
    pub possible_values: Vec<String>,
}

impl OptionSchema {
    fn with_key(key: String) -> Self {
        Self { key, ..Self::default() }
    }
}

/// One entry in a patch catalog, as parsed from a single listing block.
///
/// Immutable after parsing; filtering drops whole records but never mutates
/// a surviving one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchRecord {
    /// Positional identifier as reported by the engine.
    pub index: Option<u32>,
    /// Human-readable identifier; alternate key when `index` is absent.
    pub name: Option<String>,
    pub description: Option<String>,
    /// The engine's declared default inclusion state.
    pub enabled: Option<bool>,
    /// Declared compatible packages, insertion-ordered, no duplicates.
    pub packages: IndexSet<String>,
    /// Per-package version lists (may be empty per package).
    pub compatible_versions: IndexMap<String, Vec<String>>,
    pub options: Vec<OptionSchema>,
}

impl PatchRecord {
    /// A record declaring no compatible package applies broadly.
    ///
    /// Derived from `packages` so the invariant can never drift.
    pub fn is_universal(&self) -> bool {
        self.packages.is_empty()
    }

    /// Register a compatible package, first occurrence wins.
    fn add_package(&mut self, pkg: &str) {
        let pkg = pkg.trim();
        if pkg.is_empty() {
            return;
        }
        self.packages.insert(pkg.to_string());
        self.compatible_versions.entry(pkg.to_string()).or_default();
    }
}

/// Compiled line patterns for the engine's listing format.
///
/// Built once per parse pass; all patterns are anchored to a full line.
struct ListingPatterns {
    index: Regex,
    name: Regex,
    enabled: Regex,
    description: Regex,
    packages_line: Regex,
    options_header: Regex,
    compat_header: Regex,
    compat_package: Regex,
    compat_versions_header: Regex,
    opt_key: Regex,
    opt_default: Regex,
    opt_type: Regex,
    opt_required: Regex,
    opt_title: Regex,
    opt_possible_header: Regex,
}

impl ListingPatterns {
    fn new() -> Self {
        let line = |pat: &str| Regex::new(pat).expect("static listing pattern");
        Self {
            index: line(r"^\s*Index:\s*(\d+)\s*$"),
            name: line(r"^\s*Name:\s*(.+?)\s*$"),
            enabled: line(r"^\s*Enabled:\s*(true|false)\s*$"),
            description: line(r"^\s*Description:\s*(.*?)\s*$"),
            packages_line: line(r"^\s*Packages?:\s*(.+?)\s*$"),
            options_header: line(r"^\s*Options?\s*:\s*$"),
            compat_header: line(r"^\s*Compatible packages\s*:\s*$"),
            compat_package: line(r"^\s*Package(?:\s+name)?\s*:\s*(.+?)\s*$"),
            compat_versions_header: line(r"^\s*Compatible versions\s*:\s*$"),
            opt_key: line(r"^\s*Key:\s*(.+?)\s*$"),
            opt_default: line(r"^\s*Default:\s*(.+?)\s*$"),
            opt_type: line(r"^\s*Type:\s*(.+?)\s*$"),
            opt_required: line(r"^\s*Required:\s*(true|false)\s*$"),
            opt_title: line(r"^\s*Title:\s*(.+?)\s*$"),
            opt_possible_header: line(r"^\s*Possible values\s*:\s*$"),
        }
    }

    /// Headers that terminate a multi-line description capture.
    fn is_stop_header(&self, line: &str) -> bool {
        self.enabled.is_match(line)
            || self.options_header.is_match(line)
            || self.index.is_match(line)
            || self.name.is_match(line)
            || self.packages_line.is_match(line)
            || self.compat_header.is_match(line)
    }

    /// Top-level field headers that end a compatibility section.
    fn is_top_level_header(&self, line: &str) -> bool {
        self.index.is_match(line)
            || self.name.is_match(line)
            || self.enabled.is_match(line)
            || self.description.is_match(line)
            || self.packages_line.is_match(line)
    }
}

fn capture1(re: &Regex, line: &str) -> Option<String> {
    re.captures(line).map(|c| c[1].to_string())
}

/// Split raw listing output into per-patch blocks.
///
/// A block starts at each line matching `Index: <n>` and runs to the start
/// of the next such line (or end of text). Text with no index header is one
/// degenerate block. Whitespace-only blocks are dropped.
pub fn split_blocks(text: &str) -> Vec<&str> {
    let header = Regex::new(r"(?m)^\s*Index:\s*\d+\s*$").expect("static listing pattern");
    let starts: Vec<usize> = header.find_iter(text).map(|m| m.start()).collect();

    let blocks: Vec<&str> = if starts.is_empty() {
        vec![text]
    } else {
        starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(text.len());
                &text[start..end]
            })
            .collect()
    };

    blocks.into_iter().filter(|b| !b.trim().is_empty()).collect()
}

/// Parser section for the per-line state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    Options,
    PossibleValues,
    Compat,
    CompatVersions,
}

/// Per-block parse state: the record under construction plus the pending
/// option schema, flushed on every section transition and at end of block.
struct BlockParser<'p> {
    pat: &'p ListingPatterns,
    record: PatchRecord,
    section: Section,
    pending: Option<OptionSchema>,
    /// Raw non-empty lines seen inside the options section; feeds the
    /// heuristic fallback when no structured `Key:` entries exist.
    raw_option_lines: Vec<String>,
    current_pkg: Option<String>,
    desc_open: bool,
    desc_lines: Vec<String>,
}

impl<'p> BlockParser<'p> {
    fn new(pat: &'p ListingPatterns) -> Self {
        Self {
            pat,
            record: PatchRecord::default(),
            section: Section::Outside,
            pending: None,
            raw_option_lines: Vec::new(),
            current_pkg: None,
            desc_open: false,
            desc_lines: Vec::new(),
        }
    }

    /// Finalize the pending option schema, discarding it if its key is empty.
    fn flush_option(&mut self) {
        if let Some(opt) = self.pending.take() {
            if !opt.key.is_empty() {
                self.record.options.push(opt);
            }
        }
    }

    fn close_description(&mut self) {
        if self.desc_open {
            self.desc_open = false;
            let text = self.desc_lines.join("\n").trim().to_string();
            if !text.is_empty() {
                self.record.description = Some(text);
            }
            self.desc_lines.clear();
        }
    }

    fn feed(&mut self, line: &str) {
        // Section headers exit any state.
        if self.pat.options_header.is_match(line) {
            self.close_description();
            self.flush_option();
            self.section = Section::Options;
            return;
        }
        if self.pat.compat_header.is_match(line) {
            self.close_description();
            self.flush_option();
            self.section = Section::Compat;
            self.current_pkg = None;
            return;
        }

        match self.section {
            Section::Outside => self.feed_outside(line),
            Section::Options | Section::PossibleValues => self.feed_options(line),
            Section::Compat | Section::CompatVersions => self.feed_compat(line),
        }
    }

    fn feed_outside(&mut self, line: &str) {
        if self.desc_open {
            if self.pat.is_stop_header(line) {
                self.close_description();
                // Fall through so the header is handled normally.
            } else {
                self.desc_lines.push(line.trim_end().to_string());
                return;
            }
        }

        // First match wins for single-line fields.
        if let Some(v) = capture1(&self.pat.index, line) {
            if self.record.index.is_none() {
                self.record.index = v.parse().ok();
            }
        } else if let Some(v) = capture1(&self.pat.name, line) {
            if self.record.name.is_none() {
                self.record.name = Some(v);
            }
        } else if let Some(v) = capture1(&self.pat.enabled, line) {
            if self.record.enabled.is_none() {
                self.record.enabled = Some(v == "true");
            }
        } else if let Some(v) = capture1(&self.pat.packages_line, line) {
            for pkg in v.split(',') {
                self.record.add_package(pkg);
            }
        } else if let Some(v) = capture1(&self.pat.description, line) {
            if self.record.description.is_none() {
                self.desc_open = true;
                self.desc_lines.push(v);
            }
        }
    }

    fn feed_options(&mut self, line: &str) {
        let stripped = line.trim();
        if !stripped.is_empty() {
            self.raw_option_lines.push(stripped.to_string());
        }

        if let Some(key) = capture1(&self.pat.opt_key, line) {
            self.flush_option();
            self.pending = Some(OptionSchema::with_key(key));
            self.section = Section::Options;
            return;
        }

        let Some(pending) = self.pending.as_mut() else {
            // Stray sub-fields before any Key: line are skipped, not errors.
            return;
        };

        if let Some(v) = capture1(&self.pat.opt_default, line) {
            pending.default = Some(v);
            self.section = Section::Options;
        } else if let Some(v) = capture1(&self.pat.opt_type, line) {
            pending.type_hint = Some(v);
            self.section = Section::Options;
        } else if let Some(v) = capture1(&self.pat.opt_required, line) {
            pending.required = Some(v == "true");
            self.section = Section::Options;
        } else if let Some(v) = capture1(&self.pat.opt_title, line) {
            pending.title = Some(v);
            self.section = Section::Options;
        } else if let Some(v) = capture1(&self.pat.description, line) {
            if !v.is_empty() {
                pending.description = Some(v);
            }
            self.section = Section::Options;
        } else if self.pat.opt_possible_header.is_match(line) {
            self.section = Section::PossibleValues;
        } else if self.section == Section::PossibleValues && !stripped.is_empty() {
            pending.possible_values.push(stripped.to_string());
        }
    }

    fn feed_compat(&mut self, line: &str) {
        // Checked before the top-level headers: the `Packages:` line pattern
        // also matches the singular `Package:` entries of this section.
        if let Some(pkg) = capture1(&self.pat.compat_package, line) {
            self.record.add_package(&pkg);
            self.current_pkg = Some(pkg.trim().to_string());
            self.section = Section::Compat;
            return;
        }
        if self.pat.compat_versions_header.is_match(line) {
            self.section = Section::CompatVersions;
            return;
        }

        // A top-level field header ends the compatibility section.
        if self.pat.is_top_level_header(line) {
            self.section = Section::Outside;
            self.current_pkg = None;
            self.feed_outside(line);
            return;
        }
        if self.section == Section::CompatVersions {
            let version = line.trim();
            if version.is_empty() {
                return;
            }
            if let Some(pkg) = &self.current_pkg {
                if let Some(versions) = self.record.compatible_versions.get_mut(pkg) {
                    versions.push(version.to_string());
                }
            }
        }
    }

    fn finish(mut self) -> PatchRecord {
        self.close_description();
        self.flush_option();

        // Heuristic path only when the structured path produced nothing.
        if self.record.options.is_empty() && !self.raw_option_lines.is_empty() {
            self.record.options = parse_heuristic_options(&self.raw_option_lines);
        }

        self.record
    }
}

/// Parse one listing block into a record. Never fails: absent fields stay
/// unset and unrecognized lines are skipped.
pub fn parse_block(block: &str) -> PatchRecord {
    let pat = ListingPatterns::new();
    parse_block_with(&pat, block)
}

fn parse_block_with(pat: &ListingPatterns, block: &str) -> PatchRecord {
    let mut parser = BlockParser::new(pat);
    for line in block.lines() {
        parser.feed(line);
    }
    parser.finish()
}

/// Heuristic option extraction for listings without structured `Key:` fields.
///
/// Each line may carry a leading key token, an optional parenthesized type
/// hint, and an optional `default=VALUE` suffix. Deduplicated by key, first
/// occurrence wins.
pub fn parse_heuristic_options(lines: &[String]) -> Vec<OptionSchema> {
    let pat = Regex::new(
        r"(?i)^\s*(?:[-*]\s*)?([A-Za-z0-9_.-]+)(?:\s*\(\s*([A-Za-z0-9_\[\]., ]+?)\s*\))?(?:.*?\bdefault\s*[:=]\s*([^\s,]+))?",
    )
    .expect("static heuristic pattern");

    let mut seen: IndexSet<String> = IndexSet::new();
    let mut options = Vec::new();

    for line in lines {
        let Some(caps) = pat.captures(line.trim()) else {
            continue;
        };
        let key = caps[1].to_string();
        if key.is_empty() || !seen.insert(key.clone()) {
            continue;
        }
        options.push(OptionSchema {
            key,
            type_hint: caps.get(2).map(|m| m.as_str().to_string()),
            default: caps.get(3).map(|m| m.as_str().to_string()),
            ..OptionSchema::default()
        });
    }

    options
}

/// Parse full listing output into an ordered catalog.
pub fn parse_listing(text: &str) -> Vec<PatchRecord> {
    let pat = ListingPatterns::new();
    let records: Vec<PatchRecord> = split_blocks(text)
        .into_iter()
        .map(|block| parse_block_with(&pat, block))
        .collect();

    debug!(records = records.len(), "parsed patch listing");
    records
}

/// Narrow a catalog to records compatible with `target`.
///
/// Comparison is case-insensitive; universal records are kept when
/// `include_universal` is set. Relative order is preserved and surviving
/// records are never mutated. Without a target this is the identity.
pub fn filter_catalog(
    catalog: &[PatchRecord],
    target: Option<&str>,
    include_universal: bool,
) -> Vec<PatchRecord> {
    let Some(target) = target else {
        return catalog.to_vec();
    };
    let target = target.trim().to_lowercase();

    catalog
        .iter()
        .filter(|record| {
            record
                .packages
                .iter()
                .any(|pkg| pkg.to_lowercase() == target)
                || (include_universal && record.is_universal())
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LISTING: &str = "\
Index: 0
Name: Remove ads
Description: Removes all in-app
advertisement banners.
Enabled: true
Compatible packages:
Package: com.example.app
Compatible versions:
1.0.0
1.1.0
Package: com.example.other
Index: 1
Name: Spoof client
Enabled: false
Packages: com.example.app, com.example.app
Options:
Key: format
Title: Image format
Type: String
Default: png
Possible values:
png
webp
Key: size
Type: Int
Index: 2
Name: Debug toggle
Enabled: false
";

    #[test]
    fn splits_on_index_headers() {
        let blocks = split_blocks(LISTING);
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with("Index: 0"));
        assert!(blocks[2].starts_with("Index: 2"));
    }

    #[test]
    fn split_reconstructs_original_spans() {
        let blocks = split_blocks(LISTING);
        let joined: String = blocks.concat();
        assert_eq!(joined, LISTING);
    }

    #[test]
    fn no_index_header_yields_single_block() {
        let text = "Name: Lonely patch\nEnabled: true\n";
        let blocks = split_blocks(text);
        assert_eq!(blocks, vec![text]);
    }

    #[test]
    fn blank_text_yields_no_blocks() {
        assert!(split_blocks("  \n\t\n").is_empty());
    }

    #[test]
    fn parses_scalar_fields() {
        let catalog = parse_listing(LISTING);
        assert_eq!(catalog.len(), 3);

        let first = &catalog[0];
        assert_eq!(first.index, Some(0));
        assert_eq!(first.name.as_deref(), Some("Remove ads"));
        assert_eq!(first.enabled, Some(true));
        assert_eq!(
            first.description.as_deref(),
            Some("Removes all in-app\nadvertisement banners.")
        );
    }

    #[test]
    fn parses_compat_section_with_versions() {
        let record = &parse_listing(LISTING)[0];
        let pkgs: Vec<&str> = record.packages.iter().map(String::as_str).collect();
        assert_eq!(pkgs, vec!["com.example.app", "com.example.other"]);
        assert_eq!(
            record.compatible_versions["com.example.app"],
            vec!["1.0.0", "1.1.0"]
        );
        assert!(record.compatible_versions["com.example.other"].is_empty());
    }

    #[test]
    fn parses_packages_line_with_dedup() {
        let record = &parse_listing(LISTING)[1];
        assert_eq!(record.packages.len(), 1);
        assert!(record.packages.contains("com.example.app"));
    }

    #[test]
    fn option_flush_keeps_defaults_with_their_keys() {
        let record = &parse_listing(LISTING)[1];
        assert_eq!(record.options.len(), 2);

        let format = &record.options[0];
        assert_eq!(format.key, "format");
        assert_eq!(format.default.as_deref(), Some("png"));
        assert_eq!(format.title.as_deref(), Some("Image format"));
        assert_eq!(format.possible_values, vec!["png", "webp"]);

        let size = &record.options[1];
        assert_eq!(size.key, "size");
        assert_eq!(size.default, None);
        assert_eq!(size.type_hint.as_deref(), Some("Int"));
        assert!(size.possible_values.is_empty());
    }

    #[test]
    fn universal_is_derived_from_packages() {
        let catalog = parse_listing(LISTING);
        assert!(!catalog[0].is_universal());
        assert!(!catalog[1].is_universal());
        assert!(catalog[2].is_universal());
    }

    #[test]
    fn single_line_description_fallback() {
        let record = parse_block("Index: 4\nDescription: One liner\nEnabled: true\n");
        assert_eq!(record.description.as_deref(), Some("One liner"));
    }

    #[test]
    fn option_description_does_not_clobber_record_description() {
        let block = "\
Index: 5
Name: Themed icons
Options:
Key: color
Description: Accent color to apply
";
        let record = parse_block(block);
        assert_eq!(record.description, None);
        assert_eq!(
            record.options[0].description.as_deref(),
            Some("Accent color to apply")
        );
    }

    #[test]
    fn malformed_block_yields_empty_record() {
        let record = parse_block("complete nonsense\nwithout any headers\n");
        assert_eq!(record.index, None);
        assert_eq!(record.name, None);
        assert!(record.options.is_empty());
        assert!(record.is_universal());
    }

    #[test]
    fn heuristic_fallback_extracts_keys() {
        let block = "\
Index: 6
Name: Legacy format
Options:
  - darkMode (Boolean) default=true
  - accent (String)
  - darkMode (Boolean) default=false
";
        let record = parse_block(block);
        assert_eq!(record.options.len(), 2);
        assert_eq!(record.options[0].key, "darkMode");
        assert_eq!(record.options[0].type_hint.as_deref(), Some("Boolean"));
        assert_eq!(record.options[0].default.as_deref(), Some("true"));
        assert_eq!(record.options[1].key, "accent");
        assert_eq!(record.options[1].default, None);
    }

    #[test]
    fn heuristic_not_used_when_structured_options_exist() {
        let lines = vec!["Key: real".to_string()];
        let heuristic = parse_heuristic_options(&lines);
        // The helper itself will happily match, but parse_block must prefer
        // the structured result.
        assert_eq!(heuristic[0].key, "Key");

        let record = parse_block("Index: 7\nOptions:\nKey: real\n");
        assert_eq!(record.options.len(), 1);
        assert_eq!(record.options[0].key, "real");
    }

    #[test]
    fn filter_matches_case_insensitively() {
        let catalog = parse_listing(LISTING);
        let filtered = filter_catalog(&catalog, Some("COM.EXAMPLE.APP"), false);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].index, Some(0));
        assert_eq!(filtered[1].index, Some(1));
    }

    #[test]
    fn filter_includes_universal_on_request() {
        let catalog = parse_listing(LISTING);
        let filtered = filter_catalog(&catalog, Some("com.example.other"), true);
        let indices: Vec<_> = filtered.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![Some(0), Some(2)]);
    }

    #[test]
    fn filter_without_target_is_identity() {
        let catalog = parse_listing(LISTING);
        let filtered = filter_catalog(&catalog, None, false);
        assert_eq!(filtered, catalog);
    }

    #[test]
    fn filter_is_idempotent() {
        let catalog = parse_listing(LISTING);
        let once = filter_catalog(&catalog, Some("com.example.app"), true);
        let twice = filter_catalog(&once, Some("com.example.app"), true);
        assert_eq!(once, twice);
    }

    fn synthetic_block(index: u32, packages: &[String]) -> String {
        let mut block = format!("Index: {index}\nName: Patch {index}\n");
        if !packages.is_empty() {
            block.push_str("Compatible packages:\n");
            for pkg in packages {
                block.push_str(&format!("Package: {pkg}\n"));
            }
        }
        block
    }

    proptest! {
        #[test]
        fn splitter_yields_one_block_per_header(count in 1usize..20) {
            let text: String = (0..count)
                .map(|i| synthetic_block(i as u32, &[]))
                .collect();
            let blocks = split_blocks(&text);
            prop_assert_eq!(blocks.len(), count);
            prop_assert_eq!(blocks.concat(), text);
        }

        #[test]
        fn universal_iff_no_packages(
            pkgs in proptest::collection::vec("[a-z]{2,8}\\.[a-z]{2,8}", 0..5)
        ) {
            let block = synthetic_block(0, &pkgs);
            let record = parse_block(&block);
            let unique: IndexSet<&String> = pkgs.iter().collect();
            prop_assert_eq!(record.packages.len(), unique.len());
            prop_assert_eq!(record.is_universal(), pkgs.is_empty());
        }
    }
}
