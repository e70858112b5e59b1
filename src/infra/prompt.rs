//! Console operator prompts over stdin/stdout
//!
//! Implements the operator-interaction surface the selection resolver
//! depends on: catalog rendering with a numbered pick list, per-option
//! prompts honoring declared defaults, and small confirm/text primitives.
//! Kept behind the `OperatorPrompt` trait so the resolver stays pure.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use crate::core::catalog::{OptionSchema, PatchRecord};
use crate::core::select::{ChoiceKey, OperatorPrompt, OptionAnswer, default_choices};

/// Parse a comma-separated operator entry into ordered choice keys.
///
/// Numeric tokens select by index, anything else by exact name.
pub fn parse_choice_tokens(input: &str) -> Vec<ChoiceKey> {
    input
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| match token.parse::<u32>() {
            Ok(index) => ChoiceKey::Index(index),
            Err(_) => ChoiceKey::Name(token.to_string()),
        })
        .collect()
}

/// Short status tags rendered after a patch name in pick lists.
fn record_tags(record: &PatchRecord) -> String {
    let mut tags = Vec::new();
    if record.enabled == Some(true) {
        tags.push("enabled".to_string());
    }
    if record.is_universal() {
        tags.push("universal".to_string());
    }
    if !record.packages.is_empty() {
        tags.push(format!("{} pkg(s)", record.packages.len()));
    }

    if tags.is_empty() {
        String::new()
    } else {
        format!(" — {}", tags.join(" | "))
    }
}

/// Interactive console prompt.
pub struct ConsolePrompt;

impl ConsolePrompt {
    pub fn new() -> Self {
        Self
    }

    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read operator input")?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Yes/no confirmation; empty input takes the default.
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        print!("{prompt} {hint} ");
        io::stdout().flush()?;

        let input = self.read_line()?;
        if input.is_empty() {
            return Ok(default);
        }
        Ok(input.eq_ignore_ascii_case("y") || input.eq_ignore_ascii_case("yes"))
    }

    /// Free-text input; empty input takes the default when one is given.
    pub fn text(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(d) if !d.is_empty() => print!("{prompt} [{d}] "),
            _ => print!("{prompt} "),
        }
        io::stdout().flush()?;

        let input = self.read_line()?;
        if input.is_empty() {
            if let Some(d) = default {
                return Ok(d.to_string());
            }
        }
        Ok(input)
    }

    /// Numbered pick from a list of labels; returns the chosen position.
    pub fn pick_index(&self, title: &str, labels: &[String]) -> Result<usize> {
        println!("{}", title.bold());
        for (i, label) in labels.iter().enumerate() {
            println!("  {}: {}", i + 1, label);
        }

        loop {
            print!("Select (1-{}): ", labels.len());
            io::stdout().flush()?;
            let input = self.read_line()?;

            match input.parse::<usize>() {
                Ok(n) if (1..=labels.len()).contains(&n) => return Ok(n - 1),
                _ => println!("{} Enter a number between 1 and {}", "⚠".yellow(), labels.len()),
            }
        }
    }

    fn render_catalog(&self, catalog: &[PatchRecord]) {
        for record in catalog {
            let index = match record.index {
                Some(i) => format!("[{i}]"),
                None => "[—]".to_string(),
            };
            let name = record.name.as_deref().unwrap_or("(Unnamed patch)");
            println!("  {} {}{}", index.cyan(), name, record_tags(record).dimmed());
        }
    }
}

impl OperatorPrompt for ConsolePrompt {
    fn choose_patches(&mut self, catalog: &[PatchRecord]) -> Result<Vec<ChoiceKey>> {
        let defaults = default_choices(catalog);

        if !defaults.is_empty() {
            println!(
                "{} {} patches enabled by default",
                "ℹ".cyan(),
                defaults.len()
            );
            for record in catalog.iter().filter(|r| r.enabled == Some(true)).take(5) {
                println!("  • {}", record.name.as_deref().unwrap_or("(Unnamed patch)"));
            }
            if defaults.len() > 5 {
                println!("  ... and {} more", defaults.len() - 5);
            }

            if !self.confirm("Customize patch selection?", false)? {
                return Ok(defaults);
            }
        }

        self.render_catalog(catalog);
        print!("Select patches (comma-separated indices or names): ");
        io::stdout().flush()?;
        let input = self.read_line()?;

        Ok(parse_choice_tokens(&input))
    }

    fn option_answer(
        &mut self,
        patch: &PatchRecord,
        option: &OptionSchema,
    ) -> Result<OptionAnswer> {
        let patch_name = patch.name.as_deref().unwrap_or("(Unnamed patch)");
        println!("\n{} option: {}", patch_name.bold(), option.key.cyan());
        if let Some(title) = &option.title {
            println!("  Title: {title}");
        }
        if let Some(desc) = &option.description {
            println!("  Description: {desc}");
        }
        if let Some(type_hint) = &option.type_hint {
            println!("  Type: {type_hint}");
        }
        if let Some(default) = &option.default {
            println!("  Default: {default}");
        }
        if !option.possible_values.is_empty() {
            println!("  Possible values: {}", option.possible_values.join(", "));
        }

        let set_it = self.confirm(
            &format!("Set option '{}'?", option.key),
            option.required == Some(true),
        )?;
        if !set_it {
            return Ok(OptionAnswer::Skip);
        }

        let mut prompt = format!("Value for '{}'", option.key);
        if option.default.is_none() {
            prompt.push_str(" (leave empty to set null)");
        }
        prompt.push(':');

        let input = self.text(&prompt, option.default.as_deref())?;
        Ok(OptionAnswer::Input(input))
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-interactive prompt: accepts the engine's default-enabled patches and
/// never sets options.
pub struct AutoPrompt;

impl OperatorPrompt for AutoPrompt {
    fn choose_patches(&mut self, catalog: &[PatchRecord]) -> Result<Vec<ChoiceKey>> {
        Ok(default_choices(catalog))
    }

    fn option_answer(
        &mut self,
        _patch: &PatchRecord,
        _option: &OptionSchema,
    ) -> Result<OptionAnswer> {
        Ok(OptionAnswer::Skip)
    }
}
