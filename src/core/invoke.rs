//! Invocation building: selections → engine argument list
//!
//! Deterministically serializes the exclusivity flag, resolved selections
//! with their option assignments, signing parameters, and pass-through
//! arguments into the argument vocabulary of the external patch engine.
//! Nothing here is quoted or escaped; display quoting is the caller's
//! concern.

use itertools::Itertools;

use crate::core::select::{ChoiceKey, Selection};

/// Signing parameters forwarded to the engine, in fixed flag order.
///
/// Each flag is only emitted when its value is non-empty.
#[derive(Debug, Clone, Default)]
pub struct SigningArgs {
    pub keystore: Option<String>,
    pub keystore_password: Option<String>,
    pub entry_alias: Option<String>,
    pub entry_password: Option<String>,
}

impl SigningArgs {
    fn flag_pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("--keystore", self.keystore.as_deref()),
            ("--keystore-password", self.keystore_password.as_deref()),
            ("--keystore-entry-alias", self.entry_alias.as_deref()),
            ("--keystore-entry-password", self.entry_password.as_deref()),
        ]
        .into_iter()
        .filter_map(|(flag, value)| match value {
            Some(v) if !v.is_empty() => Some((flag, v)),
            _ => None,
        })
    }
}

/// Build the ordered argument list for the engine's patch command.
///
/// Order is fixed: exclusivity flag, then one selector group per selection
/// (selector token + key, immediately followed by that selection's option
/// flags in insertion order), then signing flags, then extra pass-through
/// arguments, then `-o <output> <input>`.
pub fn build_patch_args(
    exclusive: bool,
    selections: &[Selection],
    signing: &SigningArgs,
    extra_args: &[String],
    output: &str,
    input: &str,
) -> Vec<String> {
    let mut args = Vec::new();

    if exclusive {
        args.push("--exclusive".to_string());
    }

    for selection in selections {
        match &selection.key {
            ChoiceKey::Index(i) => {
                args.push("--ei".to_string());
                args.push(i.to_string());
            }
            ChoiceKey::Name(name) => {
                args.push("-e".to_string());
                args.push(name.clone());
            }
        }

        for (key, value) in &selection.option_values {
            match value {
                // Null marker and empty value both collapse to a bare flag.
                None => args.push(format!("-O{key}")),
                Some(v) if v.is_empty() => args.push(format!("-O{key}")),
                Some(v) => args.push(format!("-O{key}={v}")),
            }
        }
    }

    for (flag, value) in signing.flag_pairs() {
        args.push(flag.to_string());
        args.push(value.to_string());
    }

    args.extend(extra_args.iter().cloned());

    args.push("-o".to_string());
    args.push(output.to_string());
    args.push(input.to_string());

    args
}

/// Render an argument list for display, quoting tokens containing spaces.
///
/// Display-only: the built argument list itself is never quoted.
pub fn render_command_line(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.contains(' ') {
                format!("\"{a}\"")
            } else {
                a.clone()
            }
        })
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn selection(key: ChoiceKey, values: &[(&str, Option<&str>)]) -> Selection {
        let option_values: IndexMap<String, Option<String>> = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect();
        Selection { key, record: None, option_values }
    }

    #[test]
    fn literal_exclusive_scenario() {
        let selections = vec![selection(
            ChoiceKey::Index(3),
            &[("format", Some("png"))],
        )];
        let args = build_patch_args(
            true,
            &selections,
            &SigningArgs::default(),
            &[],
            "out.apk",
            "in.apk",
        );
        assert_eq!(
            args,
            vec!["--exclusive", "--ei", "3", "-Oformat=png", "-o", "out.apk", "in.apk"]
        );
    }

    #[test]
    fn null_option_emits_bare_flag() {
        let selections = vec![selection(ChoiceKey::Index(1), &[("strip", None)])];
        let args = build_patch_args(
            false,
            &selections,
            &SigningArgs::default(),
            &[],
            "o.apk",
            "i.apk",
        );
        assert!(args.contains(&"-Ostrip".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-Ostrip=")));
    }

    #[test]
    fn empty_option_value_emits_bare_flag() {
        let selections = vec![selection(ChoiceKey::Index(1), &[("strip", Some(""))])];
        let args = build_patch_args(
            false,
            &selections,
            &SigningArgs::default(),
            &[],
            "o.apk",
            "i.apk",
        );
        assert!(args.contains(&"-Ostrip".to_string()));
    }

    #[test]
    fn name_selection_uses_short_flag() {
        let selections = vec![selection(ChoiceKey::Name("Remove ads".to_string()), &[])];
        let args = build_patch_args(
            false,
            &selections,
            &SigningArgs::default(),
            &[],
            "o.apk",
            "i.apk",
        );
        assert_eq!(&args[..2], &["-e".to_string(), "Remove ads".to_string()]);
    }

    #[test]
    fn options_stay_adjacent_to_their_selector() {
        let selections = vec![
            selection(ChoiceKey::Index(1), &[("a", Some("1"))]),
            selection(ChoiceKey::Index(2), &[("b", Some("2"))]),
        ];
        let args = build_patch_args(
            false,
            &selections,
            &SigningArgs::default(),
            &[],
            "o.apk",
            "i.apk",
        );
        assert_eq!(
            args,
            vec!["--ei", "1", "-Oa=1", "--ei", "2", "-Ob=2", "-o", "o.apk", "i.apk"]
        );
    }

    #[test]
    fn signing_flags_in_fixed_order_skipping_empty() {
        let signing = SigningArgs {
            keystore: Some("keys.jks".to_string()),
            keystore_password: Some(String::new()),
            entry_alias: Some("release".to_string()),
            entry_password: None,
        };
        let args = build_patch_args(false, &[], &signing, &[], "o.apk", "i.apk");
        assert_eq!(
            args,
            vec![
                "--keystore",
                "keys.jks",
                "--keystore-entry-alias",
                "release",
                "-o",
                "o.apk",
                "i.apk"
            ]
        );
    }

    #[test]
    fn extra_args_pass_through_before_output() {
        let extra = vec!["--purge".to_string(), "--rip-lib".to_string()];
        let args = build_patch_args(false, &[], &SigningArgs::default(), &extra, "o.apk", "i.apk");
        assert_eq!(
            args,
            vec!["--purge", "--rip-lib", "-o", "o.apk", "i.apk"]
        );
    }

    #[test]
    fn builder_is_deterministic() {
        let selections = vec![selection(
            ChoiceKey::Index(3),
            &[("z", Some("1")), ("a", Some("2"))],
        )];
        let first = build_patch_args(true, &selections, &SigningArgs::default(), &[], "o", "i");
        let second = build_patch_args(true, &selections, &SigningArgs::default(), &[], "o", "i");
        assert_eq!(first, second);
        // Insertion order, not alphabetical.
        assert_eq!(first[3], "-Oz=1");
        assert_eq!(first[4], "-Oa=2");
    }

    #[test]
    fn render_quotes_only_for_display() {
        let args = vec!["-e".to_string(), "Remove ads".to_string()];
        assert_eq!(render_command_line(&args), "-e \"Remove ads\"");
    }
}
