//! End-to-end core pipeline tests: listing text through parsing, filtering,
//! selection resolution, and argument building, without touching the
//! external engine.

use anyhow::Result;
use patchup::core::catalog::{OptionSchema, PatchRecord, filter_catalog, parse_listing};
use patchup::core::invoke::{SigningArgs, build_patch_args};
use patchup::core::select::{
    ChoiceKey, OperatorPrompt, OptionAnswer, resolve_selections,
};

/// Replays canned option answers in order; selection comes from the test.
struct Scripted {
    answers: Vec<OptionAnswer>,
    cursor: usize,
}

impl Scripted {
    fn new(answers: Vec<OptionAnswer>) -> Self {
        Self { answers, cursor: 0 }
    }
}

impl OperatorPrompt for Scripted {
    fn choose_patches(&mut self, _catalog: &[PatchRecord]) -> Result<Vec<ChoiceKey>> {
        Ok(Vec::new())
    }

    fn option_answer(
        &mut self,
        _patch: &PatchRecord,
        _option: &OptionSchema,
    ) -> Result<OptionAnswer> {
        let answer = self
            .answers
            .get(self.cursor)
            .cloned()
            .unwrap_or(OptionAnswer::Skip);
        self.cursor += 1;
        Ok(answer)
    }
}

/// Listing shaped like the engine's output: one universal patch and two
/// package-scoped ones, one of which matches the target.
const LISTING: &str = "\
Index: 0
Name: Remove ads
Description: Removes in-app advertisements.
Enabled: true
Compatible packages:
Package: com.example.app
Compatible versions:
1.2.3
Index: 1
Name: Spoof client
Enabled: false
Packages: com.other.app
Options:
Key: format
Default: png
Key: strip
Index: 2
Name: Debug info
Enabled: false
";

#[test]
fn filter_round_trip_keeps_match_and_universal_in_order() {
    let catalog = parse_listing(LISTING);
    assert_eq!(catalog.len(), 3);

    let filtered = filter_catalog(&catalog, Some("com.example.app"), true);
    let names: Vec<&str> = filtered
        .iter()
        .filter_map(|r| r.name.as_deref())
        .collect();
    assert_eq!(names, vec!["Remove ads", "Debug info"]);
}

#[test]
fn selection_order_follows_choices_not_catalog() {
    let catalog = parse_listing(LISTING);
    let choices = vec![
        ChoiceKey::Index(2),
        ChoiceKey::Name("Remove ads".to_string()),
    ];

    let mut prompt = Scripted::new(Vec::new());
    let selections = resolve_selections(&catalog, &choices, &mut prompt).unwrap();

    assert_eq!(selections[0].key, ChoiceKey::Index(2));
    assert_eq!(
        selections[1].key,
        ChoiceKey::Name("Remove ads".to_string())
    );
}

#[test]
fn full_flow_builds_the_expected_argument_list() {
    let catalog = parse_listing(LISTING);
    let filtered = filter_catalog(&catalog, Some("com.other.app"), false);
    assert_eq!(filtered.len(), 1);

    // Set format explicitly, null the default-less strip option.
    let mut prompt = Scripted::new(vec![
        OptionAnswer::Input("webp".to_string()),
        OptionAnswer::Input(String::new()),
    ]);
    let choices = vec![ChoiceKey::Index(1)];
    let selections = resolve_selections(&filtered, &choices, &mut prompt).unwrap();

    let args = build_patch_args(
        true,
        &selections,
        &SigningArgs::default(),
        &[],
        "out/app_patched.apk",
        "app.apk",
    );

    assert_eq!(
        args,
        vec![
            "--exclusive",
            "--ei",
            "1",
            "-Oformat=webp",
            "-Ostrip",
            "-o",
            "out/app_patched.apk",
            "app.apk"
        ]
    );
}

#[test]
fn unresolved_choice_is_forwarded_to_the_engine() {
    let catalog = parse_listing(LISTING);
    let choices = vec![ChoiceKey::Name("No such patch".to_string())];

    let mut prompt = Scripted::new(Vec::new());
    let selections = resolve_selections(&catalog, &choices, &mut prompt).unwrap();
    assert!(selections[0].record.is_none());

    let args = build_patch_args(
        false,
        &selections,
        &SigningArgs::default(),
        &[],
        "o.apk",
        "i.apk",
    );
    assert_eq!(args, vec!["-e", "No such patch", "-o", "o.apk", "i.apk"]);
}

#[test]
fn resolution_is_reproducible() {
    let catalog = parse_listing(LISTING);
    let choices = vec![ChoiceKey::Index(1), ChoiceKey::Index(0)];

    let run = |answers: Vec<OptionAnswer>| {
        let mut prompt = Scripted::new(answers);
        let selections = resolve_selections(&catalog, &choices, &mut prompt).unwrap();
        build_patch_args(
            true,
            &selections,
            &SigningArgs::default(),
            &[],
            "o.apk",
            "i.apk",
        )
    };

    let answers =
        || vec![OptionAnswer::Input("png".to_string()), OptionAnswer::Skip];
    assert_eq!(run(answers()), run(answers()));
}
