// Property tests: serialized scripts parse back to the same actions.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeMap;

use gridagent_actions::*;
use proptest::prelude::*;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_ref() -> impl Strategy<Value = CellRef> {
    let row = prop_oneof![
        3 => (1u32..100_000).prop_map(RowRef::At),
        1 => Just(RowRef::Last),
    ];
    ("[A-Z]{1,3}", row).prop_map(|(col, row)| CellRef { col, row })
}

fn arb_range() -> impl Strategy<Value = RangeRef> {
    (arb_ref(), arb_ref()).prop_map(|(from, to)| RangeRef::new(from, to))
}

fn arb_filter() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        2 => Just(None),
        1 => prop::sample::select(vec![r"^\?.*$", "^[0-9]+$", "total", r"^([5-9][0-9]{3})$", r"a\|b"])
            .prop_map(|p| Some(p.to_string())),
    ]
}

/// Single-line free text, already trimmed the way the parser trims it.
/// Text after a `;` never starts with `REGEX`, which would begin a new entry.
fn arb_text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9=+(),.!?:;' ]{0,30}"
        .prop_filter("`;` before REGEX splits the entry", |s| {
            !s.split(';').skip(1).any(|tail| tail.trim_start().to_ascii_uppercase().starts_with("REGEX"))
        })
        .prop_map(|s| s.trim().to_string())
}

fn arb_style() -> impl Strategy<Value = FormatStyle> {
    prop::sample::select(vec![
        FormatStyle::Bold,
        FormatStyle::Italic,
        FormatStyle::Underline,
        FormatStyle::Strikethrough,
        FormatStyle::BackgroundColor,
        FormatStyle::FontColor,
        FormatStyle::FontSize,
        FormatStyle::HorizontalAlignment,
        FormatStyle::VerticalAlignment,
        FormatStyle::Border,
        FormatStyle::WrapText,
        FormatStyle::NumberFormat,
        FormatStyle::None,
    ])
}

fn arb_format() -> impl Strategy<Value = FormatSpec> {
    let pick = |values: Vec<&'static str>| prop::option::of(prop::sample::select(values).prop_map(String::from));
    (
        arb_style(),
        pick(vec!["yellow", "red", "#00FF00", "light blue"]),
        prop::option::of(1u32..100),
        pick(vec!["left", "center", "right", "top"]),
        prop::option::of(any::<bool>()),
        pick(vec!["0.00", "#,##0", "0%", "h:mm", "General", "#,##0 \"h:m\"", "0;-0;"]),
        prop::collection::btree_map(
            prop::sample::select(vec!["top", "bottom", "left", "right"]).prop_map(String::from),
            any::<bool>(),
            0..4,
        ),
    )
        .prop_map(|(style, color, size, alignment, wrap, value_format, border)| FormatSpec {
            style,
            color,
            size,
            alignment,
            wrap,
            value_format,
            border: border.into_iter().collect::<BTreeMap<_, _>>(),
        })
}

fn arb_kind() -> impl Strategy<Value = ActionKind> {
    prop_oneof![
        arb_range().prop_map(ActionKind::Select),
        arb_range().prop_map(ActionKind::SelectAndDrag),
        arb_range().prop_map(ActionKind::Read),
        arb_format().prop_map(ActionKind::Format),
        arb_text().prop_map(ActionKind::Set),
        "[a-z_]{1,12}( [a-z0-9.%]{1,6})?".prop_map(ActionKind::ToolAction),
        arb_text().prop_map(ActionKind::TellUser),
        Just(ActionKind::Terminate),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    (arb_filter(), arb_kind()).prop_map(|(filter, kind)| Action { filter, kind })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn parse_inverts_serialize(actions in prop::collection::vec(arb_action(), 0..12)) {
        let text = serialize(&actions);
        let parsed = parse(&text).map_err(|e| TestCaseError::fail(format!("{}\n{}", e, text)))?;
        prop_assert_eq!(parsed, actions);
    }

    #[test]
    fn serialize_is_stable(actions in prop::collection::vec(arb_action(), 1..8)) {
        let once = serialize(&actions);
        let twice = serialize(&parse(&once).map_err(|e| TestCaseError::fail(e.to_string()))?);
        prop_assert_eq!(once, twice);
    }
}

#[test]
fn test_explicit_default_pattern_canonicalizes() {
    let action = Action::with_filter(ActionKind::Set("1".into()), DEFAULT_PATTERN);
    let parsed = parse(&serialize(&[action])).unwrap();
    assert_eq!(parsed[0].filter, None);
    assert_eq!(parsed[0].to_string(), "REGEX ^.*$ | SET 1");
}
