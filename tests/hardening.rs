//! Edge-case and property tests.

mod support;
use support::*;

use proptest::prelude::*;
use stagecraft::core::placeholder;
use stagecraft::{Expected, Manifest, Selection, Session, Source, StaticConfig, VariableDefinition};

#[test]
fn test_unicode_and_multiline_values_round_trip() {
    let f = StoreFixture::new();
    f.store.set_cached_key("pässwörd 🔑").unwrap();

    let values = [
        "",
        "line one\nline two\r\n",
        "quotes \" and \\ backslashes",
        "日本語テキスト",
        "{ref:NOT_EXPANDED}",
    ];
    for (i, value) in values.iter().enumerate() {
        f.store.set(&format!("k{}", i), value).unwrap();
    }

    let store = f.reopen();
    for (i, value) in values.iter().enumerate() {
        assert_eq!(
            store.get(&format!("k{}", i), true).unwrap().revealed(),
            Some(*value)
        );
    }
}

#[test]
fn test_invalid_secret_names_rejected() {
    let f = StoreFixture::new();
    f.store.set_cached_key("p1").unwrap();

    for bad in ["", "has space", "slash/name", "semi;colon"] {
        assert!(f.store.set(bad, "v").is_err(), "{:?}", bad);
    }
    assert!(!f.store.file_exists());
}

#[test]
fn test_corrupted_file_is_not_a_key_error() {
    let f = StoreFixture::new();
    f.store.set_cached_key("p1").unwrap();
    f.store.set("k", "v").unwrap();
    std::fs::write(f.store.file_path(), "%%% not base64 %%%").unwrap();

    let err = f.store.get("k", true).unwrap_err();
    assert!(matches!(
        err,
        stagecraft::Error::Store(stagecraft::error::StoreError::Corrupted(_))
    ));
}

#[test]
fn test_long_chain_of_references() {
    let mut variables = vec![VariableDefinition::new(
        "V0",
        Source::StaticConfig { key: "v0".into() },
    )
    .with_default("x")];
    for i in 1..200 {
        variables.push(
            VariableDefinition::new(format!("V{}", i), Source::StaticConfig { key: format!("v{}", i) })
                .with_default(format!("{{ref:V{}}}", i - 1)),
        );
    }
    let manifest = Manifest::new(variables).unwrap();

    let mut session = Session::with_env(Vec::<(String, String)>::new());
    let set = session
        .resolve(&manifest, &providers_with(&[]), Selection::All)
        .unwrap();
    assert_eq!(set.value("V199"), Some("x"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn store_round_trips_any_value(value in "\\PC{0,200}") {
        let f = StoreFixture::new();
        f.store.set_cached_key("p1").unwrap();
        f.store.set("prop-key", &value).unwrap();

        let revealed = f.store.get("prop-key", true).unwrap();
        prop_assert_eq!(revealed.revealed(), Some(value.as_str()));
    }

    #[test]
    fn text_without_placeholders_expands_unchanged(value in "[^{]{0,100}") {
        let expanded = placeholder::expand(&value, |_| unreachable!()).unwrap();
        prop_assert_eq!(expanded, value);
    }

    #[test]
    fn bool_condition_ignores_case_and_padding(
        truth in any::<bool>(),
        upper in proptest::collection::vec(any::<bool>(), 5),
        pad in "[ \t]{0,3}",
    ) {
        let word = if truth { "true" } else { "false" };
        let staged: String = word
            .chars()
            .zip(upper.iter().cycle())
            .map(|(c, &up)| if up { c.to_ascii_uppercase() } else { c })
            .collect();
        let staged = format!("{}{}{}", pad, staged, pad);

        prop_assert!(Expected::Bool(truth).matches(&staged));
        prop_assert!(!Expected::Bool(!truth).matches(&staged));
    }

    #[test]
    fn overlay_value_survives_resolution(value in "[a-zA-Z0-9 _.:/-]{1,60}") {
        let manifest = Manifest::new(vec![VariableDefinition::new(
            "VALUE",
            Source::StaticConfig { key: "value".into() },
        )])
        .unwrap();
        let providers = providers_with(&[]).with_static_config(
            StaticConfig::default().with_environment(overlay(&[("value", value.as_str())])),
        );

        let mut session = Session::with_env(Vec::<(String, String)>::new());
        let set = session.resolve(&manifest, &providers, Selection::All).unwrap();
        prop_assert_eq!(set.value("VALUE"), Some(value.as_str()));
    }
}
