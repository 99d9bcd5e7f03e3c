use otpdecode::otpauth::{FIELDS, OtpUri};
use otpdecode::{ParameterEntry, interpret};
use std::collections::HashSet;

fn pairs(entries: &[ParameterEntry]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|e| (e.key.clone(), e.value.clone()))
        .collect()
}

fn has(entries: &[ParameterEntry], key: &str, value: &str) -> bool {
    entries.iter().any(|e| e.key == key && e.value == value)
}

fn keys(entries: &[ParameterEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.key.as_str()).collect()
}

#[test]
fn non_otpauth_text_is_not_recognized() {
    for s in [
        "OTPAUTH://totp/foo",
        "",
        "http://x",
        "otpauth:/totp/foo",
        "otpauth",
        "xotpauth://totp/foo",
    ] {
        assert!(interpret(s).is_none(), "{s:?} should not be recognized");
    }
}

#[test]
fn totp_example_from_authenticator_apps() {
    let entries =
        interpret("otpauth://totp/Example:alice?secret=JBSWY3DPEHPK3PXP&issuer=Example").unwrap();

    assert_eq!(entries[0].key, "type");
    assert_eq!(entries[0].value, "totp");
    assert_eq!(entries[1].key, "label");
    assert_eq!(entries[1].value, "Example:alice");
    assert!(has(&entries, "secret", "JBSWY3DPEHPK3PXP"));
    assert!(has(&entries, "issuer", "Example"));
    assert!(has(&entries, "algorithm", "SHA1"));
    assert!(has(&entries, "digits", "6"));
    assert!(has(&entries, "period", "30"));
    assert!(!keys(&entries).contains(&"counter"));
}

#[test]
fn hotp_with_counter_excludes_period() {
    let entries = interpret("otpauth://hotp/Example?secret=ABC&counter=5").unwrap();
    assert!(has(&entries, "counter", "5"));
    assert!(!keys(&entries).contains(&"period"));
}

#[test]
fn hotp_with_explicit_period_keeps_both() {
    let entries = interpret("otpauth://hotp/Example?secret=ABC&period=30").unwrap();
    assert!(has(&entries, "counter", "0"));
    assert!(has(&entries, "period", "30"));
}

#[test]
fn totp_with_explicit_counter_keeps_both() {
    let entries = interpret("otpauth://totp/x?counter=9").unwrap();
    assert!(has(&entries, "counter", "9"));
    assert!(has(&entries, "period", "30"));
}

#[test]
fn unknown_keys_follow_fixed_fields_in_query_order() {
    let entries = interpret("otpauth://totp/x?secret=A&foo=bar&baz=qux").unwrap();
    assert_eq!(
        keys(&entries),
        vec![
            "type",
            "label",
            "issuer",
            "secret",
            "algorithm",
            "digits",
            "period",
            "image",
            "foo",
            "baz",
        ]
    );
    let tail = &entries[entries.len() - 2..];
    assert_eq!(tail[0].value, "bar");
    assert_eq!(tail[1].value, "qux");
    assert!(tail.iter().all(|e| e.tooltip.is_empty()));
}

#[test]
fn known_fields_carry_exact_tooltips() {
    let entries = interpret("otpauth://hotp/x?period=60").unwrap();
    for spec in FIELDS.iter() {
        let entry = entries.iter().find(|e| e.key == spec.key).unwrap();
        assert_eq!(entry.tooltip, spec.tooltip);
    }
    let period = entries.iter().find(|e| e.key == "period").unwrap();
    assert_eq!(
        period.tooltip,
        "The period of time in seconds for which the one-time password will be valid. Default value: 30"
    );
    assert_eq!(period.value, "60");
}

#[test]
fn defaults_table_is_exact() {
    let entries = interpret("otpauth://hotp/").unwrap();
    let got = pairs(&entries);
    let expected: Vec<(String, String)> = [
        ("type", "hotp"),
        ("label", ""),
        ("issuer", "(empty)"),
        ("secret", "(empty)"),
        ("algorithm", "SHA1"),
        ("digits", "6"),
        ("counter", "0"),
        ("image", "(empty)"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(got, expected);
}

#[test]
fn repeated_calls_are_identical() {
    let s = "otpauth://totp/A%20B?secret=S&x=1&x=2&y";
    assert_eq!(interpret(s), interpret(s));
    assert_eq!(OtpUri::parse(s), OtpUri::parse(s));
}

#[test]
fn no_duplicate_keys_even_when_query_repeats_fixed_or_synthetic_keys() {
    let entries = interpret(
        "otpauth://totp/lbl?secret=A&secret=B&type=hotp&label=other&issuer=I&foo=1&foo=2",
    )
    .unwrap();

    let mut seen = HashSet::new();
    let fixed: HashSet<&str> = FIELDS.iter().map(|f| f.key).collect();
    for e in &entries {
        if fixed.contains(e.key.as_str()) {
            assert!(seen.insert(e.key.clone()), "duplicate fixed key {}", e.key);
        }
    }
    assert!(has(&entries, "secret", "B"));
    assert_eq!(entries.iter().filter(|e| e.key == "foo").count(), 1);
    assert!(has(&entries, "foo", "2"));
    assert_eq!(entries[0].value, "totp");
    assert_eq!(entries[1].value, "lbl");
}

#[test]
fn malformed_parts_degrade_to_defaults() {
    let entries = interpret("otpauth://").unwrap();
    assert_eq!(entries[0].value, "");
    assert_eq!(entries[1].value, "");
    assert!(!keys(&entries).contains(&"counter"));
    assert!(!keys(&entries).contains(&"period"));
    assert!(has(&entries, "digits", "6"));

    let entries = interpret("otpauth://totp/%E0%A4%A?secret=%%").unwrap();
    assert_eq!(entries[0].value, "totp");
    assert!(has(&entries, "secret", "%%"));
}

#[test]
fn label_keeps_dot_segments_verbatim() {
    let entries = interpret("otpauth://totp/a/../b?secret=X").unwrap();
    assert_eq!(entries[1].key, "label");
    assert_eq!(entries[1].value, "a/../b");
    assert!(has(&entries, "secret", "X"));

    let uri = OtpUri::parse("otpauth://hotp/./x/.?counter=3").unwrap();
    assert_eq!(uri.label(), "./x/.");
    assert_eq!(uri.get("counter"), Some("3"));
}
