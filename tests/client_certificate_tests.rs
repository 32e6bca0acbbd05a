//! End-to-end `client_certificate` compile tests
//!
//! Covers:
//! - Fingerprint allow-lists mixing short and long forms
//! - Bare string vs one-element sequence equivalence
//! - Fail-fast rejection (unknown keys, malformed values)
//! - SAN URI match semantics
//! - Concurrent compiles sharing one registry

use std::sync::Arc;
use std::thread;

use certmatch::Error;
use certmatch::criteria::{CompiledCriterion, Generator, Registry, facts};
use certmatch::error::{CompileError, ErrorKind};
use certmatch::rego::Statement;
use certmatch::value::Value;
use pretty_assertions::assert_eq;

fn compile(yaml: &str) -> certmatch::Result<CompiledCriterion> {
    let value = Value::from_yaml_str(yaml).unwrap();
    Registry::builtin().compile(
        "client_certificate",
        &Arc::new(Generator::default()),
        "test",
        &value,
    )
}

fn compile_error(yaml: &str) -> CompileError {
    match compile(yaml) {
        Err(Error::Compile(e)) => e,
        other => panic!("expected compile error, got {other:?}"),
    }
}

/// Statements after the fact prologue
fn condition_statements(compiled: &CompiledCriterion) -> &[Statement] {
    &compiled.rule.body.statements()[facts::prologue().len()..]
}

fn long_form(byte: &str) -> String {
    vec![byte; 32].join(":")
}

#[test]
fn test_fingerprint_allow_list_mixes_short_and_long_forms() {
    // GIVEN: one short-form and one long-form fingerprint
    let short = "aa".repeat(32);
    let long = long_form("BB");
    let yaml = format!("fingerprint: [\"{short}\", \"{long}\"]");

    // WHEN: compiling
    let compiled = compile(&yaml).unwrap();

    // THEN: both are canonicalized into one allow-list checked by equality
    let lines: Vec<String> = condition_statements(&compiled)
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        lines,
        [
            format!("allowed_fingerprints := [\"{short}\", \"{}\"]", "bb".repeat(32)),
            "fingerprint == allowed_fingerprints[_]".to_owned(),
        ]
    );
    assert!(compiled.additional_rules.is_empty());
}

#[test]
fn test_short_and_long_fingerprint_compile_identically() {
    let short = compile(&format!("fingerprint: \"{}\"", "0f".repeat(32))).unwrap();
    let long = compile(&format!("fingerprint: \"{}\"", long_form("0F"))).unwrap();
    assert_eq!(short, long);
}

#[test]
fn test_bare_string_equals_one_element_sequence() {
    let bare = compile("email: a@example.com").unwrap();
    let seq = compile("email: [a@example.com]").unwrap();
    assert_eq!(bare, seq);
}

#[test]
fn test_rule_renders_with_reasons() {
    let compiled = compile("ip: 10.0.0.1").unwrap();
    let text = compiled.rule.to_string();

    assert!(text.starts_with("client_certificate = [true, {\"client-certificate-ok\"}] {\n"));
    assert!(text.contains("\tallowed_san_ip_addresses[_] == san_ip_addresses[_]\n"));
    assert!(text.ends_with(
        "} else = [false, {\"client-certificate-unauthorized\"}] {\n\ttrue\n}"
    ));
}

#[test]
fn test_compile_is_deterministic() {
    let yaml = "dns: [a.example.com, b_c.example.com]\nuri: spiffe://cluster/ns/default";
    assert_eq!(compile(yaml).unwrap(), compile(yaml).unwrap());
}

#[test]
fn test_conditions_are_appended_in_key_order() {
    let compiled = compile("uri: spiffe://a/b\nspki_hash: FsDbM0rUYIiL3V339eIKqiz6HPSB+Pz2WeAWhqlqh8U=").unwrap();
    let first = condition_statements(&compiled)[0].to_string();
    assert!(first.starts_with("allowed_san_uris := "), "{first}");
}

// ── rejection ────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_key_names_the_key() {
    let err = compile_error("bogus_key: x");
    assert_eq!(err.kind(), ErrorKind::UnknownKey);
    assert_eq!(err.condition(), Some("bogus_key"));
    assert_eq!(
        err.to_string(),
        "client_certificate: unsupported certificate matcher condition: bogus_key"
    );
}

#[test]
fn test_malformed_value_names_condition_and_value() {
    let err = compile_error("dns: [a.example.com, -bad.example.com]");
    assert_eq!(err.kind(), ErrorKind::Format);
    assert_eq!(err.condition(), Some("dns"));
    assert_eq!(err.value(), Some("-bad.example.com"));
    assert_eq!(
        err.to_string(),
        "client_certificate.dns[1]: certificate SAN dns must be a valid DNS name (was -bad.example.com)"
    );
}

#[test]
fn test_malformed_bare_string_has_no_index() {
    let err = compile_error("dns: -bad.example.com");
    assert_eq!(
        err.to_string(),
        "client_certificate.dns: certificate SAN dns must be a valid DNS name (was -bad.example.com)"
    );
}

#[test]
fn test_one_bad_condition_rejects_whole_criterion() {
    // GIVEN: a valid fingerprint followed by an invalid IP
    let yaml = format!("fingerprint: \"{}\"\nip: 999.1.1.1", "aa".repeat(32));
    // THEN: no rule at all
    let err = compile_error(&yaml);
    assert_eq!(err.condition(), Some("ip"));
}

#[test]
fn test_wrong_shapes_are_rejected() {
    for yaml in ["[a, b]", "just-a-string", "42", "~"] {
        let err = compile_error(yaml);
        assert_eq!(err.kind(), ErrorKind::Shape, "{yaml}");
    }
    let err = compile_error("dns: {nested: true}");
    assert_eq!(
        err.to_string(),
        "client_certificate.dns: expected a string or array of strings, got object"
    );
}

#[test]
fn test_spki_hash_of_wrong_length_is_rejected() {
    // 31 bytes
    let err = compile_error("spki_hash: AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==");
    assert_eq!(err.kind(), ErrorKind::Format);
}

// ── SAN URI semantics ────────────────────────────────────────────────────────

#[test]
fn test_uri_allow_list_is_verbatim_and_compared_to_reconstruction() {
    let compiled = compile("uri: [\"spiffe://cluster/ns/default/sa/foo/\"]").unwrap();
    let lines: Vec<String> = condition_statements(&compiled)
        .iter()
        .map(ToString::to_string)
        .collect();

    // trailing slash kept; never normalized away
    assert_eq!(lines[0], r#"allowed_san_uris := ["spiffe://cluster/ns/default/sa/foo/"]"#);
    assert_eq!(lines[1], "some san_uri_index");
    assert!(lines[2].starts_with(r#"sprintf("%s://%s%s", [san_uris[san_uri_index].Scheme, "#));
    assert!(lines[2].ends_with("== allowed_san_uris[_]"));
}

#[test]
fn test_relative_uri_reference_is_accepted() {
    assert!(compile("uri: //cluster/ns/default").is_ok());
    assert_eq!(compile_error("uri: \"a b:c\"").kind(), ErrorKind::Format);
}

#[test]
fn test_loose_uri_references_load() {
    // GIVEN: references the engine's URL parser accepts but WHATWG rules reject
    for uri in ["", "http://", "https://h:99999/x", "http://[fe80::1%25eth0]/"] {
        // WHEN: compiling
        let compiled = compile(&format!("uri: \"{uri}\"")).unwrap();
        // THEN: the value is bound verbatim
        let line = condition_statements(&compiled)[0].to_string();
        assert_eq!(line, format!("allowed_san_uris := [\"{uri}\"]"));
    }
}

// ── concurrency ──────────────────────────────────────────────────────────────

#[test]
fn test_concurrent_compiles_share_registry() {
    let registry = Arc::new(Registry::builtin());
    let generator = Arc::new(Generator::default());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let generator = Arc::clone(&generator);
            thread::spawn(move || {
                let value = Value::from_yaml_str(&format!("dns: host{i}.example.com")).unwrap();
                registry
                    .compile("client_certificate", &generator, &format!("t{i}"), &value)
                    .unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let compiled = handle.join().unwrap();
        let line = condition_statements(&compiled)[0].to_string();
        assert_eq!(line, format!("allowed_san_dns_names := [\"host{i}.example.com\"]"));
    }
}
