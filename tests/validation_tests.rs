//! Semantic validation through the public API.

use broker_claims::{
    AccountClaims, ActivationClaims, ActivationFetcher, Export, ExportType, FetchError, Import,
    KeyKind, KeyPair, RevocationList, Subject, UserClaims, ValidationConfig, ValidationContext,
    ValidationResults,
};
use url::Url;

const NOW: i64 = 1_700_000_000;

/// Serves one activation token for every URL.
struct FixedFetcher(Result<String, FetchError>);

impl ActivationFetcher for FixedFetcher {
    fn fetch(&self, _url: &Url) -> Result<String, FetchError> {
        self.0.clone()
    }
}

fn account() -> (KeyPair, AccountClaims) {
    let key = KeyPair::generate(KeyKind::Account);
    let claims = AccountClaims::new(key.public_key());
    (key, claims)
}

fn validate_at(claims: &AccountClaims, ctx: &ValidationContext<'_>) -> ValidationResults {
    let mut vr = ValidationResults::new();
    claims.validate_in(ctx, &mut vr);
    vr
}

fn activation_token(exporter: &KeyPair, importer: &str, subject: &str) -> String {
    let mut claims = ActivationClaims::new(importer);
    claims.payload.import_subject = Subject::from(subject);
    claims.payload.import_type = ExportType::Service;
    claims.encode_at(exporter, NOW).unwrap()
}

#[test]
fn export_overlap_counts() {
    let cases: &[(&[&str], usize)] = &[
        (&["bar.foo", "bar.*"], 1),
        (&["bar.foo", "bar.>"], 1),
        (&["bar.*", "bar.>"], 1),
        (&["bar.foo", "bar.*", "bar.>"], 2),
        (&["bar.foo", "bar.baz", "bar.*"], 1),
        (&["bar.foo", "baz.foo"], 0),
        (&["bar", "bar"], 1),
    ];
    for (subjects, expected) in cases {
        let (_, mut claims) = account();
        claims
            .payload
            .exports
            .add(subjects.iter().map(|s| Export::stream(*s)));
        let vr = validate_at(&claims, &ValidationContext::offline(NOW));
        assert_eq!(vr.errors().len(), *expected, "{subjects:?}: {vr:?}");
    }
}

#[test]
fn streams_and_services_may_overlap() {
    let (_, mut claims) = account();
    claims
        .payload
        .exports
        .add([Export::stream("orders.>"), Export::service("orders.new")]);
    let vr = validate_at(&claims, &ValidationContext::offline(NOW));
    assert!(vr.is_empty(), "{vr:?}");
}

#[test]
fn subject_containment_table() {
    let cases = [
        ("foo", "foo", true),
        ("foo.bar", "foo.*", true),
        ("foo.bar.baz", "foo.>", true),
        ("foo.bar.baz", "foo.*", false),
        ("foo", "foo.>", false),
        ("foo.*", "foo.>", true),
        ("foo.>", "foo.*", false),
        ("*.bar", ">", true),
        ("foo", "bar", false),
    ];
    for (subject, pattern, contained) in cases {
        assert_eq!(
            Subject::from(subject).is_contained_in(&Subject::from(pattern)),
            contained,
            "{subject} in {pattern}"
        );
    }
}

#[test]
fn activation_fetched_from_url() {
    let exporter = KeyPair::generate(KeyKind::Account);
    let (importer_key, mut claims) = account();
    let mut import = Import::new(exporter.public_key(), "svc.time", ExportType::Service);
    import.token = "https://activations.example.com/time".into();
    claims.payload.imports.add([import]);

    let good = FixedFetcher(Ok(activation_token(
        &exporter,
        &importer_key.public_key(),
        "svc.time",
    )));
    let vr = validate_at(&claims, &ValidationContext::new(&good, NOW));
    assert!(vr.is_empty(), "{vr:?}");

    let wrong = FixedFetcher(Ok(activation_token(
        &exporter,
        &importer_key.public_key(),
        "svc.date",
    )));
    let vr = validate_at(&claims, &ValidationContext::new(&wrong, NOW));
    assert!(vr.is_blocking(false));

    let down = FixedFetcher(Err(FetchError::Http {
        url: "https://activations.example.com/time".into(),
        reason: "connection refused".into(),
    }));
    let vr = validate_at(&claims, &ValidationContext::new(&down, NOW));
    assert_eq!(vr.warnings().len(), 1);
    assert!(!vr.is_blocking(true));
}

#[test]
fn expired_activation_only_counts_with_time_checks() {
    let exporter = KeyPair::generate(KeyKind::Account);
    let (importer_key, mut claims) = account();
    let mut activation = ActivationClaims::new(importer_key.public_key()).with_expires(NOW + 10);
    activation.payload.import_subject = Subject::from("svc.time");
    activation.payload.import_type = ExportType::Service;
    let mut import = Import::new(exporter.public_key(), "svc.time", ExportType::Service);
    import.token = activation.encode_at(&exporter, NOW).unwrap();
    claims.payload.imports.add([import]);

    let later = ValidationContext::offline(NOW + 100);
    assert_eq!(validate_at(&claims, &later).warnings().len(), 1);
    assert!(validate_at(&claims, &later.with_time_checks(false)).is_empty());
}

#[test]
fn overlapping_service_imports() {
    let exporter = KeyPair::generate(KeyKind::Account).public_key();
    let (_, mut claims) = account();
    claims.payload.imports.add([
        Import::new(exporter.clone(), "svc.a", ExportType::Service),
        Import::new(exporter.clone(), "svc.a", ExportType::Service),
        Import::new(exporter, "svc.a", ExportType::Stream),
    ]);
    let vr = validate_at(&claims, &ValidationContext::offline(NOW));
    assert_eq!(vr.errors().len(), 1, "{vr:?}");
    assert!(vr.mentions("overlapping subject namespace"));
}

#[test]
fn self_signed_account_restrictions_are_warnings() {
    let (key, mut claims) = account();
    claims.payload.limits.account.exports = 5;
    claims.encode_at(&key, NOW).unwrap();
    let vr = validate_at(&claims, &ValidationContext::offline(NOW));
    assert_eq!(vr.warnings().len(), 1);
    assert!(!vr.is_blocking(true));
}

#[test]
fn revocation_is_monotonic() {
    let mut list = RevocationList::default();
    list.revoke("U1", NOW);
    list.revoke("U1", NOW - 100);
    assert_eq!(list.get("U1"), Some(NOW));
    assert!(list.is_revoked("U1", NOW));
    assert!(!list.is_revoked("U1", NOW + 1));

    list.clear_revocation("U1");
    list.clear_revocation("U1");
    assert!(list.is_empty());
}

#[test]
fn validate_with_config_disables_time_checks() {
    let user = KeyPair::generate(KeyKind::User);
    let claims = UserClaims::new(user.public_key()).with_expires(NOW);

    let mut vr = ValidationResults::new();
    claims.validate(&mut vr);
    assert!(vr.is_blocking(true));
    assert!(!vr.is_blocking(false));

    let mut vr = ValidationResults::new();
    claims.validate_with(&ValidationConfig::new().with_time_checks(false), &mut vr);
    assert!(vr.is_empty(), "{vr:?}");
}
