//! End-to-end tests across the trust hierarchy: operator, account, user.

use broker_claims::{
    AccountClaims, ActivationClaims, AnyClaims, ClaimType, ClaimsError, Export, ExportType,
    GenericClaims, KeyKind, KeyPair, OperatorClaims, Subject, UserClaims, ValidationResults,
    decode_any, decode_segment, encode_segment,
};

const NOW: i64 = 1_700_000_000;

struct Hierarchy {
    operator: KeyPair,
    account: KeyPair,
    user: KeyPair,
}

impl Hierarchy {
    fn new() -> Self {
        Self {
            operator: KeyPair::generate(KeyKind::Operator),
            account: KeyPair::generate(KeyKind::Account),
            user: KeyPair::generate(KeyKind::User),
        }
    }
}

#[test]
fn full_chain_round_trip() {
    let h = Hierarchy::new();

    let mut operator = OperatorClaims::new(h.operator.public_key()).with_name("root");
    let operator_jwt = operator.encode_at(&h.operator, NOW).unwrap();

    let mut account = AccountClaims::new(h.account.public_key()).with_name("billing");
    account.payload.exports.add([Export::service("billing.invoice")]);
    let account_jwt = account.encode_at(&h.operator, NOW).unwrap();

    let mut user = UserClaims::new(h.user.public_key()).with_name("worker");
    user.payload
        .permission_limits
        .permissions
        .publish
        .allow(["billing.>"]);
    let user_jwt = user.encode_at(&h.account, NOW).unwrap();

    let operator_back = OperatorClaims::decode_at(&operator_jwt, NOW).unwrap();
    let account_back = AccountClaims::decode_at(&account_jwt, NOW).unwrap();
    let user_back = UserClaims::decode_at(&user_jwt, NOW).unwrap();

    assert_eq!(operator_back, operator);
    assert_eq!(account_back, account);
    assert_eq!(user_back, user);

    assert!(operator_back.did_sign(&account_back.data.issuer));
    assert!(account_back.did_sign(&user_back.data.issuer, &user_back.payload.issuer_account));

    let mut vr = ValidationResults::new();
    account_back.validate_user_signer(&user_back, &mut vr);
    assert!(vr.is_empty(), "{vr:?}");
}

#[test]
fn header_is_v1_ed25519() {
    let h = Hierarchy::new();
    let token = AccountClaims::new(h.account.public_key())
        .encode_at(&h.operator, NOW)
        .unwrap();
    let header = token.split('.').next().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&decode_segment(header).unwrap()).unwrap();
    assert_eq!(json["typ"], "jwt");
    assert_eq!(json["alg"], "ed25519");
    assert!(!token.contains('='));
}

#[test]
fn tampered_payload_fails_signature() {
    let h = Hierarchy::new();
    let token = AccountClaims::new(h.account.public_key())
        .with_name("billing")
        .encode_at(&h.operator, NOW)
        .unwrap();
    let parts: Vec<&str> = token.split('.').collect();

    let mut payload: serde_json::Value =
        serde_json::from_slice(&decode_segment(parts[1]).unwrap()).unwrap();
    payload["name"] = "accounting".into();
    let forged = format!(
        "{}.{}.{}",
        parts[0],
        encode_segment(&serde_json::to_vec(&payload).unwrap()),
        parts[2]
    );
    assert_eq!(
        AccountClaims::decode_at(&forged, NOW),
        Err(ClaimsError::SignatureInvalid)
    );
}

#[test]
fn resigned_by_wrong_class_is_untrusted() {
    let h = Hierarchy::new();
    let mut claims = UserClaims::new(h.user.public_key());
    claims.encode_at(&h.account, NOW).unwrap();

    // A validly signed token whose issuer is a user key.
    claims.data.issuer = h.user.public_key();
    let payload = encode_segment(&serde_json::to_vec(&claims).unwrap());
    let header = encode_segment(br#"{"typ":"jwt","alg":"ed25519"}"#);
    let signature = encode_segment(&h.user.sign(payload.as_bytes()).unwrap());
    let token = format!("{header}.{payload}.{signature}");

    assert!(matches!(
        UserClaims::decode_at(&token, NOW),
        Err(ClaimsError::UntrustedIssuer { .. })
    ));
}

#[test]
fn account_issuer_classes_on_decode() {
    let h = Hierarchy::new();

    let by_operator = AccountClaims::new(h.account.public_key())
        .encode_at(&h.operator, NOW)
        .unwrap();
    let decoded = AccountClaims::decode_at(&by_operator, NOW).unwrap();
    assert_eq!(decoded.data.issuer, h.operator.public_key());

    let self_signed = AccountClaims::new(h.account.public_key())
        .encode_at(&h.account, NOW)
        .unwrap();
    let decoded = AccountClaims::decode_at(&self_signed, NOW).unwrap();
    assert!(decoded.data.is_self_signed());

    // Encode refuses user signers, so assemble the token by hand.
    let mut claims = AccountClaims::new(h.account.public_key());
    claims.encode_at(&h.operator, NOW).unwrap();
    claims.data.issuer = h.user.public_key();
    let payload = encode_segment(&serde_json::to_vec(&claims).unwrap());
    let header = encode_segment(br#"{"typ":"jwt","alg":"ed25519"}"#);
    let signature = encode_segment(&h.user.sign(payload.as_bytes()).unwrap());
    let token = format!("{header}.{payload}.{signature}");

    assert!(matches!(
        AccountClaims::decode_at(&token, NOW),
        Err(ClaimsError::UntrustedIssuer { .. })
    ));
}

#[test]
fn rejects_unsupported_headers() {
    let h = Hierarchy::new();
    let token = AccountClaims::new(h.account.public_key())
        .encode_at(&h.operator, NOW)
        .unwrap();
    let rest = token.split_once('.').unwrap().1;

    for header in [
        r#"{"typ":"jwt","alg":"HS256"}"#,
        r#"{"typ":"jws","alg":"ed25519"}"#,
    ] {
        let token = format!("{}.{rest}", encode_segment(header.as_bytes()));
        assert!(matches!(
            AccountClaims::decode_at(&token, NOW),
            Err(ClaimsError::UnsupportedHeader { .. })
        ));
    }

    let upper = format!("{}.{rest}", encode_segment(br#"{"typ":"JWT","alg":"ed25519"}"#));
    assert!(AccountClaims::decode_at(&upper, NOW).is_ok());
}

#[test]
fn malformed_tokens() {
    for token in ["", "a.b", "a.b.c.d", "!!.??.**"] {
        assert!(matches!(
            AccountClaims::decode_at(token, NOW),
            Err(ClaimsError::MalformedToken { .. })
        ));
    }
}

#[test]
fn expiry_and_not_before() {
    let h = Hierarchy::new();
    let expiring = AccountClaims::new(h.account.public_key())
        .with_expires(NOW + 60)
        .encode_at(&h.operator, NOW)
        .unwrap();
    assert!(AccountClaims::decode_at(&expiring, NOW + 60).is_ok());
    assert_eq!(
        AccountClaims::decode_at(&expiring, NOW + 61),
        Err(ClaimsError::Expired { expires: NOW + 60 })
    );

    let future = AccountClaims::new(h.account.public_key())
        .with_not_before(NOW + 60)
        .encode_at(&h.operator, NOW)
        .unwrap();
    let err = AccountClaims::decode_at(&future, NOW).unwrap_err();
    assert!(err.is_time_check());
    assert!(AccountClaims::decode_at(&future, NOW + 60).is_ok());
}

#[test]
fn decode_any_covers_every_hierarchy_kind() {
    let h = Hierarchy::new();
    let tokens = [
        OperatorClaims::new(h.operator.public_key())
            .encode_at(&h.operator, NOW)
            .unwrap(),
        AccountClaims::new(h.account.public_key())
            .encode_at(&h.operator, NOW)
            .unwrap(),
        UserClaims::new(h.user.public_key())
            .encode_at(&h.account, NOW)
            .unwrap(),
    ];
    let kinds: Vec<ClaimType> = tokens
        .iter()
        .map(|t| decode_any(t).unwrap().claim_type().clone())
        .collect();
    assert_eq!(kinds, [ClaimType::Operator, ClaimType::Account, ClaimType::User]);
}

#[test]
fn generic_decode_reads_any_kind() {
    let h = Hierarchy::new();
    let token = UserClaims::new(h.user.public_key())
        .encode_at(&h.account, NOW)
        .unwrap();
    let generic = GenericClaims::decode_at(&token, NOW).unwrap();
    assert_eq!(generic.data.claim_type, ClaimType::User);
    assert!(generic.payload.get("subs").is_some());
    assert!(matches!(decode_any(&token).unwrap(), AnyClaims::User(_)));
}

#[test]
fn activation_hash_is_stable_across_encodes() {
    let exporter = KeyPair::generate(KeyKind::Account);
    let importer = KeyPair::generate(KeyKind::Account);
    let mut claims = ActivationClaims::new(importer.public_key());
    claims.payload.import_subject = Subject::from("orders.*");
    claims.payload.import_type = ExportType::Stream;

    claims.encode_at(&exporter, NOW).unwrap();
    let first = claims.hash_id().unwrap();
    claims.encode_at(&exporter, NOW + 100).unwrap();
    assert_eq!(claims.hash_id().unwrap(), first);

    claims.payload.import_subject = Subject::from("orders.>");
    assert_eq!(claims.hash_id().unwrap(), first);
}

#[test]
fn seed_round_trip_signs_identically() {
    let account = KeyPair::generate(KeyKind::Account);
    let restored = KeyPair::from_seed(&account.seed().unwrap()).unwrap();
    assert_eq!(restored.public_key(), account.public_key());

    let user = KeyPair::generate(KeyKind::User);
    let token = UserClaims::new(user.public_key())
        .encode_at(&restored, NOW)
        .unwrap();
    assert_eq!(
        UserClaims::decode_at(&token, NOW).unwrap().data.issuer,
        account.public_key()
    );
}
