use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use urlsigner::{
    CanonicalUrl, EnvKey, Expiration, FixedClock, QueryMap, QueryValue, StaticKey, UrlSigner,
    UrlSignerError, Verdict,
};

// Some time in 2023, well before the far-future fixtures below.
const NOW: i64 = 1_700_000_000;

fn signer() -> UrlSigner<StaticKey, FixedClock> {
    UrlSigner::new(StaticKey::new("random_monkey")).with_clock(FixedClock(NOW))
}

fn no_params() -> QueryMap {
    QueryMap::new()
}

#[test]
fn keeps_query_parameters_intact() {
    let expiration = time::OffsetDateTime::from_unix_timestamp(4594900544).unwrap();
    let signed = signer()
        .temporary_sign("http://myapp.com/?foo=bar&baz=qux", expiration, no_params())
        .unwrap();

    assert_eq!(
        signed,
        "http://myapp.com/?baz=qux&expires=4594900544&foo=bar&signature=2f6b9c6fd8d3a3686e4548453066740bad6393af3ff2c37cd748f4c138c7802e"
    );
    assert!(signer().validate(&signed).unwrap());
}

#[test]
fn signed_url_validates() {
    let signed = signer()
        .sign("http://myapp.com/", [("api_token", "randomasd")], None)
        .unwrap();
    assert!(signed.starts_with("http://myapp.com/?api_token=randomasd&signature="));
    assert!(signer().validate(&signed).unwrap());
}

#[test]
fn non_expired_url_validates_with_wall_clock() {
    let signer = UrlSigner::new(|| "random_monkey");
    let signed = signer.temporary_sign("http://myapp.com", 10000u64, no_params()).unwrap();
    assert!(signer.validate(&signed).unwrap());
}

#[test]
fn forged_url_is_rejected() {
    let forged = "http://myapp.com/somewhereelse/?expires=4594900544&signature=79379e8012ebebf75a4679099477c42b16bea303e3e1cb5cb59040ab6e895f08";
    assert_eq!(signer().check(forged).unwrap(), Verdict::InvalidSignature);
    assert!(!signer().validate(forged).unwrap());
}

#[test]
fn expired_url_is_rejected() {
    let expired = "http://myapp.com/?expires=1123690544&signature=28a85b78db3c09bcc8194c0eff9a3db7c276371b1380296f910b77277e4f88d1";
    assert!(!signer().validate(expired).unwrap());
    assert!(!UrlSigner::new(|| "random_monkey").validate(expired).unwrap());
}

#[test]
fn unsigned_urls_fail_closed() {
    assert_eq!(
        signer().check("http://myapp.com/?expires=4594900544").unwrap(),
        Verdict::MissingSignature
    );
    assert!(!signer()
        .validate("http://myapp.com/?signature=79379e8012ebebf75a4679099477c42b16bea303e3e1cb5cb59040ab6e895f08")
        .unwrap());
    assert!(!signer().validate("http://myapp.com/").unwrap());
}

#[test]
fn tampered_signature_is_rejected() {
    let signed = signer()
        .sign("http://myapp.com/a", [("user", "42")], Some(Expiration::Seconds(60)))
        .unwrap();
    let signature = CanonicalUrl::new(&signed)
        .unwrap()
        .query_str("signature")
        .unwrap()
        .to_string();

    for (i, c) in signature.char_indices() {
        let flipped = if c == '0' { '1' } else { '0' };
        let mut tampered_sig = signature.clone();
        tampered_sig.replace_range(i..i + 1, &flipped.to_string());
        let tampered = signed.replace(&signature, &tampered_sig);
        assert_eq!(signer().check(&tampered).unwrap(), Verdict::InvalidSignature);
    }
}

#[test]
fn tampered_parameters_are_rejected() {
    let signed = signer().sign("http://myapp.com/a", [("user", "42")], None).unwrap();
    let tampered = signed.replace("user=42", "user=43");
    assert!(!signer().validate(&tampered).unwrap());
}

#[test]
fn expiry_boundary_is_inclusive() {
    let signed = signer()
        .sign("http://myapp.com/", no_params(), Some(Expiration::Seconds(10)))
        .unwrap();
    assert!(signed.contains(&format!("expires={}", NOW + 10)));

    let at = |now| UrlSigner::new(StaticKey::new("random_monkey")).with_clock(FixedClock(now));
    assert_eq!(at(NOW + 9).check(&signed).unwrap(), Verdict::Valid);
    assert_eq!(at(NOW + 10).check(&signed).unwrap(), Verdict::Valid);
    assert_eq!(at(NOW + 11).check(&signed).unwrap(), Verdict::Expired);
}

#[test]
fn expiration_forms_resolve_against_clock() {
    assert_eq!(Expiration::Seconds(30).resolve(NOW), NOW + 30);
    assert_eq!(Expiration::from(time::Duration::minutes(2)).resolve(NOW), NOW + 120);
    assert_eq!(Expiration::from(std::time::Duration::from_secs(5)).resolve(NOW), NOW + 5);
    let at = time::OffsetDateTime::from_unix_timestamp(4594900544).unwrap();
    assert_eq!(Expiration::from(at).resolve(NOW), 4594900544);
}

#[test]
fn non_numeric_expires_counts_as_expired() {
    let signed = signer().sign("http://myapp.com/?expires=soon", no_params(), None).unwrap();
    assert_eq!(signer().check(&signed).unwrap(), Verdict::Expired);
}

#[test]
fn signing_is_order_independent() {
    let a = signer()
        .sign("http://myapp.com/", vec![("a", "1"), ("b", "2")], Some(Expiration::Seconds(60)))
        .unwrap();
    let b = signer()
        .sign("http://myapp.com/", vec![("b", "2"), ("a", "1")], Some(Expiration::Seconds(60)))
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn reserved_parameters_are_replaced() {
    let signed = signer()
        .sign(
            "http://myapp.com/?expires=1&signature=bogus",
            [("signature", "caller"), ("expires", "2")],
            Some(Expiration::Seconds(60)),
        )
        .unwrap();
    let url = CanonicalUrl::new(&signed).unwrap();
    assert_eq!(url.query_str("expires"), Some((NOW + 60).to_string().as_str()));
    assert_ne!(url.query_str("signature"), Some("bogus"));
    assert!(signer().validate(&signed).unwrap());

    // re-signing an already signed URL
    let resigned = signer().sign(&signed, no_params(), None).unwrap();
    assert_eq!(resigned, signed);
}

#[test]
fn list_parameters_are_signed() {
    let signed = signer()
        .sign("http://myapp.com/?tags[]=b&tags[]=a", [("ids", vec!["1", "2"])], None)
        .unwrap();
    assert!(signed.contains("ids[]=1&ids[]=2&signature="));
    assert!(signed.contains("tags[]=b&tags[]=a"));
    assert!(signer().validate(&signed).unwrap());
}

#[test]
fn bracketed_and_empty_parameter_keys_validate() {
    let signed = signer().sign("http://myapp.com/", [("a[]", "x")], None).unwrap();
    assert!(signed.starts_with("http://myapp.com/?a[]=x&signature="));
    assert!(signer().validate(&signed).unwrap());

    let signed = signer().sign("http://myapp.com/", [("f[x]", "1")], None).unwrap();
    assert!(signed.starts_with("http://myapp.com/?f[x]=1&signature="));
    assert!(signer().validate(&signed).unwrap());

    let signed = signer().sign("http://myapp.com/", [("", "x")], None).unwrap();
    assert!(signed.starts_with("http://myapp.com/?signature="));
    assert!(signer().validate(&signed).unwrap());

    let mut entries = BTreeMap::new();
    entries.insert("x]y".to_string(), "1".to_string());
    let signed = signer()
        .sign("http://myapp.com/", [("f", QueryValue::Map(entries))], None)
        .unwrap();
    assert_eq!(signed.matches("f%5Bx%5Dy%5D=1").count(), 1);
    assert!(signer().validate(&signed).unwrap());
}

#[test]
fn fragment_urls_validate() {
    let signed = signer().sign("http://myapp.com/p?a=1#top", no_params(), None).unwrap();
    assert!(signed.ends_with("#top"));
    assert!(signer().validate(&signed).unwrap());
}

#[test]
fn different_key_is_rejected() {
    let signed = signer().sign("http://myapp.com/", no_params(), None).unwrap();
    let other = UrlSigner::new(StaticKey::new("other_monkey")).with_clock(FixedClock(NOW));
    assert!(!other.validate(&signed).unwrap());
}

#[test]
fn key_is_resolved_on_every_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let signer = UrlSigner::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        "random_monkey"
    });

    let signed = signer.sign("http://myapp.com/", no_params(), None).unwrap();
    signer.validate(&signed).unwrap();
    signer.validate(&signed).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn canonicalization_errors_propagate() {
    assert_eq!(signer().validate(""), Err(UrlSignerError::EmptyInput));
    assert!(matches!(
        signer().validate("http://exa mple.com/?signature=x"),
        Err(UrlSignerError::MalformedUrl(_))
    ));
    assert_eq!(
        signer().sign("", no_params(), None),
        Err(UrlSignerError::EmptyInput)
    );
}

#[test]
fn key_resolver_errors_propagate() {
    let signer = UrlSigner::new(EnvKey::new("URLSIGNER_TEST_KEY_THAT_IS_NEVER_SET"));
    assert!(matches!(
        signer.sign("http://myapp.com/", no_params(), None),
        Err(UrlSignerError::KeyUnavailable(_))
    ));

    let empty = UrlSigner::new(|| "");
    assert!(matches!(
        empty.validate("http://myapp.com/"),
        Err(UrlSignerError::KeyUnavailable(_))
    ));
}

#[test]
fn signer_is_shareable_across_threads() {
    let signer = Arc::new(signer());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let signer = signer.clone();
            std::thread::spawn(move || {
                let signed = signer
                    .sign("http://myapp.com/", [("worker", i.to_string())], None)
                    .unwrap();
                signer.validate(&signed).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

fn param_value() -> impl Strategy<Value = QueryValue> {
    prop_oneof![
        "\\PC*".prop_map(QueryValue::Scalar),
        prop::collection::vec("\\PC*", 0..3).prop_map(QueryValue::List),
        prop::collection::btree_map("[a-c\\[\\]]{0,3}", "\\PC*", 0..3).prop_map(QueryValue::Map),
    ]
}

proptest! {
    #[test]
    fn sign_then_validate_holds(
        // letters a-d only, so `expires`/`signature` never appear
        params in prop::collection::btree_map("[a-d0-9_\\[\\]=&%]{0,6}", param_value(), 0..5),
        path in "(/[a-z0-9]{1,8}){0,3}",
        ttl in prop::option::of(0u64..1_000_000),
    ) {
        let url = format!("https://example.com{path}");
        let signed = signer().sign(&url, params, ttl.map(Expiration::Seconds)).unwrap();
        prop_assert!(signer().validate(&signed).unwrap());
    }
}
