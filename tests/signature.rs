use hmac::Mac;
use urlsigner::signature::{compute_signature, constant_time_eq};

#[test]
fn signature_matches_raw_hmac() {
    let message = "http://myapp.com/?api_token=randomasd";
    let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(b"random_monkey").unwrap();
    mac.update(message.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    let sig = compute_signature(b"random_monkey", message);
    assert_eq!(sig, expected);
    assert_eq!(sig.len(), 64);
    assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
}

#[test]
fn signature_depends_on_key() {
    let a = compute_signature(b"k1", "http://example.com/");
    let b = compute_signature(b"k2", "http://example.com/");
    assert_ne!(a, b);
}

#[test]
fn constant_time_eq_behaviour() {
    assert!(constant_time_eq("abc", "abc"));
    assert!(!constant_time_eq("abc", "abd"));
    assert!(!constant_time_eq("abc", "abcd"));
    assert!(!constant_time_eq("", "abc"));
    assert!(constant_time_eq("", ""));
}
