mod common;

use common::*;
use trackme::ja3::ja3;
use trackme::tls::TlsHandshakeRecord;
use trackme::tls_process::parse_client_hello;

fn chrome_like() -> TlsHandshakeRecord {
    parse_client_hello(&chrome_like_client_hello()).unwrap_or_else(|e| panic!("ClientHello: {e}"))
}

#[test]
fn test_ja3_string_and_hash() {
    let fp = ja3(&chrome_like());
    assert_eq!(fp.fingerprint, "771,4865-4866-49195,0-10-11-13-16-43-45-27,29-23-24,0");
    assert_eq!(fp.hash, "5f9f1a6a5baf0898214ac11636ae39b9");
}

#[test]
fn test_ja3_is_deterministic() {
    let record = chrome_like();
    assert_eq!(ja3(&record), ja3(&record));
    assert_eq!(ja3(&record), ja3(&chrome_like()));
}

#[test]
fn test_grease_does_not_change_ja3() {
    let with_grease = chrome_like();
    let mut extensions = chrome_like_extensions();
    extensions.remove(0);
    let without_grease = parse_client_hello(&client_hello_record(&[0x1301, 0x1302, 0xc02b], &extensions))
        .unwrap_or_else(|e| panic!("ClientHello: {e}"));

    assert_eq!(ja3(&with_grease).fingerprint, ja3(&without_grease).fingerprint);
}

#[test]
fn test_extension_order_changes_ja3() {
    let mut extensions = chrome_like_extensions();
    extensions.swap(1, 2);
    let permuted = parse_client_hello(&client_hello_record(&CHROME_LIKE_CIPHERS, &extensions))
        .unwrap_or_else(|e| panic!("ClientHello: {e}"));

    assert_ne!(ja3(&chrome_like()).fingerprint, ja3(&permuted).fingerprint);
    assert_eq!(
        ja3(&permuted).fingerprint,
        "771,4865-4866-49195,10-0-11-13-16-43-45-27,29-23-24,0"
    );
}

#[test]
fn test_minimal_client_hello_has_empty_segments() {
    let record = parse_client_hello(&client_hello_record(&[0x002f], &[]))
        .unwrap_or_else(|e| panic!("ClientHello: {e}"));
    assert_eq!(ja3(&record).fingerprint, "771,47,,,");

    let empty = ja3(&TlsHandshakeRecord::default());
    assert_eq!(empty.fingerprint, "0,,,,");
    assert_eq!(empty.hash.len(), 32);
}
