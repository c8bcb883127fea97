use modplane_core::{
    ModplaneError, ModuleDefinition, SecureConfig, SecureParamCrypto, SecureParameter,
    SemVersion, ValidationError,
};
use modplane_crypto::encryptor_from_key;
use serde_json::json;

fn set(entries: &[(&str, bool, serde_json::Value)]) -> SecureConfig {
    entries
        .iter()
        .map(|(k, server_only, v)| (k.to_string(), SecureParameter::new(*server_only, v.clone())))
        .collect()
}

#[test]
fn test_secret_roundtrips_exactly() {
    let enc = encryptor_from_key(&[1u8; 32], "enc").unwrap();
    let crypto = SecureParamCrypto::new(&enc);
    let original = set(&[("k", true, json!("secret"))]);

    let mut s = original.clone();
    crypto.encrypt(&mut [&mut s]).unwrap();
    assert!(crypto.is_encrypted(&s));
    let sealed = s["k"].value.as_str().unwrap();
    assert_ne!(sealed, "secret");
    assert!(s["k"].server_only);

    crypto.decrypt(&mut [&mut s]).unwrap();
    assert!(!crypto.is_encrypted(&s));
    assert_eq!(s, original);
}

#[test]
fn test_typed_values_keep_their_type() {
    let enc = encryptor_from_key(&[1u8; 32], "enc").unwrap();
    let crypto = SecureParamCrypto::new(&enc);
    let original = set(&[
        ("port", false, json!(8443)),
        ("ratio", false, json!(0.25)),
        ("hosts", true, json!(["a", "b"])),
        ("tls", false, json!({"verify": true})),
    ]);

    let mut s = original.clone();
    crypto.encrypt(&mut [&mut s]).unwrap();
    assert!(s.values().all(|p| p.value.is_string()));
    crypto.decrypt(&mut [&mut s]).unwrap();
    assert_eq!(s, original);
}

#[test]
fn test_null_values_are_left_alone() {
    let enc = encryptor_from_key(&[1u8; 32], "enc").unwrap();
    let crypto = SecureParamCrypto::new(&enc);
    let mut s = set(&[("a", false, json!("x")), ("b", false, json!(null))]);
    crypto.encrypt(&mut [&mut s]).unwrap();
    assert!(crypto.is_encrypted(&s));
    crypto.decrypt(&mut [&mut s]).unwrap();
    assert_eq!(s["b"].value, json!(null));
    assert_eq!(s["a"].value, json!("x"));
}

#[test]
fn test_several_sets_in_one_call() {
    let enc = encryptor_from_key(&[1u8; 32], "enc").unwrap();
    let crypto = SecureParamCrypto::new(&enc);
    let mut a = set(&[("a", false, json!(1))]);
    let mut b = set(&[("b", true, json!("two"))]);
    crypto.encrypt(&mut [&mut a, &mut b]).unwrap();
    assert!(crypto.is_encrypted(&a) && crypto.is_encrypted(&b));
}

#[test]
fn test_definition_helpers_are_no_ops_in_target_state() {
    let enc = encryptor_from_key(&[1u8; 32], "enc").unwrap();
    let crypto = SecureParamCrypto::new(&enc);
    let mut def = ModuleDefinition::new("vault", SemVersion::new(1, 0, 0));
    def.secure_default_config = set(&[("token", true, json!("t"))]);

    def.decrypt_secure_parameters(&crypto).unwrap();
    assert_eq!(def.secure_default_config["token"].value, json!("t"));

    def.encrypt_secure_parameters(&crypto).unwrap();
    let sealed = def.secure_default_config.clone();
    def.encrypt_secure_parameters(&crypto).unwrap();
    assert_eq!(def.secure_default_config, sealed);
}

#[test]
fn test_instance_must_be_encrypted_before_persisting() {
    let enc = encryptor_from_key(&[1u8; 32], "enc").unwrap();
    let crypto = SecureParamCrypto::new(&enc);
    let mut def = ModuleDefinition::new("vault", SemVersion::new(1, 0, 0));
    def.secure_default_config = set(&[("token", true, json!("t"))]);
    let mut inst = def.to_instance();

    let err = inst.validate_encryption(&crypto).unwrap_err();
    match err {
        ModplaneError::Validation(ValidationError::NotEncrypted { sets }) => {
            assert_eq!(sets, vec!["secure_default_config", "secure_current_config"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    inst.encrypt_secure_parameters(&crypto).unwrap();
    assert!(inst.validate_encryption(&crypto).is_ok());
}

#[test]
fn test_non_string_ciphertext_is_decrypt_failure() {
    let enc = encryptor_from_key(&[1u8; 32], "enc").unwrap();
    let crypto = SecureParamCrypto::new(&enc);
    let mut s = set(&[("k", false, json!(5))]);
    let err = crypto.decrypt(&mut [&mut s]).unwrap_err();
    assert!(matches!(err, ModplaneError::DecryptFailed { .. }));
}
