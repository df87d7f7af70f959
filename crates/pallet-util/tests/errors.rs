use pallet_util::errors::PalletError;

#[test]
fn test_io_error_display() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err = PalletError::from(io_err);
    assert!(err.to_string().contains("I/O error"), "got: {err}");
}

#[test]
fn test_no_such_repository_display() {
    let err = PalletError::NoSuchRepository {
        name: "gentoo".to_string(),
    };
    assert_eq!(err.to_string(), "No such repository 'gentoo'");
}

#[test]
fn test_malformed_spec_display() {
    let err = PalletError::malformed_spec(">=", "missing package name");
    assert_eq!(
        err.to_string(),
        "Malformed dep spec '>=': missing package name"
    );
}

#[test]
fn test_config_error_display() {
    let err = PalletError::Config {
        message: "bad key".to_string(),
    };
    assert_eq!(err.to_string(), "Configuration error: bad key");
}

#[test]
fn test_serialisation_error_display() {
    let err = PalletError::serialisation("leftover keys");
    assert_eq!(err.to_string(), "Serialisation error: leftover keys");
}

#[test]
fn test_generic_error_display() {
    let err = PalletError::Generic {
        message: "something broke".to_string(),
    };
    assert_eq!(err.to_string(), "something broke");
}

#[test]
fn test_io_error_from_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let pallet_err: PalletError = io_err.into();
    assert!(matches!(pallet_err, PalletError::Io(_)));
}
