use chargelog::error::ChargeLogError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        ChargeLogError::config("x"),
        ChargeLogError::Config { .. }
    ));
    assert!(matches!(
        ChargeLogError::storage("x"),
        ChargeLogError::Storage { .. }
    ));
    assert!(matches!(ChargeLogError::io("x"), ChargeLogError::Io { .. }));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(
        ChargeLogError::invalid_tariff("surcharge", "negative"),
        ChargeLogError::InvalidTariff { .. }
    ));
    assert!(matches!(
        ChargeLogError::invalid_interval("x"),
        ChargeLogError::InvalidInterval { .. }
    ));
    assert!(matches!(
        ChargeLogError::zero_energy("x"),
        ChargeLogError::ZeroEnergy { .. }
    ));
    assert!(matches!(
        ChargeLogError::tariff_not_found("x"),
        ChargeLogError::TariffNotFound { .. }
    ));
}

#[test]
fn conversions_from_library_errors() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    assert!(matches!(ChargeLogError::from(io), ChargeLogError::Io { .. }));

    let yaml = serde_yaml::from_str::<serde_yaml::Value>("a: [").unwrap_err();
    assert!(matches!(
        ChargeLogError::from(yaml),
        ChargeLogError::Serialization { .. }
    ));
}

#[test]
fn tariff_error_names_field() {
    let err = ChargeLogError::invalid_tariff("price_off_peak", "must not be negative");
    assert_eq!(
        err.to_string(),
        "Invalid tariff: price_off_peak - must not be negative"
    );
    assert_eq!(ChargeLogError::NoOpenSession.to_string(), "No open charging session");
}
