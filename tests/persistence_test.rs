use chargelog::persistence::{
    BlobStore, ChargingLogRecord, FsBlobStore, HomeTariffRow, Location, OpenSessionRow,
    PublicTariffRow, Table, read_table, write_table,
};
use chrono::NaiveDate;
use rust_decimal_macros::dec;

const LEGACY_LOG: &str = "\
Timestamp Start,Timestamp End,Duration Hours,Location,Company,Battery Start %,Battery End %,kWh,Price per kWh,Total Cost
2024-01-10 22:15:00,2024-01-11 06:00:00,7.75,Home,,20.0,80.0,38.4,0.0923,3.54
2024-01-12 12:00:00.000000,2024-01-12 12:40:00,0.67,Public,Ionity,35,70,22.4,0.69,15.46
";

#[tokio::test]
async fn legacy_log_without_range_columns_loads() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path());
    store
        .put(ChargingLogRecord::KEY, LEGACY_LOG.as_bytes().to_vec())
        .await
        .unwrap();

    let rows = read_table::<ChargingLogRecord>(&store).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].location, Location::Home);
    assert_eq!(rows[0].company, "");
    assert_eq!(rows[0].battery_end_percent, dec!(80));
    assert_eq!(rows[0].range_start, None);
    assert_eq!(rows[1].company, "Ionity");
    assert_eq!(rows[1].total_cost, dec!(15.46));
    assert_eq!(
        rows[1].timestamp_start,
        NaiveDate::from_ymd_opt(2024, 1, 12)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    );

    // Rewriting upgrades the file to the current column layout
    write_table(&store, &rows).await.unwrap();
    let text = std::fs::read_to_string(dir.path().join(ChargingLogRecord::KEY)).unwrap();
    assert!(text.starts_with(&ChargingLogRecord::COLUMNS.join(",")));
    assert!(text.contains("2024-01-12 12:00:00,2024-01-12 12:40:00"));
    assert_eq!(read_table::<ChargingLogRecord>(&store).await.unwrap(), rows);
}

#[tokio::test]
async fn price_tables_accept_fractional_hours() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path());
    store
        .put(
            HomeTariffRow::KEY,
            b"Start Time,End Time,Price A,Price B,Additional Price\n0.5,4.5,0.075,0.2451,0.0\n".to_vec(),
        )
        .await
        .unwrap();
    let rows = read_table::<HomeTariffRow>(&store).await.unwrap();
    let tariff = rows[0].tariff().unwrap();
    assert_eq!(tariff.peak_start, chrono::NaiveTime::from_hms_opt(0, 30, 0).unwrap());
    assert_eq!(tariff.peak_end, chrono::NaiveTime::from_hms_opt(4, 30, 0).unwrap());
}

#[tokio::test]
async fn tables_live_under_the_store_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path().join("nested"));
    write_table::<PublicTariffRow>(&store, &[]).await.unwrap();
    write_table::<OpenSessionRow>(&store, &[]).await.unwrap();

    assert!(dir.path().join("nested/public_prices.csv").exists());
    assert!(store.exists(OpenSessionRow::KEY).await.unwrap());
    assert_eq!(store.root(), dir.path().join("nested"));
}
