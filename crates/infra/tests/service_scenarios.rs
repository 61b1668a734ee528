//! End-to-end service behaviour: command → event store → rehydrated report / crop history.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use farmops_core::ContainerId;
use farmops_infra::{
    CropObservation, FarmopsConfig, InMemoryInventoryService, ManualClock, ServiceError,
};
use farmops_inventory::{
    Crop, CropEventKind, CropHistoryEvent, CropId, CropPosition, CropSize, DateRange,
    HealthStatus, InventoryError, RackId, RackSpec, RemovalReason, SlotAddress, StationKey,
    StationKind, UtilizationLevel,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

fn setup() -> (Arc<InMemoryInventoryService>, Arc<ManualClock>) {
    setup_with(&[])
}

fn setup_with(vars: &[(&str, &str)]) -> (Arc<InMemoryInventoryService>, Arc<ManualClock>) {
    let vars = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let config = FarmopsConfig::load_with("test", Some(vars)).unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let service = InMemoryInventoryService::in_memory(&config, clock.clone());
    (Arc::new(service), clock)
}

fn farm() -> ContainerId {
    ContainerId::parse("farm-7").unwrap()
}

fn nursery() -> StationKey {
    StationKey::new(farm(), StationKind::Nursery)
}

fn upper() -> RackId {
    RackId::parse("upper").unwrap()
}

fn slot(n: u16) -> SlotAddress {
    SlotAddress::new(upper(), n)
}

fn commission(service: &InMemoryInventoryService) {
    service
        .commission_station(
            &nursery(),
            vec![
                RackSpec { id: upper(), name: "Upper".into(), slot_count: 8 },
                RackSpec {
                    id: RackId::parse("lower").unwrap(),
                    name: "Lower".into(),
                    slot_count: 8,
                },
            ],
        )
        .unwrap();
}

fn seedling(id: &str, row: u16, column: u16, seeded: NaiveDate) -> Crop {
    Crop::seedling(CropId::parse(id).unwrap(), CropPosition::Tray { row, column }, "basil", seeded)
}

#[test]
fn concurrent_provisioning_of_one_slot_confirms_exactly_one() {
    let (service, _clock) = setup();
    commission(&service);

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["RFID-AAAA01", "RFID-BBBB02"]
        .into_iter()
        .map(|rfid| {
            let service = service.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                service.provision_storage_unit(&nursery(), slot(5), rfid, None)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let confirmed = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(confirmed, 1, "outcomes: {outcomes:?}");
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(ServiceError::Rejected(InventoryError::SlotOccupied(addr))) if *addr == slot(5)
    )));

    let report = service.station_snapshot(&nursery(), None).unwrap();
    let upper = report.rack(&upper()).unwrap();
    assert_eq!(upper.occupied_slots, 1);
}

#[test]
fn many_concurrent_writers_never_double_bind() {
    let (service, _clock) = setup();
    commission(&service);

    let writers = 8;
    let barrier = Arc::new(Barrier::new(writers));
    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let service = service.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                // Two writers per slot, four slots.
                let target = slot(1 + (i as u16 % 4));
                service.provision_storage_unit(&nursery(), target, format!("RFID-{i:06}"), None)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for r in &results {
        match r {
            Ok(_)
            | Err(ServiceError::Rejected(InventoryError::SlotOccupied(_)))
            | Err(ServiceError::Conflict(_)) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    let report = service.station_snapshot(&nursery(), None).unwrap();
    let bound = report.rack(&upper()).unwrap().occupied_slots as usize;
    assert_eq!(bound, results.iter().filter(|r| r.is_ok()).count());
    assert!(bound <= 4);
}

#[test]
fn provisioned_unit_appears_in_snapshot_at_reported_location() {
    let (service, _clock) = setup();
    commission(&service);

    let result = service
        .provision_storage_unit(&nursery(), slot(5), "RFID-000123", Some("  new batch ".into()))
        .unwrap();
    assert_eq!(result.location, "Shelf Upper, Slot 5");
    assert_eq!(result.created_at, start());
    assert_eq!(result.unit.notes(), Some("new batch"));
    assert_eq!(result.unit.capacity(), 200);

    let report = service.station_snapshot(&nursery(), None).unwrap();
    let slot_5 = &report.rack(&upper()).unwrap().slots[4];
    assert_eq!(slot_5.slot_number, 5);
    let unit = slot_5.unit.as_ref().unwrap();
    assert_eq!(unit.id, result.unit.id_typed());
    assert_eq!(unit.rfid_tag.as_str(), "RFID-000123");
}

#[test]
fn short_rfid_is_rejected_and_nothing_is_written() {
    let (service, _clock) = setup();
    commission(&service);

    let err = service
        .provision_storage_unit(&nursery(), slot(1), "AB12", None)
        .unwrap_err();
    match err {
        ServiceError::Rejected(InventoryError::Validation { field, message }) => {
            assert_eq!(field, "rfid_tag");
            assert!(message.contains("too short"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let report = service.station_snapshot(&nursery(), None).unwrap();
    assert_eq!(report.total_units, 0);
}

#[test]
fn detach_moves_unit_off_shelf_with_crops_and_repeats_as_slot_empty() {
    let (service, clock) = setup();
    commission(&service);

    let unit = service
        .provision_storage_unit(&nursery(), slot(3), "RFID-000777", None)
        .unwrap()
        .unit;
    clock.advance(Duration::hours(1));
    for (i, id) in ["c-1", "c-2", "c-3"].into_iter().enumerate() {
        service
            .seed_crop(
                &nursery(),
                unit.id_typed(),
                seedling(id, 1, i as u16 + 1, start().date_naive()),
                None,
            )
            .unwrap();
    }

    clock.advance(Duration::hours(1));
    let detached = service.detach_storage_unit(&nursery(), slot(3)).unwrap();
    assert_eq!(detached.id_typed(), unit.id_typed());
    assert_eq!(detached.crop_count(), 3);

    let report = service.station_snapshot(&nursery(), None).unwrap();
    let slot_3 = &report.rack(&upper()).unwrap().slots[2];
    assert!(!slot_3.occupied);
    assert_eq!(report.off_rack.len(), 1);
    assert_eq!(report.off_rack[0].id, unit.id_typed());
    assert_eq!(report.off_rack[0].crops.len(), 3);

    let again = service.detach_storage_unit(&nursery(), slot(3)).unwrap_err();
    assert!(matches!(again, ServiceError::Rejected(InventoryError::SlotEmpty(_))));
    assert_eq!(service.station_snapshot(&nursery(), None).unwrap(), report);

    clock.advance(Duration::hours(1));
    service.place_storage_unit(&nursery(), unit.id_typed(), slot(6)).unwrap();
    let report = service.station_snapshot(&nursery(), None).unwrap();
    assert!(report.off_rack.is_empty());
    assert!(report.rack(&upper()).unwrap().slots[5].occupied);
}

#[test]
fn snapshot_as_of_a_past_date_replays_only_earlier_events() {
    let (service, clock) = setup();
    commission(&service);

    service.provision_storage_unit(&nursery(), slot(1), "RFID-000001", None).unwrap();
    clock.set(start() + Duration::days(3));
    service.provision_storage_unit(&nursery(), slot(2), "RFID-000002", None).unwrap();

    let day_one = service
        .station_snapshot(&nursery(), Some(start().date_naive()))
        .unwrap();
    assert_eq!(day_one.total_units, 1);

    let now = service.station_snapshot(&nursery(), None).unwrap();
    assert_eq!(now.total_units, 2);

    let before_commissioning = service
        .station_snapshot(&nursery(), Some(start().date_naive() - Duration::days(1)))
        .unwrap_err();
    assert!(matches!(before_commissioning, ServiceError::Rejected(InventoryError::NotFound(_))));
}

#[test]
fn shelf_figures_separate_occupancy_from_crop_density() {
    // 2×2 trays keep the fixture small: three crops per tray is 75% density.
    let (service, _clock) = setup_with(&[
        ("FARMOPS__LAYOUTS__TRAY_ROWS", "2"),
        ("FARMOPS__LAYOUTS__TRAY_COLUMNS", "2"),
    ]);
    commission(&service);

    for n in 1..=6u16 {
        let unit = service
            .provision_storage_unit(&nursery(), slot(n), format!("RFID-{n:06}"), None)
            .unwrap()
            .unit;
        for (row, column) in [(1, 1), (1, 2), (2, 1)] {
            let id = format!("s{n}-r{row}-c{column}");
            service
                .seed_crop(
                    &nursery(),
                    unit.id_typed(),
                    seedling(&id, row, column, start().date_naive()),
                    None,
                )
                .unwrap();
        }
    }

    let report = service.station_snapshot(&nursery(), None).unwrap();
    let upper = report.rack(&upper()).unwrap();
    assert_eq!(upper.occupied_slots, 6);
    assert_eq!(upper.total_slots, 8);
    assert_eq!(upper.occupancy_percentage.value(), 75);
    assert_eq!(upper.crop_density_percentage.value(), 75);
    assert_eq!(report.utilization_percentage.value(), 75);
    assert_eq!(report.utilization_level, UtilizationLevel::High);
    assert_eq!(report.total_crops, 18);
}

#[test]
fn crop_lifecycle_is_queryable_as_history() {
    let (service, clock) = setup();
    commission(&service);
    let cultivation = StationKey::new(farm(), StationKind::Cultivation);

    let tray = service
        .provision_storage_unit(&nursery(), slot(1), "RFID-TRAY01", None)
        .unwrap()
        .unit;
    let other = service
        .provision_storage_unit(&nursery(), slot(2), "RFID-TRAY02", None)
        .unwrap()
        .unit;
    let crop_id = CropId::parse("kale-1").unwrap();

    service
        .seed_crop(
            &nursery(),
            tray.id_typed(),
            seedling("kale-1", 2, 2, start().date_naive()),
            Some("sown".into()),
        )
        .unwrap();

    clock.set(start() + Duration::days(5));
    service
        .update_crop(
            &nursery(),
            crop_id.clone(),
            CropObservation {
                age_days: 5,
                health: HealthStatus::Healthy,
                size: CropSize::Medium,
                planned_transition: None,
            },
            None,
        )
        .unwrap();

    clock.set(start() + Duration::days(9));
    let moved = service
        .transplant_crop(
            &nursery(),
            crop_id.clone(),
            other.id_typed(),
            CropPosition::Tray { row: 1, column: 1 },
            None,
        )
        .unwrap();
    assert_eq!(moved.position, CropPosition::Tray { row: 1, column: 1 });

    clock.set(start() + Duration::days(20));
    let harvested = service
        .remove_crop(&nursery(), crop_id.clone(), RemovalReason::Harvested, None)
        .unwrap();
    assert_eq!(harvested.size, CropSize::Medium);

    let all = service.query_crop_history(&farm(), &crop_id, DateRange::all()).unwrap();
    let kinds: Vec<_> = all.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            CropEventKind::Seeded,
            CropEventKind::GrowthUpdate,
            CropEventKind::Transplanted,
            CropEventKind::Harvested,
        ]
    );
    assert_eq!(all[0].note.as_deref(), Some("sown"));
    assert_eq!(all[2].location.unit_id, other.id_typed());

    // Inclusive on both ends.
    let window = DateRange::new(
        Some((start() + Duration::days(5)).date_naive()),
        Some((start() + Duration::days(9)).date_naive()),
    );
    let windowed: Vec<_> = service
        .query_crop_history(&farm(), &crop_id, window)
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(windowed, vec![CropEventKind::GrowthUpdate, CropEventKind::Transplanted]);

    // The cultivation area was never commissioned; unknown crops have no history.
    assert!(matches!(
        service.station_snapshot(&cultivation, None),
        Err(ServiceError::Rejected(InventoryError::NotFound(_)))
    ));
    assert!(service
        .query_crop_history(&farm(), &CropId::parse("unknown").unwrap(), DateRange::all())
        .unwrap()
        .is_empty());
}

#[test]
fn external_crop_events_must_not_predate_the_timeline() {
    let (service, clock) = setup();
    commission(&service);
    let tray = service
        .provision_storage_unit(&nursery(), slot(1), "RFID-TRAY01", None)
        .unwrap()
        .unit;
    clock.set(start() + Duration::days(2));
    let crop = service
        .seed_crop(
            &nursery(),
            tray.id_typed(),
            seedling("mint-1", 1, 1, start().date_naive()),
            None,
        )
        .unwrap();

    let backdated = CropHistoryEvent::capture(
        CropEventKind::GrowthUpdate,
        &crop,
        tray.id_typed(),
        start() + Duration::days(1),
        Some("late entry".into()),
    );
    let err = service.record_crop_event(&farm(), backdated).unwrap_err();
    assert!(matches!(err, ServiceError::Rejected(InventoryError::InvalidOrder { .. })));

    let later = CropHistoryEvent::capture(
        CropEventKind::GrowthUpdate,
        &crop,
        tray.id_typed(),
        start() + Duration::days(3),
        Some("scouting".into()),
    );
    clock.set(start() + Duration::days(3));
    service.record_crop_event(&farm(), later).unwrap();

    let history = service
        .query_crop_history(&farm(), &crop.id, DateRange::all())
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].note.as_deref(), Some("scouting"));
}

#[test]
fn future_dated_crop_events_are_refused_and_later_commits_stay_in_history() {
    let (service, clock) = setup();
    commission(&service);
    let tray = service
        .provision_storage_unit(&nursery(), slot(1), "RFID-TRAY01", None)
        .unwrap()
        .unit;
    let crop = service
        .seed_crop(
            &nursery(),
            tray.id_typed(),
            seedling("mint-1", 1, 1, start().date_naive()),
            None,
        )
        .unwrap();

    let ahead = CropHistoryEvent::capture(
        CropEventKind::GrowthUpdate,
        &crop,
        tray.id_typed(),
        start() + Duration::days(30),
        None,
    );
    let err = service.record_crop_event(&farm(), ahead).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(InventoryError::Validation { field: "occurred_at", .. })
    ));

    clock.set(start() + Duration::days(1));
    service
        .update_crop(
            &nursery(),
            crop.id.clone(),
            CropObservation {
                age_days: 1,
                health: HealthStatus::Healthy,
                size: CropSize::Small,
                planned_transition: None,
            },
            None,
        )
        .unwrap();
    clock.set(start() + Duration::days(2));
    service
        .remove_crop(&nursery(), crop.id.clone(), RemovalReason::Harvested, None)
        .unwrap();

    let kinds: Vec<_> = service
        .query_crop_history(&farm(), &crop.id, DateRange::all())
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![CropEventKind::Seeded, CropEventKind::GrowthUpdate, CropEventKind::Harvested]
    );
}

#[test]
fn a_crop_id_names_one_crop_per_container() {
    let (service, clock) = setup();
    commission(&service);
    let cultivation = StationKey::new(farm(), StationKind::Cultivation);
    service
        .commission_station(
            &cultivation,
            vec![RackSpec {
                id: RackId::parse("wall-1").unwrap(),
                name: "1".into(),
                slot_count: 4,
            }],
        )
        .unwrap();

    let tray = service
        .provision_storage_unit(&nursery(), slot(1), "RFID-TRAY01", None)
        .unwrap()
        .unit;
    let panel = service
        .provision_storage_unit(
            &cultivation,
            SlotAddress::new(RackId::parse("wall-1").unwrap(), 1),
            "RFID-PANEL1",
            None,
        )
        .unwrap()
        .unit;

    service
        .seed_crop(
            &nursery(),
            tray.id_typed(),
            seedling("c-1", 1, 1, start().date_naive()),
            None,
        )
        .unwrap();

    let on_panel = Crop::seedling(
        CropId::parse("c-1").unwrap(),
        CropPosition::Panel { channel: 1, position: 1 },
        "basil",
        start().date_naive(),
    );
    let err = service
        .seed_crop(&cultivation, panel.id_typed(), on_panel.clone(), None)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(InventoryError::Validation { field: "crop_id", .. })
    ));

    // A harvested crop keeps its id too.
    clock.set(start() + Duration::days(1));
    service
        .remove_crop(&nursery(), CropId::parse("c-1").unwrap(), RemovalReason::Harvested, None)
        .unwrap();
    assert!(service
        .seed_crop(&cultivation, panel.id_typed(), on_panel, None)
        .is_err());

    let history = service
        .query_crop_history(&farm(), &CropId::parse("c-1").unwrap(), DateRange::all())
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.location.unit_id == tray.id_typed()));
    assert_eq!(service.station_snapshot(&cultivation, None).unwrap().total_crops, 0);
}
