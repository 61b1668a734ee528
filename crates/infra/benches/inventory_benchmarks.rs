use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use farmops_core::ContainerId;
use farmops_infra::clock::ManualClock;
use farmops_infra::event_store::InMemoryEventStore;
use farmops_infra::read_model::InMemoryCropHistoryStore;
use farmops_infra::service::InventoryService;
use farmops_inventory::{
    Crop, CropId, CropPosition, RackId, RackSpec, SlotAddress, StationKey, StationKind,
    StationReport,
};

type Service = InventoryService<Arc<InMemoryEventStore>, Arc<InMemoryCropHistoryStore>>;

fn key() -> StationKey {
    StationKey::new(ContainerId::parse("bench-farm").unwrap(), StationKind::Nursery)
}

/// A nursery with `racks` shelves of 10 slots, every slot holding a tray seeded to
/// `crops_per_tray` crops.
fn populated_service(racks: u16, crops_per_tray: u16) -> Service {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()));
    let service = InventoryService::new(
        Arc::new(InMemoryEventStore::new()),
        Arc::new(InMemoryCropHistoryStore::new()),
        clock,
    );
    let specs = (1..=racks)
        .map(|r| RackSpec {
            id: RackId::parse(format!("rack-{r}")).unwrap(),
            name: format!("Rack {r}"),
            slot_count: 10,
        })
        .collect();
    service.commission_station(&key(), specs).unwrap();

    for r in 1..=racks {
        for s in 1..=10u16 {
            let slot = SlotAddress::new(RackId::parse(format!("rack-{r}")).unwrap(), s);
            let result = service
                .provision_storage_unit(&key(), slot, format!("RFID-{r:03}-{s:03}"), None)
                .unwrap();
            for c in 0..crops_per_tray {
                let crop = Crop::seedling(
                    CropId::parse(format!("crop-{r}-{s}-{c}")).unwrap(),
                    CropPosition::Tray { row: c / 10 + 1, column: c % 10 + 1 },
                    "lettuce",
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                );
                service.seed_crop(&key(), result.unit.id_typed(), crop, None).unwrap();
            }
        }
    }
    service
}

fn bench_station_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("station_report");

    for racks in [1u16, 4, 8] {
        let service = populated_service(racks, 20);
        let station = service.station_snapshot(&key(), None).unwrap();
        group.throughput(Throughput::Elements(u64::from(racks) * 10));

        group.bench_with_input(BenchmarkId::new("snapshot_with_replay", racks), &racks, |b, _| {
            b.iter(|| black_box(service.station_snapshot(&key(), None).unwrap()));
        });

        group.bench_with_input(
            BenchmarkId::new("serialize_report", racks),
            &station,
            |b, report: &StationReport| {
                b.iter(|| black_box(serde_json::to_vec(report).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_provisioning(c: &mut Criterion) {
    let mut group = c.benchmark_group("provisioning");
    group.sample_size(50);

    group.bench_function("provision_and_detach_with_history", |b| {
        let service = populated_service(2, 5);
        let slot = SlotAddress::new(RackId::parse("rack-1").unwrap(), 1);
        service.detach_storage_unit(&key(), slot.clone()).unwrap();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            service
                .provision_storage_unit(&key(), slot.clone(), format!("RFID-BENCH-{n}"), None)
                .unwrap();
            black_box(service.detach_storage_unit(&key(), slot.clone()).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_station_report, bench_provisioning);
criterion_main!(benches);
