use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use permsync::testing::{FakeDevice, RecordingBackend};
use permsync::{
    Collaborators, MonitorConfig, PackageRecord, PermissionMonitor, Uid, UidRange, UserId,
};
use std::hint::black_box;
use std::sync::Arc;

const PERMISSIONS: [&str; 3] = [
    "android.permission.INTERNET",
    "android.permission.CHANGE_NETWORK_STATE",
    "android.permission.UPDATE_DEVICE_STATS",
];

/// Device with `apps` packages installed for each of `users` users
fn populated_device(apps: u32, users: u32) -> Arc<FakeDevice> {
    let device = Arc::new(FakeDevice::new(29));
    let all_users: Vec<UserId> = (0..users).map(UserId).collect();
    for user in &all_users {
        device.add_user(*user);
    }
    for index in 0..apps {
        // Every third app shares its UID with the previous one
        let uid = Uid(10_000 + index - (index % 3 == 2) as u32);
        let permissions = &PERMISSIONS[..(index as usize % PERMISSIONS.len()) + 1];
        device.install_for_users(
            PackageRecord::new(format!("com.bench.app{index}"), uid)
                .with_permissions(permissions.iter().copied()),
            &all_users,
        )
        .unwrap();
    }
    device
}

fn monitor(device: &Arc<FakeDevice>, coalesce: bool) -> PermissionMonitor<RecordingBackend> {
    let mut config = MonitorConfig::default();
    config.batching.coalesce = coalesce;
    PermissionMonitor::new(
        Collaborators::from_device(device.clone()),
        RecordingBackend::new(),
        config,
    )
    .unwrap()
}

/// Full snapshot push for growing device sizes
fn bench_full_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_sync");

    for apps in [100u32, 1_000] {
        let device = populated_device(apps, 4);
        group.throughput(Throughput::Elements(u64::from(apps) * 4));

        for coalesce in [true, false] {
            let label = if coalesce { "coalesced" } else { "per-uid" };
            group.bench_with_input(BenchmarkId::new(label, apps), &apps, |b, _| {
                let monitor = monitor(&device, coalesce);
                b.iter(|| monitor.start_monitoring().unwrap());
            });
        }
    }

    group.finish();
}

/// Incremental package update on a shared UID
fn bench_package_update(c: &mut Criterion) {
    let device = populated_device(1_000, 4);
    let monitor = monitor(&device, true);
    monitor.start_monitoring().unwrap();

    c.bench_function("package_update_shared_uid", |b| {
        b.iter(|| {
            monitor
                .on_package_changed(black_box("com.bench.app2"), Uid(10_001))
                .unwrap()
        });
    });
}

/// VPN connect and disconnect over every user-0 UID
fn bench_vpn_cycle(c: &mut Criterion) {
    let device = populated_device(1_000, 1);
    let monitor = monitor(&device, true);
    monitor.start_monitoring().unwrap();
    let ranges = [UidRange::for_user(UserId(0)).unwrap()];

    c.bench_function("vpn_connect_disconnect", |b| {
        b.iter(|| {
            monitor
                .on_vpn_uid_ranges_added("tun0", black_box(&ranges), Uid(9_999))
                .unwrap();
            monitor.on_vpn_disconnected("tun0").unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_full_sync,
    bench_package_update,
    bench_vpn_cycle
);
criterion_main!(benches);
