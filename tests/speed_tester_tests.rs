mod common;

use std::collections::HashSet;

use chrono::Duration;
use common::{init_logger, memory_caches, names, test_settings, FakeControlPlane, FakeThroughput, MIB};
use subforge::cache::now;
use subforge::tester::{SpeedTester, SPEED_TEST_FAILED, SWITCH_FAILED};

#[cfg(test)]
mod speed_tester_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cached_speed_skips_network() {
        init_logger();
        let settings = test_settings();
        let api = FakeControlPlane::new();
        let probe = FakeThroughput::new(&api).with_bytes("tokyo", 50 * MIB);
        let (exclusions, speeds) = memory_caches();
        speeds.record_at("tokyo", 4.2, now() - Duration::hours(23));

        let tester = SpeedTester::new(&api, &probe, &exclusions, &speeds, &settings);
        assert_eq!(tester.measure("tokyo").await, 4.2);
        assert_eq!(probe.calls(), 0);
        assert_eq!(api.switch_calls(), 0);

        speeds.record_at("tokyo", 4.2, now() - Duration::hours(25));
        let speed = tester.measure("tokyo").await;
        assert!((speed - 5.0).abs() < 1e-9);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_and_download_never_overlap() {
        init_logger();
        let settings = test_settings();
        assert!(settings.speed.max_concurrent > 1);
        let nodes = names(&["a", "b", "c", "d", "e"]);
        let api = FakeControlPlane::new();
        let mut probe = FakeThroughput::new(&api);
        for (i, name) in nodes.iter().enumerate() {
            probe = probe.with_bytes(name, (i as u64 + 1) * 10 * MIB);
        }
        let (exclusions, speeds) = memory_caches();
        let tester = SpeedTester::new(&api, &probe, &exclusions, &speeds, &settings);

        let report = tester.measure_batch(&nodes).await;

        assert_eq!(probe.max_in_flight(), 1);
        assert!(!probe.cross_attributed());
        let measured: HashSet<String> = probe.measured().into_iter().collect();
        assert_eq!(measured, nodes.iter().cloned().collect());
        for (name, speed) in &report.results {
            let i = nodes.iter().position(|n| n == name).unwrap();
            assert!((speed - (i as f64 + 1.0)).abs() < 1e-9, "{} measured {}", name, speed);
            assert_eq!(speeds.cached_speed(name), Some(*speed));
        }
        assert!(api
            .switches()
            .iter()
            .all(|(group, _)| group == &settings.api.selector_group));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_retries_then_gives_up() {
        init_logger();
        let settings = test_settings();
        let api = FakeControlPlane::new();
        let probe = FakeThroughput::new(&api)
            .with_bytes("flaky", 20 * MIB)
            .failing("flaky", 2)
            .failing("dead", 10);
        let (exclusions, speeds) = memory_caches();
        let tester = SpeedTester::new(&api, &probe, &exclusions, &speeds, &settings);

        let speed = tester.measure("flaky").await;
        assert!((speed - 2.0).abs() < 1e-9);
        assert_eq!(probe.calls(), 3);
        assert!(!exclusions.is_excluded("flaky"));

        assert_eq!(tester.measure("dead").await, 0.0);
        assert_eq!(probe.calls(), 6);
        assert_eq!(exclusions.reason("dead").as_deref(), Some(SPEED_TEST_FAILED));
        assert_eq!(speeds.cached_speed("dead"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_failure_excludes_node() {
        init_logger();
        let settings = test_settings();
        let api = FakeControlPlane::new().failing_switch("gone");
        let probe = FakeThroughput::new(&api).with_bytes("gone", 10 * MIB);
        let (exclusions, speeds) = memory_caches();
        let tester = SpeedTester::new(&api, &probe, &exclusions, &speeds, &settings);

        assert_eq!(tester.measure("gone").await, 0.0);
        assert_eq!(api.switch_calls(), 3);
        assert_eq!(probe.calls(), 0);
        assert_eq!(exclusions.reason("gone").as_deref(), Some(SWITCH_FAILED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_skips_excluded_and_caps_candidates() {
        init_logger();
        let mut settings = test_settings();
        settings.speed.limit = 2;
        let api = FakeControlPlane::new();
        let probe = FakeThroughput::new(&api)
            .with_bytes("a", 10 * MIB)
            .with_bytes("b", 10 * MIB)
            .with_bytes("c", 10 * MIB);
        let (exclusions, speeds) = memory_caches();
        exclusions.add_excluded("a", "Primary test failed");
        let tester = SpeedTester::new(&api, &probe, &exclusions, &speeds, &settings);

        let report = tester.measure_batch(&names(&["a", "b", "c", "d"])).await;
        let measured: HashSet<&str> = report.results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(measured, ["b", "c"].into_iter().collect());

        exclusions.add_excluded("b", "x");
        exclusions.add_excluded("c", "x");
        let report = tester.measure_batch(&names(&["a", "b", "c"])).await;
        assert!(report.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renaming_replaces_previous_label() {
        init_logger();
        let settings = test_settings();
        let api = FakeControlPlane::new();
        let probe = FakeThroughput::new(&api)
            .with_bytes("osaka_1.00MB/s", 30 * MIB)
            .with_bytes("slow", MIB / 100);
        let (exclusions, speeds) = memory_caches();
        let tester = SpeedTester::new(&api, &probe, &exclusions, &speeds, &settings);

        let nodes = names(&["osaka_1.00MB/s", "slow"]);
        let report = tester.measure_batch(&nodes).await;
        let mapping = report.rename_mapping(&nodes, settings.speed.min_speed, 10);
        assert_eq!(mapping["osaka_1.00MB/s"], "osaka_3.00MB/s");
        assert_eq!(mapping["slow"], "slow");
    }
}
