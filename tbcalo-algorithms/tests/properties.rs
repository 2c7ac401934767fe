#![allow(clippy::uninlined_format_args)]
use approx::assert_relative_eq;
use tbcalo_algorithms::{
    channel_frequency, dedup, flatten_events, group, select, AggregationPlan, ColumnNames,
    FlattenConfig, HitSelection, NoisyChannels,
};
use tbcalo_core::event::{events_to_table, EventRecord};
use tbcalo_core::geometry::SensorGeometry;
use tbcalo_core::table::{Table, Value};

/// Small deterministic generator so the fixtures are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

fn generate_events(seed: u64, n_events: i64) -> Vec<EventRecord> {
    let mut rng = Lcg(seed);
    (0..n_events)
        .map(|event_id| {
            let n_hits = rng.next(8) as usize;
            let mut record = EventRecord::new(event_id * 3 + 1, vec![], vec![], vec![]);
            for _ in 0..n_hits {
                record.planes.push(rng.next(10) as i64);
                record.channels.push(rng.next(260) as i64);
                record.amplitudes.push(rng.next(4000) as f64 / 8.0);
            }
            record
        })
        .collect()
}

fn noisy() -> NoisyChannels {
    NoisyChannels::from_planes([(0, vec![0, 1, 2, 3, 4, 5]), (3, (100..140).collect())])
}

fn float(value: &Value) -> f64 {
    value.as_f64().unwrap()
}

#[test]
fn test_row_count_matches_hit_count() {
    let records = generate_events(7, 50);
    let config = FlattenConfig::default();
    let events = events_to_table(&records, &config.columns).unwrap();
    let flat = flatten_events(&events, &config).unwrap();

    let hits: usize = records.iter().map(EventRecord::len).sum();
    assert_eq!(flat.n_rows(), hits);

    let ids = flat.column("TLU_number").unwrap();
    for record in &records {
        let rows = ids.iter().filter(|v| **v == Value::Int(record.event_id)).count();
        assert_eq!(rows, record.len(), "event {}", record.event_id);
    }
}

#[test]
fn test_energy_sums_exclude_noisy_hits() {
    let records = generate_events(11, 80);
    let noisy = noisy();
    let config = FlattenConfig::new().with_noisy(noisy.clone());
    let events = events_to_table(&records, &config.columns).unwrap();
    let flat = flatten_events(&events, &config).unwrap();

    let ids = flat.column("TLU_number").unwrap();
    let planes = flat.column("planeID").unwrap();
    let shower = flat.column("showerEnergy").unwrap();
    let plane_energy = flat.column("planeEnergy").unwrap();

    for record in &records {
        let hits: Vec<(i64, i64, f64)> = record
            .planes
            .iter()
            .zip(&record.channels)
            .zip(&record.amplitudes)
            .map(|((&p, &c), &a)| (p, c, a))
            .filter(|&(p, c, _)| !noisy.contains(p, c))
            .collect();
        let expected_shower: f64 = hits.iter().map(|h| h.2).sum();

        for row in (0..flat.n_rows()).filter(|&r| ids[r] == Value::Int(record.event_id)) {
            if hits.is_empty() {
                assert!(shower[row].is_null());
            } else {
                assert_relative_eq!(float(&shower[row]), expected_shower, epsilon = 1e-9);
            }

            let plane = planes[row].as_i64().unwrap();
            let plane_hits: Vec<f64> = hits
                .iter()
                .filter(|h| h.0 == plane)
                .map(|h| h.2)
                .collect();
            if plane_hits.is_empty() {
                assert!(plane_energy[row].is_null());
            } else {
                let expected: f64 = plane_hits.iter().sum();
                assert_relative_eq!(float(&plane_energy[row]), expected, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn test_group_restores_flattened_events() {
    let records = generate_events(23, 40);
    let columns = ColumnNames::default();
    let config = FlattenConfig::default();
    let events = events_to_table(&records, &columns).unwrap();
    let flat = flatten_events(&events, &config).unwrap();

    let grouped = group(&flat, &AggregationPlan::events(&columns)).unwrap();
    let restored = grouped.select_columns(&["TLU_number", "amplitude", "channelID", "planeID"]);

    let non_empty: Vec<usize> = (0..records.len())
        .filter(|&i| !records[i].is_empty())
        .collect();
    assert_eq!(restored.unwrap(), events.take_rows(&non_empty));
    assert!(!grouped.has_column("planeEnergy"));
}

#[test]
fn test_select_preserves_order_and_is_idempotent() {
    let records = generate_events(5, 60);
    let config = FlattenConfig::default();
    let events = events_to_table(&records, &config.columns).unwrap();
    let flat = flatten_events(&events, &config).unwrap();

    let selection = HitSelection::new()
        .planes(vec![1_i64, 4, 7])
        .amplitude_min(50.0)
        .amplitude_max(400.0);
    let once = select(&flat, &selection, &config.columns).unwrap();
    let twice = select(&once, &selection, &config.columns).unwrap();
    assert_eq!(once, twice);

    // The selected rows form a subsequence of the input.
    let mut cursor = 0;
    for row in 0..once.n_rows() {
        let wanted = once.row(row);
        while flat.row(cursor) != wanted {
            cursor += 1;
            assert!(cursor < flat.n_rows(), "row {} out of order", row);
        }
        cursor += 1;
    }
}

#[test]
fn test_dedup_is_idempotent() {
    let records = generate_events(13, 60);
    let config = FlattenConfig::default();
    let events = events_to_table(&records, &config.columns).unwrap();
    let flat = flatten_events(&events, &config).unwrap();
    let showers: Table = flat.select_columns(&["TLU_number", "showerEnergy"]).unwrap();

    let once = dedup(&showers);
    assert_eq!(dedup(&once), once);
    let with_hits = records.iter().filter(|r| !r.is_empty()).count();
    assert_eq!(once.n_rows(), with_hits);
}

#[test]
fn test_dedup_keeps_distinct_rows() {
    // Event ids are distinct, so every event row is unique.
    let records = generate_events(17, 40);
    let events = events_to_table(&records, &ColumnNames::default()).unwrap();
    assert_eq!(dedup(&events), events);

    let flat = flatten_events(&events, &FlattenConfig::default()).unwrap();
    let showers = dedup(&flat.select_columns(&["TLU_number", "showerEnergy"]).unwrap());
    assert_eq!(dedup(&showers), showers);
}

#[test]
fn test_frequency_total_matches_input() {
    let records = generate_events(29, 100);
    let channels: Vec<i64> = records.iter().flat_map(|r| r.channels.clone()).collect();
    let grid = channel_frequency(channels.iter().copied(), &SensorGeometry::default()).unwrap();
    assert_eq!(grid.sum(), channels.len() as u64);
}
