use ncd_core::{
    Compressor, CompressorKind, CompressorSpec, Deflate, Gzip, InputItem, NcdOptions, Symmetry,
    Zlib, distance, distance_from_sizes, distance_with, join, matrix,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

fn pseudorandom(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = vec![0_u8; len];
    rng.fill_bytes(&mut out);
    out
}

fn records(count: usize, word: &str) -> Vec<u8> {
    (0..count)
        .flat_map(|i| format!("record {i}: {word} jumps over the lazy dog\n").into_bytes())
        .collect()
}

fn sample_inputs() -> Vec<Vec<u8>> {
    vec![
        Vec::new(),
        b"a".to_vec(),
        b"aaaa".to_vec(),
        b"abc".repeat(500),
        b"abd".repeat(500),
        records(100, "the quick brown fox"),
        records(100, "a slow red panda"),
        pseudorandom(700, 1),
        pseudorandom(64, 2),
        vec![0_u8; 300],
    ]
}

#[test]
fn identity_of_repetitive_text_is_near_zero() {
    let c = Gzip::new(6).expect("gzip");
    let x = records(200, "the quick brown fox");
    let d = distance(&c, &x, &x).expect("distance");
    assert!(d >= 0.0);
    assert!(d < 0.25, "expected near-zero distance, got {d}");
}

#[test]
fn empty_inputs_have_zero_distance() {
    for kind in CompressorKind::ALL {
        let c = CompressorSpec {
            kind,
            ..CompressorSpec::default()
        }
        .build()
        .expect("build");
        assert_eq!(distance(&*c, b"", b"").expect("distance"), 0.0);
    }
}

#[test]
fn distance_is_symmetric_for_every_pair() {
    let inputs = sample_inputs();
    let compressors: Vec<Box<dyn Compressor>> = vec![
        Box::new(Gzip::new(6).expect("gzip")),
        Box::new(Zlib::new(9).expect("zlib")),
        Box::new(Deflate::new(1).expect("deflate")),
    ];
    for c in &compressors {
        for x in &inputs {
            for y in &inputs {
                let dxy = distance(c, x, y).expect("dxy");
                let dyx = distance(c, y, x).expect("dyx");
                assert!(
                    (dxy - dyx).abs() < 1e-12,
                    "{}: d(x,y)={dxy} d(y,x)={dyx}",
                    c.name()
                );
            }
        }
    }
}

#[test]
fn precomputed_sizes_give_identical_results() {
    let c = Gzip::new(6).expect("gzip");
    let inputs = sample_inputs();
    for symmetry in [Symmetry::Min, Symmetry::None] {
        let opts = NcdOptions {
            symmetry,
            ..NcdOptions::default()
        };
        for x in &inputs {
            for y in &inputs {
                let cx = c.compress(x).expect("cx").len();
                let cy = c.compress(y).expect("cy").len();
                let full = distance_with(&c, x, y, opts).expect("full");
                let cached = distance_from_sizes(&c, x, y, cx, cy, opts).expect("cached");
                assert!((full - cached).abs() < 1e-12, "full={full} cached={cached}");
            }
        }
    }
}

#[test]
fn repetitive_is_closer_to_itself_than_to_noise() {
    let c = Gzip::new(6).expect("gzip");
    let x = b"aaaaaa".repeat(200);
    let y = pseudorandom(x.len(), 123_456_789);
    let dxx = distance(&c, &x, &x).expect("dxx");
    let dxy = distance(&c, &x, &y).expect("dxy");
    assert!(dxy > dxx, "d(x,y)={dxy} must exceed d(x,x)={dxx}");
}

#[test]
fn distances_are_non_negative() {
    let c = Gzip::new(6).expect("gzip");
    let inputs = sample_inputs();
    for x in &inputs {
        for y in &inputs {
            let d = distance(&c, x, y).expect("distance");
            assert!(d.is_finite() && d >= 0.0, "got {d}");
        }
    }
}

#[test]
fn matrix_has_one_row_per_item_and_one_column_per_item() {
    let c = Gzip::new(6).expect("gzip");
    let a = vec![
        InputItem::new("x1", "aaa"),
        InputItem::new("x2", "bbb"),
        InputItem::new("x3", "ccc"),
    ];
    let b = vec![InputItem::new("y1", "aaa"), InputItem::new("y2", "bbb")];
    let m = matrix(&c, &a, &b, NcdOptions::default()).expect("matrix");
    assert_eq!(m.values.len(), 3);
    for row in &m.values {
        assert_eq!(row.len(), 2);
    }
}

#[test]
fn reference_compression_is_deterministic() {
    let input = records(50, "determinism");
    for kind in CompressorKind::ALL {
        let spec = CompressorSpec {
            kind,
            level: 9,
            ..CompressorSpec::default()
        };
        let first = spec.build().expect("build").compress(&input).expect("first");
        let second = spec.build().expect("build").compress(&input).expect("second");
        assert_eq!(first, second, "{kind} output differs between runs");
    }
}

#[test]
fn join_is_length_prefixed_and_order_sensitive() {
    let x = b"hello".to_vec();
    let y = vec![0_u8, 1, 2];
    let mut expected = 5_u64.to_le_bytes().to_vec();
    expected.extend_from_slice(&x);
    expected.extend_from_slice(&3_u64.to_le_bytes());
    expected.extend_from_slice(&y);
    assert_eq!(join(&x, &y), expected);
    assert_ne!(join(&x, &y), join(&y, &x));
}

#[test]
fn short_identical_strings_stay_in_expected_range() {
    let c = Gzip::new(6).expect("gzip");
    let d = distance(&c, "aaaa".as_bytes(), "aaaa".as_bytes()).expect("distance");
    assert!((0.0..0.6).contains(&d), "got {d}");
}
