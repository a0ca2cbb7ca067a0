#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use chunked_zstd::{CompressorConfig, write_chunked_stream};

fuzz_target!(|data: Vec<u8>| {
    let config = CompressorConfig::default().with_level(1);

    // Arbitrary bytes: must fail cleanly or round-trip
    let mut out = Vec::new();
    let mut annotations = BTreeMap::new();
    if write_chunked_stream(&mut out, &mut annotations, &data[..], &config).is_ok() {
        assert_eq!(zstd::stream::decode_all(&out[..]).unwrap(), data);
    }

    // The same bytes as a file payload always round-trip
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, "fuzz", &data[..]).unwrap();
    let tar = builder.into_inner().unwrap();

    let mut out = Vec::new();
    let mut annotations = BTreeMap::new();
    write_chunked_stream(&mut out, &mut annotations, &tar[..], &config).unwrap();
    assert_eq!(zstd::stream::decode_all(&out[..]).unwrap(), tar);
});
