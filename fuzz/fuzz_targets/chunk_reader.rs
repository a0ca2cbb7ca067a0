#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use chunked_zstd::RollingChecksumReader;

/// Splits `data` into (bytes, is_zeros) chunks.
fn chunks(data: &[u8], threshold: u64, bits: u32, buf_len: usize) -> Vec<(Vec<u8>, bool)> {
    let mut reader = RollingChecksumReader::new(Cursor::new(data), threshold, bits);
    let mut buf = vec![0u8; buf_len];
    let mut out = Vec::new();
    let mut current = Vec::new();
    let mut zeros = false;
    loop {
        let fill = reader.fill(&mut buf).unwrap();
        current.extend_from_slice(&buf[..fill.written]);
        zeros |= reader.is_last_chunk_zeros();
        if (fill.split || fill.exhausted) && !current.is_empty() {
            out.push((std::mem::take(&mut current), zeros));
            zeros = false;
        }
        if fill.exhausted {
            assert_eq!(reader.written_out(), data.len() as u64);
            return out;
        }
    }
}

fuzz_target!(|data: Vec<u8>| {
    // Small thresholds and masks so short inputs still hit every path
    for (threshold, bits) in [(1, 4), (4, 6), (16, 8), (1024, 16)] {
        let small = chunks(&data, threshold, bits, 7);
        let large = chunks(&data, threshold, bits, 4096);

        // Verify: chunks reproduce the input
        let joined: Vec<u8> = small.iter().flat_map(|(c, _)| c.clone()).collect();
        assert_eq!(joined, data);

        // Verify: zero chunks hold only zeros and reach the threshold
        for (chunk, zeros) in &small {
            if *zeros {
                assert!(chunk.iter().all(|&b| b == 0));
                assert!(chunk.len() as u64 >= threshold);
            }
        }

        // Verify: boundaries do not depend on the caller's buffer size
        assert_eq!(small, large);
    }
});
