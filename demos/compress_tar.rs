//! Tar compression example.
//!
//! Run with:
//!     cargo run --example compress_tar -- layer.tar layer.tar.zst [level]

use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};

use chunked_zstd::{FOOTER_SIZE, Footer, Toc, compressor};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let input = args.next().ok_or("usage: compress_tar <input.tar> <output> [level]")?;
    let output = args.next().ok_or("missing output path")?;
    let level = args.next().map(|l| l.parse::<i32>()).transpose()?;

    println!("Compressing {} -> {}\n", input, output);

    let out = BufWriter::new(File::create(&output)?);
    let mut writer = compressor(out, BTreeMap::new(), level)?;
    let copied = io::copy(&mut BufReader::new(File::open(&input)?), &mut writer)?;
    let annotations = writer.close()?;

    for (key, value) in &annotations {
        println!("{} = {}", key, value);
    }

    // Read the manifest back through the footer
    let encoded = std::fs::read(&output)?;
    let footer = Footer::from_bytes(&encoded[encoded.len() - FOOTER_SIZE..])
        .ok_or("footer not found")?;
    let start = footer.manifest_offset as usize;
    let manifest = &encoded[start..start + footer.compressed_len as usize];
    let toc: Toc = serde_json::from_slice(&zstd::stream::decode_all(manifest)?)?;

    for entry in &toc.entries {
        println!(
            "{:<8} {:>10} @ {:>10} {}",
            entry.entry_type.as_str(),
            entry.size.max(entry.chunk_size),
            entry.offset,
            entry.name
        );
    }

    println!(
        "\nTotal: {} records, {} bytes in, {} bytes out",
        toc.entries.len(),
        copied,
        encoded.len()
    );

    Ok(())
}
