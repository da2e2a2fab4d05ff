#!/usr/bin/env -S cargo +nightly -Zscript
//! Generate seed corpus files for fuzzing.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

fn main() {
    use std::fs;
    let dir = "fuzz/corpus/fuzz_decode";
    fs::create_dir_all(dir).unwrap();

    // Minimal BMP 1x1 24-bit
    let mut bmp = vec![0u8; 58]; // 54 header + 4 pixel (3 + 1 padding)
    bmp[0] = b'B'; bmp[1] = b'M';
    bmp[2..6].copy_from_slice(&58u32.to_le_bytes()); // file size
    bmp[10..14].copy_from_slice(&54u32.to_le_bytes()); // data offset
    bmp[14..18].copy_from_slice(&40u32.to_le_bytes()); // info header size
    bmp[18..22].copy_from_slice(&1i32.to_le_bytes()); // width
    bmp[22..26].copy_from_slice(&1i32.to_le_bytes()); // height
    bmp[26..28].copy_from_slice(&1u16.to_le_bytes()); // planes
    bmp[28..30].copy_from_slice(&24u16.to_le_bytes()); // bpp
    bmp[54] = 0xff; bmp[55] = 0x00; bmp[56] = 0x00; // BGR
    fs::write(format!("{dir}/bmp_1x1.bmp"), &bmp).unwrap();

    // OS/2 core header, 1x1 24-bit
    let mut os2 = vec![0u8; 30];
    os2[0] = b'B'; os2[1] = b'M';
    os2[2..6].copy_from_slice(&30u32.to_le_bytes());
    os2[10..14].copy_from_slice(&26u32.to_le_bytes());
    os2[14..18].copy_from_slice(&12u32.to_le_bytes());
    os2[18..20].copy_from_slice(&1u16.to_le_bytes()); // width
    os2[20..22].copy_from_slice(&1u16.to_le_bytes()); // height
    os2[22..24].copy_from_slice(&1u16.to_le_bytes()); // planes
    os2[24..26].copy_from_slice(&24u16.to_le_bytes()); // bpp
    fs::write(format!("{dir}/bmp_os2_1x1.bmp"), os2).unwrap();

    // ICO wrapping the 1x1 BMP as a DIB (doubled height, 4-byte AND mask row)
    let mut dib = bmp[14..54].to_vec();
    dib[8..12].copy_from_slice(&2i32.to_le_bytes());
    dib.extend_from_slice(&bmp[54..58]);
    dib.extend_from_slice(&[0; 4]);
    let mut ico = vec![0, 0, 1, 0, 1, 0, 1, 1, 0, 0, 1, 0, 24, 0];
    ico.extend_from_slice(&(dib.len() as u32).to_le_bytes());
    ico.extend_from_slice(&22u32.to_le_bytes());
    ico.extend_from_slice(&dib);
    fs::write(format!("{dir}/ico_1x1.ico"), ico).unwrap();

    // JPEG: SOI, SOF0 1x1 one component, EOI
    let jpeg = [
        0xFF, 0xD8, 0xFF, 0xC0, 0, 11, 8, 0, 1, 0, 1, 1, 1, 0x11, 0, 0xFF, 0xD9,
    ];
    fs::write(format!("{dir}/jpeg_sof_only.jpg"), jpeg).unwrap();

    // Truncated/malformed seeds for edge coverage
    fs::write(format!("{dir}/empty.bin"), b"").unwrap();
    fs::write(format!("{dir}/png_signature.bin"), b"\x89PNG\r\n\x1a\n").unwrap();
    fs::write(format!("{dir}/bm_short.bin"), b"BM\x00\x00").unwrap();
    fs::write(format!("{dir}/ico_empty_dir.bin"), b"\x00\x00\x01\x00\x00\x00").unwrap();

    println!("Generated seed corpus in {dir}/");
}
