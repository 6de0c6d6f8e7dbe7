//! Synthesis of minimal PE32+ images with crafted import tables
//!
//! Just enough of an image for the import reader: DOS header, COFF header,
//! optional header, one `.idata` section carrying the import-descriptor
//! array and the name strings. Not loadable, but structurally valid.

use std::path::Path;

const LFANEW: usize = 0x40;
const COFF_OFFSET: usize = LFANEW + 4;
const OPT_OFFSET: usize = COFF_OFFSET + 20;
const OPT_SIZE: usize = 240; // standard PE32+ optional header
const SECTION_OFFSET: usize = OPT_OFFSET + OPT_SIZE;
const RAW_OFFSET: usize = 0x200;
const SECTION_RVA: u32 = 0x1000;
const DESCRIPTOR_SIZE: usize = 20;

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Build the bytes of a stub executable importing exactly `imports`, in order
pub(crate) fn stub_pe(imports: &[&str]) -> Vec<u8> {
    let descriptors_len = DESCRIPTOR_SIZE * (imports.len() + 1);
    let names_len: usize = imports.iter().map(|n| n.len() + 1).sum();
    let raw_size = (descriptors_len + names_len).next_multiple_of(0x200).max(0x200);

    let mut buf = vec![0u8; RAW_OFFSET + raw_size];

    // DOS header
    buf[0..2].copy_from_slice(b"MZ");
    put_u32(&mut buf, 0x3c, LFANEW as u32);

    // PE signature + COFF header
    buf[LFANEW..LFANEW + 4].copy_from_slice(b"PE\0\0");
    put_u16(&mut buf, COFF_OFFSET, 0x8664); // x86-64
    put_u16(&mut buf, COFF_OFFSET + 2, 1); // one section
    put_u16(&mut buf, COFF_OFFSET + 16, OPT_SIZE as u16);
    put_u16(&mut buf, COFF_OFFSET + 18, 0x0022); // executable image

    // optional header: magic, directory count, import directory entry
    put_u16(&mut buf, OPT_OFFSET, 0x20b);
    put_u32(&mut buf, OPT_OFFSET + 108, 16);
    put_u32(&mut buf, OPT_OFFSET + 112 + 8, SECTION_RVA);
    put_u32(&mut buf, OPT_OFFSET + 112 + 12, descriptors_len as u32);

    // .idata section header
    buf[SECTION_OFFSET..SECTION_OFFSET + 6].copy_from_slice(b".idata");
    put_u32(&mut buf, SECTION_OFFSET + 8, raw_size as u32); // virtual size
    put_u32(&mut buf, SECTION_OFFSET + 12, SECTION_RVA);
    put_u32(&mut buf, SECTION_OFFSET + 16, raw_size as u32); // raw size
    put_u32(&mut buf, SECTION_OFFSET + 20, RAW_OFFSET as u32);

    // import descriptors, then the NUL-terminated names they point at
    let mut name_cursor = descriptors_len;
    for (index, name) in imports.iter().enumerate() {
        let descriptor = RAW_OFFSET + index * DESCRIPTOR_SIZE;
        put_u32(&mut buf, descriptor + 12, SECTION_RVA + name_cursor as u32);
        let name_offset = RAW_OFFSET + name_cursor;
        buf[name_offset..name_offset + name.len()].copy_from_slice(name.as_bytes());
        name_cursor += name.len() + 1;
    }
    // the array terminator is the all-zero descriptor already in place

    buf
}

pub(crate) fn write_stub_pe<P: AsRef<Path>>(path: P, imports: &[&str]) -> std::io::Result<()> {
    fs_err::write(path.as_ref(), stub_pe(imports))
}

#[cfg(test)]
mod tests {
    use super::write_stub_pe;
    use crate::pe::read_imports;

    #[test]
    fn section_grows_past_one_block_when_needed() -> std::io::Result<()> {
        let names: Vec<String> = (0..60).map(|i| format!("lib-number-{i}.dll")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let dir = tempfile::tempdir()?;
        let exe = dir.path().join("many.exe");
        write_stub_pe(&exe, &name_refs)?;

        let parsed = read_imports(&exe).expect("stub should stay parseable");
        assert_eq!(parsed, names);
        Ok(())
    }
}
