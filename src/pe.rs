//! Low-level access to the import table of a PE executable file
//!
//! Only the header chain needed to reach the import-descriptor array is
//! parsed: DOS header, COFF header, optional-header magic and data
//! directories, and the section table. Every offset is computed through
//! bounds-checked reads over the loaded buffer; a file that lies about any
//! of them yields a [`StageError`], never an out-of-bounds access.

use crate::common::StageError;
use dataview::{DataView, Pod};
use std::io::Read;
use std::path::Path;

const DOS_MAGIC: u16 = 0x5a4d; // "MZ"
const PE_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const OPT_MAGIC_PE32: u16 = 0x10b;
const OPT_MAGIC_PE32_PLUS: u16 = 0x20b;

/// Index of the import directory among the optional header's data directories
const IMPORT_DIRECTORY_INDEX: usize = 1;

/// The Windows loader refuses images with more sections than this
const MAX_SECTIONS: u16 = 96;

#[derive(Copy, Clone)]
#[repr(C)]
struct DosHeader {
    e_magic: u16,
    _reserved: [u16; 29],
    e_lfanew: u32,
}

// the record types mirror the on-disk layout in full; not every field is read
#[derive(Copy, Clone)]
#[repr(C)]
#[allow(dead_code)]
struct CoffHeader {
    machine: u16,
    number_of_sections: u16,
    time_date_stamp: u32,
    pointer_to_symbol_table: u32,
    number_of_symbols: u32,
    size_of_optional_header: u16,
    characteristics: u16,
}

#[derive(Copy, Clone)]
#[repr(C)]
#[allow(dead_code)]
struct SectionHeader {
    name: [u8; 8],
    virtual_size: u32,
    virtual_address: u32,
    size_of_raw_data: u32,
    pointer_to_raw_data: u32,
    pointer_to_relocations: u32,
    pointer_to_linenumbers: u32,
    number_of_relocations: u16,
    number_of_linenumbers: u16,
    characteristics: u32,
}

#[derive(Copy, Clone)]
#[repr(C)]
#[allow(dead_code)]
struct ImportDescriptor {
    original_first_thunk: u32,
    time_date_stamp: u32,
    forwarder_chain: u32,
    name: u32,
    first_thunk: u32,
}

// repr(C), fields are unpadded integer types: any bit pattern is valid
unsafe impl Pod for DosHeader {}
unsafe impl Pod for CoffHeader {}
unsafe impl Pod for SectionHeader {}
unsafe impl Pod for ImportDescriptor {}

impl SectionHeader {
    fn contains_rva(&self, rva: u32) -> bool {
        rva >= self.virtual_address
            && (rva - self.virtual_address) < self.virtual_size
    }

    /// Map an RVA inside this section to an offset into the file buffer
    ///
    /// A section's virtual range may be larger than its raw data; an RVA
    /// pointing into the zero-filled virtual tail has no bytes in the file
    /// to read, so the offset is bounded by `raw_end`, not just the file.
    fn rva_to_offset(&self, rva: u32, raw_end: usize) -> Result<usize, StageError> {
        if !self.contains_rva(rva) {
            return Err(StageError::MalformedImage(format!(
                "RVA {rva:#x} escapes the import section"
            )));
        }
        let offset = self.pointer_to_raw_data as usize + (rva - self.virtual_address) as usize;
        if offset >= raw_end {
            return Err(StageError::MalformedImage(format!(
                "RVA {rva:#x} maps past the section's raw data"
            )));
        }
        Ok(offset)
    }

    /// End of this section's raw data, clamped to the file
    fn raw_end(&self, file_len: usize) -> usize {
        (self.pointer_to_raw_data as usize).saturating_add(self.size_of_raw_data as usize)
            .min(file_len)
    }
}

/// An executable file loaded in memory for the duration of one import scan
pub struct PeImage {
    content: Vec<u8>,
}

impl PeImage {
    /// Read the whole file into a buffer, with shared read-only access
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StageError> {
        let mut file = fs_err::File::open(path.as_ref())?;
        let expected = file.metadata()?.len();
        let mut content = Vec::with_capacity(expected as usize);
        let read = file.read_to_end(&mut content)? as u64;
        if read != expected {
            return Err(StageError::ShortRead { expected, read });
        }
        Ok(Self { content })
    }

    /// Names of the DLLs this executable imports, in import-descriptor order
    pub fn import_names(&self) -> Result<Vec<String>, StageError> {
        let view = DataView::from(&self.content[..]);
        let file_len = self.content.len();

        let dos: DosHeader = view
            .try_read(0)
            .ok_or_else(|| StageError::MalformedImage("truncated DOS header".to_owned()))?;
        if dos.e_magic != DOS_MAGIC {
            return Err(StageError::MalformedImage("bad DOS magic".to_owned()));
        }

        let nt_offset = dos.e_lfanew as usize;
        let signature: u32 = view
            .try_read(nt_offset)
            .ok_or_else(|| StageError::MalformedImage("truncated NT headers".to_owned()))?;
        if signature != PE_SIGNATURE {
            return Err(StageError::MalformedImage("bad PE signature".to_owned()));
        }

        let coff: CoffHeader = view
            .try_read(nt_offset + 4)
            .ok_or_else(|| StageError::MalformedImage("truncated COFF header".to_owned()))?;
        if coff.number_of_sections == 0 || coff.number_of_sections > MAX_SECTIONS {
            return Err(StageError::MalformedImage(format!(
                "implausible section count {}",
                coff.number_of_sections
            )));
        }

        let opt_offset = nt_offset + 4 + std::mem::size_of::<CoffHeader>();
        let opt_magic: u16 = view
            .try_read(opt_offset)
            .ok_or_else(|| StageError::MalformedImage("truncated optional header".to_owned()))?;
        // the data directories sit at a different offset in 32- and 64-bit images
        let data_directory_offset = match opt_magic {
            OPT_MAGIC_PE32 => 96,
            OPT_MAGIC_PE32_PLUS => 112,
            other => {
                return Err(StageError::MalformedImage(format!(
                    "unknown optional header magic {other:#x}"
                )))
            }
        };
        let directory_count: u32 = view
            .try_read(opt_offset + data_directory_offset - 4)
            .ok_or_else(|| StageError::MalformedImage("truncated optional header".to_owned()))?;
        if directory_count as usize <= IMPORT_DIRECTORY_INDEX {
            return Err(StageError::NoImportSection);
        }
        let import_rva: u32 = view
            .try_read(opt_offset + data_directory_offset + 8 * IMPORT_DIRECTORY_INDEX)
            .ok_or_else(|| StageError::MalformedImage("truncated data directories".to_owned()))?;
        if import_rva == 0 {
            return Err(StageError::NoImportSection);
        }

        let section_table_offset = opt_offset + coff.size_of_optional_header as usize;
        let import_section = (0..coff.number_of_sections as usize)
            .map(|i| {
                view.try_read::<SectionHeader>(
                    section_table_offset + i * std::mem::size_of::<SectionHeader>(),
                )
                .ok_or_else(|| StageError::MalformedImage("truncated section table".to_owned()))
            })
            .collect::<Result<Vec<SectionHeader>, StageError>>()?
            .into_iter()
            .find(|s| s.contains_rva(import_rva))
            .ok_or(StageError::NoImportSection)?;

        let raw_end = import_section.raw_end(file_len);
        let descriptors_offset = import_section.rva_to_offset(import_rva, raw_end)?;

        let mut names = Vec::new();
        for index in 0.. {
            let descriptor: ImportDescriptor = view
                .try_read(descriptors_offset + index * std::mem::size_of::<ImportDescriptor>())
                .ok_or_else(|| {
                    StageError::MalformedImage("import descriptors run past the file".to_owned())
                })?;
            if descriptor.name == 0 {
                break;
            }
            let name_offset = import_section.rva_to_offset(descriptor.name, raw_end)?;
            names.push(read_import_name(&self.content[name_offset..raw_end])?);
        }

        Ok(names)
    }
}

/// Copy out a NUL-terminated import name from the section's raw data
fn read_import_name(bytes: &[u8]) -> Result<String, StageError> {
    let terminator = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| StageError::MalformedImage("unterminated import name".to_owned()))?;
    std::str::from_utf8(&bytes[..terminator])
        .map(str::to_owned)
        .map_err(|_| StageError::MalformedImage("import name is not valid UTF-8".to_owned()))
}

/// Read the names of the DLLs the file at `path` depends on
///
/// The file is read and released within this call; nothing is kept open.
pub fn read_imports<P: AsRef<Path>>(path: P) -> Result<Vec<String>, StageError> {
    PeImage::open(path)?.import_names()
}
