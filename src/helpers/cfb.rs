//! OLE compound file reader, the container of legacy `.xls` workbooks.
//!
//! The whole file is loaded into memory; streams are reassembled by walking
//! their sector chains through the allocation tables.

use crate::error::SheetError;
use crate::helpers::bytes::le_u16;
use crate::helpers::bytes::le_u32;
use crate::helpers::bytes::le_u64;
use crate::helpers::bytes::u32_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

pub(crate) const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const HEADER_SIZE: usize = 512;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const MINI_SECTOR_SIZE: usize = 64;
/// Highest regular sector number; larger values mark chain ends and special sectors.
const MAX_REG_SECT: u32 = 0xFFFF_FFFA;

const STREAM_OBJECT: u8 = 2;
const ROOT_OBJECT: u8 = 5;

#[derive(Error, Debug)]
pub(crate) enum CfbError {
    #[error("Not an OLE compound file")]
    Signature,

    #[error("Compound file is truncated")]
    Truncated,

    #[error("Invalid sector size '2 ^ {1}' for major version '{0}'")]
    SectorSize(u16, u16),

    #[error("Allocation table lists {1} sectors, header declares {0}")]
    AllocationTable(usize, usize),

    #[error("Sector {0} is outside the file")]
    SectorOutOfRange(u32),

    #[error("Sector chain starting at {0} does not terminate")]
    SectorChain(u32),

    #[error("Missing root directory entry")]
    RootDirectory,

    #[error("Stream '{0}' is shorter than its declared size")]
    StreamSize(String),
}

/// A parsed compound file with every stream reachable by name.
pub(crate) struct CompoundFile {
    streams: HashMap<String, Entry>,
    fat: Vec<u32>,
    sectors: Sectors,
    mini_fat: Vec<u32>,
    mini_sectors: Sectors,
    mini_cutoff: u64,
}

#[derive(Copy, Clone, Debug)]
struct Entry {
    start: u32,
    size: u64,
}

impl CompoundFile {
    pub(crate) fn open<R: Read + Seek>(reader: &mut R) -> Result<CompoundFile, SheetError> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let mut data = Vec::with_capacity(size as usize);
        reader.read_to_end(&mut data)?;
        Self::parse(data)
    }

    fn parse(data: Vec<u8>) -> Result<CompoundFile, SheetError> {
        if data.len() < HEADER_SIZE {
            Err(CfbError::Truncated)?
        }
        if data[..8] != SIGNATURE {
            Err(CfbError::Signature)?
        }
        let header = Header::new(&data[..HEADER_SIZE])?;
        let sectors = Sectors {
            data,
            size: header.sector_size,
            base: header.sector_size,
        };

        let fat = load_fat(&sectors, &header)?;
        let directory = read_chain(&fat, &sectors, header.first_directory_sector)?;
        let mut streams = HashMap::<String, Entry>::new();
        let mut root = None::<Entry>;
        for bytes in directory.chunks_exact(DIRECTORY_ENTRY_SIZE) {
            let (name, kind, mut entry) = parse_entry(bytes);
            if header.major_version == 3 {
                // only the low half of the size is defined for 512-byte sectors
                entry.size &= 0xFFFF_FFFF;
            }
            match kind {
                ROOT_OBJECT if root.is_none() => root = Some(entry),
                STREAM_OBJECT => {
                    streams.entry(name).or_insert(entry);
                }
                _ => (),
            }
        }
        let root = root.ok_or(CfbError::RootDirectory)?;

        let mini_fat = if header.mini_fat_sector_count > 0 {
            u32_iter(&read_chain(&fat, &sectors, header.first_mini_fat_sector)?).collect()
        } else {
            Vec::new()
        };
        let mut mini_stream = read_chain(&fat, &sectors, root.start)?;
        mini_stream.truncate(usize::try_from(root.size).unwrap_or(usize::MAX));

        Ok(CompoundFile {
            streams,
            fat,
            sectors,
            mini_fat,
            mini_sectors: Sectors {
                data: mini_stream,
                size: MINI_SECTOR_SIZE,
                base: 0,
            },
            mini_cutoff: header.mini_cutoff,
        })
    }

    /// Contents of the stream `name`, or `None` when there is no such stream.
    pub(crate) fn stream(&self, name: &str) -> Result<Option<Vec<u8>>, SheetError> {
        let entry = match self.streams.get(name) {
            Some(entry) => *entry,
            None => return Ok(None),
        };
        let mut bytes = if entry.size < self.mini_cutoff {
            read_chain(&self.mini_fat, &self.mini_sectors, entry.start)?
        } else {
            read_chain(&self.fat, &self.sectors, entry.start)?
        };
        if (bytes.len() as u64) < entry.size {
            Err(CfbError::StreamSize(name.to_owned()))?
        }
        bytes.truncate(entry.size as usize);
        Ok(Some(bytes))
    }
}

struct Sectors {
    data: Vec<u8>,
    size: usize,
    /// Byte offset of sector 0
    base: usize,
}

impl Sectors {
    fn get(&self, sector: u32) -> Option<&[u8]> {
        let start = (sector as usize).checked_mul(self.size)?.checked_add(self.base)?;
        let end = self.data.len().min(start.saturating_add(self.size));
        self.data.get(start..end).filter(|bytes| !bytes.is_empty())
    }

    fn count(&self) -> usize {
        self.data.len().saturating_sub(self.base).div_ceil(self.size)
    }
}

struct Header {
    major_version: u16,
    sector_size: usize,
    fat_sector_count: usize,
    first_directory_sector: u32,
    mini_cutoff: u64,
    first_mini_fat_sector: u32,
    mini_fat_sector_count: usize,
    first_difat_sector: u32,
    difat_sector_count: usize,
}

impl Header {
    fn new(bytes: &[u8]) -> Result<Header, SheetError> {
        let major_version = le_u16(bytes, 26);
        let sector_shift = le_u16(bytes, 30);
        let sector_size = match (major_version, sector_shift) {
            (3, 9) => 512,
            (4, 12) => 4096,
            _ => Err(CfbError::SectorSize(major_version, sector_shift))?,
        };
        Ok(Header {
            major_version,
            sector_size,
            fat_sector_count: le_u32(bytes, 44) as usize,
            first_directory_sector: le_u32(bytes, 48),
            mini_cutoff: u64::from(le_u32(bytes, 56)),
            first_mini_fat_sector: le_u32(bytes, 60),
            mini_fat_sector_count: le_u32(bytes, 64) as usize,
            first_difat_sector: le_u32(bytes, 68),
            difat_sector_count: le_u32(bytes, 72) as usize,
        })
    }
}

/// Collects the sector allocation table through the header's DIFAT
/// entries and any DIFAT sectors chained after it.
fn load_fat(sectors: &Sectors, header: &Header) -> Result<Vec<u32>, SheetError> {
    let mut difat: Vec<u32> = u32_iter(&sectors.data[76..HEADER_SIZE]).collect();
    let mut next = header.first_difat_sector;
    let mut difat_sectors = 0usize;
    while next <= MAX_REG_SECT {
        if difat_sectors >= sectors.count() {
            Err(CfbError::SectorChain(header.first_difat_sector))?
        }
        let mut entries: Vec<u32> = u32_iter(sectors.get(next).ok_or(CfbError::SectorOutOfRange(next))?).collect();
        next = entries.pop().ok_or(CfbError::Truncated)?;
        difat.extend(entries);
        difat_sectors += 1;
    }
    if difat_sectors != header.difat_sector_count {
        Err(CfbError::AllocationTable(header.difat_sector_count, difat_sectors))?
    }

    let mut fat = Vec::<u32>::new();
    let mut fat_sectors = 0usize;
    for sector in difat.into_iter().filter(|sector| *sector <= MAX_REG_SECT) {
        fat.extend(u32_iter(sectors.get(sector).ok_or(CfbError::SectorOutOfRange(sector))?));
        fat_sectors += 1;
    }
    if fat_sectors != header.fat_sector_count {
        Err(CfbError::AllocationTable(header.fat_sector_count, fat_sectors))?
    }
    Ok(fat)
}

/// Concatenates the sectors of the chain starting at `start`.
/// A chain longer than its table has a cycle and is rejected.
fn read_chain(table: &[u32], sectors: &Sectors, start: u32) -> Result<Vec<u8>, SheetError> {
    let mut bytes = Vec::new();
    let mut sector = start;
    let mut steps = 0usize;
    while sector <= MAX_REG_SECT {
        steps += 1;
        if steps > table.len() {
            Err(CfbError::SectorChain(start))?
        }
        bytes.extend_from_slice(sectors.get(sector).ok_or(CfbError::SectorOutOfRange(sector))?);
        sector = *table.get(sector as usize).ok_or(CfbError::SectorOutOfRange(sector))?;
    }
    Ok(bytes)
}

fn parse_entry(bytes: &[u8]) -> (String, u8, Entry) {
    let name_size = (le_u16(bytes, 64) as usize).min(64);
    let (name, _) = UTF_16LE.decode_without_bom_handling(&bytes[..name_size]);
    let name = name.split('\0').next().unwrap_or_default().to_owned();
    let entry = Entry {
        start: le_u32(bytes, 116),
        size: le_u64(bytes, 120),
    };
    (name, bytes[66], entry)
}
