//! Binary weight-bank container.
//!
//! A bank file holds every tensor of a trained model in one flat,
//! little-endian container: an 8-byte magic, a format version, an entry
//! count, then one record per tensor (binary key, dimensions, f32 payload).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::{ArrayD, IxDyn};

use crate::error::{FlowStackError, Result};
use crate::weights::{WeightGroup, WeightKey, WeightKind, WeightStore};

const BANK_MAGIC: &[u8; 8] = b"FSWBANK\0";
const BANK_VERSION: u32 = 1;

/// Byte offset of the entry-count field, patched at finalization.
const COUNT_OFFSET: u64 = 12;

/// Maximum tensor rank a bank record may declare.
const MAX_TENSOR_RANK: usize = 8;

/// Memory-mapped weight bank reader.
///
/// The whole container is parsed eagerly at open time; the resulting map
/// is immutable for the lifetime of the bank.
pub struct FileBank {
    entries: HashMap<WeightKey, ArrayD<f32>>,
}

impl FileBank {
    /// Open a bank file and parse every record.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < 16 {
            return Err(FlowStackError::InvalidBank(
                "File too small for bank header".into(),
            ));
        }

        if &mmap[0..8] != BANK_MAGIC {
            return Err(FlowStackError::InvalidBank("Missing bank magic".into()));
        }

        let mut cursor = &mmap[8..];
        let version = cursor.read_u32::<LittleEndian>()?;
        if version != BANK_VERSION {
            return Err(FlowStackError::InvalidBank(format!(
                "Unsupported bank version {version}"
            )));
        }

        let count = cursor.read_u32::<LittleEndian>()? as usize;
        let mut entries = HashMap::with_capacity(count);

        for _ in 0..count {
            let (key, tensor) = read_entry(&mut cursor)?;
            if entries.insert(key, tensor).is_some() {
                return Err(FlowStackError::InvalidBank(format!(
                    "Duplicate entry for {key}"
                )));
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl WeightStore for FileBank {
    fn tensor(&self, key: &WeightKey) -> Result<ArrayD<f32>> {
        self.entries
            .get(key)
            .cloned()
            .ok_or(FlowStackError::MissingWeight { key: *key })
    }
}

fn read_entry(cursor: &mut &[u8]) -> Result<(WeightKey, ArrayD<f32>)> {
    if cursor.len() < 7 {
        return Err(FlowStackError::InvalidBank(
            "Truncated entry header".into(),
        ));
    }

    let group_tag = cursor.read_u8()?;
    let kind_tag = cursor.read_u8()?;
    let level = cursor.read_u16::<LittleEndian>()? as usize;
    let layer = cursor.read_u16::<LittleEndian>()? as usize;
    let ndim = cursor.read_u8()? as usize;

    let group = WeightGroup::from_tag(group_tag)
        .ok_or_else(|| FlowStackError::InvalidBank(format!("Unknown group tag {group_tag}")))?;
    let kind = WeightKind::from_tag(kind_tag)
        .ok_or_else(|| FlowStackError::InvalidBank(format!("Unknown kind tag {kind_tag}")))?;
    let key = WeightKey::new(group, level, layer, kind);

    if ndim > MAX_TENSOR_RANK {
        return Err(FlowStackError::InvalidBank(format!(
            "Entry {key} declares rank {ndim}"
        )));
    }
    if cursor.len() < ndim * 4 {
        return Err(FlowStackError::InvalidBank(format!(
            "Truncated dimension list for {key}"
        )));
    }

    let mut dims = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        dims.push(cursor.read_u32::<LittleEndian>()? as usize);
    }

    let len: usize = dims.iter().product();
    if cursor.len() < len * 4 {
        return Err(FlowStackError::InvalidBank(format!(
            "Truncated payload for {key}: need {} bytes, {} remain",
            len * 4,
            cursor.len()
        )));
    }

    let mut data = vec![0.0f32; len];
    cursor.read_f32_into::<LittleEndian>(&mut data)?;

    let tensor = ArrayD::from_shape_vec(IxDyn(&dims), data)
        .map_err(|e| FlowStackError::InvalidBank(format!("Bad shape for {key}: {e}")))?;

    Ok((key, tensor))
}

/// Streaming weight bank writer.
pub struct BankWriter {
    writer: BufWriter<File>,
    entries_written: u32,
}

impl BankWriter {
    /// Create a new bank file and write its header. The entry count is
    /// patched in by [`BankWriter::finalize`].
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(BANK_MAGIC)?;
        writer.write_u32::<LittleEndian>(BANK_VERSION)?;
        writer.write_u32::<LittleEndian>(0)?;
        Ok(Self {
            writer,
            entries_written: 0,
        })
    }

    /// Append one tensor record.
    pub fn write_entry(&mut self, key: &WeightKey, tensor: &ArrayD<f32>) -> Result<()> {
        let dims = tensor.shape();
        if dims.len() > MAX_TENSOR_RANK {
            return Err(FlowStackError::InvalidBank(format!(
                "Entry {key} has rank {}, max {MAX_TENSOR_RANK}",
                dims.len()
            )));
        }

        self.writer.write_u8(key.group.tag())?;
        self.writer.write_u8(key.kind.tag())?;
        self.writer.write_u16::<LittleEndian>(key.level as u16)?;
        self.writer.write_u16::<LittleEndian>(key.layer as u16)?;
        self.writer.write_u8(dims.len() as u8)?;
        for &d in dims {
            self.writer.write_u32::<LittleEndian>(d as u32)?;
        }
        for &v in tensor.iter() {
            self.writer.write_f32::<LittleEndian>(v)?;
        }

        self.entries_written += 1;
        Ok(())
    }

    /// Patch the entry count into the header and flush.
    pub fn finalize(mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.seek(SeekFrom::Start(COUNT_OFFSET))?;
        self.writer
            .write_u32::<LittleEndian>(self.entries_written)?;
        self.writer.flush()?;
        Ok(())
    }
}
