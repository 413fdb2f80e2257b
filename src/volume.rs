//! A single volume: one references file plus a shared blocks file.
//!
//! Every entry in a volume is a singly-linked chain of blocks. Reading
//! walks the chain following `next_block_id`; writing either rewrites an
//! existing chain in place (growing or shrinking it as needed) or appends a
//! brand new one, falling back from the former to the latter on any error.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use tracing::{trace, warn};

use crate::block::{Block, BLOCK_LENGTH, BYTES_PER_BLOCK, END_OF_ENTRY};
use crate::error::{Result, StoreError};
use crate::reference::{Reference, REFERENCE_LENGTH};

/// One JAGEX-style volume: a references file private to this volume and a
/// blocks file shared by every volume opened against the same
/// [`crate::storage::Storage`].
pub struct Volume {
    volume_id: u8,
    references: File,
    blocks: Arc<File>,
    lock: Arc<Mutex<()>>,
}

impl Volume {
    pub fn new(volume_id: u8, references: File, blocks: Arc<File>, lock: Arc<Mutex<()>>) -> Volume {
        Volume {
            volume_id,
            references,
            blocks,
            lock,
        }
    }

    /// Reads the full contents of `entry_id`, walking its block chain.
    pub fn read(&mut self, entry_id: u16) -> Result<Vec<u8>> {
        let _guard = self.lock.lock().unwrap();
        let span = tracing::info_span!("volume.read", volume = self.volume_id, entry = entry_id);
        let _enter = span.enter();

        let reference = self.read_reference(entry_id)?;
        if reference.is_unused() {
            return Ok(Vec::new());
        }

        let mut out = vec![0u8; reference.length as usize];
        let mut offset = 0u32;
        let mut block_id = reference.head_block_id;
        let mut part = 0u16;

        while offset < reference.length {
            if block_id == END_OF_ENTRY {
                return Err(StoreError::PrematureEndOfEntry {
                    entry_id,
                    read: offset,
                    length: reference.length,
                });
            }

            let block = self.read_block(block_id)?;
            block.validate(self.volume_id, entry_id, part)?;
            trace!(block_id, part, "read block");

            let n = (reference.length - offset).min(BYTES_PER_BLOCK as u32) as usize;
            out[offset as usize..offset as usize + n].copy_from_slice(&block.bytes[..n]);

            offset += n as u32;
            block_id = block.next_block_id;
            part += 1;
        }

        Ok(out)
    }

    /// Writes `buffer` as the full contents of `entry_id`.
    ///
    /// Tries to overwrite the entry's existing chain first; on any failure
    /// (including the entry not existing yet) falls back to appending a
    /// fresh chain at the end of the blocks file. Only the fallback's error
    /// is ever returned to the caller.
    pub fn write(&mut self, entry_id: u16, buffer: &[u8]) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        let span = tracing::info_span!("volume.write", volume = self.volume_id, entry = entry_id);
        let _enter = span.enter();

        if let Err(e) = self.write_internal(entry_id, buffer, true) {
            warn!(error = %e, "overwrite failed, falling back to append");
            self.write_internal(entry_id, buffer, false)?;
        }
        Ok(())
    }

    fn write_internal(&mut self, entry_id: u16, buffer: &[u8], overwrite: bool) -> Result<()> {
        let existing = if overwrite {
            let reference = self.read_reference(entry_id)?;
            if reference.is_unused() {
                return Err(StoreError::UnusedEntry(entry_id));
            }
            if !self.block_exists(reference.head_block_id)? {
                return Err(StoreError::BlockNotFound(reference.head_block_id));
            }
            Some(reference.head_block_id)
        } else {
            None
        };

        let head_block_id = if let Some(id) = existing {
            id
        } else {
            self.next_block_id()?
        };

        let mut offset = 0u32;
        let mut part = 0u16;
        let mut block_id = head_block_id;
        let mut existing_next = existing;

        while offset < buffer.len() as u32 {
            let write_len = (buffer.len() as u32 - offset).min(BYTES_PER_BLOCK as u32);

            let mut next_block_id = if let Some(current) = existing_next {
                if !self.block_exists(current)? {
                    return Err(StoreError::BlockNotFound(current));
                }
                let existing_block = self.read_block(current)?;
                existing_block.validate(self.volume_id, entry_id, part)?;
                existing_block.next_block_id
            } else {
                END_OF_ENTRY
            };

            if next_block_id == END_OF_ENTRY && offset + write_len < buffer.len() as u32 {
                next_block_id = self.next_block_id()?;
                if next_block_id == block_id {
                    next_block_id += 1;
                }
            }

            if offset + write_len >= buffer.len() as u32 {
                next_block_id = END_OF_ENTRY;
            }

            let block = Block {
                entry_id,
                part,
                next_block_id,
                volume_id: self.volume_id,
                bytes: buffer[offset as usize..offset as usize + write_len as usize].to_vec(),
            };
            self.write_block(block_id, &block)?;
            trace!(block_id, part, next_block_id, "wrote block");

            offset += write_len;
            part += 1;
            existing_next = if next_block_id != END_OF_ENTRY {
                Some(next_block_id)
            } else {
                None
            };
            block_id = next_block_id;
        }

        self.write_reference(
            entry_id,
            &Reference {
                length: buffer.len() as u32,
                head_block_id,
            },
        )?;

        Ok(())
    }

    pub(crate) fn read_reference(&mut self, entry_id: u16) -> Result<Reference> {
        let offset = entry_id as u64 * REFERENCE_LENGTH as u64;
        let mut buf = [0u8; REFERENCE_LENGTH];
        self.references.seek(SeekFrom::Start(offset))?;
        match self.references.read_exact(&mut buf) {
            Ok(()) => Ok(Reference::read(&buf)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(Reference::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn write_reference(&mut self, entry_id: u16, reference: &Reference) -> Result<()> {
        let offset = entry_id as u64 * REFERENCE_LENGTH as u64;
        let mut buf = [0u8; REFERENCE_LENGTH];
        reference.write(&mut buf);
        self.references.seek(SeekFrom::Start(offset))?;
        self.references.write_all(&buf)?;
        Ok(())
    }

    fn read_block(&self, block_id: u32) -> Result<Block> {
        let offset = block_id as u64 * BLOCK_LENGTH as u64;
        let mut buf = [0u8; BLOCK_LENGTH];
        let mut blocks = &*self.blocks;
        blocks.seek(SeekFrom::Start(offset))?;
        blocks.read_exact(&mut buf)?;
        Ok(Block::read(&buf))
    }

    fn write_block(&self, block_id: u32, block: &Block) -> Result<()> {
        let offset = block_id as u64 * BLOCK_LENGTH as u64;
        let mut buf = [0u8; BLOCK_LENGTH];
        block.write(&mut buf);
        let mut blocks = &*self.blocks;
        blocks.seek(SeekFrom::Start(offset))?;
        blocks.write_all(&buf)?;
        Ok(())
    }

    fn block_exists(&self, block_id: u32) -> Result<bool> {
        if block_id == END_OF_ENTRY {
            return Ok(false);
        }
        let size = self.blocks.metadata()?.len();
        Ok(block_id as u64 <= size / BLOCK_LENGTH as u64)
    }

    /// The smallest block id guaranteed not to collide with any block
    /// already on disk.
    fn next_block_id(&self) -> Result<u32> {
        let size = self.blocks.metadata()?.len();
        let id = (size + BLOCK_LENGTH as u64 - 1) / BLOCK_LENGTH as u64;
        Ok(id.max(1) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempfile;

    fn sequential_bytes(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i % 256) as u8).collect()
    }

    fn new_test_volume() -> Volume {
        let references = tempfile().unwrap();
        let blocks = Arc::new(tempfile().unwrap());
        Volume::new(0, references, blocks, Arc::new(Mutex::new(())))
    }

    #[test]
    fn reads_a_hand_laid_out_chain() {
        let mut volume = new_test_volume();
        let contents = sequential_bytes(1_000_000);

        let reference = Reference {
            length: contents.len() as u32,
            head_block_id: 1,
        };
        let mut ref_buf = [0u8; REFERENCE_LENGTH];
        reference.write(&mut ref_buf);
        volume.references.write_all(&ref_buf).unwrap();

        let mut block_id = 1u32;
        let mut part = 0u16;
        let mut i = 0;
        while i < contents.len() {
            let len = (contents.len() - i).min(BYTES_PER_BLOCK);
            let block = Block {
                entry_id: 0,
                part,
                next_block_id: block_id + 1,
                volume_id: 0,
                bytes: contents[i..i + len].to_vec(),
            };
            let offset = block_id as u64 * BLOCK_LENGTH as u64;
            let mut buf = [0u8; BLOCK_LENGTH];
            block.write(&mut buf);
            let mut blocks: &File = &volume.blocks;
            blocks.seek(SeekFrom::Start(offset)).unwrap();
            blocks.write_all(&buf).unwrap();

            block_id += 1;
            part += 1;
            i += len;
        }

        let entry = volume.read(0).unwrap();
        assert_eq!(entry, contents);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut volume = new_test_volume();
        let contents = sequential_bytes(1_000_000);

        volume.write(0, &contents).unwrap();
        let entry = volume.read(0).unwrap();
        assert_eq!(entry, contents);
    }

    #[test]
    fn write_lays_out_the_chain_the_way_read_expects() {
        let mut volume = new_test_volume();
        let contents = sequential_bytes(1_000_000);
        volume.write(0, &contents).unwrap();

        let reference = volume.read_reference(0).unwrap();
        assert_eq!(reference.length, contents.len() as u32);
        assert_eq!(reference.head_block_id, 1);

        let mut compare = vec![0u8; contents.len()];
        let mut offset = 0u32;
        let mut block_id = reference.head_block_id;
        let mut part = 0u16;
        while offset < reference.length {
            assert_ne!(block_id, END_OF_ENTRY, "unexpected end of entry");
            let block = volume.read_block(block_id).unwrap();
            assert_eq!(block.entry_id, 0);
            assert_eq!(block.part, part);
            assert_eq!(block.volume_id, 0);

            let n = (reference.length - offset).min(BYTES_PER_BLOCK as u32);
            compare[offset as usize..offset as usize + n as usize]
                .copy_from_slice(&block.bytes[..n as usize]);

            block_id = block.next_block_id;
            offset += n;
            part += 1;
        }
        assert_eq!(compare, contents);
    }

    #[test]
    fn overwrite_with_shorter_contents_truncates_the_chain() {
        let mut volume = new_test_volume();
        volume.write(0, &sequential_bytes(2000)).unwrap();
        volume.write(0, &sequential_bytes(100)).unwrap();
        let entry = volume.read(0).unwrap();
        assert_eq!(entry, sequential_bytes(100));
    }

    #[test]
    fn overwrite_with_longer_contents_extends_the_chain() {
        let mut volume = new_test_volume();
        volume.write(0, &sequential_bytes(100)).unwrap();
        volume.write(0, &sequential_bytes(2000)).unwrap();
        let entry = volume.read(0).unwrap();
        assert_eq!(entry, sequential_bytes(2000));
    }

    #[test]
    fn reading_an_unused_entry_returns_empty_bytes() {
        let mut volume = new_test_volume();
        assert_eq!(volume.read(5).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn mismatched_block_header_is_rejected() {
        let mut volume = new_test_volume();
        volume.write(0, &sequential_bytes(10)).unwrap();
        volume.write(1, &sequential_bytes(10)).unwrap();

        // Corrupt entry 0's reference to point at entry 1's block.
        let reference = volume.read_reference(1).unwrap();
        volume.write_reference(0, &reference).unwrap();

        assert!(matches!(
            volume.read(0),
            Err(StoreError::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn overwriting_a_reference_stolen_from_another_entry_falls_back_to_append_without_corrupting_it() {
        let mut volume = new_test_volume();
        volume.write(0, &sequential_bytes(10)).unwrap();
        volume.write(1, &sequential_bytes(2000)).unwrap();

        // Corrupt entry 0's reference so its head block actually belongs to
        // entry 1's chain (a stale/corrupt reference).
        let stolen = volume.read_reference(1).unwrap();
        volume.write_reference(0, &stolen).unwrap();

        let new_contents = sequential_bytes(50);
        volume.write(0, &new_contents).unwrap();

        // Entry 0 was written via the append fallback, not an in-place
        // overwrite of entry 1's blocks.
        assert_eq!(volume.read(0).unwrap(), new_contents);
        // Entry 1 must be untouched.
        assert_eq!(volume.read(1).unwrap(), sequential_bytes(2000));
    }

    #[test]
    fn overwrite_with_out_of_range_head_block_falls_back_to_append() {
        let mut volume = new_test_volume();
        volume.write(0, &sequential_bytes(10)).unwrap();

        // Corrupt entry 0's reference to point past the end of the blocks file.
        volume
            .write_reference(
                0,
                &Reference {
                    length: 10,
                    head_block_id: 999,
                },
            )
            .unwrap();

        let new_contents = sequential_bytes(20);
        volume.write(0, &new_contents).unwrap();
        assert_eq!(volume.read(0).unwrap(), new_contents);
    }
}
