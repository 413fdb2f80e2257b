//! `jagstore` — a linked-block entry store and compression container,
//! modeled on the JAGEX cache format.
//!
//! A [`storage::Storage`] owns one shared blocks file and hands out
//! [`volume::Volume`]s, each backed by its own references file. An entry
//! written to a volume is split into 512-byte blocks chained together by a
//! `next_block_id` pointer in each block's header; reading an entry means
//! following that chain from the reference's `head_block_id` until a block
//! reports [`block::END_OF_ENTRY`].
//!
//! Entry payloads are typically wrapped in a [`container`] frame before
//! being handed to a volume, recording which (if any) compression was
//! applied and how large the data was before and after.

pub mod block;
pub mod byteorder;
pub mod container;
pub mod error;
pub mod recovery;
pub mod reference;
pub mod storage;
pub mod volume;

pub use block::{Block, BLOCK_LENGTH, BYTES_PER_BLOCK, END_OF_ENTRY};
pub use container::{pack, unpack, Compression};
pub use error::{Result, StoreError};
pub use recovery::{scan_volume, ChainHealth, ScannedEntry};
pub use reference::{Reference, REFERENCE_LENGTH};
pub use storage::{DefaultNameProvider, NameProvider, Storage};
pub use volume::Volume;
