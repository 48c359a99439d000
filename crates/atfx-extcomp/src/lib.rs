//! # atfx-extcomp
//!
//! Binary external-component codec for ATFX bulk data. Local column values
//! live in flat binary files; `AoExternalComponent` instances describe where
//! and how each block of values is stored.
//!
//! ## Quick Start
//!
//! ```ignore
//! use atfx_extcomp::{ColumnReader, ExtCompWriter, SessionContext};
//!
//! let context = SessionContext::builder().with_file_root("/data/run42").build();
//!
//! // Move inline values into extcomp_1.btf
//! let mut writer = ExtCompWriter::new(context.clone());
//! writer.externalize_column(&mut cache, local_column, iid)?;
//!
//! // Read them back, scaled by the column's generation parameters
//! let values = ColumnReader::new(context).read(&cache, local_column, iid)?;
//! ```
//!
//! ## Value Types
//!
//! | Family | Type specs | Decoded as |
//! |--------|------------|------------|
//! | Integers | `dt_boolean`, `dt_byte`, `dt_short`, `dt_long`, `dt_longlong` (+ `_beo`) | `DS_BOOLEAN` .. `DS_LONGLONG` |
//! | Unsigned | `dt_sbyte`, `dt_ushort`, `dt_ulong` (+ `_beo`) | next wider signed type |
//! | Floats | `ieeefloat4`, `ieeefloat8` (+ `_beo`) | `DS_FLOAT`, `DS_DOUBLE` |
//! | Strings | `dt_string`, `dt_string_utf8` (+ `_beo`) | `DS_STRING` |
//! | Bits | `dt_bit_int`, `dt_bit_uint` (+ `_beo`) | `DS_LONG` or `DS_LONGLONG` |
//!
//! Byte strings, blobs, bit floats and the flag type specs are rejected as
//! not implemented.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        atfx-extcomp                           │
//! │                                                               │
//! │  ColumnReader        sequence representation + value mode     │
//! │  ├── ExtCompReader   descriptors (ordinal order) → Value      │
//! │  │   └── layout      block/bit layout, byte order, charset    │
//! │  └── generation parameters (linear, polynomial, calibrated)   │
//! │                                                               │
//! │  ExtCompWriter       append + rollover, one descriptor/column │
//! │  SessionContext      file root, segment size, file name stem  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod column;
mod config;
mod descriptor;
mod error;
mod layout;
mod reader;
mod typespec;
mod writer;

// Public re-exports
pub use column::{ColumnReader, SequenceRepresentation};
pub use config::{
    SessionContext, SessionContextBuilder, ValueMatrixMode, DEFAULT_FILENAME_STEM,
    DEFAULT_SEGMENT_SIZE,
};
pub use descriptor::{
    descriptors_of, find_component_relation, ComponentRelation, ExtCompDescriptor,
    EXTERNAL_COMPONENT_BASE, EXTERNAL_COMPONENT_RELATION,
};
pub use error::{ExtCompError, ExtCompResult};
pub use layout::{
    byte_extent, decode_flags, decode_strings, decode_values, encode_flags, encode_values,
    encoding_for, slot_width, BitField, BlockLayout,
};
pub use reader::ExtCompReader;
pub use typespec::{ByteOrder, Charset, TypeSpec};
pub use writer::{ExtCompWriter, FileCategory};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _: Option<SessionContext> = None;
        let _: Option<ExtCompReader> = None;
        let _: Option<ExtCompWriter> = None;
        let _: Option<ColumnReader> = None;
        let _: Option<ExtCompDescriptor> = None;
        let _: Option<ExtCompResult<()>> = None;
        assert_eq!(TypeSpec::ALL.len(), 33);
        assert_eq!(SequenceRepresentation::default(), SequenceRepresentation::Explicit);
    }
}
