/*
 * Copyright 2023 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::io;

use serde::{Deserialize, Serialize};

#[cfg(feature = "compression")]
use {
    lz4::{Decoder as Lz4Decoder, EncoderBuilder as Lz4EncoderBuilder},
    std::io::{Read, Write},
};

/// The compression level used by default.
#[cfg(feature = "compression")]
const DEFAULT_LZ4_LEVEL: u32 = 1;

/// The highest compression level LZ4 accepts.
#[cfg(feature = "compression")]
const MAX_LZ4_LEVEL: u32 = 16;

/// A method for compressing stored values.
///
/// The compression method of a store is chosen when the store is created and can't be changed
/// afterwards. Values are compressed when they are written and decompressed when they are read,
/// so callers only ever see uncompressed data.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Compression {
    /// Do not compress data.
    None,

    /// Compress data using the LZ4 compression algorithm.
    #[cfg(feature = "compression")]
    #[cfg_attr(docsrs, doc(cfg(feature = "compression")))]
    Lz4 {
        /// The compression level to use.
        ///
        /// This is a number in the range 0-16, where 0 gives the fastest compression and 16 gives
        /// the highest compression ratio.
        level: u32,
    },
}

impl Default for Compression {
    #[cfg(feature = "compression")]
    fn default() -> Self {
        Compression::Lz4 {
            level: DEFAULT_LZ4_LEVEL,
        }
    }

    #[cfg(not(feature = "compression"))]
    fn default() -> Self {
        Compression::None
    }
}

impl Compression {
    /// The name of the compression method, as recorded in the database.
    ///
    /// The level is not part of the name because it doesn't affect how data is decompressed.
    pub(crate) fn method(&self) -> &'static str {
        match self {
            Compression::None => "none",
            #[cfg(feature = "compression")]
            Compression::Lz4 { .. } => "lz4",
        }
    }

    /// Return a description of what is wrong with this compression method, if anything.
    pub(crate) fn validate(&self) -> Option<String> {
        match self {
            Compression::None => None,
            #[cfg(feature = "compression")]
            Compression::Lz4 { level } if *level > MAX_LZ4_LEVEL => Some(format!(
                "LZ4 compression level {} is greater than {}",
                level, MAX_LZ4_LEVEL
            )),
            #[cfg(feature = "compression")]
            Compression::Lz4 { .. } => None,
        }
    }

    /// Compresses the given `data` and returns it.
    pub(crate) fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            #[cfg(feature = "compression")]
            Compression::Lz4 { level } => {
                let mut output = Vec::with_capacity(data.len() / 2);
                let mut encoder = Lz4EncoderBuilder::new().level(*level).build(&mut output)?;
                encoder.write_all(data)?;
                let (_, result) = encoder.finish();
                result?;
                Ok(output)
            }
        }
    }

    /// Decompresses the given `data` and returns it.
    ///
    /// `size_hint` is the expected size of the decompressed data.
    pub(crate) fn decompress(&self, data: &[u8], size_hint: usize) -> io::Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            #[cfg(feature = "compression")]
            Compression::Lz4 { .. } => {
                let mut output = Vec::with_capacity(size_hint);
                let mut decoder = Lz4Decoder::new(data)?;
                decoder.read_to_end(&mut output)?;
                let (_, result) = decoder.finish();
                result?;
                Ok(output)
            }
        }
    }
}
