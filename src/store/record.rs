//! Record - the unit written to the file store

/// Stored uncompressed
const FLAG_RAW: u8 = 0;
/// Stored as a zstd frame
const FLAG_ZSTD: u8 = 1;

/// A value as it is laid out on disk: a flag byte followed by the
/// (possibly compressed) bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Raw data (uncompressed)
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(data: Vec<u8>) -> Self {
        Record { data }
    }

    /// Encode for storage. Data of at least `threshold` bytes is compressed
    /// with zstd at `level`, unless that does not make it smaller.
    pub fn encode(&self, level: i32, threshold: usize) -> crate::Result<Vec<u8>> {
        if self.data.len() >= threshold {
            let compressed = zstd::encode_all(self.data.as_slice(), level)?;
            if compressed.len() < self.data.len() {
                let mut output = Vec::with_capacity(compressed.len() + 1);
                output.push(FLAG_ZSTD);
                output.extend(compressed);
                return Ok(output);
            }
        }

        let mut output = Vec::with_capacity(self.data.len() + 1);
        output.push(FLAG_RAW);
        output.extend_from_slice(&self.data);
        Ok(output)
    }

    /// Decode a record read from storage
    pub fn decode(data: &[u8]) -> crate::Result<Self> {
        let (flag, body) = data
            .split_first()
            .ok_or_else(|| crate::Error::Corruption("Empty record data".into()))?;

        let data = match *flag {
            FLAG_RAW => body.to_vec(),
            FLAG_ZSTD => zstd::decode_all(body)?,
            other => {
                return Err(crate::Error::Corruption(format!(
                    "Invalid record flag: {}",
                    other
                )))
            }
        };

        Ok(Record { data })
    }

    /// Get the size of the uncompressed data
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
