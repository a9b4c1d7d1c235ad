//! The `Data` container: a document's stored body as a header-tagged
//! sequence of `Locator`s. Mirrors the original server's `data.h` framing —
//! inline content for small bodies, `(volume, offset, size)` pointers into
//! an external blob volume for large ones — so untouched content-type slots
//! survive a partial update.

use crate::core::error::{Error, Result};

const LOCATOR_START: u8 = 0x11;
const LOCATOR_END: u8 = 0x15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorType {
    Inplace,
    Stored,
}

/// Either the bytes themselves (`Inplace`) or a pointer into a blob volume
/// (`Stored`): `(volume, offset, size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorBody {
    Inline(Vec<u8>),
    External { volume: u32, offset: u64, size: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub locator_type: LocatorType,
    pub ct_type: String,
    pub body: LocatorBody,
}

impl Locator {
    pub fn inline(ct_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Locator {
            locator_type: LocatorType::Inplace,
            ct_type: ct_type.into(),
            body: LocatorBody::Inline(bytes),
        }
    }

    pub fn stored(ct_type: impl Into<String>, volume: u32, offset: u64, size: u64) -> Self {
        Locator {
            locator_type: LocatorType::Stored,
            ct_type: ct_type.into(),
            body: LocatorBody::External { volume, offset, size },
        }
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        out.push(LOCATOR_START);
        out.push(match self.locator_type {
            LocatorType::Inplace => 0,
            LocatorType::Stored => 1,
        });
        write_length_prefixed(out, self.ct_type.as_bytes());
        match &self.body {
            LocatorBody::Inline(bytes) => {
                out.push(0);
                write_length_prefixed(out, bytes);
            }
            LocatorBody::External { volume, offset, size } => {
                out.push(1);
                out.extend_from_slice(&volume.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&size.to_le_bytes());
            }
        }
        out.push(LOCATOR_END);
    }

    fn deserialize_from(cursor: &mut &[u8]) -> Result<Self> {
        if take_byte(cursor)? != LOCATOR_START {
            return Err(Error::new(
                crate::core::error::ErrorKind::Serialisation,
                "missing locator start marker".to_string(),
            ));
        }
        let locator_type = match take_byte(cursor)? {
            0 => LocatorType::Inplace,
            1 => LocatorType::Stored,
            other => {
                return Err(Error::new(
                    crate::core::error::ErrorKind::Serialisation,
                    format!("unknown locator type tag {other}"),
                ))
            }
        };
        let ct_type = String::from_utf8(read_length_prefixed(cursor)?)
            .map_err(|e| Error::new(crate::core::error::ErrorKind::Serialisation, e.to_string()))?;
        let body = match take_byte(cursor)? {
            0 => LocatorBody::Inline(read_length_prefixed(cursor)?),
            1 => {
                let volume = u32::from_le_bytes(take_array::<4>(cursor)?);
                let offset = u64::from_le_bytes(take_array::<8>(cursor)?);
                let size = u64::from_le_bytes(take_array::<8>(cursor)?);
                LocatorBody::External { volume, offset, size }
            }
            other => {
                return Err(Error::new(
                    crate::core::error::ErrorKind::Serialisation,
                    format!("unknown locator body tag {other}"),
                ))
            }
        };
        if take_byte(cursor)? != LOCATOR_END {
            return Err(Error::new(
                crate::core::error::ErrorKind::Serialisation,
                "missing locator end marker".to_string(),
            ));
        }
        Ok(Locator { locator_type, ct_type, body })
    }
}

fn write_length_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn take_byte(cursor: &mut &[u8]) -> Result<u8> {
    let (first, rest) = cursor
        .split_first()
        .ok_or_else(|| Error::new(crate::core::error::ErrorKind::Serialisation, "truncated data container".to_string()))?;
    *cursor = rest;
    Ok(*first)
}

fn take_array<const N: usize>(cursor: &mut &[u8]) -> Result<[u8; N]> {
    if cursor.len() < N {
        return Err(Error::new(crate::core::error::ErrorKind::Serialisation, "truncated data container".to_string()));
    }
    let mut buf = [0u8; N];
    buf.copy_from_slice(&cursor[..N]);
    *cursor = &cursor[N..];
    Ok(buf)
}

fn read_length_prefixed(cursor: &mut &[u8]) -> Result<Vec<u8>> {
    let len = u32::from_le_bytes(take_array::<4>(cursor)?) as usize;
    if cursor.len() < len {
        return Err(Error::new(crate::core::error::ErrorKind::Serialisation, "truncated data container".to_string()));
    }
    let bytes = cursor[..len].to_vec();
    *cursor = &cursor[len..];
    Ok(bytes)
}

/// A document's full stored body: zero or more locators, keyed by content
/// type on lookup (one locator per distinct `ct_type`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Data {
    locators: Vec<Locator>,
}

impl Data {
    pub fn new() -> Self {
        Data { locators: Vec::new() }
    }

    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }

    pub fn get(&self, ct_type: &str) -> Option<&Locator> {
        self.locators.iter().find(|l| l.ct_type == ct_type)
    }

    /// Insert or replace the locator for this content type.
    pub fn put(&mut self, locator: Locator) {
        if let Some(existing) = self.locators.iter_mut().find(|l| l.ct_type == locator.ct_type) {
            *existing = locator;
        } else {
            self.locators.push(locator);
        }
    }

    /// Merge `self` over `old`: any content type `self` doesn't touch keeps
    /// its locator from `old`, matching the update-preserves-untouched-slots
    /// rule for `_data`.
    pub fn merge_over(mut self, old: &Data) -> Data {
        for locator in &old.locators {
            if self.get(&locator.ct_type).is_none() {
                self.locators.push(locator.clone());
            }
        }
        self
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.locators.len() as u32).to_le_bytes());
        for locator in &self.locators {
            locator.serialize_into(&mut out);
        }
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Data> {
        let mut cursor = bytes;
        let count = u32::from_le_bytes(take_array::<4>(&mut cursor)?) as usize;
        let mut locators = Vec::with_capacity(count);
        for _ in 0..count {
            locators.push(Locator::deserialize_from(&mut cursor)?);
        }
        Ok(Data { locators })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_inline_and_external_locators() {
        let mut data = Data::new();
        data.put(Locator::inline("application/json", br#"{"a":1}"#.to_vec()));
        data.put(Locator::stored("image/png", 3, 1024, 2048));

        let bytes = data.serialize();
        let restored = Data::deserialize(&bytes).unwrap();
        assert_eq!(restored, data);
        assert_eq!(restored.get("application/json").unwrap().locator_type, LocatorType::Inplace);
        assert_eq!(restored.get("image/png").unwrap().locator_type, LocatorType::Stored);
    }

    #[test]
    fn merge_preserves_untouched_content_types() {
        let mut old = Data::new();
        old.put(Locator::inline("application/json", b"old".to_vec()));
        old.put(Locator::inline("image/png", b"binary".to_vec()));

        let mut new_data = Data::new();
        new_data.put(Locator::inline("application/json", b"new".to_vec()));

        let merged = new_data.merge_over(&old);
        assert_eq!(merged.get("application/json").unwrap().body, LocatorBody::Inline(b"new".to_vec()));
        assert_eq!(merged.get("image/png").unwrap().body, LocatorBody::Inline(b"binary".to_vec()));
    }
}
