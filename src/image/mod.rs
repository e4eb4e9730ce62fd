//! Image reader/writer: byte-exact snapshot and restore of the object
//! table.
//!
//! Layout: a version header (the tagged `SmallInt` `3`), then one
//! record per non-available slot in ascending index order — its index,
//! its metadata (everything but the buffer itself), then the buffer's
//! raw bytes verbatim. Reading stops at EOF; any slot index not seen is
//! rebuilt as available, via [`ObjectTable::from_entries`].
//!
//! `chunk` is the external bootstrap-text reader, a separate concern
//! layered on the method compiler's `parse` entry point.

pub mod chunk;

use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::object::{decode_word, encode_word, Entry, ObjectTable, Ref, Scale};

const VERSION: i32 = 3;

fn write_word(w: &mut impl Write, r: Ref) -> io::Result<()> {
  w.write_all(&encode_word(r))
}

fn read_word(r: &mut impl Read) -> io::Result<Ref> {
  let mut buf = [0u8; 4];
  r.read_exact(&mut buf)?;
  Ok(decode_word(&buf))
}

/// Try to read one tagged word, treating a clean EOF (zero bytes read)
/// as "no more records" rather than an error.
fn try_read_word(r: &mut impl Read) -> io::Result<Option<Ref>> {
  let mut buf = [0u8; 4];
  let mut filled = 0;
  loop {
    match r.read(&mut buf[filled..])? {
      0 if filled == 0 => return Ok(None),
      0 => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated image record")),
      n => {
        filled += n;
        if filled == 4 {
          return Ok(Some(decode_word(&buf)));
        }
      }
    }
  }
}

fn scale_tag(s: Scale) -> u8 {
  match s {
    Scale::Byte => 0,
    Scale::Halfword => 1,
    Scale::Word => 2,
  }
}

fn scale_from_tag(tag: u8) -> Result<Scale> {
  Ok(match tag {
    0 => Scale::Byte,
    1 => Scale::Halfword,
    2 => Scale::Word,
    _ => return Err(Error::ImageLoad(format!("bad scale tag {tag}"))),
  })
}

/// Write `table` to `w`: version header, then every live slot ascending.
pub fn write_image(table: &ObjectTable, w: &mut impl Write) -> Result<()> {
  write_word(w, Ref::Int(VERSION)).map_err(Error::Io)?;
  for (index, entry) in table.live_entries() {
    write_word(w, Ref::Int(index as i32)).map_err(Error::Io)?;
    write_word(w, Ref::Int(entry.size_bytes as i32)).map_err(Error::Io)?;
    w.write_all(&[scale_tag(entry.scale)]).map_err(Error::Io)?;
    w.write_all(&[entry.has_refs as u8]).map_err(Error::Io)?;
    write_word(w, entry.class).map_err(Error::Io)?;
    if let Some(buf) = &entry.buf {
      w.write_all(buf).map_err(Error::Io)?;
    }
  }
  Ok(())
}

/// Read an image from `r`, rebuilding a fresh [`ObjectTable`].
pub fn read_image(r: &mut impl Read) -> Result<ObjectTable> {
  let version = read_word(r).map_err(Error::Io)?;
  if version != Ref::Int(VERSION) {
    return Err(Error::ImageLoad(format!("unsupported image version {version:?}")));
  }

  let mut slots: Vec<(u32, Entry)> = Vec::new();
  while let Some(index_ref) = try_read_word(r).map_err(Error::Io)? {
    let index = index_ref.as_int().ok_or_else(|| Error::ImageLoad("slot index is not a SmallInt".into()))? as u32;
    let size_bytes = read_word(r).map_err(Error::Io)?.as_int().ok_or_else(|| Error::ImageLoad("bad size_bytes".into()))? as usize;
    let mut tag = [0u8; 2];
    r.read_exact(&mut tag).map_err(Error::Io)?;
    let scale = scale_from_tag(tag[0])?;
    let has_refs = tag[1] != 0;
    let class = read_word(r).map_err(Error::Io)?;
    let mut buf = vec![0u8; size_bytes];
    r.read_exact(&mut buf).map_err(Error::Io)?;
    slots.push((
      index,
      Entry {
        buf: Some(buf),
        size_bytes,
        scale,
        has_refs,
        marked: false,
        volatile: false,
        avail: false,
        class,
      },
    ));
  }

  let max_index = slots.iter().map(|(i, _)| *i).max().unwrap_or(0);
  let mut entries: Vec<Entry> = (0..=max_index)
    .map(|_| Entry {
      buf: None,
      size_bytes: 0,
      scale: Scale::Byte,
      has_refs: false,
      marked: false,
      volatile: false,
      avail: true,
      class: crate::object::NIL,
    })
    .collect();
  for (index, entry) in slots {
    entries[index as usize] = entry;
  }
  // slot 0 is always the free-list sentinel, never a real object
  entries[0].avail = true;

  Ok(ObjectTable::from_entries(entries))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::object::ObjectTable;

  #[test]
  fn roundtrip_preserves_live_slots() {
    let mut table = ObjectTable::new();
    let a = table.alloc_ref(2).unwrap().as_oop().unwrap();
    table.set_ref_elem(a, 0, Ref::Int(42));

    let mut bytes = Vec::new();
    write_image(&table, &mut bytes).unwrap();
    let restored = read_image(&mut &bytes[..]).unwrap();

    assert_eq!(restored.get_ref_elem(a, 0), Ref::Int(42));
    assert_eq!(restored.element_count(a), 2);
  }

  #[test]
  fn roundtrip_rebuilds_free_list() {
    let mut table = ObjectTable::new();
    table.alloc_ref(0).unwrap();
    table.alloc_ref(0).unwrap();
    table.alloc_ref(0).unwrap();
    assert_eq!(crate::object::new_dictionary(&mut table, crate::object::DEFAULT_BUCKETS).unwrap(), crate::object::SYMBOLS);
    assert_eq!(crate::object::new_dictionary(&mut table, crate::object::DEFAULT_BUCKETS).unwrap(), crate::object::GLOBALS);

    let a = table.alloc_byte(4).unwrap().as_oop().unwrap();
    let b = table.alloc_byte(4).unwrap().as_oop().unwrap();
    table.collect(false); // both volatile, neither rooted by symbols: both freed
    let _ = (a, b);

    let mut bytes = Vec::new();
    write_image(&table, &mut bytes).unwrap();
    let restored = read_image(&mut &bytes[..]).unwrap();
    assert!(restored.free_count() >= table.free_count());
  }

  #[test]
  fn rejects_bad_version() {
    let bytes = encode_word(Ref::Int(99));
    let err = read_image(&mut &bytes[..]);
    assert!(err.is_err());
  }
}
