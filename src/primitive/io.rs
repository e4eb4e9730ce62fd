//! File-handle table backing the I/O primitive group.
//!
//! Handles are small integers indexing into a flat vector, mirroring
//! how the object table hands out oops: `0` is always `stdin`, `1`
//! `stdout`, `2` `stderr`, matching the three streams a primitive-level
//! `open:` can otherwise only reach by name.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};

enum Stream {
  Stdin,
  Stdout,
  Stderr,
  File(BufReader<File>, File),
}

pub struct Io {
  streams: Vec<Option<Stream>>,
}

impl Default for Io {
  fn default() -> Self {
    Self::new()
  }
}

impl Io {
  pub fn new() -> Self {
    Io {
      streams: vec![Some(Stream::Stdin), Some(Stream::Stdout), Some(Stream::Stderr)],
    }
  }

  pub fn open(&mut self, name: &str, mode: &str) -> io::Result<i32> {
    let file = match mode {
      "r" => OpenOptions::new().read(true).open(name)?,
      "w" => OpenOptions::new().write(true).create(true).truncate(true).open(name)?,
      "a" => OpenOptions::new().append(true).create(true).open(name)?,
      _ => OpenOptions::new().read(true).write(true).create(true).open(name)?,
    };
    let reader = BufReader::new(file.try_clone()?);
    let slot = self.streams.iter().position(|s| s.is_none());
    let handle = Stream::File(reader, file);
    match slot {
      Some(i) => {
        self.streams[i] = Some(handle);
        Ok(i as i32)
      }
      None => {
        self.streams.push(Some(handle));
        Ok((self.streams.len() - 1) as i32)
      }
    }
  }

  pub fn close(&mut self, handle: i32) {
    if let Some(slot) = self.streams.get_mut(handle as usize) {
      if matches!(slot, Some(Stream::File(..))) {
        *slot = None;
      }
    }
  }

  pub fn read_line(&mut self, handle: i32) -> io::Result<Option<String>> {
    let mut buf = String::new();
    let n = match self.streams.get_mut(handle as usize).and_then(|s| s.as_mut()) {
      Some(Stream::Stdin) => io::stdin().lock().read_line(&mut buf)?,
      Some(Stream::File(reader, _)) => reader.read_line(&mut buf)?,
      _ => return Ok(None),
    };
    if n == 0 {
      return Ok(None);
    }
    while buf.ends_with('\n') || buf.ends_with('\r') {
      buf.pop();
    }
    Ok(Some(buf))
  }

  /// Read up to (and consuming) the next bang-terminated chunk,
  /// un-escaping `!!` to a single `!` as it goes.
  pub fn read_chunk(&mut self, handle: i32) -> io::Result<Option<String>> {
    let mut out = String::new();
    let mut any = false;
    loop {
      let mut byte = [0u8; 1];
      let n = match self.streams.get_mut(handle as usize).and_then(|s| s.as_mut()) {
        Some(Stream::Stdin) => io::stdin().lock().read(&mut byte)?,
        Some(Stream::File(reader, _)) => reader.read(&mut byte)?,
        _ => return Ok(None),
      };
      if n == 0 {
        return Ok(if any { Some(out) } else { None });
      }
      any = true;
      if byte[0] == b'!' {
        let mut next = [0u8; 1];
        let peeked = match self.streams.get_mut(handle as usize).and_then(|s| s.as_mut()) {
          Some(Stream::Stdin) => io::stdin().lock().read(&mut next)?,
          Some(Stream::File(reader, _)) => reader.read(&mut next)?,
          _ => 0,
        };
        if peeked == 1 && next[0] == b'!' {
          out.push('!');
          continue;
        }
        return Ok(Some(out));
      }
      out.push(byte[0] as char);
    }
  }

  pub fn write_chunk(&mut self, handle: i32, text: &str) -> io::Result<()> {
    match self.streams.get_mut(handle as usize).and_then(|s| s.as_mut()) {
      Some(Stream::Stdout) => io::stdout().write_all(text.as_bytes()),
      Some(Stream::Stderr) => io::stderr().write_all(text.as_bytes()),
      Some(Stream::File(_, file)) => file.write_all(text.as_bytes()),
      _ => Ok(()),
    }
  }

  pub fn print(&mut self, text: &str, newline: bool) -> io::Result<()> {
    let mut out = io::stdout().lock();
    out.write_all(text.as_bytes())?;
    if newline {
      out.write_all(b"\n")?;
    }
    Ok(())
  }
}
