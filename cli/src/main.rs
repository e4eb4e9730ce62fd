//! Cold-boot / warm-restart front end.
//!
//! `-c <source-files...>` reads chunk-format source, builds a fresh
//! kernel, and writes it out as `snapshot`. `-w [<image-path>]` loads a
//! previously written image and runs its `systemProcess` global to
//! completion. Both modes append what they processed to `transcript`.
//!
//! Exit codes: `0` clean, `1` image load error or missing
//! `systemProcess`, `2` snapshot write failure.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use lst::bootstrap::{self, Kernel};
use lst::image::{self, chunk};
use lst::{Interpreter, RunResult};

#[derive(Parser)]
#[command(name = "lst", about = "An image-based Smalltalk interpreter")]
struct Args {
  /// Cold-boot from chunk-format source files and write `snapshot`.
  #[arg(short = 'c', long = "cold", num_args = 1.., value_name = "FILE", conflicts_with = "warm")]
  cold: Vec<PathBuf>,

  /// Warm-start from a previously written image (default `systemImage`).
  #[arg(short = 'w', long = "warm", num_args = 0..=1, default_missing_value = "systemImage", value_name = "IMAGE")]
  warm: Option<PathBuf>,
}

const SNAPSHOT_PATH: &str = "snapshot";
const TRANSCRIPT_PATH: &str = "transcript";

fn append_transcript(text: &str) -> anyhow::Result<()> {
  let mut f = fs::OpenOptions::new().create(true).append(true).open(TRANSCRIPT_PATH).context("opening transcript")?;
  f.write_all(text.as_bytes()).context("appending transcript")
}

fn main() -> ExitCode {
  let args = Args::parse();
  let outcome = if !args.cold.is_empty() {
    cold_boot(&args.cold)
  } else if let Some(image_path) = &args.warm {
    warm_start(image_path)
  } else {
    eprintln!("usage: lst -c <source-files...> | -w [<image-path>]");
    return ExitCode::from(1);
  };

  match outcome {
    Ok(()) => ExitCode::from(0),
    Err((code, err)) => {
      eprintln!("{err:?}");
      ExitCode::from(code)
    }
  }
}

fn cold_boot(sources: &[PathBuf]) -> std::result::Result<(), (u8, anyhow::Error)> {
  let mut kernel: Kernel = bootstrap::bootstrap().map_err(|e| (1, e.into()))?;
  let mut transcript = String::new();

  for path in sources {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display())).map_err(|e| (1, e))?;
    let classes = chunk::read_source(&text).with_context(|| format!("parsing chunks in {}", path.display())).map_err(|e| (1, e))?;
    for class in &classes {
      bootstrap::define_class(&mut kernel, &class.superclass, &class.name, &class.instance_vars)
        .with_context(|| format!("defining class {}", class.name))
        .map_err(|e| (1, e))?;
      for method_source in &class.methods {
        bootstrap::define_method(&mut kernel, &class.name, method_source)
          .with_context(|| format!("compiling a method of {}", class.name))
          .map_err(|e| (1, e))?;
      }
    }
    transcript.push_str(&text);
  }

  append_transcript(&transcript).map_err(|e| (1, e))?;

  let mut snapshot = fs::File::create(SNAPSHOT_PATH).map_err(|e| (2, anyhow::Error::new(e)))?;
  image::write_image(&kernel.table, &mut snapshot).map_err(|e| (2, e.into()))?;

  Ok(())
}

fn warm_start(image_path: &PathBuf) -> std::result::Result<(), (u8, anyhow::Error)> {
  let mut file = fs::File::open(image_path)
    .with_context(|| format!("opening image {}", image_path.display()))
    .map_err(|e| (1, e))?;
  let mut table = image::read_image(&mut file).map_err(|e| (1, e.into()))?;

  let classes = bootstrap::resolve_classes(&mut table).map_err(|e| (1, e.into()))?;
  let Some(system_process) = bootstrap::get_global(&mut table, "systemProcess") else {
    return Err((1, anyhow::anyhow!("image has no systemProcess global")));
  };

  let mut interp = Interpreter::new();
  let run_selector = lst::object::intern_symbol(&mut table, "run").map_err(|e| (1, e.into()))?;
  let result = interp
    .send(&mut table, &classes, run_selector, system_process, &[], i64::MAX)
    .map_err(|e| (1, e.into()))?;

  let transcript = match result {
    RunResult::Finished(value) => format!("systemProcess finished: {value:?}\n"),
    RunResult::Suspended => return Err((1, anyhow::anyhow!("systemProcess suspended without finishing"))),
  };
  append_transcript(&transcript).map_err(|e| (1, e))?;

  Ok(())
}
