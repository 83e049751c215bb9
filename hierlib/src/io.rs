use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use thiserror::Error;

/// Reasons a trace can't be replayed
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("couldn't read the trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line} is not valid UTF-8")]
    Encoding { line: usize },
    #[error("line {line}: expected `<hex address> <I|D>`, got `{text}`")]
    Malformed { line: usize, text: String },
}

/// The contents of a trace file, either memory mapped or read into a buffer
pub enum TraceBytes {
    #[cfg(unix)]
    Mapped(memmap2::Mmap),
    Buffered(Vec<u8>),
}

impl Deref for TraceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(unix)]
            TraceBytes::Mapped(m) => &m[..],
            TraceBytes::Buffered(b) => &b[..],
        }
    }
}

/// Opens a trace file for replay
///
/// On unix systems the file is memory mapped, and the OS is told reads will be sequential, which
/// they always are when simulating. Elsewhere it is read into memory
pub fn read_trace(path: impl AsRef<Path>) -> Result<TraceBytes, TraceError> {
    let file = File::open(path)?;
    // Mapping an empty file fails on some systems
    if file.metadata()?.len() == 0 {
        return Ok(TraceBytes::Buffered(Vec::new()));
    }
    #[cfg(not(unix))]
    {
        use std::io::Read;
        let mut buf = Vec::new();
        let mut file = file;
        file.read_to_end(&mut buf)?;
        Ok(TraceBytes::Buffered(buf))
    }
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        // Safety: the trace is only read, and isn't expected to change while the simulator runs
        let m = unsafe { Mmap::map(&file)? };
        m.advise(Advice::Sequential)?;
        Ok(TraceBytes::Mapped(m))
    }
}
