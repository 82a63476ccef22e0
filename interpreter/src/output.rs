use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// In-memory `print` sink. Clones share the same buffer, so one clone can be
/// handed to the interpreter and the other read back afterwards.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
  pub fn new() -> Self {
    OutputBuffer::default()
  }

  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.borrow()).into_owned()
  }

  pub fn lines(&self) -> Vec<String> {
    self.contents().lines().map(str::to_string).collect()
  }
}

impl Write for OutputBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.borrow_mut().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
