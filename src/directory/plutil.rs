use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use plist::Value;

use crate::arch::runner::CommandRunner;
use crate::arch::ShellCommand;
use crate::error::Result;

/// `plutil`, used for the formats the OS tooling insists on.
pub struct Plutil {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl Plutil {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>> {
        let cmd = ShellCommand::with_args(self.program.clone(), args.iter().copied());
        self.runner.run(&cmd, stdin)
    }

    /// Serialize `value` as XML and let plutil turn it into a binary plist.
    pub fn convert_xml_to_binary(&self, value: &Value) -> Result<Vec<u8>> {
        let mut xml = Vec::new();
        value.to_writer_xml(&mut xml)?;
        self.run(&["-convert", "binary1", "-o", "-", "-"], Some(&xml))
    }

    /// Convert a binary plist to XML with plutil and parse the result.
    pub fn convert_binary_to_xml(&self, binary: &[u8]) -> Result<Value> {
        let xml = self.run(&["-convert", "xml1", "-o", "-", "-"], Some(binary))?;
        Ok(Value::from_reader_xml(Cursor::new(xml))?)
    }

    /// Read a (usually binary) plist file as XML and parse it.
    pub fn read_plist_file(&self, path: &Path) -> Result<Value> {
        let path = path.to_string_lossy();
        let xml = self.run(&["-convert", "xml1", "-o", "/dev/stdout", &path], None)?;
        Ok(Value::from_reader_xml(Cursor::new(xml))?)
    }
}
