use std::sync::Arc;

use tracing::{debug, info};

use crate::arch::runner::CommandRunner;
use crate::arch::ShellCommand;
use crate::directory::{parse_records, AttributeMap, RecordType};
use crate::error::{Error, Result};

/// The local node, `.`.
const LOCAL_NODE: &str = ".";

/// `dscl` against the local directory node.
pub struct Dscl {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl Dscl {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    fn run<I, S>(&self, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cmd = ShellCommand::with_args(self.program.clone(), args);
        self.runner.run(&cmd, None)
    }

    /// `dscl -plist . readall /<Type>`
    pub fn read_all(&self, record_type: RecordType) -> Result<Vec<AttributeMap>> {
        let out = self.run(["-plist", LOCAL_NODE, "readall", record_type.path()])?;
        let records = parse_records(&out)?;
        debug!(path = record_type.path(), count = records.len(), "read directory records");
        Ok(records)
    }

    /// `dscl . read /<Type>/<name>`, raw text output. Fails when the record is absent.
    pub fn read(&self, record_type: RecordType, name: &str) -> Result<String> {
        let path = record_type.record_path(name);
        let out = self.run([LOCAL_NODE, "read", path.as_str()])?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// `dscl -plist . read /<Type>/<name> <attribute>`
    ///
    /// dscl exits non-zero with `No such key` when the record lacks the attribute;
    /// that, and an empty result, are `Error::MissingAttribute`.
    pub fn read_attribute(
        &self,
        record_type: RecordType,
        name: &str,
        attribute: &str,
    ) -> Result<AttributeMap> {
        let path = record_type.record_path(name);
        let out = self
            .run(["-plist", LOCAL_NODE, "read", path.as_str(), attribute])
            .map_err(|e| match e {
                Error::CommandFailed { ref stderr, .. } if stderr.contains("No such key") => {
                    Error::missing(attribute)
                }
                other => other,
            })?;

        parse_records(&out)?
            .into_iter()
            .next()
            .filter(|record| !record.is_empty())
            .ok_or_else(|| Error::missing(attribute))
    }

    /// `dscl . -list /<Type> <key>`, one `name value` pair per line.
    pub fn list(&self, record_type: RecordType, key: &str) -> Result<String> {
        let out = self.run([LOCAL_NODE, "-list", record_type.path(), key])?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn create(&self, record_type: RecordType, name: &str) -> Result<()> {
        let path = record_type.record_path(name);
        self.run([LOCAL_NODE, "-create", path.as_str()])?;
        info!(%path, "created record");
        Ok(())
    }

    /// Add `value` to `key`, leaving values already present alone.
    pub fn merge(&self, record_type: RecordType, name: &str, key: &str, value: &str) -> Result<()> {
        let path = record_type.record_path(name);
        self.run([LOCAL_NODE, "-merge", path.as_str(), key, value])?;
        info!(%path, attribute = key, "merged attribute value");
        Ok(())
    }

    pub fn delete_record(&self, record_type: RecordType, name: &str) -> Result<()> {
        let path = record_type.record_path(name);
        self.run([LOCAL_NODE, "-delete", path.as_str()])?;
        info!(%path, "deleted record");
        Ok(())
    }

    pub fn delete_value(
        &self,
        record_type: RecordType,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let path = record_type.record_path(name);
        self.run([LOCAL_NODE, "-delete", path.as_str(), key, value])?;
        info!(%path, attribute = key, "removed attribute value");
        Ok(())
    }
}
