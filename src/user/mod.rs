//! Local user management on top of `dscl`, `plutil` and the shadow hash codec.

mod resource;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plist::Value;
use tracing::{debug, info, warn};

use crate::arch::os_version::OsVersionProvider;
use crate::arch::paths::user_plist_path;
use crate::arch::runner::CommandRunner;
use crate::arch::tools::{tool_program_checked, Tool};
use crate::config::Config;
use crate::directory::{attribute, first_value, AttributeMap, Dscl, Plutil, RecordType};
use crate::error::{Error, Result};
use crate::shadow::{
    EncodedPassword, FieldValue, HashRecord, LegacyHashStore, OsHashScheme, PasswordHashCodec,
    Pbkdf2Field, Pbkdf2Overrides, ShadowHashPayload, ShadowSource,
};

pub use resource::{UserResource, UserSpec};

const SHADOW_HASH_DATA: &str = "ShadowHashData";
const SHADOW_HASH_AUTHORITY: &str = ";ShadowHash;";

pub struct UserProvider {
    dscl: Dscl,
    plutil: Plutil,
    os_version: Box<dyn OsVersionProvider>,
    legacy: LegacyHashStore,
    config: Config,
}

impl UserProvider {
    pub fn new(
        dscl: Dscl,
        plutil: Plutil,
        os_version: Box<dyn OsVersionProvider>,
        legacy: LegacyHashStore,
        config: Config,
    ) -> Self {
        Self {
            dscl,
            plutil,
            os_version,
            legacy,
            config,
        }
    }

    /// Wire a provider from config, resolving the tool binaries up front.
    pub fn from_config(
        runner: Arc<dyn CommandRunner>,
        os_version: Box<dyn OsVersionProvider>,
        config: Config,
    ) -> Result<Self> {
        let dscl = tool_program_checked(Tool::Dscl, config.dscl.as_deref())?;
        let plutil = tool_program_checked(Tool::Plutil, config.plutil.as_deref())?;
        Ok(Self::new(
            Dscl::new(runner.clone(), dscl),
            Plutil::new(runner, plutil),
            os_version,
            LegacyHashStore::new(&config.legacy_hash_dir),
            config,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The codec for the running OS. Callers fetch it once per operation.
    pub fn codec(&self) -> Result<PasswordHashCodec> {
        let version = self.os_version.os_version()?;
        let codec = PasswordHashCodec::for_version(version)?;
        debug!(%version, scheme = ?codec.scheme(), "selected password hash scheme");
        Ok(codec)
    }

    pub fn get_all_users(&self) -> Result<Vec<AttributeMap>> {
        self.dscl.read_all(RecordType::Users)
    }

    pub fn generate_attribute_hash(&self, record: &AttributeMap) -> Result<UserResource> {
        UserResource::from_record(record)
    }

    /// Every local user. Records without a name are skipped.
    pub fn instances(&self) -> Result<Vec<UserResource>> {
        let mut users = Vec::new();
        for record in self.get_all_users()? {
            match self.generate_attribute_hash(&record) {
                Ok(user) => users.push(user),
                Err(e) => warn!(error = %e, "skipping user record"),
            }
        }
        Ok(users)
    }

    /// One user's resource view, `None` if there is no such user.
    pub fn find(&self, name: &str) -> Result<Option<UserResource>> {
        Ok(self
            .instances()?
            .into_iter()
            .find(|user| user.name == name))
    }

    pub fn exists(&self, name: &str) -> bool {
        match self.dscl.read(RecordType::Users, name) {
            Ok(_) => true,
            Err(e) => {
                debug!(user = name, error = %e, "user lookup failed");
                false
            }
        }
    }

    pub fn create(&self, spec: &UserSpec) -> Result<()> {
        let name = spec.name.as_str();
        check_user_name(name)?;

        // Reject a bad hash before the record exists.
        let codec = match &spec.password {
            Some(hash) => {
                let codec = self.codec()?;
                codec.scheme().validate(hash)?;
                Some(codec)
            }
            None => None,
        };

        let defaults = &self.config.defaults;
        let uid = match spec.uid {
            Some(uid) => uid,
            None => self.next_system_id(defaults.min_uid)?,
        };
        let home = spec
            .home
            .clone()
            .unwrap_or_else(|| defaults.home_root.join(name));

        self.dscl.create(RecordType::Users, name)?;

        let attributes = [
            ("UniqueID", uid.to_string()),
            (
                "RealName",
                spec.comment.clone().unwrap_or_else(|| name.to_string()),
            ),
            (
                "PrimaryGroupID",
                spec.gid.unwrap_or(defaults.gid).to_string(),
            ),
            (
                "UserShell",
                spec.shell.clone().unwrap_or_else(|| defaults.shell.clone()),
            ),
            ("NFSHomeDirectory", home.to_string_lossy().into_owned()),
        ];
        for (key, value) in &attributes {
            self.dscl.merge(RecordType::Users, name, key, value)?;
        }

        if let (Some(hash), Some(codec)) = (&spec.password, codec) {
            self.set_password_with(&codec, name, hash, &spec.password_overrides)?;
        }
        if let Some(groups) = &spec.groups {
            self.set_groups(name, groups, false)?;
        }

        info!(user = name, uid, "created user");
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.dscl.delete_record(RecordType::Users, name)?;
        info!(user = name, "deleted user");
        Ok(())
    }

    /// `dscl -plist . read /<Type>/<name> <attribute>`. An absent attribute is
    /// `Error::MissingAttribute`.
    pub fn get_attribute(
        &self,
        record_type: RecordType,
        name: &str,
        attribute: &str,
    ) -> Result<AttributeMap> {
        self.dscl.read_attribute(record_type, name, attribute)
    }

    fn generated_uid(&self, name: &str) -> Result<Option<String>> {
        match self.get_attribute(RecordType::Users, name, "GeneratedUID") {
            Ok(record) => Ok(first_value(&record, "GeneratedUID").map(str::to_string)),
            Err(Error::MissingAttribute { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_list_of_groups(&self) -> Result<Vec<AttributeMap>> {
        self.dscl.read_all(RecordType::Groups)
    }

    /// Groups the user belongs to, by name (`GroupMembership`) or by GeneratedUID
    /// (`GroupMembers`), sorted and comma-joined.
    pub fn groups(&self, name: &str) -> Result<String> {
        let guid = self.generated_uid(name)?;
        let groups = self.current_groups(name, guid.as_deref())?;
        Ok(groups.into_iter().collect::<Vec<_>>().join(","))
    }

    fn current_groups(&self, name: &str, guid: Option<&str>) -> Result<BTreeSet<String>> {
        let contains = |group: &AttributeMap, attr: &str, value: &str| {
            attribute(group, attr).is_some_and(|values| values.iter().any(|v| v == value))
        };

        Ok(self
            .get_list_of_groups()?
            .iter()
            .filter(|group| {
                contains(group, "GroupMembership", name)
                    || guid.is_some_and(|guid| contains(group, "GroupMembers", guid))
            })
            .filter_map(|group| first_value(group, "RecordName").map(str::to_string))
            .collect())
    }

    /// Add the user to every group in `value` (comma-separated) it is not yet in.
    /// With `inclusive`, also remove it from groups not listed.
    pub fn set_groups(&self, name: &str, value: &str, inclusive: bool) -> Result<()> {
        let guid = self
            .generated_uid(name)?
            .ok_or_else(|| Error::missing("GeneratedUID"))?;
        let wanted: BTreeSet<String> = value
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect();
        let current = self.current_groups(name, Some(&guid))?;

        for group in wanted.difference(&current) {
            self.dscl
                .merge(RecordType::Groups, group, "GroupMembership", name)?;
            self.dscl
                .merge(RecordType::Groups, group, "GroupMembers", &guid)?;
        }

        if inclusive {
            for group in current.difference(&wanted) {
                self.dscl
                    .delete_value(RecordType::Groups, group, "GroupMembership", name)?;
                self.dscl
                    .delete_value(RecordType::Groups, group, "GroupMembers", &guid)?;
            }
        }
        Ok(())
    }

    /// The next free uid at or above `min`: the first free successor of a used id
    /// that lands at or above `min`, walking used ids upwards. Falls back to `min`
    /// when no used id has such a successor.
    pub fn next_system_id(&self, min: u32) -> Result<u32> {
        let listing = self.dscl.list(RecordType::Users, "uid")?;
        let used: BTreeSet<u32> = listing
            .split_whitespace()
            .filter_map(|token| token.parse::<u32>().ok())
            .collect();

        let successor = used
            .range(min.saturating_sub(1)..)
            .filter_map(|id| id.checked_add(1))
            .find(|next| *next >= min && !used.contains(next));
        match successor {
            Some(id) => Ok(id),
            None if !used.contains(&min) => Ok(min),
            None => Err(Error::Validation(format!("no free uid at or above {min}"))),
        }
    }

    /// The user's flat password hash, `None` when none is stored.
    pub fn password(&self, name: &str) -> Result<Option<String>> {
        Ok(self.password_record(name)?.map(|r| r.password_hash()))
    }

    /// One field of the user's PBKDF2 record. `None` when the user has no such
    /// record, including on hosts that don't use PBKDF2.
    pub fn password_field(&self, name: &str, field: &str) -> Result<Option<FieldValue>> {
        let field: Pbkdf2Field = field.parse()?;
        Ok(match self.password_record(name)? {
            Some(HashRecord::SaltedSha512Pbkdf2(record)) => Some(record.field(field)),
            _ => None,
        })
    }

    fn password_record(&self, name: &str) -> Result<Option<HashRecord>> {
        let codec = self.codec()?;
        codec.decode(&DirectoryShadow {
            provider: self,
            name,
        })
    }

    pub fn set_password(&self, name: &str, hash: &str, overrides: &Pbkdf2Overrides) -> Result<()> {
        let codec = self.codec()?;
        self.set_password_with(&codec, name, hash, overrides)
    }

    fn set_password_with(
        &self,
        codec: &PasswordHashCodec,
        name: &str,
        hash: &str,
        overrides: &Pbkdf2Overrides,
    ) -> Result<()> {
        check_user_name(name)?;
        match codec.scheme() {
            OsHashScheme::Sha1 => self.write_sha1_hash(codec, name, hash),
            _ => {
                codec.scheme().validate(hash)?;
                self.write_embedded(codec, name, hash, overrides)
            }
        }
    }

    fn write_sha1_hash(&self, codec: &PasswordHashCodec, name: &str, hash: &str) -> Result<()> {
        let guid = self
            .generated_uid(name)?
            .ok_or_else(|| Error::missing("GeneratedUID"))?;
        if let EncodedPassword::LegacyFile(contents) =
            codec.encode(hash, None, &Pbkdf2Overrides::default())?
        {
            self.legacy.write(&guid, &contents)?;
        }

        let authority = match self.get_attribute(RecordType::Users, name, "AuthenticationAuthority") {
            Ok(record) => attribute(&record, "AuthenticationAuthority")
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            Err(Error::MissingAttribute { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        if !authority.iter().any(|a| a.contains(SHADOW_HASH_AUTHORITY)) {
            self.dscl.merge(
                RecordType::Users,
                name,
                "AuthenticationAuthority",
                SHADOW_HASH_AUTHORITY,
            )?;
        }

        info!(user = name, "set legacy password hash");
        Ok(())
    }

    /// Re-encode the user's `ShadowHashData` in the dslocal user plist.
    pub fn write_password_to_users_plist(
        &self,
        name: &str,
        hash: &str,
        overrides: &Pbkdf2Overrides,
    ) -> Result<()> {
        check_user_name(name)?;
        let codec = self.codec()?;
        self.write_embedded(&codec, name, hash, overrides)
    }

    fn write_embedded(
        &self,
        codec: &PasswordHashCodec,
        name: &str,
        hash: &str,
        overrides: &Pbkdf2Overrides,
    ) -> Result<()> {
        let path = user_plist_path(&self.config.users_plist_dir, name);
        let mut user_plist = self.plutil.read_plist_file(&path)?;
        let existing = self.get_shadow_hash_data(&user_plist)?;

        let payload = match codec.encode(hash, existing, overrides)? {
            EncodedPassword::Embedded(payload) => payload,
            EncodedPassword::LegacyFile(_) => {
                return Err(Error::Validation(
                    "this OS keeps password hashes outside the user plist".to_string(),
                ))
            }
        };

        let record = user_plist.as_dictionary_mut().ok_or_else(|| {
            Error::MalformedShadowHash(format!("{} is not a dictionary", path.display()))
        })?;
        record.insert(
            SHADOW_HASH_DATA.to_string(),
            Value::Array(vec![Value::Data(payload.to_binary()?)]),
        );

        let binary = self.plutil.convert_xml_to_binary(&user_plist)?;
        replace_file(&path, &binary)?;
        info!(user = name, scheme = ?codec.scheme(), "updated password hash");
        Ok(())
    }

    /// The payload under `ShadowHashData` in a parsed user plist, `None` when the key
    /// is absent.
    pub fn get_shadow_hash_data(&self, user_plist: &Value) -> Result<Option<ShadowHashPayload>> {
        let Some(value) = user_plist
            .as_dictionary()
            .and_then(|record| record.get(SHADOW_HASH_DATA))
        else {
            return Ok(None);
        };

        let bytes = match value {
            Value::Array(items) => items.first().and_then(Value::as_data),
            other => other.as_data(),
        };
        match bytes {
            Some(bytes) => ShadowHashPayload::from_plist_bytes(bytes).map(Some),
            None => Err(Error::MalformedShadowHash(
                "ShadowHashData holds no data buffer".to_string(),
            )),
        }
    }
}

/// A user name must be one path component. It names both the dscl record and the
/// dslocal plist file.
fn check_user_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(Error::Validation(format!("invalid user name {name:?}")));
    }
    Ok(())
}

/// Swap `contents` in for `path` through a sibling temp file, keeping the original
/// file's permissions. The original is untouched if any step fails.
fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let written = fs::metadata(path).and_then(|meta| {
        fs::write(&tmp, contents)?;
        fs::set_permissions(&tmp, meta.permissions())?;
        fs::rename(&tmp, path)
    });
    if let Err(e) = written {
        if tmp.exists() {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %cleanup, "could not remove temp plist");
            }
        }
        return Err(e.into());
    }
    Ok(())
}

/// Stored hash material for one user, read through the provider.
struct DirectoryShadow<'a> {
    provider: &'a UserProvider,
    name: &'a str,
}

impl ShadowSource for DirectoryShadow<'_> {
    fn legacy_hash(&self) -> Result<Option<Vec<u8>>> {
        match self.provider.generated_uid(self.name)? {
            Some(guid) => self.provider.legacy.read(&guid),
            None => {
                warn!(user = self.name, "user has no GeneratedUID");
                Ok(None)
            }
        }
    }

    fn shadow_hash_data(&self) -> Result<Option<ShadowHashPayload>> {
        let record =
            match self
                .provider
                .get_attribute(RecordType::Users, self.name, SHADOW_HASH_DATA)
            {
                Ok(record) => record,
                Err(Error::MissingAttribute { .. }) => return Ok(None),
                Err(e) => return Err(e),
            };
        first_value(&record, SHADOW_HASH_DATA)
            .map(ShadowHashPayload::from_dscl_value)
            .transpose()
    }
}
