use std::sync::Mutex;

use crate::arch::runner::CommandRunner;
use crate::arch::ShellCommand;
use crate::error::{Error, Result};

type Responder = Box<dyn Fn(&[u8]) -> Vec<u8> + Send>;

enum Reply {
    Stdout(Vec<u8>),
    Respond(Responder),
    Fail(String),
}

struct Expectation {
    args: Vec<String>,
    reply: Reply,
}

#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

/// `CommandRunner` that answers from a script keyed on the argument list.
///
/// Each expectation is consumed once. Calls with no matching expectation panic, so a
/// test fails loudly when the provider issues a command it shouldn't.
#[derive(Default)]
pub struct ScriptedRunner {
    expectations: Mutex<Vec<Expectation>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(&self, args: &[&str], stdout: impl Into<Vec<u8>>) {
        self.push(args, Reply::Stdout(stdout.into()));
    }

    /// Answer with whatever `respond` makes of the command's stdin.
    pub fn expect_with(&self, args: &[&str], respond: impl Fn(&[u8]) -> Vec<u8> + Send + 'static) {
        self.push(args, Reply::Respond(Box::new(respond)));
    }

    pub fn expect_failure(&self, args: &[&str], stderr: &str) {
        self.push(args, Reply::Fail(stderr.to_string()));
    }

    fn push(&self, args: &[&str], reply: Reply) {
        self.expectations.lock().unwrap().push(Expectation {
            args: args.iter().map(|a| a.to_string()).collect(),
            reply,
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn assert_done(&self) {
        let remaining: Vec<Vec<String>> = self
            .expectations
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.args.clone())
            .collect();
        assert!(remaining.is_empty(), "expected commands never ran: {remaining:?}");
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &ShellCommand, stdin: Option<&[u8]>) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(RecordedCall {
            program: cmd.program.clone(),
            args: cmd.args.clone(),
            stdin: stdin.map(<[u8]>::to_vec),
        });

        let mut expectations = self.expectations.lock().unwrap();
        let position = expectations
            .iter()
            .position(|e| e.args == cmd.args)
            .unwrap_or_else(|| panic!("unexpected command: {}", cmd.display()));
        match expectations.remove(position).reply {
            Reply::Stdout(out) => Ok(out),
            Reply::Respond(respond) => Ok(respond(stdin.unwrap_or_default())),
            Reply::Fail(stderr) => Err(Error::CommandFailed {
                program: cmd.program.clone(),
                status: "exit status: 1".to_string(),
                stderr,
            }),
        }
    }
}

/// Fixtures captured from real 10.7 and 10.8 hosts.
pub mod fixtures {
    /// `dsAttrTypeNative:ShadowHashData` as `dscl -plist` prints it on 10.7.
    pub const SHA512_SHADOWHASHDATA: &str = concat!(
        "62706c69 73743030 d101025d 53414c54 45442d53 48413531 324f1044 7ea7d592 ",
        "131f57b2 c8f8bdbc ec8d9df1 2128a386 393a4f00 c7619bac 2622a44d 451419d1 ",
        "1da512d5 915ab98e 39718ac9 4083fe2e fd6bf710 a54d477f 8ff735b1 2587192d ",
        "080b1900 00000000 00010100 00000000 00000300 00000000 00000000 00000000 ",
        "000060",
    );

    pub const SHA512_PASSWORD_HASH: &str = concat!(
        "7ea7d592131f57b2c8f8bdbcec8d9df12128a386393a4f00c7619bac2622a44d",
        "451419d11da512d5915ab98e39718ac94083fe2efd6bf710a54d477f8ff735b1",
        "2587192d",
    );

    /// `dsAttrTypeNative:ShadowHashData` as `dscl -plist` prints it on 10.8.
    pub const PBKDF2_SHADOWHASHDATA: &str = concat!(
        "62706c69 73743030 d101025f 10145341 4c544544 2d534841 3531322d 50424b44 ",
        "4632d303 04050607 0857656e 74726f70 79547361 6c745a69 74657261 74696f6e ",
        "734f1080 0590ade1 9e6953c1 35ae872a e7761823 5df7d46c 63de7f9a 0fcdf2cd ",
        "9e7d85e4 b7ca8681 01235b61 58e05a30 9805ee48 14b027a4 be9c23ec 2926bc81 ",
        "72269aff ba5c9a59 85e81091 fa689807 6d297f1f aa75fa61 7551ef16 71d75200 ",
        "55c4a0d9 7b9b9c58 05aa322b aedbcd8e e9c52381 1653ac2e a9e9c8d8 f1ac519a ",
        "0f2b595e 4f102093 77c46908 a1c8ac2c 3e45c0d4 4da8ad0f cd85ec5c 14d9a59f ",
        "fc40c9da 31f0ec11 60b0080b 22293136 41c4e700 00000000 00010100 00000000 ",
        "00000900 00000000 00000000 00000000 0000ea",
    );

    pub const PBKDF2_PASSWORD_HASH: &str = concat!(
        "0590ade19e6953c135ae872ae77618235df7d46c63de7f9a0fcdf2cd9e7d85e4",
        "b7ca868101235b6158e05a309805ee4814b027a4be9c23ec2926bc8172269aff",
        "ba5c9a5985e81091fa6898076d297f1faa75fa617551ef1671d7520055c4a0d9",
        "7b9b9c5805aa322baedbcd8ee9c523811653ac2ea9e9c8d8f1ac519a0f2b595e",
    );

    pub const PBKDF2_SALT: &str = "9377c46908a1c8ac2c3e45c0d44da8ad0fcd85ec5c14d9a59ffc40c9da31f0ec";

    pub const PBKDF2_ITERATIONS: u64 = 24752;

    /// `plutil -convert xml1` of a 10.7 dslocal user record.
    pub const SHA512_USERS_PLIST_XML: &str = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
        "<plist version=\"1.0\">\n",
        "<dict>\n",
        "\t<key>KerberosKeys</key>\n",
        "\t<array>\n",
        "\t\t<data>\n",
        "\t\tMIIBS6EDAgEBoIIBQjCCAT4wcKErMCmgAwIBEqEiBCCS/0Im7BAps/YhX/ED\n",
        "\t\tKOpDeSMFkUsu3UzEa6gqDu35BKJBMD+gAwIBA6E4BDZMS0RDOlNIQTEuNDM4\n",
        "\t\tM0UxNTJEOUQzOTRBQTMyRDEzQUU5OEY2RjZFMUZFOEQwMEY4MWplZmYwYKEb\n",
        "\t\tMBmgAwIBEaESBBAk8a3rrFk5mHAdEU5nRgFwokEwP6ADAgEDoTgENkxLREM6\n",
        "\t\tU0hBMS40MzgzRTE1MkQ5RDM5NEFBMzJEMTNBRTk4RjZGNkUxRkU4RDAwRjgx\n",
        "\t\tamVmZjBooSMwIaADAgEQoRoEGFg71irsV+9ddRNPSn9houo3Q6jZuj55XaJB\n",
        "\t\tMD+gAwIBA6E4BDZMS0RDOlNIQTEuNDM4M0UxNTJEOUQzOTRBQTMyRDEzQUU5\n",
        "\t\tOEY2RjZFMUZFOEQwMEY4MWplZmY=\n",
        "\t\t</data>\n",
        "\t</array>\n",
        "\t<key>ShadowHashData</key>\n",
        "\t<array>\n",
        "\t\t<data>\n",
        "\t\tYnBsaXN0MDDRAQJdU0FMVEVELVNIQTUxMk8QRFNL0iuruijP6becUWe43GTX\n",
        "\t\t5WTgOTi2emx41DMnwnB4vbKieVOE4eNHiyocX5c0GX1LWJ6VlZqZ9EnDLsuA\n",
        "\t\tNC5Ga9qlCAsZAAAAAAAAAQEAAAAAAAAAAwAAAAAAAAAAAAAAAAAAAGA=\n",
        "\t\t</data>\n",
        "\t</array>\n",
        "\t<key>authentication_authority</key>\n",
        "\t<array>\n",
        "\t\t<string>;Kerberosv5;;jeff@LKDC:SHA1.4383E152D9D394AA32D13AE98F6F6E1FE8D00F81;LKDC:SHA1.4383E152D9D394AA32D13AE98F6F6E1FE8D00F81</string>\n",
        "\t\t<string>;ShadowHash;HASHLIST:&lt;SALTED-SHA512&gt;</string>\n",
        "\t</array>\n",
        "\t<key>dsAttrTypeStandard:ShadowHashData</key>\n",
        "\t<array>\n",
        "\t\t<data>\n",
        "\t\tYnBsaXN0MDDRAQJdU0FMVEVELVNIQTUxMk8QRH6n1ZITH1eyyPi9vOyNnfEh\n",
        "\t\tKKOGOTpPAMdhm6wmIqRNRRQZ0R2lEtWRWrmOOXGKyUCD/i79a/cQpU1Hf4/3\n",
        "\t\tNbElhxktCAsZAAAAAAAAAQEAAAAAAAAAAwAAAAAAAAAAAAAAAAAAAGA=\n",
        "\t\t</data>\n",
        "\t</array>\n",
        "\t<key>generateduid</key>\n",
        "\t<array>\n",
        "\t\t<string>3AC74939-C14F-45DD-B6A9-D1A82373F0B0</string>\n",
        "\t</array>\n",
        "\t<key>name</key>\n",
        "\t<array>\n",
        "\t\t<string>jeff</string>\n",
        "\t</array>\n",
        "\t<key>passwd</key>\n",
        "\t<array>\n",
        "\t\t<string>********</string>\n",
        "\t</array>\n",
        "\t<key>passwordpolicyoptions</key>\n",
        "\t<array>\n",
        "\t\t<data>\n",
        "\t\tPD94bWwgdmVyc2lvbj0iMS4wIiBlbmNvZGluZz0iVVRGLTgiPz4KPCFET0NU\n",
        "\t\tWVBFIHBsaXN0IFBVQkxJQyAiLS8vQXBwbGUvL0RURCBQTElTVCAxLjAvL0VO\n",
        "\t\tIiAiaHR0cDovL3d3dy5hcHBsZS5jb20vRFREcy9Qcm9wZXJ0eUxpc3QtMS4w\n",
        "\t\tLmR0ZCI+CjxwbGlzdCB2ZXJzaW9uPSIxLjAiPgo8ZGljdD4KCTxrZXk+ZmFp\n",
        "\t\tbGVkTG9naW5Db3VudDwva2V5PgoJPGludGVnZXI+MDwvaW50ZWdlcj4KCTxr\n",
        "\t\tZXk+ZmFpbGVkTG9naW5UaW1lc3RhbXA8L2tleT4KCTxkYXRlPjIwMDEtMDEt\n",
        "\t\tMDFUMDA6MDA6MDBaPC9kYXRlPgoJPGtleT5sYXN0TG9naW5UaW1lc3RhbXA8\n",
        "\t\tL2tleT4KCTxkYXRlPjIwMDEtMDEtMDFUMDA6MDA6MDBaPC9kYXRlPgoJPGtl\n",
        "\t\teT5wYXNzd29yZFRpbWVzdGFtcDwva2V5PgoJPGRhdGU+MjAxMi0wOC0xMVQw\n",
        "\t\tMDozNTo1MFo8L2RhdGU+CjwvZGljdD4KPC9wbGlzdD4K\n",
        "\t\t</data>\n",
        "\t</array>\n",
        "\t<key>uid</key>\n",
        "\t<array>\n",
        "\t\t<string>28</string>\n",
        "\t</array>\n",
        "</dict>\n",
        "</plist>",
    );

    /// `plutil -convert xml1` of a 10.8 dslocal user record.
    pub const PBKDF2_USERS_PLIST_XML: &str = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
        "<plist version=\"1.0\">\n",
        "<dict>\n",
        "\t<key>KerberosKeys</key>\n",
        "\t<array>\n",
        "\t\t<data>\n",
        "\t\tMIIBS6EDAgEBoIIBQjCCAT4wcKErMCmgAwIBEqEiBCDrboPy0gxu7oTZR/Pc\n",
        "\t\tYdCBC9ivXo1k05gt036/aNe5VqJBMD+gAwIBA6E4BDZMS0RDOlNIQTEuNDEz\n",
        "\t\tQTMwRjU5MEVFREM3ODdENTMyOTgxODUwQTk3NTI0NUIwQTcyM2plZmYwYKEb\n",
        "\t\tMBmgAwIBEaESBBCm02SYYdsxo2fiDP4KuPtmokEwP6ADAgEDoTgENkxLREM6\n",
        "\t\tU0hBMS40MTNBMzBGNTkwRUVEQzc4N0Q1MzI5ODE4NTBBOTc1MjQ1QjBBNzIz\n",
        "\t\tamVmZjBooSMwIaADAgEQoRoEGHPBc7Dg7zjaE8g+YXObwupiBLMIlCrN5aJB\n",
        "\t\tMD+gAwIBA6E4BDZMS0RDOlNIQTEuNDEzQTMwRjU5MEVFREM3ODdENTMyOTgx\n",
        "\t\tODUwQTk3NTI0NUIwQTcyM2plZmY=\n",
        "\t\t</data>\n",
        "\t</array>\n",
        "\t<key>ShadowHashData</key>\n",
        "\t<array>\n",
        "\t\t<data>\n",
        "\t\tYnBsaXN0MDDRAQJfEBRTQUxURUQtU0hBNTEyLVBCS0RGMtMDBAUGBwhXZW50\n",
        "\t\tcm9weVRzYWx0Wml0ZXJhdGlvbnNPEIAFkK3hnmlTwTWuhyrndhgjXffUbGPe\n",
        "\t\tf5oPzfLNnn2F5LfKhoEBI1thWOBaMJgF7kgUsCekvpwj7CkmvIFyJpr/ulya\n",
        "\t\tWYXoEJH6aJgHbSl/H6p1+mF1Ue8WcddSAFXEoNl7m5xYBaoyK67bzY7pxSOB\n",
        "\t\tFlOsLqnpyNjxrFGaDytZXk8QIJN3xGkIocisLD5FwNRNqK0PzYXsXBTZpZ/8\n",
        "\t\tQMnaMfDsEWCwCAsiKTE2QcTnAAAAAAAAAQEAAAAAAAAACQAAAAAAAAAAAAAA\n",
        "\t\tAAAAAOo=\n",
        "\t\t</data>\n",
        "\t</array>\n",
        "\t<key>authentication_authority</key>\n",
        "\t<array>\n",
        "\t\t<string>;Kerberosv5;;jeff@LKDC:SHA1.413A30F590EEDC787D532981850A975245B0A723;LKDC:SHA1.413A30F590EEDC787D532981850A975245B0A723</string>\n",
        "\t\t<string>;ShadowHash;HASHLIST:&lt;SALTED-SHA512-PBKDF2&gt;</string>\n",
        "\t</array>\n",
        "\t<key>generateduid</key>\n",
        "\t<array>\n",
        "\t\t<string>1CB825D1-2DF7-43CC-B874-DB6BBB76C402</string>\n",
        "\t</array>\n",
        "\t<key>gid</key>\n",
        "\t<array>\n",
        "\t\t<string>21</string>\n",
        "\t</array>\n",
        "\t<key>name</key>\n",
        "\t<array>\n",
        "\t\t<string>jeff</string>\n",
        "\t</array>\n",
        "\t<key>passwd</key>\n",
        "\t<array>\n",
        "\t\t<string>********</string>\n",
        "\t</array>\n",
        "\t<key>passwordpolicyoptions</key>\n",
        "\t<array>\n",
        "\t\t<data>\n",
        "\t\tPD94bWwgdmVyc2lvbj0iMS4wIiBlbmNvZGluZz0iVVRGLTgiPz4KPCFET0NU\n",
        "\t\tWVBFIHBsaXN0IFBVQkxJQyAiLS8vQXBwbGUvL0RURCBQTElTVCAxLjAvL0VO\n",
        "\t\tIiAiaHR0cDovL3d3dy5hcHBsZS5jb20vRFREcy9Qcm9wZXJ0eUxpc3QtMS4w\n",
        "\t\tLmR0ZCI+CjxwbGlzdCB2ZXJzaW9uPSIxLjAiPgo8ZGljdD4KCTxrZXk+ZmFp\n",
        "\t\tbGVkTG9naW5Db3VudDwva2V5PgoJPGludGVnZXI+MDwvaW50ZWdlcj4KCTxr\n",
        "\t\tZXk+ZmFpbGVkTG9naW5UaW1lc3RhbXA8L2tleT4KCTxkYXRlPjIwMDEtMDEt\n",
        "\t\tMDFUMDA6MDA6MDBaPC9kYXRlPgoJPGtleT5sYXN0TG9naW5UaW1lc3RhbXA8\n",
        "\t\tL2tleT4KCTxkYXRlPjIwMDEtMDEtMDFUMDA6MDA6MDBaPC9kYXRlPgoJPGtl\n",
        "\t\teT5wYXNzd29yZExhc3RTZXRUaW1lPC9rZXk+Cgk8ZGF0ZT4yMDEyLTA3LTI1\n",
        "\t\tVDE4OjQ3OjU5WjwvZGF0ZT4KPC9kaWN0Pgo8L3BsaXN0Pgo=\n",
        "\t\t</data>\n",
        "\t</array>\n",
        "\t<key>uid</key>\n",
        "\t<array>\n",
        "\t\t<string>28</string>\n",
        "\t</array>\n",
        "</dict>\n",
        "</plist>",
    );

    /// `dscl -plist . readall /Users` with a single record.
    pub const USER_PLIST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>dsAttrTypeStandard:NFSHomeDirectory</key>
	<array>
	<string>/Users/testuser</string>
	</array>
	<key>dsAttrTypeStandard:RealName</key>
	<array>
	<string>testuser</string>
	</array>
	<key>dsAttrTypeStandard:PrimaryGroupID</key>
	<array>
	<string>22</string>
	</array>
	<key>dsAttrTypeStandard:UniqueID</key>
	<array>
	<string>1000</string>
	</array>
	<key>dsAttrTypeStandard:RecordName</key>
	<array>
	<string>testuser</string>
	</array>
</dict>
</plist>
"#;

    pub const EMPTY_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
</dict>
</plist>
"#;

    /// `dscl -plist . readall /Groups` with one group.
    pub const GROUPS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<array>
	<dict>
		<key>dsAttrTypeStandard:AppleMetaNodeLocation</key>
		<array>
			<string>/Local/Default</string>
		</array>
		<key>dsAttrTypeStandard:GeneratedUID</key>
		<array>
			<string>ABCDEFAB-CDEF-ABCD-EFAB-CDEF00000053</string>
		</array>
		<key>dsAttrTypeStandard:Password</key>
		<array>
			<string>*</string>
		</array>
		<key>dsAttrTypeStandard:PrimaryGroupID</key>
		<array>
			<string>83</string>
		</array>
		<key>dsAttrTypeStandard:RealName</key>
		<array>
			<string>SPAM Assassin Group 2</string>
		</array>
		<key>dsAttrTypeStandard:RecordName</key>
		<array>
			<string>_amavisd</string>
			<string>amavisd</string>
		</array>
		<key>dsAttrTypeStandard:RecordType</key>
		<array>
			<string>dsRecTypeStandard:Groups</string>
		</array>
	</dict>
</array>
</plist>
"#;

    /// Wrap a dscl attribute value the way `dscl -plist . read` prints it.
    pub fn dscl_attribute_xml(attribute: &str, values: &[&str]) -> String {
        let mut xml = String::from(concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
            "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
            "<plist version=\"1.0\">\n<dict>\n",
        ));
        xml.push_str(&format!("\t<key>{attribute}</key>\n\t<array>\n"));
        for value in values {
            xml.push_str(&format!("\t\t<string>{value}</string>\n"));
        }
        xml.push_str("\t</array>\n</dict>\n</plist>\n");
        xml
    }
}
