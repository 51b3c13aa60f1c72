/// Security-descriptor and file-ACL sources backed by the operating system.
///
/// - [`ScSdshowSource`] reads a service's descriptor with `sc.exe sdshow`.
/// - [`NativeFileAclSource`] reads a file's DACL through
///   `GetNamedSecurityInfoW` and resolves each trustee SID to an account
///   name.
///
/// On other platforms both return [`Error::Unsupported`], which the
/// analyzers turn into "not available".
use crate::analysis::{FileAclSource, RawAce, SecurityDescriptorSource};
use crate::error::{Error, Result};
use std::path::Path;
use std::time::Duration;

/// `sc.exe sdshow <service>`.
#[derive(Debug, Clone)]
pub struct ScSdshowSource {
    pub timeout: Duration,
}

impl ScSdshowSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl SecurityDescriptorSource for ScSdshowSource {
    #[cfg(windows)]
    fn service_descriptor(&self, service: &str) -> Result<String> {
        use super::command::{run_with_timeout, SC_EXE};

        let what = format!("sdshow {service}");
        let output = run_with_timeout(SC_EXE, &["sdshow", service], &what, self.timeout)?;
        if !output.success() {
            return Err(Error::query(what, output.combined()));
        }
        first_descriptor_line(&output.stdout).ok_or_else(|| Error::query(what, "empty output"))
    }

    #[cfg(not(windows))]
    fn service_descriptor(&self, service: &str) -> Result<String> {
        let _ = service;
        Err(Error::Unsupported("service security descriptors"))
    }
}

/// `sc sdshow` prints a blank line before the SDDL string.
pub fn first_descriptor_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(ToString::to_string)
}

/// DACL reader using the Win32 security API.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFileAclSource;

impl FileAclSource for NativeFileAclSource {
    #[cfg(windows)]
    fn file_acl(&self, path: &Path) -> Result<Vec<RawAce>> {
        native::read_dacl(path)
    }

    #[cfg(not(windows))]
    fn file_acl(&self, path: &Path) -> Result<Vec<RawAce>> {
        let _ = path;
        Err(Error::Unsupported("file ACL queries"))
    }
}

#[cfg(windows)]
mod native {
    use super::*;
    use std::ffi::c_void;
    use std::os::windows::ffi::OsStrExt;
    use windows::core::{PCWSTR, PWSTR};
    use windows::Win32::Foundation::{LocalFree, ERROR_SUCCESS, HLOCAL};
    use windows::Win32::Security::Authorization::{
        ConvertSidToStringSidW, GetNamedSecurityInfoW, SE_FILE_OBJECT,
    };
    use windows::Win32::Security::{
        AclSizeInformation, GetAce, GetAclInformation, LookupAccountSidW, ACCESS_ALLOWED_ACE,
        ACE_HEADER, ACL, ACL_SIZE_INFORMATION, DACL_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR,
        PSID, SID_NAME_USE,
    };

    const ACCESS_ALLOWED_ACE_TYPE: u8 = 0;
    const ACCESS_DENIED_ACE_TYPE: u8 = 1;
    const INHERIT_ONLY_ACE: u8 = 0x08;
    const FILE_ALL_ACCESS: u32 = 0x001F_01FF;

    /// Frees the descriptor returned by `GetNamedSecurityInfoW`.
    struct LocalDescriptor(PSECURITY_DESCRIPTOR);

    impl Drop for LocalDescriptor {
        fn drop(&mut self) {
            if !self.0 .0.is_null() {
                unsafe {
                    let _ = LocalFree(HLOCAL(self.0 .0));
                }
            }
        }
    }

    pub(super) fn read_dacl(path: &Path) -> Result<Vec<RawAce>> {
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
        let what = format!("ACL of {}", path.display());

        let mut dacl: *mut ACL = std::ptr::null_mut();
        let mut sd = PSECURITY_DESCRIPTOR::default();
        let status = unsafe {
            GetNamedSecurityInfoW(
                PCWSTR(wide.as_ptr()),
                SE_FILE_OBJECT,
                DACL_SECURITY_INFORMATION,
                None,
                None,
                Some(&mut dacl),
                None,
                &mut sd,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(Error::query(what, format!("error {}", status.0)));
        }
        let _guard = LocalDescriptor(sd);

        // A NULL DACL grants everyone full access.
        if dacl.is_null() {
            return Ok(vec![RawAce {
                identity: "Everyone".to_string(),
                mask: FILE_ALL_ACCESS,
                allow: true,
            }]);
        }

        let mut info = ACL_SIZE_INFORMATION::default();
        unsafe {
            GetAclInformation(
                dacl,
                &mut info as *mut _ as *mut c_void,
                std::mem::size_of::<ACL_SIZE_INFORMATION>() as u32,
                AclSizeInformation,
            )
        }
        .map_err(|e| Error::query(what.clone(), e.to_string()))?;

        let mut aces = Vec::with_capacity(info.AceCount as usize);
        for index in 0..info.AceCount {
            let mut ace_ptr: *mut c_void = std::ptr::null_mut();
            if unsafe { GetAce(dacl, index, &mut ace_ptr) }.is_err() || ace_ptr.is_null() {
                continue;
            }
            let header = unsafe { &*(ace_ptr as *const ACE_HEADER) };
            if header.AceFlags & INHERIT_ONLY_ACE != 0 {
                continue;
            }
            let allow = match header.AceType {
                ACCESS_ALLOWED_ACE_TYPE => true,
                ACCESS_DENIED_ACE_TYPE => false,
                _ => continue,
            };
            // Allowed and denied ACEs share a layout.
            let ace = unsafe { &*(ace_ptr as *const ACCESS_ALLOWED_ACE) };
            let sid = PSID(&ace.SidStart as *const u32 as *mut c_void);
            aces.push(RawAce {
                identity: account_name(sid),
                mask: ace.Mask,
                allow,
            });
        }
        Ok(aces)
    }

    /// `DOMAIN\name`, or the string SID when the account cannot be resolved.
    fn account_name(sid: PSID) -> String {
        let mut name = [0u16; 256];
        let mut domain = [0u16; 256];
        let mut name_len = name.len() as u32;
        let mut domain_len = domain.len() as u32;
        let mut sid_use = SID_NAME_USE::default();

        let found = unsafe {
            LookupAccountSidW(
                PCWSTR::null(),
                sid,
                PWSTR(name.as_mut_ptr()),
                &mut name_len,
                PWSTR(domain.as_mut_ptr()),
                &mut domain_len,
                &mut sid_use,
            )
        };
        if found.is_ok() {
            let name = String::from_utf16_lossy(&name[..name_len as usize]);
            let domain = String::from_utf16_lossy(&domain[..domain_len as usize]);
            return if domain.is_empty() {
                name
            } else {
                format!(r"{domain}\{name}")
            };
        }
        sid_string(sid)
    }

    fn sid_string(sid: PSID) -> String {
        let mut out = PWSTR::null();
        unsafe {
            if ConvertSidToStringSidW(sid, &mut out).is_err() || out.is_null() {
                return "Unknown SID".to_string();
            }
            let text = out.to_string().unwrap_or_else(|_| "Unknown SID".to_string());
            let _ = LocalFree(HLOCAL(out.0 as *mut c_void));
            text
        }
    }
}
