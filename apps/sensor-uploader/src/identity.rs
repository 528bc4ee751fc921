use anyhow::{Context, Result};

/// Device identity: the configured override, else the user name owning this process.
pub fn resolve_device_id(override_id: Option<&str>) -> Result<String> {
    if let Some(id) = override_id.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(id.to_string());
    }
    process_owner().context("resolve device id from process owner (set UPLOADER_DEVICE_ID to override)")
}

#[cfg(unix)]
fn process_owner() -> Result<String> {
    use std::ffi::CStr;

    let uid = unsafe { libc::getuid() };
    let mut buf_len = 1024usize;

    loop {
        let mut buf: Vec<libc::c_char> = vec![0; buf_len];
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        let rc = unsafe { libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result) };
        if rc == libc::ERANGE && buf_len < 1 << 20 {
            buf_len *= 2;
            continue;
        }
        if rc != 0 {
            return Err(std::io::Error::from_raw_os_error(rc)).with_context(|| format!("getpwuid_r({uid})"));
        }
        if result.is_null() || pwd.pw_name.is_null() {
            anyhow::bail!("no passwd entry for uid {uid}");
        }

        // pw_name points into `buf`, which is still alive here.
        let name = unsafe { CStr::from_ptr(pwd.pw_name) }
            .to_str()
            .with_context(|| format!("user name for uid {uid} is not UTF-8"))?
            .to_string();
        return Ok(name);
    }
}

#[cfg(not(unix))]
fn process_owner() -> Result<String> {
    std::env::var("USERNAME").context("USERNAME not set")
}
