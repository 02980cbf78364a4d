//! Identity of the machine and user running the orchestrator.
//!
//! Both end up in lock metadata. Other orchestrators ping the recorded
//! hostname to decide whether a lock is abandoned, so it must be the
//! fully-qualified name: a short name may not resolve from another
//! controller, and an unresolvable owner reads as a dead one.

use tracing::debug;

/// Fully-qualified name of this machine, falling back to the short name.
pub fn local_hostname() -> String {
    let short = match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            debug!(error = %e, "could not read hostname");
            return "unknown".to_string();
        }
    };
    let canonical = canonical_name(&short);
    qualified_name(short, canonical)
}

/// Prefer the resolver's canonical name when it carries a domain.
fn qualified_name(short: String, canonical: Option<String>) -> String {
    match canonical {
        Some(name) if name.contains('.') && !name.starts_with("localhost") => name,
        _ => short,
    }
}

/// Whether two recorded hostnames name the same machine.
///
/// Names compare case-insensitively. An unqualified name matches a
/// qualified one with the same first label; two qualified names must agree
/// on the domain too.
pub fn same_host(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    match (a.split_once('.'), b.split_once('.')) {
        (None, Some((label, _))) => a.eq_ignore_ascii_case(label),
        (Some((label, _)), None) => b.eq_ignore_ascii_case(label),
        _ => false,
    }
}

#[cfg(unix)]
fn canonical_name(short: &str) -> Option<String> {
    use std::ffi::{CStr, CString};

    let node = CString::new(short).ok()?;
    // SAFETY: addrinfo is a plain C struct; all-zero is a valid hints value.
    let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    hints.ai_flags = libc::AI_CANONNAME;
    hints.ai_family = libc::AF_UNSPEC;

    let mut res: *mut libc::addrinfo = std::ptr::null_mut();
    // SAFETY: node and hints outlive the call; res is freed below.
    let rc = unsafe { libc::getaddrinfo(node.as_ptr(), std::ptr::null(), &hints, &mut res) };
    if rc != 0 || res.is_null() {
        debug!(host = short, rc, "could not resolve canonical hostname");
        return None;
    }

    // SAFETY: res points at the list returned by a successful getaddrinfo,
    // and ai_canonname, when set, is a NUL-terminated string owned by it.
    let name = unsafe {
        let canon = (*res).ai_canonname;
        let name = (!canon.is_null()).then(|| CStr::from_ptr(canon).to_string_lossy().into_owned());
        libc::freeaddrinfo(res);
        name
    };
    name.filter(|n| !n.is_empty())
}

#[cfg(not(unix))]
fn canonical_name(_short: &str) -> Option<String> {
    None
}

/// User name recorded as lock owner.
///
/// Taken from the password database entry of the effective uid; the
/// environment is only consulted when there is no such entry.
pub fn owner_user_name() -> String {
    passwd_name()
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(unix)]
fn passwd_name() -> Option<String> {
    use std::ffi::CStr;

    // SAFETY: geteuid has no preconditions and cannot fail.
    let uid = unsafe { libc::geteuid() };
    let mut buf: Vec<libc::c_char> = vec![0; 1024];
    loop {
        // SAFETY: passwd is a plain C struct filled in by getpwuid_r.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        // SAFETY: every pointer is valid for the call and buf.len() is the
        // real capacity of buf.
        let rc = unsafe { libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result) };
        if rc == libc::ERANGE && buf.len() < 1 << 20 {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() || pwd.pw_name.is_null() {
            debug!(uid, rc, "no password database entry for effective uid");
            return None;
        }
        // SAFETY: pw_name points into buf, which is still alive.
        let name = unsafe { CStr::from_ptr(pwd.pw_name) }.to_string_lossy().into_owned();
        return Some(name).filter(|n| !n.is_empty());
    }
}

#[cfg(not(unix))]
fn passwd_name() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_wins_only_when_qualified() {
        assert_eq!(
            qualified_name("ctl-a".into(), Some("ctl-a.east.example".into())),
            "ctl-a.east.example"
        );
        assert_eq!(qualified_name("ctl-a".into(), Some("ctl-a".into())), "ctl-a");
        assert_eq!(
            qualified_name("ctl-a".into(), Some("localhost.localdomain".into())),
            "ctl-a"
        );
        assert_eq!(qualified_name("ctl-a".into(), None), "ctl-a");
    }

    #[test]
    fn short_and_qualified_names_of_one_machine_match() {
        assert!(same_host("ctl-a", "ctl-a.east.example"));
        assert!(same_host("ctl-a.east.example", "ctl-a"));
        assert!(same_host("CTL-A.east.example", "ctl-a.East.Example"));
    }

    #[test]
    fn different_machines_do_not_match() {
        assert!(!same_host("ctl-a", "ctl-b.east.example"));
        assert!(!same_host("ctl-a.east.example", "ctl-a.west.example"));
        assert!(!same_host("ctl-a", "ctl-ab"));
    }

    #[test]
    fn local_identity_is_never_empty() {
        assert!(!local_hostname().is_empty());
        assert!(!owner_user_name().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn owner_follows_password_database_not_environment() {
        // The environment can be stale under sudo; the lookup must not read it.
        if let Some(name) = passwd_name() {
            assert_eq!(owner_user_name(), name);
        }
    }
}
