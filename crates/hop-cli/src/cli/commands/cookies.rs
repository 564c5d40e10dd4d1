//! `hop cookies` – show the jar persisted for one (session, host) identity.

use anyhow::Result;
use hop_core::config::HopConfig;
use hop_core::cookie_jar::CookieJar;
use hop_core::origin::host_part;

pub fn run_cookies(cfg: &HopConfig, session: &str, host: &str) -> Result<()> {
    let host = match host_part(host) {
        h if h.is_empty() => host.to_string(),
        h => h,
    };
    let mut jar = CookieJar::open(cfg.cookies_dir()?);
    jar.set_identity(session, &host);
    let set = jar.load();
    if set.is_empty() {
        println!("No cookies for {} in session {}.", host, session);
    } else {
        println!("{:<24} {}", "NAME", "VALUE");
        for cookie in set.values() {
            println!("{:<24} {}", cookie.name, cookie.value);
        }
    }
    if let Some(path) = jar.path() {
        tracing::debug!(path = %path.display(), "cookie file");
    }
    for err in jar.errors() {
        eprintln!("warning: {}", err);
    }
    Ok(())
}
