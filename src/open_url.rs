use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::process::Command;

/// Browser URL for a listener; wildcard binds are reached through loopback.
pub fn dashboard_url(addr: SocketAddr) -> String {
    let host = if addr.ip().is_unspecified() {
        "127.0.0.1".to_string()
    } else {
        addr.ip().to_string()
    };
    if addr.is_ipv6() && !addr.ip().is_unspecified() {
        format!("http://[{host}]:{}/", addr.port())
    } else {
        format!("http://{host}:{}/", addr.port())
    }
}

pub fn open_url(url: &str) -> Result<()> {
    if let Err(e) = open::that(url) {
        tracing::debug!("System opener failed ({}), trying firefox", e);
        Command::new("firefox")
            .arg(url)
            .spawn()
            .with_context(|| format!("could not open {url} in a browser"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_bind_opens_loopback() {
        let addr: SocketAddr = "0.0.0.0:5000".parse().unwrap();
        assert_eq!(dashboard_url(addr), "http://127.0.0.1:5000/");
    }

    #[test]
    fn explicit_hosts_are_kept() {
        let v4: SocketAddr = "192.168.1.10:8080".parse().unwrap();
        assert_eq!(dashboard_url(v4), "http://192.168.1.10:8080/");
        let v6: SocketAddr = "[::1]:5000".parse().unwrap();
        assert_eq!(dashboard_url(v6), "http://[::1]:5000/");
    }
}
