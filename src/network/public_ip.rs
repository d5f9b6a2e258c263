use log::{info, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// Ask `service` (an ipify-style JSON endpoint) for this host's public address.
/// Any failure yields `None`, which callers report as unknown.
pub fn public_ip(service: &str, timeout: Duration) -> Option<String> {
    let client = match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build HTTP client: {e}");
            return None;
        }
    };

    let response = match client.get(service).send() {
        Ok(response) => response,
        Err(e) => {
            warn!("Public IP lookup via {service} failed: {e}");
            return None;
        }
    };
    if !response.status().is_success() {
        warn!("Public IP service answered {}", response.status());
        return None;
    }

    match response.text() {
        Ok(body) => {
            let ip = parse_ip_response(&body);
            if let Some(ip) = &ip {
                info!("Public IP is {ip}");
            }
            ip
        }
        Err(e) => {
            warn!("Failed to read public IP response: {e}");
            None
        }
    }
}

fn parse_ip_response(body: &str) -> Option<String> {
    match serde_json::from_str::<IpResponse>(body) {
        Ok(parsed) if !parsed.ip.trim().is_empty() => Some(parsed.ip.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            warn!("Unexpected public IP response {body:?}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ip_response() {
        assert_eq!(
            parse_ip_response(r#"{"ip":"203.0.113.7"}"#),
            Some("203.0.113.7".to_string())
        );
        assert_eq!(parse_ip_response(r#"{"ip":""}"#), None);
        assert_eq!(parse_ip_response("<html>"), None);
    }

    #[test]
    fn test_unreachable_service_is_unknown() {
        // Port 9 on loopback has no HTTP server behind it.
        let ip = public_ip("http://127.0.0.1:9/", Duration::from_millis(500));
        assert!(ip.is_none());
    }
}
