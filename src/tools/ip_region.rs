use crate::error::{Error, Result};
use crate::utils::http::fetch_json;
use ipnetwork::IpNetwork;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::info;

/// One published CIDR block and where it lives
#[derive(Debug, Clone, Deserialize)]
pub struct PrefixRecord {
    #[serde(alias = "ipv6_prefix")]
    pub ip_prefix: IpNetwork,
    pub region: String,
    pub service: String,
    pub network_border_group: String,
}

#[derive(Debug, Deserialize)]
pub struct IpRanges {
    #[serde(rename = "syncToken", default)]
    pub sync_token: String,
    #[serde(rename = "createDate", default)]
    pub create_date: String,
    #[serde(default)]
    pub prefixes: Vec<PrefixRecord>,
    #[serde(default)]
    pub ipv6_prefixes: Vec<PrefixRecord>,
}

impl IpRanges {
    pub fn len(&self) -> usize {
        self.prefixes.len() + self.ipv6_prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub async fn fetch_ip_ranges(client: &reqwest::Client, url: &str) -> Result<IpRanges> {
    info!(action = "fetch", component = "ip_ranges", url, "Fetching IP ranges");
    let ranges: IpRanges = fetch_json(client, url).await?;
    info!(
        action = "loaded",
        component = "ip_ranges",
        prefix_count = ranges.len(),
        sync_token = %ranges.sync_token,
        "Loaded IP ranges"
    );
    Ok(ranges)
}

/// Read the ranges document from a local copy
pub fn load_ip_ranges(path: &Path) -> Result<IpRanges> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;
    parse_ip_ranges(&content)
}

pub fn parse_ip_ranges(content: &str) -> Result<IpRanges> {
    serde_json::from_str(content).map_err(|e| Error::Malformed {
        what: "IP ranges document".into(),
        reason: e.to_string(),
    })
}

/// Every record whose network contains `ip`, in document order.
/// Ranges overlap across services, so more than one match is normal.
pub fn find_prefixes(ranges: &IpRanges, ip: IpAddr) -> Vec<&PrefixRecord> {
    let records = match ip {
        IpAddr::V4(_) => &ranges.prefixes,
        IpAddr::V6(_) => &ranges.ipv6_prefixes,
    };
    records
        .iter()
        .filter(|record| record.ip_prefix.contains(ip))
        .collect()
}

/// Parse `input` and look it up, reporting no match as `NotFound`
pub fn lookup<'a>(ranges: &'a IpRanges, input: &str) -> Result<Vec<&'a PrefixRecord>> {
    let ip: IpAddr = input
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("'{}' is not an IP address", input)))?;

    let matches = find_prefixes(ranges, ip);
    if matches.is_empty() {
        return Err(Error::NotFound(format!(
            "{} is not inside any published range",
            ip
        )));
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::error::ErrorKind;
    use crate::utils::http::build_client;
    use crate::utils::test_server::TestServer;

    const DOCUMENT: &str = r#"{
        "syncToken": "1583517967",
        "createDate": "2020-03-06-18-06-07",
        "prefixes": [
            {"ip_prefix": "54.153.0.0/17", "region": "ap-southeast-2", "service": "AMAZON", "network_border_group": "ap-southeast-2"},
            {"ip_prefix": "54.153.0.0/17", "region": "ap-southeast-2", "service": "EC2", "network_border_group": "ap-southeast-2"},
            {"ip_prefix": "3.5.140.0/22", "region": "ap-northeast-2", "service": "AMAZON", "network_border_group": "ap-northeast-2"}
        ],
        "ipv6_prefixes": [
            {"ipv6_prefix": "2600:1f14::/35", "region": "us-west-2", "service": "EC2", "network_border_group": "us-west-2"}
        ]
    }"#;

    #[test]
    fn address_inside_prefix_returns_region() {
        let ranges = parse_ip_ranges(DOCUMENT).unwrap();
        let matches = lookup(&ranges, "54.153.41.72").unwrap();
        assert_eq!(matches[0].region, "ap-southeast-2");
        assert_eq!(matches[0].ip_prefix.to_string(), "54.153.0.0/17");
    }

    #[test]
    fn overlapping_prefixes_all_match() {
        let ranges = parse_ip_ranges(DOCUMENT).unwrap();
        let matches = lookup(&ranges, "54.153.41.72").unwrap();
        let services: Vec<_> = matches.iter().map(|m| m.service.as_str()).collect();
        assert_eq!(services, vec!["AMAZON", "EC2"]);
    }

    #[test]
    fn ipv6_addresses_use_ipv6_prefixes() {
        let ranges = parse_ip_ranges(DOCUMENT).unwrap();
        let matches = lookup(&ranges, "2600:1f14::1").unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].region, "us-west-2");
    }

    #[test]
    fn address_outside_ranges_is_not_found() {
        let ranges = parse_ip_ranges(DOCUMENT).unwrap();
        let err = lookup(&ranges, "192.168.1.1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn malformed_address_is_invalid_input() {
        let ranges = parse_ip_ranges(DOCUMENT).unwrap();
        let err = lookup(&ranges, "54.153.41").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = parse_ip_ranges(r#"{"prefixes": [{"ip_prefix": "nope"}]}"#).unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[tokio::test]
    async fn fetches_ranges_over_http() {
        let server = TestServer::start(&[
            ("/ip-ranges.json", 200, DOCUMENT),
            ("/down.json", 503, "unavailable"),
        ])
        .await;
        let client = build_client(&HttpConfig::default()).unwrap();

        let ranges = fetch_ip_ranges(&client, &server.url("/ip-ranges.json"))
            .await
            .unwrap();
        assert_eq!(ranges.sync_token, "1583517967");
        assert_eq!(lookup(&ranges, "3.5.140.2").unwrap()[0].region, "ap-northeast-2");

        let err = fetch_ip_ranges(&client, &server.url("/missing.json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = fetch_ip_ranges(&client, &server.url("/down.json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
