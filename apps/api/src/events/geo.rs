use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Geolocation is decoration on analytics rows; a slow lookup must never
/// hold up an event, hence the short timeout.
const LOOKUP_TIMEOUT_SECS: u64 = 2;

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

/// Resolves an IP to its ISO country code. Any failure degrades to None.
pub async fn lookup_country(ip: &str) -> Option<String> {
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(LOOKUP_TIMEOUT_SECS))
        .build()
        .ok()?;
    let response = client
        .get(format!("http://ip-api.com/json/{ip}?fields=countryCode"))
        .send()
        .await
        .ok()?;
    let geo = response.json::<GeoResponse>().await.ok()?;
    debug!("geo lookup for {ip}: {:?}", geo.country_code);
    geo.country_code
}
