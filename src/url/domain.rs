use url::{Host, Url};

/// Extracts the registrable domain (eTLD+1) from a URL
///
/// Scheme, port and subdomains are stripped using the public suffix list and
/// the result is lower-cased. IP addresses and hosts without a registrable
/// part (e.g. `localhost`) are returned as they are.
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase registrable domain
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use latam_leads::url::registrable_domain;
///
/// let url = Url::parse("https://www.Example.com/path").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("https://admisiones.uba.com.ar/").unwrap();
/// assert_eq!(registrable_domain(&url), Some("uba.com.ar".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(host) => {
            let host = host.trim_end_matches('.').to_lowercase();
            let domain = psl::domain_str(&host).unwrap_or(host.as_str()).to_string();
            Some(domain)
        }
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}
