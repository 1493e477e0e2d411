use fleet_proto::LicenseType;
use rand::RngCore;

/// Generates a license key shaped `PFX-XXXX-XXXX-XXXX-XXXX`, uppercase hex after the prefix.
/// `prefix` defaults to the license type's prefix (`SIEM`/`MYSOC`) unless the caller overrides it.
pub fn generate_license_key(license_type: LicenseType, prefix: Option<&str>) -> String {
    let prefix = prefix
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| license_type.default_key_prefix());

    let mut rng = rand::thread_rng();
    let groups: Vec<String> = (0..4)
        .map(|_| {
            let mut buf = [0u8; 2];
            rng.fill_bytes(&mut buf);
            hex::encode_upper(buf)
        })
        .collect();

    format!("{prefix}-{}", groups.join("-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_shape() {
        let key = generate_license_key(LicenseType::Siemcore, None);
        let parts: Vec<&str> = key.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "SIEM");
        for group in &parts[1..] {
            assert_eq!(group.len(), 4);
            assert!(group.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_mysoc_default_prefix() {
        let key = generate_license_key(LicenseType::MysocCloud, None);
        assert!(key.starts_with("MYSOC-"));
    }

    #[test]
    fn test_explicit_prefix_override() {
        let key = generate_license_key(LicenseType::Siemcore, Some("ACME"));
        assert!(key.starts_with("ACME-"));
    }
}
