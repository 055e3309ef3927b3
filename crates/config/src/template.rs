/// Documented `pulse.toml` listing every option at its default value.
#[must_use]
pub fn default_config_template(port: u16) -> String {
    format!(
        r#"# pulse configuration

[server]
# IP address the gateway listens on (IPv4 or IPv6, e.g. "::").
bind = "127.0.0.1"
port = {port}

[metrics]
# Serve the scrape endpoint. Query routes stay available either way.
enabled = true
path = "/metrics"
# Emit <name>_created samples for counters and histograms.
emit_created = false

[query]
# Matchers listed by the `matchers` command.
matcher_limit = 10
# Matchers aggregated into the overview.
overview_matcher_limit = 5
"#
    )
}

#[cfg(test)]
mod tests {
    use {super::*, crate::PulseConfig};

    #[test]
    fn template_parses_to_defaults() {
        let config: PulseConfig = toml::from_str(&default_config_template(9464)).unwrap();
        assert_eq!(config, PulseConfig::default());
    }

    #[test]
    fn template_keeps_port() {
        let config: PulseConfig = toml::from_str(&default_config_template(9100)).unwrap();
        assert_eq!(config.server.port, 9100);
    }
}
